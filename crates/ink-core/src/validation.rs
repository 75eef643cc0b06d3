//! # Field schemas
//!
//! Every submission kind is described by a static list of [`FieldRule`]s.
//! Raw form input is checked against all rules at once and every failure is
//! reported, so the visitor can fix the whole form in one go.

use std::collections::HashMap;

use uuid::Uuid;

use crate::error::FieldError;
use crate::models::{Comment, Feedback};

/// Raw form input as it arrives from the HTTP layer.
pub type FormData = HashMap<String, String>;

/// Name of the form field carrying the captcha response.
pub const CAPTCHA_FIELD: &str = "captcha";

/// Name of the form field carrying the comment being replied to.
pub const PARENT_FIELD: &str = "parent_id";

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_EMAIL: &str = "Enter a valid email address.";
pub const INVALID_CAPTCHA: &str = "Invalid CAPTCHA.";
pub const INVALID_PARENT: &str = "Select a valid comment to reply to.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldFormat {
    Text,
    Email,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub required: bool,
    pub max_len: Option<usize>,
    pub format: FieldFormat,
}

impl FieldRule {
    const fn required(name: &'static str, max_len: usize, format: FieldFormat) -> Self {
        Self {
            name,
            required: true,
            max_len: Some(max_len),
            format,
        }
    }

    const fn optional(name: &'static str, max_len: usize) -> Self {
        Self {
            name,
            required: false,
            max_len: Some(max_len),
            format: FieldFormat::Text,
        }
    }

    fn check(&self, value: Option<&str>) -> Result<Option<String>, FieldError> {
        let value = value.map(str::trim).filter(|v| !v.is_empty());
        let Some(value) = value else {
            if self.required {
                return Err(FieldError::new(self.name, REQUIRED));
            }
            return Ok(None);
        };

        let length = value.chars().count();
        if let Some(max) = self.max_len {
            if length > max {
                return Err(FieldError::new(
                    self.name,
                    format!("Ensure this value has at most {max} characters (it has {length})."),
                ));
            }
        }

        if self.format == FieldFormat::Email && !is_valid_email(value) {
            return Err(FieldError::new(self.name, INVALID_EMAIL));
        }

        Ok(Some(value.to_string()))
    }
}

/// Rule set for one submission kind.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub rules: &'static [FieldRule],
    /// Whether the form must carry a verified captcha response
    pub requires_captcha: bool,
}

pub const FEEDBACK_SCHEMA: Schema = Schema {
    rules: &[
        FieldRule::required("name", 100, FieldFormat::Text),
        FieldRule::required("email", 254, FieldFormat::Email),
        FieldRule::required("message", 2000, FieldFormat::Text),
        FieldRule::optional("telegram", 64),
        FieldRule::optional("whatsapp", 32),
    ],
    requires_captcha: true,
};

pub const COMMENT_SCHEMA: Schema = Schema {
    rules: &[
        FieldRule::required("username", 80, FieldFormat::Text),
        FieldRule::required("body", 1000, FieldFormat::Text),
    ],
    requires_captcha: false,
};

/// Values that passed every rule, trimmed. Absent optionals are missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatedFields(HashMap<&'static str, String>);

impl ValidatedFields {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    fn take(&mut self, name: &str) -> Option<String> {
        self.0.remove(name)
    }
}

impl Schema {
    /// Checks `input` against every rule, collecting all failures.
    pub fn validate(&self, input: &FormData) -> Result<ValidatedFields, Vec<FieldError>> {
        let mut fields = HashMap::new();
        let mut errors = Vec::new();

        for rule in self.rules {
            match rule.check(input.get(rule.name).map(String::as_str)) {
                Ok(Some(value)) => {
                    fields.insert(rule.name, value);
                }
                Ok(None) => {}
                Err(err) => errors.push(err),
            }
        }

        if errors.is_empty() {
            Ok(ValidatedFields(fields))
        } else {
            Err(errors)
        }
    }
}

/// Builds a [`Feedback`] from fields validated by [`FEEDBACK_SCHEMA`].
pub fn feedback_from(mut fields: ValidatedFields) -> Feedback {
    Feedback {
        name: fields.take("name").unwrap_or_default(),
        email: fields.take("email").unwrap_or_default(),
        message: fields.take("message").unwrap_or_default(),
        telegram: fields.take("telegram"),
        whatsapp: fields.take("whatsapp"),
    }
}

/// Builds a [`Comment`] from fields validated by [`COMMENT_SCHEMA`].
pub fn comment_from(mut fields: ValidatedFields, post_id: Uuid, parent_id: Option<Uuid>) -> Comment {
    Comment {
        post_id,
        parent_id,
        username: fields.take("username").unwrap_or_default(),
        body: fields.take("body").unwrap_or_default(),
    }
}

/// Loose structural check: `local@domain.tld`, no whitespace.
pub fn is_valid_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => {
            !host.is_empty()
                && !tld.is_empty()
                && !host.starts_with('.')
                && !host.ends_with('.')
                && !domain.contains("..")
        }
        None => false,
    }
}
