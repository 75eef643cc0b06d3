//! # Submission pipeline
//!
//! The one write path for visitor content. Each request runs through the
//! same steps and stops at the first that does not pass:
//!
//! 1. admission: over budget ends in [`Outcome::Limited`];
//! 2. validation (schema, captcha, and for replies the parent comment, which
//!    must exist under the same post): ends in [`Outcome::Invalid`];
//! 3. notification enqueue, bounded by a timeout: failure or timeout ends
//!    in [`Outcome::NotifyFailed`] and nothing is stored;
//! 4. persistence: ends in [`Outcome::Persisted`], or
//!    [`Outcome::PersistFailed`] if storage errors. That is usually after
//!    the owner was notified; a failed parent lookup in step 2 also ends
//!    here, before any notification.
//!
//! The owner is notified before the content is stored, so content is never
//! kept without an alert about it. The flip side: while the notifier is
//! down, submissions are rejected and lost.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use crate::admission::{AdmissionController, Decision};
use crate::error::FieldError;
use crate::models::{ActionClass, ClientKey, Notification, Submission};
use crate::traits::{CaptchaVerifier, Notifier, SubmissionRepo};
use crate::validation::{
    comment_from, feedback_from, FormData, Schema, CAPTCHA_FIELD, COMMENT_SCHEMA, FEEDBACK_SCHEMA,
    INVALID_CAPTCHA, INVALID_PARENT, PARENT_FIELD, REQUIRED,
};

pub const FEEDBACK_THANKS: &str = "Thank you, I'll answer you soon!";
pub const COMMENT_THANKS: &str = "Thank you for your comment!";
pub const GENERIC_ERROR: &str = "An error occurred while processing your request.";

pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// What the submitted form is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionTarget {
    Feedback,
    Comment {
        post_id: Uuid,
        post_title: String,
        parent_id: Option<Uuid>,
    },
}

impl SubmissionTarget {
    pub fn action_class(&self) -> ActionClass {
        match self {
            SubmissionTarget::Feedback => ActionClass::Feedback,
            SubmissionTarget::Comment { .. } => ActionClass::Comment,
        }
    }

    fn schema(&self) -> Schema {
        match self {
            SubmissionTarget::Feedback => FEEDBACK_SCHEMA,
            SubmissionTarget::Comment { .. } => COMMENT_SCHEMA,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub target: SubmissionTarget,
    pub form: FormData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageLevel {
    Success,
    Warning,
    Error,
}

/// A flash message for the visitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserMessage {
    pub level: MessageLevel,
    pub text: String,
}

impl UserMessage {
    fn new(level: MessageLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

/// Terminal state of one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Limited { retry_after: Duration },
    Invalid { errors: Vec<FieldError> },
    NotifyFailed,
    PersistFailed,
    Persisted { id: Uuid, action: ActionClass },
}

impl Outcome {
    pub fn state(&self) -> &'static str {
        match self {
            Outcome::Limited { .. } => "limited",
            Outcome::Invalid { .. } => "invalid",
            Outcome::NotifyFailed => "notify_failed",
            Outcome::PersistFailed => "persist_failed",
            Outcome::Persisted { .. } => "persisted",
        }
    }

    pub fn is_persisted(&self) -> bool {
        matches!(self, Outcome::Persisted { .. })
    }

    /// Messages to show the visitor, one per failing field for `Invalid`.
    pub fn messages(&self) -> Vec<UserMessage> {
        match self {
            Outcome::Limited { retry_after } => vec![UserMessage::new(
                MessageLevel::Warning,
                format!(
                    "Too many requests. Please try again in {} minutes.",
                    minutes_ceil(*retry_after)
                ),
            )],
            Outcome::Invalid { errors } => errors
                .iter()
                .map(|e| UserMessage::new(MessageLevel::Error, e.to_string()))
                .collect(),
            Outcome::NotifyFailed | Outcome::PersistFailed => {
                vec![UserMessage::new(MessageLevel::Error, GENERIC_ERROR)]
            }
            Outcome::Persisted { action, .. } => {
                let text = match action {
                    ActionClass::Feedback => FEEDBACK_THANKS,
                    ActionClass::Comment => COMMENT_THANKS,
                };
                vec![UserMessage::new(MessageLevel::Success, text)]
            }
        }
    }
}

fn minutes_ceil(d: Duration) -> u64 {
    d.as_secs().div_ceil(60).max(1)
}

/// Builds the owner alert for a validated submission.
pub fn compose_notification(submission: &Submission, target: &SubmissionTarget) -> Notification {
    match submission {
        Submission::Feedback(feedback) => {
            let mut body = feedback.message.clone();
            body.push_str(&format!("\nMy email: {}", feedback.email));
            if let Some(telegram) = &feedback.telegram {
                body.push_str(&format!("\nMy telegram: {telegram}"));
            }
            if let Some(whatsapp) = &feedback.whatsapp {
                body.push_str(&format!("\nMy whatsapp: {whatsapp}"));
            }
            Notification {
                subject: format!("I want a tattoo - {}", feedback.name),
                body,
            }
        }
        Submission::Comment(comment) => {
            let title = match target {
                SubmissionTarget::Comment { post_title, .. } => post_title.as_str(),
                SubmissionTarget::Feedback => "",
            };
            let mut body = format!("{} commented on \"{}\":\n\n{}", comment.username, title, comment.body);
            if let Some(parent) = comment.parent_id {
                body.push_str(&format!("\n\nIn reply to comment {parent}"));
            }
            Notification {
                subject: format!("New comment from {}", comment.username),
                body,
            }
        }
    }
}

pub struct SubmissionPipeline {
    admission: Arc<AdmissionController>,
    captcha: Arc<dyn CaptchaVerifier>,
    notifier: Arc<dyn Notifier>,
    repo: Arc<dyn SubmissionRepo>,
    notify_timeout: Duration,
}

impl SubmissionPipeline {
    pub fn new(
        admission: Arc<AdmissionController>,
        captcha: Arc<dyn CaptchaVerifier>,
        notifier: Arc<dyn Notifier>,
        repo: Arc<dyn SubmissionRepo>,
    ) -> Self {
        Self {
            admission,
            captcha,
            notifier,
            repo,
            notify_timeout: DEFAULT_NOTIFY_TIMEOUT,
        }
    }

    pub fn with_notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify_timeout = timeout;
        self
    }

    pub async fn submit(&self, client: &ClientKey, request: SubmissionRequest) -> Outcome {
        let action = request.target.action_class();

        if let Decision::Limited { retry_after } = self.admission.admit(client, action) {
            tracing::info!(client = %client, action = action.as_str(), "submission rate limited");
            return Outcome::Limited { retry_after };
        }

        let submission = match self.validate(&request).await {
            Ok(submission) => submission,
            Err(outcome) => {
                tracing::debug!(action = action.as_str(), state = outcome.state(), "submission rejected");
                return outcome;
            }
        };

        let notification = compose_notification(&submission, &request.target);
        match tokio::time::timeout(self.notify_timeout, self.notifier.enqueue(notification)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::error!(action = action.as_str(), error = %err, "notification enqueue failed, submission dropped");
                return Outcome::NotifyFailed;
            }
            Err(_) => {
                tracing::error!(
                    action = action.as_str(),
                    timeout_ms = self.notify_timeout.as_millis() as u64,
                    "notification enqueue timed out, submission dropped"
                );
                return Outcome::NotifyFailed;
            }
        }

        match self.repo.insert_submission(&submission).await {
            Ok(id) => {
                tracing::info!(id = %id, action = action.as_str(), "submission persisted");
                Outcome::Persisted { id, action }
            }
            Err(err) => {
                tracing::error!(action = action.as_str(), error = %err, "submission notified but not persisted");
                Outcome::PersistFailed
            }
        }
    }

    /// Runs every check that can reject the request before anything is enqueued.
    async fn validate(&self, request: &SubmissionRequest) -> Result<Submission, Outcome> {
        let schema = request.target.schema();
        let mut errors = Vec::new();

        let fields = match schema.validate(&request.form) {
            Ok(fields) => Some(fields),
            Err(failures) => {
                errors.extend(failures);
                None
            }
        };
        if schema.requires_captcha {
            errors.extend(self.check_captcha(&request.form).await);
        }
        if let SubmissionTarget::Comment {
            post_id,
            parent_id: Some(parent_id),
            ..
        } = &request.target
        {
            match self.repo.comment_post(*parent_id).await {
                Ok(Some(parent_post)) if parent_post == *post_id => {}
                Ok(_) => errors.push(FieldError::new(PARENT_FIELD, INVALID_PARENT)),
                Err(err) => {
                    tracing::error!(parent_id = %parent_id, error = %err, "parent comment lookup failed");
                    return Err(Outcome::PersistFailed);
                }
            }
        }

        let fields = match fields {
            Some(fields) if errors.is_empty() => fields,
            _ => return Err(Outcome::Invalid { errors }),
        };

        Ok(match &request.target {
            SubmissionTarget::Feedback => Submission::Feedback(feedback_from(fields)),
            SubmissionTarget::Comment {
                post_id, parent_id, ..
            } => Submission::Comment(comment_from(fields, *post_id, *parent_id)),
        })
    }

    async fn check_captcha(&self, form: &FormData) -> Option<FieldError> {
        let response = form.get(CAPTCHA_FIELD).map(|v| v.trim()).unwrap_or_default();
        if response.is_empty() {
            return Some(FieldError::new(CAPTCHA_FIELD, REQUIRED));
        }
        if self.captcha.is_human_verified(response).await {
            None
        } else {
            Some(FieldError::new(CAPTCHA_FIELD, INVALID_CAPTCHA))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::AdmissionPolicy;
    use crate::error::AppError;
    use crate::models::{Comment, Feedback};
    use crate::traits::{
        Clock, ManualClock, MockCaptchaVerifier, MockNotifier, MockSubmissionRepo,
    };
    use async_trait::async_trait;
    use mockall::Sequence;

    fn admission() -> Arc<AdmissionController> {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new());
        Arc::new(AdmissionController::new(AdmissionPolicy::default(), clock))
    }

    fn human() -> MockCaptchaVerifier {
        let mut captcha = MockCaptchaVerifier::new();
        captcha.expect_is_human_verified().returning(|_| true);
        captcha
    }

    fn pipeline(
        admission: Arc<AdmissionController>,
        captcha: MockCaptchaVerifier,
        notifier: impl Notifier + 'static,
        repo: MockSubmissionRepo,
    ) -> SubmissionPipeline {
        SubmissionPipeline::new(admission, Arc::new(captcha), Arc::new(notifier), Arc::new(repo))
    }

    fn feedback_form() -> FormData {
        [
            ("name", "Anna"),
            ("email", "anna@example.com"),
            ("message", "A small swallow behind the ear"),
            ("whatsapp", "+33 6 12 34 56 78"),
            ("captcha", "key:answer"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn feedback_request() -> SubmissionRequest {
        SubmissionRequest {
            target: SubmissionTarget::Feedback,
            form: feedback_form(),
        }
    }

    fn expected_feedback() -> Submission {
        Submission::Feedback(Feedback {
            name: "Anna".into(),
            email: "anna@example.com".into(),
            message: "A small swallow behind the ear".into(),
            telegram: None,
            whatsapp: Some("+33 6 12 34 56 78".into()),
        })
    }

    fn client() -> ClientKey {
        ClientKey::new("203.0.113.9")
    }

    #[tokio::test]
    async fn test_notify_then_persist_exactly_once() {
        let mut seq = Sequence::new();
        let mut notifier = MockNotifier::new();
        let mut repo = MockSubmissionRepo::new();
        let id = Uuid::now_v7();

        notifier
            .expect_enqueue()
            .withf(|n| n.subject == "I want a tattoo - Anna")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        repo.expect_insert_submission()
            .withf(|s| *s == expected_feedback())
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| Ok(id));

        let outcome = pipeline(admission(), human(), notifier, repo)
            .submit(&client(), feedback_request())
            .await;

        assert_eq!(
            outcome,
            Outcome::Persisted {
                id,
                action: ActionClass::Feedback
            }
        );
        assert_eq!(outcome.messages()[0].text, FEEDBACK_THANKS);
    }

    // Notify-before-persist: when the notifier is down the visitor's
    // message is rejected and lost rather than stored unannounced.
    #[tokio::test]
    async fn test_notify_failure_persists_nothing() {
        let mut notifier = MockNotifier::new();
        let mut repo = MockSubmissionRepo::new();
        notifier
            .expect_enqueue()
            .times(1)
            .returning(|_| Err(AppError::NotifyDispatch("queue full".into())));
        repo.expect_insert_submission().never();

        let outcome = pipeline(admission(), human(), notifier, repo)
            .submit(&client(), feedback_request())
            .await;

        assert_eq!(outcome, Outcome::NotifyFailed);
        assert_eq!(outcome.messages()[0].text, GENERIC_ERROR);
    }

    struct StalledNotifier;

    #[async_trait]
    impl Notifier for StalledNotifier {
        async fn enqueue(&self, _notification: Notification) -> crate::error::Result<()> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_notify_timeout_counts_as_failure() {
        let mut repo = MockSubmissionRepo::new();
        repo.expect_insert_submission().never();

        let outcome = pipeline(admission(), human(), StalledNotifier, repo)
            .with_notify_timeout(Duration::from_millis(20))
            .submit(&client(), feedback_request())
            .await;

        assert_eq!(outcome, Outcome::NotifyFailed);
    }

    #[tokio::test]
    async fn test_invalid_input_reports_each_field() {
        let mut notifier = MockNotifier::new();
        let mut repo = MockSubmissionRepo::new();
        let mut captcha = MockCaptchaVerifier::new();
        captcha.expect_is_human_verified().returning(|_| false);
        notifier.expect_enqueue().never();
        repo.expect_insert_submission().never();

        let mut form = feedback_form();
        form.remove("name");
        form.insert("email".into(), "anna.example.com".into());

        let outcome = pipeline(admission(), captcha, notifier, repo)
            .submit(
                &client(),
                SubmissionRequest {
                    target: SubmissionTarget::Feedback,
                    form,
                },
            )
            .await;

        let texts: Vec<String> = outcome.messages().into_iter().map(|m| m.text).collect();
        assert_eq!(
            texts,
            vec![
                "name: This field is required.",
                "email: Enter a valid email address.",
                "captcha: Invalid CAPTCHA.",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_captcha_is_a_field_error() {
        let mut captcha = MockCaptchaVerifier::new();
        captcha.expect_is_human_verified().never();
        let mut form = feedback_form();
        form.remove(CAPTCHA_FIELD);

        let outcome = pipeline(admission(), captcha, MockNotifier::new(), MockSubmissionRepo::new())
            .submit(
                &client(),
                SubmissionRequest {
                    target: SubmissionTarget::Feedback,
                    form,
                },
            )
            .await;

        assert_eq!(
            outcome,
            Outcome::Invalid {
                errors: vec![FieldError::new(CAPTCHA_FIELD, REQUIRED)]
            }
        );
    }

    #[tokio::test]
    async fn test_limited_short_circuits_everything() {
        let admission = admission();
        admission.admit(&client(), ActionClass::Feedback);
        admission.admit(&client(), ActionClass::Feedback);

        let mut captcha = MockCaptchaVerifier::new();
        let mut notifier = MockNotifier::new();
        let mut repo = MockSubmissionRepo::new();
        captcha.expect_is_human_verified().never();
        notifier.expect_enqueue().never();
        repo.expect_insert_submission().never();

        let outcome = pipeline(admission, captcha, notifier, repo)
            .submit(&client(), feedback_request())
            .await;

        assert!(matches!(outcome, Outcome::Limited { .. }));
        assert_eq!(
            outcome.messages()[0].text,
            "Too many requests. Please try again in 10 minutes."
        );
    }

    #[tokio::test]
    async fn test_invalid_attempts_use_up_the_window() {
        let admission = admission();
        let p = pipeline(
            admission,
            human(),
            MockNotifier::new(),
            MockSubmissionRepo::new(),
        );
        let empty = || SubmissionRequest {
            target: SubmissionTarget::Feedback,
            form: FormData::new(),
        };

        assert_eq!(p.submit(&client(), empty()).await.state(), "invalid");
        assert_eq!(p.submit(&client(), empty()).await.state(), "invalid");
        assert_eq!(p.submit(&client(), empty()).await.state(), "limited");
    }

    #[tokio::test]
    async fn test_comment_skips_captcha_and_uses_comment_template() {
        let post_id = Uuid::now_v7();
        let mut captcha = MockCaptchaVerifier::new();
        let mut notifier = MockNotifier::new();
        let mut repo = MockSubmissionRepo::new();
        captcha.expect_is_human_verified().never();
        notifier
            .expect_enqueue()
            .withf(|n| {
                n.subject == "New comment from ink_fan"
                    && n.body == "ink_fan commented on \"Aftercare\":\n\nSuper helpful"
            })
            .times(1)
            .returning(|_| Ok(()));
        let expected = Submission::Comment(Comment {
            post_id,
            parent_id: None,
            username: "ink_fan".into(),
            body: "Super helpful".into(),
        });
        repo.expect_insert_submission()
            .withf(move |s| *s == expected)
            .times(1)
            .returning(|_| Ok(Uuid::now_v7()));

        let form = [("username", "ink_fan"), ("body", "Super helpful")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let outcome = pipeline(admission(), captcha, notifier, repo)
            .submit(
                &client(),
                SubmissionRequest {
                    target: SubmissionTarget::Comment {
                        post_id,
                        post_title: "Aftercare".into(),
                        parent_id: None,
                    },
                    form,
                },
            )
            .await;

        assert!(outcome.is_persisted());
        assert_eq!(outcome.messages()[0].text, COMMENT_THANKS);
    }

    #[tokio::test]
    async fn test_storage_failure_after_notify() {
        let mut notifier = MockNotifier::new();
        let mut repo = MockSubmissionRepo::new();
        notifier.expect_enqueue().times(1).returning(|_| Ok(()));
        repo.expect_insert_submission()
            .times(1)
            .returning(|_| Err(AppError::Internal("disk I/O error".into())));

        let outcome = pipeline(admission(), human(), notifier, repo)
            .submit(&client(), feedback_request())
            .await;

        assert_eq!(outcome, Outcome::PersistFailed);
        assert_eq!(outcome.messages()[0].level, MessageLevel::Error);
    }

    #[test]
    fn test_feedback_notification_lists_contact_channels() {
        let submission = Submission::Feedback(Feedback {
            name: "Leo".into(),
            email: "leo@example.com".into(),
            message: "Cover-up please".into(),
            telegram: Some("@leo".into()),
            whatsapp: Some("+1 555 0100".into()),
        });
        let n = compose_notification(&submission, &SubmissionTarget::Feedback);
        assert_eq!(n.subject, "I want a tattoo - Leo");
        assert_eq!(
            n.body,
            "Cover-up please\nMy email: leo@example.com\nMy telegram: @leo\nMy whatsapp: +1 555 0100"
        );
    }

    #[test]
    fn test_limited_message_rounds_minutes_up() {
        let outcome = Outcome::Limited {
            retry_after: Duration::from_secs(61),
        };
        assert_eq!(
            outcome.messages()[0].text,
            "Too many requests. Please try again in 2 minutes."
        );
    }

    fn reply_request(post_id: Uuid, parent_id: Uuid) -> SubmissionRequest {
        SubmissionRequest {
            target: SubmissionTarget::Comment {
                post_id,
                post_title: "Aftercare".into(),
                parent_id: Some(parent_id),
            },
            form: [("username", "ink_fan"), ("body", "Same question here")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn silent() -> (MockNotifier, MockCaptchaVerifier) {
        let mut notifier = MockNotifier::new();
        let mut captcha = MockCaptchaVerifier::new();
        notifier.expect_enqueue().never();
        captcha.expect_is_human_verified().never();
        (notifier, captcha)
    }

    #[tokio::test]
    async fn test_reply_to_unknown_parent_is_invalid_before_notify() {
        let (notifier, captcha) = silent();
        let mut repo = MockSubmissionRepo::new();
        repo.expect_comment_post().times(1).returning(|_| Ok(None));
        repo.expect_insert_submission().never();

        let outcome = pipeline(admission(), captcha, notifier, repo)
            .submit(&client(), reply_request(Uuid::now_v7(), Uuid::now_v7()))
            .await;

        assert_eq!(
            outcome,
            Outcome::Invalid {
                errors: vec![FieldError::new(PARENT_FIELD, INVALID_PARENT)]
            }
        );
    }

    #[tokio::test]
    async fn test_reply_to_comment_of_another_post_is_invalid() {
        let (notifier, captcha) = silent();
        let other_post = Uuid::now_v7();
        let mut repo = MockSubmissionRepo::new();
        repo.expect_comment_post()
            .returning(move |_| Ok(Some(other_post)));
        repo.expect_insert_submission().never();

        let outcome = pipeline(admission(), captcha, notifier, repo)
            .submit(&client(), reply_request(Uuid::now_v7(), Uuid::now_v7()))
            .await;

        assert_eq!(outcome.state(), "invalid");
        assert_eq!(
            outcome.messages()[0].text,
            format!("{PARENT_FIELD}: {INVALID_PARENT}")
        );
    }

    #[tokio::test]
    async fn test_parent_and_field_errors_are_reported_together() {
        let (notifier, captcha) = silent();
        let mut repo = MockSubmissionRepo::new();
        repo.expect_comment_post().returning(|_| Ok(None));
        repo.expect_insert_submission().never();

        let mut request = reply_request(Uuid::now_v7(), Uuid::now_v7());
        request.form.remove("body");
        let outcome = pipeline(admission(), captcha, notifier, repo)
            .submit(&client(), request)
            .await;

        let fields: Vec<String> = match outcome {
            Outcome::Invalid { errors } => errors.into_iter().map(|e| e.field).collect(),
            other => panic!("unexpected outcome {other:?}"),
        };
        assert_eq!(fields, vec!["body", PARENT_FIELD]);
    }

    #[tokio::test]
    async fn test_reply_under_same_post_is_persisted() {
        let post_id = Uuid::now_v7();
        let parent_id = Uuid::now_v7();
        let mut seq = Sequence::new();
        let mut notifier = MockNotifier::new();
        let mut repo = MockSubmissionRepo::new();
        repo.expect_comment_post()
            .withf(move |id| *id == parent_id)
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| Ok(Some(post_id)));
        notifier
            .expect_enqueue()
            .withf(move |n| n.body.ends_with(&format!("In reply to comment {parent_id}")))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        repo.expect_insert_submission()
            .withf(move |s| matches!(s, Submission::Comment(c) if c.parent_id == Some(parent_id)))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(Uuid::now_v7()));

        let mut captcha = MockCaptchaVerifier::new();
        captcha.expect_is_human_verified().never();
        let outcome = pipeline(admission(), captcha, notifier, repo)
            .submit(&client(), reply_request(post_id, parent_id))
            .await;

        assert!(outcome.is_persisted());
    }

    #[tokio::test]
    async fn test_parent_lookup_failure_skips_notification() {
        let (notifier, captcha) = silent();
        let mut repo = MockSubmissionRepo::new();
        repo.expect_comment_post()
            .returning(|_| Err(AppError::Internal("database is locked".into())));
        repo.expect_insert_submission().never();

        let outcome = pipeline(admission(), captcha, notifier, repo)
            .submit(&client(), reply_request(Uuid::now_v7(), Uuid::now_v7()))
            .await;

        assert_eq!(outcome, Outcome::PersistFailed);
    }
}
