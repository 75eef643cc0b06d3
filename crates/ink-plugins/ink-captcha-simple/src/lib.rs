//! # ink-captcha-simple
//!
//! SHA-256 based implementation of `CaptchaVerifier`, meant for development
//! and small deployments. Rendering the challenge picture is left to whatever
//! serves the form; this crate only issues and checks tokens.
//!
//! [`SimpleCaptchaVerifier::challenge`] hands out `"<key>:<issued_at>"` where
//! `key = sha256(secret | issued_at | answer)`. The form posts back
//! `"<key>:<issued_at>:<answer>"`. A challenge is answerable once, until its
//! TTL runs out.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ink_core::traits::CaptchaVerifier;
use sha2::{Digest, Sha256};

pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);

/// Tolerated clock drift for challenges that claim to come from the future.
const MAX_SKEW_SECS: i64 = 60;

pub struct SimpleCaptchaVerifier {
    /// Server-side secret mixed into every key
    secret: String,
    ttl: Duration,
    /// Keys already answered, with the time they stop mattering.
    spent: DashMap<String, i64>,
}

impl SimpleCaptchaVerifier {
    /// Accepts a secret string (e.g., from configuration)
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.to_string(),
            ttl: DEFAULT_TTL,
            spent: DashMap::new(),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Token a challenge page embeds next to the picture of `answer`.
    pub fn challenge(&self, answer: &str) -> String {
        self.challenge_at(answer, Utc::now())
    }

    pub fn challenge_at(&self, answer: &str, issued: DateTime<Utc>) -> String {
        let issued_at = issued.timestamp();
        format!("{}:{issued_at}", self.key(issued_at, answer))
    }

    fn key(&self, issued_at: i64, answer: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(b"|");
        hasher.update(issued_at.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(normalize(answer).as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Checks `response` as of `now`, consuming the challenge on success.
    pub fn verify_at(&self, response: &str, now: DateTime<Utc>) -> bool {
        let mut parts = response.splitn(3, ':');
        let (Some(key), Some(issued_at), Some(answer)) = (parts.next(), parts.next(), parts.next())
        else {
            tracing::debug!("malformed captcha response");
            return false;
        };
        let Ok(issued_at) = issued_at.trim().parse::<i64>() else {
            tracing::debug!("captcha response with bad timestamp");
            return false;
        };
        if answer.trim().is_empty() {
            return false;
        }

        let now = now.timestamp();
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let age = now - issued_at;
        if age < -MAX_SKEW_SECS || age > ttl {
            tracing::debug!(age, "captcha challenge expired");
            return false;
        }

        let key = key.trim().to_ascii_lowercase();
        if self.key(issued_at, answer) != key {
            return false;
        }

        self.spent.retain(|_, until| *until >= now);
        match self.spent.entry(key) {
            Entry::Occupied(_) => {
                tracing::debug!("captcha challenge replayed");
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(issued_at.saturating_add(ttl));
                true
            }
        }
    }

    /// Challenges answered and not yet expired.
    pub fn spent_len(&self) -> usize {
        self.spent.len()
    }
}

/// Answers are case and surrounding-whitespace insensitive.
fn normalize(answer: &str) -> String {
    answer.trim().to_lowercase()
}

#[async_trait]
impl CaptchaVerifier for SimpleCaptchaVerifier {
    async fn is_human_verified(&self, response: &str) -> bool {
        self.verify_at(response, Utc::now())
    }
}
