//! # Slug resolution
//!
//! Turns a post title into a URL slug and picks the first free variant:
//! `my-post`, then `my-post-1`, `my-post-2`, ...
//!
//! Resolution is check-then-insert and is not atomic. Two writers resolving
//! the same title at once can both pick the same slug; the storage layer's
//! unique constraint catches that and [`crate::publishing`] retries.

/// Used when a title has no alphanumeric characters at all.
pub const FALLBACK_SLUG: &str = "untitled";

/// Lower-cases the title and collapses every run of whitespace or
/// punctuation into a single hyphen.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for ch in title.chars() {
        if ch.is_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// Endless sequence of slug candidates for one base.
#[derive(Debug, Clone)]
pub struct SlugCandidates {
    base: String,
    counter: u32,
}

impl SlugCandidates {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            counter: 0,
        }
    }

    /// Starts at `base-<counter>` instead of the bare base.
    pub fn starting_at(base: impl Into<String>, counter: u32) -> Self {
        Self {
            base: base.into(),
            counter,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Counter of the next candidate this iterator will yield.
    pub fn counter(&self) -> u32 {
        self.counter
    }
}

impl Iterator for SlugCandidates {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let candidate = if self.counter == 0 {
            self.base.clone()
        } else {
            format!("{}-{}", self.base, self.counter)
        };
        self.counter = self.counter.saturating_add(1);
        Some(candidate)
    }
}

/// Returns the first candidate for `candidate_title` that `is_taken` rejects.
pub fn assign<F>(candidate_title: &str, mut is_taken: F) -> String
where
    F: FnMut(&str) -> bool,
{
    SlugCandidates::new(slugify(candidate_title))
        .find(|slug| !is_taken(slug))
        .unwrap_or_else(|| FALLBACK_SLUG.to_string())
}
