//! Staleness policy: pure classification of a commit date against the
//! configured maximum age.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Outcome of the staleness decision for a resolvable revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh(Duration),
    Stale(Duration),
}

impl Freshness {
    /// The revision's age at classification time.
    pub fn age(&self) -> Duration {
        match self {
            Freshness::Fresh(age) | Freshness::Stale(age) => *age,
        }
    }
}

/// Classify a commit date.
///
/// * `max_age` of `None` means staleness is not enforced: every resolvable
///   revision is fresh and the monitor only checks that revisions can be
///   determined at all.
/// * `age > max_age` is stale; `age == max_age` is still fresh.
/// * A commit date in the future (clock skew) clamps to `Fresh(0)`.
pub fn classify(
    committed_at: DateTime<Utc>,
    now: DateTime<Utc>,
    max_age: Option<Duration>,
) -> Freshness {
    let age = match (now - committed_at).to_std() {
        Ok(age) => age,
        // Negative age: committed_at is ahead of our clock.
        Err(_) => return Freshness::Fresh(Duration::ZERO),
    };

    match max_age {
        Some(limit) if age > limit => Freshness::Stale(age),
        _ => Freshness::Fresh(age),
    }
}
