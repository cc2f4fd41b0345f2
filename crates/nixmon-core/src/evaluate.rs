//! Host evaluator: one independent pipeline per host, fanned out
//! concurrently, collected back into declaration order.
//!
//! Each host runs probe → cached metadata lookup → staleness policy in its
//! own task; a hung or failing host never delays the others. Results carry
//! their declaration index and are reordered before the report is built, so
//! completion timing never shows through in the output.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::error::MetadataError;
use crate::metadata::{RevisionCache, RevisionLookup};
use crate::policy::{classify, Freshness};
use crate::probe::{fetch_revision, ProbeOutcome};

/// Reason strings surfaced in the notification body for hosts that could
/// not be classified.
pub const REASON_NOT_RECOGNIZED: &str = "revision not recognized";
pub const REASON_LOOKUP_FAILED: &str = "metadata lookup failed";
pub const REASON_PROBE_TIMEOUT: &str = "host did not respond in time";
pub const REASON_NO_REVISION: &str = "could not determine revision";

/// Terminal classification for one host in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Fresh(Duration),
    Stale(Duration),
    Unknown(&'static str),
}

/// One host's final verdict for the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostVerdict {
    pub host: String,
    pub classification: Classification,
    /// The revision the host reported, when the probe got that far.
    pub revision: Option<String>,
}

/// Evaluate every configured host concurrently.
///
/// Returns exactly one verdict per host, in declaration order.
pub async fn evaluate_hosts<L>(
    settings: &Settings,
    cache: Arc<RevisionCache<L>>,
) -> Vec<HostVerdict>
where
    L: RevisionLookup + 'static,
{
    let mut tasks = Vec::with_capacity(settings.hosts.len());
    for (index, (name, host)) in settings.hosts.iter().enumerate() {
        let cache = Arc::clone(&cache);
        let name = name.clone();
        let argv = host.argv.clone();
        let probe_timeout = settings.nixos_version_timeout;
        let max_age = settings.max_time_since_update;
        tasks.push(tokio::spawn(async move {
            let verdict = evaluate_host(&name, &argv, probe_timeout, max_age, &cache).await;
            (index, verdict)
        }));
    }

    let mut slots: Vec<Option<HostVerdict>> = vec![None; settings.hosts.len()];
    for (position, joined) in join_all(tasks).await.into_iter().enumerate() {
        match joined {
            Ok((index, verdict)) => slots[index] = Some(verdict),
            // A panicked task still yields a verdict for its host.
            Err(err) => {
                let host = settings.hosts[position].0.clone();
                warn!(%host, "host evaluation task failed: {err}");
                slots[position] = Some(HostVerdict {
                    host,
                    classification: Classification::Unknown(REASON_NO_REVISION),
                    revision: None,
                });
            }
        }
    }

    slots.into_iter().flatten().collect()
}

async fn evaluate_host<L: RevisionLookup>(
    name: &str,
    argv: &[String],
    probe_timeout: Option<Duration>,
    max_age: Option<Duration>,
    cache: &RevisionCache<L>,
) -> HostVerdict {
    match fetch_revision(argv, probe_timeout).await {
        ProbeOutcome::Revision(revision) => match cache.resolve(&revision).await {
            Ok(info) => {
                let classification = match classify(info.committed_at, Utc::now(), max_age) {
                    Freshness::Fresh(age) => Classification::Fresh(age),
                    Freshness::Stale(age) => Classification::Stale(age),
                };
                debug!(host = %name, %revision, ?classification, "host classified");
                HostVerdict {
                    host: name.to_string(),
                    classification,
                    revision: Some(revision),
                }
            }
            Err(MetadataError::NotFound) => {
                warn!(host = %name, %revision, "revision not known upstream");
                HostVerdict {
                    host: name.to_string(),
                    classification: Classification::Unknown(REASON_NOT_RECOGNIZED),
                    revision: Some(revision),
                }
            }
            Err(err) => {
                warn!(host = %name, %revision, "metadata lookup failed: {err}");
                HostVerdict {
                    host: name.to_string(),
                    classification: Classification::Unknown(REASON_LOOKUP_FAILED),
                    revision: Some(revision),
                }
            }
        },
        ProbeOutcome::TimedOut => {
            warn!(host = %name, "probe timed out");
            HostVerdict {
                host: name.to_string(),
                classification: Classification::Unknown(REASON_PROBE_TIMEOUT),
                revision: None,
            }
        }
        ProbeOutcome::ExecutionFailed(detail) => {
            warn!(host = %name, "probe failed: {detail}");
            HostVerdict {
                host: name.to_string(),
                classification: Classification::Unknown(REASON_NO_REVISION),
                revision: None,
            }
        }
        ProbeOutcome::MalformedOutput => {
            warn!(host = %name, "probe produced no revision");
            HostVerdict {
                host: name.to_string(),
                classification: Classification::Unknown(REASON_NO_REVISION),
                revision: None,
            }
        }
    }
}
