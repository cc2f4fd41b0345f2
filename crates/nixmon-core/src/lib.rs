//! nixmon-core - revision-freshness monitoring for NixOS fleets
//!
//! One run: probe every configured host for the nixpkgs revision it was
//! built from, resolve each distinct revision to a commit date (once, via a
//! single-flight cache), classify each host as fresh, stale, or unknown,
//! and fold the verdicts into a single coalesced notification.
//!
//! Runs are independent; nothing is persisted between them. The external
//! scheduler that invokes the monitor owns re-run cadence and therefore
//! notification de-duplication across runs.

pub mod config;
pub mod error;
pub mod evaluate;
pub mod metadata;
pub mod notify;
pub mod policy;
pub mod probe;
pub mod report;
pub mod telemetry;

pub use config::{HostConfig, Settings};
pub use error::{ConfigError, MetadataError, NotifyError};
pub use evaluate::{evaluate_hosts, Classification, HostVerdict};
pub use metadata::{GithubCommits, RevisionCache, RevisionInfo, RevisionLookup};
pub use notify::{Notifier, NotifySendNotifier};
pub use policy::{classify, Freshness};
pub use probe::{fetch_revision, ProbeOutcome};
pub use report::{build_report, format_age, RunReport, NOTIFICATION_TITLE};
pub use telemetry::init_tracing;
