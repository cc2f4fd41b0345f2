//! Error types for nixmon-core
//!
//! Probe and metadata failures are per-host and never abort a run; only a
//! settings failure is fatal to the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading and validating the settings file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Settings file could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Settings file is not valid TOML
    #[error("cannot parse settings: {0}")]
    Toml(#[from] toml::de::Error),

    /// A duration option has an unparseable value
    #[error("cannot parse {option}: {detail}")]
    BadDuration { option: &'static str, detail: String },

    /// The hosts table is malformed
    #[error("cannot parse {key}: {detail}")]
    BadHosts { key: String, detail: String },

    /// The hosts table is present but empty
    #[error("no hosts to query configured")]
    NoHosts,
}

/// Failure modes of a remote commit-metadata lookup.
///
/// `Clone` because a cached lookup result is observed by every host that
/// reported the same revision.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    /// The remote source does not know this revision (local-only or
    /// unpublished commit).
    #[error("revision not known upstream")]
    NotFound,

    /// The request exceeded the configured HTTP timeout.
    #[error("metadata request timed out")]
    Timeout,

    /// Network failure or 5xx-class response.
    #[error("transient metadata failure: {0}")]
    Transient(String),
}

/// Errors delivering the coalesced notification.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// notify-send could not be started
    #[error("cannot start notify-send: {0}")]
    Spawn(#[from] std::io::Error),

    /// notify-send ran but reported failure
    #[error("notify-send exited with {0}")]
    Delivery(std::process::ExitStatus),
}
