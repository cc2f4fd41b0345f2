//! Settings file loading and validation.
//!
//! The settings file is TOML. Duration options accept either a number of
//! seconds or a string of `<N><unit>` terms, e.g. `"1w 2d"`:
//!
//! ```toml
//! max_time_since_update = "1w"
//! nixos_version_timeout = 30
//! http_timeout = "30s"
//!
//! [hosts.localhost]
//! argv = ["nixos-version", "--revision"]
//!
//! [hosts.builder]
//! argv = ["ssh", "builder", "nixos-version", "--revision"]
//! ```
//!
//! Host declaration order is preserved; the final report renders hosts in
//! the order they appear here.

use std::path::Path;
use std::time::Duration;

use regex::Regex;
use toml::Value;

use crate::error::ConfigError;

const DEFAULT_MAX_TIME_SINCE_UPDATE: Duration = Duration::from_secs(7 * 24 * 60 * 60);
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// How to obtain one host's current revision: a command argv, executed
/// locally (typically `ssh somewhere nixos-version --revision`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub argv: Vec<String>,
}

/// Parsed monitor settings.
///
/// The duration fields stay `Option` at the API level (absent = unbounded
/// wait / never stale), but [`Settings::load`] substitutes the defaults
/// below for keys missing from the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Revisions older than this are reported as stale.
    pub max_time_since_update: Option<Duration>,
    /// Per-host probe command timeout.
    pub nixos_version_timeout: Option<Duration>,
    /// Per-request timeout for commit-metadata lookups.
    pub http_timeout: Option<Duration>,
    /// Hosts in declaration order.
    pub hosts: Vec<(String, HostConfig)>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            max_time_since_update: Some(DEFAULT_MAX_TIME_SINCE_UPDATE),
            nixos_version_timeout: Some(DEFAULT_PROBE_TIMEOUT),
            http_timeout: Some(DEFAULT_HTTP_TIMEOUT),
            hosts: vec![default_localhost()],
        }
    }
}

/// Default host list when the file has no `hosts` table: probe the local
/// machine for the nixpkgs revision it was built from.
fn default_localhost() -> (String, HostConfig) {
    (
        "localhost".to_string(),
        HostConfig {
            argv: vec!["nixos-version".to_string(), "--revision".to_string()],
        },
    )
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> Result<Settings, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Settings::from_toml_str(&text)
    }

    /// Parse settings from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Settings, ConfigError> {
        let raw: toml::Table = toml::from_str(text)?;
        let mut settings = Settings::default();

        if let Some(value) = raw.get("max_time_since_update") {
            settings.max_time_since_update =
                Some(parse_duration_value("max_time_since_update", value)?);
        }
        if let Some(value) = raw.get("nixos_version_timeout") {
            settings.nixos_version_timeout =
                Some(parse_duration_value("nixos_version_timeout", value)?);
        }
        if let Some(value) = raw.get("http_timeout") {
            settings.http_timeout = Some(parse_duration_value("http_timeout", value)?);
        }

        if let Some(raw_hosts) = raw.get("hosts") {
            settings.hosts = parse_hosts(raw_hosts)?;
        }

        Ok(settings)
    }
}

fn parse_hosts(raw_hosts: &Value) -> Result<Vec<(String, HostConfig)>, ConfigError> {
    let table = raw_hosts.as_table().ok_or_else(|| ConfigError::BadHosts {
        key: "hosts".to_string(),
        detail: format!("expected a table, not {}", raw_hosts.type_str()),
    })?;

    let mut hosts = Vec::with_capacity(table.len());
    for (name, raw_host) in table {
        let argv = raw_host
            .get("argv")
            .ok_or_else(|| ConfigError::BadHosts {
                key: format!("hosts.{name}"),
                detail: "missing option argv".to_string(),
            })?;
        let items = argv.as_array().ok_or_else(|| bad_argv(name, argv))?;
        let argv: Vec<String> = items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect::<Option<_>>()
            .ok_or_else(|| bad_argv(name, argv))?;
        if argv.is_empty() {
            return Err(ConfigError::BadHosts {
                key: format!("hosts.{name}.argv"),
                detail: "argv must not be empty".to_string(),
            });
        }
        hosts.push((name.clone(), HostConfig { argv }));
    }

    if hosts.is_empty() {
        return Err(ConfigError::NoHosts);
    }
    Ok(hosts)
}

fn bad_argv(host: &str, value: &Value) -> ConfigError {
    ConfigError::BadHosts {
        key: format!("hosts.{host}.argv"),
        detail: format!("expected a list of strings, not {}", value.type_str()),
    }
}

fn parse_duration_value(option: &'static str, value: &Value) -> Result<Duration, ConfigError> {
    match value {
        Value::Integer(n) => {
            if *n < 0 {
                return Err(ConfigError::BadDuration {
                    option,
                    detail: format!("{n} is less than zero"),
                });
            }
            Ok(Duration::from_secs(*n as u64))
        }
        Value::Float(f) => {
            if !f.is_finite() || *f < 0.0 {
                return Err(ConfigError::BadDuration {
                    option,
                    detail: format!("{f} is not a non-negative number of seconds"),
                });
            }
            Ok(Duration::from_secs_f64(*f))
        }
        Value::String(s) => parse_duration_str(option, s),
        other => Err(ConfigError::BadDuration {
            option,
            detail: format!("unexpected type {}", other.type_str()),
        }),
    }
}

/// Parse durations like `"1w 2d 3m 4s"`.
///
/// Units spell out progressively: `w`, `week`, `weeks`, `d`, `day`, `days`,
/// `m`, `min`, `minute`, `minutes`, `s`, `sec`, `second`, `seconds`.
/// Repeated units accumulate.
fn parse_duration_str(option: &'static str, input: &str) -> Result<Duration, ConfigError> {
    let pattern = Regex::new(
        r"(?x)
        (?P<int>\d+)
        (?P<unit>
            w(?:eek s?)? |
            d(?:ay s?)? |
            m(?:in(?:ute s?)?)? |
            s(?:ec(?:ond s?)?)?
        )
        | (?P<white>\s+)
        | (?P<error>.)
        ",
    )
    .expect("static duration grammar");

    let overflow = || ConfigError::BadDuration {
        option,
        detail: format!("duration out of range: {input:?}"),
    };

    let mut total_secs: u64 = 0;
    for caps in pattern.captures_iter(input) {
        if caps.name("error").is_some() {
            return Err(ConfigError::BadDuration {
                option,
                detail: format!(
                    "expected terms like \"1w 2d 3m 4s\" (weeks/days/minutes/seconds), \
                     not {input:?}"
                ),
            });
        }
        if caps.name("white").is_some() {
            continue;
        }
        let amount: u64 = caps["int"].parse().map_err(|_| overflow())?;
        let scale: u64 = match &caps["unit"][..1] {
            "w" => 7 * 24 * 60 * 60,
            "d" => 24 * 60 * 60,
            "m" => 60,
            _ => 1,
        };
        total_secs = amount
            .checked_mul(scale)
            .and_then(|term| total_secs.checked_add(term))
            .ok_or_else(overflow)?;
    }

    Ok(Duration::from_secs(total_secs))
}
