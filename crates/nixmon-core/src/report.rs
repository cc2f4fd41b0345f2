//! Report builder: fold per-host verdicts into one coalesced notification.
//!
//! Pure aggregation, no I/O. Fresh hosts are omitted from the body so the
//! notification only carries what needs acting on; an all-fresh run
//! produces no notification at all.

use std::time::Duration;

use crate::evaluate::{Classification, HostVerdict};

/// Notification title used for every non-empty report.
pub const NOTIFICATION_TITLE: &str = "Some NixOS systems are out of date";

/// Aggregated outcome of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// All verdicts, in host declaration order.
    pub verdicts: Vec<HostVerdict>,
    /// True iff at least one host is stale or unknown.
    pub should_notify: bool,
    /// One line per non-fresh host: `name: <age or reason>`.
    pub summary_text: String,
}

/// Build the run report from ordered verdicts.
pub fn build_report(verdicts: Vec<HostVerdict>) -> RunReport {
    let mut lines = Vec::new();
    for verdict in &verdicts {
        match &verdict.classification {
            Classification::Fresh(_) => {}
            Classification::Stale(age) => {
                lines.push(format!("{}: {} behind", verdict.host, format_age(*age)));
            }
            Classification::Unknown(reason) => {
                lines.push(format!("{}: {reason}", verdict.host));
            }
        }
    }

    RunReport {
        verdicts,
        should_notify: !lines.is_empty(),
        summary_text: lines.join("\n"),
    }
}

/// Render an age at the coarsest sensible granularity.
pub fn format_age(age: Duration) -> String {
    const MINUTE: u64 = 60;
    const HOUR: u64 = 60 * MINUTE;
    const DAY: u64 = 24 * HOUR;

    let secs = age.as_secs();
    if secs >= DAY {
        plural(secs / DAY, "day")
    } else if secs >= HOUR {
        plural(secs / HOUR, "hour")
    } else if secs >= MINUTE {
        plural(secs / MINUTE, "minute")
    } else {
        plural(secs, "second")
    }
}

fn plural(amount: u64, unit: &str) -> String {
    if amount == 1 {
        format!("1 {unit}")
    } else {
        format!("{amount} {unit}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluate::{REASON_NO_REVISION, REASON_PROBE_TIMEOUT};

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn verdict(host: &str, classification: Classification) -> HostVerdict {
        HostVerdict {
            host: host.to_string(),
            classification,
            revision: None,
        }
    }

    #[test]
    fn test_all_fresh_suppresses_notification() {
        let report = build_report(vec![
            verdict("a", Classification::Fresh(DAY)),
            verdict("b", Classification::Fresh(2 * DAY)),
        ]);
        assert!(!report.should_notify);
        assert!(report.summary_text.is_empty());
    }

    #[test]
    fn test_single_stale_host_notifies() {
        let report = build_report(vec![
            verdict("a", Classification::Fresh(DAY)),
            verdict("b", Classification::Stale(10 * DAY)),
        ]);
        assert!(report.should_notify);
        assert_eq!(report.summary_text, "b: 10 days behind");
    }

    #[test]
    fn test_single_unknown_host_notifies() {
        let report = build_report(vec![verdict(
            "a",
            Classification::Unknown(REASON_NO_REVISION),
        )]);
        assert!(report.should_notify);
        assert_eq!(report.summary_text, "a: could not determine revision");
    }

    #[test]
    fn test_summary_lists_exactly_the_non_fresh_hosts_in_order() {
        let report = build_report(vec![
            verdict("one", Classification::Stale(8 * DAY)),
            verdict("two", Classification::Fresh(DAY)),
            verdict("three", Classification::Unknown(REASON_PROBE_TIMEOUT)),
        ]);
        assert_eq!(
            report.summary_text,
            "one: 8 days behind\nthree: host did not respond in time"
        );
    }

    #[test]
    fn test_verdicts_survive_aggregation() {
        let verdicts = vec![
            verdict("a", Classification::Fresh(DAY)),
            verdict("b", Classification::Stale(9 * DAY)),
        ];
        let report = build_report(verdicts.clone());
        assert_eq!(report.verdicts, verdicts);
    }

    #[test]
    fn test_format_age_granularity() {
        assert_eq!(format_age(Duration::from_secs(10)), "10 seconds");
        assert_eq!(format_age(Duration::from_secs(61)), "1 minute");
        assert_eq!(format_age(Duration::from_secs(2 * 60 * 60)), "2 hours");
        assert_eq!(format_age(10 * DAY), "10 days");
        assert_eq!(format_age(DAY), "1 day");
    }
}
