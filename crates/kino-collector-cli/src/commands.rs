//! CLI command implementations

use crate::output;
use anyhow::Context;
use kino_collector::{
    CollectorConfig, EventLog, HttpTransport, LicenseRequest, MachineProfile, ReplayReport,
    Transport,
};
use std::path::Path;
use tracing::{debug, info};
use url::Url;

fn profile_by_name(name: &str) -> anyhow::Result<MachineProfile> {
    MachineProfile::by_name(name)
        .with_context(|| format!("unknown profile '{}' (expected full or html5)", name))
}

/// Replay a log file. The profile comes from the flag, then from the log
/// itself, then defaults to `full`.
fn replay_file(log: &Path, profile: Option<&str>) -> anyhow::Result<ReplayReport> {
    let log_file = EventLog::from_file(log)
        .with_context(|| format!("reading event log {}", log.display()))?;
    let profile = profile_by_name(
        profile
            .or(log_file.profile.as_deref())
            .unwrap_or("full"),
    )?;
    info!(events = log_file.events.len(), profile = profile.name, "Replaying event log");

    let report = kino_collector::replay(profile, &log_file.events);
    debug!(transitions = report.transitions.len(), ignored = report.ignored, "Replay finished");
    Ok(report)
}

/// Replay a recorded event log
pub fn replay(log: &Path, profile: Option<&str>, format: &str) -> anyhow::Result<()> {
    let report = replay_file(log, profile)?;
    println!("{}", output::replay_report(&report, format));
    Ok(())
}

/// Print the transition table of a profile
pub fn table(profile: &str, format: &str) -> anyhow::Result<()> {
    let profile = profile_by_name(profile)?;
    let edges = profile.table.transitions();
    println!("{}", output::transition_table(profile.name, &edges, format));
    Ok(())
}

/// Check a license key against the backend. A denial is an error.
pub async fn check_license(
    key: &str,
    domain: &str,
    backend: Option<&str>,
    format: &str,
) -> anyhow::Result<()> {
    let mut config = CollectorConfig::new(key, domain);
    if let Some(backend) = backend {
        config.backend_url = Url::parse(backend)?;
    }
    config.validate()?;

    let transport = HttpTransport::new(&config)?;
    info!(url = %transport.licensing_url(), "Checking license");
    let response = transport
        .check_license(&LicenseRequest::new(key, domain))
        .await?;

    match output::OutputFormat::from(format) {
        output::OutputFormat::Json => println!("{}", output::to_json(&response)),
        output::OutputFormat::Text | output::OutputFormat::Table => {
            println!("License: {:?}", response.status);
            if let Some(message) = &response.message {
                println!("  {}", message);
            }
        }
    }

    response.ensure_granted()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kino_collector::State;
    use std::path::PathBuf;

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../kino-collector/tests/fixtures")
            .join(name)
    }

    #[test]
    fn test_replay_recorded_fixture() {
        let report = replay_file(&fixture("full_profile_session.json"), None).unwrap();

        assert_eq!(report.profile, "full");
        assert_eq!(report.transitions.len(), 20);
        assert_eq!(report.ignored, 1);
        assert_eq!(report.final_state, State::End);
    }

    #[test]
    fn test_profile_taken_from_log() {
        let report = replay_file(&fixture("html5_profile_session.json"), None).unwrap();
        assert_eq!(report.profile, "html5");
        assert_eq!(report.transitions.len(), 16);
    }

    #[test]
    fn test_profile_flag_overrides_log() {
        let report =
            replay_file(&fixture("html5_profile_session.json"), Some("full")).unwrap();
        assert_eq!(report.profile, "full");
    }

    #[test]
    fn test_unknown_profile_is_rejected() {
        let err = replay_file(&fixture("full_profile_session.json"), Some("flash")).unwrap_err();
        assert!(err.to_string().contains("unknown profile"));
    }

    #[test]
    fn test_missing_log_is_reported() {
        let err = replay_file(&fixture("absent.json"), None).unwrap_err();
        assert!(err.to_string().contains("reading event log"));
    }
}
