//! Output formatting for CLI

use kino_collector::{ReplayReport, Transition, TransitionRecord};
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format options
pub enum OutputFormat {
    Text,
    Json,
    Table,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "table" => OutputFormat::Table,
            _ => OutputFormat::Text,
        }
    }
}

/// Pretty JSON, falling back to an empty object
pub fn to_json<T: Serialize>(data: &T) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
}

#[derive(Tabled)]
struct TransitionRow {
    #[tabled(rename = "Time (ms)")]
    timestamp: u64,
    #[tabled(rename = "Event")]
    event: String,
    #[tabled(rename = "From")]
    from: String,
    #[tabled(rename = "To")]
    to: String,
}

impl From<&TransitionRecord> for TransitionRow {
    fn from(record: &TransitionRecord) -> Self {
        Self {
            timestamp: record.timestamp,
            event: record.event.to_string(),
            from: record.from.to_string(),
            to: record.to.to_string(),
        }
    }
}

#[derive(Tabled)]
struct SliceRow {
    #[tabled(rename = "Callback")]
    name: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Duration (ms)")]
    duration: String,
}

#[derive(Tabled)]
struct EdgeRow {
    #[tabled(rename = "From")]
    from: String,
    #[tabled(rename = "Trigger")]
    trigger: String,
    #[tabled(rename = "To")]
    to: String,
}

/// Render a replay report
pub fn replay_report(report: &ReplayReport, format: &str) -> String {
    match OutputFormat::from(format) {
        OutputFormat::Json => to_json(report),
        OutputFormat::Table => {
            let transitions: Vec<TransitionRow> =
                report.transitions.iter().map(TransitionRow::from).collect();
            let slices: Vec<SliceRow> = report
                .callbacks
                .iter()
                .filter_map(|c| {
                    c.duration_ms.map(|d| SliceRow {
                        name: c.name.to_string(),
                        state: c.state.map(|s| s.to_string()).unwrap_or_default(),
                        duration: d.to_string(),
                    })
                })
                .collect();

            format!(
                "{}\n\n{}\n\nFinal state: {}  Ignored: {}",
                Table::new(transitions).with(Style::modern()),
                Table::new(slices).with(Style::modern()),
                report.final_state,
                report.ignored
            )
        }
        OutputFormat::Text => {
            let mut out = format!("Replay ({} profile)\n", report.profile);
            for t in &report.transitions {
                out.push_str(&format!(
                    "  {:>8}  {:<26} {} -> {}\n",
                    t.timestamp, t.event, t.from, t.to
                ));
            }
            out.push_str("\nSlices:\n");
            for c in &report.callbacks {
                if let Some(d) = c.duration_ms {
                    out.push_str(&format!("  {:<26} {} ms\n", c.name, d));
                }
            }
            out.push_str(&format!(
                "\nFinal state: {}\nIgnored events: {}",
                report.final_state, report.ignored
            ));
            out
        }
    }
}

/// Render the edges of a transition table
pub fn transition_table(profile: &str, edges: &[Transition], format: &str) -> String {
    match OutputFormat::from(format) {
        OutputFormat::Json => to_json(&edges),
        OutputFormat::Table => {
            let rows: Vec<EdgeRow> = edges
                .iter()
                .map(|e| EdgeRow {
                    from: e.from.to_string(),
                    trigger: e.trigger.to_string(),
                    to: e.to.to_string(),
                })
                .collect();
            Table::new(rows).with(Style::modern()).to_string()
        }
        OutputFormat::Text => {
            let mut out =
                format!("Transition table ({} profile, {} edges)\n", profile, edges.len());
            for e in edges {
                out.push_str(&format!("  {:<26} --{}--> {}\n", e.from, e.trigger, e.to));
            }
            out
        }
    }
}
