//! The `cel show status` command.

use crate::engine::CelEngine;

/// Usage text for `cel show status`.
pub const STATUS_USAGE: &str = "Usage: cel show status\n       Displays the Channel Event Logging system status.\n";

/// Result of running a CLI command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliOutcome {
    /// The command succeeded; print this output
    Output(String),
    /// The command was invoked incorrectly; print this usage text
    ShowUsage(&'static str),
}

impl CliOutcome {
    /// Process exit code for this outcome: 0 on success, 2 on usage error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliOutcome::Output(_) => 0,
            CliOutcome::ShowUsage(_) => 2,
        }
    }
}

/// Run `cel show status`.
///
/// `extra_args` are any words after the command; the command takes none,
/// so anything there is a usage error.
pub fn show_status(engine: &CelEngine, extra_args: &[&str]) -> CliOutcome {
    if !extra_args.is_empty() {
        return CliOutcome::ShowUsage(STATUS_USAGE);
    }

    let status = engine.status();
    let mut out = String::new();

    out.push_str(&format!(
        "CEL Logging: {}\n",
        if status.enabled { "Enabled" } else { "Disabled" }
    ));

    if !status.enabled {
        return CliOutcome::Output(out);
    }

    for event in &status.tracked_events {
        out.push_str(&format!("CEL Tracking Event: {}\n", event));
    }
    for app in &status.tracked_apps {
        out.push_str(&format!("CEL Tracking Application: {}\n", app));
    }
    for backend in &status.backends {
        out.push_str(&format!("CEL Event Subscriber: {}\n", backend));
    }

    CliOutcome::Output(out)
}
