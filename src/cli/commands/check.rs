//! The `check` command: run the full provisioning flow.

use std::sync::Arc;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::checker::{CheckOutcome, CheckReport, Checker};
use crate::cli::args::{CheckArgs, Cli};
use crate::config;
use crate::error::Result;
use crate::package::PackageRequirement;
use crate::registry::ConfigRegistry;
use crate::transport::ssh::SshChannelFactory;
use crate::validity::ValidityTracker;

pub fn run(args: &CheckArgs, global: &Cli) -> Result<i32> {
    let (config, path) = config::resolve(global.config.as_deref())?;
    if global.verbose {
        println!("Using config {}", path.display());
    }

    let requirement = PackageRequirement::from_config(&config.package)?;
    let payload = requirement.payload.resolve()?;
    tracing::debug!(
        "payload {} ({} bytes, sha256 {})",
        payload.file_name,
        payload.bytes.len(),
        payload.digest()
    );

    let registry = Arc::new(ConfigRegistry::from_config(&config)?);
    let factory = Arc::new(SshChannelFactory::new(config.settings.connect_timeout()));
    let tracker = Arc::new(ValidityTracker::new());
    let checker = Checker::new(registry, factory, requirement, payload, tracker);

    let spinner = if global.quiet {
        None
    } else {
        let spinner = ProgressBar::new_spinner()
            .with_style(
                ProgressStyle::with_template("{spinner} {msg}").expect("spinner template"),
            )
            .with_message("Checking remote environments...");
        spinner.enable_steady_tick(Duration::from_millis(80));
        Some(spinner)
    };

    let result = match &args.env {
        Some(name) => checker.check_named(name).map(|report| vec![report]),
        None => Ok(checker.check_all()),
    };

    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let reports = result?;

    if !global.quiet {
        if reports.is_empty() {
            println!("No remote environments configured.");
        }
        for report in &reports {
            print_report(report);
        }
    }

    let failed = reports.iter().any(|r| r.outcome.is_failure());
    Ok(if failed { 1 } else { 0 })
}

fn print_report(report: &CheckReport) {
    let (icon, text) = match report.outcome {
        CheckOutcome::PresenceConfirmed | CheckOutcome::Installed => (
            style("ok").green().to_string(),
            style(report.outcome.to_string()).green().to_string(),
        ),
        CheckOutcome::InstallFailed => (
            style("!!").red().bold().to_string(),
            style(report.outcome.to_string()).red().to_string(),
        ),
        CheckOutcome::ConnectFailed | CheckOutcome::DetectFailed | CheckOutcome::Skipped => (
            style("??").yellow().to_string(),
            style(report.outcome.to_string()).yellow().to_string(),
        ),
    };
    println!("  {} {:20} {}", icon, report.name, text);
}
