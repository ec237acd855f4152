//! The `status` command: show configured environments.

use console::style;
use serde_json::json;

use crate::cli::args::{Cli, StatusArgs};
use crate::config;
use crate::error::Result;
use crate::registry::{ConfigRegistry, ConnectionTarget, EnvironmentRegistry};

pub fn run(args: &StatusArgs, global: &Cli) -> Result<i32> {
    let (config, _) = config::resolve(global.config.as_deref())?;
    let registry = ConfigRegistry::from_config(&config)?;
    let environments = registry.environments();

    if args.json {
        let entries: Vec<_> = environments
            .iter()
            .map(|env| match env.target() {
                ConnectionTarget::Local => json!({
                    "name": env.name(),
                    "remote": false,
                }),
                ConnectionTarget::Ssh {
                    host, port, user, ..
                } => json!({
                    "name": env.name(),
                    "remote": true,
                    "host": host,
                    "port": port,
                    "user": user,
                }),
            })
            .collect();
        let rendered = serde_json::to_string_pretty(&entries).map_err(anyhow::Error::from)?;
        println!("{}", rendered);
        return Ok(0);
    }

    if environments.is_empty() {
        println!("No environments configured.");
        return Ok(0);
    }

    println!(
        "Required package: {} >= {}",
        style(&config.package.name).bold(),
        config.package.min_version
    );
    for env in &environments {
        match env.target() {
            ConnectionTarget::Local => {
                println!("  {:20} {}", env.name(), style("local").dim());
            }
            ConnectionTarget::Ssh {
                host, port, user, ..
            } => {
                println!(
                    "  {:20} {}",
                    env.name(),
                    style(format!("{}@{}:{}", user, host, port)).cyan()
                );
            }
        }
    }

    Ok(0)
}
