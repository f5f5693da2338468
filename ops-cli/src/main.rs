use anyhow::Result;
use auth_permissions::{ActionName, CascadeDecision, PermissionContext, PermissionsConfig, ResourceType};
use clap::{Parser, Subcommand};
use colored::*;
use ops_cli::{
    commands::{self, CheckRequest},
    fixture::Fixture,
    parse_entity_ref,
};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// HyperIoT permission engine operations tool
#[derive(Parser, Debug)]
#[command(name = "hyperiot-perms")]
#[command(about = "Inspect and exercise the HyperIoT authorization engine")]
struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print reports and logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the action registry
    Actions,

    /// Print the default role's permission sets
    Policy,

    /// Evaluate one authorization decision against a fixture
    Check {
        #[arg(short, long)]
        fixture: PathBuf,

        #[arg(short, long)]
        principal: u64,

        #[arg(short, long)]
        resource: String,

        #[arg(short, long)]
        action: String,

        /// Target entity as <Type>:<id>
        #[arg(short, long)]
        entity: Option<String>,
    },

    /// Evaluate a cascade from a fixture root
    Cascade {
        #[arg(short, long)]
        fixture: PathBuf,

        #[arg(short, long)]
        principal: u64,

        #[arg(short, long, default_value = "remove")]
        action: String,

        /// Root entity as <Type>:<id>
        #[arg(short, long)]
        root: String,

        /// Run the removal pass when the cascade is allowed
        #[arg(long)]
        apply: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = PermissionsConfig::load(args.config.as_deref())?;

    init_tracing(&config, args.verbose, args.json);
    debug!(?args, "Arguments parsed");

    let context = PermissionContext::bootstrap(&config)?;

    match args.command {
        Command::Actions => {
            let rows = commands::actions(&context)?;
            emit(args.json, &rows, || {
                for row in &rows {
                    println!(
                        "{:<12} {:<24} bit {:>2}  mask {:>10}",
                        row.resource_type.to_string().bright_cyan(),
                        row.action.to_string(),
                        row.bit,
                        row.mask
                    );
                }
            })?;
        }
        Command::Policy => {
            let rows = commands::policy(&context)?;
            emit(args.json, &rows, || {
                for row in &rows {
                    let actions: Vec<&str> = row.actions.iter().map(ActionName::as_str).collect();
                    println!(
                        "{}  mask {}  [{}]",
                        row.name.bright_cyan(),
                        row.mask.to_string().bright_white(),
                        actions.join(", ")
                    );
                }
            })?;
        }
        Command::Check {
            fixture,
            principal,
            resource,
            action,
            entity,
        } => {
            let fixture = Fixture::load(&fixture)?;
            let entity = entity.as_deref().map(parse_entity_ref).transpose()?;
            let report = commands::check(
                &context,
                &fixture,
                CheckRequest {
                    principal,
                    resource_type: &ResourceType::new(&resource),
                    action: &ActionName::new(&action),
                    entity,
                },
            )
            .await?;

            emit(args.json, &report, || {
                let verdict = if report.decision.is_allowed() {
                    report.decision.to_string().bright_green()
                } else {
                    report.decision.to_string().bright_red()
                };
                println!("{verdict}");
                for step in &report.trace {
                    println!("  {}", step.dimmed());
                }
            })?;
        }
        Command::Cascade {
            fixture,
            principal,
            action,
            root,
            apply,
        } => {
            let fixture = Fixture::load(&fixture)?;
            let root = parse_entity_ref(&root)?;
            let report = commands::cascade(
                &context,
                &fixture,
                principal,
                &ActionName::new(&action),
                root,
                apply,
            )
            .await?;

            emit(args.json, &report, || match &report.decision {
                CascadeDecision::Allow(plan) => {
                    println!("{} {} nodes", "allow".bright_green(), plan.len());
                    for node in &plan.nodes {
                        println!("  {node}");
                    }
                    if let Some(removed) = report.removed {
                        println!("{} {removed} entities", "removed".bright_yellow());
                    }
                }
                CascadeDecision::Deny(denial) => {
                    println!(
                        "{} at {} ({})",
                        "deny".bright_red(),
                        denial.node,
                        denial.reason
                    );
                }
            })?;
        }
    }

    Ok(())
}

fn emit<T: Serialize>(json: bool, report: &T, human: impl FnOnce()) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        human();
    }
    Ok(())
}

fn init_tracing(config: &PermissionsConfig, verbose: bool, json: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            format!("auth_permissions={level},ops_cli={level},hyperiot_perms={level}").into()
        } else {
            EnvFilter::new(&config.log_filter)
        }
    });

    // Reports go to stdout, logs to stderr
    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .json(),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
