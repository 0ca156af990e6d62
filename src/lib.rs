//! Gantry: a daemonless compliance gateway for regulated equipment.
//!
//! Gantry tracks regulated assets (cranes, hoists, pressure vessels,
//! instruments) and the recurring compliance events that keep them legal
//! to operate: load tests, calibrations, inspections, operator
//! credentials, and preventive-maintenance schedules.
//!
//! # Trust boundary
//!
//! The presentation layer is untrusted and never touches the store. Every
//! read and write crosses [`core::gateway::Gateway::dispatch`], which:
//!
//! 1. Looks the `(domain, action)` pair up in a closed operation catalogue
//! 2. Validates every declared parameter, reporting all failures at once
//! 3. Runs the handler on a fresh connection, mutations inside one
//!    transaction
//! 4. Records exactly one audit entry per successful mutation, in the same
//!    transaction; if the trail cannot be written, the mutation rolls back
//!
//! # Scheduling
//!
//! [`core::scheduler`] owns the calendar: next-due computation (annual and
//! six-month periodic clocks), lifecycle buckets (`overdue`, `due-soon`,
//! `upcoming`, `current`, `no-date`), and notification generation with
//! severity escalation. Every function takes an explicit "today"; the wall
//! clock is consulted in exactly one place, when a caller supplies none.
//!
//! # Store layout
//!
//! State lives under `<project>/.gantry/`: `data/compliance.db` (SQLite,
//! WAL) plus an optional `gantry.toml`. The CLI walks parent directories
//! to find it, the way version control does.
//!
//! # Examples
//!
//! ```bash
//! # Initialize a compliance workspace
//! gantry init
//!
//! # Register equipment through the gateway
//! gantry dispatch --domain equipment --action create \
//!     --params '{"code": "CR-12", "name": "Bay 2 bridge crane", "category": "crane"}'
//!
//! # Record a load test
//! gantry dispatch --domain loadTests --action create \
//!     --params '{"equipmentId": 1, "eventDate": "2024-01-15", "outcome": "pass"}'
//!
//! # What needs attention?
//! gantry check
//!
//! # Who changed what?
//! gantry audit --limit 20
//! ```
//!
//! # Crate structure
//!
//! - [`core`]: gateway, registry, scheduler, audit trail, store plumbing
//! - [`domains`]: per-domain handlers (equipment, compliance events,
//!   credentials, certificates, PM schedules, audit-log reads)

pub mod core;
pub mod domains;

use crate::core::config;
use crate::core::db;
use crate::core::error;
use crate::core::gateway::{Gateway, Request};
use crate::core::registry::OperationRegistry;
use crate::core::scheduler::Severity;
use crate::core::store::Store;
use crate::core::{audit, check, time};

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "gantry",
    version = env!("CARGO_PKG_VERSION"),
    about = "Compliance gateway for regulated lifting equipment"
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize a compliance workspace
    Init {
        /// Directory to initialize (defaults to the current working directory)
        #[clap(short, long)]
        dir: Option<PathBuf>,
    },
    /// Dispatch one operation through the gateway, printing the response envelope
    Dispatch {
        /// Wire domain (e.g. equipment, loadTests, calibrations)
        #[clap(long)]
        domain: String,
        /// Wire action (e.g. create, getAll, getOverdue)
        #[clap(long)]
        action: String,
        /// Operation parameters as a JSON object
        #[clap(long, default_value = "{}")]
        params: String,
        /// Numeric id of the acting user
        #[clap(long)]
        actor_id: Option<i64>,
        /// Username recorded in the audit trail
        #[clap(long)]
        actor_name: Option<String>,
    },
    /// Run the compliance sweep: notifications, coverage, gaps
    Check {
        /// Evaluate as of this date (YYYY-MM-DD) instead of today
        #[clap(long)]
        as_of: Option<String>,
        /// Output format: 'text' or 'json'
        #[clap(long, default_value = "text")]
        format: String,
    },
    /// Bucket counts per asset class
    Status {
        /// Evaluate as of this date (YYYY-MM-DD) instead of today
        #[clap(long)]
        as_of: Option<String>,
        /// Output format: 'text' or 'json'
        #[clap(long, default_value = "text")]
        format: String,
    },
    /// Show recent audit trail entries
    Audit {
        /// Maximum entries to show
        #[clap(long, default_value_t = 50)]
        limit: i64,
        /// Output format: 'text' or 'json'
        #[clap(long, default_value = "text")]
        format: String,
    },
    /// Describe the operation catalogue as JSON
    Schema {
        /// Restrict to one wire domain
        #[clap(long)]
        domain: Option<String>,
    },
    /// Print version
    Version,
}

fn resolve_store() -> Result<Store, error::GantryError> {
    let current_dir = std::env::current_dir()?;
    Store::discover(&current_dir)
}

fn resolve_as_of(raw: Option<String>) -> Result<chrono::NaiveDate, error::GantryError> {
    match raw {
        None => Ok(time::today()),
        Some(s) => time::parse_date(&s).ok_or_else(|| {
            error::GantryError::ValidationError(format!(
                "--as-of must be YYYY-MM-DD within 1900..=2100, got '{}'",
                s
            ))
        }),
    }
}

fn cmd_init(dir: Option<PathBuf>) -> Result<(), error::GantryError> {
    let target = match dir {
        Some(d) => d,
        None => std::env::current_dir()?,
    };
    let store = Store::init(&target)?;
    let cfg = config::load_config(&store)?;
    let db_path = db::initialize_compliance_db(&store.data_root(), &cfg.database)?;
    println!(
        "{} compliance store at {}",
        "Initialized".bright_green().bold(),
        db_path.display()
    );
    Ok(())
}

fn cmd_dispatch(
    domain: String,
    action: String,
    params: String,
    actor_id: Option<i64>,
    actor_name: Option<String>,
) -> Result<(), error::GantryError> {
    let raw_params: serde_json::Value = serde_json::from_str(&params).map_err(|e| {
        error::GantryError::ValidationError(format!("--params is not valid JSON: {}", e))
    })?;
    let gateway = Gateway::open(resolve_store()?)?;
    let mut request = Request::new(&domain, &action, raw_params);
    if let Some(name) = actor_name {
        request = request.with_actor(actor_id, &name);
    }
    let response = gateway.dispatch(&request);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn severity_tag(severity: Severity) -> colored::ColoredString {
    match severity {
        Severity::Critical => "CRITICAL".bright_red().bold(),
        Severity::Warning => " WARNING".bright_yellow().bold(),
        Severity::Info => "    INFO".bright_blue(),
    }
}

fn cmd_check(as_of: Option<String>, format: String) -> Result<(), error::GantryError> {
    let store = resolve_store()?;
    let cfg = config::load_config(&store)?;
    let today = resolve_as_of(as_of)?;
    let report = check::run_compliance_check(&store, &cfg, today)?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{} as of {}",
        "Compliance check".bright_white().bold(),
        report.as_of
    );
    for class in &report.classes {
        println!(
            "  {:<12} overdue {:<4} due-soon {:<4} upcoming {:<4} current {:<4} no-date {}",
            class.class,
            class.counts.overdue,
            class.counts.due_soon,
            class.counts.upcoming,
            class.counts.current,
            class.counts.no_date
        );
    }
    if report.notifications.is_empty() {
        println!("{}", "  nothing due inside the notification window".green());
    }
    for note in &report.notifications {
        println!("  {} {}", severity_tag(note.severity), note.message);
    }
    for finding in &report.uncovered {
        println!("  {} {}", "UNCOVERED".bright_magenta().bold(), finding);
    }
    for gap in &report.gaps {
        eprintln!("  {} {}", "SWEEP GAP".bright_yellow().bold(), gap);
    }
    Ok(())
}

fn cmd_status(as_of: Option<String>, format: String) -> Result<(), error::GantryError> {
    let store = resolve_store()?;
    let cfg = config::load_config(&store)?;
    let today = resolve_as_of(as_of)?;
    let report = check::run_compliance_check(&store, &cfg, today)?;

    if format == "json" {
        let summary = serde_json::json!({
            "asOf": report.as_of,
            "classes": report.classes,
            "gaps": report.gaps,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    println!("{} as of {}", "Status".bright_white().bold(), report.as_of);
    for class in &report.classes {
        let total = class.counts.total();
        let headline = if class.counts.overdue > 0 {
            format!("{} overdue", class.counts.overdue).bright_red().bold()
        } else if class.counts.due_soon > 0 {
            format!("{} due soon", class.counts.due_soon)
                .bright_yellow()
                .bold()
        } else {
            "on track".green()
        };
        println!("  {:<12} {:<3} tracked, {}", class.class, total, headline);
    }
    for gap in &report.gaps {
        eprintln!("  {} {}", "SWEEP GAP".bright_yellow().bold(), gap);
    }
    Ok(())
}

fn cmd_audit(limit: i64, format: String) -> Result<(), error::GantryError> {
    let store = resolve_store()?;
    let cfg = config::load_config(&store)?;
    let conn = db::db_connect(&cfg.db_path(&store))?;
    let entries = audit::recent_entries(&conn, limit)?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        println!("audit trail is empty");
        return Ok(());
    }
    for entry in &entries {
        println!(
            "{} {} {}#{} by {}",
            entry.ts.dimmed(),
            entry.action.bright_white().bold(),
            entry.entity_type,
            entry.entity_id,
            entry.username.bright_cyan()
        );
    }
    Ok(())
}

fn cmd_schema(domain: Option<String>) -> Result<(), error::GantryError> {
    let registry = OperationRegistry::standard();
    let mut ops = Vec::new();
    for (d, a, spec) in registry.operations() {
        if let Some(filter) = &domain {
            if d.as_str() != filter {
                continue;
            }
        }
        let params: Vec<serde_json::Value> = spec
            .params
            .iter()
            .map(|p| {
                serde_json::json!({
                    "name": p.name,
                    "rule": p.rule.describe(),
                    "required": p.required,
                })
            })
            .collect();
        ops.push(serde_json::json!({
            "domain": d.as_str(),
            "action": a.as_str(),
            "mutating": spec.mutating,
            "params": params,
        }));
    }
    println!("{}", serde_json::to_string_pretty(&ops)?);
    Ok(())
}

pub fn run() -> Result<(), error::GantryError> {
    let cli = Cli::parse();
    match cli.command {
        Command::Version => {
            println!("v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Command::Init { dir } => cmd_init(dir),
        Command::Dispatch {
            domain,
            action,
            params,
            actor_id,
            actor_name,
        } => cmd_dispatch(domain, action, params, actor_id, actor_name),
        Command::Check { as_of, format } => cmd_check(as_of, format),
        Command::Status { as_of, format } => cmd_status(as_of, format),
        Command::Audit { limit, format } => cmd_audit(limit, format),
        Command::Schema { domain } => cmd_schema(domain),
    }
}
