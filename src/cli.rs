use crate::config::plugin::PluginConfig;
use crate::core::{CredentialData, StaticMapping};
use crate::kernel::groups::resolve_groups;
use crate::kernel::identity::SystemIdentityDatabase;
use crate::kernel::proc_status::ProcessInspector;
use crate::mapping::map_identity;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON configuration file (mapfile, proc_root, status_window)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Mapping file; overrides the configuration file
    #[arg(long, global = true)]
    mapfile: Option<PathBuf>,
    /// Root of the per-process status tree
    #[arg(long, global = true)]
    proc_root: Option<PathBuf>,
    /// Append structured audit events to this file
    #[arg(long, global = true)]
    audit_log: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full mapping pipeline and print the emitted credentials
    Resolve {
        /// Act as if running inside this process (default: this process)
        #[arg(long)]
        pid: Option<u32>,
    },
    /// Print the parsed status record of a process
    Inspect {
        #[arg(long)]
        pid: u32,
    },
    /// Map a source uid through the mapping file
    Map {
        #[arg(long)]
        uid: u32,
    },
    /// Print the primary and secondary groups of a uid
    Groups {
        #[arg(long)]
        uid: u32,
    },
}

#[derive(Serialize)]
struct ResolveReport<'a> {
    outcome: &'a crate::core::MappingOutcome,
    credentials: &'a CredentialData,
}

fn load_config(cli: &Cli) -> Result<PluginConfig> {
    let mut config = match &cli.config {
        Some(path) => PluginConfig::load_from_file(path)?,
        None => PluginConfig::default(),
    };
    if let Some(mapfile) = &cli.mapfile {
        config.mapfile = mapfile.clone();
    }
    if let Some(proc_root) = &cli.proc_root {
        config.proc_root = proc_root.clone();
    }
    config.validate()?;
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn run() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    if let Some(path) = &cli.audit_log {
        crate::observability::audit::init_audit_log(path.clone())
            .with_context(|| format!("audit log {}", path.display()))?;
    }

    let config = load_config(&cli)?;
    log::debug!("static-mapping: using {:?}", config);

    match cli.command {
        Commands::Resolve { pid } => {
            let plugin = StaticMapping::from_config(config)?;
            let self_pid = pid.unwrap_or_else(std::process::id);
            let mut credentials = CredentialData::new();
            let outcome = plugin
                .run(self_pid, &mut credentials)
                .with_context(|| format!("resolution for process {} failed", self_pid))?;
            print_json(&ResolveReport {
                outcome: &outcome,
                credentials: &credentials,
            })
        }
        Commands::Inspect { pid } => {
            let identity = ProcessInspector::from_config(&config).inspect(pid)?;
            print_json(&identity)
        }
        Commands::Map { uid } => {
            let mapped = map_identity(&SystemIdentityDatabase::new(), uid, &config.mapfile, None)?;
            print_json(&mapped)
        }
        Commands::Groups { uid } => {
            let target = resolve_groups(&SystemIdentityDatabase::new(), uid)?;
            print_json(&target)
        }
    }
}
