//! ---
//! rch_section: "01-core-functionality"
//! rch_subsection: "binary"
//! rch_type: "source"
//! rch_scope: "code"
//! rch_description: "Binary entrypoint for the RCH daemon."
//! rch_version: "v0.0.0-prealpha"
//! rch_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};

use rch_common::HostResult;
use rch_config::DEFAULT_DIRECTORY;
use rch_contracts::{ComponentRegistry, Lifecycle, ScopeKey};
use rch_core::{HostConfig, HostManager};
use rch_devices::standard_table;
use rch_logging::LOG_ENV;

#[derive(Debug, Parser)]
#[command(author, version, about = "RCH robot host daemon", long_about = None)]
struct Cli {
    /// Bundle to load from the store; the default bundle when omitted.
    bundle: Option<String>,

    /// Directory holding the configuration bundle store.
    #[arg(
        long,
        value_name = "DIR",
        env = "RCH_CONFIG_DIR",
        default_value = DEFAULT_DIRECTORY
    )]
    config_dir: PathBuf,

    /// Scope the host registers its devices under.
    #[arg(long, value_name = "KEY", default_value = "host")]
    scope: String,

    /// Filter directive used when neither RCH_LOG nor the bundle set one.
    #[arg(long, value_name = "DIRECTIVE")]
    log_filter: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Some(filter) = &cli.log_filter {
        if std::env::var_os(LOG_ENV).is_none() {
            std::env::set_var(LOG_ENV, filter);
        }
    }

    let registry = Arc::new(ComponentRegistry::new());
    let host = HostManager::new(Arc::clone(&registry), standard_table());
    if let Err(err) = bootstrap(&host, &cli) {
        eprintln!("rchd: {}", err.messages().user);
        std::process::exit(1);
    }
    info!(
        bundle = %host.active_bundle().unwrap_or_default(),
        "host running; type `exit` or press ctrl-c to stop"
    );

    tokio::select! {
        _ = exit_on_stdin() => info!("exit requested on stdin"),
        result = signal::ctrl_c() => {
            if let Err(err) = result {
                warn!(error = %err, "ctrl-c handler failed");
            }
            info!("ctrl-c received; shutting down");
        }
    }

    if let Err(err) = host.deactivate() {
        warn!(error = %err, "host did not deactivate cleanly");
    }
    Ok(())
}

fn bootstrap(host: &HostManager, cli: &Cli) -> HostResult<()> {
    let config = HostConfig {
        args: cli.bundle.clone().into_iter().collect(),
        config_dir: cli.config_dir.clone(),
        scope: ScopeKey::new(cli.scope.clone())?,
    };
    host.configure(Box::new(config))?;
    host.initialise()
}

/// Resolves when the operator types `exit` on standard input. A closed
/// stdin never requests shutdown; the signal path still does.
async fn exit_on_stdin() {
    let reader = tokio::task::spawn_blocking(|| {
        let stdin = std::io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            match stdin.read_line(&mut line) {
                Ok(0) | Err(_) => return false,
                Ok(_) if line.trim().eq_ignore_ascii_case("exit") => return true,
                Ok(_) => {}
            }
        }
    });
    match reader.await {
        Ok(true) => {}
        _ => std::future::pending::<()>().await,
    }
}
