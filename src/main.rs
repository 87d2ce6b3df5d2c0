use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use jobsd::rpc::RpcClient;
use jobsd::{config, context, core::Orchestrator, db, logging, service};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "jobsd")]
#[command(about = "LaunchAgent Job Supervisor Daemon", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daemon in the foreground.
    Daemon(DaemonArgs),
    /// Show the status of a running daemon.
    Status,
    /// Install jobsd as a LaunchAgent and start it.
    Install,
    /// Unload and remove the jobsd LaunchAgent.
    Uninstall,
}

#[derive(Args, Serialize)]
struct DaemonArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    agents_dir: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    label_prefix: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    db_path: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    simulation: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    verbose: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    json_logs: Option<bool>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.command {
        Commands::Daemon(args) => config::AppConfig::new(Some(args))?,
        _ => config::AppConfig::new(None::<&DaemonArgs>)?,
    };

    match &cli.command {
        Commands::Daemon(_) => {
            logging::init(config.verbose, config.json_logs);
            let db_conn = db::init(&config.db_path).await?;
            let ctx = context::AppContext::new(config, db_conn);
            Orchestrator::new(ctx)
                .start()
                .await
                .context("Failed to start daemon")?;
        }
        Commands::Status => run_status(&config).await?,
        Commands::Install => {
            let manager = service::ServiceManager::new();
            manager
                .install_and_start(&config)
                .context("Failed to install agent")?;
            println!("jobsd installed and started");
        }
        Commands::Uninstall => {
            let manager = service::ServiceManager::new();
            if !manager.is_installed() {
                println!("jobsd is not installed");
                return Ok(());
            }
            manager.uninstall().context("Failed to uninstall agent")?;
            println!("jobsd uninstalled");
        }
    }

    Ok(())
}

async fn run_status(config: &config::AppConfig) -> Result<()> {
    let client = RpcClient::new(config.rpc_bind);
    let status: serde_json::Value = client
        .call_no_params("daemon.status")
        .await
        .context("Could not reach the daemon. Is it running?")?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
