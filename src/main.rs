use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "geoprobe")]
#[command(about = "RTT measurement campaign orchestrator", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a measurement campaign
    Run {
        /// Perform selection and batching without submitting any platform jobs
        #[arg(long)]
        dry_run: bool,

        /// Limit the number of target prefixes to measure
        #[arg(long)]
        nb_targets: Option<usize>,

        /// Limit the number of vantage points to probe from
        #[arg(long)]
        nb_vps: Option<usize>,

        /// YAML file mapping vantage point address -> metadata
        #[arg(long)]
        vps: PathBuf,

        /// YAML file mapping target prefix -> candidate target addresses
        #[arg(long)]
        hitlist: PathBuf,
    },
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Init {
        #[arg(long)]
        stdout: bool,
    },
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "geoprobe=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config_path = geoprobe::config::resolve_config_path(cli.config.as_deref());

    match cli.command {
        Commands::Run {
            dry_run,
            nb_targets,
            nb_vps,
            vps,
            hitlist,
        } => {
            let args = geoprobe::cli::run::RunArgs {
                dry_run,
                nb_targets,
                nb_vps,
                vps_path: vps,
                hitlist_path: hitlist,
            };
            geoprobe::cli::run::run(config_path, args).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Init { stdout } => {
                geoprobe::cli::config::init(stdout)?;
            }
            ConfigAction::Validate => {
                geoprobe::cli::config::validate(config_path)?;
            }
        },
    }

    Ok(())
}
