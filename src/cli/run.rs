use crate::campaign::controller::{CampaignController, CampaignError};
use crate::config::load_config;
use crate::config::record::{CampaignRecord, RecordError};
use crate::geoloc::LoggingGeolocator;
use crate::platform::client::AtlasClient;
use crate::results::types::VantagePoint;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] crate::config::parse::ConfigError),

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("platform client error: {0}")]
    Platform(#[from] crate::platform::client::PlatformError),

    #[error("campaign error: {0}")]
    Campaign(#[from] CampaignError),

    #[error("campaign record error: {0}")]
    Record(#[from] RecordError),
}

pub struct RunArgs {
    pub dry_run: bool,
    pub nb_targets: Option<usize>,
    pub nb_vps: Option<usize>,
    pub vps_path: PathBuf,
    pub hitlist_path: PathBuf,
}

pub async fn run(
    config_path: Option<PathBuf>,
    args: RunArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = match config_path {
        Some(path) => path,
        None => {
            eprintln!("Error: config not found");
            eprintln!("Searched locations:");
            eprintln!("  ~/.config/geoprobe/config.yml");
            eprintln!("  /etc/geoprobe/config.yml");
            eprintln!("\nUse --config <path> to specify a config file, or run 'geoprobe config init' to generate one.");
            std::process::exit(1);
        }
    };

    run_campaign(&config_path, args).await.map_err(|e| e.into())
}

async fn run_campaign(config_path: &PathBuf, args: RunArgs) -> Result<(), RunError> {
    info!(config_path = %config_path.display(), "Loading configuration");
    let config = load_config(config_path)?;

    // Load measurement datasets
    let mut vantage_points: BTreeMap<String, VantagePoint> = load_yaml(&args.vps_path)?;
    let hitlist: BTreeMap<String, Vec<String>> = load_yaml(&args.hitlist_path)?;

    if let Some(nb_vps) = args.nb_vps {
        vantage_points = vantage_points.into_iter().take(nb_vps).collect();
    }

    let target_prefixes: Vec<String> = match args.nb_targets {
        Some(nb_targets) => hitlist.keys().take(nb_targets).cloned().collect(),
        None => hitlist.keys().cloned().collect(),
    };

    let campaign_uuid = Uuid::new_v4();
    info!(
        campaign = %campaign_uuid,
        dry_run = args.dry_run,
        prefixes = target_prefixes.len(),
        vantage_points = vantage_points.len(),
        "Starting measurement campaign"
    );

    // Persist the campaign record before any network activity so a crashed
    // campaign can be audited.
    let selected = crate::campaign::controller::select_targets(
        &target_prefixes,
        &hitlist,
        config.campaign.targets_per_prefix,
    );
    let mut record = CampaignRecord {
        uuid: campaign_uuid,
        is_dry_run: args.dry_run,
        description: config.campaign.description.clone(),
        address_family: config.campaign.address_family,
        targets: selected.values().flatten().cloned().collect(),
        vantage_points: vantage_points.clone(),
        ids: Vec::new(),
        start_time: None,
        end_time: None,
    };
    let record_path = record.save(&config.record.dir)?;
    info!(path = %record_path.display(), "Saved pre-submission campaign record");

    let platform = Arc::new(AtlasClient::new(&config.platform)?);
    let controller = CampaignController::new(
        platform,
        Arc::new(LoggingGeolocator),
        config.campaign.clone(),
    );

    // Ctrl-C stops new submissions; accepted jobs drain.
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling campaign submission");
            let _ = cancel_tx.send(true);
        }
    });

    let report = controller
        .estimate_probing_targets(
            &target_prefixes,
            &vantage_points,
            &hitlist,
            campaign_uuid,
            args.dry_run,
            cancel_rx,
        )
        .await?;

    record.ids = report.ids.clone();
    record.start_time = Some(report.start_time);
    record.end_time = Some(report.end_time);
    record.save(&config.record.dir)?;

    info!(
        campaign = %campaign_uuid,
        jobs = report.ids.len(),
        targets_with_results = report.records.len(),
        failed_batches = report.failures.len(),
        "Campaign finished"
    );
    for failure in &report.failures {
        warn!(
            batch_id = %failure.batch_id,
            tag = %failure.tag,
            error = %failure.error,
            "Batch did not complete"
        );
    }

    Ok(())
}

fn load_yaml<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Result<T, RunError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| RunError::Dataset(format!("failed to read '{}': {}", path.display(), e)))?;
    serde_yaml::from_str(&text)
        .map_err(|e| RunError::Dataset(format!("failed to parse '{}': {}", path.display(), e)))
}
