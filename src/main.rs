use std::process;

use clap::Parser;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pve_processor::args::Args;
use pve_processor::database::{SnapshotStore, StoreError};
use pve_processor::messaging::{PublisherError, RabbitMqConfig, RabbitMqPublisher};
use pve_processor::model::classification::ClassificationError;
use pve_processor::model::completion::{parse_calibration, CalibrationError};
use pve_processor::model::normalizer;
use pve_processor::model::pve_model::{ProcessorConfig, ProcessorError, PveModel};

#[derive(Debug, Error)]
enum RunError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Classification(#[from] ClassificationError),

    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    #[error(transparent)]
    Processor(#[from] ProcessorError),

    #[error("RabbitMQ configuration: {0}")]
    MessagingConfig(#[from] std::env::VarError),

    #[error(transparent)]
    Publisher(#[from] PublisherError)
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&args.log_level))
        .with_writer(std::io::stderr)
        .init();

    if let Err(error) = run(args).await {
        error!("processing run failed: {error}");
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), RunError> {
    let store = SnapshotStore::new(&args.snapshot, &args.output_dir);
    let replays = store.load_replays()?;
    let corpus = normalizer::normalize(&replays)?;

    let mut config = ProcessorConfig {
        propagation_mode: args.propagation_mode,
        ..ProcessorConfig::default()
    };
    if let Some(raw) = &args.calibration {
        config.calibration = parse_calibration(raw)?;
    }

    let model = PveModel::new(&config)?;
    let results = model.process(corpus.records)?;

    let written = store.publish(&results, &corpus.player_names)?;
    info!(
        variants = results.len(),
        files = written.len(),
        "processing run complete"
    );

    if args.amqp {
        let rabbit_config = RabbitMqConfig::from_env()?;
        let mut publisher = RabbitMqPublisher::connect_from_config(&rabbit_config).await?;
        publisher
            .publish_run_processed(
                results.iter().map(|result| result.variant.to_string()).collect(),
                results
                    .iter()
                    .map(|result| result.grouped_settings.len() as u32)
                    .sum(),
                results.iter().map(|result| result.ratings.len() as u32).sum(),
                None,
            )
            .await?;
        publisher.close().await?;
    }

    Ok(())
}
