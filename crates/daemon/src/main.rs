use daemon::{get_config_info, lookback_range, Cli, InfoclimatClient, IngestionService};
use rain_oracle_core::{setup_logger, Store};
use slog::{error, info, o, warn, Logger};
use std::{sync::Arc, time::Duration};
use time::OffsetDateTime;
use tokio::time::interval;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = get_config_info();
    let logger = setup_logger(cli.level.as_deref());

    info!(logger, "Rain Daemon starting...");
    info!(logger, "  Station: {}", cli.station_id());
    info!(logger, "  Feed URL: {}", cli.base_url());
    info!(logger, "  Database: {}", cli.db_path());
    info!(logger, "  Batch size: {} days", cli.batch_days());
    if cli.token().is_empty() {
        warn!(logger, "no Infoclimat token configured, requests will likely be refused");
    }

    let one_shot = cli.date_range()?;

    let store = Store::new(&cli.db_path(), logger.new(o!("component" => "store"))).await?;
    let client = Arc::new(InfoclimatClient::new(
        logger.new(o!("component" => "collector")),
        cli.feed_settings(),
    )?);
    let service = IngestionService::new(logger.new(o!("component" => "ingest")), client, store);

    match one_shot {
        Some((start, end)) => {
            let report = service.run(&cli.station_id(), start, end).await?;
            info!(
                logger,
                "ingestion finished: {}/{} windows, {} records, {} skipped, {} rows written",
                report.batches,
                report.windows,
                report.records,
                report.skipped,
                report.written
            );
        }
        None => run_periodically(&cli, &logger, &service).await,
    }
    Ok(())
}

async fn run_periodically(cli: &Cli, logger: &Logger, service: &IngestionService) {
    let sleep_between_runs = cli.sleep_interval();
    let station_id = cli.station_id();
    info!(
        logger,
        "Wait time between data pulls: {} seconds", sleep_between_runs
    );

    let mut ingest_interval = interval(Duration::from_secs(sleep_between_runs));
    loop {
        tokio::select! {
            _ = ingest_interval.tick() => {
                let (start, end) = lookback_range(OffsetDateTime::now_utc(), cli.lookback_days());
                match service.run(&station_id, start, end).await {
                    Ok(report) => info!(
                        logger,
                        "Finished ingesting {} rows, waiting {} seconds for next run",
                        report.written,
                        sleep_between_runs
                    ),
                    Err(err) => error!(logger, "Error ingesting observations: {}", err),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!(logger, "Shutdown signal received, stopping daemon");
                break;
            }
        }
    }
}
