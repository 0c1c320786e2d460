mod bluetooth;
mod config;
mod database;
mod models;
mod pipeline;
mod store;
mod utils;

use log::{debug, error, info, warn};
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};

use bluetooth::run_scanner;
use config::ClimateConfig;
use database::{store_alert, store_classification, store_durations};
use pipeline::{Event, Outputs, Pipeline};
use store::{FileStore, KeyValueStore, MemoryStore};
use utils::format_datetime;

const READING_CHANNEL_CAPACITY: usize = 8;

/// Hand the outputs of one event to the log and, if configured, the database
///
/// Database writes run in their own tasks so a slow or unreachable server
/// never delays the next event.
fn publish(outputs: Outputs, config: &ClimateConfig) {
    if let Some(classification) = outputs.classification {
        info!(
            "{}: {:.1}°C, {:.1}% -> {}",
            classification.room, classification.temp_c, classification.hum_pct, classification.traffic_text
        );
        if let Ok(json) = serde_json::to_string(&classification) {
            debug!("Classification payload: {}", json);
        }
        if let Some(url) = config.database_url.clone() {
            tokio::spawn(async move {
                if let Err(e) = store_classification(&classification, &url).await {
                    error!("Failed to store reading for {}: {}", classification.room, e);
                }
            });
        }
    }

    if let Some(durations) = outputs.durations {
        info!(
            "Today {} green/yellow/red: {}s/{}s/{}s, week {}: {}s/{}s/{}s",
            durations.day,
            durations.green_s_today,
            durations.yellow_s_today,
            durations.red_s_today,
            durations.week,
            durations.green_s_week,
            durations.yellow_s_week,
            durations.red_s_week
        );
        if let Some(url) = config.database_url.clone() {
            tokio::spawn(async move {
                if let Err(e) = store_durations(&durations, &url).await {
                    error!("Failed to store durations for {}: {}", durations.day, e);
                }
            });
        }
    }

    if let Some(alert) = outputs.alert {
        warn!("{}\n{}", alert.subject, alert.body);
        if let Some(url) = config.database_url.clone() {
            let room = config.room.clone();
            tokio::spawn(async move {
                if let Err(e) = store_alert(&room, &alert, &url).await {
                    error!("Failed to store alert '{}': {}", alert.subject, e);
                }
            });
        }
    }
}

/// Open the configured state store and run the event loop on it
async fn main_loop(config: ClimateConfig) -> Result<(), Box<dyn std::error::Error>> {
    match &config.state_file {
        Some(path) => {
            let store = FileStore::open(path)?;
            info!("Using state file {}", store.path().display());
            run_events(Pipeline::new(store, &config), &config).await
        }
        None => {
            warn!("No state file configured, statistics will not survive a restart");
            run_events(Pipeline::new(MemoryStore::new(), &config), &config).await
        }
    }
}

/// Single event loop: the only code touching the state store
async fn run_events<S: KeyValueStore>(
    mut pipeline: Pipeline<S>,
    config: &ClimateConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(state) = pipeline.shared().last_traffic() {
        info!("Resuming with last known state {}", state);
    }

    let (tx, mut readings) = mpsc::channel(READING_CHANNEL_CAPACITY);
    tokio::spawn(run_scanner(config.clone(), tx));

    let mut ticks = interval(Duration::from_secs(config.tick_interval_secs));
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Starting climate traffic monitor for room '{}'", config.room);

    loop {
        let event = tokio::select! {
            _ = ticks.tick() => Event::Tick,
            reading = readings.recv() => match reading {
                Some(reading) => Event::Reading(reading),
                None => return Err("Sensor scanner stopped".into()),
            },
        };

        let now = OffsetDateTime::now_utc();
        if let Event::Tick = event {
            debug!("Tick at {}", format_datetime(&config.timezone.localize(now)));
        }

        let outputs = pipeline.handle(event, now);
        publish(outputs, config);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match ClimateConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        // Handle Ctrl+C gracefully
        let (tx, mut rx) = tokio::sync::oneshot::channel();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
            let _ = tx.send(());
        });

        // Run main loop or wait for shutdown signal
        tokio::select! {
            result = main_loop(config) => {
                match result {
                    Ok(_) => info!("Program completed successfully"),
                    Err(e) => error!("Fatal error: {}", e),
                }
            }
            _ = &mut rx => {
                info!("Program terminated by user. Exiting gracefully.");
            }
        }
    });

    Ok(())
}
