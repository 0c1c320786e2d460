/// Bluetooth Low Energy scanning and RuuviTag climate data decoding
use futures_util::StreamExt;
use log::{debug, error, warn};
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

use crate::config::ClimateConfig;
use crate::models::Reading;

// RuuviTag protocol constants
const RUUVITAG_MANUFACTURER_ID: u16 = 0x0499; // Ruuvi Innovations Ltd. manufacturer ID
const DATA_FORMAT: u8 = 5; // RuuviTag data format version 5
const SCAN_DURATION_SECS: u64 = 20; // How long to actively scan for devices
const INVALID_TEMPERATURE: i16 = i16::MIN; // 0x8000, "not available"
const INVALID_HUMIDITY: u16 = u16::MAX; // 0xFFFF, "not available"

type ScanError = Box<dyn std::error::Error + Send + Sync>;

/// Climate fields decoded from one advertisement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateSample {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
}

/// Decode the climate part of RuuviTag manufacturer data format 5
///
/// Only the fields this service uses are read:
/// - Byte 0: Data format (5)
/// - Bytes 1-2: Temperature (signed 16-bit, 0.005°C resolution)
/// - Bytes 3-4: Humidity (unsigned 16-bit, 0.0025% resolution)
///
/// The sensor reports unavailable values with the minimum signed /
/// maximum unsigned raw value; those decode as `None`.
///
/// # Returns
/// Some(ClimateSample) if the payload is format 5, None otherwise
pub fn decode_climate_data(data: &[u8]) -> Option<ClimateSample> {
    if data.len() != 24 || data[0] != DATA_FORMAT {
        if !data.is_empty() {
            warn!(
                "Invalid RuuviTag data: len={}, format={}",
                data.len(),
                data[0]
            );
        }
        return None;
    }

    let raw_temperature = i16::from_be_bytes([data[1], data[2]]);
    let raw_humidity = u16::from_be_bytes([data[3], data[4]]);

    // Round to 2 decimals like the sensor's own app does
    let temperature = (raw_temperature != INVALID_TEMPERATURE)
        .then(|| (raw_temperature as f64 * 0.005 * 100.0).round() / 100.0);
    let humidity = (raw_humidity != INVALID_HUMIDITY)
        .then(|| ((raw_humidity as f64 * 0.0025).min(100.0) * 100.0).round() / 100.0);

    Some(ClimateSample {
        temperature,
        humidity,
    })
}

/// Scan once for the configured room sensor
///
/// Performs a Bluetooth Low Energy scan for a fixed duration and decodes the
/// advertisement of the sensor whose MAC matches the configuration.
///
/// # Returns
/// Ok(None) if the sensor was not heard during the scan
pub async fn scan_for_climate_sensor(config: &ClimateConfig) -> Result<Option<Reading>, ScanError> {
    // Initialize Bluetooth session
    let session = match bluer::Session::new().await {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to create Bluetooth session: {}", e);
            return Err(e.into());
        }
    };

    // Get the default Bluetooth adapter
    let adapter = match session.default_adapter().await {
        Ok(adapter) => adapter,
        Err(e) => {
            error!("Failed to get default Bluetooth adapter: {}", e);
            return Err(e.into());
        }
    };

    // Ensure Bluetooth adapter is powered on
    if let Err(e) = adapter.set_powered(true).await {
        error!("Failed to power on adapter: {}", e);
        return Err(e.into());
    }

    let filter = bluer::DiscoveryFilter {
        transport: bluer::DiscoveryTransport::Le,
        duplicate_data: false,
        ..Default::default()
    };
    if let Err(e) = adapter.set_discovery_filter(filter).await {
        warn!("Failed to set discovery filter: {}", e);
    }

    // Start device discovery in background
    let discovery_handle = match adapter.discover_devices().await {
        Ok(discovery_stream) => tokio::spawn(async move {
            let mut stream = discovery_stream;
            while let Some(event) = stream.next().await {
                debug!("Discovery event: {:?}", event);
            }
        }),
        Err(e) => {
            error!("Failed to start device discovery: {}", e);
            return Err(e.into());
        }
    };

    sleep(Duration::from_secs(SCAN_DURATION_SECS)).await;
    discovery_handle.abort();

    let devices = match adapter.device_addresses().await {
        Ok(devices) => devices,
        Err(e) => {
            error!("Failed to get device addresses: {}", e);
            return Err(e.into());
        }
    };

    for addr in devices {
        if addr.to_string().to_uppercase() != config.sensor_mac {
            continue;
        }
        let device = match adapter.device(addr) {
            Ok(device) => device,
            Err(_) => continue,
        };

        match device.manufacturer_data().await {
            Ok(Some(manufacturer_data)) => {
                let sample = manufacturer_data
                    .get(&RUUVITAG_MANUFACTURER_ID)
                    .and_then(|payload| decode_climate_data(payload));
                if let Some(sample) = sample {
                    debug!(
                        "Received data from {}: temp={:?}°C, humidity={:?}%",
                        config.sensor_mac, sample.temperature, sample.humidity
                    );
                    return Ok(Some(Reading {
                        temperature: sample.temperature,
                        humidity: sample.humidity,
                        timestamp: OffsetDateTime::now_utc(),
                    }));
                }
            }
            Ok(None) => debug!("No manufacturer data for {}", config.sensor_mac),
            Err(e) => debug!(
                "Failed to get manufacturer data for {}: {}",
                config.sensor_mac, e
            ),
        }
    }

    Ok(None)
}

/// Scan forever, forwarding each reading to the pipeline
///
/// Returns when the receiving side is gone.
pub async fn run_scanner(config: ClimateConfig, readings: mpsc::Sender<Reading>) {
    let pause = Duration::from_secs(config.poll_interval_secs.saturating_sub(SCAN_DURATION_SECS));

    loop {
        match scan_for_climate_sensor(&config).await {
            Ok(Some(reading)) => {
                if readings.send(reading).await.is_err() {
                    debug!("Reading channel closed, stopping scanner");
                    return;
                }
            }
            Ok(None) => warn!("Sensor {} not seen during scan", config.sensor_mac),
            Err(e) => error!("Scan failed: {}", e),
        }

        if !pause.is_zero() {
            sleep(pause).await;
        }
    }
}
