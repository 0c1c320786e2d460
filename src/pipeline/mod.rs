//! Reading and tick handlers wired together
//!
//! A [`Pipeline`] owns the shared state and is driven by a single task, so
//! each event's read-modify-write of the store completes before the next
//! event is looked at.

pub mod accumulator;
pub mod classifier;
pub mod notifier;

use log::debug;
use time::OffsetDateTime;

use crate::config::ClimateConfig;
use crate::models::{Alert, Classification, DurationSummary, Reading};
use crate::store::{KeyValueStore, SharedState};
use crate::utils::LocalZone;

pub use accumulator::{accumulate, AccumulatorSettings};
pub use classifier::{classify, ClassifierSettings};
pub use notifier::notify;

/// Something the pipeline reacts to.
#[derive(Debug, Clone)]
pub enum Event {
    /// A new sensor sample.
    Reading(Reading),
    /// Periodic accounting tick without new data.
    Tick,
}

/// Everything one event produced for the sinks.
#[derive(Debug, Default)]
pub struct Outputs {
    pub classification: Option<Classification>,
    pub durations: Option<DurationSummary>,
    pub alert: Option<Alert>,
}

pub struct Pipeline<S> {
    shared: SharedState<S>,
    classifier: ClassifierSettings,
    accumulator: AccumulatorSettings,
    timezone: LocalZone,
}

impl<S: KeyValueStore> Pipeline<S> {
    pub fn new(store: S, config: &ClimateConfig) -> Self {
        Pipeline {
            shared: SharedState::new(store),
            classifier: ClassifierSettings {
                room: config.room.clone(),
                force_state: config.force_state,
            },
            accumulator: AccumulatorSettings {
                max_gap_secs: config.max_gap_secs,
                room: config.room.clone(),
                app: config.app.clone(),
            },
            timezone: config.timezone,
        }
    }

    pub fn shared(&self) -> &SharedState<S> {
        &self.shared
    }

    /// Run the handlers for `event`, with `now` as the time it is handled
    ///
    /// Accounting always uses `now`, never a reading's own timestamp: a
    /// reading that waited in the channel behind a tick must not move the
    /// accumulator's clock backwards.
    pub fn handle(&mut self, event: Event, now: OffsetDateTime) -> Outputs {
        let now = self.timezone.localize(now);
        match event {
            Event::Reading(reading) => self.handle_reading(reading, now),
            Event::Tick => Outputs {
                durations: Some(accumulate(&mut self.shared, None, now, &self.accumulator)),
                ..Outputs::default()
            },
        }
    }

    /// Classify, then feed the result to the accumulator and the notifier
    ///
    /// An incomplete reading stops here and produces nothing.
    fn handle_reading(&mut self, mut reading: Reading, now: OffsetDateTime) -> Outputs {
        reading.timestamp = self.timezone.localize(reading.timestamp);

        let Some(classification) = classify(&mut self.shared, &reading, &self.classifier) else {
            debug!("Reading produced no classification");
            return Outputs::default();
        };

        let durations = accumulate(
            &mut self.shared,
            Some(f64::from(u8::from(classification.traffic))),
            now,
            &self.accumulator,
        );

        let alert = notify(
            &mut self.shared,
            &classification.room,
            classification.traffic,
            Some(classification.temp_c),
            Some(classification.hum_pct),
            now,
        );

        Outputs {
            classification: Some(classification),
            durations: Some(durations),
            alert,
        }
    }
}
