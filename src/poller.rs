//! One poll cycle reads every block in a fixed order, then decodes.

use crate::config::Config;
use crate::reader::RegisterReader;
use crate::registers::*;
use crate::retry::{FixedInterval, RetryPolicy};
use crate::snapshot::{HoldingBlocks, InputBlocks, TelemetrySnapshot};
use crate::transport::{Connector, RtuConnector};
use chrono::Utc;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::watch,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    /// Read the holding bank settings as well as the telemetry.
    pub read_configuration: bool,
}

impl Default for PollOptions {
    fn default() -> Self {
        PollOptions { read_configuration: true }
    }
}

pub struct Poller<C: Connector, P> {
    reader: RegisterReader<C, P>,
    options: PollOptions,
}

impl Poller<RtuConnector, FixedInterval> {
    /// A poller talking to the serial device described by `config`.
    pub fn rtu(config: &Config) -> Self {
        let reader = RegisterReader::new(
            RtuConnector::new(config.serial.clone()),
            FixedInterval(config.poll.reconnect_backoff()),
        );
        Poller::new(reader, PollOptions { read_configuration: config.poll.read_configuration })
    }
}

impl<C: Connector, P: RetryPolicy> Poller<C, P> {
    pub fn new(reader: RegisterReader<C, P>, options: PollOptions) -> Self {
        Poller { reader, options }
    }

    pub fn reader(&self) -> &RegisterReader<C, P> {
        &self.reader
    }

    pub fn options(&self) -> PollOptions {
        self.options
    }

    /// Read and decode everything. Waits through any number of link
    /// failures; the snapshot returned is always complete.
    pub async fn poll(&mut self) -> TelemetrySnapshot {
        let r = &mut self.reader;
        let input = InputBlocks {
            rated_input: r.read_block(&RATED_INPUT).await,
            rated_battery: r.read_block(&RATED_BATTERY).await,
            charging: r.read_block(&CHARGING).await,
            battery: r.read_block(&BATTERY).await,
            load: r.read_block(&LOAD).await,
            temperatures: r.read_block(&TEMPERATURES).await,
            battery_soc: r.read_block(&BATTERY_SOC).await,
            remote_battery_temperature: r.read_block(&REMOTE_BATTERY_TEMPERATURE).await,
            battery_temperature_2: r.read_block(&BATTERY_TEMPERATURE_2).await,
            status: r.read_block(&STATUS).await,
            history: r.read_block(&HISTORY).await,
            battery_net: r.read_block(&BATTERY_NET).await,
        };
        let holding = if self.options.read_configuration {
            Some(HoldingBlocks {
                battery_settings: r.read_block(&BATTERY_SETTINGS).await,
                equalize_duration: r.read_block(&EQUALIZE_DURATION).await,
                boost_duration: r.read_block(&BOOST_DURATION).await,
                equalize_period: r.read_block(&EQUALIZE_PERIOD).await,
                real_time_clock: r.read_block(&REAL_TIME_CLOCK).await,
            })
        } else {
            None
        };
        let snapshot = TelemetrySnapshot::decode(&input, holding.as_ref(), Utc::now());
        debug!(
            battery_status = %snapshot.battery_status,
            charging_status = %snapshot.charging_status,
            "poll complete"
        );
        snapshot
    }

    /// Poll every `period` and publish each snapshot, replacing the
    /// previous one. The first poll starts immediately. Returns once
    /// every receiver is gone.
    ///
    /// # Panics
    ///
    /// If `period` is zero.
    pub async fn run(mut self, period: Duration, publish: watch::Sender<Option<Arc<TelemetrySnapshot>>>) {
        assert!(!period.is_zero(), "poll period must be positive");
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let snapshot = Arc::new(self.poll().await);
            if publish.send(Some(snapshot)).is_err() {
                info!("no snapshot receivers left, stopping poller");
                self.reader.close().await;
                return;
            }
        }
    }
}
