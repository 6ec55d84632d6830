use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, warn};

use brainwave_driver::{
    create_driver, AdcConfig as DriverAdcConfig, AdcDriver, ChannelSpec, CompletedEpoch,
    EpochConfig,
};

use crate::config::Config;
use crate::control::{Broadcaster, Command, OutEnvelope};
use crate::csv_sink::CsvSink;
use crate::fanout::{build_sinks, FanOut};
use crate::lsl::LslSink;
use crate::tsdb::TsdbSink;

const SHUTDOWN_GRACE_SECS: u64 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Idle,
    Connecting,
    Streaming,
    Terminated,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Owns the acquisition driver session and scheduler task across the
/// IDLE/CONNECTING/STREAMING state machine. Every successful `open_session`
/// is paired with a `release_session` on every exit path, including errors.
pub struct LifecycleController {
    state: State,
    config: Config,
    broadcaster: Broadcaster,
    driver: Box<dyn AdcDriver>,
    scheduler_done: Option<Arc<AtomicBool>>,
    scheduler_task: Option<JoinHandle<()>>,
    relay_task: Option<JoinHandle<()>>,
}

impl LifecycleController {
    pub fn new(config: Config, broadcaster: Broadcaster) -> Self {
        Self {
            state: State::Idle,
            config,
            broadcaster,
            driver: create_driver(),
            scheduler_done: None,
            scheduler_task: None,
            relay_task: None,
        }
    }

    /// Drives the lifecycle from incoming commands until `quit` or the
    /// channel closes. If `wait_for_commands` is false, an implicit `start`
    /// runs first using the configured channel set.
    pub async fn run(&mut self, mut commands_rx: mpsc::Receiver<Command>) {
        if !self.config.wait_for_commands && !self.config.just_wait {
            self.handle_start(None).await;
        }

        while let Some(command) = commands_rx.recv().await {
            match command {
                Command::Start { channels } => self.handle_start(channels).await,
                Command::Stop => self.handle_stop().await,
                Command::Quit => {
                    self.handle_stop().await;
                    self.state = State::Terminated;
                    self.broadcaster.send(&OutEnvelope::log("terminating"));
                    break;
                }
            }
        }
    }

    async fn handle_start(&mut self, channel_override: Option<Vec<String>>) {
        self.broadcaster.send(&OutEnvelope::log("start command received"));
        self.state = State::Connecting;

        let labels = channel_override.unwrap_or_else(|| self.config.channels.clone());
        let channels: Vec<ChannelSpec> = labels
            .into_iter()
            .enumerate()
            .map(|(index, name)| ChannelSpec { index, name })
            .collect();

        let driver_config = DriverAdcConfig {
            board_id: self.config.board_id,
            serial_port: self.config.serial_port.clone(),
            channels: channels.clone(),
            samples_per_epoch: self.config.samples_per_epoch,
        };

        if let Err(e) = self.driver.release_session().await {
            warn!(error = %e, "failed releasing a stale prior session, continuing anyway");
        }

        if let Err(e) = self.driver.open_session(driver_config).await {
            error!(error = %e, "failed to open acquisition session");
            self.broadcaster
                .send(&OutEnvelope::log_with_status(format!("start failed: {e}"), "error"));
            self.state = State::Idle;
            return;
        }

        if let Some(uri) = &self.config.streamer {
            if let Err(e) = self.driver.register_sideband(uri).await {
                warn!(error = %e, "sideband streamer registration failed, continuing without it");
            }
        }

        if let Err(e) = self.driver.start_sd_recording().await {
            warn!(error = %e, "on-board sd recording failed to start, continuing without it");
        }

        let driver_rx = match self.driver.start_acquisition().await {
            Ok(rx) => rx,
            Err(e) => {
                error!(error = %e, "failed to start acquisition stream");
                let _ = self.driver.release_session().await;
                self.broadcaster
                    .send(&OutEnvelope::log_with_status(format!("start failed: {e}"), "error"));
                self.state = State::Idle;
                return;
            }
        };

        let epoch_config = EpochConfig {
            samples_per_epoch: self.config.samples_per_epoch,
            sample_rate_hz: self.driver.sample_rate_hz(),
        };

        let sinks = self.build_sinks(epoch_config.sample_rate_hz);
        let fanout = FanOut::new(sinks, self.config.daemon.sink_queue_depth);

        let (epoch_tx, mut epoch_rx) = mpsc::channel::<CompletedEpoch>(4);
        let done = Arc::new(AtomicBool::new(false));

        let scheduler_task = tokio::spawn(brainwave_driver::run_scheduler(
            driver_rx,
            channels,
            epoch_config,
            epoch_tx,
            done.clone(),
        ));

        self.scheduler_done = Some(done);
        self.scheduler_task = Some(scheduler_task);

        // The relay task owns the FanOut for the life of the session, so
        // dropping it (on stop/abort) winds down every sink task with it.
        let relay_task = tokio::spawn(async move {
            while let Some(epoch) = epoch_rx.recv().await {
                fanout.dispatch(epoch);
            }
        });
        self.relay_task = Some(relay_task);

        self.state = State::Streaming;
        self.broadcaster.send(&OutEnvelope::BrainflowEvent {
            event: "connected".into(),
            timestamp: now_ms(),
        });
        self.broadcaster.send(&OutEnvelope::log_with_status("started", "ok"));
    }

    fn build_sinks(&self, sample_rate_hz: f64) -> Vec<std::sync::Arc<dyn crate::fanout::Sink>> {
        let tsdb = self
            .config
            .influx
            .as_ref()
            .map(|influx| TsdbSink::new(influx, sample_rate_hz));
        let csv = match CsvSink::new(&self.config.output_dir) {
            Ok(sink) => Some(sink),
            Err(e) => {
                warn!(error = %e, "failed to open csv sideband file, continuing without it");
                None
            }
        };
        let lsl = if self.config.lsl {
            match self.config.daemon.lsl_target_addr.parse() {
                Ok(target) => match LslSink::new(target) {
                    Ok(sink) => Some(sink),
                    Err(e) => {
                        warn!(error = %e, "failed to bind lsl sideband socket, continuing without it");
                        None
                    }
                },
                Err(e) => {
                    warn!(error = %e, target = %self.config.daemon.lsl_target_addr, "invalid lsl target address, continuing without it");
                    None
                }
            }
        } else {
            None
        };
        build_sinks(self.broadcaster.clone(), tsdb, csv, lsl)
    }

    async fn handle_stop(&mut self) {
        if self.state != State::Streaming && self.state != State::Connecting {
            self.broadcaster.send(&OutEnvelope::log_with_status("already stopped", "ok"));
            return;
        }

        if let Some(done) = self.scheduler_done.take() {
            done.store(true, Ordering::SeqCst);
        }
        if let Some(task) = self.scheduler_task.take() {
            let _ = tokio::time::timeout(
                std::time::Duration::from_secs(SHUTDOWN_GRACE_SECS),
                task,
            )
            .await;
        }
        if let Some(task) = self.relay_task.take() {
            task.abort();
        }

        if let Err(e) = self.driver.stop_sd_recording().await {
            warn!(error = %e, "stopping on-board sd recording reported an error, continuing anyway");
        }
        if let Err(e) = self.driver.stop_acquisition().await {
            warn!(error = %e, "stop_acquisition reported an error, releasing session anyway");
        }
        if let Err(e) = self.driver.release_session().await {
            error!(error = %e, "failed to release acquisition session during stop");
        }

        self.state = State::Idle;
        self.broadcaster.send(&OutEnvelope::BrainflowEvent {
            event: "stopped".into(),
            timestamp: now_ms(),
        });
        self.broadcaster.send(&OutEnvelope::log_with_status("stopped", "ok"));
    }
}
