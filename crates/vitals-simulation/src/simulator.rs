//! Periodic vital-signs simulator with bounded history and a single observer

use crate::config::{ObserverErrorPolicy, SimulatorConfig};
use crate::history::ReadingHistory;
use crate::plot::VitalsPlot;
use crate::vitals_generator::VitalsGenerator;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use vitals_core::{Reading, VitalsError, VitalsResult};

/// Observer invoked once per generated reading, on the worker task
pub type Observer = Box<dyn FnMut(&Reading) -> anyhow::Result<()> + Send>;

/// Simulator lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulatorState {
    Stopped,
    Running,
}

/// Simulator statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorStats {
    pub state: SimulatorState,
    /// Readings generated since construction, across restarts
    pub readings_generated: u64,
    pub observer_failures: u64,
    pub history_len: usize,
}

/// Observer slot; `version` changes on every set or clear
#[derive(Default)]
struct ObserverSlot {
    callback: Option<Observer>,
    version: u64,
}

impl ObserverSlot {
    fn replace(&mut self, callback: Option<Observer>) {
        self.callback = callback;
        self.version = self.version.wrapping_add(1);
    }
}

/// State shared between the controlling handle and the worker task
struct Shared {
    generator: Mutex<VitalsGenerator>,
    history: Option<Mutex<ReadingHistory>>,
    observer: Mutex<ObserverSlot>,
    running: watch::Sender<bool>,
    /// Id of the most recently started worker
    run_id: AtomicU64,
    readings_generated: AtomicU64,
    observer_failures: AtomicU64,
}

impl Shared {
    /// One generation step: draw, record, notify.
    fn tick(&self, policy: ObserverErrorPolicy) -> ControlFlow<()> {
        let reading = self.generator.lock().next_reading();

        if let Some(history) = &self.history {
            history.lock().push(reading);
        }
        self.readings_generated.fetch_add(1, Ordering::Relaxed);

        debug!(
            timestamp = reading.timestamp,
            heart_rate = reading.heart_rate,
            blood_pressure = %reading.blood_pressure,
            spo2 = reading.spo2,
            "Generated reading"
        );

        // The slot is unlocked during the call so the observer may set or
        // clear the callback itself. It goes back only if nobody did.
        let (callback, version) = {
            let mut slot = self.observer.lock();
            (slot.callback.take(), slot.version)
        };
        let Some(mut callback) = callback else {
            return ControlFlow::Continue(());
        };
        let result = callback(&reading);
        {
            let mut slot = self.observer.lock();
            if slot.version == version {
                slot.callback = Some(callback);
            }
        }

        if let Err(e) = result {
            self.observer_failures.fetch_add(1, Ordering::Relaxed);
            let cause = format!("{:#}", e);
            match policy {
                ObserverErrorPolicy::Stop => {
                    error!(error = %cause, "Observer failed, stopping data stream");
                    return ControlFlow::Break(());
                }
                ObserverErrorPolicy::Continue => {
                    warn!(error = %cause, "Observer failed, continuing");
                }
            }
        }

        ControlFlow::Continue(())
    }
}

/// Clears the running flag when the worker exits, including by panic.
///
/// A worker that is no longer the most recent one leaves the flag alone.
struct RunningGuard {
    shared: Arc<Shared>,
    run_id: u64,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        let shared = &self.shared;
        let run_id = self.run_id;
        shared.running.send_if_modified(|running| {
            let current = shared.run_id.load(Ordering::SeqCst) == run_id;
            if current {
                *running = false;
            }
            current
        });
    }
}

struct Worker {
    /// Taken once the stop signal has been sent
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

async fn run_generation_loop(
    shared: Arc<Shared>,
    run_id: u64,
    period: Duration,
    policy: ObserverErrorPolicy,
    mut shutdown: oneshot::Receiver<()>,
) {
    let guard = RunningGuard { shared, run_id };
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            // Also fires when the simulator handle is dropped.
            _ = &mut shutdown => break,

            _ = ticker.tick() => {
                if guard.shared.tick(policy).is_break() {
                    break;
                }
            }
        }
    }
}

/// Synthetic medical device emitting one reading per tick
///
/// Construct it explicitly and pass it to whatever needs it. `start()`
/// spawns the worker on the current tokio runtime; `stop()` signals it and
/// waits until it has exited. Dropping a running simulator signals the
/// worker without waiting.
pub struct MedicalDeviceSimulator {
    config: SimulatorConfig,
    shared: Arc<Shared>,
    /// Held by `stop()` across the join, so `start()` cannot slip in
    worker: tokio::sync::Mutex<Option<Worker>>,
}

impl MedicalDeviceSimulator {
    /// Create new simulator. The initial state is [`SimulatorState::Stopped`].
    pub fn new(config: SimulatorConfig) -> VitalsResult<Self> {
        config.validate()?;

        let generator = VitalsGenerator::new(&config.generator)?;
        let (running, _) = watch::channel(false);

        let shared = Shared {
            generator: Mutex::new(generator),
            history: config.max_history.map(|n| Mutex::new(ReadingHistory::new(n))),
            observer: Mutex::new(ObserverSlot::default()),
            running,
            run_id: AtomicU64::new(0),
            readings_generated: AtomicU64::new(0),
            observer_failures: AtomicU64::new(0),
        };

        Ok(MedicalDeviceSimulator {
            config,
            shared: Arc::new(shared),
            worker: tokio::sync::Mutex::new(None),
        })
    }

    /// Start generating readings in a background task.
    ///
    /// Fails with [`VitalsError::AlreadyRunning`] if a worker is alive or a
    /// `stop()` is still joining it, and with [`VitalsError::NoRuntime`]
    /// outside a tokio runtime.
    pub fn start(&self) -> VitalsResult<()> {
        let Ok(mut slot) = self.worker.try_lock() else {
            return Err(VitalsError::AlreadyRunning);
        };

        if let Some(worker) = slot.as_ref() {
            if !worker.handle.is_finished() {
                return Err(VitalsError::AlreadyRunning);
            }
            debug!("Reaping worker that exited on its own");
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| VitalsError::NoRuntime)?;

        let (shutdown, shutdown_rx) = oneshot::channel();
        let run_id = self.shared.run_id.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
        self.shared.running.send_replace(true);
        let handle = runtime.spawn(run_generation_loop(
            Arc::clone(&self.shared),
            run_id,
            self.config.tick_interval(),
            self.config.observer_error_policy,
            shutdown_rx,
        ));
        *slot = Some(Worker {
            shutdown: Some(shutdown),
            handle,
        });

        info!(
            tick_interval_ms = self.config.tick_interval_ms,
            max_history = ?self.config.max_history,
            "Data stream started"
        );
        Ok(())
    }

    /// Stop the worker and wait for it to exit.
    ///
    /// No observer call happens after this returns. Stopping a stopped
    /// simulator is a no-op. A worker that panicked is reported as
    /// [`VitalsError::WorkerPanicked`].
    pub async fn stop(&self) -> VitalsResult<()> {
        let mut slot = self.worker.lock().await;
        let Some(worker) = slot.as_mut() else {
            return Ok(());
        };

        if let Some(shutdown) = worker.shutdown.take() {
            // Err only means the worker already exited.
            let _ = shutdown.send(());
        }
        // The worker stays in the slot until joined, so a cancelled stop()
        // still leaves it visible to start().
        let joined = (&mut worker.handle).await;
        *slot = None;

        info!(
            readings_generated = self.shared.readings_generated.load(Ordering::Relaxed),
            "Data stream stopped"
        );
        joined.map_err(|e| VitalsError::WorkerPanicked {
            reason: e.to_string(),
        })
    }

    /// Resolve once no worker is running, without stopping it.
    ///
    /// Lets a host notice a worker that ended itself after an observer
    /// failure.
    pub async fn stopped(&self) {
        let mut running = self.shared.running.subscribe();
        let _ = running.wait_for(|running| !*running).await;
    }

    /// Register the observer, replacing any previous one.
    ///
    /// The observer runs on the worker task and may itself call
    /// `set_callback` or `clear_callback`. A call already in flight on the
    /// previous observer finishes; no later tick reaches it.
    pub fn set_callback<F>(&self, observer: F)
    where
        F: FnMut(&Reading) -> anyhow::Result<()> + Send + 'static,
    {
        self.shared.observer.lock().replace(Some(Box::new(observer)));
    }

    pub fn clear_callback(&self) {
        self.shared.observer.lock().replace(None);
    }

    /// Plot of the current history; empty when there is none
    pub fn plot(&self) -> VitalsPlot {
        VitalsPlot::from_readings(&self.history())
    }

    /// Snapshot of the history, oldest first
    pub fn history(&self) -> Vec<Reading> {
        self.shared
            .history
            .as_ref()
            .map(|history| history.lock().to_vec())
            .unwrap_or_default()
    }

    /// Most recent reading in history
    pub fn latest(&self) -> Option<Reading> {
        self.shared
            .history
            .as_ref()
            .and_then(|history| history.lock().latest().copied())
    }

    pub fn state(&self) -> SimulatorState {
        if *self.shared.running.borrow() {
            SimulatorState::Running
        } else {
            SimulatorState::Stopped
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == SimulatorState::Running
    }

    pub fn stats(&self) -> SimulatorStats {
        SimulatorStats {
            state: self.state(),
            readings_generated: self.shared.readings_generated.load(Ordering::Relaxed),
            observer_failures: self.shared.observer_failures.load(Ordering::Relaxed),
            history_len: self
                .shared
                .history
                .as_ref()
                .map_or(0, |history| history.lock().len()),
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::mpsc;
    use tokio::time::{sleep, timeout};

    const TICK_MS: u64 = 20;

    fn test_config(max_history: Option<usize>) -> SimulatorConfig {
        SimulatorConfig {
            max_history,
            tick_interval_ms: TICK_MS,
            ..Default::default()
        }
    }

    async fn wait_until(condition: impl Fn() -> bool) {
        timeout(Duration::from_secs(5), async {
            while !condition() {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached within 5s");
    }

    fn counting_observer(simulator: &MedicalDeviceSimulator) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let observed = Arc::clone(&count);
        simulator.set_callback(move |_| {
            observed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        count
    }

    #[tokio::test]
    async fn test_initial_state_stopped() {
        let simulator = MedicalDeviceSimulator::new(test_config(Some(3))).unwrap();
        assert_eq!(simulator.state(), SimulatorState::Stopped);
        assert!(simulator.history().is_empty());
        assert!(simulator.latest().is_none());
        assert!(simulator.plot().is_empty());
        assert!(simulator.stop().await.is_ok());
    }

    #[tokio::test]
    async fn test_history_keeps_most_recent_readings() {
        let simulator = MedicalDeviceSimulator::new(test_config(Some(3))).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        simulator.set_callback(move |reading| {
            let _ = tx.send(*reading);
            Ok(())
        });

        simulator.start().unwrap();
        let mut received = Vec::new();
        for _ in 0..5 {
            received.push(rx.recv().await.unwrap());
        }
        simulator.stop().await.unwrap();
        while let Ok(reading) = rx.try_recv() {
            received.push(reading);
        }

        let history = simulator.history();
        assert_eq!(history.len(), 3);
        assert!(history[0].timestamp < history[1].timestamp);
        assert!(history[1].timestamp < history[2].timestamp);
        // Same readings the observer saw, in the same order
        assert_eq!(history, received[received.len() - 3..].to_vec());
        assert_eq!(simulator.latest(), received.last().copied());
    }

    #[tokio::test]
    async fn test_observer_called_once_per_tick() {
        let simulator = MedicalDeviceSimulator::new(test_config(Some(100))).unwrap();
        let collected = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&collected);
        simulator.set_callback(move |reading| {
            sink.lock().push(*reading);
            Ok(())
        });

        simulator.start().unwrap();
        wait_until(|| collected.lock().len() >= 3).await;
        simulator.stop().await.unwrap();

        let collected = collected.lock().clone();
        assert!(collected.len() >= 3);
        assert_eq!(collected, simulator.history());
        assert_eq!(simulator.stats().readings_generated, collected.len() as u64);
        assert!(collected.iter().all(|r| simulator.config().generator.ranges.contains(r)));
    }

    #[tokio::test]
    async fn test_no_observer_calls_after_stop() {
        let simulator = MedicalDeviceSimulator::new(test_config(Some(10))).unwrap();
        let count = counting_observer(&simulator);

        simulator.start().unwrap();
        wait_until(|| count.load(Ordering::SeqCst) >= 2).await;
        simulator.stop().await.unwrap();
        assert_eq!(simulator.state(), SimulatorState::Stopped);

        let after_stop = count.load(Ordering::SeqCst);
        sleep(Duration::from_millis(TICK_MS * 5)).await;
        assert_eq!(count.load(Ordering::SeqCst), after_stop);

        // Idempotent
        assert!(simulator.stop().await.is_ok());
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test]
    async fn test_stop_interrupts_long_interval() {
        let mut config = test_config(Some(10));
        config.tick_interval_ms = 60_000;
        let simulator = MedicalDeviceSimulator::new(config).unwrap();

        simulator.start().unwrap();
        wait_until(|| simulator.stats().readings_generated == 1).await;

        let stopped = timeout(Duration::from_secs(2), simulator.stop()).await;
        assert!(stopped.is_ok(), "stop() waited out the tick interval");
        assert_eq!(simulator.history().len(), 1);
    }

    #[tokio::test]
    async fn test_start_twice_rejected() {
        let simulator = MedicalDeviceSimulator::new(test_config(Some(10))).unwrap();
        simulator.start().unwrap();
        assert_eq!(simulator.start(), Err(VitalsError::AlreadyRunning));
        assert!(simulator.is_running());
        simulator.stop().await.unwrap();
    }

    #[test]
    fn test_start_without_runtime() {
        let simulator = MedicalDeviceSimulator::new(test_config(Some(10))).unwrap();
        assert_eq!(simulator.start(), Err(VitalsError::NoRuntime));
        assert_eq!(simulator.state(), SimulatorState::Stopped);
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let simulator = MedicalDeviceSimulator::new(test_config(Some(10))).unwrap();

        simulator.start().unwrap();
        wait_until(|| simulator.stats().readings_generated >= 1).await;
        simulator.stop().await.unwrap();
        let first_run = simulator.history().len();

        simulator.start().unwrap();
        wait_until(|| simulator.history().len() > first_run).await;
        simulator.stop().await.unwrap();

        let history = simulator.history();
        assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[tokio::test]
    async fn test_set_callback_replaces_observer() {
        let simulator = MedicalDeviceSimulator::new(test_config(Some(10))).unwrap();
        let first = counting_observer(&simulator);

        simulator.start().unwrap();
        wait_until(|| first.load(Ordering::SeqCst) >= 1).await;

        let second = counting_observer(&simulator);
        // Ticks run in order, so once the second observer has run the first
        // has no call in flight.
        wait_until(|| second.load(Ordering::SeqCst) >= 1).await;
        let first_final = first.load(Ordering::SeqCst);
        wait_until(|| second.load(Ordering::SeqCst) >= 3).await;
        simulator.stop().await.unwrap();

        assert_eq!(first.load(Ordering::SeqCst), first_final);
    }

    #[tokio::test]
    async fn test_observer_replaces_itself() {
        let simulator = Arc::new(MedicalDeviceSimulator::new(test_config(Some(10))).unwrap());
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let handle = Arc::downgrade(&simulator);
        let first_calls = Arc::clone(&first);
        let second_calls = Arc::clone(&second);
        simulator.set_callback(move |_| {
            first_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(simulator) = handle.upgrade() {
                let second_calls = Arc::clone(&second_calls);
                simulator.set_callback(move |_| {
                    second_calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                });
            }
            Ok(())
        });

        simulator.start().unwrap();
        wait_until(|| second.load(Ordering::SeqCst) >= 2).await;
        simulator.stop().await.unwrap();

        assert_eq!(first.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_observer_clears_itself() {
        let simulator = Arc::new(MedicalDeviceSimulator::new(test_config(Some(10))).unwrap());
        let calls = Arc::new(AtomicUsize::new(0));

        let handle = Arc::downgrade(&simulator);
        let observed = Arc::clone(&calls);
        simulator.set_callback(move |_| {
            observed.fetch_add(1, Ordering::SeqCst);
            if let Some(simulator) = handle.upgrade() {
                simulator.clear_callback();
            }
            Ok(())
        });

        simulator.start().unwrap();
        wait_until(|| simulator.stats().readings_generated >= 3).await;
        simulator.stop().await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_start_rejected_while_stop_joins() {
        let simulator = Arc::new(MedicalDeviceSimulator::new(test_config(Some(10))).unwrap());
        let calls = Arc::new(AtomicUsize::new(0));
        let observed = Arc::clone(&calls);
        simulator.set_callback(move |_| {
            observed.fetch_add(1, Ordering::SeqCst);
            // Keeps the worker busy while stop() waits on it
            std::thread::sleep(Duration::from_millis(200));
            Ok(())
        });

        simulator.start().unwrap();
        wait_until(|| calls.load(Ordering::SeqCst) >= 1).await;

        let stopping = Arc::clone(&simulator);
        let stop_task = tokio::spawn(async move { stopping.stop().await });
        wait_until(|| simulator.worker.try_lock().is_err()).await;

        assert_eq!(simulator.start(), Err(VitalsError::AlreadyRunning));
        assert!(simulator.is_running());

        stop_task.await.unwrap().unwrap();
        assert_eq!(simulator.state(), SimulatorState::Stopped);
        let generated = simulator.stats().readings_generated;
        sleep(Duration::from_millis(TICK_MS * 5)).await;
        assert_eq!(simulator.stats().readings_generated, generated);

        // The next run owns the running flag
        simulator.clear_callback();
        simulator.start().unwrap();
        wait_until(|| simulator.stats().readings_generated >= generated + 3).await;
        assert!(simulator.is_running());
        simulator.stop().await.unwrap();
        assert!(!simulator.is_running());
    }

    #[tokio::test]
    async fn test_concurrent_stops_both_return_after_join() {
        let simulator = MedicalDeviceSimulator::new(test_config(Some(10))).unwrap();
        let count = counting_observer(&simulator);

        simulator.start().unwrap();
        wait_until(|| count.load(Ordering::SeqCst) >= 1).await;

        let (first, second) = tokio::join!(simulator.stop(), simulator.stop());
        assert!(first.is_ok());
        assert!(second.is_ok());
        assert_eq!(simulator.state(), SimulatorState::Stopped);

        let after_stop = count.load(Ordering::SeqCst);
        sleep(Duration::from_millis(TICK_MS * 3)).await;
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test]
    async fn test_observer_error_stops_loop() {
        let simulator = MedicalDeviceSimulator::new(test_config(Some(10))).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let observed = Arc::clone(&calls);
        simulator.set_callback(move |_| {
            if observed.fetch_add(1, Ordering::SeqCst) == 1 {
                anyhow::bail!("display disconnected");
            }
            Ok(())
        });

        simulator.start().unwrap();
        timeout(Duration::from_secs(5), simulator.stopped())
            .await
            .expect("worker kept running after observer failure");

        let stats = simulator.stats();
        assert_eq!(stats.state, SimulatorState::Stopped);
        assert_eq!(stats.readings_generated, 2);
        assert_eq!(stats.observer_failures, 1);
        assert!(simulator.stop().await.is_ok());

        // A worker that ended itself can be restarted
        simulator.clear_callback();
        simulator.start().unwrap();
        wait_until(|| simulator.stats().readings_generated >= 3).await;
        simulator.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_observer_error_continue_policy() {
        let mut config = test_config(Some(10));
        config.observer_error_policy = ObserverErrorPolicy::Continue;
        let simulator = MedicalDeviceSimulator::new(config).unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let observed = Arc::clone(&calls);
        simulator.set_callback(move |_| {
            observed.fetch_add(1, Ordering::SeqCst);
            Err(anyhow::anyhow!("always failing"))
        });

        simulator.start().unwrap();
        wait_until(|| calls.load(Ordering::SeqCst) >= 3).await;
        assert!(simulator.is_running());
        simulator.stop().await.unwrap();

        assert_eq!(
            simulator.stats().observer_failures,
            calls.load(Ordering::SeqCst) as u64
        );
    }

    #[tokio::test]
    async fn test_observer_panic_reported_on_stop() {
        let simulator = MedicalDeviceSimulator::new(test_config(Some(10))).unwrap();
        simulator.set_callback(|_| panic!("observer blew up"));

        simulator.start().unwrap();
        wait_until(|| !simulator.is_running()).await;

        assert!(matches!(
            simulator.stop().await,
            Err(VitalsError::WorkerPanicked { .. })
        ));
        assert_eq!(simulator.history().len(), 1);
    }

    #[tokio::test]
    async fn test_without_history_tracking() {
        let simulator = MedicalDeviceSimulator::new(test_config(None)).unwrap();
        let count = counting_observer(&simulator);

        simulator.start().unwrap();
        wait_until(|| count.load(Ordering::SeqCst) >= 3).await;
        simulator.stop().await.unwrap();

        assert!(simulator.history().is_empty());
        assert!(simulator.latest().is_none());
        assert!(simulator.plot().is_empty());
        assert_eq!(simulator.stats().history_len, 0);
    }

    #[tokio::test]
    async fn test_plot_reflects_history() {
        let simulator = MedicalDeviceSimulator::new(test_config(Some(4))).unwrap();
        simulator.start().unwrap();
        wait_until(|| simulator.history().len() == 4).await;
        simulator.stop().await.unwrap();

        let history = simulator.history();
        let plot = simulator.plot();
        assert_eq!(plot.panels.len(), 3);

        let heart_rate = &plot.panel("Heart Rate").unwrap().series[0];
        let expected: Vec<f64> = history.iter().map(|r| f64::from(r.heart_rate)).collect();
        assert_eq!(heart_rate.y, expected);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = MedicalDeviceSimulator::new(test_config(Some(0)));
        assert!(matches!(result, Err(VitalsError::InvalidConfig { .. })));
    }
}
