//! Power consumption simulation
//!
//! Periodically advances the usage counters of every powered-on device of
//! the current session, prices the new totals, and switches a device off when
//! one of its cost ceilings is met.
//!
//! Cycles within one simulator never overlap: a cycle that finds another one
//! still running is dropped, not queued. Separate simulators (other processes
//! polling the same rows) are not coordinated; their read-modify-write updates
//! can overwrite each other.

mod classifier;
mod increment;
mod limits;

pub use classifier::{DeviceClassifier, DrawRange};
pub use increment::{IncrementGenerator, INCREMENT_STEP};
pub use limits::{first_breached, Breach};

use crate::core::{Config, Device, DeviceUpdate, LimitPeriod};
use crate::pricing::TariffCalculator;
use crate::store::{DeviceStore, SessionProvider};
use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Snapshot of the simulator's lifecycle flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SimulationStatus {
    pub enabled: bool,
    pub running: bool,
    pub interval_ms: u64,
}

/// What happened to one device during a cycle
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceOutcome {
    /// Powered off; left untouched
    Idle,
    Advanced {
        increment: f64,
        daily_usage: f64,
        monthly_usage: f64,
    },
    /// A ceiling was met; the device was switched off and the ceiling cleared
    ShutOff {
        period: LimitPeriod,
        limit: f64,
        cost: f64,
        increment: f64,
    },
    /// The store rejected the update
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceReport {
    pub device_id: String,
    pub outcome: DeviceOutcome,
}

/// Per-device results of one completed cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub devices: Vec<DeviceReport>,
}

impl TickReport {
    pub fn outcome_for(&self, device_id: &str) -> Option<&DeviceOutcome> {
        self.devices
            .iter()
            .find(|r| r.device_id == device_id)
            .map(|r| &r.outcome)
    }

    pub fn advanced(&self) -> usize {
        self.count(|o| matches!(o, DeviceOutcome::Advanced { .. }))
    }

    pub fn shutoffs(&self) -> usize {
        self.count(|o| matches!(o, DeviceOutcome::ShutOff { .. }))
    }

    pub fn failures(&self) -> usize {
        self.count(|o| matches!(o, DeviceOutcome::Failed(_)))
    }

    pub fn idle(&self) -> usize {
        self.count(|o| matches!(o, DeviceOutcome::Idle))
    }

    fn count(&self, pred: impl Fn(&DeviceOutcome) -> bool) -> usize {
        self.devices.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Why a cycle did not process any device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    AlreadyRunning,
    NoSession,
    StoreUnavailable,
    Panicked,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Completed(TickReport),
    Skipped(SkipReason),
}

impl TickOutcome {
    pub fn report(&self) -> Option<&TickReport> {
        match self {
            TickOutcome::Completed(report) => Some(report),
            TickOutcome::Skipped(_) => None,
        }
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            TickOutcome::Completed(_) => None,
            TickOutcome::Skipped(reason) => Some(*reason),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Trigger {
    Scheduled,
    Forced,
}

/// Clears the running flag when a cycle ends, including by panic
struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// Stored accumulators may be null-ish or corrupt; count those as zero.
fn usage_or_zero(kwh: f64) -> f64 {
    if kwh.is_finite() && kwh > 0.0 {
        kwh
    } else {
        0.0
    }
}

struct Inner {
    store: Arc<dyn DeviceStore>,
    session: Arc<dyn SessionProvider>,
    tariff: TariffCalculator,
    classifier: DeviceClassifier,
    generator: Mutex<IncrementGenerator>,
    interval_ms: u64,
    enabled: AtomicBool,
    running: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
    wake: Notify,
}

/// Consumption simulator for one session. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ConsumptionSimulator {
    inner: Arc<Inner>,
}

impl ConsumptionSimulator {
    /// Create a simulator from the application configuration
    pub fn new(
        store: Arc<dyn DeviceStore>,
        session: Arc<dyn SessionProvider>,
        config: &Config,
    ) -> Self {
        let generator = IncrementGenerator::new(&config.simulation);
        Self::with_generator(store, session, config, generator)
    }

    /// Same as [`new`](Self::new) with an explicit random source
    pub fn with_generator(
        store: Arc<dyn DeviceStore>,
        session: Arc<dyn SessionProvider>,
        config: &Config,
        generator: IncrementGenerator,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                session,
                tariff: TariffCalculator::new(&config.tariff),
                classifier: DeviceClassifier::new(&config.simulation),
                generator: Mutex::new(generator),
                interval_ms: config.simulation.interval_ms.max(1),
                enabled: AtomicBool::new(config.simulation.enabled),
                running: AtomicBool::new(false),
                task: Mutex::new(None),
                wake: Notify::new(),
            }),
        }
    }

    pub fn status(&self) -> SimulationStatus {
        SimulationStatus {
            enabled: self.inner.enabled.load(Ordering::Acquire),
            running: self.inner.running.load(Ordering::Acquire),
            interval_ms: self.inner.interval_ms,
        }
    }

    pub fn tariff(&self) -> &TariffCalculator {
        &self.inner.tariff
    }

    /// Enable the simulator and spawn the scheduling loop.
    ///
    /// Returns `false` if a loop is already active. Must be called from
    /// within a tokio runtime.
    pub fn start(&self) -> bool {
        let mut task = lock(&self.inner.task);
        self.inner.enabled.store(true, Ordering::Release);

        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }

        log::info!("Starting consumption simulation ({}ms interval)", self.inner.interval_ms);
        *task = Some(tokio::spawn(Inner::run_loop(self.inner.clone())));
        true
    }

    /// Disable the simulator. A cycle already in flight runs to completion;
    /// no further cycle is scheduled.
    pub fn stop(&self) {
        self.inner.enabled.store(false, Ordering::Release);
        // Stores a permit if the loop is between its enabled check and its sleep
        self.inner.wake.notify_one();
        log::info!("Consumption simulation stopped");
    }

    /// Run one scheduled cycle now
    pub async fn tick(&self) -> TickOutcome {
        Inner::guarded_cycle(self.inner.clone(), Trigger::Scheduled).await
    }

    /// Run one cycle immediately, outside the schedule. No-op while another
    /// cycle of this simulator is running.
    pub async fn force_update(&self) -> TickOutcome {
        Inner::guarded_cycle(self.inner.clone(), Trigger::Forced).await
    }
}

impl Inner {
    async fn run_loop(self: Arc<Self>) {
        let interval = Duration::from_millis(self.interval_ms);

        loop {
            Inner::guarded_cycle(self.clone(), Trigger::Scheduled).await;

            if !self.keep_looping() {
                break;
            }

            self.wait_next(interval).await;

            if !self.keep_looping() {
                break;
            }
        }

        log::debug!("Simulation loop exited");
    }

    /// Sleep until the next cycle is due or `stop` wakes the loop
    async fn wait_next(&self, interval: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = self.wake.notified() => {}
        }
    }

    // Decided under the task lock so a concurrent `start` either sees this
    // loop still registered or finds the slot empty.
    fn keep_looping(&self) -> bool {
        let mut task = lock(&self.task);
        if self.enabled.load(Ordering::Acquire) {
            return true;
        }
        task.take();
        false
    }

    /// Run a cycle on its own task so a panic is contained and logged
    async fn guarded_cycle(self: Arc<Self>, trigger: Trigger) -> TickOutcome {
        match tokio::spawn(self.run_cycle(trigger)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("Consumption simulation cycle failed: {}", e);
                TickOutcome::Skipped(SkipReason::Panicked)
            }
        }
    }

    async fn run_cycle(self: Arc<Self>, trigger: Trigger) -> TickOutcome {
        if !self.enabled.load(Ordering::Acquire) {
            return TickOutcome::Skipped(SkipReason::Disabled);
        }

        let Some(_running) = RunningGuard::acquire(&self.running) else {
            log::debug!("{:?} cycle skipped: simulation already in progress", trigger);
            return TickOutcome::Skipped(SkipReason::AlreadyRunning);
        };

        log::debug!("Running {:?} consumption simulation cycle", trigger);

        let Some(owner) = self.session.current_owner() else {
            log::debug!("No active session, skipping simulation");
            return TickOutcome::Skipped(SkipReason::NoSession);
        };

        let devices = match self.store.list_by_owner(&owner).await {
            Ok(devices) => devices,
            Err(e) => {
                log::error!("Error fetching devices: {}", e);
                return TickOutcome::Skipped(SkipReason::StoreUnavailable);
            }
        };

        if devices.is_empty() {
            log::debug!("No devices found for simulation");
            return TickOutcome::Completed(TickReport::default());
        }

        log::debug!("Simulating consumption for {} devices", devices.len());

        // One device at a time: a shutoff is persisted before the next
        // device is priced.
        let mut report = TickReport::default();
        for device in &devices {
            let outcome = self.process_device(device).await;
            report.devices.push(DeviceReport {
                device_id: device.id.clone(),
                outcome,
            });
        }

        TickOutcome::Completed(report)
    }

    async fn process_device(&self, device: &Device) -> DeviceOutcome {
        if !device.power_status {
            return DeviceOutcome::Idle;
        }

        let class = self.classifier.classify(&device.name, device.device_type.as_deref());
        let range = self.classifier.range_for(class);

        let (increment, draw) = {
            let mut generator = lock(&self.generator);
            let is_new = generator.is_new(device);
            let increment = generator.next_increment(range, is_new, self.interval_ms);
            (increment, generator.current_draw(range, is_new))
        };

        let daily_usage = usage_or_zero(device.daily_usage) + increment;
        let monthly_usage = usage_or_zero(device.monthly_usage) + increment;
        let costs = self.tariff.period_costs(daily_usage, monthly_usage);

        let mut patch = DeviceUpdate {
            daily_usage: Some(daily_usage),
            monthly_usage: Some(monthly_usage),
            updated_at: Some(Utc::now()),
            ..Default::default()
        };

        let outcome = match first_breached(device, &costs) {
            Some(breach) => {
                patch.power_status = Some(false);
                patch.current_consumption = Some(0.0);
                patch.set_limit(breach.period, None);
                DeviceOutcome::ShutOff {
                    period: breach.period,
                    limit: breach.limit,
                    cost: breach.cost,
                    increment,
                }
            }
            None => {
                patch.current_consumption = Some(draw);
                DeviceOutcome::Advanced {
                    increment,
                    daily_usage,
                    monthly_usage,
                }
            }
        };

        if let Err(e) = self.store.update(&device.id, &patch).await {
            log::error!("Error updating device consumption for {}: {}", device.id, e);
            return DeviceOutcome::Failed(e.to_string());
        }

        match &outcome {
            DeviceOutcome::ShutOff { period, limit, .. } => log::info!(
                "Device {} turned off: {} cost limit of {} {} reached and has been reset",
                device.name,
                period,
                limit,
                self.tariff.currency()
            ),
            _ => log::debug!(
                "Updated {} ({}): current {:.2} kW, +{:.3} kWh (daily {:.3}, monthly {:.3})",
                device.name,
                class,
                draw,
                increment,
                daily_usage,
                monthly_usage
            ),
        }

        outcome
    }
}
