use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use flute_bmc::BmcClient;
use flute_common::{NodeDetail, NodeInventory, NodeStatusUpdate, ReconcileError};
use flute_store::InventoryStore;

use crate::config::IpmiConfig;
use crate::guard::PassGuard;
use crate::metrics::SharedMetrics;
use crate::pass::{run_detail_pass, run_full_pass, run_status_pass, PassKind, PassReport};

/// What a trigger did.
#[derive(Debug)]
pub enum PassOutcome<T> {
    /// The pass ran. An enumeration failure completes with an empty report.
    Completed(PassReport<T>),
    /// The same pass was already in flight; nothing was probed.
    AlreadyRunning,
}

impl<T> PassOutcome<T> {
    pub fn report(&self) -> Option<&PassReport<T>> {
        match self {
            PassOutcome::Completed(r) => Some(r),
            PassOutcome::AlreadyRunning => None,
        }
    }
}

/// Owns the collaborators and the per-pass overlap guards for one fleet.
///
/// Independent instances share nothing, so several schedulers (one per fleet
/// segment, say) can run side by side.
pub struct InventoryScheduler {
    store: Arc<dyn InventoryStore>,
    bmc: Arc<dyn BmcClient>,
    config: IpmiConfig,
    metrics: Arc<SharedMetrics>,
    full: PassGuard,
    status: PassGuard,
    detail: PassGuard,
}

impl InventoryScheduler {
    pub fn new(
        store: Arc<dyn InventoryStore>,
        bmc: Arc<dyn BmcClient>,
        config: IpmiConfig,
        metrics: Arc<SharedMetrics>,
    ) -> Self {
        Self {
            store,
            bmc,
            config,
            metrics,
            full: PassGuard::new(),
            status: PassGuard::new(),
            detail: PassGuard::new(),
        }
    }

    pub fn config(&self) -> &IpmiConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<SharedMetrics> {
        &self.metrics
    }

    fn guard(&self, kind: PassKind) -> &PassGuard {
        match kind {
            PassKind::Full => &self.full,
            PassKind::Status => &self.status,
            PassKind::Detail => &self.detail,
        }
    }

    pub fn is_running(&self, kind: PassKind) -> bool {
        self.guard(kind).is_busy()
    }

    async fn guarded<T, Fut>(&self, kind: PassKind, pass: Fut) -> PassOutcome<T>
    where
        Fut: Future<Output = Result<PassReport<T>, ReconcileError>>,
    {
        let Some(_permit) = self.guard(kind).try_acquire() else {
            self.metrics.record_skipped(kind);
            info!(pass=%kind, "previous pass still running, trigger dropped");
            return PassOutcome::AlreadyRunning;
        };

        match pass.await {
            Ok(report) => {
                self.metrics.record_report(&report);
                PassOutcome::Completed(report)
            }
            Err(e) => {
                self.metrics.record_enumeration_error(kind);
                warn!(pass=%kind, error=%e, "pass aborted");
                PassOutcome::Completed(PassReport::empty(kind))
            }
        }
    }

    /// Full inventory pass, unless one is already in flight.
    pub async fn check_all(&self) -> PassOutcome<NodeInventory> {
        let pass = run_full_pass(self.store.as_ref(), self.bmc.as_ref(), &self.config);
        self.guarded(PassKind::Full, pass).await
    }

    /// Power state pass, unless one is already in flight.
    pub async fn check_status(&self) -> PassOutcome<NodeStatusUpdate> {
        let pass = run_status_pass(self.store.as_ref(), self.bmc.as_ref(), &self.config);
        self.guarded(PassKind::Status, pass).await
    }

    /// Processor detail pass, unless one is already in flight.
    pub async fn check_nodes_detail(&self) -> PassOutcome<NodeDetail> {
        let pass = run_detail_pass(self.store.as_ref(), self.bmc.as_ref(), &self.config);
        self.guarded(PassKind::Detail, pass).await
    }

    async fn trigger(&self, kind: PassKind) {
        match kind {
            PassKind::Full => {
                self.check_all().await;
            }
            PassKind::Status => {
                self.check_status().await;
            }
            PassKind::Detail => {
                self.check_nodes_detail().await;
            }
        }
    }

    /// Fire one full pass after the configured interval. Returns immediately.
    pub fn queue_check_all(self: &Arc<Self>) -> JoinHandle<PassOutcome<NodeInventory>> {
        let this = Arc::clone(self);
        let delay = self.config.check_all_interval;
        log_rerun(self.config.debug, PassKind::Full, delay);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.check_all().await
        })
    }

    /// Run `kind` now and then once per `interval` until the task is shut down.
    pub fn start_cycle(self: &Arc<Self>, kind: PassKind, interval: Duration) -> PeriodicTask {
        let this = Arc::clone(self);
        let debug_on = self.config.debug;
        PeriodicTask::spawn(kind, interval, move || {
            let this = Arc::clone(&this);
            async move {
                this.trigger(kind).await;
                log_rerun(debug_on, kind, interval);
            }
        })
    }

    /// Start every cycle that has an interval configured. The full cycle
    /// always runs.
    pub fn start(self: &Arc<Self>) -> Vec<PeriodicTask> {
        let mut tasks = vec![self.start_cycle(PassKind::Full, self.config.check_all_interval)];
        if let Some(interval) = self.config.check_status_interval {
            tasks.push(self.start_cycle(PassKind::Status, interval));
        }
        if let Some(interval) = self.config.check_detail_interval {
            tasks.push(self.start_cycle(PassKind::Detail, interval));
        }
        tasks
    }
}

fn log_rerun(debug_on: bool, kind: PassKind, delay: Duration) {
    let delay_ms = delay.as_millis() as u64;
    if debug_on {
        info!(pass=%kind, delay_ms, "rerunning pass after delay");
    } else {
        debug!(pass=%kind, delay_ms, "rerunning pass after delay");
    }
}

/// A repeating background job with a cancellable timer.
///
/// The tick runs, then the task sleeps `interval`, forever. Cancelling
/// interrupts the sleep; a tick already running is allowed to finish.
pub struct PeriodicTask {
    kind: PassKind,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    pub fn spawn<F, Fut>(kind: PassKind, interval: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let child = token.clone();
        let handle = tokio::spawn(async move {
            info!(pass=%kind, interval_ms = interval.as_millis() as u64, "cycle started");
            loop {
                // A panicking tick must not end the cycle.
                if let Err(e) = tokio::spawn(tick()).await {
                    error!(pass=%kind, error=%e, "pass task failed");
                }
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            info!(pass=%kind, "cycle stopped");
        });
        Self {
            kind,
            token,
            handle,
        }
    }

    pub fn kind(&self) -> PassKind {
        self.kind
    }

    /// Request a stop without waiting for it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the cycle and wait for an in-flight tick to finish.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            warn!(pass=%self.kind, error=%e, "cycle task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{controller, node_row, FlakyStore, IP_A};
    use flute_bmc::MemoryBmc;
    use flute_store::MemoryInventoryStore;
    use std::sync::atomic::{AtomicU32, Ordering};
    use uuid::Uuid;

    const INTERVAL: Duration = Duration::from_millis(1_000);

    fn scheduler(store: Arc<dyn InventoryStore>) -> (Arc<InventoryScheduler>, MemoryBmc) {
        let bmc = MemoryBmc::new();
        let config = IpmiConfig {
            check_all_interval: INTERVAL,
            ..IpmiConfig::default()
        };
        let sched = InventoryScheduler::new(
            store,
            Arc::new(bmc.clone()),
            config,
            Arc::new(SharedMetrics::default()),
        );
        (Arc::new(sched), bmc)
    }

    async fn one_node_fleet() -> (Arc<InventoryScheduler>, MemoryBmc, MemoryInventoryStore) {
        let store = MemoryInventoryStore::new();
        let (sched, bmc) = scheduler(Arc::new(store.clone()));
        let uuid = Uuid::new_v4();
        store.insert_node(node_row(uuid, IP_A)).await;
        bmc.set_controller(IP_A, controller("S1", uuid)).await;
        (sched, bmc, store)
    }

    fn full_runs(sched: &InventoryScheduler) -> u64 {
        sched.metrics().full.runs_total.load(Ordering::Relaxed)
    }

    #[tokio::test]
    async fn trigger_while_in_flight_is_dropped() {
        let (sched, bmc, _store) = one_node_fleet().await;

        let permit = sched.full.try_acquire();
        assert!(sched.is_running(PassKind::Full));
        assert!(matches!(sched.check_all().await, PassOutcome::AlreadyRunning));
        assert!(bmc.calls().await.is_empty());
        assert_eq!(sched.metrics().full.skipped_total.load(Ordering::Relaxed), 1);

        // Other pass types are not blocked.
        assert!(sched.check_status().await.report().is_some());

        drop(permit);
        let outcome = sched.check_all().await;
        assert_eq!(outcome.report().map(|r| r.updated.len()), Some(1));
        assert!(!sched.is_running(PassKind::Full));
    }

    #[tokio::test]
    async fn enumeration_failure_completes_empty() {
        let store = FlakyStore::new(MemoryInventoryStore::new());
        store.fail_enumeration(true);
        let (sched, _bmc) = scheduler(Arc::new(store));

        let outcome = sched.check_nodes_detail().await;
        let report = outcome.report().unwrap();
        assert!(report.updated.is_empty());
        assert_eq!(report.failed, 0);
        assert_eq!(
            sched.metrics().detail.enumeration_errors_total.load(Ordering::Relaxed),
            1
        );
        assert!(!sched.is_running(PassKind::Detail));
    }

    #[tokio::test(start_paused = true)]
    async fn queued_pass_fires_after_delay() {
        let (sched, _bmc, _store) = one_node_fleet().await;

        let handle = sched.queue_check_all();
        tokio::time::sleep(INTERVAL / 2).await;
        assert_eq!(full_runs(&sched), 0);

        let outcome = handle.await.unwrap();
        assert_eq!(outcome.report().map(|r| r.updated.len()), Some(1));
        assert_eq!(full_runs(&sched), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cycle_repeats_until_shutdown() {
        let (sched, _bmc, _store) = one_node_fleet().await;

        let task = sched.start_cycle(PassKind::Full, INTERVAL);
        tokio::time::sleep(INTERVAL * 2 + INTERVAL / 2).await;
        assert_eq!(full_runs(&sched), 3);

        task.shutdown().await;
        tokio::time::sleep(INTERVAL * 5).await;
        assert_eq!(full_runs(&sched), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cycle_survives_failing_passes() {
        let store = FlakyStore::new(MemoryInventoryStore::new());
        store.fail_enumeration(true);
        let (sched, _bmc) = scheduler(Arc::new(store.clone()));

        let task = sched.start_cycle(PassKind::Full, INTERVAL);
        tokio::time::sleep(INTERVAL + INTERVAL / 2).await;
        assert_eq!(
            sched.metrics().full.enumeration_errors_total.load(Ordering::Relaxed),
            2
        );

        store.fail_enumeration(false);
        tokio::time::sleep(INTERVAL).await;
        assert_eq!(full_runs(&sched), 3);
        assert!(!task.is_finished());
        task.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn cycle_survives_a_panicking_tick() {
        let ticks = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&ticks);
        let task = PeriodicTask::spawn(PassKind::Full, INTERVAL, move || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("controller sent garbage");
                }
            }
        });

        tokio::time::sleep(INTERVAL * 2 + INTERVAL / 2).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
        assert!(!task.is_finished());
        task.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn start_only_schedules_configured_passes() {
        let store = MemoryInventoryStore::new();
        let bmc = MemoryBmc::new();
        let config = IpmiConfig {
            check_all_interval: INTERVAL,
            check_detail_interval: Some(INTERVAL * 3),
            ..IpmiConfig::default()
        };
        let sched = Arc::new(InventoryScheduler::new(
            Arc::new(store),
            Arc::new(bmc),
            config,
            Arc::new(SharedMetrics::default()),
        ));

        let tasks = sched.start();
        let kinds: Vec<PassKind> = tasks.iter().map(PeriodicTask::kind).collect();
        assert_eq!(kinds, vec![PassKind::Full, PassKind::Detail]);

        tokio::time::sleep(INTERVAL / 2).await;
        for task in tasks {
            task.shutdown().await;
        }
        assert_eq!(sched.metrics().status.runs_total.load(Ordering::Relaxed), 0);
        assert_eq!(sched.metrics().detail.runs_total.load(Ordering::Relaxed), 1);
    }
}
