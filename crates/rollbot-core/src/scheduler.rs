//! Per-network scan loops and their supervisor.
//!
//! Each tracked network gets one task that owns its [`NetworkContext`] (ledger,
//! exclusion path, heartbeat) and runs a cycle on a fixed period:
//! `Idle -> Scanning -> Dispatching -> Idle`. A failing cycle is logged and the
//! loop waits for the next tick. The [`BacklogScheduler`] owns every task:
//! - `start()` spawns one loop per selected network
//! - `restart()` cancels, joins and respawns loops, reusing their contexts
//! - a supervisor respawns loops that died (panic), reopening state from disk
//!
//! Cancellation is only observed between cycles.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use chrono::{DateTime, Local};
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    dispatch::{DispatchSummary, Dispatcher},
    domain::Network,
    exclusion::ExclusionFilter,
    ledger::{FileLedger, Ledger},
    messaging::port::MessagingPort,
    ports::ItemSource,
    scan::collect_new_items,
    status::{heartbeat_text, StatusBoard},
    Result,
};

const SUPERVISE_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Scanning,
    Dispatching,
}

/// Snapshot of one network's loop, published after every phase change.
#[derive(Clone, Debug)]
pub struct NetworkStatus {
    pub network: Network,
    pub phase: CyclePhase,
    pub cycles: u64,
    pub last_checked: Option<DateTime<Local>>,
    pub last_reported: usize,
    pub last_error: Option<String>,
    pub ledger_size: usize,
}

impl NetworkStatus {
    fn new(network: Network) -> Self {
        Self {
            network,
            phase: CyclePhase::Idle,
            cycles: 0,
            last_checked: None,
            last_reported: 0,
            last_error: None,
            ledger_size: 0,
        }
    }
}

/// Result of one successful cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub pages_fetched: u32,
    pub excluded: usize,
    pub dispatched: DispatchSummary,
}

/// Collaborators shared by every loop.
pub struct CycleDeps {
    pub source: Arc<dyn ItemSource>,
    pub messenger: Arc<dyn MessagingPort>,
    pub dispatcher: Dispatcher,
    pub page_limit: u32,
    pub interval: Duration,
}

impl CycleDeps {
    pub fn new(
        cfg: &Config,
        source: Arc<dyn ItemSource>,
        messenger: Arc<dyn MessagingPort>,
    ) -> Self {
        Self {
            dispatcher: Dispatcher::new(cfg, messenger.clone()),
            source,
            messenger,
            page_limit: cfg.pages_to_check,
            interval: cfg.check_interval,
        }
    }
}

/// Everything one network's loop mutates. Owned by exactly one task.
pub struct NetworkContext {
    network: Network,
    ledger: Box<dyn Ledger>,
    exclusion_path: PathBuf,
    board: StatusBoard,
    status: Arc<watch::Sender<NetworkStatus>>,
}

impl NetworkContext {
    pub fn new(
        network: Network,
        ledger: Box<dyn Ledger>,
        exclusion_path: PathBuf,
        board: StatusBoard,
        status: Arc<watch::Sender<NetworkStatus>>,
    ) -> Self {
        let ctx = Self {
            network,
            ledger,
            exclusion_path,
            board,
            status,
        };
        let size = ctx.ledger.len();
        ctx.status.send_modify(|s| s.ledger_size = size);
        ctx
    }

    /// Build the context from the on-disk state under `cfg.data_dir`.
    pub async fn open(
        cfg: &Config,
        network: Network,
        status: Arc<watch::Sender<NetworkStatus>>,
    ) -> Result<Self> {
        let ledger = FileLedger::open(cfg.ledger_path(network)).await?;
        tracing::info!(%network, reported = ledger.len(), "loaded reported ids");
        let board = StatusBoard::open(cfg, network).await;
        Ok(Self::new(
            network,
            Box::new(ledger),
            cfg.exclusion_path(network),
            board,
            status,
        ))
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn ledger(&self) -> &dyn Ledger {
        self.ledger.as_ref()
    }

    fn set_phase(&self, phase: CyclePhase) {
        self.status.send_modify(|s| s.phase = phase);
    }

    /// One scan + dispatch pass.
    pub async fn run_cycle(&mut self, deps: &CycleDeps) -> Result<CycleReport> {
        self.set_phase(CyclePhase::Scanning);
        let filter = ExclusionFilter::load(&self.exclusion_path).await?;
        let scan = collect_new_items(
            deps.source.as_ref(),
            self.network,
            self.ledger.as_ref(),
            &filter,
            deps.page_limit,
        )
        .await?;
        tracing::info!(
            network = %self.network,
            pages = scan.pages_fetched,
            new = scan.items.len(),
            excluded = scan.excluded,
            "scan complete"
        );

        self.set_phase(CyclePhase::Dispatching);
        let dispatched = deps
            .dispatcher
            .report_all(&scan.items, self.network, self.ledger.as_mut())
            .await?;

        Ok(CycleReport {
            pages_fetched: scan.pages_fetched,
            excluded: scan.excluded,
            dispatched,
        })
    }

    fn finish_cycle(&self, result: &Result<CycleReport>) {
        let size = self.ledger.len();
        self.status.send_modify(|s| {
            s.phase = CyclePhase::Idle;
            s.cycles += 1;
            s.last_checked = Some(Local::now());
            s.ledger_size = size;
            match result {
                Ok(r) => {
                    s.last_reported = r.dispatched.sent + r.dispatched.unroutable;
                    s.last_error = None;
                }
                Err(e) => {
                    s.last_reported = 0;
                    s.last_error = Some(e.to_string());
                }
            }
        });
    }

    async fn publish_heartbeat(&mut self, deps: &CycleDeps) {
        let text = heartbeat_text(self.network, Local::now(), deps.interval);
        if let Err(e) = self.board.publish(deps.messenger.as_ref(), &text).await {
            tracing::warn!(network = %self.network, error = %e, "failed to update status message");
        }
    }
}

/// The loop body of one network's task. Returns the context when cancelled.
pub async fn run_network_loop(
    mut ctx: NetworkContext,
    deps: Arc<CycleDeps>,
    cancel: CancellationToken,
) -> NetworkContext {
    let mut tick = tokio::time::interval(deps.interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
          biased;
          _ = cancel.cancelled() => break,
          _ = tick.tick() => {}
        }

        let result = ctx.run_cycle(&deps).await;
        match &result {
            Ok(r) => tracing::info!(
                network = %ctx.network,
                sent = r.dispatched.sent,
                unroutable = r.dispatched.unroutable,
                "cycle complete"
            ),
            Err(e) => tracing::error!(network = %ctx.network, error = %e, "error checking rollbar items"),
        }
        ctx.finish_cycle(&result);
        ctx.publish_heartbeat(&deps).await;
    }

    tracing::info!(network = %ctx.network, "scan loop stopped");
    ctx
}

#[derive(Clone)]
pub struct BacklogScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    cfg: Arc<Config>,
    deps: Arc<CycleDeps>,
    /// Held for the whole of start, restart, stop and supervise_once, so only
    /// one of them changes the set of running loops at a time.
    lifecycle: Mutex<()>,
    state: Mutex<SchedulerState>,
}

#[derive(Default)]
struct SchedulerState {
    wanted: BTreeSet<Network>,
    loops: BTreeMap<Network, LoopEntry>,
    statuses: BTreeMap<Network, Arc<watch::Sender<NetworkStatus>>>,
    supervisor: Option<JoinHandle<()>>,
    supervisor_cancel: Option<CancellationToken>,
}

struct LoopEntry {
    cancel: CancellationToken,
    handle: JoinHandle<NetworkContext>,
}

impl LoopEntry {
    /// Cancel the loop and wait for its current cycle to finish.
    async fn shutdown(self) -> Option<NetworkContext> {
        self.cancel.cancel();
        self.handle.await.ok()
    }
}

impl BacklogScheduler {
    pub fn new(
        cfg: Arc<Config>,
        source: Arc<dyn ItemSource>,
        messenger: Arc<dyn MessagingPort>,
    ) -> Self {
        let deps = Arc::new(CycleDeps::new(&cfg, source, messenger));
        Self {
            inner: Arc::new(SchedulerInner {
                cfg,
                deps,
                lifecycle: Mutex::new(()),
                state: Mutex::new(SchedulerState::default()),
            }),
        }
    }

    /// Spawn one loop per network, replacing any loops already running.
    ///
    /// Fails if a network's on-disk state cannot be opened; nothing is left
    /// running in that case.
    pub async fn start(&self, networks: &[Network]) -> Result<usize> {
        self.stop_supervisor().await;
        {
            let _lifecycle = self.inner.lifecycle.lock().await;
            self.stop_loops().await;

            let mut opened = Vec::new();
            for &network in networks {
                let status = self.status_sender(network).await;
                let ctx = NetworkContext::open(&self.inner.cfg, network, status).await?;
                opened.push(ctx);
            }

            self.inner
                .state
                .lock()
                .await
                .wanted
                .extend(opened.iter().map(|ctx| ctx.network()));
            for ctx in opened {
                let network = ctx.network();
                self.install(network, ctx).await;
                tracing::info!(%network, "scan loop started");
            }
        }

        self.ensure_supervisor().await;
        Ok(networks.len())
    }

    /// Cancel every loop, wait for its current cycle to finish, and start it
    /// again with the same context.
    ///
    /// A network whose context cannot be recovered is left to the supervisor;
    /// the first such error is returned after the other loops are back up.
    pub async fn restart(&self) -> Result<usize> {
        let _lifecycle = self.inner.lifecycle.lock().await;

        let entries: Vec<(Network, LoopEntry)> = {
            let mut st = self.inner.state.lock().await;
            std::mem::take(&mut st.loops).into_iter().collect()
        };
        for (_, entry) in &entries {
            entry.cancel.cancel();
        }

        let mut restarted = 0usize;
        let mut first_err = None;
        for (network, entry) in entries {
            let ctx = match entry.shutdown().await {
                Some(ctx) => ctx,
                None => {
                    tracing::warn!(%network, "scan loop ended abnormally, reopening state");
                    let status = self.status_sender(network).await;
                    match NetworkContext::open(&self.inner.cfg, network, status).await {
                        Ok(ctx) => ctx,
                        Err(e) => {
                            tracing::error!(%network, error = %e, "failed to reopen network state");
                            first_err.get_or_insert(e);
                            continue;
                        }
                    }
                }
            };
            self.install(network, ctx).await;
            restarted += 1;
        }

        tracing::info!(restarted, "scan loops restarted");
        match first_err {
            Some(e) => Err(e),
            None => Ok(restarted),
        }
    }

    /// Cancel every loop and the supervisor, waiting for in-flight cycles.
    pub async fn stop(&self) {
        self.stop_supervisor().await;
        let _lifecycle = self.inner.lifecycle.lock().await;
        self.stop_loops().await;
    }

    /// Respawn wanted loops that are missing or have exited on their own.
    /// Returns how many were respawned.
    pub async fn supervise_once(&self) -> usize {
        let _lifecycle = self.inner.lifecycle.lock().await;

        let dead: Vec<(Network, Option<LoopEntry>)> = {
            let mut st = self.inner.state.lock().await;
            let wanted: Vec<Network> = st.wanted.iter().copied().collect();
            let mut dead = Vec::new();
            for network in wanted {
                let alive = st
                    .loops
                    .get(&network)
                    .is_some_and(|entry| !entry.handle.is_finished());
                if !alive {
                    dead.push((network, st.loops.remove(&network)));
                }
            }
            dead
        };

        let mut respawned = 0usize;
        for (network, entry) in dead {
            let ctx = match entry {
                Some(entry) => entry.shutdown().await,
                None => None,
            };
            let ctx = match ctx {
                Some(ctx) => ctx,
                None => {
                    let status = self.status_sender(network).await;
                    match NetworkContext::open(&self.inner.cfg, network, status).await {
                        Ok(ctx) => ctx,
                        Err(e) => {
                            tracing::error!(%network, error = %e, "failed to reopen network state, will retry");
                            continue;
                        }
                    }
                }
            };

            self.install(network, ctx).await;
            tracing::warn!(%network, "scan loop respawned");
            respawned += 1;
        }
        respawned
    }

    /// Latest snapshot of every network that has been started.
    pub async fn status(&self) -> Vec<NetworkStatus> {
        let st = self.inner.state.lock().await;
        st.statuses
            .values()
            .map(|tx| tx.borrow().clone())
            .collect()
    }

    /// Spawn a loop for `network` and track it. A loop already tracked for the
    /// network is shut down first.
    async fn install(&self, network: Network, ctx: NetworkContext) {
        let entry = self.spawn_loop(ctx);
        let previous = self.inner.state.lock().await.loops.insert(network, entry);
        if let Some(previous) = previous {
            tracing::warn!(%network, "replacing a running scan loop");
            previous.shutdown().await;
        }
    }

    async fn stop_loops(&self) {
        let entries = {
            let mut st = self.inner.state.lock().await;
            st.wanted.clear();
            std::mem::take(&mut st.loops)
        };
        for (_, entry) in &entries {
            entry.cancel.cancel();
        }
        for (_, entry) in entries {
            entry.shutdown().await;
        }
    }

    async fn stop_supervisor(&self) {
        let supervisor = {
            let mut st = self.inner.state.lock().await;
            if let Some(tok) = st.supervisor_cancel.take() {
                tok.cancel();
            }
            st.supervisor.take()
        };
        if let Some(handle) = supervisor {
            let _ = handle.await;
        }
    }

    fn spawn_loop(&self, ctx: NetworkContext) -> LoopEntry {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_network_loop(
            ctx,
            self.inner.deps.clone(),
            cancel.clone(),
        ));
        LoopEntry { cancel, handle }
    }

    async fn status_sender(&self, network: Network) -> Arc<watch::Sender<NetworkStatus>> {
        let mut st = self.inner.state.lock().await;
        st.statuses
            .entry(network)
            .or_insert_with(|| Arc::new(watch::channel(NetworkStatus::new(network)).0))
            .clone()
    }

    async fn ensure_supervisor(&self) {
        let mut st = self.inner.state.lock().await;
        if st.supervisor.is_some() {
            return;
        }

        let tok = CancellationToken::new();
        st.supervisor_cancel = Some(tok.clone());
        let scheduler = self.clone();
        let handle = tokio::spawn(async move {
            let mut tick = tokio::time::interval(SUPERVISE_INTERVAL);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                  _ = tok.cancelled() => break,
                  _ = tick.tick() => {
                    scheduler.supervise_once().await;
                  }
                }
            }
        });
        st.supervisor = Some(handle);
    }
}
