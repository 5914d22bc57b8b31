//! Data synchronization for the mounted dashboard.
//!
//! A [`Dashboard`] owns the only writer of [`ViewState`] and publishes it on a
//! `watch` channel. Refreshes come from three sources (mount, the periodic
//! schedule, and [`RefreshHandle`]s held by the mutation dispatchers) and are
//! never coalesced: each one fetches all four read endpoints and applies its
//! result as one unit.
//!
//! Every write goes through the watch channel's lock and re-checks the mount
//! token inside it, and [`Dashboard::unmount`] cancels that token under the
//! same lock. A refresh still in flight at unmount therefore finishes but can
//! never publish.

use crate::api::{ApiError, Bin, DashboardApi, ModelInfo, Route, Summary};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Everything the dashboard displays.
///
/// The four data fields only ever change together. A failed refresh keeps
/// them as they were and sets `error`; `loading` hides `error` while true.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ViewState {
    pub bins: Vec<Bin>,
    pub routes: Vec<Route>,
    pub summary: Option<Summary>,
    pub model_info: Option<ModelInfo>,
    pub loading: bool,
    pub error: Option<String>,
}

impl ViewState {
    /// State right after mount, before the first refresh lands.
    pub fn mounted() -> Self {
        Self {
            loading: true,
            ..Default::default()
        }
    }
}

/// How results of overlapping refreshes are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshOrdering {
    /// Whichever refresh completes last wins, even if it started first.
    #[default]
    CompletionOrder,
    /// Refreshes are numbered when they start; a result older than one
    /// already applied is discarded.
    Sequenced,
}

impl FromStr for RefreshOrdering {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "completion" | "completion-order" => Ok(RefreshOrdering::CompletionOrder),
            "sequenced" => Ok(RefreshOrdering::Sequenced),
            other => Err(format!("unknown refresh ordering '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshOptions {
    pub interval: Duration,
    pub ordering: RefreshOrdering,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_REFRESH_INTERVAL,
            ordering: RefreshOrdering::default(),
        }
    }
}

/// What became of one refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Fresh data was published.
    Applied,
    /// The aggregate failed; `error` was published with this message.
    Failed(String),
    /// A newer refresh had already been applied (sequenced ordering only).
    Superseded,
    /// The dashboard was unmounted; nothing was written.
    Unmounted,
}

struct Snapshot {
    bins: Vec<Bin>,
    routes: Vec<Route>,
    summary: Summary,
    model_info: ModelInfo,
}

async fn fetch_all(api: &dyn DashboardApi) -> Result<Snapshot, ApiError> {
    let (bins, routes, summary, model_info) = tokio::try_join!(
        api.clusters(),
        api.routes(),
        api.summary(),
        api.model_info()
    )?;
    Ok(Snapshot {
        bins,
        routes,
        summary,
        model_info,
    })
}

struct Shared {
    api: Arc<dyn DashboardApi>,
    state: watch::Sender<ViewState>,
    mounted: CancellationToken,
    ordering: RefreshOrdering,
    // Both counters are only touched inside `state`'s write lock.
    in_flight: AtomicUsize,
    last_ticket: AtomicU64,
    applied_ticket: AtomicU64,
}

impl Shared {
    /// Applies `f` under the watch lock if `mounted` is still live.
    /// Receivers are notified only when `f` reports a change.
    fn write(&self, mounted: &CancellationToken, f: impl FnOnce(&mut ViewState) -> bool) -> bool {
        self.state.send_if_modified(|state| {
            if mounted.is_cancelled() {
                return false;
            }
            f(state)
        })
    }

    fn begin(&self, mounted: &CancellationToken) -> Option<u64> {
        let mut ticket = None;
        self.write(mounted, |state| {
            ticket = Some(self.last_ticket.fetch_add(1, Ordering::Relaxed) + 1);
            self.in_flight.fetch_add(1, Ordering::Relaxed);
            state.loading = true;
            state.error = None;
            true
        });
        ticket
    }

    /// Decrements the in-flight count; `loading` drops once none remain.
    fn settle(&self, state: &mut ViewState) {
        let remaining = self.in_flight.fetch_sub(1, Ordering::Relaxed) - 1;
        state.loading = remaining > 0;
    }

    fn is_current(&self, ticket: u64) -> bool {
        match self.ordering {
            RefreshOrdering::CompletionOrder => true,
            RefreshOrdering::Sequenced => {
                if ticket > self.applied_ticket.load(Ordering::Relaxed) {
                    self.applied_ticket.store(ticket, Ordering::Relaxed);
                    true
                } else {
                    false
                }
            }
        }
    }
}

/// Keeps `loading` honest if a refresh future is dropped before it settles.
struct LoadingGuard<'a> {
    shared: &'a Shared,
    mounted: &'a CancellationToken,
    armed: bool,
}

impl LoadingGuard<'_> {
    fn finish(mut self, f: impl FnOnce(&Shared, &mut ViewState)) -> bool {
        self.armed = false;
        let shared = self.shared;
        shared.write(self.mounted, |state| {
            shared.settle(state);
            f(shared, state);
            true
        })
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let shared = self.shared;
            shared.write(self.mounted, |state| {
                shared.settle(state);
                true
            });
        }
    }
}

/// Cloneable entry point for on-demand refreshes.
#[derive(Clone)]
pub struct RefreshHandle(Arc<Shared>);

impl RefreshHandle {
    /// Runs one aggregate refresh to completion.
    #[tracing::instrument(name = "refresh", skip_all, fields(ticket = tracing::field::Empty))]
    pub async fn refresh(&self) -> RefreshOutcome {
        let shared = &*self.0;
        let mounted = shared.mounted.clone();

        let Some(ticket) = shared.begin(&mounted) else {
            debug!("Dashboard unmounted, refresh not started");
            return RefreshOutcome::Unmounted;
        };
        tracing::Span::current().record("ticket", ticket);
        let guard = LoadingGuard {
            shared,
            mounted: &mounted,
            armed: true,
        };

        let started = Instant::now();
        let result = fetch_all(shared.api.as_ref()).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let mut outcome = RefreshOutcome::Superseded;
        let written = guard.finish(|shared, state| {
            if !shared.is_current(ticket) {
                return;
            }
            match result {
                Ok(snapshot) => {
                    state.bins = snapshot.bins;
                    state.routes = snapshot.routes;
                    state.summary = Some(snapshot.summary);
                    state.model_info = Some(snapshot.model_info);
                    state.error = None;
                    outcome = RefreshOutcome::Applied;
                }
                Err(e) => {
                    let message = e.to_string();
                    state.error = Some(message.clone());
                    outcome = RefreshOutcome::Failed(message);
                }
            }
        });

        if !written {
            debug!(elapsed_ms, "Dashboard unmounted during refresh, result dropped");
            return RefreshOutcome::Unmounted;
        }
        match &outcome {
            RefreshOutcome::Applied => info!(elapsed_ms, "Dashboard refreshed"),
            RefreshOutcome::Failed(error) => warn!(elapsed_ms, %error, "Dashboard refresh failed"),
            _ => debug!(elapsed_ms, "Refresh superseded by a newer one"),
        }
        outcome
    }

    /// Starts a refresh in the background without waiting for it.
    pub fn request(&self) -> JoinHandle<RefreshOutcome> {
        let handle = self.clone();
        tokio::spawn(async move { handle.refresh().await })
    }

    pub fn is_mounted(&self) -> bool {
        !self.0.mounted.is_cancelled()
    }
}

async fn run_schedule(handle: RefreshHandle, interval: Duration, mounted: CancellationToken) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = mounted.cancelled() => break,
            _ = ticker.tick() => {
                debug!("Scheduled refresh");
                handle.request();
            }
        }
    }
    debug!("Refresh schedule stopped");
}

/// The mounted dashboard: owns the view state and the refresh schedule.
///
/// Must be created inside a tokio runtime. Dropping it unmounts it.
pub struct Dashboard {
    handle: RefreshHandle,
    schedule: Option<JoinHandle<()>>,
}

impl Dashboard {
    /// Mounts the dashboard: starts an immediate refresh and the periodic
    /// schedule.
    pub fn mount(api: Arc<dyn DashboardApi>, options: RefreshOptions) -> Self {
        let (state, _) = watch::channel(ViewState::mounted());
        let mounted = CancellationToken::new();
        let handle = RefreshHandle(Arc::new(Shared {
            api,
            state,
            mounted: mounted.clone(),
            ordering: options.ordering,
            in_flight: AtomicUsize::new(0),
            last_ticket: AtomicU64::new(0),
            applied_ticket: AtomicU64::new(0),
        }));

        info!(
            interval_secs = options.interval.as_secs(),
            ordering = ?options.ordering,
            "Dashboard mounted"
        );
        handle.request();
        let schedule = tokio::spawn(run_schedule(handle.clone(), options.interval, mounted));

        Self {
            handle,
            schedule: Some(schedule),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.handle.0.state.subscribe()
    }

    /// A copy of the current view state.
    pub fn view(&self) -> ViewState {
        self.handle.0.state.borrow().clone()
    }

    pub fn refresh_handle(&self) -> RefreshHandle {
        self.handle.clone()
    }

    pub async fn refresh(&self) -> RefreshOutcome {
        self.handle.refresh().await
    }

    /// Stops the schedule and detaches the view state. Refreshes already in
    /// flight run to completion but their results are discarded.
    pub fn unmount(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        let Some(schedule) = self.schedule.take() else {
            return;
        };
        let shared = &self.handle.0;
        shared.state.send_if_modified(|_| {
            shared.mounted.cancel();
            false
        });
        schedule.abort();
        info!("Dashboard unmounted");
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.teardown();
    }
}
