//! Aggregate progress widget: percent bar, level and level-change alerts.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Weak,
    },
    time::Duration,
};

use shared::protocol::ProgressPayload;
use tokio::{
    runtime::Handle,
    sync::{watch, Mutex},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
    bus::{NotificationBus, NotificationEvent, Subscription},
    transport::{StudentTransport, TransportError},
};

pub const DEFAULT_ALERT_WINDOW: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressBarTier {
    #[default]
    Default,
    Warning,
    Danger,
    Success,
}

impl ProgressBarTier {
    pub fn css_class(self) -> &'static str {
        match self {
            ProgressBarTier::Default => "",
            ProgressBarTier::Warning => "progress-bar-warning",
            ProgressBarTier::Danger => "progress-bar-danger",
            ProgressBarTier::Success => "progress-bar-success",
        }
    }
}

/// Order matters: 0 and 1 percent fall through to `Warning`.
pub fn progress_bar_tier(percent: u8) -> ProgressBarTier {
    if percent > 1 && percent < 20 {
        ProgressBarTier::Danger
    } else if percent < 45 {
        ProgressBarTier::Warning
    } else if percent == 100 {
        ProgressBarTier::Success
    } else {
        ProgressBarTier::Default
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentProgress {
    pub percent: u8,
    pub level: i64,
    pub level_progress: f64,
    pub experience: f64,
    pub num_solved: Option<u64>,
    pub num_total: Option<u64>,
}

impl From<ProgressPayload> for AssignmentProgress {
    fn from(payload: ProgressPayload) -> Self {
        Self {
            percent: payload.percent,
            level: payload.level,
            level_progress: payload.level_progress,
            experience: payload.experience,
            num_solved: payload.num_solved,
            num_total: payload.num_total,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelChange {
    Up,
    Down,
}

impl LevelChange {
    pub fn between(previous: i64, current: i64) -> Option<Self> {
        match current.cmp(&previous) {
            std::cmp::Ordering::Greater => Some(Self::Up),
            std::cmp::Ordering::Less => Some(Self::Down),
            std::cmp::Ordering::Equal => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressView {
    pub progress: Option<AssignmentProgress>,
    pub bar_tier: ProgressBarTier,
    pub leveled_up: bool,
    pub leveled_down: bool,
    pub loading: bool,
    pub hidden: bool,
}

#[derive(Default)]
struct ProgressState {
    progress: Option<AssignmentProgress>,
    bar_tier: ProgressBarTier,
    leveled_up: bool,
    leveled_down: bool,
    in_flight: usize,
    level_up_timer: Option<JoinHandle<()>>,
    level_down_timer: Option<JoinHandle<()>>,
}

impl ProgressState {
    fn alert_mut(&mut self, change: LevelChange) -> (&mut bool, &mut Option<JoinHandle<()>>) {
        match change {
            LevelChange::Up => (&mut self.leveled_up, &mut self.level_up_timer),
            LevelChange::Down => (&mut self.leveled_down, &mut self.level_down_timer),
        }
    }
}

/// Fetches aggregate progress on mount and whenever a status changes.
///
/// Overlapping fetches are not sequenced: responses are applied in arrival
/// order, so a slow earlier response can overwrite a newer one. `loading`
/// stays up until the last of them lands.
pub struct ProgressPoller {
    this: Weak<ProgressPoller>,
    page_url: Url,
    transport: Arc<dyn StudentTransport>,
    bus: NotificationBus,
    alert_window: Duration,
    hidden: AtomicBool,
    state: Mutex<ProgressState>,
    updates: watch::Sender<u64>,
    _subscriptions: Vec<Subscription>,
}

impl ProgressPoller {
    /// Subscribes to the bus and performs the initial fetch.
    pub async fn mount(
        page_url: Url,
        transport: Arc<dyn StudentTransport>,
        bus: NotificationBus,
        alert_window: Duration,
    ) -> Arc<Self> {
        let poller = Self::new(page_url, transport, bus, alert_window);
        poller.reload().await;
        poller
    }

    /// Subscribes to the bus without fetching.
    pub fn new(
        page_url: Url,
        transport: Arc<dyn StudentTransport>,
        bus: NotificationBus,
        alert_window: Duration,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<Self>| {
            let subscriptions = vec![
                bus.subscribe(NotificationEvent::ProgressChanged, {
                    let this = this.clone();
                    move |_| Self::spawn_reload(&this)
                }),
                bus.subscribe(NotificationEvent::HideProgress, {
                    let this = this.clone();
                    move |_| Self::set_hidden(&this, true)
                }),
                bus.subscribe(NotificationEvent::ShowProgress, {
                    let this = this.clone();
                    move |_| Self::set_hidden(&this, false)
                }),
            ];
            let (updates, _) = watch::channel(0);
            Self {
                this: this.clone(),
                page_url,
                transport,
                bus,
                alert_window,
                hidden: AtomicBool::new(false),
                state: Mutex::new(ProgressState::default()),
                updates,
                _subscriptions: subscriptions,
            }
        })
    }

    /// Receiver bumped after every completed fetch, successful or not.
    pub fn subscribe_updates(&self) -> watch::Receiver<u64> {
        self.updates.subscribe()
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden.load(Ordering::SeqCst)
    }

    pub async fn view(&self) -> ProgressView {
        let state = self.state.lock().await;
        ProgressView {
            progress: state.progress.clone(),
            bar_tier: state.bar_tier,
            leveled_up: state.leveled_up,
            leveled_down: state.leveled_down,
            loading: state.in_flight > 0,
            hidden: self.is_hidden(),
        }
    }

    pub async fn reload(&self) {
        self.begin_fetch().await;
        let result = self.transport.fetch_progress(&self.page_url).await;
        self.finish_fetch(result).await;
    }

    async fn begin_fetch(&self) {
        self.state.lock().await.in_flight += 1;
    }

    async fn finish_fetch(&self, result: Result<ProgressPayload, TransportError>) {
        {
            let mut state = self.state.lock().await;
            state.in_flight = state.in_flight.saturating_sub(1);
        }
        match result {
            Ok(payload) => self.apply(payload.into()).await,
            Err(err) => error!(error = %err, "progress: failed to load progress"),
        }
        self.updates.send_modify(|revision| *revision += 1);
    }

    async fn apply(&self, progress: AssignmentProgress) {
        let change = {
            let mut state = self.state.lock().await;
            let change = state
                .progress
                .as_ref()
                .and_then(|previous| LevelChange::between(previous.level, progress.level));
            state.bar_tier = progress_bar_tier(progress.percent);
            debug!(
                percent = progress.percent,
                level = progress.level,
                tier = ?state.bar_tier,
                "progress: loaded"
            );
            state.progress = Some(progress);
            if let Some(change) = change {
                self.raise_alert(&mut state, change);
            }
            change
        };

        if let Some(change) = change {
            info!(?change, "progress: level changed, reloading assignment list");
            self.bus.emit(NotificationEvent::ListShouldReload);
        }
    }

    // Re-arming aborts the pending timer of the same alert, so the flag stays
    // up for a full window after the latest change.
    fn raise_alert(&self, state: &mut ProgressState, change: LevelChange) {
        let timer = match Handle::try_current() {
            Ok(handle) => {
                let this = self.this.clone();
                let window = self.alert_window;
                Some(handle.spawn(async move {
                    tokio::time::sleep(window).await;
                    if let Some(poller) = this.upgrade() {
                        poller.clear_alert(change).await;
                    }
                }))
            }
            Err(_) => {
                warn!(?change, "progress: no runtime to clear level alert");
                None
            }
        };

        let (flag, slot) = state.alert_mut(change);
        *flag = true;
        if let Some(previous) = std::mem::replace(slot, timer) {
            previous.abort();
        }
    }

    async fn clear_alert(&self, change: LevelChange) {
        let mut state = self.state.lock().await;
        let (flag, slot) = state.alert_mut(change);
        *flag = false;
        slot.take();
        debug!(?change, "progress: level alert cleared");
    }

    // The task holds only a `Weak` across the request; a poller dropped while
    // its fetch is in flight never sees the response.
    fn spawn_reload(this: &Weak<Self>) {
        let Some(poller) = this.upgrade() else {
            return;
        };
        let transport = Arc::clone(&poller.transport);
        let page_url = poller.page_url.clone();
        drop(poller);

        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("progress: no runtime to reload on");
                return;
            }
        };
        let this = this.clone();
        handle.spawn(async move {
            match this.upgrade() {
                Some(poller) => poller.begin_fetch().await,
                None => return,
            }
            let result = transport.fetch_progress(&page_url).await;
            match this.upgrade() {
                Some(poller) => poller.finish_fetch(result).await,
                None => debug!("progress: unmounted before fetch landed"),
            }
        });
    }

    fn set_hidden(this: &Weak<Self>, hidden: bool) {
        if let Some(poller) = this.upgrade() {
            poller.hidden.store(hidden, Ordering::SeqCst);
            poller.updates.send_modify(|revision| *revision += 1);
        }
    }
}

impl Drop for ProgressPoller {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        for timer in [state.level_up_timer.take(), state.level_down_timer.take()]
            .into_iter()
            .flatten()
        {
            timer.abort();
        }
    }
}

#[cfg(test)]
#[path = "tests/progress_tests.rs"]
mod tests;
