use std::sync::{Arc, Weak};

use tokio::{
    runtime::Handle,
    sync::{watch, Mutex},
};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
    bus::{NotificationBus, NotificationEvent, Subscription},
    transport::{ListFragment, StudentTransport, TransportError},
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentListView {
    /// Last fragment received from the server, replaced wholesale on reload.
    pub content: Option<String>,
    pub loading: bool,
}

#[derive(Default)]
struct ListState {
    view: AssignmentListView,
    in_flight: usize,
}

/// Keeps the server-rendered assignment list in sync after level changes.
///
/// `loading` stays up until the last overlapping fetch lands.
pub struct AssignmentListRefresher {
    page_url: Url,
    no_filter: bool,
    transport: Arc<dyn StudentTransport>,
    bus: NotificationBus,
    state: Mutex<ListState>,
    updates: watch::Sender<u64>,
    _subscription: Subscription,
}

impl AssignmentListRefresher {
    pub async fn mount(
        page_url: Url,
        no_filter: bool,
        transport: Arc<dyn StudentTransport>,
        bus: NotificationBus,
    ) -> Arc<Self> {
        let refresher = Self::new(page_url, no_filter, transport, bus);
        refresher.reload().await;
        refresher
    }

    pub fn new(
        page_url: Url,
        no_filter: bool,
        transport: Arc<dyn StudentTransport>,
        bus: NotificationBus,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<Self>| {
            let subscription = bus.subscribe(NotificationEvent::ListShouldReload, {
                let this = this.clone();
                move |_| Self::request_reload(&this)
            });
            let (updates, _) = watch::channel(0);
            Self {
                page_url,
                no_filter,
                transport,
                bus,
                state: Mutex::new(ListState::default()),
                updates,
                _subscription: subscription,
            }
        })
    }

    pub fn subscribe_updates(&self) -> watch::Receiver<u64> {
        self.updates.subscribe()
    }

    pub async fn view(&self) -> AssignmentListView {
        self.state.lock().await.view.clone()
    }

    pub async fn reload(&self) {
        self.begin_fetch().await;
        let result = self.transport.fetch_list(&self.page_url, self.no_filter).await;
        self.finish_fetch(result).await;
    }

    async fn begin_fetch(&self) {
        let mut state = self.state.lock().await;
        state.in_flight += 1;
        state.view.loading = true;
    }

    async fn finish_fetch(&self, result: Result<ListFragment, TransportError>) {
        {
            let mut state = self.state.lock().await;
            state.in_flight = state.in_flight.saturating_sub(1);
            state.view.loading = state.in_flight > 0;
        }
        match result {
            Ok(fragment) => {
                let event = if fragment.hide_progress {
                    NotificationEvent::HideProgress
                } else {
                    NotificationEvent::ShowProgress
                };
                self.bus.emit(event);

                self.state.lock().await.view.content = Some(fragment.html);
                info!(
                    hide_progress = fragment.hide_progress,
                    "assignment list: replaced content"
                );
            }
            Err(err) => error!(error = %err, "assignment list: failed to get list"),
        }
        self.updates.send_modify(|revision| *revision += 1);
    }

    fn request_reload(this: &Weak<Self>) {
        let Some(refresher) = this.upgrade() else {
            return;
        };
        let transport = Arc::clone(&refresher.transport);
        let page_url = refresher.page_url.clone();
        let no_filter = refresher.no_filter;
        drop(refresher);

        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("assignment list: no runtime to reload on");
                return;
            }
        };
        let this = this.clone();
        handle.spawn(async move {
            match this.upgrade() {
                Some(refresher) => refresher.begin_fetch().await,
                None => return,
            }
            let result = transport.fetch_list(&page_url, no_filter).await;
            match this.upgrade() {
                Some(refresher) => refresher.finish_fetch(result).await,
                None => debug!("assignment list: unmounted before fetch landed"),
            }
        });
    }
}

#[cfg(test)]
#[path = "tests/assignment_list_tests.rs"]
mod tests;
