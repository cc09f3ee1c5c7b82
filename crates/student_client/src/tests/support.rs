//! In-memory doubles shared by the widget tests.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use shared::{
    domain::{AssignmentId, HowSolvedStatus, SolvedKind},
    protocol::ProgressPayload,
};
use tokio::sync::Notify;
use url::Url;

use crate::{
    bus::{NotificationBus, NotificationEvent, Subscription},
    howsolved::UserNotifier,
    transport::{ListFragment, StudentTransport, TransportError},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Progress(Url),
    List { page_url: Url, no_filter: bool },
    Set(AssignmentId, SolvedKind),
    Clear(AssignmentId),
}

type Scripted<T> = Mutex<VecDeque<Result<T, TransportError>>>;

#[derive(Default)]
pub(crate) struct FakeTransport {
    progress: Scripted<ProgressPayload>,
    lists: Scripted<ListFragment>,
    sets: Scripted<HowSolvedStatus>,
    clears: Scripted<()>,
    calls: Mutex<Vec<Call>>,
    save_gate: Mutex<Option<Arc<Notify>>>,
    fetch_gate: Mutex<Option<Arc<Notify>>>,
}

fn next<T>(queue: &Scripted<T>) -> Result<T, TransportError> {
    queue
        .lock()
        .expect("script")
        .pop_front()
        .unwrap_or_else(|| Err(TransportError::Decode("no scripted response".into())))
}

impl FakeTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn push_progress(&self, response: Result<ProgressPayload, TransportError>) {
        self.progress.lock().expect("script").push_back(response);
    }

    pub(crate) fn push_list(&self, response: Result<ListFragment, TransportError>) {
        self.lists.lock().expect("script").push_back(response);
    }

    pub(crate) fn push_set(&self, response: Result<HowSolvedStatus, TransportError>) {
        self.sets.lock().expect("script").push_back(response);
    }

    pub(crate) fn push_clear(&self, response: Result<(), TransportError>) {
        self.clears.lock().expect("script").push_back(response);
    }

    /// Makes status requests wait until the returned gate is notified.
    pub(crate) fn gate_saves(&self) -> Arc<Notify> {
        install_gate(&self.save_gate)
    }

    /// Makes progress and list fetches wait; each `notify_one` releases one.
    pub(crate) fn gate_fetches(&self) -> Arc<Notify> {
        install_gate(&self.fetch_gate)
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls").clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().expect("calls").push(call);
    }

}

fn install_gate(slot: &Mutex<Option<Arc<Notify>>>) -> Arc<Notify> {
    let gate = Arc::new(Notify::new());
    *slot.lock().expect("gate") = Some(Arc::clone(&gate));
    gate
}

async fn wait_for_gate(slot: &Mutex<Option<Arc<Notify>>>) {
    let gate = slot.lock().expect("gate").clone();
    if let Some(gate) = gate {
        gate.notified().await;
    }
}

#[async_trait]
impl StudentTransport for FakeTransport {
    async fn fetch_progress(&self, page_url: &Url) -> Result<ProgressPayload, TransportError> {
        self.record(Call::Progress(page_url.clone()));
        wait_for_gate(&self.fetch_gate).await;
        next(&self.progress)
    }

    async fn fetch_list(
        &self,
        page_url: &Url,
        no_filter: bool,
    ) -> Result<ListFragment, TransportError> {
        self.record(Call::List {
            page_url: page_url.clone(),
            no_filter,
        });
        wait_for_gate(&self.fetch_gate).await;
        next(&self.lists)
    }

    async fn set_howsolved(
        &self,
        assignment_id: AssignmentId,
        kind: SolvedKind,
    ) -> Result<HowSolvedStatus, TransportError> {
        self.record(Call::Set(assignment_id, kind));
        wait_for_gate(&self.save_gate).await;
        next(&self.sets)
    }

    async fn clear_howsolved(&self, assignment_id: AssignmentId) -> Result<(), TransportError> {
        self.record(Call::Clear(assignment_id));
        wait_for_gate(&self.save_gate).await;
        next(&self.clears)
    }
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub(crate) fn messages(&self) -> Vec<String> {
        self.messages.lock().expect("messages").clone()
    }
}

impl UserNotifier for RecordingNotifier {
    fn notify_error(&self, message: &str) {
        self.messages.lock().expect("messages").push(message.to_string());
    }
}

pub(crate) struct EventCounter {
    count: Arc<AtomicUsize>,
    _subscription: Subscription,
}

impl EventCounter {
    pub(crate) fn attach(bus: &NotificationBus, event: NotificationEvent) -> Self {
        let count = Arc::new(AtomicUsize::new(0));
        let handler_count = Arc::clone(&count);
        let subscription = bus.subscribe(event, move |_| {
            handler_count.fetch_add(1, Ordering::SeqCst);
        });
        Self {
            count,
            _subscription: subscription,
        }
    }

    pub(crate) fn get(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

/// Yields until the transport has seen `count` requests.
pub(crate) async fn wait_for_calls(transport: &FakeTransport, count: usize) {
    while transport.calls().len() < count {
        tokio::task::yield_now().await;
    }
}

/// Gives spawned tasks a few turns on the current-thread runtime.
pub(crate) async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

pub(crate) fn progress(percent: u8, level: i64) -> ProgressPayload {
    ProgressPayload {
        percent,
        level,
        level_progress: 0.0,
        experience: 0.0,
        num_total: None,
        num_solved: None,
    }
}

pub(crate) fn server_error(status: u16) -> TransportError {
    TransportError::Status {
        status,
        message: "scripted failure".into(),
    }
}

pub(crate) fn page_url() -> Url {
    Url::parse("https://trix.example/assignments/?tags=python").expect("page url")
}
