use super::*;

use std::sync::Mutex as StdMutex;

type Log = Arc<StdMutex<Vec<&'static str>>>;
type BoxedHandler = Box<dyn Fn(NotificationEvent) + Send + Sync>;

fn recorder() -> (Log, impl Fn(&'static str) -> BoxedHandler) {
    let log = Arc::new(StdMutex::new(Vec::new()));
    let factory_log = Arc::clone(&log);
    let factory = move |name: &'static str| -> BoxedHandler {
        let log = Arc::clone(&factory_log);
        Box::new(move |_| log.lock().expect("log").push(name))
    };
    (log, factory)
}

#[test]
fn emit_invokes_listeners_in_registration_order() {
    let bus = NotificationBus::new();
    let (log, handler) = recorder();

    let _a = bus.subscribe(NotificationEvent::ProgressChanged, handler("a"));
    let _b = bus.subscribe(NotificationEvent::ProgressChanged, handler("b"));
    let _c = bus.subscribe(NotificationEvent::ProgressChanged, handler("c"));

    bus.emit(NotificationEvent::ProgressChanged);

    assert_eq!(*log.lock().expect("log"), vec!["a", "b", "c"]);
}

#[test]
fn emit_only_reaches_listeners_of_that_event() {
    let bus = NotificationBus::new();
    let (log, handler) = recorder();

    let _hide = bus.subscribe(NotificationEvent::HideProgress, handler("hide"));
    let _show = bus.subscribe(NotificationEvent::ShowProgress, handler("show"));

    bus.emit(NotificationEvent::ShowProgress);
    bus.emit(NotificationEvent::ListShouldReload);

    assert_eq!(*log.lock().expect("log"), vec!["show"]);
}

#[test]
fn dropping_subscription_removes_listener() {
    let bus = NotificationBus::new();
    let (log, handler) = recorder();

    let sub = bus.subscribe(NotificationEvent::ListShouldReload, handler("list"));
    assert_eq!(bus.listener_count(NotificationEvent::ListShouldReload), 1);

    drop(sub);
    bus.emit(NotificationEvent::ListShouldReload);

    assert_eq!(bus.listener_count(NotificationEvent::ListShouldReload), 0);
    assert!(log.lock().expect("log").is_empty());
}

#[test]
fn explicit_unsubscribe_removes_listener() {
    let bus = NotificationBus::new();
    let (log, handler) = recorder();

    let sub = bus.subscribe(NotificationEvent::ProgressChanged, handler("gone"));
    sub.unsubscribe();
    bus.emit(NotificationEvent::ProgressChanged);

    assert!(log.lock().expect("log").is_empty());
}

#[test]
fn listener_unsubscribing_itself_does_not_disturb_other_listeners() {
    let bus = NotificationBus::new();
    let (log, handler) = recorder();

    let _first = bus.subscribe(NotificationEvent::ProgressChanged, handler("first"));

    let own_subscription: Arc<StdMutex<Option<Subscription>>> = Arc::new(StdMutex::new(None));
    let slot = Arc::clone(&own_subscription);
    let self_log = Arc::clone(&log);
    let sub = bus.subscribe(NotificationEvent::ProgressChanged, move |_| {
        self_log.lock().expect("log").push("once");
        slot.lock().expect("slot").take();
    });
    *own_subscription.lock().expect("slot") = Some(sub);

    let _last = bus.subscribe(NotificationEvent::ProgressChanged, handler("last"));

    bus.emit(NotificationEvent::ProgressChanged);
    bus.emit(NotificationEvent::ProgressChanged);

    assert_eq!(
        *log.lock().expect("log"),
        vec!["first", "once", "last", "first", "last"]
    );
    assert_eq!(bus.listener_count(NotificationEvent::ProgressChanged), 2);
}

#[test]
fn listener_removed_mid_dispatch_is_not_invoked() {
    let bus = NotificationBus::new();
    let (log, handler) = recorder();

    let victim: Arc<StdMutex<Option<Subscription>>> = Arc::new(StdMutex::new(None));
    let slot = Arc::clone(&victim);
    let _remover = bus.subscribe(NotificationEvent::HideProgress, move |_| {
        slot.lock().expect("slot").take();
    });
    *victim.lock().expect("slot") =
        Some(bus.subscribe(NotificationEvent::HideProgress, handler("victim")));

    bus.emit(NotificationEvent::HideProgress);

    assert!(log.lock().expect("log").is_empty());
}

#[test]
fn listener_added_during_dispatch_waits_for_next_emit() {
    let bus = NotificationBus::new();
    let (log, handler) = recorder();

    let late: Arc<StdMutex<Vec<Subscription>>> = Arc::new(StdMutex::new(Vec::new()));
    let late_slot = Arc::clone(&late);
    let inner_bus = bus.clone();
    let late_log = Arc::clone(&log);
    let _adder = bus.subscribe(NotificationEvent::ShowProgress, move |_| {
        let log = Arc::clone(&late_log);
        let sub = inner_bus.subscribe(NotificationEvent::ShowProgress, move |_| {
            log.lock().expect("log").push("late");
        });
        late_slot.lock().expect("late").push(sub);
    });
    let _marker = bus.subscribe(NotificationEvent::ShowProgress, handler("marker"));

    bus.emit(NotificationEvent::ShowProgress);
    assert_eq!(*log.lock().expect("log"), vec!["marker"]);

    bus.emit(NotificationEvent::ShowProgress);
    assert_eq!(*log.lock().expect("log"), vec!["marker", "marker", "late"]);
}

#[test]
fn subscription_outliving_bus_drops_cleanly() {
    let bus = NotificationBus::new();
    let sub = bus.subscribe(NotificationEvent::ProgressChanged, |_| {});
    drop(bus);
    drop(sub);
}
