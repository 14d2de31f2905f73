//! Integration Tests for the Signal Registry
//!
//! These tests drive the registry through its public API the way a host
//! application would: typed objects with declared signals, receivers that
//! come and go, and callbacks that reshape the connection graph mid-dispatch.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use switchboard_core::signals::{
    current_emitting_owner, declare_signal, global, Callback, Endpoint, HasObjectId, ObjectId,
    Registry, SignalHandle, Token,
};
use switchboard_core::{RegistryConfig, SignalError};

/// A host type exposing two signals through declared tokens.
struct Thermostat {
    id: ObjectId,
}

impl Thermostat {
    fn new() -> Self {
        Self { id: ObjectId::new() }
    }

    fn changed<'r>(&self, registry: &'r Registry) -> SignalHandle<'r, f64> {
        let token = declare_signal::<Thermostat, f64>("changed").unwrap();
        registry.signal(self.id, token)
    }

    fn alarm<'r>(&self, registry: &'r Registry) -> SignalHandle<'r, String> {
        let token = declare_signal::<Thermostat, String>("alarm").unwrap();
        registry.signal(self.id, token)
    }
}

impl HasObjectId for Thermostat {
    fn object_id(&self) -> ObjectId {
        self.id
    }
}

type Log = Rc<RefCell<Vec<String>>>;

fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

/// Test the basic example: two callbacks, then one disconnected.
#[test]
fn tick_example() {
    let registry = Registry::new();
    let o = ObjectId::new();
    let tick = Token::<i32>::new("tick");
    let log = new_log();

    let cb_a = {
        let log = log.clone();
        Callback::from_fn(move |v: &i32| log.borrow_mut().push(format!("cbA({v})")))
    };
    let cb_b = {
        let log = log.clone();
        Callback::from_fn(move |v: &i32| log.borrow_mut().push(format!("cbB({v})")))
    };

    registry.connect(o, tick, &cb_a, None);
    registry.connect(o, tick, &cb_b, None);
    registry.emit(o, tick, &1).unwrap();
    assert_eq!(*log.borrow(), vec!["cbA(1)", "cbB(1)"]);

    log.borrow_mut().clear();
    registry.disconnect(o, tick, &cb_a, None);
    registry.emit(o, tick, &2).unwrap();
    assert_eq!(*log.borrow(), vec!["cbB(2)"]);
}

/// Test that many connections fire in exactly the order they were made.
#[test]
fn many_connections_fire_in_order() {
    let registry = Registry::with_config(&RegistryConfig::empty());
    let owner = ObjectId::new();
    let tick = Token::<()>::new("tick");
    let order = Rc::new(RefCell::new(Vec::new()));

    let callbacks: Vec<Callback<()>> = (0..32)
        .map(|i| {
            let order = order.clone();
            Callback::from_fn(move |_: &()| order.borrow_mut().push(i))
        })
        .collect();
    for cb in &callbacks {
        assert!(registry.connect(owner, tick, cb, None));
    }

    registry.emit(owner, tick, &()).unwrap();
    assert_eq!(*order.borrow(), (0..32).collect::<Vec<_>>());

    // Remove every other one; the survivors keep their relative order.
    for cb in callbacks.iter().step_by(2) {
        registry.disconnect(owner, tick, cb, None);
    }
    order.borrow_mut().clear();
    registry.emit(owner, tick, &()).unwrap();
    assert_eq!(*order.borrow(), (1..32).step_by(2).collect::<Vec<_>>());
    assert_eq!(registry.stats().tombstones, 0);
}

/// Test declared signals on a host type.
#[test]
fn declared_signals_on_instances() {
    let registry = Registry::new();
    let living_room = Thermostat::new();
    let bedroom = Thermostat::new();
    let log = new_log();

    let display = {
        let log = log.clone();
        Callback::from_fn(move |t: &f64| {
            let owner = current_emitting_owner().map(|o| o.raw()).unwrap_or(0);
            log.borrow_mut().push(format!("{owner}:{t}"));
        })
    };
    living_room.changed(&registry).connect(&display);
    bedroom.changed(&registry).connect(&display);

    living_room.changed(&registry).emit(&21.5).unwrap();
    bedroom.changed(&registry).emit(&18.0).unwrap();
    // Different signal, same owner: nothing connected.
    bedroom.alarm(&registry).emit(&"too cold".to_string()).unwrap();

    assert_eq!(
        *log.borrow(),
        vec![
            format!("{}:21.5", living_room.id.raw()),
            format!("{}:18", bedroom.id.raw()),
        ]
    );

    assert!(matches!(
        declare_signal::<Thermostat, i64>("changed"),
        Err(SignalError::ArgumentMismatch { .. })
    ));
}

/// Test that a receiver object going away silences it on every emitter.
#[test]
fn receiver_teardown_spans_emitters() {
    let registry = Registry::new();
    let sensors: Vec<Thermostat> = (0..4).map(|_| Thermostat::new()).collect();
    let dashboard = ObjectId::new();
    let logger = ObjectId::new();
    let log = new_log();

    let on_change = {
        let log = log.clone();
        Callback::from_fn(move |_: &f64| log.borrow_mut().push("dashboard".into()))
    };
    let on_log = {
        let log = log.clone();
        Callback::from_fn(move |_: &f64| log.borrow_mut().push("logger".into()))
    };
    for sensor in &sensors {
        sensor.changed(&registry).connect_with(&on_change, dashboard);
        sensor.changed(&registry).connect_with(&on_log, logger);
    }

    assert_eq!(registry.disconnect_receiver(dashboard), sensors.len());

    for sensor in &sensors {
        sensor.changed(&registry).emit(&20.0).unwrap();
    }
    assert_eq!(*log.borrow(), vec!["logger"; sensors.len()]);
    assert_eq!(registry.stats().tombstones, 0);
    assert_eq!(registry.stats().receivers, 1);
}

/// Test a callback that tears its own receiver down mid-dispatch.
#[test]
fn receiver_disconnects_itself_during_emit() {
    let registry = Rc::new(Registry::new());
    let sensor = Thermostat::new();
    let once = ObjectId::new();
    let log = new_log();

    let first = {
        let registry = registry.clone();
        let log = log.clone();
        Callback::from_fn(move |_: &f64| {
            log.borrow_mut().push("first".into());
            registry.disconnect_receiver(once);
        })
    };
    let second = {
        let log = log.clone();
        Callback::from_fn(move |_: &f64| log.borrow_mut().push("second".into()))
    };
    sensor.changed(&registry).connect_with(&first, once);
    sensor.changed(&registry).connect_with(&second, once);

    sensor.changed(&registry).emit(&1.0).unwrap();
    sensor.changed(&registry).emit(&2.0).unwrap();

    assert_eq!(*log.borrow(), vec!["first"]);
    assert!(!registry.has_emitter_entry(&sensor));
}

/// Test that an error aborts the emission and surfaces to the caller.
#[test]
fn callback_error_propagates() {
    let registry = Registry::new();
    let sensor = Thermostat::new();
    let reached = Rc::new(RefCell::new(false));

    let validator = Callback::new(|t: &f64| {
        if *t > 100.0 {
            return Err(format!("implausible reading {t}").into());
        }
        Ok(())
    });
    let sink = {
        let reached = reached.clone();
        Callback::from_fn(move |_: &f64| *reached.borrow_mut() = true)
    };
    sensor.changed(&registry).connect(&validator);
    sensor.changed(&registry).connect(&sink);

    let err = sensor.changed(&registry).emit(&451.0).unwrap_err();
    assert_eq!(err.as_label(), "signal_callback_failed");
    assert_eq!(err.owner(), Some(sensor.id));
    assert!(err.to_string().contains("implausible reading 451"));
    assert!(!*reached.borrow());

    sensor.changed(&registry).emit(&20.0).unwrap();
    assert!(*reached.borrow());
}

/// Test chained emitters: a relay re-emits what it receives.
#[test]
fn relay_chain_reports_innermost_emitter() {
    let registry = Rc::new(Registry::new());
    let source = ObjectId::new();
    let relay = ObjectId::new();
    let value = Token::<u32>::new("value");
    let seen = Rc::new(RefCell::new(Vec::new()));

    let forward = {
        let registry = registry.clone();
        Callback::new(move |v: &u32| registry.emit(relay, value, &(v + 1)).map_err(Into::into))
    };
    let sink = {
        let seen = seen.clone();
        Callback::from_fn(move |v: &u32| seen.borrow_mut().push((*v, current_emitting_owner())))
    };
    registry.connect(source, value, &forward, Some(relay));
    registry.connect(relay, value, &sink, None);

    registry.emit(source, value, &1).unwrap();

    assert_eq!(*seen.borrow(), vec![(2, Some(relay))]);
    assert_eq!(current_emitting_owner(), None);

    // Tearing down the relay removes both its roles.
    assert_eq!(registry.clear_signal_data(relay), 2);
    registry.emit(source, value, &1).unwrap();
    assert_eq!(seen.borrow().len(), 1);
}

/// Test the thread-default registry with endpoints.
#[test]
fn endpoints_clean_up_the_default_registry() {
    let tick = Token::<u8>::new("tick");
    let count = Rc::new(RefCell::new(0));
    let counter = {
        let count = count.clone();
        Callback::from_fn(move |_: &u8| *count.borrow_mut() += 1)
    };
    let emitter = Endpoint::new();

    {
        let listener = Endpoint::new();
        global::connect(&emitter, tick, &counter, Some(listener.id()));
        global::emit(&emitter, tick, &0).unwrap();
    }

    global::emit(&emitter, tick, &0).unwrap();
    assert_eq!(*count.borrow(), 1);
    global::with_default(|registry| assert!(!registry.has_emitter_entry(&emitter)));
}

/// A host object that owns its registry identity.
struct Widget {
    endpoint: Endpoint,
    clicks: Cell<u32>,
}

impl Widget {
    fn new() -> Rc<Self> {
        let widget = Rc::new(Self {
            endpoint: Endpoint::new(),
            clicks: Cell::new(0),
        });
        // The widget emits too, so dropping its endpoint has work to do.
        let resized = Token::<u32>::new("resized");
        global::connect(&widget.endpoint, resized, &Callback::from_fn(|_: &u32| {}), None);
        widget
    }
}

/// Test tearing down an emitter whose callback holds the last reference to
/// an endpoint owner.
#[test]
fn callback_can_own_the_last_endpoint_holder() {
    let clicked = Token::<u32>::new("clicked");
    let button = Endpoint::new();

    let widget = Widget::new();
    let widget_id = widget.endpoint.id();
    let weak = Rc::downgrade(&widget);
    let on_click = {
        let widget = widget.clone();
        Callback::from_fn(move |n: &u32| widget.clicks.set(*n))
    };
    global::connect(&button, clicked, &on_click, Some(widget_id));
    drop(on_click);
    drop(widget);

    global::emit(&button, clicked, &3).unwrap();
    assert_eq!(weak.upgrade().map(|w| w.clicks.get()), Some(3));

    // Dropping the callback drops the widget, whose endpoint clears itself
    // from the same registry.
    assert_eq!(global::disconnect_emitter(&button), 1);
    assert!(weak.upgrade().is_none());
    global::with_default(|registry| {
        assert!(!registry.has_emitter_entry(widget_id));
        assert!(!registry.has_receiver(widget_id));
        assert!(!registry.has_emitter_entry(&button));
    });
}

/// Test a receiver that disconnects the callback keeping it alive, in the
/// middle of an emission.
#[test]
fn receiver_released_during_emit_clears_its_endpoint() {
    let clicked = Token::<u32>::new("clicked");
    let button = Endpoint::new();
    let count = Rc::new(Cell::new(0));

    let widget = Widget::new();
    let widget_id = widget.endpoint.id();
    let weak = Rc::downgrade(&widget);
    let close = {
        let widget = widget.clone();
        Callback::from_fn(move |_: &u32| {
            global::disconnect_receiver(widget.endpoint.id());
        })
    };
    let after = {
        let count = count.clone();
        Callback::from_fn(move |_: &u32| count.set(count.get() + 1))
    };
    global::connect(&button, clicked, &close, Some(widget_id));
    global::connect(&button, clicked, &after, None);
    drop(close);
    drop(widget);

    global::emit(&button, clicked, &1).unwrap();
    assert!(weak.upgrade().is_none());
    assert_eq!(count.get(), 1);

    global::emit(&button, clicked, &2).unwrap();
    assert_eq!(count.get(), 2);
    global::with_default(|registry| {
        assert!(!registry.has_emitter_entry(widget_id));
        assert_eq!(registry.connection_count(&button, clicked), 1);
    });
}
