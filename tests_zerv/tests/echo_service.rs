//! Echo Service Tests
//!
//! Validates the synchronous call path against a service running on its
//! own request processor thread: responses, handler errors and the
//! one-call-per-command lock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tests_zerv::{
    echo_service, spawn_service, spawn_thread, test_bootstrap, wait_until, Text, PROMPTLY,
};
use zerv::{Command, Reply, Service, ZervError};

/// Test: Echo returns the request text
#[test]
fn test_echo_returns_request() {
    let (threads, _) = test_bootstrap();
    let fixture = echo_service(1024);
    let _server = spawn_service(&threads, &fixture.service);

    let mut resp = Text::default();
    let rc = fixture
        .service
        .call(fixture.echo, &Text::new("Hello"), &mut resp);

    assert_eq!(rc, Ok(Reply::Ready));
    assert_eq!(resp.str, "Hello");
    assert!(!fixture.service.is_locked(fixture.echo));
    assert_eq!(fixture.service.arena_used(), 0);
}

/// Test: A failing handler surfaces ERROR and leaves the command usable
#[test]
fn test_fail_returns_error() {
    let (threads, _) = test_bootstrap();
    let fixture = echo_service(1024);
    let _server = spawn_service(&threads, &fixture.service);

    for _ in 0..3 {
        assert_eq!(
            fixture.service.call(fixture.fail, &(), &mut ()),
            Err(ZervError::Error)
        );
        assert!(!fixture.service.is_locked(fixture.fail));
    }
    assert_eq!(fixture.service.arena_used(), 0);
}

/// Test: Responses are byte-equal for payloads of every length
#[test]
fn test_echo_round_trips_varied_payloads() {
    let (threads, _) = test_bootstrap();
    let fixture = echo_service(1024);
    let _server = spawn_service(&threads, &fixture.service);

    for text in ["", "a", "Hello World!", "åäö unicode", "x".repeat(29).as_str()] {
        let mut resp = Text::default();
        assert_eq!(
            fixture.service.call(fixture.echo, &Text::new(text), &mut resp),
            Ok(Reply::Ready)
        );
        assert_eq!(resp.str, text);
    }
}

/// Test: Two concurrent calls on one command yield OK and LOCKED
///
/// The first call is held inside its handler until the second caller
/// has been rejected.
#[test]
fn test_concurrent_calls_yield_ok_and_locked() {
    let (threads, _) = test_bootstrap();
    let fixture = echo_service(1024);
    let _server = spawn_service(&threads, &fixture.service);

    let service = Arc::clone(&fixture.service);
    let gated = fixture.gated;
    let first = spawn_thread(&threads, "first_caller", move || {
        let mut resp = Text::default();
        let rc = service.call(gated, &Text::new("first"), &mut resp);
        assert_eq!(rc, Ok(Reply::Ready));
        assert_eq!(resp.str, "first");
    });

    assert!(wait_until(PROMPTLY, || fixture.service.is_locked(gated)));
    let mut resp = Text::default();
    assert_eq!(
        fixture.service.call(gated, &Text::new("second"), &mut resp),
        Err(ZervError::Locked)
    );
    assert_eq!(resp, Text::default());

    fixture.gate.give();
    first.join().unwrap();
    assert!(!fixture.service.is_locked(gated));
}

/// Test: Requests for other commands queue behind a busy handler
#[test]
fn test_other_commands_queue_behind_busy_handler() {
    let (threads, _) = test_bootstrap();
    let fixture = echo_service(1024);
    let _server = spawn_service(&threads, &fixture.service);

    let service = Arc::clone(&fixture.service);
    let gated = fixture.gated;
    let blocked = spawn_thread(&threads, "blocked_caller", move || {
        let mut resp = Text::default();
        assert!(service.call(gated, &Text::new("slow"), &mut resp).is_ok());
    });
    assert!(wait_until(PROMPTLY, || fixture.service.is_locked(gated)));

    // The service thread itself is parked in the gated handler, so the
    // echo call is queued behind it and completes once the gate opens.
    let service = Arc::clone(&fixture.service);
    let echo = fixture.echo;
    let queued = spawn_thread(&threads, "queued_caller", move || {
        let mut resp = Text::default();
        assert_eq!(service.call(echo, &Text::new("later"), &mut resp), Ok(Reply::Ready));
        assert_eq!(resp.str, "later");
    });
    assert!(wait_until(PROMPTLY, || fixture.service.is_locked(echo)));

    fixture.gate.give();
    blocked.join().unwrap();
    queued.join().unwrap();
}

/// Test: Many callers hammering one command never overlap in the handler
#[test]
fn test_mutual_exclusion_under_contention() {
    struct Count;

    impl Command for Count {
        const NAME: &'static str = "count";
        type Request = ();
        type Response = ();
    }

    let (threads, _) = test_bootstrap();
    let inside = Arc::new(AtomicUsize::new(0));
    let overlaps = Arc::new(AtomicUsize::new(0));
    let dispatched = Arc::new(AtomicUsize::new(0));

    let mut builder = Service::builder("counter");
    let (inside_h, overlaps_h, dispatched_h) =
        (inside.clone(), overlaps.clone(), dispatched.clone());
    let count = builder.command::<Count, _>(move |_, _| {
        if inside_h.fetch_add(1, Ordering::SeqCst) != 0 {
            overlaps_h.fetch_add(1, Ordering::SeqCst);
        }
        std::thread::yield_now();
        dispatched_h.fetch_add(1, Ordering::SeqCst);
        inside_h.fetch_sub(1, Ordering::SeqCst);
        Ok(Reply::Ready)
    });
    let service = builder.build();
    let _server = spawn_service(&threads, &service);

    let ok = Arc::new(AtomicUsize::new(0));
    let locked = Arc::new(AtomicUsize::new(0));
    let callers: Vec<_> = (0..4)
        .map(|i| {
            let (service, ok, locked) = (service.clone(), ok.clone(), locked.clone());
            spawn_thread(&threads, &format!("caller{}", i), move || {
                for _ in 0..50 {
                    match service.call(count, &(), &mut ()) {
                        Ok(Reply::Ready) => ok.fetch_add(1, Ordering::SeqCst),
                        Err(ZervError::Locked) => locked.fetch_add(1, Ordering::SeqCst),
                        other => panic!("unexpected result {:?}", other),
                    };
                }
            })
        })
        .collect();
    for caller in callers {
        caller.join().unwrap();
    }

    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    assert_eq!(ok.load(Ordering::SeqCst), dispatched.load(Ordering::SeqCst));
    assert_eq!(ok.load(Ordering::SeqCst) + locked.load(Ordering::SeqCst), 200);
    assert!(!service.is_locked(count));
    assert_eq!(service.arena_used(), 0);
}

/// Test: NOMEM releases the lock so the command stays usable
#[test]
fn test_nomem_restores_lock() {
    let (threads, _) = test_bootstrap();
    let fixture = echo_service(48);
    let _server = spawn_service(&threads, &fixture.service);

    let mut resp = Text::default();
    let big = Text::new(&"y".repeat(64));
    assert_eq!(
        fixture.service.call(fixture.echo, &big, &mut resp),
        Err(ZervError::NoMem)
    );
    assert!(!fixture.service.is_locked(fixture.echo));

    assert_eq!(
        fixture.service.call(fixture.echo, &Text::new("ok"), &mut resp),
        Ok(Reply::Ready)
    );
    assert_eq!(resp.str, "ok");
}

/// Test: Calls from one service's handler into another service
#[test]
fn test_nested_call_between_services() {
    struct Relay;

    impl Command for Relay {
        const NAME: &'static str = "relay";
        type Request = Text;
        type Response = Text;
    }

    let (threads, _) = test_bootstrap();
    let backend = echo_service(1024);
    let _backend_server = spawn_service(&threads, &backend.service);

    let target = Arc::clone(&backend.service);
    let echo = backend.echo;
    let mut builder = Service::builder("relay");
    let relay = builder.command::<Relay, _>(move |req, resp| {
        let mut inner = Text::default();
        target.call(echo, &Text::new(&format!("via relay: {}", req.str)), &mut inner)?;
        *resp = inner;
        Ok(Reply::Ready)
    });
    let front = builder.build();
    let _front_server = spawn_service(&threads, &front);

    let mut resp = Text::default();
    assert_eq!(front.call(relay, &Text::new("hi"), &mut resp), Ok(Reply::Ready));
    assert_eq!(resp.str, "via relay: hi");
}
