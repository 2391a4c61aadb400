//! Call Timeout Tests
//!
//! Validates the bounded call policy. A timed-out caller either withdraws
//! its queued request, or abandons it to the service thread, which then
//! reaps the envelope and the lock when the handler finishes.

use sim_kernel::Semaphore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tests_zerv::{spawn_service, test_bootstrap, wait_until, Text, PROMPTLY};
use zerv::{CallTimeout, Command, CommandRef, Reply, ReturnCode, Service, Timeout, ZervError};

const SHORT: Duration = Duration::from_millis(200);

struct Slow;

impl Command for Slow {
    const NAME: &'static str = "slow";
    type Request = Text;
    type Response = Text;
}

struct SlowFuture;

impl Command for SlowFuture {
    const NAME: &'static str = "slow_future";
    type Request = Text;
    type Response = Text;
}

struct Fixture {
    service: Arc<Service>,
    slow: CommandRef<Slow>,
    slow_future: CommandRef<SlowFuture>,
    gate: Arc<Semaphore>,
    entered: Arc<Semaphore>,
}

/// Service whose handlers park until the gate is given
fn gated_service() -> Fixture {
    let gate = Arc::new(Semaphore::new(0, u32::MAX));
    let entered = Arc::new(Semaphore::new(0, u32::MAX));
    let mut builder = Service::builder("gated")
        .with_call_timeout(CallTimeout::CancelAfter(SHORT));

    let (g, e) = (gate.clone(), entered.clone());
    let slow = builder.command::<Slow, _>(move |req, resp| {
        e.give();
        g.take(Timeout::Forever)?;
        resp.str = req.str.clone();
        Ok(Reply::Ready)
    });
    let (g, e) = (gate.clone(), entered.clone());
    let slow_future = builder.command::<SlowFuture, _>(move |_, _| {
        e.give();
        g.take(Timeout::Forever)?;
        Ok(Reply::Future)
    });

    Fixture {
        service: builder.build(),
        slow,
        slow_future,
        gate,
        entered,
    }
}

/// Test: A request nobody popped is withdrawn and freed
#[test]
fn test_timeout_while_queued_withdraws_request() {
    let fixture = gated_service();
    let mut resp = Text::default();

    assert_eq!(
        fixture.service.call(fixture.slow, &Text::new("lost"), &mut resp),
        Err(ZervError::Timeout)
    );
    assert_eq!(fixture.service.pending_len(), 0);
    assert_eq!(fixture.service.arena_used(), 0);
    assert!(!fixture.service.is_locked(fixture.slow));
    assert_eq!(resp, Text::default());
}

/// Test: A late synchronous completion frees the envelope and the lock
#[test]
fn test_timeout_during_dispatch_is_reaped_by_service() {
    let (threads, _) = test_bootstrap();
    let fixture = gated_service();
    let _server = spawn_service(&threads, &fixture.service);

    let mut resp = Text::default();
    assert_eq!(
        fixture.service.call(fixture.slow, &Text::new("late"), &mut resp),
        Err(ZervError::Timeout)
    );
    fixture.entered.take(Timeout::After(PROMPTLY)).unwrap();

    // The handler still runs, so the lock is still held.
    assert!(fixture.service.is_locked(fixture.slow));
    assert_eq!(
        fixture.service.call(fixture.slow, &Text::new("again"), &mut resp),
        Err(ZervError::Locked)
    );

    fixture.gate.give();
    assert!(wait_until(PROMPTLY, || !fixture.service.is_locked(fixture.slow)));
    assert!(wait_until(PROMPTLY, || fixture.service.arena_used() == 0));

    // The command is usable again.
    fixture.gate.give();
    assert_eq!(
        fixture.service.call(fixture.slow, &Text::new("fresh"), &mut resp),
        Ok(Reply::Ready)
    );
    assert_eq!(resp.str, "fresh");
}

/// Test: A deferral after the caller gave up is reaped on resolution
#[test]
fn test_late_deferral_is_reaped_without_callback() {
    let (threads, _) = test_bootstrap();
    let fixture = gated_service();
    let _server = spawn_service(&threads, &fixture.service);

    let called = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&called);
    let mut resp = Text::default();
    assert_eq!(
        fixture.service.call_with_callback(
            fixture.slow_future,
            &Text::new("orphan"),
            &mut resp,
            move |_| flag.store(true, Ordering::SeqCst),
        ),
        Err(ZervError::Timeout)
    );
    fixture.entered.take(Timeout::After(PROMPTLY)).unwrap();

    fixture.gate.give();
    assert!(wait_until(PROMPTLY, || fixture
        .service
        .future_is_active(fixture.slow_future)));
    assert!(fixture.service.is_locked(fixture.slow_future));

    fixture
        .service
        .signal_response(fixture.slow_future, ReturnCode::Ok)
        .unwrap();

    assert!(!called.load(Ordering::SeqCst));
    assert!(!fixture.service.future_is_active(fixture.slow_future));
    assert!(!fixture.service.is_locked(fixture.slow_future));
    assert_eq!(fixture.service.arena_used(), 0);
}

/// Test: An unbounded call waits however long the handler takes
#[test]
fn test_unbounded_call_waits_for_handler() {
    let (threads, _) = test_bootstrap();
    let gate = Arc::new(Semaphore::binary());
    let mut builder = Service::builder("patient");
    let handler_gate = Arc::clone(&gate);
    let slow = builder.command::<Slow, _>(move |req, resp| {
        handler_gate.take(Timeout::Forever)?;
        resp.str = req.str.clone();
        Ok(Reply::Ready)
    });
    let service = builder.build();
    assert_eq!(service.config().call_timeout, CallTimeout::Unbounded);
    let _server = spawn_service(&threads, &service);

    let opener = Arc::clone(&gate);
    let _timer = std::thread::spawn(move || {
        std::thread::sleep(SHORT * 3);
        opener.give();
    });

    let mut resp = Text::default();
    assert_eq!(
        service.call(slow, &Text::new("worth the wait"), &mut resp),
        Ok(Reply::Ready)
    );
    assert_eq!(resp.str, "worth the wait");
}
