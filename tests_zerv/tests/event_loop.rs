//! Event Loop Tests
//!
//! Validates the reactor running on a service thread: requests and extra
//! wait sources are served by one thread, signals are cleared on start,
//! periodic ticks fire and a failing init hook ends the thread.

use kernel_api::ThreadDescriptor;
use pubsub::{Publisher, Subscriber, SubscriberConfig};
use sim_kernel::{PollSignal, Semaphore};
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tests_zerv::{echo_service, test_bootstrap, wait_until, Text, PROMPTLY};
use zerv::{EventLoop, Reply, Timeout, ZervError};

/// Test: Requests and semaphore events share one loop thread
#[test]
fn test_loop_serves_requests_and_semaphore() {
    let (threads, _) = test_bootstrap();
    let fixture = echo_service(1024);
    let sem = Arc::new(Semaphore::new(0, 8));
    let taken = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&taken);
    let _thread = EventLoop::new(Arc::clone(&fixture.service))
        .on_semaphore(Arc::clone(&sem), move |_, sem| {
            while sem.take(Timeout::NoWait).is_ok() {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        })
        .spawn(&threads, ThreadDescriptor::new("echo_loop"))
        .unwrap();

    let mut resp = Text::default();
    assert_eq!(
        fixture.service.call(fixture.echo, &Text::new("Hello"), &mut resp),
        Ok(Reply::Ready)
    );
    assert_eq!(resp.str, "Hello");

    for _ in 0..3 {
        sem.give();
    }
    assert!(wait_until(PROMPTLY, || taken.load(Ordering::SeqCst) == 3));

    assert_eq!(
        fixture.service.call(fixture.fail, &(), &mut ()),
        Err(ZervError::Error)
    );
}

/// Test: Signals raised before start are not delivered; later ones are, once each
#[test]
fn test_signal_source_is_reset() {
    let (threads, _) = test_bootstrap();
    let fixture = echo_service(1024);
    let signal = Arc::new(PollSignal::new());
    let last = Arc::new(AtomicI32::new(0));
    let count = Arc::new(AtomicUsize::new(0));
    let started = Arc::new(Semaphore::binary());

    signal.raise(99);

    let (sink, hits, ready) = (last.clone(), count.clone(), started.clone());
    let _thread = EventLoop::new(Arc::clone(&fixture.service))
        .on_init(move |_| {
            ready.give();
            Ok(())
        })
        .on_signal(Arc::clone(&signal), move |_, value| {
            sink.store(value, Ordering::SeqCst);
            hits.fetch_add(1, Ordering::SeqCst);
        })
        .spawn(&threads, ThreadDescriptor::new("signal_loop"))
        .unwrap();

    started.take(Timeout::After(PROMPTLY)).unwrap();
    // Round-trip a request so initialization has certainly finished.
    let mut resp = Text::default();
    fixture
        .service
        .call(fixture.echo, &Text::new("sync"), &mut resp)
        .unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 0);

    signal.raise(7);
    assert!(wait_until(PROMPTLY, || count.load(Ordering::SeqCst) == 1));
    assert_eq!(last.load(Ordering::SeqCst), 7);
    assert!(wait_until(PROMPTLY, || signal.check().is_none()));

    signal.raise(8);
    assert!(wait_until(PROMPTLY, || count.load(Ordering::SeqCst) == 2));
    assert_eq!(last.load(Ordering::SeqCst), 8);
}

/// Test: The periodic ticker runs on the loop thread between requests
#[test]
fn test_periodic_tick() {
    let (threads, _) = test_bootstrap();
    let fixture = echo_service(1024);
    let ticks = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&ticks);
    let _thread = EventLoop::new(Arc::clone(&fixture.service))
        .with_period(Duration::from_millis(5), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .spawn(&threads, ThreadDescriptor::new("periodic_loop"))
        .unwrap();

    assert!(wait_until(PROMPTLY, || ticks.load(Ordering::SeqCst) >= 3));

    let mut resp = Text::default();
    assert_eq!(
        fixture.service.call(fixture.echo, &Text::new("between ticks"), &mut resp),
        Ok(Reply::Ready)
    );
    assert_eq!(resp.str, "between ticks");
}

/// Test: A subscriber mailbox can be multiplexed into a service loop
#[test]
fn test_subscriber_mailbox_as_source() {
    let (threads, _) = test_bootstrap();
    let fixture = echo_service(1024);
    let publisher = Publisher::new("sensor");
    let subscriber = Subscriber::new("echo_sensor", SubscriberConfig::default());
    publisher.add_subscriber(&subscriber).unwrap();

    let total = Arc::new(AtomicUsize::new(0));
    let (sink, mailbox) = (Arc::clone(&total), Arc::clone(&subscriber));
    let _thread = EventLoop::new(Arc::clone(&fixture.service))
        .on_source(subscriber.poll_event(), move |_, _| {
            while let Some(handle) = mailbox.receive() {
                sink.fetch_add(handle.len(), Ordering::SeqCst);
                mailbox.free(handle).unwrap();
            }
        })
        .spawn(&threads, ThreadDescriptor::new("sensor_loop"))
        .unwrap();

    publisher.emit(b"abc").unwrap();
    publisher.emit(b"defgh").unwrap();
    assert!(wait_until(PROMPTLY, || total.load(Ordering::SeqCst) == 8));
    assert!(wait_until(PROMPTLY, || subscriber.arena_used() == 0));

    let mut resp = Text::default();
    assert_eq!(
        fixture.service.call(fixture.echo, &Text::new("still here"), &mut resp),
        Ok(Reply::Ready)
    );
}

/// Test: A failing init hook ends the loop thread
#[test]
fn test_init_failure_ends_thread() {
    let (threads, _) = test_bootstrap();
    let fixture = echo_service(1024);

    let thread = EventLoop::new(Arc::clone(&fixture.service))
        .on_init(|_| Err(ZervError::Error))
        .spawn(&threads, ThreadDescriptor::new("doomed_loop"))
        .unwrap();

    assert!(thread.join().is_ok());
}

/// Test: run_once dispatches exactly one queued request per iteration
#[test]
fn test_run_once_pops_one_request() {
    let fixture = echo_service(1024);
    let sem = Arc::new(Semaphore::binary());
    let mut event_loop = EventLoop::new(Arc::clone(&fixture.service))
        .on_semaphore(Arc::clone(&sem), |_, sem| {
            let _ = sem.take(Timeout::NoWait);
        });
    event_loop.init().unwrap();

    assert_eq!(
        event_loop.run_once(Timeout::NoWait),
        Err(ZervError::Timeout)
    );

    let service = fixture.service.clone();
    let first = std::thread::spawn({
        let service = service.clone();
        let echo = fixture.echo;
        move || {
            let mut resp = Text::default();
            service.call(echo, &Text::new("one"), &mut resp).map(|_| resp.str)
        }
    });
    assert!(wait_until(PROMPTLY, || service.pending_len() == 1));

    sem.give();
    assert_eq!(event_loop.run_once(Timeout::After(PROMPTLY)), Ok(2));
    assert_eq!(service.pending_len(), 0);
    assert_eq!(first.join().unwrap(), Ok("one".to_string()));
}
