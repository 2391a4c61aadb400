//! Unified poll-driven event loop
//!
//! One thread, one wait: the service queue is always source 0 and every
//! other source (semaphores, signals, periodic ticks, other queues) is
//! multiplexed through the same [`poll`] call. No source gets its own
//! thread and nothing spins.
//!
//! ## Iteration
//!
//! 1. Block until at least one source is ready.
//! 2. If the queue is ready, pop exactly one request and dispatch it.
//! 3. Run the handler of every other source whose state matches its
//!    declared type, then reset that source.

use crate::processor::process_one;
use crate::service::Service;
use core_types::ZervError;
use kernel_api::{KernelError, ThreadDescriptor, ThreadHandle, ThreadSpawner, Timeout};
use log::{debug, error};
use sim_kernel::{poll, PollEvent, PollSignal, PollType, Semaphore, Timer};
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

type SourceHandler = Box<dyn FnMut(&Service, &PollEvent) + Send + 'static>;
type InitHook = Box<dyn FnOnce(&Service) -> Result<(), ZervError> + Send + 'static>;

struct Source {
    handler: SourceHandler,
    /// Set for signal sources, which are reset after their handler runs
    signal: Option<Arc<PollSignal>>,
}

struct Ticker {
    period: Duration,
    semaphore: Arc<Semaphore>,
}

/// Reactor owning a service and its extra wait sources
pub struct EventLoop {
    service: Arc<Service>,
    /// `events[0]` is the service queue, `events[i]` belongs to `sources[i - 1]`
    events: Vec<PollEvent>,
    sources: Vec<Source>,
    on_init: Option<InitHook>,
    tickers: Vec<Ticker>,
    timers: Vec<Timer>,
}

impl EventLoop {
    /// Creates a loop serving `service` with no extra sources
    pub fn new(service: Arc<Service>) -> Self {
        let queue = service.poll_event();
        Self {
            service,
            events: vec![queue],
            sources: Vec::new(),
            on_init: None,
            tickers: Vec::new(),
            timers: Vec::new(),
        }
    }

    /// The service this loop dispatches for
    pub fn service(&self) -> &Arc<Service> {
        &self.service
    }

    /// Number of wait sources, the service queue included
    pub fn source_count(&self) -> usize {
        self.events.len()
    }

    /// Adds an arbitrary wait source
    pub fn on_source<F>(mut self, event: PollEvent, handler: F) -> Self
    where
        F: FnMut(&Service, &PollEvent) + Send + 'static,
    {
        self.push_source(event, Box::new(handler), None);
        self
    }

    /// Runs `handler` whenever `semaphore` has a count.
    ///
    /// The handler must take the semaphore, otherwise it stays ready.
    pub fn on_semaphore<F>(mut self, semaphore: Arc<Semaphore>, mut handler: F) -> Self
    where
        F: FnMut(&Service, &Semaphore) + Send + 'static,
    {
        let event = PollEvent::new(semaphore.clone(), PollType::SemAvailable);
        self.push_source(
            event,
            Box::new(move |service, _| handler(service, &semaphore)),
            None,
        );
        self
    }

    /// Runs `handler` with the raised value whenever `signal` is raised
    pub fn on_signal<F>(mut self, signal: Arc<PollSignal>, mut handler: F) -> Self
    where
        F: FnMut(&Service, i32) + Send + 'static,
    {
        let event = PollEvent::new(signal.clone(), PollType::Signal);
        let observed = Arc::clone(&signal);
        self.push_source(
            event,
            Box::new(move |service, _| {
                if let Some(result) = observed.check() {
                    handler(service, result);
                }
            }),
            Some(signal),
        );
        self
    }

    /// Runs `tick` on the loop thread every `period`
    pub fn with_period<F>(mut self, period: Duration, mut tick: F) -> Self
    where
        F: FnMut(&Service) + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::binary());
        self.tickers.push(Ticker {
            period,
            semaphore: Arc::clone(&semaphore),
        });
        self.on_semaphore(semaphore, move |service, semaphore| {
            if semaphore.take(Timeout::NoWait).is_ok() {
                tick(service);
            }
        })
    }

    /// Runs `hook` on the loop thread before the first wait
    pub fn on_init<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(&Service) -> Result<(), ZervError> + Send + 'static,
    {
        self.on_init = Some(Box::new(hook));
        self
    }

    fn push_source(&mut self, event: PollEvent, handler: SourceHandler, signal: Option<Arc<PollSignal>>) {
        let tag = self.events.len() as u32;
        self.events.push(event.with_tag(tag));
        self.sources.push(Source { handler, signal });
    }

    /// Clears signal sources, runs the init hook and arms periodic timers.
    ///
    /// Signals raised by the init hook are kept and served by the first
    /// iteration.
    ///
    /// # Errors
    ///
    /// * whatever the init hook returned
    /// * `Error` - a periodic timer could not be created
    pub fn init(&mut self) -> Result<(), ZervError> {
        for signal in self.sources.iter().filter_map(|s| s.signal.as_ref()) {
            signal.init();
            signal.reset();
        }

        if let Some(hook) = self.on_init.take() {
            hook(&self.service)?;
        }

        for (index, ticker) in self.tickers.iter().enumerate() {
            let semaphore = Arc::clone(&ticker.semaphore);
            let name = format!("{}-tick{}", self.service.name(), index);
            let timer = Timer::new(name, move || semaphore.give()).map_err(|e| {
                error!(target: "zerv", "{}: cannot create ticker: {}", self.service.name(), e);
                ZervError::Error
            })?;
            timer.start(ticker.period, Some(ticker.period));
            self.timers.push(timer);
        }

        debug!(
            target: "zerv",
            "{}: event loop ready with {} sources",
            self.service.name(),
            self.events.len()
        );
        Ok(())
    }

    /// Waits once and services every ready source.
    ///
    /// Returns the number of sources that were ready.
    ///
    /// # Errors
    ///
    /// * `Timeout` - nothing became ready in time
    pub fn run_once(&mut self, timeout: Timeout) -> Result<usize, ZervError> {
        let ready = poll(&mut self.events, timeout)?;

        if self.events[0].is_ready() {
            if let Some(request) = self.service.pending_request(Timeout::NoWait) {
                process_one(&self.service, request);
            }
        }
        self.events[0].reset_state();

        for (event, source) in self.events[1..].iter_mut().zip(self.sources.iter_mut()) {
            if event.is_ready() {
                (source.handler)(&self.service, event);
                if let Some(signal) = &source.signal {
                    signal.reset();
                }
            }
            event.reset_state();
        }
        Ok(ready)
    }

    /// Runs the loop forever.
    ///
    /// Only returns if initialization fails.
    pub fn run(mut self) -> Result<Infallible, ZervError> {
        if let Err(err) = self.init() {
            error!(target: "zerv", "{}: event loop init failed: {}", self.service.name(), err);
            return Err(err);
        }
        loop {
            if let Err(err) = self.run_once(Timeout::Forever) {
                error!(target: "zerv", "{}: poll failed: {}", self.service.name(), err);
            }
        }
    }

    /// Starts a thread running [`run`](Self::run)
    pub fn spawn<S: ThreadSpawner + ?Sized>(
        self,
        spawner: &S,
        descriptor: ThreadDescriptor,
    ) -> Result<ThreadHandle, KernelError> {
        spawner.spawn(
            descriptor,
            Box::new(move || {
                let _ = self.run();
            }),
        )
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("service", &self.service.name())
            .field("events", &self.events)
            .field("tickers", &self.tickers.len())
            .field("timers", &self.timers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn service() -> Arc<Service> {
        Service::builder("loop_test").build()
    }

    #[test]
    fn test_queue_is_source_zero() {
        let event_loop = EventLoop::new(service())
            .on_semaphore(Arc::new(Semaphore::binary()), |_, sem| {
                let _ = sem.take(Timeout::NoWait);
            });
        assert_eq!(event_loop.source_count(), 2);
        assert_eq!(event_loop.events[1].tag(), 1);
    }

    #[test]
    fn test_semaphore_source_runs_handler() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let sem = Arc::new(Semaphore::binary());
        let mut event_loop = EventLoop::new(service()).on_semaphore(sem.clone(), move |_, sem| {
            if sem.take(Timeout::NoWait).is_ok() {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        event_loop.init().unwrap();

        sem.give();
        assert_eq!(event_loop.run_once(Timeout::from_millis(100)), Ok(1));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(
            event_loop.run_once(Timeout::from_millis(10)),
            Err(ZervError::Timeout)
        );
    }

    #[test]
    fn test_signal_is_reset_after_handler() {
        let seen = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&seen);
        let signal = Arc::new(PollSignal::new());
        let mut event_loop = EventLoop::new(service()).on_signal(signal.clone(), move |_, value| {
            sink.store(value as usize, Ordering::SeqCst);
        });

        // Raised before init: must not be observed.
        signal.raise(1);
        event_loop.init().unwrap();
        assert_eq!(
            event_loop.run_once(Timeout::from_millis(10)),
            Err(ZervError::Timeout)
        );

        signal.raise(7);
        assert_eq!(event_loop.run_once(Timeout::from_millis(100)), Ok(1));
        assert_eq!(seen.load(Ordering::SeqCst), 7);
        assert_eq!(signal.check(), None);
    }

    #[test]
    fn test_signal_raised_by_init_hook_is_served() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let signal = Arc::new(PollSignal::new());
        let startup = Arc::clone(&signal);
        let mut event_loop = EventLoop::new(service())
            .on_signal(signal.clone(), move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .on_init(move |_| {
                startup.raise(1);
                Ok(())
            });

        event_loop.init().unwrap();
        assert_eq!(event_loop.run_once(Timeout::from_millis(100)), Ok(1));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(signal.check(), None);
    }

    #[test]
    fn test_init_hook_failure_is_reported() {
        let mut event_loop = EventLoop::new(service()).on_init(|_| Err(ZervError::Error));
        assert_eq!(event_loop.init(), Err(ZervError::Error));
    }
}
