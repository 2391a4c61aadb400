//! Multi-source blocking wait
//!
//! A thread hands [`poll`] a list of [`PollEvent`]s and sleeps until at
//! least one of them is ready. Every pollable object keeps a
//! [`PollWaiters`] list and notifies it whenever its state may have
//! changed, so nothing here spins.

use core_types::ZervError;
use kernel_api::{Deadline, Timeout};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;

/// Condition a poll event waits for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollType {
    /// A semaphore has a count to take
    SemAvailable,
    /// A poll signal was raised
    Signal,
    /// A FIFO holds at least one item
    FifoDataAvailable,
}

impl PollType {
    /// The state an object reports when this condition holds
    pub const fn ready_state(self) -> PollState {
        match self {
            PollType::SemAvailable => PollState::SemAvailable,
            PollType::Signal => PollState::Signaled,
            PollType::FifoDataAvailable => PollState::FifoDataAvailable,
        }
    }
}

/// Observed state of a pollable object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollState {
    NotReady,
    SemAvailable,
    Signaled,
    FifoDataAvailable,
}

/// Wakes one blocked [`poll`] call
#[derive(Debug, Default)]
pub struct PollWaker {
    woken: Mutex<bool>,
    cond: Condvar,
}

impl PollWaker {
    fn new() -> Self {
        Self::default()
    }

    fn arm(&self) {
        *self.woken.lock() = false;
    }

    fn wake(&self) {
        let mut woken = self.woken.lock();
        *woken = true;
        self.cond.notify_one();
    }

    /// Returns false when the deadline passed without a wakeup
    fn wait(&self, deadline: Deadline) -> bool {
        let mut woken = self.woken.lock();
        while !*woken {
            match deadline.instant() {
                Some(at) => {
                    if self.cond.wait_until(&mut woken, at).timed_out() {
                        return *woken;
                    }
                }
                None => self.cond.wait(&mut woken),
            }
        }
        true
    }
}

/// Pollers currently blocked on an object
#[derive(Default)]
pub struct PollWaiters {
    wakers: Mutex<Vec<Arc<PollWaker>>>,
}

impl PollWaiters {
    /// Creates an empty waiter list
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, waker: &Arc<PollWaker>) {
        self.wakers.lock().push(Arc::clone(waker));
    }

    fn unregister(&self, waker: &Arc<PollWaker>) {
        self.wakers.lock().retain(|w| !Arc::ptr_eq(w, waker));
    }

    /// Wakes every registered poller
    pub fn notify(&self) {
        for waker in self.wakers.lock().iter() {
            waker.wake();
        }
    }

    /// Number of pollers currently registered
    pub fn len(&self) -> usize {
        self.wakers.lock().len()
    }

    /// Returns true if nobody is polling the object
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for PollWaiters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollWaiters")
            .field("registered", &self.len())
            .finish()
    }
}

/// An object [`poll`] can wait on
pub trait Pollable: Send + Sync {
    /// Current state of the object
    fn poll_state(&self) -> PollState;

    /// Pollers to notify on every state change
    fn waiters(&self) -> &PollWaiters;
}

/// One wait source handed to [`poll`]
pub struct PollEvent {
    object: Arc<dyn Pollable>,
    poll_type: PollType,
    state: PollState,
    tag: u32,
}

impl PollEvent {
    /// Creates an event waiting for `poll_type` on `object`
    pub fn new(object: Arc<dyn Pollable>, poll_type: PollType) -> Self {
        Self {
            object,
            poll_type,
            state: PollState::NotReady,
            tag: 0,
        }
    }

    /// Attaches a user tag
    pub fn with_tag(mut self, tag: u32) -> Self {
        self.tag = tag;
        self
    }

    /// The condition this event waits for
    pub fn poll_type(&self) -> PollType {
        self.poll_type
    }

    /// The state recorded by the last [`poll`]
    pub fn state(&self) -> PollState {
        self.state
    }

    /// User tag
    pub fn tag(&self) -> u32 {
        self.tag
    }

    /// The object being waited on
    pub fn object(&self) -> &Arc<dyn Pollable> {
        &self.object
    }

    /// Returns true if the last poll observed the awaited condition
    pub fn is_ready(&self) -> bool {
        self.state == self.poll_type.ready_state()
    }

    /// Forgets the recorded state
    pub fn reset_state(&mut self) {
        self.state = PollState::NotReady;
    }

    fn refresh(&mut self) -> bool {
        self.state = self.object.poll_state();
        self.is_ready()
    }
}

impl fmt::Debug for PollEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollEvent")
            .field("poll_type", &self.poll_type)
            .field("state", &self.state)
            .field("tag", &self.tag)
            .finish()
    }
}

fn sample(events: &mut [PollEvent]) -> usize {
    events
        .iter_mut()
        .map(PollEvent::refresh)
        .filter(|ready| *ready)
        .count()
}

/// Blocks until at least one event is ready or the timeout expires.
///
/// On return every event's state reflects what was observed; the number
/// of events whose state matches their type is returned.
///
/// # Errors
///
/// * `InvalidArgument` - `events` is empty
/// * `Timeout` - nothing became ready in time
pub fn poll(events: &mut [PollEvent], timeout: Timeout) -> Result<usize, ZervError> {
    if events.is_empty() {
        return Err(ZervError::InvalidArgument);
    }

    let deadline = timeout.deadline();
    let waker = Arc::new(PollWaker::new());
    for event in events.iter() {
        event.object.waiters().register(&waker);
    }

    let ready = loop {
        // Arm before sampling so a change racing the sample is not lost.
        waker.arm();
        let ready = sample(events);
        if ready > 0 || deadline.has_expired() {
            break ready;
        }
        if !waker.wait(deadline) {
            break sample(events);
        }
    };

    for event in events.iter() {
        event.object.waiters().unregister(&waker);
    }

    if ready == 0 {
        return Err(ZervError::Timeout);
    }
    Ok(ready)
}
