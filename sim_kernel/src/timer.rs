//! # Host Timer
//!
//! One-shot and periodic timers whose expiry function runs on a helper
//! thread, the way a kernel timer's expiry runs outside the thread that
//! armed it.
//!
//! ## Use Cases
//!
//! - Periodic service ticks
//! - Resolving deferred requests from a different context
//! - Tests that need something to happen "later"

use kernel_api::KernelError;
use log::debug;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct Armed {
    at: Instant,
    period: Option<Duration>,
}

#[derive(Debug, Default)]
struct Control {
    armed: Option<Armed>,
    expiries: u64,
    shutdown: bool,
}

#[derive(Debug, Default)]
struct Shared {
    control: Mutex<Control>,
    cond: Condvar,
}

/// Timer with an expiry function
///
/// # Examples
///
/// ```
/// use sim_kernel::timer::Timer;
/// use std::time::Duration;
///
/// let timer = Timer::new("example", || {}).unwrap();
/// timer.start(Duration::from_millis(1), None);
/// timer.stop();
/// ```
#[derive(Debug)]
pub struct Timer {
    name: String,
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl Timer {
    /// Creates a stopped timer that runs `expiry` each time it fires
    pub fn new(
        name: impl Into<String>,
        expiry: impl FnMut() + Send + 'static,
    ) -> Result<Self, KernelError> {
        let name = name.into();
        let shared = Arc::new(Shared::default());
        let worker = Arc::clone(&shared);
        let thread = std::thread::Builder::new()
            .name(format!("{}-timer", name))
            .spawn(move || run_timer(&worker, expiry))
            .map_err(|e| KernelError::SpawnFailed(format!("{}: {}", name, e)))?;
        Ok(Self {
            name,
            shared,
            thread: Some(thread),
        })
    }

    /// Arms the timer to fire after `delay`, then every `period` if given.
    ///
    /// Restarting an armed timer replaces its schedule.
    pub fn start(&self, delay: Duration, period: Option<Duration>) {
        let mut control = self.shared.control.lock();
        control.armed = Some(Armed {
            at: Instant::now() + delay,
            period,
        });
        debug!(target: "sim_kernel", "timer {} armed ({:?}, period {:?})", self.name, delay, period);
        self.shared.cond.notify_one();
    }

    /// Disarms the timer; an expiry already running is not interrupted
    pub fn stop(&self) {
        self.shared.control.lock().armed = None;
        self.shared.cond.notify_one();
    }

    /// Returns true while the timer is armed
    pub fn is_running(&self) -> bool {
        self.shared.control.lock().armed.is_some()
    }

    /// Number of times the timer has fired
    pub fn expiries(&self) -> u64 {
        self.shared.control.lock().expiries
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        {
            let mut control = self.shared.control.lock();
            control.shutdown = true;
            control.armed = None;
        }
        self.shared.cond.notify_one();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn run_timer(shared: &Shared, mut expiry: impl FnMut()) {
    let mut control = shared.control.lock();
    loop {
        if control.shutdown {
            return;
        }
        match control.armed {
            None => shared.cond.wait(&mut control),
            Some(armed) if Instant::now() >= armed.at => {
                control.armed = armed.period.map(|period| Armed {
                    at: armed.at + period,
                    period: Some(period),
                });
                control.expiries += 1;
                MutexGuard::unlocked(&mut control, &mut expiry);
            }
            Some(armed) => {
                shared.cond.wait_until(&mut control, armed.at);
            }
        }
    }
}
