//! Service Runtime Test Utilities
//!
//! This crate provides shared fixtures for the integration tests.
//!
//! ## Test Philosophy
//!
//! - **Real threads**: Services run on their own threads, callers block for real
//! - **Bounded waits**: Every wait in a test has a deadline, a hang is a failure
//! - **Observable cleanup**: Lock flags and arena usage are checked after every scenario

use kernel_api::{ThreadDescriptor, ThreadHandle, ThreadSpawner};
use serde::{Deserialize, Serialize};
use sim_kernel::{HostThreads, Semaphore};
use std::sync::Arc;
use std::time::{Duration, Instant};
use zerv::{
    spawn_request_processor, Command, CommandRef, Reply, Service, ServiceRegistry, Timeout,
    ZervError,
};

/// Installs the test logger once; honours `RUST_LOG`
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Bootstrap helper for tests
///
/// Creates a thread spawner and an empty registry.
pub fn test_bootstrap() -> (HostThreads, ServiceRegistry) {
    init_logging();
    (HostThreads::new(), ServiceRegistry::new())
}

/// Runs `service` on a request processor thread
pub fn spawn_service(spawner: &HostThreads, service: &Arc<Service>) -> ThreadHandle {
    let descriptor = ThreadDescriptor::new(service.name()).with_stack_size(1024);
    spawn_request_processor(spawner, descriptor, Arc::clone(service))
        .unwrap_or_else(|e| panic!("failed to spawn {}: {}", service.name(), e))
}

/// Polls `condition` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
}

/// Fixed-size text payload of the echo commands
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Text {
    pub str: String,
}

impl Text {
    pub fn new(text: &str) -> Self {
        Self {
            str: text.to_string(),
        }
    }
}

/// Echoes the request text
pub struct Echo;

impl Command for Echo {
    const NAME: &'static str = "echo";
    type Request = Text;
    type Response = Text;
}

/// Always fails
pub struct Fail;

impl Command for Fail {
    const NAME: &'static str = "fail";
    type Request = ();
    type Response = ();
}

/// Echoes the request text after the gate is opened
pub struct GatedEcho;

impl Command for GatedEcho {
    const NAME: &'static str = "gated_echo";
    type Request = Text;
    type Response = Text;
}

/// The `echo` service and its command references
pub struct EchoService {
    pub service: Arc<Service>,
    pub echo: CommandRef<Echo>,
    pub fail: CommandRef<Fail>,
    pub gated: CommandRef<GatedEcho>,
    /// Each give lets one `gated_echo` handler finish
    pub gate: Arc<Semaphore>,
}

/// Builds the `echo` service with the given arena budget
pub fn echo_service(arena_size: usize) -> EchoService {
    let gate = Arc::new(Semaphore::new(0, u32::MAX));
    let mut builder = Service::builder("echo").with_arena_size(arena_size);

    let echo = builder.command::<Echo, _>(|req, resp| {
        resp.str = req.str.clone();
        Ok(Reply::Ready)
    });
    let fail = builder.command::<Fail, _>(|_, _| Err(ZervError::Error));
    let handler_gate = Arc::clone(&gate);
    let gated = builder.command::<GatedEcho, _>(move |req, resp| {
        handler_gate.take(Timeout::Forever)?;
        resp.str = req.str.clone();
        Ok(Reply::Ready)
    });

    EchoService {
        service: builder.build(),
        echo,
        fail,
        gated,
        gate,
    }
}

/// Default wait used by tests for things that should happen promptly
pub const PROMPTLY: Duration = Duration::from_secs(5);

/// Spawns a thread with the host spawner, panicking on failure
pub fn spawn_thread(
    spawner: &HostThreads,
    name: &str,
    body: impl FnOnce() + Send + 'static,
) -> ThreadHandle {
    spawner
        .spawn(ThreadDescriptor::new(name), Box::new(body))
        .unwrap_or_else(|e| panic!("failed to spawn {}: {}", name, e))
}
