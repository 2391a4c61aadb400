//! Host thread spawner

use kernel_api::{KernelError, ThreadDescriptor, ThreadEntry, ThreadHandle, ThreadSpawner};
use log::debug;

/// Smallest stack handed to the host, whatever the descriptor asks for
pub const MIN_HOST_STACK: usize = 64 * 1024;

/// Spawns service threads as std threads
///
/// Priorities are recorded in the log but not applied; the host scheduler
/// runs every thread at the same priority.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostThreads;

impl HostThreads {
    /// Creates a spawner
    pub fn new() -> Self {
        Self
    }
}

impl ThreadSpawner for HostThreads {
    fn spawn(
        &self,
        descriptor: ThreadDescriptor,
        entry: ThreadEntry,
    ) -> Result<ThreadHandle, KernelError> {
        if descriptor.name.is_empty() {
            return Err(KernelError::InvalidDescriptor(
                "thread name must not be empty".to_string(),
            ));
        }
        if descriptor.stack_size == 0 {
            return Err(KernelError::InvalidDescriptor(format!(
                "{}: zero stack size",
                descriptor.name
            )));
        }

        debug!(
            target: "sim_kernel",
            "spawning thread {} (stack {} bytes, priority {})",
            descriptor.name,
            descriptor.stack_size,
            descriptor.priority
        );
        let join = std::thread::Builder::new()
            .name(descriptor.name.clone())
            .stack_size(descriptor.stack_size.max(MIN_HOST_STACK))
            .spawn(entry)
            .map_err(|e| KernelError::SpawnFailed(format!("{}: {}", descriptor.name, e)))?;
        Ok(ThreadHandle::new(descriptor.name, join))
    }
}
