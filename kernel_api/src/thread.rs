//! Thread creation contract

use crate::KernelError;
use serde::{Deserialize, Serialize};

/// Default stack size for service threads
pub const DEFAULT_STACK_SIZE: usize = 64 * 1024;

/// Body of a spawned thread
pub type ThreadEntry = Box<dyn FnOnce() + Send + 'static>;

/// Descriptor for creating a new thread
///
/// Creation is explicit. The caller must specify:
/// - A name (used in logs and by the host)
/// - The stack size, fixed for the thread's lifetime
/// - The priority the host should run it at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadDescriptor {
    /// Human-readable name for debugging
    pub name: String,
    /// Stack size in bytes
    pub stack_size: usize,
    /// Host priority, lower is more urgent
    pub priority: i32,
}

impl ThreadDescriptor {
    /// Creates a new thread descriptor with default stack and priority
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stack_size: DEFAULT_STACK_SIZE,
            priority: 0,
        }
    }

    /// Sets the stack size
    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }

    /// Sets the priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// Handle to a spawned thread
#[derive(Debug)]
pub struct ThreadHandle {
    /// Name the thread was spawned with
    pub name: String,
    join: Option<std::thread::JoinHandle<()>>,
}

impl ThreadHandle {
    /// Wraps a host join handle
    pub fn new(name: String, join: std::thread::JoinHandle<()>) -> Self {
        Self {
            name,
            join: Some(join),
        }
    }

    /// Returns true once the thread body has returned
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, |join| join.is_finished())
    }

    /// Waits for the thread body to return
    pub fn join(mut self) -> Result<(), KernelError> {
        match self.join.take() {
            Some(join) => join
                .join()
                .map_err(|_| KernelError::ThreadPanicked(self.name.clone())),
            None => Ok(()),
        }
    }
}

/// Creates threads that run a service loop
///
/// Services never create threads themselves; whoever owns the process
/// image hands them a spawner.
///
/// # Example
///
/// ```
/// use kernel_api::{KernelError, ThreadDescriptor, ThreadHandle, ThreadSpawner};
///
/// fn start<S: ThreadSpawner>(spawner: &S) -> Result<ThreadHandle, KernelError> {
///     let descriptor = ThreadDescriptor::new("worker").with_priority(10);
///     spawner.spawn(descriptor, Box::new(|| {}))
/// }
/// ```
pub trait ThreadSpawner {
    /// Spawns a thread running `entry`
    ///
    /// # Arguments
    ///
    /// * `descriptor` - Name, stack size and priority of the new thread
    /// * `entry` - The thread body
    fn spawn(
        &self,
        descriptor: ThreadDescriptor,
        entry: ThreadEntry,
    ) -> Result<ThreadHandle, KernelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_defaults() {
        let descriptor = ThreadDescriptor::new("echo");
        assert_eq!(descriptor.name, "echo");
        assert_eq!(descriptor.stack_size, DEFAULT_STACK_SIZE);
        assert_eq!(descriptor.priority, 0);
    }

    #[test]
    fn test_descriptor_builder() {
        let descriptor = ThreadDescriptor::new("echo")
            .with_stack_size(1024)
            .with_priority(10);
        assert_eq!(descriptor.stack_size, 1024);
        assert_eq!(descriptor.priority, 10);
    }

    #[test]
    fn test_handle_join() {
        let join = std::thread::spawn(|| {});
        let handle = ThreadHandle::new("t".to_string(), join);
        assert!(handle.join().is_ok());
    }
}
