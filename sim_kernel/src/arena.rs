//! Fixed-capacity accounting arena
//!
//! Every service and subscriber owns one arena. Blocks are charged their
//! footprint (payload rounded up to the chunk unit plus a chunk header)
//! against a fixed byte budget, so a full arena fails allocation exactly
//! the way a real heap of that size would.
//!
//! Blocks are addressed by [`ArenaHandle`]s: a slot index plus a
//! generation counter. A handle to a block that was already freed is
//! rejected instead of aliasing whatever reused the slot.

use log::trace;
use parking_lot::Mutex;
use std::fmt;
use thiserror::Error;

/// Bytes of bookkeeping charged to every block
pub const CHUNK_HEADER: usize = 8;
/// Allocation granularity
pub const CHUNK_UNIT: usize = 8;

/// Errors returned by arena operations
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ArenaError {
    /// Not enough free bytes for the request
    #[error("arena exhausted: {requested} bytes requested, {available} available")]
    Exhausted { requested: usize, available: usize },

    /// Handle does not name a live block
    #[error("stale or foreign arena handle")]
    InvalidHandle,
}

/// Handle to a live arena block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArenaHandle {
    index: u32,
    generation: u32,
}

impl fmt::Display for ArenaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Block({}.{})", self.index, self.generation)
    }
}

struct Slot<T> {
    generation: u32,
    block: Option<(usize, T)>,
}

struct ArenaInner<T> {
    used: usize,
    slots: Vec<Slot<T>>,
    vacant: Vec<u32>,
}

/// Bounded pool of blocks of `T`
pub struct Arena<T> {
    name: String,
    capacity: usize,
    inner: Mutex<ArenaInner<T>>,
}

impl<T> Arena<T> {
    /// Creates an arena with a budget of `capacity` bytes
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity,
            inner: Mutex::new(ArenaInner {
                used: 0,
                slots: Vec::new(),
                vacant: Vec::new(),
            }),
        }
    }

    /// Bytes charged for a block carrying `size` bytes
    pub const fn footprint(size: usize) -> usize {
        CHUNK_HEADER + (size + CHUNK_UNIT - 1) / CHUNK_UNIT * CHUNK_UNIT
    }

    /// Name given at creation
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total byte budget
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes currently charged
    pub fn used(&self) -> usize {
        self.inner.lock().used
    }

    /// Bytes still available
    pub fn available(&self) -> usize {
        self.capacity.saturating_sub(self.used())
    }

    /// Number of live blocks
    pub fn live_blocks(&self) -> usize {
        let inner = self.inner.lock();
        inner.slots.len() - inner.vacant.len()
    }

    /// Stores `value` as a block of `size` bytes without blocking.
    ///
    /// # Errors
    ///
    /// * `Exhausted` - the budget cannot cover the block's footprint
    pub fn alloc(&self, size: usize, value: T) -> Result<ArenaHandle, ArenaError> {
        let footprint = Self::footprint(size);
        let mut inner = self.inner.lock();
        let available = self.capacity.saturating_sub(inner.used);
        if footprint > available {
            return Err(ArenaError::Exhausted {
                requested: footprint,
                available,
            });
        }
        inner.used += footprint;

        let handle = match inner.vacant.pop() {
            Some(index) => {
                let slot = &mut inner.slots[index as usize];
                slot.block = Some((footprint, value));
                ArenaHandle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = inner.slots.len() as u32;
                inner.slots.push(Slot {
                    generation: 0,
                    block: Some((footprint, value)),
                });
                ArenaHandle {
                    index,
                    generation: 0,
                }
            }
        };
        trace!(
            target: "sim_kernel",
            "{}: alloc {} -> {} of {} bytes used",
            self.name,
            handle,
            inner.used,
            self.capacity
        );
        Ok(handle)
    }

    /// Releases a block, returning its value.
    ///
    /// # Errors
    ///
    /// * `InvalidHandle` - the block was already freed
    pub fn free(&self, handle: ArenaHandle) -> Result<T, ArenaError> {
        let mut inner = self.inner.lock();
        let slot = inner
            .slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .ok_or(ArenaError::InvalidHandle)?;
        let (footprint, value) = slot.block.take().ok_or(ArenaError::InvalidHandle)?;
        slot.generation = slot.generation.wrapping_add(1);
        inner.used -= footprint;
        inner.vacant.push(handle.index);
        trace!(
            target: "sim_kernel",
            "{}: free {} -> {} of {} bytes used",
            self.name,
            handle,
            inner.used,
            self.capacity
        );
        Ok(value)
    }

    /// Runs `f` on a live block
    pub fn with<R>(&self, handle: ArenaHandle, f: impl FnOnce(&T) -> R) -> Result<R, ArenaError> {
        let inner = self.inner.lock();
        inner
            .slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.block.as_ref())
            .map(|(_, value)| f(value))
            .ok_or(ArenaError::InvalidHandle)
    }

    /// Runs `f` on a live block with mutable access
    pub fn with_mut<R>(
        &self,
        handle: ArenaHandle,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, ArenaError> {
        let mut inner = self.inner.lock();
        inner
            .slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.block.as_mut())
            .map(|(_, value)| f(value))
            .ok_or(ArenaError::InvalidHandle)
    }

    /// Returns true if `handle` names a live block
    pub fn contains(&self, handle: ArenaHandle) -> bool {
        self.with(handle, |_| ()).is_ok()
    }
}

impl<T> fmt::Debug for Arena<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("used", &self.used())
            .finish()
    }
}
