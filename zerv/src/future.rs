//! Deferred completion of commands
//!
//! A handler that returns `Reply::Future` leaves its command slot locked
//! with the envelope parked in the slot's future record:
//!
//! ```text
//! Idle --call--> Pending --Reply::Future--> Active --signal_response--> Resolved
//!  ^                |                                                      |
//!  +---completed----+                 +----------get_future----------------+
//!  +----------------------------------+
//! ```
//!
//! Resolution may happen from any thread once the handler has returned.
//! Retrieval with a timeout never loses state: a timed-out `get_future`
//! can simply be retried.

use crate::command::{Command, CommandRef, CommandSlot};
use crate::service::Service;
use core_types::{Reply, ReturnCode, ZervError};
use ipc::{decode, Delivery, EnvelopeHandle, Payload};
use kernel_api::Timeout;
use log::{debug, error, warn};
use sim_kernel::sched;

impl Service {
    /// Returns true while the command has a deferred call outstanding
    pub fn future_is_active<C: Command>(&self, command: CommandRef<C>) -> bool {
        self.command_slot(command)
            .map(|slot| slot.future.lock().active)
            .unwrap_or(false)
    }

    /// Decodes the request of the deferred call.
    ///
    /// # Errors
    ///
    /// * `InvalidArgument` - the command belongs to another service
    /// * `Error` - no future is active
    pub fn future_params<C: Command>(&self, command: CommandRef<C>) -> Result<C::Request, ZervError> {
        let slot = self.command_slot(command)?;
        let record = slot.future.lock();
        let handle = record.envelope.as_ref().ok_or(ZervError::Error)?;
        let payload = handle.with(&self.arena, |envelope| envelope.payload.clone())?;
        Ok(payload.deserialize()?)
    }

    /// Edits the stored response of the deferred call in place.
    ///
    /// # Errors
    ///
    /// * `InvalidArgument` - the command belongs to another service
    /// * `Error` - no future is active, or the response cannot be encoded
    pub fn update_future_response<C, F>(&self, command: CommandRef<C>, f: F) -> Result<(), ZervError>
    where
        C: Command,
        F: FnOnce(&mut C::Response),
    {
        let slot = self.command_slot(command)?;
        let mut record = slot.future.lock();
        if !record.active {
            return Err(ZervError::Error);
        }
        let mut response: C::Response = decode(&record.response)?;
        f(&mut response);
        record.response = Payload::new(&response)?.into_bytes();
        Ok(())
    }

    /// Resolves the deferred call with `rc`.
    ///
    /// Does nothing if no future is active or it was already resolved.
    /// A callback registered with [`call_with_callback`](Self::call_with_callback)
    /// runs here, in the resolving context, after the result is published.
    ///
    /// # Errors
    ///
    /// * `InvalidArgument` - the command belongs to another service
    pub fn signal_response<C: Command>(
        &self,
        command: CommandRef<C>,
        rc: impl Into<ReturnCode>,
    ) -> Result<(), ZervError> {
        let slot = self.command_slot(command)?;
        let rc = rc.into();
        let mut record = slot.future.lock();
        if !record.active || record.resolved {
            debug!(target: "zerv", "{}: {} has no future to resolve", self.name(), slot.name);
            return Ok(());
        }

        if record.orphaned {
            let envelope = record.clear();
            drop(record);
            self.reap(slot, envelope);
            return Ok(());
        }

        record.rc = rc;
        record.resolved = true;
        let delivery = std::mem::take(&mut record.delivery);
        drop(record);

        slot.future_signal.give();
        debug!(target: "zerv", "{}: {} resolved with {}", self.name(), slot.name, rc);
        if let Delivery::Callback(on_complete) = delivery {
            on_complete(rc);
        }
        Ok(())
    }

    /// Collects the result of a deferred call.
    ///
    /// Waits up to `timeout` for [`signal_response`](Self::signal_response),
    /// then copies the stored response out, frees the envelope and unlocks
    /// the command.
    ///
    /// # Errors
    ///
    /// * `InvalidArgument` - the command belongs to another service
    /// * `Error` - no future is active
    /// * `Timeout` - not resolved yet; the future stays active
    /// * the code the future was resolved with
    pub fn get_future<C: Command>(
        &self,
        command: CommandRef<C>,
        response: &mut C::Response,
        timeout: Timeout,
    ) -> Result<Reply, ZervError> {
        let slot = self.command_slot(command)?;
        if !slot.future.lock().active {
            return Err(ZervError::Error);
        }
        slot.future_signal.take(timeout)?;

        let mut record = slot.future.lock();
        if !record.active {
            return Err(ZervError::Error);
        }
        let rc = record.rc;
        let decoded = decode::<C::Response>(&record.response);
        let envelope = record.clear();
        drop(record);

        self.release_envelope(slot, envelope);
        sched::release(&slot.locked);
        *response = decoded?;
        rc.into_result()
    }

    /// Cleans up a future whose caller gave up before it was deferred
    fn reap(&self, slot: &CommandSlot, envelope: Option<EnvelopeHandle>) {
        self.release_envelope(slot, envelope);
        sched::release(&slot.locked);
        warn!(target: "zerv", "{}: reaped abandoned future of {}", self.name(), slot.name);
    }

    fn release_envelope(&self, slot: &CommandSlot, envelope: Option<EnvelopeHandle>) {
        if let Some(handle) = envelope {
            if let Err(err) = handle.release(&self.arena) {
                error!(target: "zerv", "{}: failed to free {} future: {}", self.name(), slot.name, err);
            }
        }
    }
}
