//! Plain request processor thread body
//!
//! Services that need nothing but their own queue run this loop instead
//! of an [`EventLoop`](crate::EventLoop).

use crate::service::{PendingRequest, Service};
use core_types::Reply;
use kernel_api::{KernelError, ThreadDescriptor, ThreadHandle, ThreadSpawner, Timeout};
use log::{debug, warn};
use std::sync::Arc;

/// Pops and handles requests forever
pub fn run_request_processor(service: &Service) -> ! {
    debug!(target: "zerv", "{}: request processor started", service.name());
    loop {
        if let Some(request) = service.pending_request(Timeout::Forever) {
            process_one(service, request);
        }
    }
}

pub(crate) fn process_one(service: &Service, request: PendingRequest) {
    match service.handle_request(request) {
        Ok(Reply::Ready) => {}
        Ok(Reply::Future) => {
            debug!(target: "zerv", "{}: request deferred", service.name());
        }
        Err(err) => {
            warn!(target: "zerv", "{}: request failed: {}", service.name(), err);
        }
    }
}

/// Starts a thread running [`run_request_processor`] for `service`
pub fn spawn_request_processor<S: ThreadSpawner + ?Sized>(
    spawner: &S,
    descriptor: ThreadDescriptor,
    service: Arc<Service>,
) -> Result<ThreadHandle, KernelError> {
    spawner.spawn(descriptor, Box::new(move || {
        run_request_processor(&service);
    }))
}
