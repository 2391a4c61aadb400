//! Startup-time table of services
//!
//! Filled once while the application wires its services together, then
//! only read. Lookups hand out shared references to the frozen services.

use crate::service::Service;
use core_types::ServiceId;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Error types for registry operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("service {0} is already registered")]
    AlreadyRegistered(ServiceId),

    #[error("service name '{0}' is already registered")]
    NameAlreadyRegistered(String),

    #[error("service {0} not found")]
    NotFound(ServiceId),

    #[error("service name '{0}' not found")]
    NameNotFound(String),
}

/// Service registry keyed by id and by name
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: HashMap<ServiceId, Arc<Service>>,
    names: HashMap<String, ServiceId>,
}

impl ServiceRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a service under its id and name
    pub fn register(&mut self, service: Arc<Service>) -> Result<(), RegistryError> {
        let id = service.id();
        if self.services.contains_key(&id) {
            return Err(RegistryError::AlreadyRegistered(id));
        }
        if self.names.contains_key(service.name()) {
            return Err(RegistryError::NameAlreadyRegistered(service.name().to_string()));
        }
        self.names.insert(service.name().to_string(), id);
        self.services.insert(id, service);
        Ok(())
    }

    /// Looks up a service
    pub fn lookup(&self, id: ServiceId) -> Result<Arc<Service>, RegistryError> {
        self.services
            .get(&id)
            .cloned()
            .ok_or(RegistryError::NotFound(id))
    }

    /// Looks up a service by name
    pub fn lookup_by_name(&self, name: &str) -> Result<Arc<Service>, RegistryError> {
        let id = self
            .names
            .get(name)
            .copied()
            .ok_or_else(|| RegistryError::NameNotFound(name.to_string()))?;
        self.lookup(id)
    }

    /// Removes a service, returning it
    pub fn unregister(&mut self, id: ServiceId) -> Result<Arc<Service>, RegistryError> {
        let service = self
            .services
            .remove(&id)
            .ok_or(RegistryError::NotFound(id))?;
        self.names.remove(service.name());
        Ok(service)
    }

    /// Returns the number of registered services
    pub fn count(&self) -> usize {
        self.services.len()
    }
}
