//! Application services for the capability registry.

mod registry;

pub use registry::{CapabilityRegistry, RegistryError, RegistryResult};
