//! Domain model for agent dispatch.

mod envelope;
mod error;
mod policy;

pub use envelope::{RequestEnvelope, RequestId, ResponseBody, ResponseEnvelope, ResponseStatus};
pub use error::DispatchError;
pub use policy::{HealthPolicy, RetryPolicy};
