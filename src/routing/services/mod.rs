//! Application services for routing.

mod router;

pub use router::Router;
