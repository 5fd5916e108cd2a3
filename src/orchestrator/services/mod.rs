//! Application services for turn orchestration.

mod housekeeper;
mod orchestrator;
mod scheduler;

pub use housekeeper::{Housekeeper, HousekeepingPolicy, HousekeepingReport};
pub use orchestrator::Orchestrator;
pub use scheduler::TurnBudget;
