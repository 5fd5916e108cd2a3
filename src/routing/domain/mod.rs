//! Domain model for intents, plans and routing rules.

mod binding;
mod error;
mod intent;
mod plan;
mod rules;

pub use binding::{BindingContext, BindingError, BindingSource, FieldBinding, InputBinder};
pub use error::{PlanError, RoutingError};
pub use intent::Intent;
pub use plan::{Plan, PlanStep, StepId};
pub use rules::{DecompositionRule, RoutingRules, StepTemplate, SynonymTable};
