pub mod coordinator;
pub mod definition;
pub mod tracker;

pub use coordinator::PlanCoordinator;
pub use definition::{InMemoryPlanDefinitionRegistry, PlanConfiguration, PlanDefinition, PlanDefinitionRegistry};
pub use tracker::{PlanTracker, TrackerError};
