pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::commands::AppState;
pub use domain::models::{DayKey, Goal, PlannerDocument, Priority, Settings, Task};
pub use infrastructure::error::InfraError;
