//! Plan services for trainers and their clients.
//!
//! Builds on [`trainer_plans_client`]: a [`SessionContext`] says who is
//! acting, [`PlanService`] loads, edits, generates and deletes plans, and
//! [`TrackedPlan`] keeps the visible plan consistent with what the data service
//! confirmed.

pub mod error;
pub mod services;
pub mod session;
pub mod state;

pub use error::{AppError, AppResult};
pub use services::{LoadedDiet, LoadedWorkout, Onboarding, PlanService};
pub use session::{Role, SessionContext};
pub use state::{MutationState, TrackedPlan};
