//! Onboarding engine: Identity linking, gated step progression, role
//! resolution and admin/employee reconciliation over any
//! [`DocumentStore`](onboard_core::DocumentStore).

pub mod admin;
pub mod config;
pub mod error;
pub mod identity;
pub mod linking;
pub mod password;
pub mod profiles;
pub mod reconcile;
pub mod retry;
pub mod role;
pub mod route;
pub mod session;
pub mod steps;

pub use admin::{AdminService, EmployeeView};
pub use config::{EngineConfig, RetryPolicy};
pub use error::IdentityError;
pub use identity::LocalIdentityProvider;
pub use linking::IdentityLinkingService;
pub use reconcile::{ReconcileHandle, SyncReconciler, merge};
pub use role::{Resolution, RoleResolver};
pub use route::{Route, RouteAccess};
pub use session::{AdminSession, EmployeeSession, OnboardingSession, SignedIn};
pub use steps::{OnboardingStateMachine, StepInput};
