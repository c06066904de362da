pub mod auth_service;
pub mod elevation_service;

pub use auth_service::{AuthError, AuthService};
pub use elevation_service::{
    ElevationRequest, ElevationService, ElevationStatus, WorkflowError,
};
