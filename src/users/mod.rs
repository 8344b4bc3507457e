// User profile and admin account management

pub mod handlers;
pub mod models;

pub use models::{ChangeRoleRequest, UpdateProfileRequest};
