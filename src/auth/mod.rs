// Authentication and authorization
// JWT issuance and verification, account management, and the guard stages built on them

pub mod authorize;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod password;
pub mod repository;
pub mod service;
pub mod token;

// Re-export commonly used types
pub use authorize::{RequireOwnerOrAdmin, RequireRole};
pub use error::AuthError;
pub use middleware::{AuthMode, Authenticate, AuthenticatedUser, MaybeUser};
pub use models::{Identity, Role, RoleSet, User, UserResponse};
pub use repository::{MemoryUserStore, PgUserStore, UserStore};
pub use service::AuthService;
pub use token::TokenService;
