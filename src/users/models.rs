// Request DTOs for profile and account management

use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::models::Role;

pub const DISPLAY_NAME_MAX: usize = 50;
pub const BIO_MAX: usize = 500;

/// Profile update; absent fields are left unchanged
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    #[schema(example = "Ada Maker")]
    pub display_name: Option<String>,
    #[schema(example = "Furniture restorer and weekend electronics tinkerer")]
    pub bio: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangeRoleRequest {
    pub role: Role,
}
