// Authorization gates
//
// Gates never look at credentials themselves. They read the identity the
// authenticate stage attached, and a missing identity is a 401 rather than a 403.

use async_trait::async_trait;
use tracing::warn;

use crate::auth::error::AUTHENTICATION_REQUIRED;
use crate::auth::models::{Identity, Role, RoleSet};
use crate::error::ApiError;
use crate::pipeline::{Flow, RequestContext, Stage, StageKind};

pub const INSUFFICIENT_PERMISSIONS: &str = "Insufficient permissions";
pub const NOT_RESOURCE_OWNER: &str = "Access denied: not the resource owner";

/// Allow the caller only if their role is in `allowed`
pub fn ensure_role(identity: Option<&Identity>, allowed: RoleSet) -> Result<&Identity, ApiError> {
    let identity = identity.ok_or_else(|| ApiError::unauthenticated(AUTHENTICATION_REQUIRED))?;
    if allowed.contains(identity.role) {
        Ok(identity)
    } else {
        warn!(
            user_id = %identity.id,
            role = %identity.role,
            required = %allowed,
            "role check failed"
        );
        Err(ApiError::forbidden(INSUFFICIENT_PERMISSIONS))
    }
}

/// Allow admins unconditionally, everyone else only when they own the resource.
/// An absent owner id never matches a non-admin.
pub fn ensure_owner_or_admin<'a>(
    identity: Option<&'a Identity>,
    owner_id: Option<&str>,
) -> Result<&'a Identity, ApiError> {
    let identity = identity.ok_or_else(|| ApiError::unauthenticated(AUTHENTICATION_REQUIRED))?;
    if identity.role == Role::Admin || owner_id == Some(identity.id.as_str()) {
        Ok(identity)
    } else {
        warn!(user_id = %identity.id, owner_id = ?owner_id, "ownership check failed");
        Err(ApiError::forbidden(NOT_RESOURCE_OWNER))
    }
}

/// Role gate stage
#[derive(Debug, Clone, Copy)]
pub struct RequireRole {
    allowed: RoleSet,
}

impl RequireRole {
    pub fn new(allowed: RoleSet) -> Self {
        Self { allowed }
    }

    pub fn admin_only() -> Self {
        Self::new(RoleSet::ADMIN_ONLY)
    }

    pub fn creator_or_admin() -> Self {
        Self::new(RoleSet::CREATOR_OR_ADMIN)
    }

    pub fn partner_or_admin() -> Self {
        Self::new(RoleSet::PARTNER_OR_ADMIN)
    }

    pub fn staff() -> Self {
        Self::new(RoleSet::STAFF)
    }

    pub fn any_member() -> Self {
        Self::new(RoleSet::ANY_MEMBER)
    }
}

#[async_trait]
impl Stage for RequireRole {
    fn name(&self) -> &'static str {
        "require_role"
    }

    fn kind(&self) -> StageKind {
        StageKind::Gate
    }

    async fn run(&self, ctx: &mut RequestContext) -> Flow {
        match ensure_role(ctx.identity(), self.allowed) {
            Ok(_) => Flow::Continue,
            Err(error) => Flow::Halt(error),
        }
    }
}

type OwnerResolver = dyn Fn(&RequestContext) -> Option<String> + Send + Sync;

/// Ownership gate stage. The owner id comes from the request itself,
/// typically a path parameter naming the user being acted on.
pub struct RequireOwnerOrAdmin {
    owner: Box<OwnerResolver>,
}

impl RequireOwnerOrAdmin {
    pub fn new<F>(owner: F) -> Self
    where
        F: Fn(&RequestContext) -> Option<String> + Send + Sync + 'static,
    {
        Self { owner: Box::new(owner) }
    }

    /// Owner id is the named path parameter
    pub fn param(name: &'static str) -> Self {
        Self::new(move |ctx| ctx.param(name).map(str::to_string))
    }
}

#[async_trait]
impl Stage for RequireOwnerOrAdmin {
    fn name(&self) -> &'static str {
        "require_owner_or_admin"
    }

    fn kind(&self) -> StageKind {
        StageKind::Gate
    }

    async fn run(&self, ctx: &mut RequestContext) -> Flow {
        let owner_id = (self.owner)(ctx);
        match ensure_owner_or_admin(ctx.identity(), owner_id.as_deref()) {
            Ok(_) => Flow::Continue,
            Err(error) => Flow::Halt(error),
        }
    }
}
