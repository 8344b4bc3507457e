// User storage: the identity store consulted by the guard chain plus account persistence

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::models::{Identity, NewUser, Role, User};
use crate::db::StoreError;

/// Persistence for user accounts
///
/// Implementations provide their own concurrency safety; callers share them
/// behind an `Arc<dyn UserStore>`.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Case-insensitive email lookup
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Replace the provided profile fields, keeping the others
    async fn update_profile(
        &self,
        id: Uuid,
        display_name: Option<String>,
        bio: Option<String>,
    ) -> Result<Option<User>, StoreError>;

    async fn set_active(&self, id: Uuid, active: bool) -> Result<Option<User>, StoreError>;

    async fn set_role(&self, id: Uuid, role: Role) -> Result<Option<User>, StoreError>;

    /// Resolve a token subject to its identity. Subjects that are not valid ids
    /// simply do not exist.
    async fn find_identity(&self, id: &str) -> Result<Option<Identity>, StoreError> {
        let Ok(id) = Uuid::parse_str(id) else {
            return Ok(None);
        };
        Ok(self.find_by_id(id).await?.map(|user| user.identity()))
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    display_name: String,
    bio: Option<String>,
    password_hash: String,
    role: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse::<Role>()
            .map_err(|_| StoreError::unrecognized("role", &row.role))?;

        Ok(User {
            id: row.id,
            email: row.email,
            display_name: row.display_name,
            bio: row.bio,
            password_hash: row.password_hash,
            role,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const USER_COLUMNS: &str =
    "id, email, display_name, bio, password_hash, role, is_active, created_at, updated_at";

/// PostgreSQL-backed user store
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn into_user(row: Option<UserRow>) -> Result<Option<User>, StoreError> {
    row.map(User::try_from).transpose()
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let sql = format!(
            "INSERT INTO users (id, email, display_name, password_hash, role) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            USER_COLUMNS
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new_user.email)
            .bind(&new_user.display_name)
            .bind(&new_user.password_hash)
            .bind(new_user.role.as_str())
            .fetch_one(&self.pool)
            .await?;

        User::try_from(row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        into_user(row)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE LOWER(email) = LOWER($1)", USER_COLUMNS);
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        into_user(row)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        display_name: Option<String>,
        bio: Option<String>,
    ) -> Result<Option<User>, StoreError> {
        let sql = format!(
            "UPDATE users SET display_name = COALESCE($2, display_name), \
             bio = COALESCE($3, bio), updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(display_name)
            .bind(bio)
            .fetch_optional(&self.pool)
            .await?;
        into_user(row)
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<Option<User>, StoreError> {
        let sql = format!(
            "UPDATE users SET is_active = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(active)
            .fetch_optional(&self.pool)
            .await?;
        into_user(row)
    }

    async fn set_role(&self, id: Uuid, role: Role) -> Result<Option<User>, StoreError> {
        let sql = format!(
            "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(role.as_str())
            .fetch_optional(&self.pool)
            .await?;
        into_user(row)
    }

    async fn find_identity(&self, id: &str) -> Result<Option<Identity>, StoreError> {
        let Ok(id) = Uuid::parse_str(id) else {
            return Ok(None);
        };

        let row: Option<(Uuid, String, bool)> =
            sqlx::query_as("SELECT id, role, is_active FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(id, role, is_active)| {
            let role = role.parse::<Role>().map_err(|_| StoreError::unrecognized("role", &role))?;
            Ok(Identity {
                id: id.to_string(),
                role,
                is_active,
            })
        })
        .transpose()
    }
}

/// In-memory user store for tests and database-less development
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn modify<F>(&self, id: Uuid, change: F) -> Result<Option<User>, StoreError>
    where
        F: FnOnce(&mut User) + Send,
    {
        let mut users = self.users.write().await;
        Ok(users.get_mut(&id).map(|user| {
            change(user);
            user.updated_at = Utc::now();
            user.clone()
        }))
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users
            .values()
            .any(|user| user.email.eq_ignore_ascii_case(&new_user.email))
        {
            return Err(StoreError::Duplicate("email"));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email,
            display_name: new_user.display_name,
            bio: None,
            password_hash: new_user.password_hash,
            role: new_user.role,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        display_name: Option<String>,
        bio: Option<String>,
    ) -> Result<Option<User>, StoreError> {
        self.modify(id, |user| {
            if let Some(display_name) = display_name {
                user.display_name = display_name;
            }
            if bio.is_some() {
                user.bio = bio;
            }
        })
        .await
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<Option<User>, StoreError> {
        self.modify(id, |user| user.is_active = active).await
    }

    async fn set_role(&self, id: Uuid, role: Role) -> Result<Option<User>, StoreError> {
        self.modify(id, |user| user.role = role).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            display_name: "Ada".to_string(),
            password_hash: "hash".to_string(),
            role: Role::Regular,
        }
    }

    #[tokio::test]
    async fn memory_store_rejects_duplicate_email_case_insensitively() {
        let store = MemoryUserStore::new();
        store.create(new_user("maker@example.com")).await.unwrap();

        let err = store.create(new_user("Maker@Example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate("email")));
    }

    #[tokio::test]
    async fn identity_reflects_deactivation_and_role_changes() {
        let store = MemoryUserStore::new();
        let user = store.create(new_user("maker@example.com")).await.unwrap();
        let id = user.id.to_string();

        let identity = store.find_identity(&id).await.unwrap().unwrap();
        assert!(identity.is_active);
        assert_eq!(identity.role, Role::Regular);

        store.set_active(user.id, false).await.unwrap();
        store.set_role(user.id, Role::Partner).await.unwrap();

        let identity = store.find_identity(&id).await.unwrap().unwrap();
        assert!(!identity.is_active);
        assert_eq!(identity.role, Role::Partner);
    }

    #[tokio::test]
    async fn non_uuid_subject_resolves_to_nothing() {
        let store = MemoryUserStore::new();
        assert!(store.find_identity("not-a-uuid").await.unwrap().is_none());
        assert!(store
            .find_identity(&Uuid::new_v4().to_string())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn profile_update_keeps_omitted_fields() {
        let store = MemoryUserStore::new();
        let user = store.create(new_user("maker@example.com")).await.unwrap();

        let updated = store
            .update_profile(user.id, None, Some("I build birdhouses".to_string()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.display_name, "Ada");
        assert_eq!(updated.bio.as_deref(), Some("I build birdhouses"));

        let missing = store.update_profile(Uuid::new_v4(), None, None).await.unwrap();
        assert!(missing.is_none());
    }
}
