use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use thiserror::Error;

/// Type alias for the PostgreSQL connection pool
pub type DbPool = PgPool;

/// Errors raised by the user and tutorial stores
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique column already holds this value
    #[error("duplicate value for {0}")]
    Duplicate(&'static str),

    /// A row carried a value outside one of the closed enum sets
    #[error("stored {column} is not recognized: {value}")]
    Unrecognized { column: &'static str, value: String },

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

/// Unique constraints declared in `migrations/`, by the field they protect
const UNIQUE_CONSTRAINTS: &[(&str, &str)] = &[
    ("users_email_lower_idx", "email"),
    ("users_pkey", "id"),
    ("tutorials_pkey", "id"),
];

/// Field named by a violated unique constraint, "value" when it is not one of ours
fn duplicate_field(constraint: Option<&str>) -> &'static str {
    constraint
        .and_then(|name| {
            UNIQUE_CONSTRAINTS
                .iter()
                .find(|(constraint, _)| *constraint == name)
                .map(|(_, field)| *field)
        })
        .unwrap_or("value")
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &error {
            if db_err.is_unique_violation() {
                return StoreError::Duplicate(duplicate_field(db_err.constraint()));
            }
        }
        StoreError::Database(error)
    }
}

impl StoreError {
    pub fn unrecognized(column: &'static str, value: &str) -> Self {
        StoreError::Unrecognized {
            column,
            value: value.to_string(),
        }
    }
}

/// Creates and configures a PostgreSQL connection pool
///
/// # Arguments
/// * `database_url` - PostgreSQL connection string
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    tracing::debug!("Creating database connection pool");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(3))
        .connect(database_url)
        .await?;

    tracing::info!("Database connection pool created successfully");
    Ok(pool)
}

/// Run the embedded migrations under `migrations/`
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Migrations completed successfully");
    Ok(())
}
