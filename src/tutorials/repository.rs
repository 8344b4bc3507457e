// Tutorial storage

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::StoreError;
use crate::tutorials::models::{
    Category, Difficulty, NewTutorial, Tutorial, TutorialChanges, TutorialFilter, Visibility,
};

#[async_trait]
pub trait TutorialStore: Send + Sync {
    async fn create(&self, new_tutorial: NewTutorial) -> Result<Tutorial, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Tutorial>, StoreError>;

    /// Newest first, plus the total number of matches ignoring pagination
    async fn list(&self, filter: &TutorialFilter) -> Result<(Vec<Tutorial>, u64), StoreError>;

    async fn update(&self, id: Uuid, changes: TutorialChanges) -> Result<Option<Tutorial>, StoreError>;

    /// Returns false if there was nothing to delete
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
}

#[derive(Debug, FromRow)]
struct TutorialRow {
    id: Uuid,
    author_id: Uuid,
    title: String,
    description: String,
    category: String,
    difficulty: String,
    tags: Vec<String>,
    published: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TutorialRow> for Tutorial {
    type Error = StoreError;

    fn try_from(row: TutorialRow) -> Result<Self, Self::Error> {
        Ok(Tutorial {
            category: row
                .category
                .parse::<Category>()
                .map_err(|_| StoreError::unrecognized("category", &row.category))?,
            difficulty: row
                .difficulty
                .parse::<Difficulty>()
                .map_err(|_| StoreError::unrecognized("difficulty", &row.difficulty))?,
            id: row.id,
            author_id: row.author_id,
            title: row.title,
            description: row.description,
            tags: row.tags,
            published: row.published,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const TUTORIAL_COLUMNS: &str =
    "id, author_id, title, description, category, difficulty, tags, published, created_at, updated_at";

/// Shared WHERE clause of the listing and count queries.
/// $1 category, $2 difficulty, $3 see-everything flag, $4 viewer id.
const LIST_FILTER: &str = "($1::TEXT IS NULL OR category = $1) \
     AND ($2::TEXT IS NULL OR difficulty = $2) \
     AND (published OR $3 OR author_id = $4)";

/// PostgreSQL-backed tutorial store
pub struct PgTutorialStore {
    pool: PgPool,
}

impl PgTutorialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn visibility_binds(visibility: Visibility) -> (bool, Option<Uuid>) {
    match visibility {
        Visibility::All => (true, None),
        Visibility::PublishedOnly => (false, None),
        Visibility::PublishedOrAuthor(viewer) => (false, Some(viewer)),
    }
}

#[async_trait]
impl TutorialStore for PgTutorialStore {
    async fn create(&self, new_tutorial: NewTutorial) -> Result<Tutorial, StoreError> {
        let sql = format!(
            "INSERT INTO tutorials (id, author_id, title, description, category, difficulty, tags, published) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            TUTORIAL_COLUMNS
        );
        let row = sqlx::query_as::<_, TutorialRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(new_tutorial.author_id)
            .bind(&new_tutorial.title)
            .bind(&new_tutorial.description)
            .bind(new_tutorial.category.as_str())
            .bind(new_tutorial.difficulty.as_str())
            .bind(&new_tutorial.tags)
            .bind(new_tutorial.published)
            .fetch_one(&self.pool)
            .await?;

        Tutorial::try_from(row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Tutorial>, StoreError> {
        let sql = format!("SELECT {} FROM tutorials WHERE id = $1", TUTORIAL_COLUMNS);
        let row = sqlx::query_as::<_, TutorialRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Tutorial::try_from).transpose()
    }

    async fn list(&self, filter: &TutorialFilter) -> Result<(Vec<Tutorial>, u64), StoreError> {
        let category = filter.category.map(|c| c.as_str());
        let difficulty = filter.difficulty.map(|d| d.as_str());
        let (see_all, viewer) = visibility_binds(filter.visibility);

        let sql = format!(
            "SELECT {} FROM tutorials WHERE {} ORDER BY created_at DESC, id LIMIT $5 OFFSET $6",
            TUTORIAL_COLUMNS, LIST_FILTER
        );
        let rows = sqlx::query_as::<_, TutorialRow>(&sql)
            .bind(category)
            .bind(difficulty)
            .bind(see_all)
            .bind(viewer)
            .bind(i64::from(filter.limit))
            .bind(i64::from(filter.offset))
            .fetch_all(&self.pool)
            .await?;

        let count_sql = format!("SELECT COUNT(*) FROM tutorials WHERE {}", LIST_FILTER);
        let (total,): (i64,) = sqlx::query_as(&count_sql)
            .bind(category)
            .bind(difficulty)
            .bind(see_all)
            .bind(viewer)
            .fetch_one(&self.pool)
            .await?;

        let items = rows
            .into_iter()
            .map(Tutorial::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((items, total.max(0) as u64))
    }

    async fn update(&self, id: Uuid, changes: TutorialChanges) -> Result<Option<Tutorial>, StoreError> {
        let sql = format!(
            "UPDATE tutorials SET \
             title = COALESCE($2, title), \
             description = COALESCE($3, description), \
             category = COALESCE($4, category), \
             difficulty = COALESCE($5, difficulty), \
             tags = COALESCE($6, tags), \
             published = COALESCE($7, published), \
             updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            TUTORIAL_COLUMNS
        );
        let row = sqlx::query_as::<_, TutorialRow>(&sql)
            .bind(id)
            .bind(changes.title)
            .bind(changes.description)
            .bind(changes.category.map(|c| c.as_str()))
            .bind(changes.difficulty.map(|d| d.as_str()))
            .bind(changes.tags)
            .bind(changes.published)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Tutorial::try_from).transpose()
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM tutorials WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// In-memory tutorial store for tests and database-less development
#[derive(Default)]
pub struct MemoryTutorialStore {
    tutorials: RwLock<HashMap<Uuid, Tutorial>>,
}

impl MemoryTutorialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TutorialStore for MemoryTutorialStore {
    async fn create(&self, new_tutorial: NewTutorial) -> Result<Tutorial, StoreError> {
        let now = Utc::now();
        let tutorial = Tutorial {
            id: Uuid::new_v4(),
            author_id: new_tutorial.author_id,
            title: new_tutorial.title,
            description: new_tutorial.description,
            category: new_tutorial.category,
            difficulty: new_tutorial.difficulty,
            tags: new_tutorial.tags,
            published: new_tutorial.published,
            created_at: now,
            updated_at: now,
        };
        self.tutorials.write().await.insert(tutorial.id, tutorial.clone());
        Ok(tutorial)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Tutorial>, StoreError> {
        Ok(self.tutorials.read().await.get(&id).cloned())
    }

    async fn list(&self, filter: &TutorialFilter) -> Result<(Vec<Tutorial>, u64), StoreError> {
        let tutorials = self.tutorials.read().await;
        let mut matches: Vec<&Tutorial> = tutorials
            .values()
            .filter(|t| filter.category.map_or(true, |c| t.category == c))
            .filter(|t| filter.difficulty.map_or(true, |d| t.difficulty == d))
            .filter(|t| filter.visibility.allows(t))
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        let total = matches.len() as u64;
        let page = matches
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn update(&self, id: Uuid, changes: TutorialChanges) -> Result<Option<Tutorial>, StoreError> {
        let mut tutorials = self.tutorials.write().await;
        Ok(tutorials.get_mut(&id).map(|tutorial| {
            changes.apply(tutorial);
            tutorial.updated_at = Utc::now();
            tutorial.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.tutorials.write().await.remove(&id).is_some())
    }
}
