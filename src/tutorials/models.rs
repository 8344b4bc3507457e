// Tutorial data models and DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::pipeline::context::optional_number;

pub const TITLE_MIN: usize = 5;
pub const TITLE_MAX: usize = 200;
pub const DESCRIPTION_MIN: usize = 10;
pub const DESCRIPTION_MAX: usize = 5000;
pub const MAX_TAGS: usize = 10;
pub const TAG_MAX: usize = 30;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Woodworking,
    Electronics,
    Crafts,
    HomeImprovement,
    Gardening,
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Woodworking,
        Category::Electronics,
        Category::Crafts,
        Category::HomeImprovement,
        Category::Gardening,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Woodworking => "woodworking",
            Category::Electronics => "electronics",
            Category::Crafts => "crafts",
            Category::HomeImprovement => "home_improvement",
            Category::Gardening => "gardening",
            Category::Other => "other",
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(Category::as_str).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Beginner, Difficulty::Intermediate, Difficulty::Advanced];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(Difficulty::as_str).collect()
    }
}

macro_rules! str_enum {
    ($name:ident) => {
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $name::ALL
                    .into_iter()
                    .find(|value| value.as_str() == s)
                    .ok_or_else(|| s.to_string())
            }
        }
    };
}

str_enum!(Category);
str_enum!(Difficulty);

/// Stored tutorial
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Tutorial {
    pub id: Uuid,
    pub author_id: Uuid,
    #[schema(example = "Build a cedar birdhouse")]
    pub title: String,
    pub description: String,
    pub category: Category,
    pub difficulty: Difficulty,
    #[schema(example = json!(["cedar", "outdoor"]))]
    pub tags: Vec<String>,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to insert a tutorial
#[derive(Debug, Clone)]
pub struct NewTutorial {
    pub author_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub difficulty: Difficulty,
    pub tags: Vec<String>,
    pub published: bool,
}

/// Partial update; `None` keeps the stored value
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct TutorialChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub difficulty: Option<Difficulty>,
    pub tags: Option<Vec<String>>,
    pub published: Option<bool>,
}

impl TutorialChanges {
    pub fn apply(self, tutorial: &mut Tutorial) {
        if let Some(title) = self.title {
            tutorial.title = title;
        }
        if let Some(description) = self.description {
            tutorial.description = description;
        }
        if let Some(category) = self.category {
            tutorial.category = category;
        }
        if let Some(difficulty) = self.difficulty {
            tutorial.difficulty = difficulty;
        }
        if let Some(tags) = self.tags {
            tutorial.tags = tags;
        }
        if let Some(published) = self.published {
            tutorial.published = published;
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTutorialRequest {
    #[schema(example = "Build a cedar birdhouse")]
    pub title: String,
    #[schema(example = "Cut, assemble and finish a birdhouse from a single cedar board.")]
    pub description: String,
    pub category: Category,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Defaults to published
    #[serde(default)]
    pub published: Option<bool>,
}

impl CreateTutorialRequest {
    pub fn into_new(self, author_id: Uuid) -> NewTutorial {
        NewTutorial {
            author_id,
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            category: self.category,
            difficulty: self.difficulty,
            tags: normalize_tags(self.tags),
            published: self.published.unwrap_or(true),
        }
    }
}

/// Trim, lowercase and de-duplicate tags, keeping first occurrence order
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !normalized.contains(&tag) {
            normalized.push(tag);
        }
    }
    normalized
}

/// Listing query, read from the sanitized query string
#[derive(Debug, Default, Deserialize)]
pub struct TutorialListParams {
    #[serde(default, deserialize_with = "optional_number")]
    pub page: Option<u32>,
    #[serde(default, deserialize_with = "optional_number")]
    pub limit: Option<u32>,
    pub category: Option<Category>,
    pub difficulty: Option<Difficulty>,
}

impl TutorialListParams {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> u32 {
        (self.page() - 1).saturating_mul(self.limit())
    }
}

/// Who may see unpublished tutorials in a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Anonymous callers
    PublishedOnly,
    /// Published tutorials plus the caller's own drafts
    PublishedOrAuthor(Uuid),
    /// Admins
    All,
}

impl Visibility {
    pub fn allows(&self, tutorial: &Tutorial) -> bool {
        match self {
            Visibility::All => true,
            Visibility::PublishedOnly => tutorial.published,
            Visibility::PublishedOrAuthor(author) => tutorial.published || tutorial.author_id == *author,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TutorialFilter {
    pub category: Option<Category>,
    pub difficulty: Option<Difficulty>,
    pub visibility: Visibility,
    pub limit: u32,
    pub offset: u32,
}

/// One page of a tutorial listing
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TutorialPage {
    pub items: Vec<Tutorial>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
}
