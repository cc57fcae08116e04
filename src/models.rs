use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
#[error("unknown {kind} `{value}`")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Beginner,
    Intermediate,
    Advanced,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Beginner => "beginner",
            Level::Intermediate => "intermediate",
            Level::Advanced => "advanced",
        }
    }
}

impl TryFrom<String> for Level {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "beginner" => Ok(Level::Beginner),
            "intermediate" => Ok(Level::Intermediate),
            "advanced" => Ok(Level::Advanced),
            _ => Err(UnknownVariant { kind: "level", value }),
        }
    }
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub duration: i32, // minutes
    #[sqlx(try_from = "String")]
    pub level: Level,
    pub category: String,
    pub instructor_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Module {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub duration: i32,
    pub order_index: i32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Video,
    Document,
    Image,
    Quiz,
}

impl ContentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Video => "video",
            ContentKind::Document => "document",
            ContentKind::Image => "image",
            ContentKind::Quiz => "quiz",
        }
    }
}

impl TryFrom<String> for ContentKind {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "video" => Ok(ContentKind::Video),
            "document" => Ok(ContentKind::Document),
            "image" => Ok(ContentKind::Image),
            "quiz" => Ok(ContentKind::Quiz),
            _ => Err(UnknownVariant { kind: "content type", value }),
        }
    }
}

/// Content item as stored: `content` is a URL, free text or a JSON encoded
/// [`Quiz`] depending on `kind`. Decode with [`ContentItemRow::decode`].
#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct ContentItemRow {
    pub id: Uuid,
    pub module_id: Uuid,
    #[sqlx(rename = "type", try_from = "String")]
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub content: String,
    pub duration: i32,
    pub order_index: i32,
}

/// Typed payload of a content item.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum ContentBody {
    Video(String),
    Document(String),
    Image(String),
    Quiz(Quiz),
}

impl ContentBody {
    pub fn kind(&self) -> ContentKind {
        match self {
            ContentBody::Video(_) => ContentKind::Video,
            ContentBody::Document(_) => ContentKind::Document,
            ContentBody::Image(_) => ContentKind::Image,
            ContentBody::Quiz(_) => ContentKind::Quiz,
        }
    }

    /// Storage form of the payload.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        match self {
            ContentBody::Video(s) | ContentBody::Document(s) | ContentBody::Image(s) => {
                Ok(s.clone())
            }
            ContentBody::Quiz(quiz) => serde_json::to_string(quiz),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ContentItem {
    pub id: Uuid,
    pub module_id: Uuid,
    pub duration: i32,
    pub order_index: i32,
    #[serde(flatten)]
    pub body: ContentBody,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QuizMode {
    Single,
    Multiple,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct QuizOption {
    pub text: String,
    #[serde(rename = "isCorrect")]
    pub is_correct: bool,
}

// Field names match the payload the content editor has always written.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Quiz {
    pub question: String,
    #[serde(rename = "type")]
    pub mode: QuizMode,
    pub options: Vec<QuizOption>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Enrollment {
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub progress: i32,
    pub enrolled_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ModuleProgress {
    pub user_id: Uuid,
    pub module_id: Uuid,
    pub course_id: Uuid,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct QuizAttempt {
    pub user_id: Uuid,
    pub content_item_id: Uuid,
    pub attempts: i32,
    pub is_correct: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Badge {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub image_url: Option<String>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserBadge {
    pub user_id: Uuid,
    pub badge_id: Uuid,
    pub awarded_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AwardedBadge {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub badge: Badge,
    pub awarded_at: DateTime<Utc>,
}

// --- request bodies ---

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NewCourse {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub duration: i32,
    pub level: Level,
    #[serde(default)]
    pub category: String,
    pub instructor_id: Option<Uuid>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ContentDraft {
    /// Set when the item already exists; its quiz attempts are kept.
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub duration: i32,
    pub order_index: i32,
    #[serde(flatten)]
    pub body: ContentBody,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ModuleDraft {
    pub title: String,
    #[serde(default)]
    pub duration: i32,
    pub order_index: i32,
    #[serde(default)]
    pub items: Vec<ContentDraft>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NewBadge {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub image_url: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct TargetUser {
    /// Set by an administrator acting on someone else's record.
    pub user_id: Option<Uuid>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SetProgressReq {
    pub percent: i32,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SubmitQuizReq {
    pub selections: Vec<bool>,
}

