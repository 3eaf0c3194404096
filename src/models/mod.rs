use serde::{Deserialize, Serialize};

/// Slug and title of a neighbouring chapter.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ChapterLink {
    pub slug: &'static str,
    pub title: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ChapterEntry {
    pub slug: &'static str,
    pub title: &'static str,
    pub chapter_id: &'static str,
    pub module_id: u8,
    #[serde(skip)]
    pub body: &'static str,
    pub prev: Option<ChapterLink>,
    pub next: Option<ChapterLink>,
}

#[derive(Debug, Serialize)]
pub struct ModuleInfo {
    pub number: u8,
    pub title: &'static str,
    pub subtitle: &'static str,
    pub description: &'static str,
    pub chapters: &'static [&'static str],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    pub programming_experience: String,
    pub hardware_experience: String,
    pub primary_interest: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub chapter: String,
    pub title: String,
    pub relevance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub message_id: Option<String>,
    pub answer: String,
    #[serde(default)]
    pub sources: Option<Vec<Source>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub programming_experience: String,
    pub hardware_experience: String,
    pub primary_interest: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalizeRequest {
    pub content: String,
    pub chapter_id: String,
    pub user_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersonalizeResponse {
    pub personalized_content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateRequest {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_id: Option<String>,
    pub target_language: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranslateResponse {
    pub translated_content: String,
}

/// Error envelope returned by the relay routes.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}
