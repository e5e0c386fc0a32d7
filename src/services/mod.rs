pub mod analyzer; // Assistant run polling + answer parsing
pub mod assistant; // OpenAI Assistants API
pub mod strapi; // Strapi CMS

pub use analyzer::AssistantAnalyzer;
pub use assistant::OpenAiAssistantClient;
pub use strapi::StrapiClient;

use crate::error::Result;
use crate::models::{AnalysisResult, PersistedRecipe, RecipeRecord};

/// System of record for uploaded images, recipes and user credits.
#[async_trait::async_trait]
pub trait ContentBackend: Send + Sync {
    /// Current credit balance; an unset balance reads as 0.
    async fn get_user_credits(&self, user_id: &str) -> Result<i64>;
    async fn set_user_credits(&self, user_id: &str, credits: i64) -> Result<()>;
    async fn save_recipe(&self, record: &RecipeRecord) -> Result<PersistedRecipe>;
    async fn delete_recipe(&self, recipe_id: &str) -> Result<()>;
    async fn delete_image(&self, image_id: &str) -> Result<()>;
}

/// Turns a food picture into recipe drafts.
#[async_trait::async_trait]
pub trait ImageAnalyzer: Send + Sync {
    async fn analyze(&self, image_path: &str, language: &str, diet: &[String]) -> Result<AnalysisResult>;
}
