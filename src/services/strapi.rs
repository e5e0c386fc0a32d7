use serde::Serialize;
use serde_json::Value;

use super::ContentBackend;
use crate::config::StrapiConfig;
use crate::error::{RecipeError, Result};
use crate::models::{PersistedRecipe, RecipeRecord};

/// Strapi REST client for uploads, recipes and user credits.
pub struct StrapiClient {
    base_url: String,
    api_token: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct DataEnvelope<'a> {
    data: &'a RecipeRecord,
}

#[derive(Serialize)]
struct CreditUpdate {
    credit: i64,
}

impl StrapiClient {
    pub fn new(config: &StrapiConfig) -> Self {
        Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.api_token)
    }

    /// Send a request and return the JSON body of a successful response.
    /// Transport and non-2xx failures come back as the error text.
    async fn send_json(&self, request: reqwest::RequestBuilder) -> std::result::Result<Value, String> {
        let response = request
            .header("Authorization", self.bearer())
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        let body = response.text().await.map_err(|e| e.to_string())?;

        if !status.is_success() {
            return Err(format!("Strapi API error ({}): {}", status, body));
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| format!("invalid JSON from Strapi: {}", e))
    }
}

/// `credit` field of a user profile; numeric strings are accepted, anything
/// else reads as 0.
fn credit_from_profile(profile: &Value) -> i64 {
    match profile.get("credit") {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Some(Value::String(raw)) => {
            let raw = raw.trim();
            raw.parse::<i64>()
                .ok()
                .or_else(|| raw.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
                .unwrap_or(0)
        }
        _ => 0,
    }
}

#[async_trait::async_trait]
impl ContentBackend for StrapiClient {
    async fn get_user_credits(&self, user_id: &str) -> Result<i64> {
        let url = self.api_url(&format!("/users/{}", user_id));
        log::debug!("💳 Fetching credits for user {}", user_id);

        let profile = self.send_json(self.client.get(&url)).await.map_err(|e| {
            log::error!("❌ Error getting user credits: {}", e);
            RecipeError::CreditLookup(e)
        })?;

        let credits = credit_from_profile(&profile);
        log::debug!("💳 User {} has {} credits", user_id, credits);
        Ok(credits)
    }

    async fn set_user_credits(&self, user_id: &str, credits: i64) -> Result<()> {
        let url = self.api_url(&format!("/users/{}", user_id));

        self.send_json(self.client.put(&url).json(&CreditUpdate { credit: credits }))
            .await
            .map_err(|e| {
                log::error!("❌ Error updating user credits: {}", e);
                RecipeError::CreditDebit(e)
            })?;

        log::info!("💳 Credits of user {} set to {}", user_id, credits);
        Ok(())
    }

    async fn save_recipe(&self, record: &RecipeRecord) -> Result<PersistedRecipe> {
        let url = self.api_url("/recipes");

        let saved = self
            .send_json(self.client.post(&url).json(&DataEnvelope { data: record }))
            .await
            .map_err(|e| {
                log::error!("❌ Error saving recipe to Strapi: {}", e);
                RecipeError::Persistence(e)
            })?;

        log::info!("💾 Recipe saved: {}", record.name);
        Ok(PersistedRecipe(saved))
    }

    async fn delete_recipe(&self, recipe_id: &str) -> Result<()> {
        let url = self.api_url(&format!("/recipes/{}", recipe_id));

        self.send_json(self.client.delete(&url))
            .await
            .map_err(RecipeError::Persistence)?;

        log::info!("🗑️ Recipe {} deleted", recipe_id);
        Ok(())
    }

    async fn delete_image(&self, image_id: &str) -> Result<()> {
        let url = self.api_url(&format!("/upload/files/{}", image_id));

        self.send_json(self.client.delete(&url)).await.map_err(|e| {
            log::error!("❌ Error deleting image from Strapi: {}", e);
            RecipeError::Cleanup(e)
        })?;

        log::info!("🗑️ Temporary image {} deleted", image_id);
        Ok(())
    }
}
