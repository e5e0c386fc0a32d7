use serde::Serialize;
use serde_json::{json, Value};

use crate::error::{RecipeError, ValidationError, REQUIRED_FIELDS};
use crate::handlers::{parse_body, validate_request, RecipeHandler};
use crate::models::{CreatedRecipes, PersistedRecipe};

pub const CREATED_MESSAGE: &str =
    "Recipes created successfully, user credits updated, and temporary image deleted";

/// Body of a `201 Created` answer.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedResponse {
    pub message: String,
    pub saved_recipes: Vec<PersistedRecipe>,
    pub user_id: Value,
    pub remaining_credits: i64,
    pub token_usage: u64,
    pub foods: Vec<Value>,
}

impl CreatedResponse {
    fn new(created: CreatedRecipes, user_id: Value) -> Self {
        Self {
            message: CREATED_MESSAGE.to_string(),
            saved_recipes: created.saved_recipes,
            user_id,
            remaining_credits: created.remaining_credits,
            token_usage: created.token_usage,
            foods: created.foods,
        }
    }
}

/// JSON body describing a failed request.
pub fn error_body(err: &RecipeError) -> Value {
    match err {
        RecipeError::Validation(ValidationError::InvalidJson(detail)) => json!({
            "message": err.to_string(),
            "error": detail,
        }),
        RecipeError::Validation(ValidationError::MissingFields { missing, received }) => json!({
            "message": err.to_string(),
            "required": REQUIRED_FIELDS,
            "missing": missing,
            "received": received,
        }),
        RecipeError::Validation(ValidationError::DietNotArray { received }) => json!({
            "message": err.to_string(),
            "received": received,
        }),
        RecipeError::InsufficientCredit { credits } => json!({
            "message": err.to_string(),
            "credits": credits,
        }),
        _ => json!({
            "message": err.to_string(),
            "error": err.to_string(),
        }),
    }
}

/// Handle a raw `POST /v1/recipe/create` body; returns status and JSON body.
pub async fn handle_create_recipe(handler: &RecipeHandler, raw_body: &str) -> (u16, Value) {
    let body = match parse_body(raw_body) {
        Ok(body) => body,
        Err(e) => return failure(e.into()),
    };

    let request = match validate_request(&body) {
        Ok(request) => request,
        Err(e) => return failure(e.into()),
    };

    match handler.create_recipes(&request).await {
        Ok(created) => {
            log::info!(
                "✅ {} recipes created for user {}, {} credits left",
                created.saved_recipes.len(),
                request.user_id,
                created.remaining_credits
            );
            let response = CreatedResponse::new(created, body["userId"].clone());
            match serde_json::to_value(&response) {
                Ok(value) => (201, value),
                Err(e) => {
                    log::error!("❌ Failed to serialize creation response: {}", e);
                    failure(RecipeError::Internal(format!("response serialization: {}", e)))
                }
            }
        }
        Err(e) => failure(e),
    }
}

fn failure(err: RecipeError) -> (u16, Value) {
    (err.status_code(), error_body(&err))
}


// Axum integration
#[cfg(feature = "http-server")]
pub mod server {
    use super::*;
    use axum::{
        extract::State,
        http::StatusCode,
        routing::{get, post},
        Json, Router,
    };
    use std::sync::Arc;
    use tower_http::limit::RequestBodyLimitLayer;

    const MAX_BODY_BYTES: usize = 64 * 1024;

    pub struct AppState {
        pub recipe_handler: Arc<RecipeHandler>,
    }

    pub fn create_router(recipe_handler: Arc<RecipeHandler>) -> Router {
        let state = Arc::new(AppState { recipe_handler });

        Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_check))
            .route("/v1/recipe/create", post(create_recipe_handler))
            .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
            .with_state(state)
    }

    async fn create_recipe_handler(
        State(state): State<Arc<AppState>>,
        body: String,
    ) -> (StatusCode, Json<Value>) {
        log::debug!(
            "🔔 Recipe request received: {}",
            body.chars().take(500).collect::<String>()
        );

        let (status, response) = handle_create_recipe(&state.recipe_handler, &body).await;
        (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Json(response),
        )
    }

    async fn root_handler() -> &'static str {
        "Recipe Vision API - POST /v1/recipe/create with {imagePath, imageId, userId, language, diet}"
    }

    async fn health_check() -> &'static str {
        "OK"
    }

}
