use std::fmt;
use std::sync::Arc;

use crate::config::RollbackPolicy;
use crate::error::{RecipeError, Result};
use crate::models::{CreatedRecipes, CreationRequest, RecipeRecord};
use crate::services::{ContentBackend, ImageAnalyzer};

/// Steps of a creation request, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    CheckingCredit,
    Analyzing,
    Persisting,
    DebitingCredit,
    CleaningUp,
    Responding,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Validating => "validating",
            Stage::CheckingCredit => "checking credit",
            Stage::Analyzing => "analyzing",
            Stage::Persisting => "persisting",
            Stage::DebitingCredit => "debiting credit",
            Stage::CleaningUp => "cleaning up",
            Stage::Responding => "responding",
        };
        write!(f, "{}", s)
    }
}

/// Where a request got to; consulted when it fails.
struct Progress {
    stage: Stage,
    saved_ids: Vec<String>,
}

impl Progress {
    fn enter(&mut self, stage: Stage) {
        log::debug!("➡️ {} -> {}", self.stage, stage);
        self.stage = stage;
    }
}

/// Drives a validated request through credit check, analysis, persistence,
/// debit and image cleanup.
pub struct RecipeHandler {
    backend: Arc<dyn ContentBackend>,
    analyzer: Arc<dyn ImageAnalyzer>,
    rollback: RollbackPolicy,
}

impl RecipeHandler {
    pub fn new(
        backend: Arc<dyn ContentBackend>,
        analyzer: Arc<dyn ImageAnalyzer>,
        rollback: RollbackPolicy,
    ) -> Self {
        Self {
            backend,
            analyzer,
            rollback,
        }
    }

    /// Create recipes for an uploaded image. The image is deleted exactly
    /// once before this returns, whatever the outcome.
    pub async fn create_recipes(&self, request: &CreationRequest) -> Result<CreatedRecipes> {
        log::info!(
            "📨 Recipe request - user: {} | image: {} | language: {} | diet: {:?}",
            request.user_id,
            request.image_id,
            request.language,
            request.diet
        );

        let mut progress = Progress {
            stage: Stage::Validating,
            saved_ids: Vec::new(),
        };

        let outcome = self.run_pipeline(request, &mut progress).await;

        if let Err(e) = &outcome {
            log::error!("❌ Error creating recipe while {}: {}", progress.stage, e);
            self.apply_rollback(&progress.saved_ids).await;
        }

        progress.enter(Stage::CleaningUp);
        self.cleanup_image(&request.image_id).await;

        if outcome.is_ok() {
            progress.enter(Stage::Responding);
        }
        outcome
    }

    async fn run_pipeline(&self, request: &CreationRequest, progress: &mut Progress) -> Result<CreatedRecipes> {
        progress.enter(Stage::CheckingCredit);
        let credits = self.backend.get_user_credits(&request.user_id).await?;
        if credits <= 0 {
            log::warn!("⚠️ User {} has no credits ({})", request.user_id, credits);
            return Err(RecipeError::InsufficientCredit { credits });
        }

        progress.enter(Stage::Analyzing);
        let analysis = self
            .analyzer
            .analyze(&request.image_path, &request.language, &request.diet)
            .await?;

        // One at a time: the debit below must only happen once every draft is saved.
        progress.enter(Stage::Persisting);
        let mut saved_recipes = Vec::with_capacity(analysis.recipes.len());
        for draft in &analysis.recipes {
            let record = RecipeRecord::from_draft(draft, &request.user_id);
            let saved = self.backend.save_recipe(&record).await?;
            match saved.remote_id() {
                Some(id) => progress.saved_ids.push(id),
                None => log::warn!("⚠️ Saved recipe has no id, it cannot be rolled back"),
            }
            saved_recipes.push(saved);
        }

        progress.enter(Stage::DebitingCredit);
        let remaining_credits = self.debit_credit(&request.user_id).await?;

        Ok(CreatedRecipes {
            saved_recipes,
            remaining_credits,
            token_usage: analysis.token_usage,
            foods: analysis.foods,
        })
    }

    /// Re-read the balance and write it back one lower. Nothing locks the
    /// balance between the gate and here, so it is checked again. Returns
    /// the written value, which is what the client sees as remaining.
    async fn debit_credit(&self, user_id: &str) -> Result<i64> {
        let current = self
            .backend
            .get_user_credits(user_id)
            .await
            .map_err(|e| match e {
                RecipeError::CreditLookup(message) => RecipeError::CreditDebit(message),
                other => other,
            })?;

        if current <= 0 {
            log::warn!("⚠️ Credits of user {} spent while the request was running", user_id);
            return Err(RecipeError::CreditsExhausted { credits: current });
        }

        let remaining = current - 1;
        self.backend.set_user_credits(user_id, remaining).await?;
        Ok(remaining)
    }

    async fn cleanup_image(&self, image_id: &str) {
        if let Err(e) = self.backend.delete_image(image_id).await {
            log::error!("❌ Error deleting image {} after request: {}", image_id, e);
        }
    }

    async fn apply_rollback(&self, saved_ids: &[String]) {
        if saved_ids.is_empty() {
            return;
        }

        match self.rollback {
            RollbackPolicy::Keep => {
                log::warn!(
                    "⚠️ {} recipes stay saved after the failure: {:?}",
                    saved_ids.len(),
                    saved_ids
                );
            }
            RollbackPolicy::Delete => {
                for id in saved_ids {
                    if let Err(e) = self.backend.delete_recipe(id).await {
                        log::error!("❌ Could not roll back recipe {}: {}", id, e);
                    }
                }
                log::info!("↩️ Rolled back {} saved recipes", saved_ids.len());
            }
        }
    }
}
