//! In-memory doubles of the CMS and the analyzer, shared by unit tests.

use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::config::RollbackPolicy;
use crate::error::{RecipeError, Result};
use crate::handlers::RecipeHandler;
use crate::models::{AnalysisResult, PersistedRecipe, RecipeDraft, RecipeRecord};
use crate::services::{ContentBackend, ImageAnalyzer};

/// CMS double that records every call as a short string, in order.
#[derive(Default)]
pub struct FakeBackend {
    pub credits: Mutex<i64>,
    /// Values returned by successive credit reads before falling back to `credits`.
    pub scripted_reads: Mutex<VecDeque<i64>>,
    /// 1-based index of the save that fails.
    pub fail_save_at: Option<usize>,
    pub fail_delete_image: bool,
    pub fail_credit_update: bool,
    pub calls: Mutex<Vec<String>>,
    pub saves: Mutex<usize>,
}

impl FakeBackend {
    pub fn with_credits(credits: i64) -> Self {
        Self {
            credits: Mutex::new(credits),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait::async_trait]
impl ContentBackend for FakeBackend {
    async fn get_user_credits(&self, user_id: &str) -> Result<i64> {
        self.record(format!("get_credits:{}", user_id));
        if let Some(value) = self.scripted_reads.lock().unwrap().pop_front() {
            return Ok(value);
        }
        Ok(*self.credits.lock().unwrap())
    }

    async fn set_user_credits(&self, user_id: &str, credits: i64) -> Result<()> {
        self.record(format!("set_credits:{}:{}", user_id, credits));
        if self.fail_credit_update {
            return Err(RecipeError::CreditDebit("cms unavailable".to_string()));
        }
        *self.credits.lock().unwrap() = credits;
        Ok(())
    }

    async fn save_recipe(&self, record: &RecipeRecord) -> Result<PersistedRecipe> {
        let index = {
            let mut saves = self.saves.lock().unwrap();
            *saves += 1;
            *saves
        };
        let name = record.name.as_str().unwrap_or_default().to_string();
        self.record(format!("save:{}", name));

        if self.fail_save_at == Some(index) {
            return Err(RecipeError::Persistence(format!("cannot save {}", name)));
        }
        Ok(PersistedRecipe(json!({
            "data": { "id": index, "documentId": format!("doc{}", index), "name": name }
        })))
    }

    async fn delete_recipe(&self, recipe_id: &str) -> Result<()> {
        self.record(format!("delete_recipe:{}", recipe_id));
        Ok(())
    }

    async fn delete_image(&self, image_id: &str) -> Result<()> {
        self.record(format!("delete_image:{}", image_id));
        if self.fail_delete_image {
            return Err(RecipeError::Cleanup("already gone".to_string()));
        }
        Ok(())
    }
}

pub enum AnalyzerBehavior {
    Succeed(AnalysisResult),
    MalformedJson,
    RunFailed,
    TimedOut,
    NeverFinishes,
}

/// Analyzer double; counts invocations.
pub struct FakeAnalyzer {
    pub behavior: AnalyzerBehavior,
    pub calls: Mutex<Vec<(String, String, Vec<String>)>>,
}

impl FakeAnalyzer {
    pub fn new(behavior: AnalyzerBehavior) -> Self {
        Self {
            behavior,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl ImageAnalyzer for FakeAnalyzer {
    async fn analyze(&self, image_path: &str, language: &str, diet: &[String]) -> Result<AnalysisResult> {
        self.calls
            .lock()
            .unwrap()
            .push((image_path.to_string(), language.to_string(), diet.to_vec()));

        match &self.behavior {
            AnalyzerBehavior::Succeed(result) => Ok(result.clone()),
            AnalyzerBehavior::MalformedJson => {
                Err(serde_json::from_str::<Value>("Sure! Here are recipes").unwrap_err().into())
            }
            AnalyzerBehavior::RunFailed => Err(RecipeError::Analysis("Run failed: server_error".to_string())),
            AnalyzerBehavior::TimedOut => Err(RecipeError::AnalysisTimeout {
                waited: std::time::Duration::from_secs(300),
            }),
            AnalyzerBehavior::NeverFinishes => std::future::pending().await,
        }
    }
}

pub fn draft(name: &str) -> RecipeDraft {
    serde_json::from_value(json!({
        "name": name,
        "stat": { "difficulty": "medium", "people": "4", "time": "35 min" },
        "steps": [{ "order": 1, "text": "Cook" }],
        "ingrediantforrecipeandsize": [{ "name": "rice", "size": "200g" }]
    }))
    .unwrap()
}

pub fn analysis(names: &[&str]) -> AnalysisResult {
    AnalysisResult {
        recipes: names.iter().map(|n| draft(n)).collect(),
        foods: vec![json!({ "name": "rice" })],
        token_usage: 1234,
    }
}

pub fn handler(
    backend: Arc<FakeBackend>,
    analyzer: Arc<FakeAnalyzer>,
    rollback: RollbackPolicy,
) -> RecipeHandler {
    RecipeHandler::new(backend, analyzer, rollback)
}
