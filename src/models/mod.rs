use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A validated `POST /v1/recipe/create` body.
#[derive(Debug, Clone, PartialEq)]
pub struct CreationRequest {
    pub image_path: String,
    pub image_id: String,
    pub user_id: String,
    pub language: String,
    pub diet: Vec<String>,
}

/// Cooking stats of a draft. The assistant answers with strings or numbers
/// here, so the values are kept as raw JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipeStat {
    #[serde(default)]
    pub difficulty: Value,
    #[serde(default)]
    pub people: Value,
    #[serde(default)]
    pub time: Value,
}

/// A recipe as proposed by the assistant, before it is saved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipeDraft {
    #[serde(default)]
    pub name: Value,
    #[serde(default)]
    pub stat: RecipeStat,
    #[serde(default)]
    pub steps: Value,
    #[serde(default)]
    pub ingrediantforrecipeandsize: Value,
}

/// JSON document the assistant is instructed to answer with.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisPayload {
    pub recipes: Vec<RecipeDraft>,
    #[serde(default)]
    pub foods: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub recipes: Vec<RecipeDraft>,
    pub foods: Vec<Value>,
    pub token_usage: u64,
}

/// Recipe fields in the shape the CMS collection expects.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeRecord {
    pub name: Value,
    pub difficulty: Value,
    pub people: Option<i64>,
    pub time: Option<i64>,
    pub steps: Value,
    pub foodrecipe: Value,
    pub users: String,
}

impl RecipeRecord {
    pub fn from_draft(draft: &RecipeDraft, user_id: &str) -> Self {
        Self {
            name: draft.name.clone(),
            difficulty: draft.stat.difficulty.clone(),
            people: parse_leading_int(&draft.stat.people),
            time: parse_leading_int(&draft.stat.time),
            steps: draft.steps.clone(),
            foodrecipe: draft.ingrediantforrecipeandsize.clone(),
            users: user_id.to_string(),
        }
    }
}

/// Integer prefix of a loosely typed value: numbers are truncated, strings
/// yield their leading (optionally signed) digits, e.g. `"45 min"` -> 45.
/// Anything without a usable prefix gives `None`.
pub fn parse_leading_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim_start();
            let (sign, digits) = match s.strip_prefix('-') {
                Some(rest) => (-1, rest),
                None => (1, s.strip_prefix('+').unwrap_or(s)),
            };
            let end = digits
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(digits.len());
            digits[..end].parse::<i64>().ok().map(|n| sign * n)
        }
        _ => None,
    }
}

/// Record returned by the CMS for a saved recipe. Opaque apart from the
/// identifier needed to delete it again.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PersistedRecipe(pub Value);

impl PersistedRecipe {
    /// Strapi v5 addresses entries by `documentId`, v4 by numeric `id`.
    pub fn remote_id(&self) -> Option<String> {
        let data = self.0.get("data").unwrap_or(&self.0);
        match data.get("documentId") {
            Some(Value::String(id)) => Some(id.clone()),
            _ => match data.get("id") {
                Some(Value::Number(n)) => Some(n.to_string()),
                Some(Value::String(s)) => Some(s.clone()),
                _ => None,
            },
        }
    }
}

/// Successful outcome of the whole creation pipeline.
#[derive(Debug, Clone)]
pub struct CreatedRecipes {
    pub saved_recipes: Vec<PersistedRecipe>,
    pub remaining_credits: i64,
    pub token_usage: u64,
    pub foods: Vec<Value>,
}
