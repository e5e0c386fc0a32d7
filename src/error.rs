use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Required fields of a recipe creation request, in reporting order.
pub const REQUIRED_FIELDS: [&str; 5] = ["imagePath", "imageId", "userId", "language", "diet"];

/// Client input problems, reported before any remote call is made.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid JSON body")]
    InvalidJson(String),

    #[error("Missing required fields")]
    MissingFields { missing: Vec<&'static str>, received: Value },

    #[error("Diet must be an array")]
    DietNotArray { received: Value },
}

/// Every way a recipe creation request can fail.
#[derive(Error, Debug)]
pub enum RecipeError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Credit gate refused the request before any analysis.
    #[error("Insufficient credits")]
    InsufficientCredit { credits: i64 },

    /// Credit re-check at debit time found the balance already spent.
    #[error("User has no credits remaining")]
    CreditsExhausted { credits: i64 },

    #[error("Failed to read user credits: {0}")]
    CreditLookup(String),

    #[error("Image analysis failed: {0}")]
    Analysis(String),

    #[error("Assistant run did not finish within {}ms", .waited.as_millis())]
    AnalysisTimeout { waited: Duration },

    #[error("Failed to parse assistant response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to save recipe: {0}")]
    Persistence(String),

    #[error("Failed to update user credits: {0}")]
    CreditDebit(String),

    #[error("Failed to delete image: {0}")]
    Cleanup(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Failures of this service itself, such as building a response body.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RecipeError {
    /// HTTP status the API answers with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            RecipeError::Validation(_) => 400,
            RecipeError::InsufficientCredit { .. } | RecipeError::CreditsExhausted { .. } => 403,
            _ => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, RecipeError>;
