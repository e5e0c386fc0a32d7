pub mod recipe_handler;
pub mod validation;

pub use recipe_handler::RecipeHandler;
pub use validation::{parse_body, validate_request};
