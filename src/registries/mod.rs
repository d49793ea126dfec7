mod model_preferences;
mod templates;

pub use model_preferences::{DEFAULT_MODELS, ModelPreferences};
pub use templates::{PROJECT_NAME_PLACEHOLDER, ProjectTemplate, template_for};
