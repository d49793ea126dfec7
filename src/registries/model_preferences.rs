/// Models tried at startup when none are configured, most preferred first.
pub const DEFAULT_MODELS: [&str; 6] = [
    "qwen2.5-coder:32b",
    "deepseek-coder:33b",
    "codellama:34b",
    "qwen2.5-coder:14b",
    "deepseek-coder:6.7b",
    "codellama:13b",
];

/// Ordered list of candidate models for startup selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPreferences {
    candidates: Vec<String>,
}

impl ModelPreferences {
    /// Uses `configured` when it names at least one model, else [`DEFAULT_MODELS`].
    pub fn new(configured: &[String]) -> Self {
        let candidates: Vec<String> = configured
            .iter()
            .map(|m| m.trim())
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .collect();

        if candidates.is_empty() {
            return Self::default();
        }
        Self { candidates }
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }
}

impl Default for ModelPreferences {
    fn default() -> Self {
        Self {
            candidates: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_configuration_uses_built_in_order() {
        let prefs = ModelPreferences::new(&[]);
        assert_eq!(prefs.candidates()[0], "qwen2.5-coder:32b");
        assert_eq!(prefs.candidates().len(), DEFAULT_MODELS.len());
    }

    #[test]
    fn configured_models_replace_defaults() {
        let prefs = ModelPreferences::new(&["llama3:8b".to_string(), "  ".to_string()]);
        assert_eq!(prefs.candidates(), ["llama3:8b".to_string()]);
    }

    #[test]
    fn blank_configuration_falls_back() {
        let prefs = ModelPreferences::new(&[" ".to_string()]);
        assert_eq!(prefs, ModelPreferences::default());
    }
}
