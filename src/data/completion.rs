use async_trait::async_trait;
use std::time::Duration;

/// A single completion request: role-setting preamble plus task body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRequest {
    pub system_prompt: String,
    pub user_prompt: String,
}

impl ModelRequest {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
        }
    }
}

/// Something that turns a prompt into generated text.
///
/// Implementations must never hang past `timeout` and must not surface
/// errors to the caller.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Sends one completion request.
    ///
    /// # Arguments
    /// * `system_prompt` - Role-setting preamble
    /// * `user_prompt` - Task body
    /// * `timeout` - Upper bound for the whole round trip
    ///
    /// # Returns
    /// The generated text, or an empty string when no usable text was
    /// produced (timeout, transport failure, endpoint error). The reason is
    /// only visible in the logs.
    async fn complete(&self, system_prompt: &str, user_prompt: &str, timeout: Duration) -> String;

    /// Name of the model serving requests, for display.
    fn model_name(&self) -> &str;
}
