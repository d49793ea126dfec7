mod file_write_applier;
mod model_client;
mod pipeline;
mod project_snapshot;
mod response_interpreter;

pub use file_write_applier::{apply, validate_relative_path};
pub use model_client::{ModelChoice, ModelClientError, OllamaClient, select_model};
pub use pipeline::{ModificationPipeline, PipelineOutcome, PipelineSettings, build_request};
pub use project_snapshot::{snapshot, snapshot_excluding};
pub use response_interpreter::interpret;
