mod completion;
mod instruction;
mod plan;
mod project;
mod snapshot;

pub use completion::{CompletionModel, ModelRequest};
pub use instruction::{Instruction, OperationKind};
pub use plan::{ApplyReport, FileWritePlan, PathRejection, WriteMode};
pub use project::{ProjectConfig, ProjectType, split_list};
pub use snapshot::ProjectSnapshot;
