pub mod builder;
pub mod context;
pub mod error;
pub mod merger;
pub mod progress;
pub mod registry;
pub mod runner;
pub mod stage;

pub use builder::PipelineBuilder;
pub use context::{MergedView, PipelineContext, RunMetadata};
pub use error::{PipelineError, RegistryError, StageError};
pub use merger::{
    AttributeResult, CategoryResult, ClassificationOutput, ElementResult, FlatRecord,
    ResultMerger,
};
pub use progress::{BroadcastProgress, NoopProgress, ProgressEvent, ProgressReporter, ProgressUpdate};
pub use registry::StageRegistry;
pub use runner::{DryRunStage, Pipeline};
pub use stage::{Stage, StageOutput, StageResults};
