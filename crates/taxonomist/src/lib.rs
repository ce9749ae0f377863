pub mod config;
pub mod content;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod sanitize;
pub mod schema;
pub mod secrets;
pub mod stages;
pub mod telemetry;

pub use config::{load_config, load_config_from_str, ClassifierConfig};
pub use content::{
    CombinePolicy, CompositeContentProvider, ContentError, ContentProvider, StaticContentProvider,
    TaxonomyDocument,
};
pub use error::{ClassifierError, ConfigError, Result};
pub use llm::{LlmClient, LlmError, LlmRequest, LlmResponse, MockLlmClient, OpenAiClient};
pub use pipeline::{
    ClassificationOutput, FlatRecord, Pipeline, PipelineBuilder, PipelineContext, PipelineError,
    ResultMerger, Stage, StageRegistry,
};
pub use schema::{OutputContract, SchemaFactory, Sentiment};
pub use secrets::SecretError;
pub use stages::default_registry;
pub use telemetry::init_tracing;
