//! Runtime output contracts derived from taxonomy content, plus the typed
//! shapes each stage deserializes its responses into.

pub mod contract;
pub mod factory;
pub mod types;

use thiserror::Error;

pub use contract::{ContractKey, OutputContract};
pub use factory::SchemaFactory;
pub use types::{
    attribute_key, AttributeDetection, AttributeExtraction, CategoryDetection, ElementDetection,
    ElementExtraction, Sentiment,
};

#[derive(Error, Debug, Clone)]
pub enum SchemaError {
    #[error("Failed to compile output contract '{contract}': {message}")]
    Compile { contract: String, message: String },
}
