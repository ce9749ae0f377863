//! The built-in classification stages, one per taxonomy level.

pub mod attribute_extraction;
pub mod category_detection;
pub mod element_extraction;
pub mod prompts;
pub mod task;

use std::sync::Arc;

use crate::content::ContentProvider;
use crate::pipeline::{RegistryError, StageRegistry};
use crate::schema::SchemaFactory;

pub use attribute_extraction::AttributeExtractionStage;
pub use category_detection::CategoryDetectionStage;
pub use element_extraction::ElementExtractionStage;
pub use task::Task;

pub const CATEGORY_DETECTION: &str = "category_detection";
pub const ELEMENT_EXTRACTION: &str = "element_extraction";
pub const ATTRIBUTE_EXTRACTION: &str = "attribute_extraction";

/// Registry holding the three built-in stages, chained
/// category → element → attribute.
pub fn default_registry(
    content: Arc<dyn ContentProvider>,
    schemas: Arc<SchemaFactory>,
) -> Result<StageRegistry, RegistryError> {
    let mut registry = StageRegistry::new();
    registry.register(Arc::new(CategoryDetectionStage::new(
        content.clone(),
        schemas.clone(),
    )))?;
    registry.register(Arc::new(ElementExtractionStage::new(
        content.clone(),
        schemas.clone(),
    )))?;
    registry.register(Arc::new(AttributeExtractionStage::new(content, schemas)))?;
    Ok(registry)
}
