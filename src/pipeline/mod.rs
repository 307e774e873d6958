// src/pipeline/mod.rs

mod classification;
mod department;
pub mod metadata;
mod ocr;

pub use classification::ClassificationStep;
pub use department::DepartmentAssignmentStep;
pub use metadata::MetadataExtractionStep;
pub use ocr::OcrStep;
