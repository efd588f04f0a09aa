//! Form workflow: field extraction, PDF handling and the orchestrating
//! [`FormPipeline`].

pub mod analysis;
pub mod collaborators;
pub mod error;
pub mod fields;
pub mod pdf;

pub use analysis::{FormPipeline, IngestOutcome};
pub use collaborators::{FieldDetector, FieldLabeler};
pub use error::{CollaboratorError, FormError, PdfError};
pub use fields::{combine, reading_order, Detection, FieldLabel, LabelingOutcome};
pub use pdf::{PdfAssembler, PdfRasterizer, PdfiumBackend, RasterizedPdf};
