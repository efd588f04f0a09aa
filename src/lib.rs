pub mod document;
pub mod geometry;
pub mod inference;
pub mod orientation;
pub mod quality;
pub mod render;
pub mod session;
pub mod utils;

pub use document::{
    CollaboratorError, Detection, FieldDetector, FieldLabeler, FormError, FormPipeline,
    IngestOutcome, LabelingOutcome, PdfError,
};
pub use geometry::{CorrectionDiagnostics, CorrectionError, GeometryCorrector};
pub use inference::InferenceError;
pub use orientation::{Orientation, OrientationOracle};
pub use quality::{QualityAssessor, QualityVerdict};
pub use render::{FieldValue, Renderer, Signature};
pub use session::{PdfSessionStore, SessionError, SessionId, SessionStore, Stage, UIField};
pub use utils::{AppConfig, LanguageDirection};
