use thiserror::Error;

use crate::geometry::CorrectionError;
use crate::session::SessionError;
use crate::utils::error::ConfigError;

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("PDF backend unavailable: {message}")]
    Unavailable { message: String },

    #[error("Failed to load PDF content")]
    Load {
        #[source]
        source: pdfium_render::prelude::PdfiumError,
    },

    #[error("Failed to render page {page}: {message}")]
    Render { page: usize, message: String },

    #[error("PDF has no pages")]
    Empty,

    #[error("PDF has {count} pages, the limit is {max}")]
    TooManyPages { count: usize, max: usize },
}

impl From<pdfium_render::prelude::PdfiumError> for PdfError {
    fn from(source: pdfium_render::prelude::PdfiumError) -> Self {
        PdfError::Load { source }
    }
}

/// Failure reported by a field detector or labeler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("{collaborator} failed: {message}")]
    Failed {
        collaborator: &'static str,
        message: String,
    },

    #[error("{collaborator} timed out")]
    TimedOut { collaborator: &'static str },
}

impl CollaboratorError {
    pub fn failed(collaborator: &'static str, message: impl Into<String>) -> Self {
        CollaboratorError::Failed {
            collaborator,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum FormError {
    #[error(transparent)]
    Correction(#[from] CorrectionError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Pdf(#[from] PdfError),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl FormError {
    /// The session error behind this failure, if any.
    #[must_use]
    pub fn as_session_error(&self) -> Option<&SessionError> {
        match self {
            FormError::Session(e) => Some(e),
            _ => None,
        }
    }
}
