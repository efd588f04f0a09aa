use thiserror::Error;

use super::types::SessionId;

fn page_suffix(page: &Option<usize>) -> String {
    page.map(|p| format!(" on page {p}")).unwrap_or_default()
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session {id} not found or expired")]
    NotFound { id: SessionId },

    /// An operation ran before its prerequisite; `requirement` names it.
    #[error("Stage violation{}: {requirement}", page_suffix(.page))]
    StageViolation {
        page: Option<usize>,
        requirement: String,
    },

    #[error("Invalid fields{}: {message}", page_suffix(.page))]
    InvalidFields {
        page: Option<usize>,
        message: String,
    },
}

impl SessionError {
    pub(crate) fn stage(page: Option<usize>, requirement: impl Into<String>) -> Self {
        SessionError::StageViolation {
            page,
            requirement: requirement.into(),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, SessionError::NotFound { .. })
    }

    #[must_use]
    pub fn is_stage_violation(&self) -> bool {
        matches!(self, SessionError::StageViolation { .. })
    }
}
