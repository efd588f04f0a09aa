use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use image::RgbImage;
use tokio::task::JoinHandle;
use tracing::info;

use super::error::SessionError;
use super::map::{spawn_sweeper, SessionMap};
use super::types::{
    validate_fields, PageState, PdfMetadata, PdfProgress, PdfSession, SessionId, Stage, UIField,
};
use crate::utils::config::SessionConfig;
use crate::utils::lang_utils::LanguageDirection;

fn missing_page(page: usize) -> SessionError {
    SessionError::stage(Some(page), format!("page {page} must be rasterized first"))
}

/// Handle to the multi-page session map. Clones share the same map.
#[derive(Clone)]
pub struct PdfSessionStore {
    inner: Arc<SessionMap<PdfSession>>,
}

impl PdfSessionStore {
    pub fn new(config: &SessionConfig) -> Self {
        Self::with_timeout(config.timeout())
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(SessionMap::new(timeout, "pdf")),
        }
    }

    /// Starts a workflow over rasterized pages, numbered from 1.
    pub fn init(
        &self,
        filename: impl Into<String>,
        pages: Vec<RgbImage>,
        metadata: PdfMetadata,
        language_direction: LanguageDirection,
    ) -> Result<SessionId, SessionError> {
        if pages.is_empty() {
            return Err(SessionError::stage(None, "at least one page must be rasterized"));
        }

        let filename = filename.into();
        let pages: Vec<PageState> = pages
            .into_iter()
            .enumerate()
            .map(|(i, image)| PageState::new(i + 1, image))
            .collect();
        let page_count = pages.len();

        let id = self.inner.insert_with(|id| PdfSession {
            id,
            filename: filename.clone(),
            metadata,
            pages,
            language_direction,
            final_document: None,
            created_at: Utc::now(),
        });

        info!(session_id = %id, %filename, page_count, "Started PDF session");
        Ok(id)
    }

    pub fn get(&self, id: &SessionId) -> Result<PdfSession, SessionError> {
        self.inner.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &SessionId) -> bool {
        self.inner.contains(id)
    }

    pub fn progress(&self, id: &SessionId) -> Result<PdfProgress, SessionError> {
        self.inner.read(id, PdfSession::progress)
    }

    pub fn page_image(&self, id: &SessionId, page: usize) -> Result<Arc<RgbImage>, SessionError> {
        self.inner
            .read(id, |session| session.page(page).map(|p| Arc::clone(&p.image)))?
            .ok_or_else(|| missing_page(page))
    }

    /// Images of every page, filled where available.
    pub fn final_pages(&self, id: &SessionId) -> Result<Vec<Arc<RgbImage>>, SessionError> {
        self.inner.read(id, |session| {
            session
                .pages
                .iter()
                .map(|p| p.filled_image.clone().unwrap_or_else(|| Arc::clone(&p.image)))
                .collect()
        })
    }

    pub fn set_language_direction(
        &self,
        id: &SessionId,
        direction: LanguageDirection,
    ) -> Result<(), SessionError> {
        self.inner.update(id, |session| {
            session.language_direction = direction;
            Ok(())
        })
    }

    pub fn mark_explained(
        &self,
        id: &SessionId,
        page: usize,
        explanation: String,
    ) -> Result<(), SessionError> {
        self.inner.update(id, |session| {
            let state = session.page_mut(page).ok_or_else(|| missing_page(page))?;
            state.explanation = Some(explanation);
            state.explained = true;
            Ok(())
        })
    }

    /// Stores fields for a page and marks it analyzed in one step. A
    /// detected `direction` applies to the whole document.
    pub fn mark_analyzed(
        &self,
        id: &SessionId,
        page: usize,
        fields: Vec<UIField>,
        direction: Option<LanguageDirection>,
    ) -> Result<Vec<UIField>, SessionError> {
        self.inner.update(id, |session| {
            let state = session.page_mut(page).ok_or_else(|| missing_page(page))?;
            if state.filled {
                return Err(SessionError::stage(
                    Some(page),
                    format!("page {page} is already filled and cannot be re-analyzed"),
                ));
            }
            let fields = validate_fields(fields, state.image.width(), state.image.height(), Some(page))?;
            state.fields = Some(fields.clone());
            state.analyzed = true;
            if let Some(direction) = direction {
                session.language_direction = direction;
            }
            Ok(fields)
        })
    }

    /// Stores a page rendering made from `fields`, refused when the page's
    /// fields were replaced in the meantime.
    pub fn mark_filled(
        &self,
        id: &SessionId,
        page: usize,
        fields: &[UIField],
        image: RgbImage,
    ) -> Result<(), SessionError> {
        let image = Arc::new(image);
        self.inner.update(id, |session| {
            let state = session.page_mut(page).ok_or_else(|| missing_page(page))?;
            if !state.analyzed {
                return Err(SessionError::stage(
                    Some(page),
                    format!("page {page} must be analyzed before filling"),
                ));
            }
            if state.fields.as_deref() != Some(fields) {
                return Err(SessionError::stage(
                    Some(page),
                    format!("page {page} fields changed while filling; fill again"),
                ));
            }
            state.filled_image = Some(image);
            state.filled = true;
            Ok(())
        })
    }

    /// Records the assembled document, which makes the session ready.
    pub fn attach_final_document(&self, id: &SessionId, bytes: Vec<u8>) -> Result<(), SessionError> {
        let bytes = Arc::new(bytes);
        self.inner.update(id, |session| {
            if let Some(page) = session.next_page_to(Stage::Fill) {
                return Err(SessionError::stage(
                    Some(page),
                    "every page must be filled before assembly",
                ));
            }
            session.final_document = Some(bytes);
            Ok(())
        })
    }

    pub fn final_document(&self, id: &SessionId) -> Result<Option<Arc<Vec<u8>>>, SessionError> {
        self.inner.read(id, |session| session.final_document.clone())
    }

    /// Idempotent; returns whether a session was removed.
    pub fn delete(&self, id: &SessionId) -> bool {
        self.inner.remove(id)
    }

    pub fn sweep_expired(&self) -> usize {
        self.inner.sweep_expired()
    }

    /// Starts the periodic sweep; it stops once every handle is dropped.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        spawn_sweeper(&self.inner, interval)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
