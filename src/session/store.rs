use std::sync::Arc;
use std::time::Duration;

use image::RgbImage;
use tokio::task::JoinHandle;

use super::error::SessionError;
use super::map::{spawn_sweeper, SessionMap};
use super::types::{validate_fields, Session, SessionId, UIField};
use crate::geometry::CorrectionDiagnostics;
use crate::quality::QualityVerdict;
use crate::utils::config::SessionConfig;
use crate::utils::lang_utils::LanguageDirection;

/// Handle to the single-image session map. Clones share the same map.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionMap<Session>>,
}

impl SessionStore {
    pub fn new(config: &SessionConfig) -> Self {
        Self::with_timeout(config.timeout())
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(SessionMap::new(timeout, "image")),
        }
    }

    /// Session awaiting its corrected image.
    pub fn create(&self, language_direction: LanguageDirection) -> SessionId {
        self.inner
            .insert_with(|id| Session::new(id, language_direction))
    }

    /// Session holding an already corrected image.
    pub fn create_with_image(
        &self,
        image: RgbImage,
        diagnostics: Option<CorrectionDiagnostics>,
        quality: Option<QualityVerdict>,
        language_direction: LanguageDirection,
    ) -> SessionId {
        let image = Arc::new(image);
        self.inner.insert_with(|id| {
            let mut session = Session::new(id, language_direction);
            session.corrected_image = Some(image);
            session.diagnostics = diagnostics;
            session.quality = quality;
            session
        })
    }

    pub fn get(&self, id: &SessionId) -> Result<Session, SessionError> {
        self.inner.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &SessionId) -> bool {
        self.inner.contains(id)
    }

    /// Stores a correction result. Replacing the image resets analysis.
    pub fn attach_correction(
        &self,
        id: &SessionId,
        image: RgbImage,
        diagnostics: CorrectionDiagnostics,
        quality: QualityVerdict,
    ) -> Result<(), SessionError> {
        let image = Arc::new(image);
        self.inner.update(id, |session| {
            session.corrected_image = Some(image);
            session.diagnostics = Some(diagnostics);
            session.quality = Some(quality);
            session.fields = None;
            session.analyzed = false;
            session.filled_image = None;
            Ok(())
        })
    }

    /// The corrected image, required before analysis.
    pub fn image(&self, id: &SessionId) -> Result<Arc<RgbImage>, SessionError> {
        self.inner
            .read(id, |session| session.corrected_image.clone())?
            .ok_or_else(|| SessionError::stage(None, "a corrected image must be stored before analysis"))
    }

    pub fn set_explanation(&self, id: &SessionId, explanation: String) -> Result<(), SessionError> {
        self.inner.update(id, |session| {
            session.explanation = Some(explanation);
            Ok(())
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

    /// Stores fields and marks the session analyzed in one step, adopting
    /// `direction` when one was detected.
    pub fn attach_fields(
        &self,
        id: &SessionId,
        fields: Vec<UIField>,
        direction: Option<LanguageDirection>,
    ) -> Result<Vec<UIField>, SessionError> {
        self.inner.update(id, |session| {
            let image = session
                .corrected_image
                .as_ref()
                .ok_or_else(|| SessionError::stage(None, "a corrected image must be stored before analysis"))?;
            let fields = validate_fields(fields, image.width(), image.height(), None)?;
            session.fields = Some(fields.clone());
            session.analyzed = true;
            if let Some(direction) = direction {
                session.language_direction = direction;
            }
            Ok(fields)
        })
    }

    /// Stores a filled rendering made from `fields`. Refused when the
    /// session's fields changed since they were read.
    pub fn attach_filled(
        &self,
        id: &SessionId,
        fields: &[UIField],
        image: RgbImage,
    ) -> Result<(), SessionError> {
        let image = Arc::new(image);
        self.inner.update(id, |session| {
            if !session.analyzed {
                return Err(SessionError::stage(None, "fields must be analyzed before filling"));
            }
            if session.fields.as_deref() != Some(fields) {
                return Err(SessionError::stage(
                    None,
                    "fields changed while filling; fill again with the current fields",
                ));
            }
            session.filled_image = Some(image);
            Ok(())
        })
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
