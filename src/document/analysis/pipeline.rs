use std::collections::HashMap;
use std::sync::Arc;

use image::RgbImage;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::document::collaborators::{FieldDetector, FieldLabeler};
use crate::document::error::FormError;
use crate::document::fields::{combine, reading_order, LabelingOutcome};
use crate::document::pdf::{PdfAssembler, PdfRasterizer};
use crate::geometry::{CorrectionDiagnostics, GeometryCorrector};
use crate::quality::{QualityAssessor, QualityVerdict};
use crate::render::{FieldValue, Renderer, Signature};
use crate::session::{PdfSessionStore, SessionError, SessionId, SessionStore, Stage, UIField};
use crate::utils::debug_dump::DebugDumper;
use crate::utils::lang_utils::{LangUtils, LanguageDirection};

/// Result of ingesting a single photographed page.
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub session_id: SessionId,
    pub diagnostics: CorrectionDiagnostics,
    pub quality: QualityVerdict,
}

/// Drives the single-image and PDF workflows against the session stores.
///
/// Every operation reads what it needs from a store, releases the lock while
/// the slow work runs, and writes back through one atomic update. A session
/// deleted in the meantime rejects the write with [`SessionError::NotFound`].
pub struct FormPipeline {
    corrector: Arc<GeometryCorrector>,
    assessor: QualityAssessor,
    sessions: SessionStore,
    pdf_sessions: PdfSessionStore,
    detector: Arc<dyn FieldDetector>,
    labeler: Arc<dyn FieldLabeler>,
    renderer: Renderer,
    dumper: DebugDumper,
}

impl FormPipeline {
    pub fn new(
        corrector: Arc<GeometryCorrector>,
        sessions: SessionStore,
        pdf_sessions: PdfSessionStore,
        detector: Arc<dyn FieldDetector>,
        labeler: Arc<dyn FieldLabeler>,
    ) -> Self {
        Self {
            corrector,
            assessor: QualityAssessor::default(),
            sessions,
            pdf_sessions,
            detector,
            labeler,
            renderer: Renderer::default(),
            dumper: DebugDumper::disabled(),
        }
    }

    #[must_use]
    pub fn with_renderer(mut self, renderer: Renderer) -> Self {
        self.renderer = renderer;
        self
    }

    #[must_use]
    pub fn with_assessor(mut self, assessor: QualityAssessor) -> Self {
        self.assessor = assessor;
        self
    }

    #[must_use]
    pub fn with_dumper(mut self, dumper: DebugDumper) -> Self {
        self.dumper = dumper;
        self
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn pdf_sessions(&self) -> &PdfSessionStore {
        &self.pdf_sessions
    }

    /// Corrects an uploaded photo, judges it and opens a session for it.
    /// Undecodable input fails without creating a session.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub fn ingest_image(
        &self,
        bytes: &[u8],
        direction: LanguageDirection,
    ) -> Result<IngestOutcome, FormError> {
        let (image, diagnostics) = self.corrector.correct_bytes(bytes)?;
        let quality = self.assessor.assess_localized(&image, direction);

        if !quality.quality_good {
            warn!(issue = ?quality.issue, "Corrected image failed quality checks");
        }

        let session_id = self.sessions.create_with_image(
            image.clone(),
            Some(diagnostics.clone()),
            Some(quality.clone()),
            direction,
        );
        self.dumper.dump(&session_id.to_string(), "corrected", &image);

        info!(%session_id, quality_good = quality.quality_good, "Ingested image");
        Ok(IngestOutcome {
            session_id,
            diagnostics,
            quality,
        })
    }

    #[instrument(skip(self), fields(session_id = %id))]
    pub fn explain_image(&self, id: &SessionId) -> Result<String, FormError> {
        let image = self.sessions.image(id)?;
        let explanation = self.labeler.explain(&image)?;
        self.sessions.set_explanation(id, explanation.clone())?;
        debug!(length = explanation.len(), "Stored explanation");
        Ok(explanation)
    }

    #[instrument(skip(self), fields(session_id = %id))]
    pub fn analyze_image(&self, id: &SessionId) -> Result<Vec<UIField>, FormError> {
        let image = self.sessions.image(id)?;
        let direction = self.sessions.get(id)?.language_direction;

        let (fields, detected) = self.extract_fields(&image, direction, &id.to_string())?;
        let fields = self.sessions.attach_fields(id, fields, detected)?;

        info!(field_count = fields.len(), "Analyzed image");
        Ok(fields)
    }

    #[instrument(skip(self, values, signature), fields(session_id = %id, value_count = values.len()))]
    pub fn fill_image(
        &self,
        id: &SessionId,
        values: &HashMap<String, FieldValue>,
        signature: Option<&Signature>,
    ) -> Result<Arc<RgbImage>, FormError> {
        let session = self.sessions.get(id)?;
        let (image, fields) = match (session.corrected_image, session.fields) {
            (Some(image), Some(fields)) if session.analyzed => (image, fields),
            _ => {
                return Err(SessionError::stage(None, "fields must be analyzed before filling").into());
            }
        };

        let filled = self
            .renderer
            .render(&image, &fields, values, session.language_direction, signature);
        self.dumper.dump(&id.to_string(), "filled", &filled);

        self.sessions.attach_filled(id, &fields, filled.clone())?;
        info!("Filled image");
        Ok(Arc::new(filled))
    }

    /// Rasterizes a PDF and opens a multi-page session over its pages.
    #[instrument(skip(self, bytes, rasterizer), fields(size = bytes.len()))]
    pub fn ingest_pdf(
        &self,
        bytes: &[u8],
        filename: &str,
        rasterizer: &dyn PdfRasterizer,
        direction: LanguageDirection,
    ) -> Result<SessionId, FormError> {
        let rasterized = rasterizer.rasterize(bytes)?;

        let pages: Vec<RgbImage> = rasterized
            .pages
            .into_iter()
            .map(|page| self.corrector.normalize_scale(page).0)
            .collect();

        let id = self
            .pdf_sessions
            .init(filename, pages, rasterized.metadata, direction)?;

        if self.dumper.is_enabled() {
            let session = id.to_string();
            for (i, image) in self.pdf_sessions.final_pages(&id)?.iter().enumerate() {
                self.dumper.dump(&session, &format!("page{}", i + 1), image);
            }
        }

        Ok(id)
    }

    /// Describes one page. A failed explanation leaves the page unexplained.
    #[instrument(skip(self), fields(session_id = %id))]
    pub fn explain_page(&self, id: &SessionId, page: usize) -> Result<String, FormError> {
        let image = self.pdf_sessions.page_image(id, page)?;
        let explanation = self.labeler.explain(&image)?;
        self.pdf_sessions
            .mark_explained(id, page, explanation.clone())?;
        debug!(length = explanation.len(), "Stored page explanation");
        Ok(explanation)
    }

    #[instrument(skip(self), fields(session_id = %id))]
    pub fn analyze_page(&self, id: &SessionId, page: usize) -> Result<Vec<UIField>, FormError> {
        let image = self.pdf_sessions.page_image(id, page)?;
        let direction = self.pdf_sessions.get(id)?.language_direction;

        let tag = format!("{id}_page{page}");
        let (fields, detected) = self.extract_fields(&image, direction, &tag)?;
        let fields = self.pdf_sessions.mark_analyzed(id, page, fields, detected)?;

        info!(field_count = fields.len(), "Analyzed page");
        Ok(fields)
    }

    #[instrument(skip(self, values, signature), fields(session_id = %id, value_count = values.len()))]
    pub fn fill_page(
        &self,
        id: &SessionId,
        page: usize,
        values: &HashMap<String, FieldValue>,
        signature: Option<&Signature>,
    ) -> Result<Arc<RgbImage>, FormError> {
        let session = self.pdf_sessions.get(id)?;
        let direction = session.language_direction;
        let state = session
            .page(page)
            .ok_or_else(|| SessionError::stage(Some(page), format!("page {page} must be rasterized first")))?;

        let fields = match (&state.fields, state.analyzed) {
            (Some(fields), true) => fields,
            _ => {
                return Err(SessionError::stage(
                    Some(page),
                    format!("page {page} must be analyzed before filling"),
                )
                .into());
            }
        };

        let filled = self
            .renderer
            .render(&state.image, fields, values, direction, signature);
        self.dumper
            .dump(&id.to_string(), &format!("page{page}_filled"), &filled);

        self.pdf_sessions.mark_filled(id, page, fields, filled.clone())?;
        info!(page, "Filled page");
        Ok(Arc::new(filled))
    }

    /// Builds the final document once every page is filled.
    #[instrument(skip(self, assembler), fields(session_id = %id))]
    pub fn assemble(
        &self,
        id: &SessionId,
        assembler: &dyn PdfAssembler,
    ) -> Result<Arc<Vec<u8>>, FormError> {
        if let Some(page) = self.pdf_sessions.get(id)?.next_page_to(Stage::Fill) {
            return Err(SessionError::stage(Some(page), "every page must be filled before assembly").into());
        }

        let pages = self.pdf_sessions.final_pages(id)?;
        let bytes = assembler.assemble(&pages)?;
        let size = bytes.len();
        self.pdf_sessions.attach_final_document(id, bytes)?;

        info!(size, "Final document ready");
        self.pdf_sessions
            .final_document(id)?
            .ok_or_else(|| SessionError::stage(None, "final document was not recorded").into())
    }

    /// Detects, orders, labels and combines fields for one image. Returns
    /// the fields and the direction the labeler reported or its labels
    /// imply.
    fn extract_fields(
        &self,
        image: &RgbImage,
        direction: LanguageDirection,
        dump_tag: &str,
    ) -> Result<(Vec<UIField>, Option<LanguageDirection>), FormError> {
        let detections = self.detector.detect(image)?;
        let detections = reading_order(detections, direction);
        debug!(detection_count = detections.len(), "Detected fields");

        let annotated = self.renderer.annotate(image, &detections);
        self.dumper.dump(dump_tag, "annotated", &annotated);

        let outcome = match self.labeler.label(&annotated, &detections) {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!(error = %e, "Labeling failed, using placeholder labels");
                None
            }
        };

        let detected = outcome.as_ref().and_then(labeled_direction);
        let fields = combine(&detections, outcome.as_ref());
        Ok((fields, detected))
    }
}

/// Direction reported by the labeler, else the one its labels are written in.
fn labeled_direction(outcome: &LabelingOutcome) -> Option<LanguageDirection> {
    outcome.direction.or_else(|| {
        let text: Vec<&str> = outcome.labels.iter().map(|l| l.label.as_str()).collect();
        LangUtils::detect_direction(&text.join(" "))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::fields::FieldLabel;

    #[test]
    fn test_labeled_direction_prefers_reported() {
        let outcome = LabelingOutcome {
            labels: vec![FieldLabel { index: 1, label: "الاسم".into() }],
            direction: Some(LanguageDirection::Ltr),
        };
        assert_eq!(labeled_direction(&outcome), Some(LanguageDirection::Ltr));
    }

    #[test]
    fn test_labeled_direction_from_label_text() {
        let outcome = LabelingOutcome {
            labels: vec![FieldLabel { index: 1, label: "الاسم".into() }],
            direction: None,
        };
        assert_eq!(labeled_direction(&outcome), Some(LanguageDirection::Rtl));
    }
}
