mod common;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use common::{dark_fraction, encode_png, synthetic_form};
use formsight::document::{
    CollaboratorError, Detection, FieldDetector, FieldLabel, FieldLabeler, FormError,
    FormPipeline, LabelingOutcome, PdfAssembler, PdfError, PdfRasterizer, RasterizedPdf,
};
use formsight::geometry::GeometryCorrector;
use formsight::quality::{QualityAssessor, QualityIssue, QualityThresholds};
use formsight::render::{FieldValue, Renderer};
use formsight::session::{FieldBox, FieldKind, PdfMetadata, PdfSessionStore, SessionStore, Stage};
use formsight::utils::config::SessionConfig;
use formsight::utils::debug_dump::DebugDumper;
use formsight::utils::image_utils::blank_page;
use formsight::utils::lang_utils::LanguageDirection;
use image::RgbImage;

struct FixedDetector;

impl FieldDetector for FixedDetector {
    fn detect(&self, _image: &RgbImage) -> Result<Vec<Detection>, CollaboratorError> {
        // Deliberately out of reading order.
        Ok(vec![
            Detection::new(FieldBox::new(20, 200, 40, 40), FieldKind::Checkbox, 0.8),
            Detection::new(FieldBox::new(200, 20, 150, 30), FieldKind::Textbox, 0.9),
            Detection::new(FieldBox::new(20, 20, 150, 30), FieldKind::Textbox, 0.9),
        ])
    }
}

struct ScriptedLabeler {
    fail_labels: bool,
    fail_explain: AtomicBool,
}

impl ScriptedLabeler {
    fn working() -> Self {
        Self {
            fail_labels: false,
            fail_explain: AtomicBool::new(false),
        }
    }

    fn broken() -> Self {
        Self {
            fail_labels: true,
            fail_explain: AtomicBool::new(true),
        }
    }
}

impl FieldLabeler for ScriptedLabeler {
    fn label(
        &self,
        _annotated: &RgbImage,
        detections: &[Detection],
    ) -> Result<LabelingOutcome, CollaboratorError> {
        if self.fail_labels {
            return Err(CollaboratorError::failed("labeler", "no response"));
        }
        let names = ["الاسم", "العائلة", "موافق"];
        Ok(LabelingOutcome {
            labels: detections
                .iter()
                .zip(names)
                .enumerate()
                .map(|(i, (_, name))| FieldLabel {
                    index: i + 1,
                    label: name.to_string(),
                })
                .collect(),
            direction: None,
        })
    }

    fn explain(&self, _image: &RgbImage) -> Result<String, CollaboratorError> {
        if self.fail_explain.load(Ordering::SeqCst) {
            return Err(CollaboratorError::TimedOut {
                collaborator: "labeler",
            });
        }
        Ok("A registration form".to_string())
    }
}

struct FakeRasterizer {
    pages: usize,
}

impl PdfRasterizer for FakeRasterizer {
    fn rasterize(&self, _bytes: &[u8]) -> Result<RasterizedPdf, PdfError> {
        if self.pages == 0 {
            return Err(PdfError::Empty);
        }
        Ok(RasterizedPdf {
            pages: (0..self.pages).map(|_| blank_page(400, 560)).collect(),
            metadata: PdfMetadata {
                page_count: self.pages,
                title: Some("Registration".to_string()),
                author: None,
            },
        })
    }
}

struct CountingAssembler;

impl PdfAssembler for CountingAssembler {
    fn assemble(&self, pages: &[Arc<RgbImage>]) -> Result<Vec<u8>, PdfError> {
        Ok(format!("%PDF pages={}", pages.len()).into_bytes())
    }
}

fn pipeline(labeler: ScriptedLabeler) -> FormPipeline {
    let config = SessionConfig::default();
    FormPipeline::new(
        Arc::new(GeometryCorrector::default()),
        SessionStore::new(&config),
        PdfSessionStore::new(&config),
        Arc::new(FixedDetector),
        Arc::new(labeler),
    )
}

#[test]
fn test_single_image_flow() {
    let pipeline = pipeline(ScriptedLabeler::working());
    let form = synthetic_form(400, 560);

    let outcome = pipeline
        .ingest_image(&encode_png(&form), LanguageDirection::Ltr)
        .unwrap();
    assert!(outcome.quality.quality_good);
    assert_eq!(outcome.diagnostics.output_size, (400, 560));

    let id = outcome.session_id;
    assert_eq!(pipeline.explain_image(&id).unwrap(), "A registration form");

    let fields = pipeline.analyze_image(&id).unwrap();
    assert_eq!(fields.len(), 3);
    // Left to right on the first line, then the checkbox below.
    assert_eq!(fields[0].bounds.x, 20);
    assert_eq!(fields[0].label, "الاسم");
    assert_eq!(fields[2].kind, FieldKind::Checkbox);

    // Arabic labels switch the session to right-to-left.
    let session = pipeline.sessions().get(&id).unwrap();
    assert_eq!(session.language_direction, LanguageDirection::Rtl);
    assert!(session.analyzed);

    let values = HashMap::from([(fields[2].box_id.clone(), FieldValue::Checked(true))]);
    let filled = pipeline.fill_image(&id, &values, None).unwrap();
    assert_eq!(filled.dimensions(), (400, 560));
    assert!(dark_fraction(&filled, 20, 200, 40, 40, 128) > 0.05);
    assert!(pipeline.sessions().get(&id).unwrap().filled_image.is_some());
}

#[test]
fn test_undecodable_upload_creates_no_session() {
    let pipeline = pipeline(ScriptedLabeler::working());

    let err = pipeline
        .ingest_image(b"not an image", LanguageDirection::Rtl)
        .unwrap_err();
    assert!(matches!(err, FormError::Correction(_)));
    assert!(pipeline.sessions().is_empty());
}

#[test]
fn test_fill_before_analyze_is_rejected() {
    let pipeline = pipeline(ScriptedLabeler::working());
    let outcome = pipeline
        .ingest_image(&encode_png(&synthetic_form(400, 560)), LanguageDirection::Rtl)
        .unwrap();

    let err = pipeline
        .fill_image(&outcome.session_id, &HashMap::new(), None)
        .unwrap_err();
    assert!(err.as_session_error().is_some_and(|e| e.is_stage_violation()));
}

#[test]
fn test_labeler_failure_falls_back_to_placeholders() {
    let pipeline = pipeline(ScriptedLabeler::broken());
    let outcome = pipeline
        .ingest_image(&encode_png(&synthetic_form(400, 560)), LanguageDirection::Rtl)
        .unwrap();
    let id = outcome.session_id;

    assert!(matches!(
        pipeline.explain_image(&id),
        Err(FormError::Collaborator(_))
    ));
    assert!(pipeline.sessions().get(&id).unwrap().explanation.is_none());

    let fields = pipeline.analyze_image(&id).unwrap();
    assert_eq!(fields.len(), 3);
    assert_eq!(fields[0].label, "Field 1");
    assert_eq!(fields[0].box_id, "box_1");
    // Right to left: the field at x=200 comes first.
    assert_eq!(fields[0].bounds.x, 200);
}

#[test]
fn test_pdf_flow_reaches_ready() {
    let pipeline = pipeline(ScriptedLabeler::working());
    let id = pipeline
        .ingest_pdf(b"%PDF", "form.pdf", &FakeRasterizer { pages: 3 }, LanguageDirection::Rtl)
        .unwrap();

    for page in 1..=3 {
        pipeline.explain_page(&id, page).unwrap();
    }
    pipeline.analyze_page(&id, 1).unwrap();

    let progress = pipeline.pdf_sessions().progress(&id).unwrap();
    assert!(!progress.all_pages_analyzed);
    assert_eq!(progress.next_page_to_analyze, Some(2));

    // Page 2 cannot be filled yet.
    let err = pipeline
        .fill_page(&id, 2, &HashMap::new(), None)
        .unwrap_err();
    assert!(err.as_session_error().is_some_and(|e| e.is_stage_violation()));

    // Nor can the document be assembled.
    assert!(pipeline.assemble(&id, &CountingAssembler).is_err());

    for page in 2..=3 {
        pipeline.analyze_page(&id, page).unwrap();
    }
    for page in 1..=3 {
        let values = HashMap::from([("box_3".to_string(), FieldValue::Checked(true))]);
        pipeline.fill_page(&id, page, &values, None).unwrap();
    }

    let document = pipeline.assemble(&id, &CountingAssembler).unwrap();
    assert_eq!(document.as_slice(), b"%PDF pages=3");

    let progress = pipeline.pdf_sessions().progress(&id).unwrap();
    assert_eq!(progress.current_stage, Stage::Ready);
    assert_eq!(progress.metadata.title.as_deref(), Some("Registration"));
}

#[test]
fn test_failed_page_explanation_leaves_flag_unset() {
    let labeler = ScriptedLabeler::working();
    labeler.fail_explain.store(true, Ordering::SeqCst);
    let pipeline = pipeline(labeler);
    let id = pipeline
        .ingest_pdf(b"%PDF", "form.pdf", &FakeRasterizer { pages: 2 }, LanguageDirection::Rtl)
        .unwrap();

    assert!(pipeline.explain_page(&id, 1).is_err());

    let progress = pipeline.pdf_sessions().progress(&id).unwrap();
    assert!(!progress.pages[0].explained);
    assert_eq!(progress.next_page_to_explain, Some(1));
    assert_eq!(progress.current_stage, Stage::Explore);
}

#[test]
fn test_empty_pdf_is_rejected() {
    let pipeline = pipeline(ScriptedLabeler::working());
    let err = pipeline
        .ingest_pdf(b"%PDF", "empty.pdf", &FakeRasterizer { pages: 0 }, LanguageDirection::Rtl)
        .unwrap_err();

    assert!(matches!(err, FormError::Pdf(PdfError::Empty)));
    assert!(pipeline.pdf_sessions().is_empty());
}

#[test]
fn test_deleted_session_rejects_analysis() {
    let pipeline = pipeline(ScriptedLabeler::working());
    let id = pipeline
        .ingest_pdf(b"%PDF", "form.pdf", &FakeRasterizer { pages: 1 }, LanguageDirection::Rtl)
        .unwrap();

    assert!(pipeline.pdf_sessions().delete(&id));
    let err = pipeline.analyze_page(&id, 1).unwrap_err();
    assert!(err.as_session_error().is_some_and(|e| e.is_not_found()));
}

#[test]
fn test_debug_dumps_are_written_when_enabled() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(ScriptedLabeler::working()).with_dumper(DebugDumper::new(Some(dir.path())));

    let outcome = pipeline
        .ingest_image(&encode_png(&synthetic_form(400, 560)), LanguageDirection::Rtl)
        .unwrap();
    pipeline.analyze_image(&outcome.session_id).unwrap();

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    let session = outcome.session_id.to_string();
    assert!(names.iter().any(|n| n.ends_with(&format!("_{session}_corrected.png"))));
    assert!(names.iter().any(|n| n.ends_with(&format!("_{session}_annotated.png"))));
}

#[test]
fn test_poor_quality_still_opens_session() {
    let strict = QualityAssessor::new(QualityThresholds {
        min_sharpness: f64::MAX,
        ..QualityThresholds::default()
    });
    let pipeline = pipeline(ScriptedLabeler::working())
        .with_assessor(strict)
        .with_renderer(Renderer::default());

    let outcome = pipeline
        .ingest_image(&encode_png(&synthetic_form(400, 560)), LanguageDirection::Ltr)
        .unwrap();

    assert!(!outcome.quality.quality_good);
    assert_eq!(outcome.quality.issue, Some(QualityIssue::Blurry));
    assert!(!outcome.quality.message.is_empty());
    let session = pipeline.sessions().get(&outcome.session_id).unwrap();
    assert_eq!(session.quality, Some(outcome.quality));
}
