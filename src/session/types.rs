//! Session records and the per-page progress model.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::SessionError;
use crate::geometry::CorrectionDiagnostics;
use crate::quality::QualityVerdict;
use crate::utils::lang_utils::LanguageDirection;

/// Opaque session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub(crate) fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Textbox,
    Checkbox,
}

/// Axis-aligned box in corrected-image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FieldBox {
    #[must_use]
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Box cut down to lie inside a `width` x `height` image; `None` if
    /// nothing remains.
    #[must_use]
    pub fn clamped(&self, width: u32, height: u32) -> Option<Self> {
        if self.x >= width || self.y >= height {
            return None;
        }
        let w = self.width.min(width - self.x);
        let h = self.height.min(height - self.y);
        if w == 0 || h == 0 {
            return None;
        }
        Some(Self::new(self.x, self.y, w, h))
    }

    #[must_use]
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    #[must_use]
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

/// A labeled fillable region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UIField {
    pub box_id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    #[serde(rename = "box")]
    pub bounds: FieldBox,
}

/// Clamps boxes to the image, drops empty ones and rejects duplicate ids.
pub(crate) fn validate_fields(
    fields: Vec<UIField>,
    width: u32,
    height: u32,
    page: Option<usize>,
) -> Result<Vec<UIField>, SessionError> {
    let mut seen = HashSet::new();
    let mut valid = Vec::with_capacity(fields.len());

    for mut field in fields {
        if !seen.insert(field.box_id.clone()) {
            return Err(SessionError::InvalidFields {
                page,
                message: format!("duplicate box_id '{}'", field.box_id),
            });
        }
        if let Some(bounds) = field.bounds.clamped(width, height) {
            field.bounds = bounds;
            valid.push(field);
        }
    }

    Ok(valid)
}

/// Single-image session.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub corrected_image: Option<Arc<RgbImage>>,
    pub diagnostics: Option<CorrectionDiagnostics>,
    pub quality: Option<QualityVerdict>,
    pub language_direction: LanguageDirection,
    pub explanation: Option<String>,
    pub fields: Option<Vec<UIField>>,
    pub analyzed: bool,
    pub filled_image: Option<Arc<RgbImage>>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub(crate) fn new(id: SessionId, language_direction: LanguageDirection) -> Self {
        Self {
            id,
            corrected_image: None,
            diagnostics: None,
            quality: None,
            language_direction,
            explanation: None,
            fields: None,
            analyzed: false,
            filled_image: None,
            created_at: Utc::now(),
        }
    }
}

/// Named checkpoint of the multi-page workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Explore,
    Explain,
    Analyze,
    Fill,
    Ready,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfMetadata {
    pub page_count: usize,
    pub title: Option<String>,
    pub author: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PageState {
    /// 1-based.
    pub page_number: usize,
    pub image: Arc<RgbImage>,
    pub explained: bool,
    pub explanation: Option<String>,
    pub fields: Option<Vec<UIField>>,
    pub analyzed: bool,
    pub filled_image: Option<Arc<RgbImage>>,
    pub filled: bool,
}

impl PageState {
    pub(crate) fn new(page_number: usize, image: RgbImage) -> Self {
        Self {
            page_number,
            image: Arc::new(image),
            explained: false,
            explanation: None,
            fields: None,
            analyzed: false,
            filled_image: None,
            filled: false,
        }
    }

    fn reached(&self, stage: Stage) -> bool {
        match stage {
            Stage::Explore => true,
            Stage::Explain => self.explained,
            Stage::Analyze => self.analyzed,
            Stage::Fill | Stage::Ready => self.filled,
        }
    }
}

/// Multi-page workflow state.
#[derive(Debug, Clone)]
pub struct PdfSession {
    pub id: SessionId,
    pub filename: String,
    pub metadata: PdfMetadata,
    pub pages: Vec<PageState>,
    pub language_direction: LanguageDirection,
    pub final_document: Option<Arc<Vec<u8>>>,
    pub created_at: DateTime<Utc>,
}

impl PdfSession {
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    #[must_use]
    pub fn page(&self, page_number: usize) -> Option<&PageState> {
        page_number
            .checked_sub(1)
            .and_then(|index| self.pages.get(index))
    }

    pub(crate) fn page_mut(&mut self, page_number: usize) -> Option<&mut PageState> {
        page_number
            .checked_sub(1)
            .and_then(move |index| self.pages.get_mut(index))
    }

    #[must_use]
    pub fn has_next_page(&self, page_number: usize) -> bool {
        page_number < self.page_count()
    }

    #[must_use]
    pub fn next_page_number(&self, page_number: usize) -> Option<usize> {
        self.has_next_page(page_number).then_some(page_number + 1)
    }

    /// First page that has not yet completed `stage`.
    #[must_use]
    pub fn next_page_to(&self, stage: Stage) -> Option<usize> {
        self.pages
            .iter()
            .find(|p| !p.reached(stage))
            .map(|p| p.page_number)
    }

    #[must_use]
    pub fn all_pages_explained(&self) -> bool {
        !self.pages.is_empty() && self.pages.iter().all(|p| p.explained)
    }

    #[must_use]
    pub fn all_pages_analyzed(&self) -> bool {
        !self.pages.is_empty() && self.pages.iter().all(|p| p.analyzed)
    }

    #[must_use]
    pub fn all_pages_filled(&self) -> bool {
        !self.pages.is_empty() && self.pages.iter().all(|p| p.filled)
    }

    /// Aggregate stage, derived from the page flags on every call.
    #[must_use]
    pub fn current_stage(&self) -> Stage {
        let started = self.pages.iter().any(|p| p.explained || p.analyzed);
        if !started {
            Stage::Explore
        } else if !self.all_pages_explained() {
            Stage::Explain
        } else if !self.all_pages_analyzed() {
            Stage::Analyze
        } else if !self.all_pages_filled() || self.final_document.is_none() {
            Stage::Fill
        } else {
            Stage::Ready
        }
    }

    #[must_use]
    pub fn progress(&self) -> PdfProgress {
        PdfProgress {
            session_id: self.id,
            filename: self.filename.clone(),
            metadata: self.metadata.clone(),
            current_stage: self.current_stage(),
            all_pages_explained: self.all_pages_explained(),
            all_pages_analyzed: self.all_pages_analyzed(),
            all_pages_filled: self.all_pages_filled(),
            next_page_to_explain: self.next_page_to(Stage::Explain),
            next_page_to_analyze: self.next_page_to(Stage::Analyze),
            next_page_to_fill: self.next_page_to(Stage::Fill),
            ready: self.final_document.is_some(),
            pages: self
                .pages
                .iter()
                .map(|p| PageProgress {
                    page_number: p.page_number,
                    explained: p.explained,
                    analyzed: p.analyzed,
                    filled: p.filled,
                    field_count: p.fields.as_ref().map_or(0, Vec::len),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageProgress {
    pub page_number: usize,
    pub explained: bool,
    pub analyzed: bool,
    pub filled: bool,
    pub field_count: usize,
}

/// Serializable snapshot of a multi-page session's progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfProgress {
    pub session_id: SessionId,
    pub filename: String,
    pub metadata: PdfMetadata,
    pub current_stage: Stage,
    pub all_pages_explained: bool,
    pub all_pages_analyzed: bool,
    pub all_pages_filled: bool,
    pub next_page_to_explain: Option<usize>,
    pub next_page_to_analyze: Option<usize>,
    pub next_page_to_fill: Option<usize>,
    pub ready: bool,
    pub pages: Vec<PageProgress>,
}
