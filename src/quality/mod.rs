//! Post-correction image quality verdicts.
//!
//! Three checks feed the verdict: sharpness (variance of the Laplacian
//! response), ink coverage (share of pixels clearly darker than the paper
//! around them) and exposure (mean and spread of luminance). Each failing
//! check gets a severity normalized to its threshold; the most severe one
//! names the message. A page without ink is reported as such unless it is
//! too dark to tell, since a blank sheet fails contrast and sharpness too.

use image::{GrayImage, RgbImage};
use imageproc::filter::laplacian_filter;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::utils::image_utils::{local_ink_mask, to_gray};
use crate::utils::lang_utils::LanguageDirection;

/// Thresholds for the quality checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    pub min_sharpness: f64,
    pub min_ink_coverage: f64,
    pub max_ink_coverage: f64,
    pub min_brightness: f64,
    pub max_brightness: f64,
    pub min_contrast: f64,
}

/// Window radius for the paper level each ink pixel is compared against.
const INK_WINDOW_RADIUS: u32 = 15;
/// How much darker than the surrounding paper a pixel must be to count as ink.
const MIN_INK_DEPTH: u8 = 30;

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_sharpness: 100.0,
            min_ink_coverage: 0.005,
            max_ink_coverage: 0.5,
            min_brightness: 60.0,
            max_brightness: 235.0,
            min_contrast: 20.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityIssue {
    Blurry,
    TooDark,
    TooBright,
    LowContrast,
    NoText,
    Cluttered,
    Unreadable,
}

impl QualityIssue {
    #[must_use]
    pub fn message(self, direction: LanguageDirection) -> &'static str {
        match (self, direction) {
            (Self::Blurry, LanguageDirection::Ltr) => {
                "The image is blurry. Hold the camera steady and retake the photo."
            }
            (Self::TooDark, LanguageDirection::Ltr) => {
                "The image is too dark. Retake the photo in better lighting."
            }
            (Self::TooBright, LanguageDirection::Ltr) => {
                "The image is overexposed. Avoid direct light or glare and retake the photo."
            }
            (Self::LowContrast, LanguageDirection::Ltr) => {
                "The image looks washed out. Make sure the document fills the frame and retake the photo."
            }
            (Self::NoText, LanguageDirection::Ltr) => {
                "No readable text was found. Make sure the whole document is in the frame."
            }
            (Self::Cluttered, LanguageDirection::Ltr) => {
                "The document is hard to separate from its background. Place it on a plain surface and retake the photo."
            }
            (Self::Unreadable, LanguageDirection::Ltr) => {
                "The image could not be assessed. Please retake the photo."
            }
            (Self::Blurry, LanguageDirection::Rtl) => {
                "الصورة غير واضحة. ثبّت الكاميرا وأعد التقاط الصورة."
            }
            (Self::TooDark, LanguageDirection::Rtl) => {
                "الصورة مظلمة جداً. أعد التقاط الصورة في إضاءة أفضل."
            }
            (Self::TooBright, LanguageDirection::Rtl) => {
                "الصورة شديدة السطوع. تجنب الضوء المباشر أو الانعكاس وأعد التقاط الصورة."
            }
            (Self::LowContrast, LanguageDirection::Rtl) => {
                "الصورة باهتة. تأكد من أن المستند يملأ الإطار وأعد التقاط الصورة."
            }
            (Self::NoText, LanguageDirection::Rtl) => {
                "لم يتم العثور على نص مقروء. تأكد من ظهور المستند بالكامل داخل الإطار."
            }
            (Self::Cluttered, LanguageDirection::Rtl) => {
                "يصعب تمييز المستند عن الخلفية. ضعه على سطح بسيط وأعد التقاط الصورة."
            }
            (Self::Unreadable, LanguageDirection::Rtl) => {
                "تعذر تقييم الصورة. يرجى إعادة التقاط الصورة."
            }
        }
    }
}

/// Raw measurements behind a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub sharpness: f64,
    pub ink_coverage: f64,
    pub brightness: f64,
    pub contrast: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityVerdict {
    pub quality_good: bool,
    pub message: String,
    pub issue: Option<QualityIssue>,
    pub metrics: QualityMetrics,
}

#[derive(Debug, Clone, Default)]
pub struct QualityAssessor {
    thresholds: QualityThresholds,
}

fn mean_and_std(gray: &GrayImage) -> (f64, f64) {
    let n = (gray.width() as f64) * (gray.height() as f64);
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for p in gray.pixels() {
        let v = p.0[0] as f64;
        sum += v;
        sum_sq += v * v;
    }
    let mean = sum / n;
    (mean, (sum_sq / n - mean * mean).max(0.0).sqrt())
}

fn laplacian_variance(gray: &GrayImage) -> f64 {
    let response = laplacian_filter(gray);
    let n = (response.width() as f64) * (response.height() as f64);
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for p in response.pixels() {
        let v = p.0[0] as f64;
        sum += v;
        sum_sq += v * v;
    }
    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0)
}

impl QualityAssessor {
    pub fn new(thresholds: QualityThresholds) -> Self {
        Self { thresholds }
    }

    /// Measures an image without judging it.
    #[must_use]
    pub fn measure(&self, image: &RgbImage) -> QualityMetrics {
        let gray = to_gray(image);
        let (brightness, contrast) = mean_and_std(&gray);
        let mask = local_ink_mask(&gray, INK_WINDOW_RADIUS, MIN_INK_DEPTH);
        let ink = mask.pixels().filter(|p| p.0[0] > 0).count() as f64;
        let total = (gray.width() as f64) * (gray.height() as f64);

        QualityMetrics {
            sharpness: laplacian_variance(&gray),
            ink_coverage: ink / total,
            brightness,
            contrast,
        }
    }

    /// Most severe failing check, if any. Severity is how far past its
    /// threshold a metric lies, relative to the threshold. Missing ink
    /// outranks everything but darkness.
    fn dominant_issue(&self, m: &QualityMetrics) -> Option<QualityIssue> {
        let t = &self.thresholds;
        if m.ink_coverage < t.min_ink_coverage && m.brightness >= t.min_brightness {
            return Some(QualityIssue::NoText);
        }
        let mut issues: Vec<(f64, QualityIssue)> = Vec::new();

        if m.brightness < t.min_brightness {
            issues.push(((t.min_brightness - m.brightness) / t.min_brightness, QualityIssue::TooDark));
        }
        if m.brightness > t.max_brightness {
            issues.push((
                (m.brightness - t.max_brightness) / (255.0 - t.max_brightness).max(1.0),
                QualityIssue::TooBright,
            ));
        }
        if m.contrast < t.min_contrast {
            issues.push(((t.min_contrast - m.contrast) / t.min_contrast, QualityIssue::LowContrast));
        }
        if m.sharpness < t.min_sharpness {
            issues.push(((t.min_sharpness - m.sharpness) / t.min_sharpness, QualityIssue::Blurry));
        }
        if m.ink_coverage < t.min_ink_coverage {
            issues.push((
                (t.min_ink_coverage - m.ink_coverage) / t.min_ink_coverage,
                QualityIssue::NoText,
            ));
        }
        if m.ink_coverage > t.max_ink_coverage {
            issues.push((
                (m.ink_coverage - t.max_ink_coverage) / (1.0 - t.max_ink_coverage).max(f64::EPSILON),
                QualityIssue::Cluttered,
            ));
        }

        // Ties go to the earlier check.
        issues
            .into_iter()
            .fold(None, |best: Option<(f64, QualityIssue)>, current| match best {
                Some(b) if b.0 >= current.0 => Some(b),
                _ => Some(current),
            })
            .map(|(_, issue)| issue)
    }

    /// Verdict with an English message.
    #[must_use]
    pub fn assess(&self, image: &RgbImage) -> QualityVerdict {
        self.assess_localized(image, LanguageDirection::Ltr)
    }

    /// Verdict with the message in the form's language.
    #[must_use]
    pub fn assess_localized(&self, image: &RgbImage, direction: LanguageDirection) -> QualityVerdict {
        if image.width() < 3 || image.height() < 3 {
            return QualityVerdict {
                quality_good: false,
                message: QualityIssue::Unreadable.message(direction).to_string(),
                issue: Some(QualityIssue::Unreadable),
                metrics: QualityMetrics::default(),
            };
        }

        let metrics = self.measure(image);
        let issue = self.dominant_issue(&metrics);
        debug!(?metrics, ?issue, "Assessed image quality");

        match issue {
            None => QualityVerdict {
                quality_good: true,
                message: match direction {
                    LanguageDirection::Ltr => "Image quality is good.".to_string(),
                    LanguageDirection::Rtl => "جودة الصورة جيدة.".to_string(),
                },
                issue: None,
                metrics,
            },
            Some(issue) => QualityVerdict {
                quality_good: false,
                message: issue.message(direction).to_string(),
                issue: Some(issue),
                metrics,
            },
        }
    }
}
