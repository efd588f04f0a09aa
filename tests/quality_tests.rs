mod common;

use common::synthetic_form;
use formsight::quality::{QualityAssessor, QualityIssue, QualityThresholds};
use formsight::utils::lang_utils::{LangUtils, LanguageDirection};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

#[test]
fn test_clean_form_passes() {
    let verdict = QualityAssessor::default().assess(&synthetic_form(400, 560));

    assert!(verdict.quality_good, "{verdict:?}");
    assert!(verdict.issue.is_none());
    assert!(verdict.metrics.ink_coverage > 0.05 && verdict.metrics.ink_coverage < 0.5);
}

#[test]
fn test_blank_page_has_no_text() {
    let blank = RgbImage::from_pixel(200, 200, Rgb([250, 250, 250]));
    let verdict = QualityAssessor::default().assess(&blank);

    assert!(!verdict.quality_good);
    assert_eq!(verdict.issue, Some(QualityIssue::NoText));
    assert_eq!(verdict.metrics.ink_coverage, 0.0);
    assert!(!verdict.message.is_empty());
}

#[test]
fn test_textured_blank_page_has_no_text() {
    // Paper grain: neighbouring pixels alternate between two light shades.
    let grain = RgbImage::from_fn(300, 300, |x, y| {
        if (x + y) % 2 == 0 {
            Rgb([240, 240, 240])
        } else {
            Rgb([250, 250, 250])
        }
    });
    let verdict = QualityAssessor::default().assess(&grain);

    assert_eq!(verdict.issue, Some(QualityIssue::NoText), "{verdict:?}");
    assert!(verdict.metrics.ink_coverage < 0.005);
}

#[test]
fn test_shaded_blank_page_has_no_text() {
    // Uneven lighting: a smooth ramp from grey to near white.
    let ramp = RgbImage::from_fn(300, 300, |x, _| {
        let v = 140 + (x * 110 / 299) as u8;
        Rgb([v, v, v])
    });
    let verdict = QualityAssessor::default().assess(&ramp);

    assert_eq!(verdict.issue, Some(QualityIssue::NoText), "{verdict:?}");
    assert!(verdict.metrics.ink_coverage < 0.005);
}

#[test]
fn test_form_on_shaded_paper_keeps_its_ink() {
    let mut form = synthetic_form(400, 560);
    for (x, _, pixel) in form.enumerate_pixels_mut() {
        let shade = (x * 60 / 399) as u8;
        for c in pixel.0.iter_mut() {
            *c = c.saturating_sub(shade);
        }
    }
    let verdict = QualityAssessor::default().assess(&form);

    assert!(verdict.metrics.ink_coverage > 0.05, "{verdict:?}");
    assert_ne!(verdict.issue, Some(QualityIssue::NoText));
}

#[test]
fn test_dark_photo_reported() {
    let mut dark = synthetic_form(400, 560);
    for pixel in dark.pixels_mut() {
        for c in pixel.0.iter_mut() {
            *c /= 8;
        }
    }
    let verdict = QualityAssessor::default().assess(&dark);

    assert!(!verdict.quality_good);
    assert_eq!(verdict.issue, Some(QualityIssue::TooDark));
}

#[test]
fn test_blurry_photo_reported() {
    let form = synthetic_form(400, 560);
    // Shrinking and blowing back up smears every edge.
    let small = imageops::resize(&form, 40, 56, FilterType::Triangle);
    let blurry = imageops::resize(&small, 400, 560, FilterType::Triangle);

    let assessor = QualityAssessor::default();
    let sharp = assessor.measure(&form);
    let soft = assessor.measure(&blurry);
    assert!(soft.sharpness < sharp.sharpness);

    let strict = QualityAssessor::new(QualityThresholds {
        min_sharpness: (sharp.sharpness + soft.sharpness) / 2.0,
        ..QualityThresholds::default()
    });
    assert!(strict.assess(&form).quality_good);
    let verdict = strict.assess(&blurry);
    assert!(!verdict.quality_good);
    assert_eq!(verdict.issue, Some(QualityIssue::Blurry));
}

#[test]
fn test_tiny_image_is_unreadable() {
    let verdict = QualityAssessor::default().assess(&RgbImage::new(2, 2));
    assert_eq!(verdict.issue, Some(QualityIssue::Unreadable));
    assert!(!verdict.quality_good);
}

#[test]
fn test_message_follows_form_language() {
    let blank = RgbImage::from_pixel(200, 200, Rgb([250, 250, 250]));
    let assessor = QualityAssessor::default();

    let arabic = assessor.assess_localized(&blank, LanguageDirection::Rtl);
    let english = assessor.assess_localized(&blank, LanguageDirection::Ltr);

    assert_eq!(arabic.issue, english.issue);
    assert!(LangUtils::contains_arabic(&arabic.message));
    assert!(!LangUtils::contains_arabic(&english.message));
}
