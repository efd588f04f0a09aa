mod common;

use std::collections::HashMap;

use common::dark_fraction;
use formsight::document::Detection;
use formsight::render::{draw_check_mark, FieldValue, MarkStyle, RenderError, Renderer, Signature};
use formsight::session::{FieldBox, FieldKind, UIField};
use formsight::utils::image_utils::blank_page;
use formsight::utils::lang_utils::LanguageDirection;
use image::{Rgb, Rgba, RgbaImage};

fn checkbox(id: &str, bounds: FieldBox) -> UIField {
    UIField {
        box_id: id.to_string(),
        label: "Agree".to_string(),
        kind: FieldKind::Checkbox,
        bounds,
    }
}

fn textbox(id: &str, bounds: FieldBox) -> UIField {
    UIField {
        box_id: id.to_string(),
        label: "Name".to_string(),
        kind: FieldKind::Textbox,
        bounds,
    }
}

#[test]
fn test_checkbox_without_glyph_gets_stroke_mark() {
    let page = blank_page(300, 200);
    let bounds = FieldBox::new(100, 60, 40, 40);
    let fields = vec![checkbox("box_1", bounds)];
    let values = HashMap::from([("box_1".to_string(), FieldValue::Checked(true))]);

    let rendered = Renderer::default().render(&page, &fields, &values, LanguageDirection::Rtl, None);

    assert_eq!(rendered.dimensions(), page.dimensions());
    assert!(dark_fraction(&rendered, 100, 60, 40, 40, 128) > 0.05);
    // Nothing leaks outside the box.
    assert_eq!(dark_fraction(&rendered, 0, 0, 300, 55, 128), 0.0);
    assert_eq!(dark_fraction(&rendered, 0, 105, 300, 95, 128), 0.0);
    assert_eq!(dark_fraction(&rendered, 0, 0, 95, 200, 128), 0.0);
    assert_eq!(dark_fraction(&rendered, 145, 0, 155, 200, 128), 0.0);
}

#[test]
fn test_draw_check_mark_reports_fallback() {
    let mut page = blank_page(50, 50);
    let style = draw_check_mark(&mut page, FieldBox::new(5, 5, 40, 40), None, Rgb([0, 0, 0]));
    assert_eq!(style, MarkStyle::Strokes);
}

#[test]
fn test_unchecked_and_unknown_values_leave_page_alone() {
    let page = blank_page(200, 100);
    let fields = vec![checkbox("box_1", FieldBox::new(10, 10, 30, 30))];
    let values = HashMap::from([
        ("box_1".to_string(), FieldValue::Text("no".to_string())),
        ("box_9".to_string(), FieldValue::Checked(true)),
    ]);

    let rendered = Renderer::default().render(&page, &fields, &values, LanguageDirection::Ltr, None);
    assert_eq!(rendered, page);
}

#[test]
fn test_text_without_font_is_skipped() {
    let page = blank_page(200, 100);
    let fields = vec![textbox("box_1", FieldBox::new(10, 10, 150, 30))];
    let values = HashMap::from([("box_1".to_string(), FieldValue::Text("محمد".to_string()))]);

    let rendered = Renderer::default().render(&page, &fields, &values, LanguageDirection::Rtl, None);
    assert_eq!(rendered, page);
}

#[test]
fn test_signature_is_blended_into_its_box() {
    let page = blank_page(300, 200);
    let bounds = FieldBox::new(50, 50, 100, 50);
    let fields = vec![textbox("box_2", bounds)];

    let mut ink = RgbaImage::from_pixel(40, 20, Rgba([0, 0, 200, 255]));
    for x in 0..10 {
        ink.put_pixel(x, 0, Rgba([0, 0, 0, 0]));
    }
    let signature = Signature {
        box_id: "box_2".to_string(),
        image: ink,
    };

    let rendered = Renderer::default().render(
        &page,
        &fields,
        &HashMap::new(),
        LanguageDirection::Ltr,
        Some(&signature),
    );

    assert_eq!(rendered.dimensions(), page.dimensions());
    let center = rendered.get_pixel(100, 75);
    assert!(center.0[2] > 150 && center.0[0] < 60, "{center:?}");
    assert_eq!(rendered.get_pixel(10, 10), &Rgb([255, 255, 255]));
}

#[test]
fn test_fields_past_edge_are_clamped() {
    let page = blank_page(120, 80);
    let fields = vec![checkbox("box_1", FieldBox::new(100, 60, 40, 40))];
    let values = HashMap::from([("box_1".to_string(), FieldValue::Checked(true))]);

    let rendered = Renderer::default().render(&page, &fields, &values, LanguageDirection::Ltr, None);
    assert_eq!(rendered.dimensions(), (120, 80));
}

#[test]
fn test_annotate_tints_detections() {
    let page = blank_page(200, 100);
    let detections = vec![
        Detection::new(FieldBox::new(10, 10, 40, 20), FieldKind::Textbox, 0.9),
        Detection::new(FieldBox::new(100, 50, 20, 20), FieldKind::Checkbox, 0.8),
    ];

    let annotated = Renderer::default().annotate(&page, &detections);

    assert_ne!(annotated.get_pixel(30, 20), &Rgb([255, 255, 255]));
    assert_ne!(annotated.get_pixel(110, 60), &Rgb([255, 255, 255]));
    assert_eq!(annotated.get_pixel(80, 20), &Rgb([255, 255, 255]));
}

#[test]
fn test_field_values_deserialize() {
    let values: HashMap<String, FieldValue> =
        serde_json::from_str(r#"{"box_1": true, "box_2": "Jane", "box_3": "yes"}"#).unwrap();

    assert_eq!(values["box_1"], FieldValue::Checked(true));
    assert_eq!(values["box_2"], FieldValue::Text("Jane".to_string()));
    assert!(values["box_3"].is_truthy());
    assert!(!values["box_2"].is_truthy());
}

#[test]
fn test_font_loading_errors() {
    let missing = std::path::Path::new("/nonexistent/font.ttf");
    assert!(matches!(
        Renderer::from_font_files(Some(missing), None),
        Err(RenderError::FontRead { .. })
    ));

    let mut not_a_font = tempfile::NamedTempFile::new().unwrap();
    std::io::Write::write_all(&mut not_a_font, b"definitely not a font").unwrap();
    assert!(matches!(
        Renderer::from_font_files(None, Some(not_a_font.path())),
        Err(RenderError::InvalidFont { .. })
    ));

    assert!(Renderer::from_font_files(None, None).is_ok());
}
