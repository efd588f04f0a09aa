//! Raw detections, reading order and their conversion into [`UIField`]s.

use serde::{Deserialize, Serialize};

use crate::session::{FieldBox, FieldKind, UIField};
use crate::utils::lang_utils::LanguageDirection;

/// An unlabeled region reported by a field detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bounds: FieldBox,
    pub kind: FieldKind,
    pub score: f32,
}

impl Detection {
    #[must_use]
    pub fn new(bounds: FieldBox, kind: FieldKind, score: f32) -> Self {
        Self {
            bounds,
            kind,
            score,
        }
    }

    /// Builds a detection from a detector class name. Classes naming text or
    /// lines are text boxes; everything else is a checkbox.
    #[must_use]
    pub fn from_class(bounds: FieldBox, class_name: &str, score: f32) -> Self {
        let class = class_name.to_lowercase();
        let kind = if class.contains("text") || class.contains("line") {
            FieldKind::Textbox
        } else {
            FieldKind::Checkbox
        };
        Self::new(bounds, kind, score)
    }

    fn center_y(&self) -> f32 {
        self.bounds.y as f32 + self.bounds.height as f32 / 2.0
    }
}

/// A label returned for the detection numbered `index` (1-based).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldLabel {
    pub index: usize,
    pub label: String,
}

/// What a labeler returned for a page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelingOutcome {
    pub labels: Vec<FieldLabel>,
    pub direction: Option<LanguageDirection>,
}

/// Sorts detections into reading order.
///
/// Detections are grouped into lines top to bottom: one joins the current
/// line while its vertical center is within a quarter of the combined
/// heights of the line's first detection. Lines read right to left for rtl
/// forms and left to right otherwise.
#[must_use]
pub fn reading_order(mut detections: Vec<Detection>, direction: LanguageDirection) -> Vec<Detection> {
    detections.sort_by(|a, b| a.center_y().total_cmp(&b.center_y()).then(a.bounds.x.cmp(&b.bounds.x)));

    let mut lines: Vec<Vec<Detection>> = Vec::new();
    for detection in detections {
        let joins = lines.last().and_then(|line| line.first()).is_some_and(|anchor| {
            let tolerance = (anchor.bounds.height + detection.bounds.height) as f32 / 4.0;
            (detection.center_y() - anchor.center_y()).abs() < tolerance
        });
        match lines.last_mut() {
            Some(line) if joins => line.push(detection),
            _ => lines.push(vec![detection]),
        }
    }

    for line in &mut lines {
        if direction.is_rtl() {
            line.sort_by(|a, b| b.bounds.right().cmp(&a.bounds.right()));
        } else {
            line.sort_by(|a, b| a.bounds.x.cmp(&b.bounds.x));
        }
    }

    lines.into_iter().flatten().collect()
}

/// Joins ordered detections with labeler output.
///
/// With labels, only labeled detections become fields, in label order and
/// without repeats. Without any labels every detection becomes a field with
/// a placeholder label. Ids are `box_{n}` after the detection's number.
#[must_use]
pub fn combine(detections: &[Detection], outcome: Option<&LabelingOutcome>) -> Vec<UIField> {
    let labels = outcome.map(|o| o.labels.as_slice()).unwrap_or_default();

    if labels.is_empty() {
        return detections
            .iter()
            .enumerate()
            .map(|(i, d)| UIField {
                box_id: format!("box_{}", i + 1),
                label: format!("Field {}", i + 1),
                kind: d.kind,
                bounds: d.bounds,
            })
            .collect();
    }

    let mut used = vec![false; detections.len()];
    let mut fields = Vec::with_capacity(labels.len());
    for FieldLabel { index, label } in labels {
        let Some(slot) = index.checked_sub(1).filter(|&i| i < detections.len()) else {
            continue;
        };
        if used[slot] || label.trim().is_empty() {
            continue;
        }
        used[slot] = true;
        let detection = &detections[slot];
        fields.push(UIField {
            box_id: format!("box_{index}"),
            label: label.trim().to_string(),
            kind: detection.kind,
            bounds: detection.bounds,
        });
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x: u32, y: u32) -> Detection {
        Detection::new(FieldBox::new(x, y, 40, 20), FieldKind::Textbox, 0.9)
    }

    #[test]
    fn test_from_class_maps_kind() {
        let b = FieldBox::new(0, 0, 1, 1);
        assert_eq!(Detection::from_class(b, "TextBox", 1.0).kind, FieldKind::Textbox);
        assert_eq!(Detection::from_class(b, "underline", 1.0).kind, FieldKind::Textbox);
        assert_eq!(Detection::from_class(b, "checkbox", 1.0).kind, FieldKind::Checkbox);
    }

    #[test]
    fn test_reading_order_ltr_and_rtl() {
        let detections = vec![det(200, 103), det(10, 100), det(100, 40)];

        let ltr = reading_order(detections.clone(), LanguageDirection::Ltr);
        let xs: Vec<u32> = ltr.iter().map(|d| d.bounds.x).collect();
        assert_eq!(xs, vec![100, 10, 200]);

        let rtl = reading_order(detections, LanguageDirection::Rtl);
        let xs: Vec<u32> = rtl.iter().map(|d| d.bounds.x).collect();
        assert_eq!(xs, vec![100, 200, 10]);
    }

    #[test]
    fn test_combine_with_labels() {
        let detections = vec![det(0, 0), det(50, 0), det(100, 0)];
        let outcome = LabelingOutcome {
            labels: vec![
                FieldLabel { index: 3, label: "Date".into() },
                FieldLabel { index: 1, label: " Name ".into() },
                FieldLabel { index: 1, label: "Again".into() },
                FieldLabel { index: 9, label: "Missing".into() },
            ],
            direction: None,
        };
        let fields = combine(&detections, Some(&outcome));
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].box_id, "box_3");
        assert_eq!(fields[1].label, "Name");
    }

    #[test]
    fn test_combine_placeholders() {
        let fields = combine(&[det(0, 0), det(50, 0)], None);
        assert_eq!(fields[1].box_id, "box_2");
        assert_eq!(fields[1].label, "Field 2");
    }
}
