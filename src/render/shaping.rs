//! Arabic contextual shaping and visual reordering.
//!
//! Fonts drawn through `ab_glyph` get no OpenType shaping, so Arabic letters
//! are mapped to their presentation forms (isolated, final, initial,
//! medial) here, lam-alef pairs become ligatures, and the result is
//! reordered into visual order with `unicode-bidi`.

use unicode_bidi::{BidiInfo, Level};

use crate::utils::lang_utils::{LangUtils, LanguageDirection};

/// Presentation forms as `[isolated, final, initial, medial]`; letters that
/// only join to the preceding letter have zero initial and medial forms.
const FORMS: &[(char, [u32; 4])] = &[
    ('\u{0621}', [0xFE80, 0, 0, 0]),
    ('\u{0622}', [0xFE81, 0xFE82, 0, 0]),
    ('\u{0623}', [0xFE83, 0xFE84, 0, 0]),
    ('\u{0624}', [0xFE85, 0xFE86, 0, 0]),
    ('\u{0625}', [0xFE87, 0xFE88, 0, 0]),
    ('\u{0626}', [0xFE89, 0xFE8A, 0xFE8B, 0xFE8C]),
    ('\u{0627}', [0xFE8D, 0xFE8E, 0, 0]),
    ('\u{0628}', [0xFE8F, 0xFE90, 0xFE91, 0xFE92]),
    ('\u{0629}', [0xFE93, 0xFE94, 0, 0]),
    ('\u{062A}', [0xFE95, 0xFE96, 0xFE97, 0xFE98]),
    ('\u{062B}', [0xFE99, 0xFE9A, 0xFE9B, 0xFE9C]),
    ('\u{062C}', [0xFE9D, 0xFE9E, 0xFE9F, 0xFEA0]),
    ('\u{062D}', [0xFEA1, 0xFEA2, 0xFEA3, 0xFEA4]),
    ('\u{062E}', [0xFEA5, 0xFEA6, 0xFEA7, 0xFEA8]),
    ('\u{062F}', [0xFEA9, 0xFEAA, 0, 0]),
    ('\u{0630}', [0xFEAB, 0xFEAC, 0, 0]),
    ('\u{0631}', [0xFEAD, 0xFEAE, 0, 0]),
    ('\u{0632}', [0xFEAF, 0xFEB0, 0, 0]),
    ('\u{0633}', [0xFEB1, 0xFEB2, 0xFEB3, 0xFEB4]),
    ('\u{0634}', [0xFEB5, 0xFEB6, 0xFEB7, 0xFEB8]),
    ('\u{0635}', [0xFEB9, 0xFEBA, 0xFEBB, 0xFEBC]),
    ('\u{0636}', [0xFEBD, 0xFEBE, 0xFEBF, 0xFEC0]),
    ('\u{0637}', [0xFEC1, 0xFEC2, 0xFEC3, 0xFEC4]),
    ('\u{0638}', [0xFEC5, 0xFEC6, 0xFEC7, 0xFEC8]),
    ('\u{0639}', [0xFEC9, 0xFECA, 0xFECB, 0xFECC]),
    ('\u{063A}', [0xFECD, 0xFECE, 0xFECF, 0xFED0]),
    ('\u{0641}', [0xFED1, 0xFED2, 0xFED3, 0xFED4]),
    ('\u{0642}', [0xFED5, 0xFED6, 0xFED7, 0xFED8]),
    ('\u{0643}', [0xFED9, 0xFEDA, 0xFEDB, 0xFEDC]),
    ('\u{0644}', [0xFEDD, 0xFEDE, 0xFEDF, 0xFEE0]),
    ('\u{0645}', [0xFEE1, 0xFEE2, 0xFEE3, 0xFEE4]),
    ('\u{0646}', [0xFEE5, 0xFEE6, 0xFEE7, 0xFEE8]),
    ('\u{0647}', [0xFEE9, 0xFEEA, 0xFEEB, 0xFEEC]),
    ('\u{0648}', [0xFEED, 0xFEEE, 0, 0]),
    ('\u{0649}', [0xFEEF, 0xFEF0, 0, 0]),
    ('\u{064A}', [0xFEF1, 0xFEF2, 0xFEF3, 0xFEF4]),
];

/// Lam followed by an alef variant: `[isolated, final]` ligature forms.
const LAM_ALEF: &[(char, [u32; 2])] = &[
    ('\u{0622}', [0xFEF5, 0xFEF6]),
    ('\u{0623}', [0xFEF7, 0xFEF8]),
    ('\u{0625}', [0xFEF9, 0xFEFA]),
    ('\u{0627}', [0xFEFB, 0xFEFC]),
];

const LAM: char = '\u{0644}';
const TATWEEL: char = '\u{0640}';

fn forms(c: char) -> Option<[u32; 4]> {
    FORMS.iter().find(|(k, _)| *k == c).map(|(_, f)| *f)
}

/// Harakat and other marks that do not break joining.
fn is_transparent(c: char) -> bool {
    matches!(c as u32, 0x064B..=0x065F | 0x0670 | 0x06D6..=0x06ED)
}

/// Can join to the following letter.
fn joins_forward(c: char) -> bool {
    c == TATWEEL || forms(c).is_some_and(|f| f[2] != 0)
}

/// Can join to the preceding letter.
fn joins_backward(c: char) -> bool {
    c == TATWEEL || forms(c).is_some_and(|f| f[1] != 0)
}

fn to_char(code: u32, fallback: char) -> char {
    char::from_u32(code).unwrap_or(fallback)
}

/// Replaces Arabic letters with contextual presentation forms, keeping
/// logical order.
#[must_use]
pub fn shape_arabic(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());

    let neighbor = |from: usize, step: isize| -> Option<char> {
        let mut i = from as isize + step;
        while i >= 0 && (i as usize) < chars.len() {
            let c = chars[i as usize];
            if !is_transparent(c) {
                return Some(c);
            }
            i += step;
        }
        None
    };

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let Some(f) = forms(c) else {
            out.push(c);
            i += 1;
            continue;
        };

        let prev_joins = neighbor(i, -1).is_some_and(joins_forward);

        if c == LAM {
            if let Some(next_index) = (i + 1..chars.len()).find(|&j| !is_transparent(chars[j])) {
                let next = chars[next_index];
                if let Some((_, lig)) = LAM_ALEF.iter().find(|(k, _)| *k == next) {
                    let code = if prev_joins { lig[1] } else { lig[0] };
                    out.push(to_char(code, c));
                    out.extend(&chars[i + 1..next_index]);
                    i = next_index + 1;
                    continue;
                }
            }
        }

        let next_joins = f[2] != 0 && neighbor(i, 1).is_some_and(joins_backward);
        let prev_joins = prev_joins && f[1] != 0;

        let code = match (prev_joins, next_joins) {
            (true, true) => f[3],
            (true, false) => f[1],
            (false, true) => f[2],
            (false, false) => f[0],
        };
        out.push(to_char(code, c));
        i += 1;
    }

    out
}

/// Shapes and reorders `text` for left-to-right glyph placement.
///
/// Text is shaped whenever it contains Arabic; the paragraph direction is
/// forced to right-to-left for `Rtl` forms and detected otherwise.
#[must_use]
pub fn visual_order(text: &str, direction: LanguageDirection) -> String {
    let has_arabic = LangUtils::contains_arabic(text);
    if !has_arabic && !direction.is_rtl() {
        return text.to_string();
    }

    let shaped = if has_arabic {
        shape_arabic(text)
    } else {
        text.to_string()
    };

    let base = direction.is_rtl().then(Level::rtl);
    let bidi = BidiInfo::new(&shaped, base);
    bidi.paragraphs
        .iter()
        .map(|para| bidi.reorder_line(para, para.range.clone()).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shapes_joining_letters() {
        // beh, teh, beh: initial, medial, final
        let shaped: Vec<char> = shape_arabic("\u{0628}\u{062A}\u{0628}").chars().collect();
        assert_eq!(shaped, vec!['\u{FE91}', '\u{FE98}', '\u{FE90}']);
    }

    #[test]
    fn test_right_joining_letter_breaks_word() {
        // alef does not join forward, so the following beh starts anew
        let shaped: Vec<char> = shape_arabic("\u{0628}\u{0627}\u{0628}").chars().collect();
        assert_eq!(shaped, vec!['\u{FE91}', '\u{FE8E}', '\u{FE8F}']);
    }

    #[test]
    fn test_lam_alef_ligature() {
        let shaped: Vec<char> = shape_arabic("\u{0644}\u{0627}").chars().collect();
        assert_eq!(shaped, vec!['\u{FEFB}']);
    }

    #[test]
    fn test_visual_order_reverses_arabic() {
        let visual: Vec<char> = visual_order("\u{0628}\u{062A}", LanguageDirection::Rtl)
            .chars()
            .collect();
        assert_eq!(visual, vec!['\u{FE96}', '\u{FE91}']);
    }

    #[test]
    fn test_latin_ltr_untouched() {
        assert_eq!(visual_order("John Smith", LanguageDirection::Ltr), "John Smith");
    }
}
