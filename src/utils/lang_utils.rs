use serde::{Deserialize, Serialize};

/// Reading direction of a form's language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageDirection {
    #[default]
    Rtl,
    Ltr,
}

impl LanguageDirection {
    #[must_use]
    pub fn is_rtl(self) -> bool {
        matches!(self, Self::Rtl)
    }
}

impl std::fmt::Display for LanguageDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rtl => write!(f, "rtl"),
            Self::Ltr => write!(f, "ltr"),
        }
    }
}

impl std::str::FromStr for LanguageDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rtl" => Ok(Self::Rtl),
            "ltr" => Ok(Self::Ltr),
            other => Err(format!("unknown language direction '{other}'")),
        }
    }
}

pub struct LangUtils;

impl LangUtils {
    /// True for characters in the Arabic blocks and presentation forms.
    #[must_use]
    pub fn is_arabic_char(c: char) -> bool {
        matches!(
            c as u32,
            0x0600..=0x06FF | 0x0750..=0x077F | 0xFB50..=0xFDFF | 0xFE70..=0xFEFF
        )
    }

    #[must_use]
    pub fn contains_arabic(text: &str) -> bool {
        text.chars().any(Self::is_arabic_char)
    }

    /// Guesses the direction of a text sample from its alphabetic characters.
    ///
    /// Returns `None` when the sample has no letters at all.
    #[must_use]
    pub fn detect_direction(text: &str) -> Option<LanguageDirection> {
        let (arabic, other) = text
            .chars()
            .filter(|c| c.is_alphabetic())
            .fold((0usize, 0usize), |(a, o), c| {
                if Self::is_arabic_char(c) {
                    (a + 1, o)
                } else {
                    (a, o + 1)
                }
            });

        match (arabic, other) {
            (0, 0) => None,
            (a, o) if a >= o => Some(LanguageDirection::Rtl),
            _ => Some(LanguageDirection::Ltr),
        }
    }
}
