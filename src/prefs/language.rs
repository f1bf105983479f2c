use serde::Serialize;

pub const ENGLISH: &str = "en";
pub const GERMAN: &str = "de";

/// A selectable UI language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Language {
    pub code: &'static str,
    pub display_name: &'static str,
}

pub const AVAILABLE_LANGUAGES: [Language; 2] = [
    Language {
        code: ENGLISH,
        display_name: "English",
    },
    Language {
        code: GERMAN,
        display_name: "Deutsch",
    },
];

pub fn is_supported(code: &str) -> bool {
    AVAILABLE_LANGUAGES.iter().any(|l| l.code == code)
}
