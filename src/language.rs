//! Language type: the fixed set of languages the phrasebook works with.
//!
//! Sentences are written in Korean, translated into English and Japanese, and
//! the Japanese text is read back in Hangul as its pronunciation.

use std::fmt;

/// Metadata for a supported language.
#[derive(Debug, Clone)]
struct LanguageInfo {
    /// ISO 639-1 language code (e.g., "ko", "en")
    code: &'static str,

    /// English name of the language (e.g., "Korean")
    name: &'static str,
}

const LANGUAGES: &[LanguageInfo] = &[
    LanguageInfo {
        code: "ko",
        name: "Korean",
    },
    LanguageInfo {
        code: "en",
        name: "English",
    },
    LanguageInfo {
        code: "ja",
        name: "Japanese",
    },
];

/// One of the phrasebook's languages.
///
/// Only the constants below exist, so every `Language` is in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Language {
    code: &'static str,
}

impl Language {
    /// Source language of every saved sentence.
    pub const KOREAN: Language = Language { code: "ko" };

    /// First translation target.
    pub const ENGLISH: Language = Language { code: "en" };

    /// Second translation target, also the language that gets a pronunciation.
    pub const JAPANESE: Language = Language { code: "ja" };

    /// Get the ISO 639-1 language code.
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// Get the English name of the language.
    pub fn name(&self) -> &'static str {
        LANGUAGES
            .iter()
            .find(|lang| lang.code == self.code)
            .map(|lang| lang.name)
            .unwrap_or(self.code)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
