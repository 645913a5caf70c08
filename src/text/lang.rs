//! Supported language table and script-based source detection.

/// Language codes the translation model family supports.
pub const LANGUAGES: &[(&str, &str)] = &[
    ("af", "Afrikaans"),
    ("ar", "Arabic"),
    ("bn", "Bengali"),
    ("bg", "Bulgarian"),
    ("ca", "Catalan"),
    ("cs", "Czech"),
    ("cy", "Welsh"),
    ("da", "Danish"),
    ("de", "German"),
    ("el", "Greek"),
    ("en", "English"),
    ("es", "Spanish"),
    ("et", "Estonian"),
    ("fa", "Persian"),
    ("fi", "Finnish"),
    ("fr", "French"),
    ("gu", "Gujarati"),
    ("he", "Hebrew"),
    ("hi", "Hindi"),
    ("hr", "Croatian"),
    ("hu", "Hungarian"),
    ("id", "Indonesian"),
    ("it", "Italian"),
    ("ja", "Japanese"),
    ("kk", "Kazakh"),
    ("kn", "Kannada"),
    ("ko", "Korean"),
    ("lt", "Lithuanian"),
    ("lv", "Latvian"),
    ("ml", "Malayalam"),
    ("mr", "Marathi"),
    ("ms", "Malay"),
    ("nl", "Dutch"),
    ("no", "Norwegian"),
    ("pa", "Punjabi"),
    ("pl", "Polish"),
    ("pt", "Portuguese"),
    ("ro", "Romanian"),
    ("ru", "Russian"),
    ("sk", "Slovak"),
    ("sl", "Slovenian"),
    ("sr", "Serbian"),
    ("sv", "Swedish"),
    ("sw", "Swahili"),
    ("ta", "Tamil"),
    ("te", "Telugu"),
    ("th", "Thai"),
    ("tr", "Turkish"),
    ("uk", "Ukrainian"),
    ("ur", "Urdu"),
    ("vi", "Vietnamese"),
    ("yue", "Cantonese"),
    ("zh", "Chinese (Simplified)"),
    ("zh-TW", "Chinese (Traditional)"),
];

/// Display name for a language code, `None` when unsupported.
pub fn language_name(code: &str) -> Option<&'static str> {
    LANGUAGES
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(code))
        .map(|(_, name)| *name)
}

/// The table's spelling of `code` (`"zh-tw"` → `"zh-TW"`), `None` when
/// unsupported.
pub fn canonical_code(code: &str) -> Option<&'static str> {
    LANGUAGES
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(code.trim()))
        .map(|(c, _)| *c)
}

/// Guess the source language from the dominant script of `text`.
///
/// Script detection cannot tell Latin-script languages apart; those all
/// report `"en"`.  Returns `"unknown"` when the text has no letters.
pub fn detect_language(text: &str) -> &'static str {
    let mut counts = [0usize; 10];
    let mut kana = false;

    for c in text.chars() {
        let idx = match c as u32 {
            0x3040..=0x30FF => {
                kana = true;
                1
            }
            0x4E00..=0x9FFF | 0x3400..=0x4DBF => 0,
            0xAC00..=0xD7AF | 0x1100..=0x11FF => 2,
            0x0E00..=0x0E7F => 3,
            0x0400..=0x04FF => 4,
            0x0600..=0x06FF => 5,
            0x0590..=0x05FF => 6,
            0x0900..=0x097F => 7,
            0x0370..=0x03FF => 8,
            _ if c.is_alphabetic() => 9,
            _ => continue,
        };
        counts[idx] += 1;
    }

    // Japanese text mixes kanji with kana; any kana decides it.
    if kana {
        return "ja";
    }

    const CODES: [&str; 10] = ["zh", "ja", "ko", "th", "ru", "ar", "he", "hi", "el", "en"];
    counts
        .iter()
        .enumerate()
        .filter(|(_, n)| **n > 0)
        .max_by_key(|(_, n)| **n)
        .map(|(i, _)| CODES[i])
        .unwrap_or("unknown")
}
