//! Reassembly of per-chunk translations.

/// Join translated chunks in order.
///
/// A single result is returned unchanged.  Several results are joined with
/// `"\n"` when `original` contains a line break and with nothing otherwise.
/// Overlap output is kept as the engine produced it.
///
/// ```
/// use lingoslot::text::merge;
///
/// assert_eq!(merge(&["one"], "x"), "one");
/// assert_eq!(merge(&["a", "b"], "p1\np2"), "a\nb");
/// assert_eq!(merge(&["a", "b"], "p1 p2"), "ab");
/// ```
pub fn merge<S: AsRef<str>>(results: &[S], original: &str) -> String {
    match results {
        [] => String::new(),
        [only] => only.as_ref().to_string(),
        many => {
            let separator = if original.contains('\n') { "\n" } else { "" };
            many.iter()
                .map(AsRef::as_ref)
                .collect::<Vec<&str>>()
                .join(separator)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_result_is_identity() {
        for text in ["", "  padded  ", "line\nbreak", "翻译结果"] {
            assert_eq!(merge(&[text], "original\ntext"), text);
        }
    }

    #[test]
    fn empty_results_merge_to_empty() {
        let none: [&str; 0] = [];
        assert_eq!(merge(&none, "anything"), "");
    }

    #[test]
    fn newline_separator_when_input_has_lines() {
        let out = merge(&["First.".to_string(), "Second.".to_string()], "第一。\n\n第二。");
        assert_eq!(out, "First.\nSecond.");
    }

    #[test]
    fn empty_separator_for_single_line_input() {
        assert_eq!(merge(&["AI began", " in 1956."], "人工智能诞生于1956年。"), "AI began in 1956.");
    }

    #[test]
    fn overlap_text_is_not_deduplicated() {
        let out = merge(&["He is here.", "He is here. He left."], "a\nb");
        assert_eq!(out, "He is here.\nHe is here. He left.");
    }
}
