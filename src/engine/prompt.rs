//! Prompt builder for chat-style translation models.
//!
//! [`PromptBuilder`] produces the `(system_msg, user_msg)` pair sent to the
//! engine.  The instruction names both languages in plain English; an
//! unknown source language is left out.

use crate::text::lang::language_name;

const SYSTEM_INSTRUCTION: &str = "\
You are a professional translator.
Rules:
1. Translate the user's text faithfully, preserving meaning and tone.
2. Keep proper nouns, numbers, code and markup unchanged.
3. Reply with ONLY the translation, no explanation, no quotes.";

/// Builds translation prompts for one target language.
///
/// ```
/// use lingoslot::engine::PromptBuilder;
///
/// let (system, user) = PromptBuilder::new("en").build_chat("你好", Some("zh"));
/// assert!(system.contains("English"));
/// assert!(user.contains("你好"));
/// ```
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    target_lang: String,
}

impl PromptBuilder {
    pub fn new(target_lang: &str) -> Self {
        Self {
            target_lang: target_lang.to_string(),
        }
    }

    /// Build the `(system_msg, user_msg)` pair for `text`.
    pub fn build_chat(&self, text: &str, source_lang: Option<&str>) -> (String, String) {
        let target = language_name(&self.target_lang).unwrap_or(self.target_lang.as_str());

        let mut system_msg = String::with_capacity(SYSTEM_INSTRUCTION.len() + 64);
        system_msg.push_str(SYSTEM_INSTRUCTION);
        match source_lang.and_then(language_name) {
            Some(source) => {
                system_msg.push_str(&format!("\nTranslate from {source} to {target}."));
            }
            None => system_msg.push_str(&format!("\nTranslate into {target}.")),
        }

        (system_msg, text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_source_and_target() {
        let (system, _) = PromptBuilder::new("ja").build_chat("hello", Some("en"));
        assert!(system.contains("from English to Japanese"));
    }

    #[test]
    fn unknown_source_is_omitted() {
        let (system, _) = PromptBuilder::new("fr").build_chat("hello", Some("xx"));
        assert!(system.contains("Translate into French."));
        assert!(!system.contains("from"));
    }

    #[test]
    fn unknown_target_falls_back_to_code() {
        let (system, _) = PromptBuilder::new("tlh").build_chat("hello", None);
        assert!(system.contains("Translate into tlh."));
    }

    #[test]
    fn user_message_is_the_text_verbatim() {
        let (_, user) = PromptBuilder::new("en").build_chat("  第一段。\n第二段。", None);
        assert_eq!(user, "  第一段。\n第二段。");
    }
}
