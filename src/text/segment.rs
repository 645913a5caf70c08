//! Context-window segmentation of arbitrary-length input.
//!
//! [`segment`] turns text into ordered [`ChunkSpec`]s no longer than
//! `max_len` characters (Unicode scalar values, so CJK and Latin count
//! alike):
//!
//! ```text
//! text ──lines──▶ paragraphs ──(> max_len)──▶ sentences ──greedy pack──▶ chunks
//!                     │                            │
//!                     └─(≤ max_len)─▶ one chunk    └─(> max_len)─▶ fixed slices
//! ```
//!
//! With `overlap_len > 0`, every packed chunk after the first one in a
//! paragraph starts with trailing context from its predecessor
//! ([`derive_overlap`]); the prefix length is recorded in
//! [`ChunkSpec::overlap_prefix_len`] and never exceeds the room left under
//! `max_len`.

use std::sync::OnceLock;

use regex::Regex;

/// Sentence terminators (CJK and Latin) plus any trailing whitespace.
fn sentence_boundary() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[。！？.!?]+\s*").expect("sentence boundary pattern is valid"))
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Last `n` characters of `s`.
fn tail_chars(s: &str, n: usize) -> &str {
    let len = char_len(s);
    if n >= len {
        return s;
    }
    let start = s
        .char_indices()
        .nth(len - n)
        .map_or(s.len(), |(i, _)| i);
    &s[start..]
}

// ---------------------------------------------------------------------------
// ChunkSpec
// ---------------------------------------------------------------------------

/// One unit of work for the inference engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSpec {
    /// Text submitted to the engine, overlap prefix included.
    pub text: String,
    /// Number of leading characters of `text` copied from the previous chunk.
    pub overlap_prefix_len: usize,
}

impl ChunkSpec {
    /// A chunk with no overlap prefix.
    pub fn plain(text: &str) -> Self {
        Self {
            text: text.to_string(),
            overlap_prefix_len: 0,
        }
    }

    /// `text` without the overlap prefix.
    pub fn new_content(&self) -> &str {
        match self.text.char_indices().nth(self.overlap_prefix_len) {
            Some((i, _)) => &self.text[i..],
            None => "",
        }
    }

    pub fn char_len(&self) -> usize {
        char_len(&self.text)
    }

    fn drop_overlap(&mut self) {
        if self.overlap_prefix_len > 0 {
            self.text = self.new_content().to_string();
            self.overlap_prefix_len = 0;
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Split `text` into chunks of at most `max_len` characters.
///
/// ```
/// use lingoslot::text::segment;
///
/// let chunks = segment("Hello, how are you today?", 80, 0);
/// assert_eq!(chunks.len(), 1);
/// assert_eq!(chunks[0].overlap_prefix_len, 0);
/// ```
pub fn segment(text: &str, max_len: usize, overlap_len: usize) -> Vec<ChunkSpec> {
    let max_len = max_len.max(1);
    let mut chunks = Vec::new();

    for paragraph in text.lines() {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        if char_len(paragraph) <= max_len {
            chunks.push(ChunkSpec::plain(paragraph));
            continue;
        }
        let mut packer = Packer::new(max_len, overlap_len, &mut chunks);
        for sentence in split_sentences(paragraph) {
            packer.push_sentence(sentence);
        }
        packer.flush();
    }

    if let Some(first) = chunks.first_mut() {
        first.drop_overlap();
    }
    chunks
}

/// Split a paragraph into sentences, keeping each terminator (and the
/// whitespace after it) attached to its sentence.
pub fn split_sentences(paragraph: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for m in sentence_boundary().find_iter(paragraph) {
        let sentence = &paragraph[start..m.end()];
        if !sentence.trim().is_empty() {
            sentences.push(sentence);
        }
        start = m.end();
    }
    let rest = &paragraph[start..];
    if !rest.trim().is_empty() {
        sentences.push(rest);
    }
    sentences
}

/// Trailing context of `text`, roughly `n` characters long.
///
/// Returns `text` whole when it is at most `n` characters.  Otherwise looks
/// for sentence boundaries in the last `2n` characters and returns the
/// longest suffix of whole sentences no longer than `1.5n`; falls back to
/// the raw last `n` characters.
pub fn derive_overlap(text: &str, n: usize) -> String {
    if n == 0 {
        return String::new();
    }
    let len = char_len(text);
    if len <= n {
        return text.to_string();
    }

    let window = tail_chars(text, 2 * n);
    let limit = n * 3 / 2;
    let window_is_whole_text = char_len(window) == len;

    // Suffixes shrink left to right, so the first one that fits is the longest.
    let starts = window_is_whole_text
        .then_some(0)
        .into_iter()
        .chain(sentence_boundary().find_iter(window).map(|m| m.end()));
    for start in starts {
        let suffix = window[start..].trim_start();
        let suffix_len = char_len(suffix);
        if suffix_len > 0 && suffix_len <= limit {
            return suffix.to_string();
        }
    }

    tail_chars(text, n).to_string()
}

// ---------------------------------------------------------------------------
// Packer
// ---------------------------------------------------------------------------

/// Greedy sentence packer for one over-long paragraph.
struct Packer<'a> {
    max_len: usize,
    overlap_len: usize,
    out: &'a mut Vec<ChunkSpec>,
    acc: String,
    acc_len: usize,
    /// Context attached to the chunk being accumulated.
    prefix: Option<String>,
    /// Context derived from the last flushed chunk, not yet attached.
    carry: Option<String>,
}

impl<'a> Packer<'a> {
    fn new(max_len: usize, overlap_len: usize, out: &'a mut Vec<ChunkSpec>) -> Self {
        Self {
            max_len,
            overlap_len,
            out,
            acc: String::new(),
            acc_len: 0,
            prefix: None,
            carry: None,
        }
    }

    fn prefix_len(&self) -> usize {
        self.prefix.as_deref().map(char_len).unwrap_or(0)
    }

    fn push_sentence(&mut self, sentence: &str) {
        let len = char_len(sentence);

        if len > self.max_len {
            self.flush();
            self.carry = None;
            self.hard_split(sentence);
            return;
        }

        if self.acc_len > 0 && self.prefix_len() + self.acc_len + len > self.max_len {
            self.flush();
        }
        if self.acc_len == 0 {
            self.prefix = self.attach_carry(len);
        }
        self.acc.push_str(sentence);
        self.acc_len += len;
    }

    /// Fixed-length slices with no sentence awareness and no overlap.
    fn hard_split(&mut self, sentence: &str) {
        let chars: Vec<char> = sentence.chars().collect();
        for slice in chars.chunks(self.max_len) {
            let slice: String = slice.iter().collect();
            let slice = slice.trim();
            if !slice.is_empty() {
                self.out.push(ChunkSpec::plain(slice));
            }
        }
    }

    /// Take the pending carry, trimmed to the room left beside a
    /// `sentence_len`-character sentence.
    fn attach_carry(&mut self, sentence_len: usize) -> Option<String> {
        let mut ctx = self.carry.take()?;
        if ctx.chars().last().is_some_and(|c| c.is_ascii()) {
            ctx.push(' ');
        }
        let room = self.max_len.saturating_sub(sentence_len);
        let fitted = tail_chars(&ctx, room).trim_start();
        (!fitted.is_empty()).then(|| fitted.to_string())
    }

    fn flush(&mut self) {
        let acc = std::mem::take(&mut self.acc);
        self.acc_len = 0;
        let prefix = self.prefix.take();

        let content = acc.trim();
        if content.is_empty() {
            return;
        }

        let chunk = match prefix {
            Some(prefix) => ChunkSpec {
                overlap_prefix_len: char_len(&prefix),
                text: prefix + content,
            },
            None => ChunkSpec::plain(content),
        };
        self.out.push(chunk);

        if self.overlap_len > 0 {
            self.carry = Some(derive_overlap(content, self.overlap_len));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn strip_ws(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    /// Non-overlap content of all chunks, whitespace removed.
    fn covered(chunks: &[ChunkSpec]) -> String {
        chunks.iter().map(|c| strip_ws(c.new_content())).collect()
    }

    fn cjk_sentence(n: usize) -> String {
        format!("{}。", "字".repeat(n - 1))
    }

    const LONG_ZH: &str = "人工智能的概念可以追溯到古希腊神话中的自动机器人，这些神话描绘了由工匠赫菲斯托斯创造的金属生物。然而，作为一门正式学科，人工智能诞生于1956年的达特茅斯会议。在这次会议上，约翰·麦卡锡首次提出了\"人工智能\"这一术语。早期的人工智能研究主要集中在符号推理和问题求解上。研究人员相信，通过编写足够复杂的规则，机器可以模拟人类的思维过程。\n\n1980年代，专家系统的兴起标志着人工智能的第一次商业化浪潮。这些系统通过编码领域专家的知识来解决特定问题。然而，专家系统的局限性很快显现：它们难以处理不确定性，且知识获取成本高昂。";

    // Sentences of exactly 10 and 25 characters.
    const FULL_WIDTH_SENTENCE: &str =
        "AAAA。BBBBBBBBB。CCCCCCCCCCCCCCCCCCCCCCCC。DD。EEEEEEEEE。";

    const LONG_EN: &str = "The quick brown fox jumps over the lazy dog. It was not amused! Why would anyone do that? Nobody knows.\nA second paragraph follows here, and it is long enough to need splitting when the limit is small. Really it is.";

    // --- scenarios ---

    #[test]
    fn short_text_is_one_chunk() {
        let text = "Hello, how are you today?";
        let chunks = segment(text, 80, 0);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
        assert_eq!(chunks[0].overlap_prefix_len, 0);
    }

    #[test]
    fn unterminated_paragraph_is_hard_split() {
        let a = "a".repeat(150);
        let text = format!("{a}\n\nA short second paragraph.");
        let chunks = segment(&text, 100, 20);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].char_len(), 100);
        assert_eq!(chunks[1].char_len(), 50);
        assert_eq!(chunks[2].text, "A short second paragraph.");
        assert!(chunks.iter().all(|c| c.overlap_prefix_len == 0));
    }

    #[test]
    fn empty_and_whitespace_yield_nothing() {
        assert!(segment("", 80, 0).is_empty());
        assert!(segment("   \n\n \t \r\n", 80, 10).is_empty());
    }

    #[test]
    fn paragraphs_become_separate_chunks() {
        let chunks = segment("第一段。\n\n第二段。\r\n第三段。", 80, 0);
        let texts: Vec<_> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, ["第一段。", "第二段。", "第三段。"]);
    }

    #[test]
    fn sentences_are_packed_greedily() {
        let s = cjk_sentence(30);
        let paragraph = s.repeat(7);
        let chunks = segment(&paragraph, 100, 0);
        let lens: Vec<_> = chunks.iter().map(ChunkSpec::char_len).collect();
        assert_eq!(lens, [90, 90, 30]);
    }

    #[test]
    fn overlap_carries_previous_sentence() {
        let s = cjk_sentence(30);
        let paragraph = s.repeat(7);
        let chunks = segment(&paragraph, 100, 20);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].overlap_prefix_len, 0);
        assert_eq!(chunks[1].overlap_prefix_len, 30);
        assert_eq!(chunks[2].overlap_prefix_len, 30);
        assert!(chunks[1].text.starts_with(&s));
        assert!(chunks.iter().all(|c| c.char_len() <= 100));
        assert_eq!(covered(&chunks), strip_ws(&paragraph));
    }

    #[test]
    fn hard_split_resets_overlap() {
        let short = cjk_sentence(40);
        let huge = cjk_sentence(120);
        let paragraph = format!("{short}{short}{huge}{short}");
        let chunks = segment(&paragraph, 100, 20);

        // [short short] [huge 100] [huge 20] [short], no carry past the slices
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[1].char_len(), 100);
        assert_eq!(chunks[2].char_len(), 20);
        assert!(chunks.iter().all(|c| c.overlap_prefix_len == 0));
    }

    #[test]
    fn latin_overlap_is_space_separated() {
        let text = "One two three four. Five six seven eight. Nine ten eleven twelve.";
        let chunks = segment(text, 45, 20);
        assert!(chunks.len() >= 2);
        let second = &chunks[1];
        assert!(second.overlap_prefix_len > 0);
        let prefix: String = second.text.chars().take(second.overlap_prefix_len).collect();
        assert!(prefix.ends_with(' '), "prefix {prefix:?}");
    }

    // --- properties ---

    #[test]
    fn length_bound_holds() {
        for text in [LONG_ZH, LONG_EN, FULL_WIDTH_SENTENCE] {
            for max_len in [10, 25, 40, 80, 100, 120, 150] {
                for overlap in [0, 5, 20, 30, 40] {
                    for chunk in segment(text, max_len, overlap) {
                        assert!(
                            chunk.char_len() <= max_len,
                            "max_len={max_len} overlap={overlap} chunk={:?}",
                            chunk.text
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn sentence_filling_the_window_gets_no_overlap() {
        let chunks = segment("AAAA。BBBBBBBBB。", 10, 3);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "AAAA。");
        assert_eq!(chunks[1].text, "BBBBBBBBB。");
        assert_eq!(chunks[1].overlap_prefix_len, 0);
    }

    #[test]
    fn tail_of_zero_chars_is_empty() {
        assert_eq!(tail_chars("你好。", 0), "");
        assert_eq!(tail_chars("你好。", 2), "好。");
        assert_eq!(tail_chars("ab", 5), "ab");
    }

    #[test]
    fn coverage_holds() {
        for text in [LONG_ZH, LONG_EN] {
            for max_len in [10, 25, 40, 80, 100, 120, 150] {
                for overlap in [0, 5, 20, 30, 40] {
                    let chunks = segment(text, max_len, overlap);
                    assert_eq!(
                        covered(&chunks),
                        strip_ws(text),
                        "max_len={max_len} overlap={overlap}"
                    );
                }
            }
        }
    }

    #[test]
    fn first_chunk_never_has_overlap() {
        for max_len in [10, 40, 100] {
            for overlap in [0, 20, 60] {
                let chunks = segment(LONG_ZH, max_len, overlap);
                assert_eq!(chunks[0].overlap_prefix_len, 0);
            }
        }
    }

    #[test]
    fn prefix_is_a_tail_of_previous_content() {
        let chunks = segment(LONG_ZH, 60, 20);
        for pair in chunks.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.overlap_prefix_len == 0 {
                continue;
            }
            let prefix: String = next.text.chars().take(next.overlap_prefix_len).collect();
            assert!(prev.new_content().ends_with(prefix.trim_end()));
        }
    }

    // --- helpers ---

    #[test]
    fn split_sentences_keeps_terminators() {
        let s = split_sentences("你好。世界！How are you? Fine");
        assert_eq!(s, ["你好。", "世界！", "How are you? ", "Fine"]);
    }

    #[test]
    fn split_sentences_groups_repeated_terminators() {
        let s = split_sentences("Wait... what?! ok");
        assert_eq!(s, ["Wait... ", "what?! ", "ok"]);
    }

    #[test]
    fn derive_overlap_short_text_is_whole() {
        assert_eq!(derive_overlap("短句。", 5), "短句。");
    }

    #[test]
    fn derive_overlap_prefers_whole_sentences() {
        let text = format!("{}。BBB。", "A".repeat(10));
        assert_eq!(derive_overlap(&text, 4), "BBB。");
    }

    #[test]
    fn derive_overlap_falls_back_to_raw_tail() {
        assert_eq!(derive_overlap("ABCDEFGHIJ", 3), "HIJ");
        // Last sentence is longer than 1.5n.
        let text = format!("前文。{}", "字".repeat(20));
        assert_eq!(derive_overlap(&text, 4), "字字字字");
    }

    #[test]
    fn derive_overlap_zero_is_empty() {
        assert_eq!(derive_overlap("anything", 0), "");
    }

    #[test]
    fn new_content_skips_prefix_chars() {
        let c = ChunkSpec {
            text: "上文。下文。".into(),
            overlap_prefix_len: 3,
        };
        assert_eq!(c.new_content(), "下文。");
    }
}
