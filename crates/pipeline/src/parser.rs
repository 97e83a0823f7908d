//! Incremental parser for streamed generator output
//!
//! Sectioned output wraps the spoken answer in `<answer>` (with nested
//! `<thinking>` asides) and the display rendering in `<formatted>`. The
//! stream can be cut at any byte, so this is a character-driven state
//! machine with a carry buffer for partially received tags, never a real
//! XML parse. `[meta:docs ...]` markers are extracted in both sectioned
//! and plain mode and must never leak into answer text.

/// One parsed slice of generator output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedSegment {
    /// Spoken answer text
    Answer(String),
    /// Generator reasoning, shown but not spoken
    Thinking(String),
    /// Display-formatted answer, never spoken
    Formatted(String),
    /// Document ids from a metadata marker
    Metadata(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Outside,
    InAnswer,
    InThinking,
    InFormatted,
}

const META_PREFIX: &str = "[meta:docs";

/// Streaming tokenizer over generator fragments
pub struct SectionedParser {
    sectioned: bool,
    section: Section,
    /// Partially received tag or metadata marker
    carry: String,
}

impl SectionedParser {
    /// `sectioned` selects envelope parsing; plain mode passes text
    /// through (metadata markers are still extracted).
    pub fn new(sectioned: bool) -> Self {
        Self {
            sectioned,
            section: if sectioned {
                Section::Outside
            } else {
                Section::InAnswer
            },
            carry: String::new(),
        }
    }

    /// Consume one fragment, returning the segments it completed.
    pub fn feed(&mut self, fragment: &str) -> Vec<ParsedSegment> {
        let mut out = SegmentCollector::new();

        for c in fragment.chars() {
            if !self.carry.is_empty() {
                self.carry.push(c);
                self.step_carry(&mut out);
            } else if c == '[' || (self.sectioned && c == '<') {
                self.carry.push(c);
            } else {
                out.text(self.section, c);
            }
        }

        out.into_segments()
    }

    /// Flush any carried partial token as literal text. Call when the
    /// stream ends (it may be truncated mid-tag).
    pub fn finish(&mut self) -> Vec<ParsedSegment> {
        let mut out = SegmentCollector::new();
        if !self.carry.is_empty() {
            let carry = std::mem::take(&mut self.carry);
            out.text_str(self.section, &carry);
        }
        out.into_segments()
    }

    fn step_carry(&mut self, out: &mut SegmentCollector) {
        if self.carry.starts_with('<') {
            self.step_tag(out);
        } else {
            self.step_marker(out);
        }
    }

    fn step_tag(&mut self, out: &mut SegmentCollector) {
        let transitions: &[(&str, Section)] = match self.section {
            Section::Outside => &[
                ("<answer>", Section::InAnswer),
                ("<formatted>", Section::InFormatted),
            ],
            Section::InAnswer => &[
                ("</answer>", Section::Outside),
                ("<thinking>", Section::InThinking),
            ],
            Section::InThinking => &[("</thinking>", Section::InAnswer)],
            Section::InFormatted => &[("</formatted>", Section::Outside)],
        };

        for (tag, next) in transitions {
            if self.carry == *tag {
                self.carry.clear();
                self.section = *next;
                return;
            }
        }

        let still_prefix = transitions.iter().any(|(tag, _)| tag.starts_with(&self.carry));
        if !still_prefix {
            // Not a recognised tag; it was ordinary text all along.
            let carry = std::mem::take(&mut self.carry);
            out.text_str(self.section, &carry);
        }
    }

    fn step_marker(&mut self, out: &mut SegmentCollector) {
        if self.carry.len() <= META_PREFIX.len() {
            if !META_PREFIX.starts_with(self.carry.as_str()) {
                let carry = std::mem::take(&mut self.carry);
                out.text_str(self.section, &carry);
            }
            return;
        }

        if !self.carry.starts_with(META_PREFIX) {
            let carry = std::mem::take(&mut self.carry);
            out.text_str(self.section, &carry);
            return;
        }

        if self.carry.ends_with(']') {
            let inner = &self.carry[META_PREFIX.len()..self.carry.len() - 1];
            let doc_ids = inner.trim_start_matches(':').trim().to_string();
            out.push(ParsedSegment::Metadata(doc_ids));
            self.carry.clear();
        }
    }
}

/// Coalesces consecutive characters of one section into single segments
struct SegmentCollector {
    segments: Vec<ParsedSegment>,
    current: Option<(Section, String)>,
}

impl SegmentCollector {
    fn new() -> Self {
        Self {
            segments: Vec::new(),
            current: None,
        }
    }

    fn text(&mut self, section: Section, c: char) {
        match &mut self.current {
            Some((s, buffer)) if *s == section => buffer.push(c),
            _ => {
                self.flush_current();
                self.current = Some((section, c.to_string()));
            }
        }
    }

    fn text_str(&mut self, section: Section, text: &str) {
        for c in text.chars() {
            self.text(section, c);
        }
    }

    fn push(&mut self, segment: ParsedSegment) {
        self.flush_current();
        self.segments.push(segment);
    }

    fn flush_current(&mut self) {
        if let Some((section, buffer)) = self.current.take() {
            let segment = match section {
                // Text between sections carries no meaning
                Section::Outside => return,
                Section::InAnswer => ParsedSegment::Answer(buffer),
                Section::InThinking => ParsedSegment::Thinking(buffer),
                Section::InFormatted => ParsedSegment::Formatted(buffer),
            };
            self.segments.push(segment);
        }
    }

    fn into_segments(mut self) -> Vec<ParsedSegment> {
        self.flush_current();
        self.segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(parser: &mut SectionedParser, fragments: &[&str]) -> Vec<ParsedSegment> {
        let mut segments = Vec::new();
        for fragment in fragments {
            segments.extend(parser.feed(fragment));
        }
        segments.extend(parser.finish());
        segments
    }

    fn answers(segments: &[ParsedSegment]) -> String {
        segments
            .iter()
            .filter_map(|s| match s {
                ParsedSegment::Answer(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_plain_mode_passes_through() {
        let mut parser = SectionedParser::new(false);
        let segments = feed_all(&mut parser, &["Hello ", "world"]);
        assert_eq!(answers(&segments), "Hello world");
    }

    #[test]
    fn test_sectioned_routing() {
        let mut parser = SectionedParser::new(true);
        let segments = feed_all(
            &mut parser,
            &["<answer>Pay online.</answer><formatted><b>Pay online.</b></formatted>"],
        );
        assert_eq!(answers(&segments), "Pay online.");
        assert!(segments
            .iter()
            .any(|s| matches!(s, ParsedSegment::Formatted(text) if text == "<b>Pay online.</b>")));
    }

    #[test]
    fn test_thinking_nested_in_answer() {
        let mut parser = SectionedParser::new(true);
        let segments = feed_all(
            &mut parser,
            &["<answer>Yes<thinking>check the docs</thinking>, you can.</answer>"],
        );
        assert_eq!(answers(&segments), "Yes, you can.");
        assert!(segments
            .iter()
            .any(|s| matches!(s, ParsedSegment::Thinking(text) if text == "check the docs")));
    }

    #[test]
    fn test_tags_split_across_fragments() {
        let mut parser = SectionedParser::new(true);
        let segments = feed_all(
            &mut parser,
            &["<ans", "wer>Hel", "lo</an", "swer>"],
        );
        assert_eq!(answers(&segments), "Hello");
    }

    #[test]
    fn test_unknown_tag_is_text() {
        let mut parser = SectionedParser::new(true);
        let segments = feed_all(&mut parser, &["<answer>1 <b>2</b></answer>"]);
        assert_eq!(answers(&segments), "1 <b>2</b>");
    }

    #[test]
    fn test_truncated_stream_flushes_carry() {
        let mut parser = SectionedParser::new(true);
        let segments = feed_all(&mut parser, &["<answer>partial</ans"]);
        assert_eq!(answers(&segments), "partial</ans");
    }

    #[test]
    fn test_metadata_extracted_from_answer() {
        let mut parser = SectionedParser::new(true);
        let segments = feed_all(
            &mut parser,
            &["<answer>See the guide.[meta:docs d1,d2]</answer>"],
        );
        assert_eq!(answers(&segments), "See the guide.");
        assert!(segments
            .iter()
            .any(|s| matches!(s, ParsedSegment::Metadata(ids) if ids == "d1,d2")));
    }

    #[test]
    fn test_metadata_marker_split_across_fragments() {
        let mut parser = SectionedParser::new(false);
        let segments = feed_all(&mut parser, &["answer [met", "a:docs d9", "] tail"]);
        assert_eq!(answers(&segments), "answer  tail");
        assert!(segments
            .iter()
            .any(|s| matches!(s, ParsedSegment::Metadata(ids) if ids == "d9")));
    }

    #[test]
    fn test_plain_brackets_are_text() {
        let mut parser = SectionedParser::new(false);
        let segments = feed_all(&mut parser, &["list[0] and [note]"]);
        assert_eq!(answers(&segments), "list[0] and [note]");
    }

    #[test]
    fn test_text_outside_sections_dropped() {
        let mut parser = SectionedParser::new(true);
        let segments = feed_all(&mut parser, &["noise <answer>signal</answer> noise"]);
        assert_eq!(answers(&segments), "signal");
        assert_eq!(segments.len(), 1);
    }
}
