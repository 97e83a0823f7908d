//! Lexicon-driven phoneme substitution
//!
//! Voice models mispronounce brand names and borrowed words; each voice
//! can carry a lexicon of `{match, ipa?, substitute?}` rules. `ipa` rules
//! wrap the match in the vendor's phoneme markup, `substitute` rules
//! replace the text outright. Substitution is left-to-right,
//! non-overlapping, first rule wins at any given position.

use serde::Deserialize;

use answerflow_core::{Error, Result};

use crate::ssml::xml_escape;

/// One lexicon entry
#[derive(Debug, Clone, Deserialize)]
pub struct PhonemeRule {
    #[serde(rename = "match")]
    pub match_text: String,

    /// IPA pronunciation; wraps the match in phoneme markup
    #[serde(default)]
    pub ipa: Option<String>,

    /// Literal replacement text
    #[serde(default)]
    pub substitute: Option<String>,
}

/// Parse a phoneme table fetched from the localisation's lexicon URL.
pub fn parse_table(bytes: &[u8]) -> Result<Vec<PhonemeRule>> {
    serde_json::from_slice(bytes).map_err(|e| Error::Tts(format!("malformed phoneme table: {e}")))
}

/// Transform a plain-text fragment for synthesis.
///
/// Strips `[...]` asides and the given control characters, XML-escapes
/// the remainder, then applies the lexicon on the escaped text. The
/// output is ready to embed in SSML verbatim; equal inputs produce
/// byte-identical output.
pub fn transform(text: &str, rules: &[PhonemeRule], illegal: &[char]) -> String {
    let cleaned = strip_asides(text);
    let cleaned: String = cleaned.chars().filter(|c| !illegal.contains(c)).collect();
    let escaped = xml_escape(&cleaned);

    if rules.is_empty() {
        return escaped;
    }

    // Match against the escaped text so rules containing markup-significant
    // characters still apply.
    let compiled: Vec<CompiledRule> = rules
        .iter()
        .filter(|r| !r.match_text.is_empty())
        .map(CompiledRule::new)
        .collect();

    let mut out = String::with_capacity(escaped.len());
    let mut rest = escaped.as_str();
    'outer: while !rest.is_empty() {
        for rule in &compiled {
            if rest.starts_with(&rule.escaped_match) {
                out.push_str(&rule.replacement);
                rest = &rest[rule.escaped_match.len()..];
                continue 'outer;
            }
        }
        let c = rest.chars().next().unwrap_or_default();
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }
    out
}

struct CompiledRule {
    escaped_match: String,
    replacement: String,
}

impl CompiledRule {
    fn new(rule: &PhonemeRule) -> Self {
        let escaped_match = xml_escape(&rule.match_text);
        let replacement = if let Some(ipa) = &rule.ipa {
            format!(
                "<phoneme alphabet=\"ipa\" ph=\"{}\">{}</phoneme>",
                xml_escape(ipa),
                escaped_match
            )
        } else if let Some(substitute) = &rule.substitute {
            xml_escape(substitute)
        } else {
            escaped_match.clone()
        };
        Self {
            escaped_match,
            replacement,
        }
    }
}

/// Remove closed `[...]` asides; an unclosed bracket is kept as-is.
fn strip_asides(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('[') {
        match rest[open..].find(']') {
            Some(close) => {
                out.push_str(&rest[..open]);
                rest = &rest[open + close + 1..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}
