//! SSML assembly for the speech vendor
//!
//! The builder takes already-transformed body text (escaped, possibly
//! containing phoneme markup) and wraps it in the vendor envelope. Equal
//! inputs yield byte-identical documents; audio-cache keys depend on it.

/// Escape text for embedding in SSML element content or attributes.
pub fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Build the SSML document for one synthesis call.
///
/// `body` is transformer output and is embedded verbatim; everything
/// else is escaped here.
pub fn build(body: &str, voice: &str, pitch: Option<&str>, language: &str) -> String {
    let inner = match pitch {
        Some(pitch) => format!(
            "<prosody pitch=\"{}\" rate=\"medium\">{}</prosody>",
            xml_escape(pitch),
            body
        ),
        None => body.to_string(),
    };

    format!(
        "<speak version=\"1.0\" xmlns=\"http://www.w3.org/2001/10/synthesis\" \
         xml:lang=\"{}\"><voice name=\"{}\">{}</voice></speak>",
        xml_escape(language),
        xml_escape(voice),
        inner
    )
}
