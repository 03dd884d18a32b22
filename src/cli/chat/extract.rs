use crate::cli::chat::conversation_state::Link;

/// Marker separating the answer body from the reference list in a raw
/// responder payload.
const SOURCES_MARKER: &str = "See more:";

/// Shown in place of an answer when the responder returns an empty payload.
pub const EMPTY_ANSWER_FALLBACK: &str = "Sorry, As an AI, I can't answer your questions.";

/// A raw responder payload split into its displayable parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedReply {
    pub answer: String,
    pub links: Vec<Link>,
}

/// Split a raw responder payload into the answer and its reference links.
///
/// The payload is split on the first occurrence of `"See more:"`: everything
/// before the marker is the answer, everything after is one URL per line
/// (section trimmed, then each line trimmed). An empty payload yields the
/// fixed fallback answer. When no links are present the list still holds the
/// single empty-url sentinel, so `links` is never empty.
///
/// URLs are taken as-is; no well-formedness check. Accepts any input.
pub fn extract(raw: &str) -> ExtractedReply {
    let (answer, rest) = match raw.split_once(SOURCES_MARKER) {
        Some((before, after)) => (before, Some(after)),
        None => (raw, None),
    };

    // The emptiness check is on the whole payload, not the split-off answer.
    let answer = if raw.is_empty() {
        EMPTY_ANSWER_FALLBACK.to_string()
    } else {
        answer.to_string()
    };

    let links = match rest.map(str::trim) {
        Some(section) if !section.is_empty() => {
            section.split('\n').map(|line| Link::new(line.trim())).collect()
        }
        _ => vec![Link::none()],
    };

    ExtractedReply { answer, links }
}
