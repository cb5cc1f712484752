use crate::decoding::ContentDecoder;
use crate::message::Part;

pub const TEXT_HTML: &str = "text/html";
pub const TEXT_PLAIN: &str = "text/plain";

/// Which body representation a caller wants, and how hard to look for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionPolicy {
    /// Search the whole tree depth-first; the first HTML leaf wins outright,
    /// otherwise the first plain-text leaf is returned with `<br />` line breaks.
    HtmlFirst,
    /// Search one level at a time (plain text, then HTML), descend into
    /// containers in order, and finally accept any leaf with a payload.
    PlainFirst,
}

impl ExtractionPolicy {
    /// Mime essences in order of preference.
    pub fn preferences(self) -> &'static [&'static str] {
        match self {
            ExtractionPolicy::HtmlFirst => &[TEXT_HTML, TEXT_PLAIN],
            ExtractionPolicy::PlainFirst => &[TEXT_PLAIN, TEXT_HTML],
        }
    }
}

/// Pick the best leaf among `candidates` for the given preference order.
///
/// Candidates are consumed in order. A leaf matching the first preference ends
/// the search immediately; for lower preferences the earliest match is kept.
/// Only leaves carrying a payload are considered.
fn select<'a, I>(candidates: I, preferences: &[&str]) -> Option<(&'a Part, usize)>
where
    I: IntoIterator<Item = &'a Part>,
{
    let mut best: Option<(&'a Part, usize)> = None;
    for part in candidates {
        if part.payload().is_none() {
            continue;
        }
        let Some(rank) = preferences.iter().position(|m| part.is_mime(m)) else {
            continue;
        };
        if rank == 0 {
            return Some((part, 0));
        }
        if best.map_or(true, |(_, r)| rank < r) {
            best = Some((part, rank));
        }
    }
    best
}

pub struct BodyExtractor {
    decoder: ContentDecoder,
}

impl Default for BodyExtractor {
    fn default() -> Self {
        Self::new(ContentDecoder::default())
    }
}

impl BodyExtractor {
    pub fn new(decoder: ContentDecoder) -> Self {
        Self { decoder }
    }

    pub fn decoder(&self) -> &ContentDecoder {
        &self.decoder
    }

    /// Extract a body from `root` without modifying it. Each selected payload
    /// is decoded exactly once. Returns an empty string when nothing usable exists.
    pub fn extract(&self, root: &Part, policy: ExtractionPolicy) -> String {
        match policy {
            ExtractionPolicy::HtmlFirst => self.extract_html_first(root),
            ExtractionPolicy::PlainFirst => self.extract_plain_first(root.top_level()),
        }
    }

    fn extract_html_first(&self, root: &Part) -> String {
        let preferences = ExtractionPolicy::HtmlFirst.preferences();
        match select(root.walk(), preferences) {
            Some((part, 0)) => self.decode_part(part),
            Some((part, _)) => self.decode_part(part).replace('\n', "<br />"),
            None => String::new(),
        }
    }

    fn extract_plain_first(&self, parts: &[Part]) -> String {
        if parts.is_empty() {
            return String::new();
        }

        let preferences = ExtractionPolicy::PlainFirst.preferences();
        if let Some((part, _)) = select(parts, preferences) {
            return self.decode_part(part);
        }

        for part in parts {
            if let Part::Multipart { children, .. } = part {
                let content = self.extract_plain_first(children);
                if !content.is_empty() {
                    return content;
                }
            }
        }

        parts
            .iter()
            .find(|p| p.payload().is_some())
            .map(|p| self.decode_part(p))
            .unwrap_or_default()
    }

    fn decode_part(&self, part: &Part) -> String {
        part.payload()
            .map(|data| self.decoder.decode(data))
            .unwrap_or_default()
    }
}
