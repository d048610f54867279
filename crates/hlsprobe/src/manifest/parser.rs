use std::collections::HashSet;

const EXTINF_PREFIX: &str = "#EXTINF:";

/// Segment references and duration information pulled out of one manifest body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedManifest {
    /// Segment references in document order, without duplicates
    pub segments: Vec<String>,
    /// Value of the last `#EXTINF` directive in the document, in seconds.
    /// `None` if the document had none, or the last one was unusable.
    pub last_duration: Option<f64>,
}

/// Splits a manifest body into directives and segment references.
///
/// Lines starting with `#` are directives; every other non-empty line is a
/// segment reference. Only the final `#EXTINF` value in the body is kept.
pub fn parse_manifest(body: &str) -> ParsedManifest {
    let mut parsed = ParsedManifest::default();
    let mut seen = HashSet::new();
    let mut last_extinf: Option<&str> = None;

    for line in body.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }

        if line.starts_with('#') {
            if let Some(value) = line.strip_prefix(EXTINF_PREFIX) {
                last_extinf = Some(value);
            }
            continue;
        }

        if seen.insert(line) {
            parsed.segments.push(line.to_string());
        }
    }

    parsed.last_duration = last_extinf.and_then(parse_extinf_duration);
    parsed
}

/// Parses the `<seconds>,[title]` payload of an `#EXTINF` directive.
fn parse_extinf_duration(value: &str) -> Option<f64> {
    let number = value.split(',').next().unwrap_or_default().trim();
    number
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs > 0.0)
}
