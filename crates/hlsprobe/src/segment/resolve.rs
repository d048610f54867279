use url::Url;

use crate::error::FetchError;

/// Resolves a segment reference against the manifest URL.
///
/// The manifest's query string and fragment are dropped first, since they
/// usually carry access tokens scoped to the manifest. A reference starting
/// with `/` replaces the path; any other relative reference is joined to the
/// manifest's directory.
pub fn resolve_segment_url(manifest_url: &Url, segment: &str) -> Result<Url, FetchError> {
    let mut base = manifest_url.clone();
    base.set_query(None);
    base.set_fragment(None);

    base.join(segment)
        .map_err(|e| FetchError::invalid_url(segment, e))
}
