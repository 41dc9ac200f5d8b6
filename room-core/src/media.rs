use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaUrlError {
    #[error("unrecognized video link `{0}`")]
    Unrecognized(String),
}

/// Extract the canonical video identifier from any of the known YouTube
/// URL shapes:
///
/// - short link: `https://youtu.be/<id>`
/// - watch page: `https://www.youtube.com/watch?v=<id>`
/// - embed:      `https://www.youtube.com/embed/<id>`
///
/// An already-extracted identifier passes through unchanged, which makes
/// extraction idempotent. Anything else is a recoverable
/// [`MediaUrlError`], never a panic.
pub fn extract_video_id(input: &str) -> Result<String, MediaUrlError> {
    let input = input.trim();
    if is_video_id(input) {
        return Ok(input.to_string());
    }

    let unrecognized = || MediaUrlError::Unrecognized(input.to_string());
    let url = Url::parse(input).map_err(|_| unrecognized())?;
    let host = url.host_str().ok_or_else(unrecognized)?;

    let candidate = match host.trim_start_matches("www.").trim_start_matches("m.") {
        "youtu.be" => url.path_segments().and_then(|mut segs| segs.next()).map(str::to_string),
        "youtube.com" => match url.path() {
            "/watch" => url
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, value)| value.into_owned()),
            path => path.strip_prefix("/embed/").map(str::to_string),
        },
        _ => None,
    };

    match candidate {
        Some(id) if is_video_id(&id) => Ok(id),
        _ => Err(unrecognized()),
    }
}

// YouTube ids are URL-safe base64; no length check, the provider has
// never promised one.
fn is_video_id(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
