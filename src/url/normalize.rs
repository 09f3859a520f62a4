use crate::UrlError;
use url::Url;

/// Normalizes a discovered URL into the form handed downstream
///
/// Only absolute http/https URLs are accepted. The fragment and a trailing
/// slash on a non-root path are removed; the query is kept exactly as found.
///
/// # Examples
///
/// ```
/// use pagecrawl::url::normalize_url;
///
/// let url = normalize_url("https://EXAMPLE.COM/article/2024/01/?id=7#comments").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/article/2024/01?id=7");
/// ```
pub fn normalize_url(raw: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(raw).map_err(|e| UrlError::Parse(e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }
    if url.host_str().is_none() {
        return Err(UrlError::MissingDomain);
    }

    url.set_fragment(None);
    let trimmed = url.path().trim_end_matches('/');
    if !trimmed.is_empty() && trimmed.len() != url.path().len() {
        let trimmed = trimmed.to_string();
        url.set_path(&trimmed);
    }

    Ok(url)
}

/// Builds the de-duplication key for a URL: scheme, host, port and path
///
/// Query and fragment are ignored, a leading `www.` is dropped and the path
/// loses its trailing slash, so `https://www.example.com/a/` and
/// `https://example.com/a?ref=x#top` share one key.
pub fn dedup_key(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    let path = normalize_path(url.path());
    let path = if path == "/" { "" } else { path.as_str() };

    match url.port() {
        Some(port) => format!("{}://{}:{}{}", url.scheme(), host, port, path),
        None => format!("{}://{}{}", url.scheme(), host, path),
    }
}

/// Resolves `.`/`..`, drops empty segments and any trailing slash
fn normalize_path(path: &str) -> String {
    let segments = path.split('/').fold(Vec::new(), |mut kept, segment| {
        match segment {
            "" | "." => {}
            ".." => {
                kept.pop();
            }
            _ => kept.push(segment),
        }
        kept
    });

    format!("/{}", segments.join("/"))
}
