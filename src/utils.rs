//! Utility functions for filename derivation and log formatting

/// Derive the filename to save a zone download under.
///
/// Tries the Content-Disposition header first (the CZDS API names the file
/// there, compression suffix included), then falls back to the URL path
/// basename. The extension is kept intact so a `.gz` download stays
/// recognizable for decompression.
///
/// Returns `None` when neither source yields a usable name.
pub fn filename_from_response(response: &reqwest::Response, url: &str) -> Option<String> {
    if let Some(content_disposition) = response.headers().get("content-disposition")
        && let Ok(value) = content_disposition.to_str()
    {
        // Format: attachment; filename="xyz.txt.gz" or filename*=UTF-8''xyz.txt.gz
        for part in value.split(';') {
            let part = part.trim();
            if let Some(name) = part.strip_prefix("filename=") {
                let name = name.trim_matches('"');
                if is_plain_basename(name) {
                    return Some(name.to_string());
                }
            } else if let Some(encoded) = part.strip_prefix("filename*=") {
                // RFC 5987: charset'lang'encoded-filename
                if let Some(idx) = encoded.rfind('\'')
                    && let Ok(decoded) = urlencoding::decode(&encoded[idx + 1..])
                    && is_plain_basename(&decoded)
                {
                    return Some(decoded.into_owned());
                }
            }
        }
    }

    // Fall back to the URL path basename
    if let Ok(parsed) = url::Url::parse(url)
        && let Some(mut segments) = parsed.path_segments()
        && let Some(last) = segments.next_back()
        && is_plain_basename(last)
    {
        return Some(last.to_string());
    }

    None
}

/// A name must stay inside the destination directory
fn is_plain_basename(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && name != "." && name != ".."
}

/// Format a byte count for human-readable log output
///
/// # Examples
///
/// ```
/// use czds_dl::utils::humanize_bytes;
///
/// assert_eq!(humanize_bytes(512), "512 B");
/// assert_eq!(humanize_bytes(1536), "1.50 KB");
/// ```
#[must_use]
pub fn humanize_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];

    let mut value = bytes as f64;
    for unit in UNITS {
        if value < 1024.0 {
            return if *unit == "B" {
                format!("{bytes} B")
            } else {
                format!("{value:.2} {unit}")
            };
        }
        value /= 1024.0;
    }

    format!("{value:.2} EB")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn basenames_with_separators_are_rejected() {
        assert!(is_plain_basename("xyz.txt.gz"));
        assert!(!is_plain_basename("../etc/passwd"));
        assert!(!is_plain_basename("a/b.txt"));
        assert!(!is_plain_basename("a\\b.txt"));
        assert!(!is_plain_basename(""));
        assert!(!is_plain_basename(".."));
    }

    #[test]
    fn humanize_bytes_whole_bytes() {
        assert_eq!(humanize_bytes(0), "0 B");
        assert_eq!(humanize_bytes(1023), "1023 B");
    }

    #[test]
    fn humanize_bytes_scales_units() {
        assert_eq!(humanize_bytes(1024), "1.00 KB");
        assert_eq!(humanize_bytes(1024 * 1024), "1.00 MB");
        assert_eq!(humanize_bytes(5 * 1024 * 1024 * 1024), "5.00 GB");
    }
}
