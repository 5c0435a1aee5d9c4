/// Sanitize a string for use in a cache filename: strip the characters that
/// are invalid (or awkward) across common filesystems, then truncate to
/// 100 characters.
pub fn sanitize_filename(name: &str) -> String {
    const INVALID: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
    let cleaned: String = name.chars().filter(|c| !INVALID.contains(c)).collect();
    let truncated: String = cleaned.chars().take(100).collect();
    truncated.trim().to_string()
}

/// Destination filename for a fetched track, derived from sanitized
/// `"{artist} - {title}.mp3"`.
pub fn cache_filename(artist: &str, title: &str) -> String {
    format!(
        "{} - {}.mp3",
        sanitize_filename(artist),
        sanitize_filename(title)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_invalid_characters() {
        assert_eq!(sanitize_filename("AC/DC"), "ACDC");
        assert_eq!(sanitize_filename(r#"Who: "Baba O'Riley""#), "Who Baba ORiley");
    }

    #[test]
    fn truncates_to_100_chars() {
        let long = "a".repeat(150);
        assert_eq!(sanitize_filename(&long).len(), 100);
    }

    #[test]
    fn builds_expected_cache_filename() {
        assert_eq!(
            cache_filename("Taylor Swift", "Shake It Off"),
            "Taylor Swift - Shake It Off.mp3"
        );
    }
}
