//! URL list input handling for the batch front ends

use std::path::Path;

use crate::core::models::{AppError, AppResult};

/// Parse URLs from free-form text: one per line or separated by commas or
/// whitespace. Blank entries and `#` comment lines are ignored.
pub fn parse_urls_from_text(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .flat_map(|line| line.split(|c: char| c == ',' || c.is_whitespace()))
        .filter(|token| !token.is_empty())
        .map(|token| token.to_string())
        .collect()
}

/// Load URLs from a text file (one URL per line, `#` lines are comments).
pub fn load_urls_from_file(path: &Path) -> AppResult<Vec<String>> {
    let text = std::fs::read_to_string(path).map_err(|err| {
        AppError::InvalidInput(format!("Cannot read URL file {}: {}", path.display(), err))
    })?;
    let urls = parse_urls_from_text(&text);
    if urls.is_empty() {
        return Err(AppError::InvalidInput(format!(
            "URL file {} contains no URLs",
            path.display()
        )));
    }
    Ok(urls)
}

/// Resolve the URL list for a run from a single URL and/or a URL file.
/// The file wins when both are given; an empty result is an input error.
pub fn resolve_urls(single_url: Option<&str>, urls_file: Option<&str>) -> AppResult<Vec<String>> {
    if let Some(path) = urls_file.filter(|p| !p.trim().is_empty()) {
        return load_urls_from_file(Path::new(path.trim()));
    }
    match single_url.map(str::trim).filter(|url| !url.is_empty()) {
        Some(url) => Ok(vec![url.to_string()]),
        None => Err(AppError::InvalidInput("No URL provided".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_urls_skips_blanks_comments_and_trims() {
        let text = "https://a.example\n# playlist for later\n  https://b.example  \n\t\n";
        assert_eq!(
            parse_urls_from_text(text),
            vec!["https://a.example", "https://b.example"]
        );
    }

    #[test]
    fn test_parse_urls_splits_commas_and_spaces() {
        assert_eq!(
            parse_urls_from_text("https://a, https://b https://c"),
            vec!["https://a", "https://b", "https://c"]
        );
    }

    #[test]
    fn test_load_urls_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "https://a.example").unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file, "  https://b.example").unwrap();

        let urls = load_urls_from_file(file.path()).unwrap();
        assert_eq!(urls, vec!["https://a.example", "https://b.example"]);
    }

    #[test]
    fn test_load_urls_rejects_empty_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# nothing yet").unwrap();
        assert!(load_urls_from_file(file.path()).is_err());
    }

    #[test]
    fn test_resolve_urls_prefers_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "https://from-file.example").unwrap();

        let urls = resolve_urls(
            Some("https://single.example"),
            Some(file.path().to_str().unwrap()),
        )
        .unwrap();
        assert_eq!(urls, vec!["https://from-file.example"]);
    }

    #[test]
    fn test_resolve_urls_falls_back_to_single() {
        assert_eq!(
            resolve_urls(Some("  https://single.example "), None).unwrap(),
            vec!["https://single.example"]
        );
        assert!(resolve_urls(None, None).is_err());
        assert!(resolve_urls(Some("   "), None).is_err());
    }
}
