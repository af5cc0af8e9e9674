//! Literal extraction from source text.
//!
//! Finds the right-hand side of a declaration shaped like
//! `TWEAK(int, speed) = 42;` by plain text search. This is a lexical scan,
//! not a parser: string literals, comments and nested punctuation are not
//! understood, so a value containing `;` is cut short.

use std::fs;
use std::path::Path;

use crate::error::ReloadError;

/// Read a source file as text for scanning.
///
/// Bytes that are not valid UTF-8 are replaced, so a stray Latin-1 comment
/// does not hide the declarations around it.
pub fn read_source(path: &Path) -> Result<String, ReloadError> {
    let bytes = fs::read(path).map_err(|source| ReloadError::FileUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Pulls the literal assigned to a named tweak out of file contents.
pub trait Extractor: Send + Sync {
    /// Returns the trimmed literal text for `name`, or `None` if no
    /// declaration for it can be located.
    fn extract<'a>(&self, text: &'a str, name: &str) -> Option<&'a str>;
}

/// Default extractor: scans for `<marker>(<type>, <name>) = <literal>;`.
///
/// The first declaration whose name matches wins; later declarations of the
/// same name in the same file are unreachable.
#[derive(Debug, Clone)]
pub struct MarkerScanner {
    marker: String,
}

impl MarkerScanner {
    pub const DEFAULT_MARKER: &'static str = "TWEAK";

    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }
}

impl Default for MarkerScanner {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MARKER)
    }
}

impl Extractor for MarkerScanner {
    fn extract<'a>(&self, text: &'a str, name: &str) -> Option<&'a str> {
        if self.marker.is_empty() {
            return None;
        }

        let mut cursor = 0;
        while let Some(found) = text[cursor..].find(&self.marker) {
            let after_marker = cursor + found + self.marker.len();
            cursor = after_marker;

            let Some((declared, close)) = declared_name(text, after_marker) else {
                continue;
            };
            if declared != name {
                continue;
            }

            return assigned_literal(text, close + 1);
        }
        None
    }
}

/// Declared identifier of the argument list following `from`, plus the
/// byte offset of its closing parenthesis.
fn declared_name(text: &str, from: usize) -> Option<(&str, usize)> {
    let open = from + text[from..].find('(')?;
    let close = open + text[open..].find(')')?;
    let args = &text[open + 1..close];
    let (_, declared) = args.split_once(',')?;
    Some((declared.trim(), close))
}

/// Trimmed text between the first `=` at or after `from` and the next `;`.
fn assigned_literal(text: &str, from: usize) -> Option<&str> {
    let equals = from + text[from..].find('=')?;
    let semi = equals + text[equals..].find(';')?;
    Some(text[equals + 1..semi].trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_source_replaces_invalid_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("latin1.c");
        fs::write(&path, b"// d\xe9j\xe0 vu\nTWEAK(float, g) = 9.8;\n").unwrap();

        let text = read_source(&path).unwrap();
        assert_eq!(MarkerScanner::default().extract(&text, "g"), Some("9.8"));

        assert!(matches!(
            read_source(&dir.path().join("missing.c")),
            Err(ReloadError::FileUnreadable { .. })
        ));
    }

    fn scan(text: &str, name: &str) -> Option<String> {
        MarkerScanner::default()
            .extract(text, name)
            .map(str::to_string)
    }

    #[test]
    fn test_extract_basic_forms() {
        let src = r#"
            TWEAK(int, sec) = 1;
            TWEAK(char_ptr, who) = "world";
            TWEAK(float, value) = 2500;
        "#;

        assert_eq!(scan(src, "sec").as_deref(), Some("1"));
        assert_eq!(scan(src, "who").as_deref(), Some("\"world\""));
        assert_eq!(scan(src, "value").as_deref(), Some("2500"));
        assert_eq!(scan(src, "missing"), None);
    }

    #[test]
    fn test_extract_tolerates_whitespace() {
        let src = "TWEAK( int ,\tspeed\t)   =   12.5f  ;";
        assert_eq!(scan(src, "speed").as_deref(), Some("12.5f"));
    }

    #[test]
    fn test_extract_is_case_sensitive_and_exact() {
        let src = "TWEAK(int, Speed) = 1;\nTWEAK(int, speed_max) = 2;\nTWEAK(int, speed) = 3;";
        assert_eq!(scan(src, "speed").as_deref(), Some("3"));
        assert_eq!(scan(src, "Speed").as_deref(), Some("1"));
        assert_eq!(scan(src, "SPEED"), None);
    }

    #[test]
    fn test_first_declaration_wins() {
        let src = "TWEAK(int, x) = 1;\nTWEAK(int, x) = 2;";
        assert_eq!(scan(src, "x").as_deref(), Some("1"));
    }

    #[test]
    fn test_empty_literal_is_returned_as_empty() {
        let src = "TWEAK(int, x) = ;";
        assert_eq!(scan(src, "x").as_deref(), Some(""));
    }

    #[test]
    fn test_missing_delimiters() {
        assert_eq!(scan("TWEAK(int, x) = 4", "x"), None);
        assert_eq!(scan("TWEAK(int, x) 4;", "x"), None);
        assert_eq!(scan("TWEAK(int x) = 4;", "x"), None);
        assert_eq!(scan("TWEAK int, x = 4;", "x"), None);
        assert_eq!(scan("TWEAK(int, x = 4;", "x"), None);
        assert_eq!(scan("", "x"), None);
    }

    #[test]
    fn test_unrelated_markers_are_skipped() {
        let src = "// TWEAK here is just a comment\nTWEAK(float, gain) = 0.75;";
        assert_eq!(scan(src, "gain").as_deref(), Some("0.75"));
    }

    #[test]
    fn test_custom_marker() {
        let scanner = MarkerScanner::new("LIVE");
        let src = "TWEAK(int, a) = 1;\nLIVE(int, a) = 2;";
        assert_eq!(scanner.extract(src, "a"), Some("2"));
        assert_eq!(scanner.marker(), "LIVE");
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let src = "TWEAK(int, x) = 42;";
        let first = scan(src, "x");
        for _ in 0..3 {
            assert_eq!(scan(src, "x"), first);
        }
    }

    #[test]
    fn test_semicolon_in_string_truncates() {
        // Accepted limitation of the lexical scan
        let src = r#"TWEAK(char_ptr, s) = "a;b";"#;
        assert_eq!(scan(src, "s").as_deref(), Some("\"a"));
    }
}
