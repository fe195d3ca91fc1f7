/// Trims the value and returns `None` when nothing is left.
pub fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Case-insensitive substring match using full Unicode lowercasing, so
/// "matemática" finds "MATEMÁTICA".
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Keeps ASCII alphanumerics, `.`, `-` and `_`; everything else becomes `_`.
/// Leading dots are dropped so the result can never climb out of a directory.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_trims_and_drops_blank() {
        assert_eq!(non_empty(Some("  ana  ")), Some("ana".to_string()));
        assert_eq!(non_empty(Some("   ")), None);
        assert_eq!(non_empty(None), None);
    }

    #[test]
    fn contains_ignore_case_folds_accents() {
        assert!(contains_ignore_case("MATEMÁTICA", "matemática"));
        assert!(contains_ignore_case("João Souza", "JOÃO"));
        assert!(!contains_ignore_case("Ciências", "matemática"));
    }

    #[test]
    fn sanitize_filename_strips_path_tricks() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_filename("foto perfil.png"), "foto_perfil.png");
        assert_eq!(sanitize_filename("..."), "upload");
    }
}
