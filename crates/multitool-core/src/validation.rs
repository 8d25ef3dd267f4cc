//! Upload validation: extension allow-lists and filename sanitization.

use std::path::Path;

/// Image extensions accepted by the image endpoints
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "tiff", "webp"];

/// PDF extensions accepted by the PDF endpoints
pub const PDF_EXTENSIONS: &[&str] = &["pdf"];

/// Video extensions (video endpoints are not implemented yet)
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "wmv", "flv", "webm", "mkv"];

/// Characters that are never allowed in a stored filename
const UNSAFE_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Lowercased extension of `filename` without the leading dot.
///
/// Returns an empty string when there is no extension. A name made only of a
/// leading dot and a word (`.png`) is a hidden file with no extension.
pub fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Check whether `filename` carries one of the `allowed` extensions.
///
/// # Examples
/// ```
/// use multitool_core::validation::{is_allowed_extension, IMAGE_EXTENSIONS};
///
/// assert!(is_allowed_extension("photo.JPG", IMAGE_EXTENSIONS));
/// assert!(!is_allowed_extension("notes.txt", IMAGE_EXTENSIONS));
/// assert!(!is_allowed_extension("README", IMAGE_EXTENSIONS));
/// ```
pub fn is_allowed_extension(filename: &str, allowed: &[&str]) -> bool {
    let extension = extension_of(filename);
    allowed.iter().any(|candidate| *candidate == extension)
}

/// Replace filesystem-hostile characters with `_`, collapse `_` runs and
/// strip `_` from both ends.
///
/// ```
/// use multitool_core::validation::get_safe_filename;
///
/// assert_eq!(get_safe_filename("a//b??c.png"), "a_b_c.png");
/// ```
pub fn get_safe_filename(name: &str) -> String {
    let mut safe = String::with_capacity(name.len());
    for c in name.chars() {
        let c = if UNSAFE_CHARS.contains(&c) { '_' } else { c };
        if c == '_' && safe.ends_with('_') {
            continue;
        }
        safe.push(c);
    }
    safe.trim_matches('_').to_string()
}

/// Normalise a client-supplied upload name.
///
/// Path separators become word breaks, non-ASCII characters are dropped,
/// whitespace runs are joined with `_` and anything outside
/// `[A-Za-z0-9_.-]` is removed. Leading and trailing `.`/`_` are stripped so
/// the result can never name a parent directory. May return an empty string.
pub fn secure_filename(name: &str) -> String {
    let spaced: String = name
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");

    joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect::<String>()
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_extension_is_lowercased() {
        assert_eq!(extension_of("Scan.PDF"), "pdf");
        assert_eq!(extension_of("archive.tar.gz"), "gz");
    }

    #[test]
    fn test_missing_extension_is_empty() {
        assert_eq!(extension_of("Makefile"), "");
        assert_eq!(extension_of(".png"), "");
    }

    #[test]
    fn test_allowed_extension() {
        assert!(is_allowed_extension("a.webp", IMAGE_EXTENSIONS));
        assert!(is_allowed_extension("doc.pdf", PDF_EXTENSIONS));
        assert!(!is_allowed_extension("doc.pdf", IMAGE_EXTENSIONS));
        assert!(!is_allowed_extension("clip.mp4", PDF_EXTENSIONS));
        assert!(is_allowed_extension("clip.MKV", VIDEO_EXTENSIONS));
    }

    #[test]
    fn test_no_extension_only_allowed_with_empty_entry() {
        assert!(!is_allowed_extension("noext", IMAGE_EXTENSIONS));
        assert!(is_allowed_extension("noext", &["", "png"]));
    }

    #[test]
    fn test_safe_filename_collapses_replacements() {
        assert_eq!(get_safe_filename("a//b??c.png"), "a_b_c.png");
        assert_eq!(get_safe_filename("<report>.pdf"), "report_.pdf");
        assert_eq!(get_safe_filename("__x___y__"), "x_y");
        assert_eq!(get_safe_filename("C:\\dir\\file|1.txt"), "C_dir_file_1.txt");
    }

    #[test]
    fn test_safe_filename_all_unsafe_is_empty() {
        assert_eq!(get_safe_filename("??**"), "");
    }

    #[test]
    fn test_secure_filename_strips_traversal() {
        assert_eq!(secure_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(secure_filename("My cool photo.jpg"), "My_cool_photo.jpg");
        assert_eq!(secure_filename("ünïcode.png"), "ncode.png");
        assert_eq!(secure_filename("..."), "");
    }

    proptest! {
        #[test]
        fn safe_filename_never_contains_unsafe_chars(name in ".{0,64}") {
            let safe = get_safe_filename(&name);
            prop_assert!(!safe.contains(UNSAFE_CHARS));
            prop_assert!(!safe.contains("__"));
            prop_assert!(!safe.starts_with('_'));
            prop_assert!(!safe.ends_with('_'));
        }

        #[test]
        fn safe_filename_is_idempotent(name in ".{0,64}") {
            let once = get_safe_filename(&name);
            prop_assert_eq!(get_safe_filename(&once), once);
        }

        #[test]
        fn secure_filename_keeps_a_plain_charset(name in ".{0,64}") {
            let secured = secure_filename(&name);
            prop_assert!(secured
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')));
            prop_assert!(!secured.starts_with('.'));
        }
    }
}
