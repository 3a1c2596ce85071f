//! Path sanitization for archive entries.
//!
//! Every entry path taken from an archive index passes through
//! [`validate_entry_path`] before it is used to build a write target. The
//! same module owns key joining so deletions and writes agree on key shape.

use thiserror::Error;

/// Reasons an entry path is refused.
///
/// A rejection is not an extraction failure: the coordinator skips the
/// entry and logs it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathRejection {
    /// The basename is empty (directory entry or trailing separator).
    #[error("empty basename: {0:?}")]
    EmptyBasename(String),

    /// The basename is `.` or `..`.
    #[error("self-referencing basename: {0:?}")]
    SelfReference(String),

    /// The path contains a `..` component.
    #[error("path traversal attempt: {0:?}")]
    ParentTraversal(String),

    /// The path is rooted or carries a drive prefix.
    #[error("absolute path not allowed: {0:?}")]
    AbsolutePath(String),
}

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

/// Returns the final component of `path`, treating both `/` and `\` as
/// separators. A trailing separator yields an empty basename.
///
/// ```
/// use unpacker::safety::basename;
///
/// assert_eq!(basename("assets/x.png"), "x.png");
/// assert_eq!(basename("assets/"), "");
/// assert_eq!(basename("..\\evil.js"), "evil.js");
/// ```
pub fn basename(path: &str) -> &str {
    match path.rfind(is_separator) {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Validates and normalizes an archive entry path.
///
/// The entry is refused when:
/// - its basename is empty, `.` or `..`
/// - any component is `..`
/// - it starts with a separator or a drive prefix such as `C:`
///
/// Otherwise redundant `.` and empty components are dropped and the result
/// is rebuilt with `/` separators.
///
/// ```
/// use unpacker::safety::validate_entry_path;
///
/// assert_eq!(validate_entry_path("./assets//x.png").unwrap(), "assets/x.png");
/// assert!(validate_entry_path("../evil.js").is_err());
/// assert!(validate_entry_path("content/").is_err());
/// ```
pub fn validate_entry_path(raw: &str) -> Result<String, PathRejection> {
    match basename(raw) {
        "" => return Err(PathRejection::EmptyBasename(raw.to_string())),
        "." | ".." => return Err(PathRejection::SelfReference(raw.to_string())),
        _ => {}
    }

    if raw.starts_with(is_separator) || has_drive_prefix(raw) {
        return Err(PathRejection::AbsolutePath(raw.to_string()));
    }

    let mut parts = Vec::new();
    for component in raw.split(is_separator) {
        match component {
            "" | "." => continue,
            ".." => return Err(PathRejection::ParentTraversal(raw.to_string())),
            part => parts.push(part),
        }
    }

    Ok(parts.join("/"))
}

/// `C:`, `C:/...` or `C:\...`; a colon elsewhere in a name is allowed.
fn has_drive_prefix(raw: &str) -> bool {
    let mut chars = raw.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some(letter), Some(':'), next) => {
            letter.is_ascii_alphabetic() && next.map_or(true, is_separator)
        }
        _ => false,
    }
}

/// Joins a store prefix and a relative name with a single `/`.
///
/// An empty prefix addresses the store root.
pub fn join_key(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else if name.is_empty() {
        prefix.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_entry_path_valid() {
        assert_eq!(validate_entry_path("index.html").unwrap(), "index.html");
        assert_eq!(
            validate_entry_path("content/images/x.png").unwrap(),
            "content/images/x.png"
        );
        assert_eq!(validate_entry_path("./content/x.json").unwrap(), "content/x.json");
        assert_eq!(validate_entry_path("a//b/./c.txt").unwrap(), "a/b/c.txt");
    }

    #[test]
    fn test_validate_entry_path_rejected_basenames() {
        assert_eq!(
            validate_entry_path(""),
            Err(PathRejection::EmptyBasename(String::new()))
        );
        assert!(matches!(
            validate_entry_path("content/"),
            Err(PathRejection::EmptyBasename(_))
        ));
        assert!(matches!(
            validate_entry_path("."),
            Err(PathRejection::SelfReference(_))
        ));
        assert!(matches!(
            validate_entry_path("content/.."),
            Err(PathRejection::SelfReference(_))
        ));
        assert!(matches!(
            validate_entry_path("content/."),
            Err(PathRejection::SelfReference(_))
        ));
    }

    #[test]
    fn test_validate_entry_path_traversal() {
        assert!(matches!(
            validate_entry_path("../evil.js"),
            Err(PathRejection::ParentTraversal(_))
        ));
        assert!(matches!(
            validate_entry_path("safe/../../etc/passwd"),
            Err(PathRejection::ParentTraversal(_))
        ));
        assert!(matches!(
            validate_entry_path("..\\..\\windows\\evil.dll"),
            Err(PathRejection::ParentTraversal(_))
        ));
        assert!(matches!(
            validate_entry_path("./../../etc/passwd"),
            Err(PathRejection::ParentTraversal(_))
        ));
    }

    #[test]
    fn test_validate_entry_path_absolute() {
        assert!(matches!(
            validate_entry_path("/etc/passwd"),
            Err(PathRejection::AbsolutePath(_))
        ));
        assert!(matches!(
            validate_entry_path("\\temp\\x.txt"),
            Err(PathRejection::AbsolutePath(_))
        ));
        assert!(matches!(
            validate_entry_path("C:/Windows/x.txt"),
            Err(PathRejection::AbsolutePath(_))
        ));
        assert!(matches!(
            validate_entry_path("d:\\x.txt"),
            Err(PathRejection::AbsolutePath(_))
        ));
        assert!(matches!(
            validate_entry_path("C:"),
            Err(PathRejection::AbsolutePath(_))
        ));
    }

    #[test]
    fn test_validate_entry_path_colon_in_name() {
        assert_eq!(validate_entry_path("a:notes.txt").unwrap(), "a:notes.txt");
        assert_eq!(validate_entry_path("docs/c:d.txt").unwrap(), "docs/c:d.txt");
    }

    #[test]
    fn test_validate_entry_path_backslashes_normalized() {
        assert_eq!(validate_entry_path("dir\\file.txt").unwrap(), "dir/file.txt");
    }

    #[test]
    fn test_validate_entry_path_unicode() {
        assert_eq!(
            validate_entry_path("日本語/ファイル.txt").unwrap(),
            "日本語/ファイル.txt"
        );
        assert!(validate_entry_path("中文/../x.txt").is_err());
    }

    #[test]
    fn test_join_key() {
        assert_eq!(join_key("h5p/42", "index.html"), "h5p/42/index.html");
        assert_eq!(join_key("h5p/42/", "index.html"), "h5p/42/index.html");
        assert_eq!(join_key("", "index.html"), "index.html");
        assert_eq!(join_key("h5p", ""), "h5p");
    }
}
