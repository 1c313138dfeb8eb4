//! Target name mapping masks for copy and move.
//!
//! A mask such as `*.bak` or `backup_*.*` is applied separately to the name
//! and extension halves of a file name: `*` inserts the rest of the original
//! half, `?` copies the original character at that position and any other
//! character is taken literally.

/// Check if a mask maps every name to itself.
pub fn is_identity_mask(mask: &str) -> bool {
    matches!(mask, "" | "*" | "*.*")
}

/// Map `name` through `mask`.
pub fn apply_mask(name: &str, mask: &str) -> String {
    if is_identity_mask(mask) {
        return name.to_string();
    }

    let (name_stem, name_ext) = split_extension(name);
    let (mask_stem, mask_ext) = split_extension(mask);

    let mut result = apply_part(name_stem, mask_stem);
    if let Some(mask_ext) = mask_ext {
        let ext = apply_part(name_ext.unwrap_or(""), mask_ext);
        if !ext.is_empty() {
            result.push('.');
            result.push_str(&ext);
        }
    }

    // "name." is not a valid name on every file system
    while result.ends_with('.') {
        result.pop();
    }
    result
}

fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) => (stem, Some(ext)),
        None => (name, None),
    }
}

fn apply_part(source: &str, pattern: &str) -> String {
    let source: Vec<char> = source.chars().collect();
    let mut pos = 0;
    let mut out = String::with_capacity(source.len() + pattern.len());

    for c in pattern.chars() {
        match c {
            '*' => {
                out.extend(&source[pos.min(source.len())..]);
                pos = source.len();
            }
            '?' => {
                if let Some(&ch) = source.get(pos) {
                    out.push(ch);
                }
                pos += 1;
            }
            literal => {
                out.push(literal);
                pos += 1;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_masks() {
        assert_eq!(apply_mask("report.txt", ""), "report.txt");
        assert_eq!(apply_mask("report.txt", "*"), "report.txt");
        assert_eq!(apply_mask("report.txt", "*.*"), "report.txt");
    }

    #[test]
    fn test_extension_replacement() {
        assert_eq!(apply_mask("report.txt", "*.bak"), "report.bak");
        assert_eq!(apply_mask("README", "*.md"), "README.md");
    }

    #[test]
    fn test_prefix_and_question_marks() {
        assert_eq!(apply_mask("report.txt", "backup_*.*"), "backup_report.txt");
        assert_eq!(apply_mask("photo.jpeg", "*.???"), "photo.jpe");
        assert_eq!(apply_mask("abc.txt", "?x?.*"), "axc.txt");
    }

    #[test]
    fn test_empty_extension_drops_dot() {
        assert_eq!(apply_mask("README", "*.*"), "README");
        assert_eq!(apply_mask("archive.tar", "*."), "archive");
    }
}
