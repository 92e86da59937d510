use crate::tag::tag_field;

pub const BLOCK_DELIMITER: &str = "---";

/// True when `content` opens with a complete `---` ... `---` block.
pub fn has_frontmatter(content: &str) -> bool {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut lines = content.lines().map(|line| line.trim_end_matches('\r'));
    if lines.next() != Some(BLOCK_DELIMITER) {
        return false;
    }
    lines.any(|line| line == BLOCK_DELIMITER)
}

/// Prepend a metadata block holding only `tag` unless one is already present.
/// Returns the new text and whether it changed.
pub fn ensure_tag_block(content: &str, tag: &str) -> (String, bool) {
    if has_frontmatter(content) {
        return (content.to_string(), false);
    }
    let newline = detect_line_ending(content);
    let field = tag_field(tag);
    let out = format!("{BLOCK_DELIMITER}{newline}{field}{newline}{BLOCK_DELIMITER}{newline}{content}");
    (out, true)
}

pub fn detect_line_ending(content: &str) -> &'static str {
    if content.contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}
