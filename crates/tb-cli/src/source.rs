//! Listing ingestion for plain and literate formats.
//!
//! - **Literate** (`.md`): Markdown files where fenced code blocks tagged
//!   `vliw` hold the listing and everything else is prose.
//! - **Plain** (anything else): the whole file is listing text.
//!
//! Every extracted line keeps its line number in the original file so
//! listing errors point at the right place.

use std::path::Path;

/// Fence language tag that marks listing blocks in literate files.
pub const LITERATE_TAG: &str = "vliw";

/// A listing line with its original location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    /// Line text without the trailing newline.
    pub text: String,
    /// 1-indexed line number in the original file.
    pub original_line: usize,
}

/// Extracts listing lines from `content`, choosing the format from `file_path`.
#[must_use]
pub fn extract_source(file_path: &Path, content: &str) -> Vec<SourceLine> {
    if is_literate_file(file_path) {
        extract_literate_source(content)
    } else {
        content
            .lines()
            .enumerate()
            .map(|(idx, line)| SourceLine {
                text: line.to_owned(),
                original_line: idx + 1,
            })
            .collect()
    }
}

fn is_literate_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
}

fn extract_literate_source(content: &str) -> Vec<SourceLine> {
    let mut lines = Vec::new();
    let mut open_fence: Option<usize> = None;

    for (idx, line) in content.lines().enumerate() {
        let fence = fence_length(line);
        match (open_fence, fence) {
            (Some(open), Some(len)) if len >= open => open_fence = None,
            (None, Some(len)) => {
                let tag = line.trim_start()[len..].trim();
                if tag.split_whitespace().next() == Some(LITERATE_TAG) {
                    open_fence = Some(len);
                }
            }
            (Some(_), _) => lines.push(SourceLine {
                text: line.to_owned(),
                original_line: idx + 1,
            }),
            (None, None) => {}
        }
    }

    lines
}

/// Number of leading backticks when `line` is a fence (three or more).
fn fence_length(line: &str) -> Option<usize> {
    let count = line.trim_start().chars().take_while(|&c| c == '`').count();
    (count >= 3).then_some(count)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::extract_source;

    #[test]
    fn plain_file_passthrough() {
        let lines = extract_source(Path::new("loop.lst"), "B .S2 LOOP\n; note\nNOP\n");
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1].text, "; note");
        assert_eq!(lines[2].original_line, 3);
    }

    #[test]
    fn literate_file_keeps_only_tagged_blocks() {
        let content = "# Loop\n\n```vliw\nSPLOOP 1\n```\n\n```text\nignored\n```\n```vliw\nNOP\n```\n";
        let lines = extract_source(Path::new("loop.md"), content);
        let texts: Vec<(&str, usize)> = lines
            .iter()
            .map(|line| (line.text.as_str(), line.original_line))
            .collect();
        assert_eq!(texts, vec![("SPLOOP 1", 4), ("NOP", 11)]);
    }

    #[test]
    fn shorter_fence_inside_block_is_content() {
        let content = "````vliw\n```\nNOP\n````\n";
        let lines = extract_source(Path::new("nested.MD"), content);
        let texts: Vec<&str> = lines.iter().map(|line| line.text.as_str()).collect();
        assert_eq!(texts, vec!["```", "NOP"]);
    }

    #[test]
    fn similar_tag_does_not_open_a_block() {
        let content = "```vliwx\nNOP\n```\n";
        assert!(extract_source(Path::new("doc.md"), content).is_empty());
    }
}
