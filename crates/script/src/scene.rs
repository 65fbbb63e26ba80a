//! Scene-block extraction: bracketed time-range delimiters open blocks, the
//! lines that follow become their content.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::timecode::parse_range;

/// Opaque scene-block identifier, unique within one reparse generation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId(String);

impl BlockId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BlockId {
    fn default() -> Self {
        Self::new()
    }
}

/// A time-addressed content region of the script. Immutable; the whole list
/// is replaced on every re-parse, never patched in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneBlock {
    pub id: BlockId,
    pub start: f64,
    pub end: f64,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub content: Option<String>,
    pub line: usize,
    pub media_path: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl SceneBlock {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Parse the optional `Header` prologue: `Key: Value` lines terminated by a
/// `---` rule before the first block delimiter. Returns the collected pairs
/// and the 1-based line after the rule (1 when no prologue exists).
pub fn parse_script_header(text: &str) -> (BTreeMap<String, String>, usize) {
    let mut pairs = BTreeMap::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed == "---" {
            return (pairs, idx + 2);
        }
        if is_delimiter(trimmed) {
            break;
        }
        if let Some((key, value)) = trimmed.split_once(':') {
            let key = key.trim();
            let value = value.trim();
            if !key.is_empty() && !value.is_empty() && !key.contains(char::is_whitespace) {
                pairs.insert(key.to_lowercase(), value.to_string());
            }
        }
    }
    (BTreeMap::new(), 1)
}

/// Parse the full script text into an ordered list of scene blocks.
///
/// A line is a delimiter iff its trimmed form is `[<range>]` with a valid
/// range body; malformed ranges make the line ordinary content. Content
/// before the first delimiter is discarded. Empty input yields no blocks.
pub fn parse_scene_blocks(text: &str) -> Vec<SceneBlock> {
    let (header, _) = parse_script_header(text);
    let media_path = header.get("file").or_else(|| header.get("source")).cloned();

    let mut blocks = Vec::new();
    let mut open: Option<OpenBlock> = None;

    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if let Some((start, end)) = delimiter_range(trimmed) {
            if let Some(block) = open.take() {
                blocks.push(block.finish(&header, media_path.clone()));
            }
            open = Some(OpenBlock {
                start: start as f64,
                end: end as f64,
                line: idx + 1,
                buffer: Vec::new(),
            });
            continue;
        }
        if let Some(block) = open.as_mut() {
            block.buffer.push(line.to_string());
        }
        // Lines before the first delimiter are discarded.
    }

    if let Some(block) = open.take() {
        blocks.push(block.finish(&header, media_path));
    }

    tracing::debug!(blocks = blocks.len(), "scene parse complete");
    blocks
}

fn is_delimiter(trimmed: &str) -> bool {
    delimiter_range(trimmed).is_some()
}

fn delimiter_range(trimmed: &str) -> Option<(u32, u32)> {
    let body = trimmed.strip_prefix('[')?.strip_suffix(']')?;
    let (start, end) = parse_range(body)?;
    if start >= end {
        return None;
    }
    Some((start, end))
}

struct OpenBlock {
    start: f64,
    end: f64,
    line: usize,
    buffer: Vec<String>,
}

impl OpenBlock {
    fn finish(self, header: &BTreeMap<String, String>, media_path: Option<String>) -> SceneBlock {
        let content = self.buffer.join("\n").trim().to_string();
        let mut text_lines = content.lines().map(str::trim).filter(|l| !l.is_empty());
        let title = text_lines.next().map(str::to_string);
        let subtitle = text_lines.next().map(str::to_string);
        SceneBlock {
            id: BlockId::new(),
            start: self.start,
            end: self.end,
            title,
            subtitle,
            content: if content.is_empty() { None } else { Some(content) },
            line: self.line,
            media_path,
            metadata: header.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_block_with_title() {
        let blocks = parse_scene_blocks("[00:05-00:10]\nHello");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].start, 5.0);
        assert_eq!(blocks[0].end, 10.0);
        assert_eq!(blocks[0].title.as_deref(), Some("Hello"));
        assert_eq!(blocks[0].line, 1);
    }

    #[test]
    fn content_before_first_delimiter_is_discarded() {
        let blocks = parse_scene_blocks("intro prose\nmore prose\n[00:00-00:05]\nOpening");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].title.as_deref(), Some("Opening"));
        assert_eq!(blocks[0].line, 3);
    }

    #[test]
    fn malformed_delimiter_becomes_content() {
        let text = "[00:05-00:10]\n[0:5-0:9]\nstill the first block";
        let blocks = parse_scene_blocks(text);
        assert_eq!(blocks.len(), 1);
        // The bad bracket line stays in the buffer as ordinary text.
        assert_eq!(blocks[0].title.as_deref(), Some("[0:5-0:9]"));
        assert_eq!(blocks[0].subtitle.as_deref(), Some("still the first block"));
    }

    #[test]
    fn inverted_range_is_not_a_delimiter() {
        let blocks = parse_scene_blocks("[00:10-00:05]\ntext");
        assert!(blocks.is_empty());
    }

    #[test]
    fn multiple_blocks_split_content() {
        let text = "[00:00-00:05]\nFirst\ndetail line\n[00:05-00:10]\nSecond";
        let blocks = parse_scene_blocks(text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].title.as_deref(), Some("First"));
        assert_eq!(blocks[0].subtitle.as_deref(), Some("detail line"));
        assert_eq!(blocks[0].content.as_deref(), Some("First\ndetail line"));
        assert_eq!(blocks[1].title.as_deref(), Some("Second"));
        assert_eq!(blocks[1].line, 4);
    }

    #[test]
    fn hour_form_delimiter() {
        let blocks = parse_scene_blocks("[1:00:00-1:00:30]\nLate scene");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].start, 3600.0);
        assert_eq!(blocks[0].end, 3630.0);
    }

    #[test]
    fn empty_and_whitespace_input() {
        assert!(parse_scene_blocks("").is_empty());
        assert!(parse_scene_blocks("   \n\t\n").is_empty());
    }

    #[test]
    fn block_without_content_has_no_title() {
        let blocks = parse_scene_blocks("[00:00-00:05]\n\n[00:05-00:10]\nNamed");
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].title.is_none());
        assert!(blocks[0].content.is_none());
    }

    #[test]
    fn header_prologue_feeds_metadata() {
        let text = "file: intro.mp4\nauthor: ed\n---\n[00:00-00:05]\nScene";
        let (header, body_line) = parse_script_header(text);
        assert_eq!(header.get("file").map(String::as_str), Some("intro.mp4"));
        assert_eq!(body_line, 4);

        let blocks = parse_scene_blocks(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].media_path.as_deref(), Some("intro.mp4"));
        assert_eq!(blocks[0].metadata.get("author").map(String::as_str), Some("ed"));
        assert_eq!(blocks[0].line, 4);
    }

    #[test]
    fn no_header_means_empty_metadata() {
        let blocks = parse_scene_blocks("[00:00-00:05]\nScene");
        assert!(blocks[0].metadata.is_empty());
        assert!(blocks[0].media_path.is_none());
    }
}
