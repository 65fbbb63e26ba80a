//! The line-oriented edit command grammar.
//!
//! Lines that do not start with a known keyword are prose and skipped; lines
//! that look like a command but carry invalid fields become [`ParseError`]s
//! and the command is dropped. No failure aborts the scan.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ScriptError;
use crate::timecode::{format_timestamp, parse_timestamp};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CommandKind {
    #[serde(rename = "load")]
    Load { path: String },

    #[serde(rename = "cut")]
    Cut { at: f64 },

    #[serde(rename = "hide")]
    Hide { start: f64, end: f64 },

    #[serde(rename = "show")]
    Show { start: f64, end: f64 },

    #[serde(rename = "delete")]
    Delete { start: f64, end: f64 },

    #[serde(rename = "merge")]
    Merge { start: f64, end: f64 },

    #[serde(rename = "speed")]
    Speed { rate: f64, start: f64, end: f64 },
}

impl CommandKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            CommandKind::Load { .. } => "LOAD",
            CommandKind::Cut { .. } => "CUT",
            CommandKind::Hide { .. } => "HIDE",
            CommandKind::Show { .. } => "SHOW",
            CommandKind::Delete { .. } => "DELETE",
            CommandKind::Merge { .. } => "MERGE",
            CommandKind::Speed { .. } => "SPEED",
        }
    }
}

/// One typed edit command with the script line it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditCommand {
    pub kind: CommandKind,
    pub line: usize,
}

impl fmt::Display for EditCommand {
    /// Canonical command line. Parsing the rendered form yields an equal
    /// command, so programmatically appended lines persist byte-identically.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            CommandKind::Load { path } => {
                if path.contains(char::is_whitespace) {
                    write!(f, "LOAD \"{path}\"")
                } else {
                    write!(f, "LOAD {path}")
                }
            }
            CommandKind::Cut { at } => write!(f, "CUT {}", format_timestamp(*at)),
            CommandKind::Hide { start, end } => {
                write!(f, "HIDE {} {}", format_timestamp(*start), format_timestamp(*end))
            }
            CommandKind::Show { start, end } => {
                write!(f, "SHOW {} {}", format_timestamp(*start), format_timestamp(*end))
            }
            CommandKind::Delete { start, end } => {
                write!(f, "DELETE {} {}", format_timestamp(*start), format_timestamp(*end))
            }
            CommandKind::Merge { start, end } => {
                write!(f, "MERGE {} {}", format_timestamp(*start), format_timestamp(*end))
            }
            CommandKind::Speed { rate, start, end } => write!(
                f,
                "SPEED {rate:.3}x {} {}",
                format_timestamp(*start),
                format_timestamp(*end)
            ),
        }
    }
}

/// A command-shaped line that failed field validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "行{}: {}", self.line, self.message)
    }
}

/// Scan the full script text for command lines, in order. Returns the typed
/// commands plus the line-tagged errors for command-shaped lines that failed
/// validation.
pub fn parse_commands(text: &str) -> (Vec<EditCommand>, Vec<ParseError>) {
    let mut commands = Vec::new();
    let mut errors = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        let Some(keyword) = trimmed.split_whitespace().next() else {
            continue;
        };
        let rest = trimmed[keyword.len()..].trim();
        let parsed = match keyword.to_ascii_uppercase().as_str() {
            "LOAD" => parse_load(rest),
            "CUT" => parse_cut(rest),
            "HIDE" => parse_pair(rest).map(|(s, e)| CommandKind::Hide { start: s, end: e }),
            "SHOW" => parse_pair(rest).map(|(s, e)| CommandKind::Show { start: s, end: e }),
            "DELETE" => parse_pair(rest).map(|(s, e)| CommandKind::Delete { start: s, end: e }),
            "MERGE" => parse_pair(rest).map(|(s, e)| CommandKind::Merge { start: s, end: e }),
            "SPEED" => parse_speed(rest),
            // Prose line, not a command.
            _ => continue,
        };
        match parsed {
            Ok(kind) => commands.push(EditCommand { kind, line }),
            Err(err) => {
                tracing::debug!(line, %err, "command line rejected");
                errors.push(ParseError { line, message: err.to_string() });
            }
        }
    }

    (commands, errors)
}

fn parse_load(rest: &str) -> Result<CommandKind, ScriptError> {
    if rest.is_empty() {
        return Err(ScriptError::MissingField("file path"));
    }
    let path = if let Some(stripped) = rest.strip_prefix('"') {
        stripped
            .strip_suffix('"')
            .ok_or(ScriptError::UnterminatedQuote)?
            .to_string()
    } else {
        rest.to_string()
    };
    if path.is_empty() {
        return Err(ScriptError::MissingField("file path"));
    }
    Ok(CommandKind::Load { path })
}

fn parse_cut(rest: &str) -> Result<CommandKind, ScriptError> {
    let mut tokens = rest.split_whitespace();
    let at = parse_timestamp(tokens.next().ok_or(ScriptError::MissingField("cut time"))?)?;
    reject_trailing(tokens)?;
    Ok(CommandKind::Cut { at })
}

fn parse_pair(rest: &str) -> Result<(f64, f64), ScriptError> {
    let mut tokens = rest.split_whitespace();
    let start = parse_timestamp(tokens.next().ok_or(ScriptError::MissingField("start time"))?)?;
    let end = parse_timestamp(tokens.next().ok_or(ScriptError::MissingField("end time"))?)?;
    reject_trailing(tokens)?;
    if start >= end {
        return Err(ScriptError::EmptyRange);
    }
    Ok((start, end))
}

fn parse_speed(rest: &str) -> Result<CommandKind, ScriptError> {
    let mut tokens = rest.split_whitespace();
    let rate_token = tokens.next().ok_or(ScriptError::MissingField("speed rate"))?;
    let digits = rate_token
        .strip_suffix('x')
        .or_else(|| rate_token.strip_suffix('X'))
        .ok_or_else(|| ScriptError::InvalidRate(rate_token.to_string()))?;
    let rate: f64 = digits
        .parse()
        .map_err(|_| ScriptError::InvalidRate(rate_token.to_string()))?;
    if !(rate > 0.0) {
        return Err(ScriptError::NonPositiveRate);
    }
    let start = parse_timestamp(tokens.next().ok_or(ScriptError::MissingField("start time"))?)?;
    let end = parse_timestamp(tokens.next().ok_or(ScriptError::MissingField("end time"))?)?;
    reject_trailing(tokens)?;
    if start >= end {
        return Err(ScriptError::EmptyRange);
    }
    Ok(CommandKind::Speed { rate, start, end })
}

fn reject_trailing<'a>(mut tokens: impl Iterator<Item = &'a str>) -> Result<(), ScriptError> {
    match tokens.next() {
        Some(extra) => Err(ScriptError::TrailingInput(extra.to_string())),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(text: &str) -> EditCommand {
        let (commands, errors) = parse_commands(text);
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        assert_eq!(commands.len(), 1);
        commands.into_iter().next().unwrap()
    }

    #[test]
    fn parses_each_keyword() {
        assert_eq!(one("LOAD v.mp4").kind, CommandKind::Load { path: "v.mp4".into() });
        assert_eq!(one("CUT 00:00:10.000").kind, CommandKind::Cut { at: 10.0 });
        assert_eq!(
            one("HIDE 00:00:05.000 00:00:15.000").kind,
            CommandKind::Hide { start: 5.0, end: 15.0 }
        );
        assert_eq!(
            one("SHOW 00:00:05.000 00:00:15.000").kind,
            CommandKind::Show { start: 5.0, end: 15.0 }
        );
        assert_eq!(
            one("DELETE 00:00:05.000 00:00:15.000").kind,
            CommandKind::Delete { start: 5.0, end: 15.0 }
        );
        assert_eq!(
            one("MERGE 00:00:00.000 00:00:30.000").kind,
            CommandKind::Merge { start: 0.0, end: 30.0 }
        );
        assert_eq!(
            one("SPEED 1.5x 00:00:05.000 00:00:15.000").kind,
            CommandKind::Speed { rate: 1.5, start: 5.0, end: 15.0 }
        );
    }

    #[test]
    fn keyword_is_case_insensitive() {
        assert_eq!(one("cut 00:00:10.000").kind, CommandKind::Cut { at: 10.0 });
        assert_eq!(one("Load v.mp4").kind, CommandKind::Load { path: "v.mp4".into() });
    }

    #[test]
    fn quoted_load_path_keeps_spaces() {
        assert_eq!(
            one("LOAD \"my clip.mp4\"").kind,
            CommandKind::Load { path: "my clip.mp4".into() }
        );
    }

    #[test]
    fn prose_lines_are_skipped_silently() {
        let (commands, errors) =
            parse_commands("just some notes\nCUT 00:00:10.000\nanother prose line");
        assert_eq!(commands.len(), 1);
        assert!(errors.is_empty());
    }

    #[test]
    fn command_shaped_line_with_bad_fields_is_an_error() {
        let (commands, errors) = parse_commands("CUT ten seconds\nHIDE 00:00:05.000");
        assert!(commands.is_empty());
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].line, 1);
        assert_eq!(errors[1].line, 2);
    }

    #[test]
    fn error_lines_are_tagged_for_the_panel() {
        let (_, errors) = parse_commands("\nSPEED fast 00:00:00.000 00:00:01.000");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().starts_with("行2: "));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let (commands, errors) = parse_commands("HIDE 00:00:15.000 00:00:05.000");
        assert!(commands.is_empty());
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn zero_speed_is_rejected() {
        let (_, errors) = parse_commands("SPEED 0x 00:00:00.000 00:00:01.000");
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn trailing_tokens_are_rejected() {
        let (_, errors) = parse_commands("CUT 00:00:10.000 extra");
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn display_round_trips_byte_identically() {
        let lines = [
            "LOAD v.mp4",
            "LOAD \"my clip.mp4\"",
            "CUT 00:00:10.000",
            "HIDE 00:00:05.000 00:00:15.000",
            "SHOW 00:00:05.000 00:00:15.000",
            "DELETE 00:01:00.000 00:02:30.500",
            "MERGE 00:00:00.000 00:00:30.000",
            "SPEED 1.500x 00:00:05.000 00:00:15.000",
        ];
        for line in lines {
            let command = one(line);
            assert_eq!(command.to_string(), line);
            // And the canonical form is a fixed point.
            let reparsed = one(&command.to_string());
            assert_eq!(reparsed.kind, command.kind);
        }
    }

    #[test]
    fn line_numbers_are_absolute_through_a_header() {
        let text = "title: demo\n---\nLOAD v.mp4\nCUT 00:00:05.000";
        let (commands, errors) = parse_commands(text);
        assert!(errors.is_empty());
        assert_eq!(commands[0].line, 3);
        assert_eq!(commands[1].line, 4);
    }
}
