// src/normalize.rs ------------------------------------------------------------
//! Turns raw model output into a task list. Never fails: malformed output
//! degrades to a best-effort line split.

use crate::models::TaskList;

const FENCE: &str = "```";

pub fn normalize(raw: &str) -> TaskList {
    let text = strip_fences(raw.trim());
    if text.is_empty() {
        return Vec::new();
    }

    if let Some(tasks) = parse_array(text) {
        return tasks;
    }
    // models like to put the requested email summary in front of the array
    if let Some(tasks) = embedded_array(text).and_then(parse_array) {
        return tasks;
    }

    tracing::debug!("model output is not a JSON array, splitting lines");
    split_lines(text)
}

fn strip_fences(text: &str) -> &str {
    let mut text = text;
    if let Some(rest) = text.strip_prefix(FENCE) {
        // drop the optional language tag on the opening line
        text = match rest.find('\n') {
            Some(newline) => &rest[newline + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
        };
    }
    if let Some(rest) = text.trim_end().strip_suffix(FENCE) {
        text = rest;
    }
    text.trim()
}

fn parse_array(text: &str) -> Option<TaskList> {
    let items: Vec<String> = serde_json::from_str(text).ok()?;
    Some(
        items
            .iter()
            .map(|item| item.trim())
            .filter(|item| !item.is_empty())
            .map(str::to_owned)
            .collect(),
    )
}

/// The span from the first line opening with `[` to the last line closing
/// with `]`. Brackets inside a sentence never count.
fn embedded_array(text: &str) -> Option<&str> {
    let lines: Vec<(usize, &str)> = text
        .split('\n')
        .scan(0, |offset, line| {
            let at = *offset;
            *offset += line.len() + 1;
            Some((at, line))
        })
        .collect();

    let start = lines
        .iter()
        .find(|(_, line)| line.trim_start().starts_with('['))
        .map(|(at, line)| at + line.len() - line.trim_start().len())?;
    let end = lines
        .iter()
        .rev()
        .find(|(_, line)| line.trim_end().ends_with(']'))
        .map(|(at, line)| at + line.trim_end().len())?;
    (end > start).then(|| &text[start..end])
}

fn split_lines(text: &str) -> TaskList {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.starts_with(['[', ']', '{', '}']) && !line.starts_with(FENCE))
        .map(clean_line)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}

fn clean_line(line: &str) -> &str {
    let line = line.strip_suffix(',').unwrap_or(line).trim_end();
    let line = line.strip_prefix(['"', '\'']).unwrap_or(line);
    let line = line.strip_suffix(['"', '\'']).unwrap_or(line);
    line.trim()
}
