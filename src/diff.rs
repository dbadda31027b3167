//! Line-level diff used for proposal review and the edit history.
//!
//! The walk pairs lines by index and never realigns: inserting or deleting a
//! line near the top of a document shows every following line as a
//! removed/added pair. Reviews rely on this exact shape, so the output is not
//! a minimal edit script.

use crate::types::{DiffLine, DiffTag, EditStats};

/// Computes the edit script turning `old` into `new`.
///
/// Both texts are split on `\n`, so an empty text is one empty line.
#[must_use]
pub fn diff(old: &str, new: &str) -> Vec<DiffLine> {
    let old_lines: Vec<&str> = old.split('\n').collect();
    let new_lines: Vec<&str> = new.split('\n').collect();

    let mut out = Vec::with_capacity(old_lines.len().max(new_lines.len()));
    let mut oi = 0;
    let mut ni = 0;

    while oi < old_lines.len() || ni < new_lines.len() {
        match (old_lines.get(oi), new_lines.get(ni)) {
            (None, Some(line)) => {
                out.push(line_at(DiffTag::Added, ni, line));
                ni += 1;
            }
            (Some(line), None) => {
                out.push(line_at(DiffTag::Removed, oi, line));
                oi += 1;
            }
            (Some(a), Some(b)) if a == b => {
                out.push(line_at(DiffTag::Unchanged, ni, a));
                oi += 1;
                ni += 1;
            }
            (Some(a), Some(b)) => {
                out.push(line_at(DiffTag::Removed, oi, a));
                out.push(line_at(DiffTag::Added, ni, b));
                oi += 1;
                ni += 1;
            }
            (None, None) => break,
        }
    }

    out
}

fn line_at(tag: DiffTag, index: usize, content: &str) -> DiffLine {
    DiffLine {
        tag,
        line_number: index + 1,
        content: content.to_string(),
    }
}

/// Rebuilds the new side of a diff from its unchanged and added lines.
#[must_use]
pub fn reconstruct_new(lines: &[DiffLine]) -> String {
    lines
        .iter()
        .filter(|l| l.tag != DiffTag::Removed)
        .map(|l| l.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Counts lines per tag as `(added, removed)`.
#[must_use]
pub fn summarize(lines: &[DiffLine]) -> (usize, usize) {
    lines.iter().fold((0, 0), |(a, r), l| match l.tag {
        DiffTag::Added => (a + 1, r),
        DiffTag::Removed => (a, r + 1),
        DiffTag::Unchanged => (a, r),
    })
}

/// Length and word-count deltas between two texts.
#[must_use]
pub fn edit_stats(old: &str, new: &str) -> EditStats {
    let old_length = old.chars().count();
    let new_length = new.chars().count();
    let old_word_count = old.split_whitespace().count();
    let new_word_count = new.split_whitespace().count();

    EditStats {
        old_length,
        new_length,
        old_word_count,
        new_word_count,
        characters_added: new_length.saturating_sub(old_length),
        characters_removed: old_length.saturating_sub(new_length),
        words_added: new_word_count.saturating_sub(old_word_count),
        words_removed: old_word_count.saturating_sub(new_word_count),
    }
}
