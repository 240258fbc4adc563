use std::collections::VecDeque;

use crate::ChunkConfig;

/// Recursive character splitter.
///
/// A text is split on the first separator it contains. Pieces that still
/// exceed the limit are split again with the remaining, finer separators.
/// Small neighbouring pieces are merged back up to `max_length`, keeping up
/// to `overlap` trailing characters of one chunk at the head of the next.
/// Separators stay attached to the start of the piece that follows them.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    max_length: usize,
    overlap: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    pub fn new(cfg: ChunkConfig) -> Self {
        let max_length = cfg.max_length.max(1);
        let overlap = cfg.overlap.min(max_length);
        let mut separators = cfg.separators;
        if separators.is_empty() {
            separators.push(String::new());
        }
        Self {
            max_length,
            overlap,
            separators,
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split one text. Texts that already fit are returned untouched.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        if char_len(text) <= self.max_length {
            return vec![text.to_string()];
        }
        let separators: Vec<&str> = self.separators.iter().map(String::as_str).collect();
        let mut out = Vec::new();
        self.split_recursive(text, &separators, &mut out);
        out
    }

    fn split_recursive(&self, text: &str, separators: &[&str], out: &mut Vec<String>) {
        let mut separator = separators.last().copied().unwrap_or("");
        let mut finer: &[&str] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = sep;
                break;
            }
            if text.contains(sep) {
                separator = sep;
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut fitting: Vec<&str> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.max_length {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                self.merge_splits(&fitting, out);
                fitting.clear();
            }
            if finer.is_empty() {
                out.push(piece.to_string());
            } else {
                self.split_recursive(piece, finer, out);
            }
        }
        if !fitting.is_empty() {
            self.merge_splits(&fitting, out);
        }
    }

    fn merge_splits(&self, pieces: &[&str], out: &mut Vec<String>) {
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            if total + len > self.max_length && !window.is_empty() {
                push_joined(&window, out);
                while total > self.overlap || (total + len > self.max_length && total > 0) {
                    match window.pop_front() {
                        Some((_, front_len)) => total -= front_len,
                        None => break,
                    }
                }
            }
            window.push_back((piece, len));
            total += len;
        }
        push_joined(&window, out);
    }
}

fn push_joined(window: &VecDeque<(&str, usize)>, out: &mut Vec<String>) {
    let joined: String = window.iter().map(|(piece, _)| *piece).collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

/// Split on a literal separator, attaching each separator to the start of the
/// piece after it. An empty separator splits into single characters.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }
    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    pieces.push(&text[start..]);
    pieces.retain(|p| !p.is_empty());
    pieces
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
