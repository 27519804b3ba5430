//! Boundary-aware text chunker with overlap.
//!
//! Splits entity text into segments of at most `max_size` characters.
//! Each cut prefers a sentence-terminal character (`.`, `!`, `?`) or a
//! newline found in the back half of the window; failing that it falls
//! back to the nearest preceding space, and only hard-cuts mid-word
//! when the window contains no break at all. Consecutive segments
//! overlap by `overlap` characters so that context spanning a cut is
//! present in both neighbours.
//!
//! # Algorithm
//!
//! 1. Clean the input ([`clean_text`]).
//! 2. If the cleaned text fits in one window, return it as the only
//!    chunk.
//! 3. Otherwise advance a window of `max_size` bytes, searching
//!    backward from the window end for `.`, `!`, `?`, or `\n`; accept
//!    the break only if it lies past 50% of the window, else fall back
//!    to the last space.
//! 4. Push the trimmed segment if non-empty, then restart the window
//!    at `end - overlap`. If that would not advance, restart at `end`.

/// Default maximum chunk size in characters.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 1000;

/// Default overlap between consecutive chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Normalize entity text before chunking.
///
/// Strips carriage returns and form feeds, collapses runs of spaces and
/// tabs to a single space, collapses three or more newlines to two, and
/// trims the ends.
pub fn clean_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut newline_run = 0usize;
    let mut pending_space = false;

    for ch in text.chars() {
        match ch {
            '\r' | '\u{000C}' => {}
            '\n' => {
                pending_space = false;
                newline_run += 1;
                if newline_run <= 2 {
                    out.push('\n');
                }
            }
            ' ' | '\t' => {
                if newline_run == 0 && !out.is_empty() {
                    pending_space = true;
                }
            }
            other => {
                if pending_space {
                    out.push(' ');
                    pending_space = false;
                }
                newline_run = 0;
                out.push(other);
            }
        }
    }

    out.trim().to_string()
}

/// Split text into overlapping, boundary-aware segments.
///
/// Returns the cleaned input as a single chunk when it fits within
/// `max_size`; an empty input yields no chunks. Every returned segment
/// is trimmed and non-empty.
pub fn split_into_chunks(text: &str, max_size: usize, overlap: usize) -> Vec<String> {
    let text = clean_text(text);
    if text.is_empty() {
        return Vec::new();
    }
    if text.len() <= max_size {
        return vec![text];
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < text.len() {
        let mut end = snap_to_char_boundary(&text, (start + max_size).min(text.len()));
        if end <= start {
            end = next_char_boundary(&text, start);
        }

        if end < text.len() {
            end = find_break(&text, start, end, max_size);
        }

        let segment = text[start..end].trim();
        if !segment.is_empty() {
            chunks.push(segment.to_string());
        }

        if end >= text.len() {
            break;
        }

        let next = snap_to_char_boundary(&text, end.saturating_sub(overlap));
        // Force progress when the overlap would rewind past the cut.
        start = if next > start { next } else { end };
    }

    chunks
}

/// Pick the cut position for a window `[start, end)` that does not
/// reach the end of the text.
///
/// A sentence-terminal character or newline is accepted only when it
/// falls past the midpoint of the window; otherwise the last space
/// wins, and a window with no break at all is cut hard at `end`.
fn find_break(text: &str, start: usize, end: usize, max_size: usize) -> usize {
    let window = &text[start..end];

    if let Some(pos) = window.rfind(['.', '!', '?', '\n']) {
        if pos + 1 > max_size / 2 {
            // Keep the terminal character with the segment.
            return start + pos + 1;
        }
    }

    if let Some(pos) = window.rfind(' ') {
        if pos > 0 {
            return start + pos + 1;
        }
    }

    end
}

/// Snap a byte index back to the nearest valid UTF-8 char boundary.
fn snap_to_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// The first char boundary strictly after `index`.
fn next_char_boundary(s: &str, index: usize) -> usize {
    let mut i = (index + 1).min(s.len());
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_single_chunk() {
        let chunks = split_into_chunks("Hello, world!", 1000, 200);
        assert_eq!(chunks, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn empty_text_no_chunks() {
        assert!(split_into_chunks("", 1000, 200).is_empty());
        assert!(split_into_chunks("   \n\n  ", 1000, 200).is_empty());
    }

    #[test]
    fn short_text_is_cleaned() {
        let chunks = split_into_chunks("Hello\r\n\n\n\n  world\t!", 1000, 200);
        assert_eq!(chunks, vec!["Hello\n\nworld !".to_string()]);
    }

    #[test]
    fn long_text_respects_max_size() {
        let sentence = "The quick brown fox jumps over the lazy dog. ";
        let text = sentence.repeat(60);
        let chunks = split_into_chunks(&text, 200, 40);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= 200, "chunk too long: {}", chunk.len());
            assert!(!chunk.trim().is_empty());
        }
    }

    #[test]
    fn cuts_at_sentence_boundaries() {
        let text = format!("{}. {}", "a".repeat(150), "b".repeat(150));
        let chunks = split_into_chunks(&text, 200, 0);
        assert!(chunks[0].ends_with('.'), "expected sentence cut: {:?}", chunks[0]);
    }

    #[test]
    fn early_boundary_falls_back_to_space() {
        // The only period sits in the front half of the window, so the
        // cut must land on the last space instead.
        let text = format!("ab. {} {}", "c".repeat(150), "d".repeat(150));
        let chunks = split_into_chunks(&text, 200, 0);
        assert!(!chunks[0].ends_with('.'));
        assert!(chunks[0].ends_with('c'));
    }

    #[test]
    fn unbroken_text_hard_cuts() {
        let text = "x".repeat(2500);
        let chunks = split_into_chunks(&text, 1000, 200);
        assert!(chunks.len() >= 3);
        for chunk in &chunks {
            assert!(chunk.len() <= 1000);
        }
    }

    #[test]
    fn overlap_repeats_tail_of_previous_chunk() {
        let sentence = "Lorem ipsum dolor sit amet consectetur adipiscing elit. ";
        let text = sentence.repeat(40);
        let chunks = split_into_chunks(&text, 300, 100);
        assert!(chunks.len() > 1);
        // The head of each subsequent chunk must appear in its predecessor.
        for pair in chunks.windows(2) {
            let head: String = pair[1].chars().take(30).collect();
            assert!(
                pair[0].contains(head.trim()),
                "no overlap between consecutive chunks"
            );
        }
    }

    #[test]
    fn degenerate_overlap_still_terminates() {
        let text = "word ".repeat(500);
        // overlap >= max_size would loop forever without the progress guard
        let chunks = split_into_chunks(&text, 100, 100);
        assert!(!chunks.is_empty());
        assert!(chunks.len() < 1000);
    }

    #[test]
    fn multibyte_text_never_splits_a_char() {
        let text = "é".repeat(1500);
        let chunks = split_into_chunks(&text, 1000, 200);
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.chars().all(|c| c == 'é'));
        }
    }

    #[test]
    fn deterministic() {
        let text = "Alpha beta gamma. ".repeat(100);
        let a = split_into_chunks(&text, 250, 50);
        let b = split_into_chunks(&text, 250, 50);
        assert_eq!(a, b);
    }

    #[test]
    fn clean_collapses_whitespace_runs() {
        assert_eq!(clean_text("a    b\t\tc"), "a b c");
        assert_eq!(clean_text("a\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(clean_text("a\r\nb\u{000C}c"), "a\nbc");
    }
}
