//! Sentence-aware overlapping chunker. Targets a fixed character budget per
//! chunk, but looks backward from that budget for a sentence boundary so
//! chunks don't split mid-sentence; each new chunk repeats a trailing
//! overlap window of the previous one for retrieval continuity.
//!
//! Lives in `core` (not `ingestion`) so the drone agent can chunk files
//! locally without pulling in the server-side storage/queue stack.

const TARGET_CHARS: usize = 1000;
const OVERLAP_CHARS: usize = 100;
const BOUNDARY_SEARCH_WINDOW: usize = 200;
const SENTENCE_TERMINATORS: &[char] = &['.', '!', '?'];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub content: String,
    pub ordinal: usize,
}

/// Finds the best split point at or before `target`: a sentence terminator
/// followed by whitespace within the last `BOUNDARY_SEARCH_WINDOW`
/// characters, else a paragraph break (two newlines) in that same window,
/// else a hard cut at `target`.
fn find_split_point(text: &str, target: usize) -> usize {
    if target >= text.len() {
        return text.len();
    }
    if let Some(boundary) = find_sentence_boundary(text, target) {
        return boundary;
    }
    if let Some(boundary) = find_paragraph_boundary(text, target) {
        return boundary;
    }
    nearest_char_boundary(text, target)
}

fn find_sentence_boundary(text: &str, target: usize) -> Option<usize> {
    // char_indices so we never cut mid-codepoint.
    let mut boundary = None;
    let window_start = target.saturating_sub(BOUNDARY_SEARCH_WINDOW);
    let mut prev_terminator_end: Option<usize> = None;
    for (idx, ch) in text.char_indices() {
        if idx > target {
            break;
        }
        if idx < window_start {
            continue;
        }
        if let Some(term_end) = prev_terminator_end {
            if ch.is_whitespace() {
                boundary = Some(term_end);
            }
            prev_terminator_end = None;
        }
        if SENTENCE_TERMINATORS.contains(&ch) {
            prev_terminator_end = Some(idx + ch.len_utf8());
        }
    }
    boundary
}

fn find_paragraph_boundary(text: &str, target: usize) -> Option<usize> {
    let window_start = nearest_char_boundary(text, target.saturating_sub(BOUNDARY_SEARCH_WINDOW));
    let window_end = nearest_char_boundary(text, target.min(text.len()));
    let window = &text[window_start..window_end];
    window.rfind("\n\n").map(|idx| window_start + idx + 2)
}

fn nearest_char_boundary(text: &str, mut idx: usize) -> usize {
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Splits `text` into overlapping chunks of roughly `TARGET_CHARS`
/// characters. Empty input yields an empty chunk list.
pub fn chunk_text(text: &str) -> Vec<TextChunk> {
    chunk_text_with(text, TARGET_CHARS, OVERLAP_CHARS)
}

pub fn chunk_text_with(text: &str, target_chars: usize, overlap_chars: usize) -> Vec<TextChunk> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    let mut ordinal = 0;

    while start < trimmed.len() {
        let remaining = &trimmed[start..];
        let split_at = if remaining.len() <= target_chars {
            remaining.len()
        } else {
            find_split_point(remaining, target_chars)
        };
        let split_at = split_at.max(1).min(remaining.len());

        let content = remaining[..split_at].trim().to_string();
        if !content.is_empty() {
            chunks.push(TextChunk { content, ordinal });
            ordinal += 1;
        }

        if split_at >= remaining.len() {
            break;
        }

        let advance = split_at.saturating_sub(overlap_chars).max(1);
        start += advance;
        while start < trimmed.len() && !trimmed.is_char_boundary(start) {
            start += 1;
        }
    }

    chunks
}
