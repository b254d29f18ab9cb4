/// Default chunk limit. Telegram caps messages at 4096 characters; 4000
/// leaves headroom for formatting entities.
pub const MAX_MESSAGE_LEN: usize = 4000;

/// Split a reply into ordered chunks of at most `max_len` characters.
///
/// Within each window the best split point is, in priority order: the last
/// paragraph break, the last line break, a hard cut at the limit. Leading
/// newlines are stripped from the remainder after each split so no chunk
/// starts with blank lines. The hard cut guarantees termination even when
/// the text contains no newlines at all.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    // A zero limit could never make progress.
    let max_len = max_len.max(1);

    if char_count(text) <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while char_count(remaining) > max_len {
        let window_end = byte_index_after_chars(remaining, max_len);
        let window = &remaining[..window_end];

        let split_at = find_boundary(window, "\n\n")
            .or_else(|| find_boundary(window, "\n"))
            .unwrap_or(window_end);

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start_matches('\n');
    }

    if !remaining.is_empty() {
        chunks.push(remaining.to_string());
    }

    chunks
}

/// Last occurrence of `pattern` in the window, rejected when it sits at the
/// very start (that would produce an empty chunk).
fn find_boundary(window: &str, pattern: &str) -> Option<usize> {
    window.rfind(pattern).filter(|&idx| idx > 0)
}

/// Byte index just past the first `n` characters, or the full length when
/// the string is shorter. Always a char boundary.
fn byte_index_after_chars(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map_or(s.len(), |(idx, _)| idx)
}

fn char_count(s: &str) -> usize {
    s.chars().count()
}
