//! Log text helpers: chunking on the agent side, tailing on the CLI side

/// Default upper bound for a single streamed log message
pub const DEFAULT_LOG_CHUNK_BYTES: usize = 1024 * 1024;

/// Keep the last `count` newline-separated lines of `text`.
///
/// A trailing newline does not start an extra empty line. `count == 0`
/// returns every line.
pub fn tail_lines(text: &str, count: usize) -> Vec<&str> {
    let lines: Vec<&str> = text.lines().collect();
    if count == 0 || count >= lines.len() {
        return lines;
    }
    lines[lines.len() - count..].to_vec()
}

/// Split `text` into pieces of at most `max_bytes`, never inside a UTF-8 sequence.
///
/// Concatenating the pieces yields `text` again. An empty input produces no pieces.
pub fn chunks(text: &str, max_bytes: usize) -> impl Iterator<Item = &str> {
    let max_bytes = max_bytes.max(4);
    let mut rest = text;

    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }

        let mut end = rest.len().min(max_bytes);
        while !rest.is_char_boundary(end) {
            end -= 1;
        }

        let (head, tail) = rest.split_at(end);
        rest = tail;
        Some(head)
    })
}
