//! Fixed-size overlapping text chunking.

/// Drop control characters that upset downstream embedding APIs, keeping
/// whitespace that carries structure.
pub fn clean_text(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
        .collect()
}

/// Split `text` into chunks of at most `chunk_size` characters with
/// `overlap` characters shared between consecutive chunks. Chunk boundaries
/// prefer a nearby paragraph break, then a line break, so chunks tend to end
/// on natural seams.
pub fn split_into_chunks(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    if total == 0 {
        return Vec::new();
    }

    let chunk_size = chunk_size.max(1);

    let mut chunks = Vec::new();
    let mut start = 0usize;
    while start < total {
        let target_end = (start + chunk_size).min(total);
        let end = find_break_point(&chars, start, target_end, total);

        chunks.push(chars[start..end].iter().collect());
        if end >= total {
            break;
        }
        // Advance relative to the actual end: a seam-shortened chunk must
        // not leave a gap before the next chunk's start.
        start = end.saturating_sub(overlap).max(start + 1);
    }
    chunks
}

/// Look for a paragraph or line break within the last fifth of the chunk;
/// fall back to the hard boundary.
fn find_break_point(chars: &[char], start: usize, target_end: usize, total: usize) -> usize {
    if target_end >= total {
        return total;
    }

    let window = (target_end - start) / 5;
    let search_start = target_end.saturating_sub(window).max(start + 1);

    for i in (search_start..target_end).rev() {
        if chars[i] == '\n' && i + 1 < total && chars[i + 1] == '\n' {
            return i + 2;
        }
    }
    for i in (search_start..target_end).rev() {
        if chars[i] == '\n' {
            return i + 1;
        }
    }
    target_end
}
