/// Target chunk size in characters.
pub const CHUNK_CHARS: usize = 4000;
/// Overlap carried from one chunk into the next, in characters.
pub const CHUNK_OVERLAP: usize = 200;

/// Split a note body into fixed-size overlapping windows on character
/// boundaries. Chunk order is document order; an effectively empty body
/// produces no chunks.
pub fn chunk_text(body: &str, max_chars: usize, overlap: usize) -> Vec<String> {
    if body.trim().is_empty() || max_chars == 0 {
        return Vec::new();
    }

    // Byte offset of every char boundary, with the end offset appended so
    // windows can be sliced directly.
    let mut boundaries: Vec<usize> = body.char_indices().map(|(offset, _)| offset).collect();
    boundaries.push(body.len());
    let total_chars = boundaries.len() - 1;

    if total_chars <= max_chars {
        return vec![body.to_string()];
    }

    let step = max_chars.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        let end = usize::min(start + max_chars, total_chars);
        chunks.push(body[boundaries[start]..boundaries[end]].to_string());
        if end == total_chars {
            break;
        }
        start += step;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::{chunk_text, CHUNK_CHARS, CHUNK_OVERLAP};

    #[test]
    fn short_body_is_a_single_chunk() {
        let chunks = chunk_text("short body", CHUNK_CHARS, CHUNK_OVERLAP);
        assert_eq!(chunks, vec!["short body".to_string()]);
    }

    #[test]
    fn empty_and_whitespace_bodies_produce_no_chunks() {
        assert!(chunk_text("", CHUNK_CHARS, CHUNK_OVERLAP).is_empty());
        assert!(chunk_text("  \n\t ", CHUNK_CHARS, CHUNK_OVERLAP).is_empty());
    }

    #[test]
    fn consecutive_chunks_overlap_by_the_configured_amount() {
        let body: String = (0..25).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let chunks = chunk_text(&body, 10, 4);

        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let tail: String = pair[0].chars().skip(pair[0].chars().count() - 4).collect();
            assert!(pair[1].starts_with(&tail), "overlap should repeat the tail");
        }
    }

    #[test]
    fn every_char_is_covered_and_order_is_preserved() {
        let body = "x".repeat(9001);
        let chunks = chunk_text(&body, 4000, 200);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 4000);
        assert_eq!(chunks[1].len(), 4000);
        // Final window covers the remainder plus overlap into it.
        let covered: usize = chunks[0].len() + (chunks.len() - 1) * (4000 - 200);
        assert!(covered >= body.len());
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let body = "héllo wörld ".repeat(400);
        let chunks = chunk_text(&body, 100, 10);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(!chunk.contains('\u{FFFD}'));
            assert!(chunk.chars().count() <= 100);
        }
        assert!(chunks.iter().all(|chunk| body.contains(chunk.as_str())));
    }
}
