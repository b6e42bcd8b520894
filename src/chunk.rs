//! Fixed-window text chunker.
//!
//! Splits extracted text into overlapping character windows of `chunk_size`,
//! advancing `chunk_size - overlap` characters per step. No sentence or token
//! awareness: boundaries may split words. That trade keeps chunking O(n) and
//! latency-bounded; the overlap preserves enough context across the seam.
//!
//! `overlap < chunk_size` is validated at config load; the chunker asserts
//! it again because a zero stride would never terminate.

/// Split each input text into overlapping windows of `chunk_size` characters.
///
/// The final partial window is kept as-is (no padding). An empty text yields
/// zero chunks. Windows are counted in characters, not bytes, so multibyte
/// input never splits inside a code point.
///
/// Panics unless `overlap < chunk_size`; that misconfiguration is fatal, not
/// recoverable.
pub fn split_chunks(texts: &[String], chunk_size: usize, overlap: usize) -> Vec<String> {
    assert!(
        overlap < chunk_size,
        "overlap ({}) must be strictly less than chunk_size ({})",
        overlap,
        chunk_size
    );

    let stride = chunk_size - overlap;
    let mut chunks = Vec::new();

    for text in texts {
        // Byte offset of every char boundary, plus the end sentinel.
        let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        boundaries.push(text.len());
        let n_chars = boundaries.len() - 1;

        let mut start = 0usize;
        while start < n_chars {
            let end = (start + chunk_size).min(n_chars);
            chunks.push(text[boundaries[start]..boundaries[end]].to_string());
            start += stride;
        }
    }

    chunks
}
