//! Text helpers shared by the retrievers and the query rewriter.

const STOP_WORDS: [&str; 40] = [
    "a", "an", "and", "are", "as", "at", "be", "by", "can", "do", "does", "for", "from", "how",
    "i", "in", "is", "it", "me", "of", "on", "or", "please", "tell", "that", "the", "this", "to",
    "was", "what", "when", "where", "which", "who", "why", "will", "with", "you", "your", "about",
];

/// Lowercased, punctuation-free, de-duplicated content words of `text`.
pub fn query_terms(text: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for raw in text.split(|c: char| !c.is_alphanumeric() && c != '-' && c != '\'') {
        let term = raw.trim_matches(|c: char| c == '-' || c == '\'').to_lowercase();
        if term.is_empty() || STOP_WORDS.contains(&term.as_str()) {
            continue;
        }
        if !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms
}

/// Fraction of `terms` found in `text` (case-insensitive), in `[0, 1]`.
pub fn term_overlap(terms: &[String], text: &str) -> f32 {
    if terms.is_empty() {
        return 0.0;
    }
    let lowered = text.to_lowercase();
    let hits = terms.iter().filter(|term| lowered.contains(term.as_str())).count();
    hits as f32 / terms.len() as f32
}

/// Split text into overlapping chunks, preferring sentence boundaries.
///
/// Each chunk after the first starts `overlap` characters before the point
/// where the previous one was cut, so no text falls between chunks. At most
/// `max_chunks` chunks are produced.
pub fn split_into_chunks(
    text: &str,
    chunk_size: usize,
    overlap: usize,
    max_chunks: usize,
) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let total_chars = chars.len();
    let mut chunks = Vec::new();

    if total_chars == 0 || chunk_size == 0 {
        return chunks;
    }

    let mut start = 0;

    while start < total_chars && chunks.len() < max_chunks {
        let end = (start + chunk_size).min(total_chars);
        let chunk_text: String = chars[start..end].iter().collect();

        let final_text = if end < total_chars {
            find_sentence_boundary(&chunk_text)
        } else {
            chunk_text
        };
        let cut_chars = final_text.chars().count();

        let trimmed = final_text.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }

        if end == total_chars {
            break;
        }
        start = (start + cut_chars).saturating_sub(overlap).max(start + 1);
    }

    chunks
}

/// Truncate to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_terms_drop_stop_words_and_punctuation() {
        assert_eq!(
            query_terms("What is an agentic AI system?"),
            vec!["agentic", "ai", "system"]
        );
        assert_eq!(query_terms("Rust, rust and RUST!"), vec!["rust"]);
        assert!(query_terms("what is it?").is_empty());
    }

    #[test]
    fn term_overlap_is_fraction_of_terms() {
        let terms = query_terms("quantum computing qubits");
        assert_eq!(term_overlap(&terms, "Quantum computers use qubits"), 2.0 / 3.0);
        assert_eq!(term_overlap(&terms, "nothing relevant"), 0.0);
        assert_eq!(term_overlap(&[], "anything"), 0.0);
    }

    #[test]
    fn chunks_cover_text_with_overlap() {
        let text = "This is a test. ".repeat(20);
        let chunks = split_into_chunks(&text, 100, 20, 100);
        assert!(chunks.len() >= 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 100));
        assert!(chunks.last().map(|c| c.ends_with("test.")).unwrap_or(false));
    }

    #[test]
    fn short_text_is_single_chunk() {
        assert_eq!(split_into_chunks("tiny", 100, 10, 100), vec!["tiny"]);
        assert!(split_into_chunks("", 100, 10, 100).is_empty());
    }

    #[test]
    fn chunking_handles_multibyte_text() {
        let text = "量子コンピュータは量子ビットを使う。".repeat(30);
        let chunks = split_into_chunks(&text, 50, 10, 100);
        assert!(!chunks.is_empty());
    }

    #[test]
    fn text_after_sentence_cut_is_kept() {
        let text = format!("{}. KEYWORD {}", "a".repeat(80), "b".repeat(200));
        let chunks = split_into_chunks(&text, 100, 10, 100);
        assert!(chunks[0].ends_with('.'));
        assert!(chunks.iter().any(|c| c.contains("KEYWORD")));
    }

    #[test]
    fn consecutive_chunks_share_overlap() {
        let text: String = (0..60).map(|i| format!("w{:02} ", i)).collect();
        let chunks = split_into_chunks(&text, 40, 8, 100);
        for pair in chunks.windows(2) {
            let tail = &pair[0][pair[0].len() - 3..];
            assert!(pair[1].contains(tail), "{:?} / {:?}", pair[0], pair[1]);
        }
        assert!(chunks.last().map(|c| c.ends_with("w59")).unwrap_or(false));
    }

    #[test]
    fn chunk_count_is_capped() {
        let text = "x".repeat(10_000);
        assert_eq!(split_into_chunks(&text, 100, 10, 5).len(), 5);
    }

    #[test]
    fn truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
