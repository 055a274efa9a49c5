//! Splitting outgoing text into transport-sized pieces.

/// Maximum length of a single Discord message.
pub const MAX_MESSAGE_LENGTH: usize = 2000;

/// Cut `text` into consecutive pieces of `max_size` characters.
///
/// A plain fixed-width cut: word boundaries are ignored, but a cut never
/// lands inside a UTF-8 code point. `max_size` is raised to at least 1.
/// The last piece may be shorter; an empty text yields no pieces.
pub fn chunk(text: &str, max_size: usize) -> Vec<String> {
    let size = max_size.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let cut = rest
            .char_indices()
            .nth(size)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let (head, tail) = rest.split_at(cut);
        chunks.push(head.to_string());
        rest = tail;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_small_size() {
        assert_eq!(chunk("123456789", 2), vec!["12", "34", "56", "78", "9"]);
    }

    #[test]
    fn test_chunk_fits_in_one() {
        assert_eq!(chunk("123456789", 200), vec!["123456789"]);
    }

    #[test]
    fn test_chunk_zero_behaves_like_one() {
        assert_eq!(chunk("abc", 0), chunk("abc", 1));
        assert_eq!(chunk("abc", 0), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_chunk_empty_text() {
        assert!(chunk("", 5).is_empty());
        assert!(chunk("", 0).is_empty());
    }

    #[test]
    fn test_chunk_exact_multiple() {
        assert_eq!(chunk("abcdef", 3), vec!["abc", "def"]);
    }

    #[test]
    fn test_chunk_counts_characters_not_bytes() {
        let chunks = chunk("äöüß€", 2);
        assert_eq!(chunks, vec!["äö", "üß", "€"]);
    }

    #[test]
    fn test_chunks_reassemble_to_input() {
        let inputs = [
            "",
            "a",
            "hello world",
            "**Barkeep** (`Tavern#general`):\nline one\nline two",
            "emoji 🍺🍺🍺 and umlauts äöü",
        ];
        for input in inputs {
            for size in 1..=12 {
                let chunks = chunk(input, size);
                assert_eq!(chunks.concat(), input, "size {size}");
                if let Some((last, full)) = chunks.split_last() {
                    assert!(full.iter().all(|c| c.chars().count() == size));
                    assert!(last.chars().count() <= size);
                }
            }
        }
    }
}
