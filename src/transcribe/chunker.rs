/// Default number of words sent to the completion service per request
pub const DEFAULT_MAX_WORDS: usize = 200;

/// Split text into chunks of at most `max_words` whitespace-delimited words.
///
/// Chunks are filled greedily from the left and re-joined with single spaces,
/// so the word sequence is preserved exactly. A limit of zero is treated as one.
pub fn chunk_text(text: &str, max_words: usize) -> Vec<String> {
    let max_words = max_words.max(1);
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for word in text.split_whitespace() {
        if current.len() + 1 > max_words {
            chunks.push(current.join(" "));
            current.clear();
        }
        current.push(word);
    }

    if !current.is_empty() {
        chunks.push(current.join(" "));
    }

    chunks
}
