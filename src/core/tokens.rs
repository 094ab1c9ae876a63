use serde::{Deserialize, Serialize};

/// Rough characters-per-token ratio for Gemini-family tokenizers on English text.
pub const CHARS_PER_TOKEN: usize = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEstimate {
    pub chars: usize,
    pub words: usize,
    pub tokens: usize,
}

impl TokenEstimate {
    pub fn exceeds(&self, limit: usize) -> bool {
        self.tokens > limit
    }
}

pub fn estimate(text: &str) -> TokenEstimate {
    let chars = text.chars().count();
    TokenEstimate {
        chars,
        words: text.split_whitespace().count(),
        tokens: chars.div_ceil(CHARS_PER_TOKEN),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_has_no_tokens() {
        assert_eq!(estimate(""), TokenEstimate::default());
    }

    #[test]
    fn tokens_round_up() {
        let e = estimate("hello");
        assert_eq!(e.chars, 5);
        assert_eq!(e.words, 1);
        assert_eq!(e.tokens, 2);
    }

    #[test]
    fn counts_chars_not_bytes() {
        assert_eq!(estimate("ñandú").chars, 5);
    }

    #[test]
    fn exceeds_is_strict() {
        let e = estimate("abcdefgh");
        assert!(!e.exceeds(2));
        assert!(e.exceeds(1));
    }
}
