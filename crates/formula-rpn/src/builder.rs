//! Append-only token storage with in-place class rewrites.

use serde::{Deserialize, Serialize};

use crate::ptg::Token;

/// Growable token buffer used while a formula is being converted.
#[derive(Debug, Default)]
pub struct TokenListBuilder {
    tokens: Vec<Token>,
}

impl TokenListBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `token` and return its index.
    pub fn append(&mut self, token: Token) -> usize {
        self.tokens.push(token);
        self.tokens.len() - 1
    }

    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn get(&self, index: usize) -> &Token {
        assert!(
            index < self.tokens.len(),
            "token index {index} out of range (len {})",
            self.tokens.len()
        );
        &self.tokens[index]
    }

    /// Replace the token at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn set(&mut self, index: usize, token: Token) {
        assert!(
            index < self.tokens.len(),
            "token index {index} out of range (len {})",
            self.tokens.len()
        );
        self.tokens[index] = token;
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Consume the builder and produce the immutable token list.
    pub fn freeze(self, source_len: usize) -> TokenList {
        TokenList {
            tokens: self.tokens,
            source_len,
        }
    }
}

/// The finished RPN token stream of one formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenList {
    tokens: Vec<Token>,
    /// Length of the source formula text in characters.
    source_len: usize,
}

impl TokenList {
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn source_len(&self) -> usize {
        self.source_len
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Packed BIFF8 ptg bytes, one per token.
    pub fn opcode_bytes(&self) -> Vec<u8> {
        self.tokens.iter().map(|t| t.opcode().to_byte()).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Token> {
        self.tokens.iter()
    }
}

impl<'a> IntoIterator for &'a TokenList {
    type Item = &'a Token;
    type IntoIter = std::slice::Iter<'a, Token>;

    fn into_iter(self) -> Self::IntoIter {
        self.tokens.iter()
    }
}
