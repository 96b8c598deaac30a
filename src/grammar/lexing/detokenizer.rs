//! Detokenizer
//!
//! Converts a token sequence back into source text. Every character of the input ends up
//! in exactly one token (unknown characters included), so `detokenize(&tokenize(s)) == s`.

use crate::grammar::token::Token;

/// Concatenate token texts in order.
pub fn detokenize(tokens: &[Token]) -> String {
    let mut out = String::with_capacity(tokens.iter().map(|t| t.text.len()).sum());
    for token in tokens {
        out.push_str(&token.text);
    }
    out
}
