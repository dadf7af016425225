//! logos-based CSS tokenizer.
//!
//! Token priority in logos is determined by:
//! 1. Longest match wins (e.g. `~=` as [`Token::Includes`] beats `~`)
//! 2. For equal length matches, earlier-defined variants win
//!
//! Our ordering ensures:
//! - `2n` matches [`Token::Dimension`], not `Number` + `Ident`
//! - `url(a.png)` matches [`Token::Url`], not `Function` + garbage
//! - `nth-child(` matches [`Token::Function`], not `Ident` + `ParenOpen`
//!
//! Whitespace and `/* */` comments are skipped; span adjacency in the
//! parser recovers where whitespace was. Characters no pattern accepts are
//! surfaced as [`Token::Delim`] by [`tokenize`].

use logos::Logos;

/// CSS token produced by the lexer.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\n\r\f]+")]
#[logos(skip r"/\*([^*]|\*+[^*/])*\*+/")]
pub enum Token {
    // ── Compound tokens (longer matches, defined first) ──────────────

    /// `!important` flag, with optional whitespace after the bang.
    #[regex(r"![ \t\n\r\f]*[iI][mM][pP][oO][rR][tT][aA][nN][tT]")]
    Important,

    /// `@media`, `@-moz-document`, ...
    #[regex(r"@-?([a-zA-Z_]|[^\x00-\x7F]|\\([0-9a-fA-F]{1,6}[ \t\n\r\f]?|[^\n\r\f0-9a-fA-F]))([a-zA-Z0-9_-]|[^\x00-\x7F]|\\([0-9a-fA-F]{1,6}[ \t\n\r\f]?|[^\n\r\f0-9a-fA-F]))*")]
    AtKeyword,

    /// Unquoted `url(...)`. The quoted form lexes as `Function` + `String`.
    #[regex(r#"[uU][rR][lL]\([ \t\n\r\f]*([^)"' \t\n\r\f\\]|\\([0-9a-fA-F]{1,6}[ \t\n\r\f]?|[^\n\r\f0-9a-fA-F]))*[ \t\n\r\f]*\)"#)]
    Url,

    /// Identifier immediately followed by `(`: `nth-child(`, `url(`.
    #[regex(r"-?([a-zA-Z_]|[^\x00-\x7F]|\\([0-9a-fA-F]{1,6}[ \t\n\r\f]?|[^\n\r\f0-9a-fA-F]))([a-zA-Z0-9_-]|[^\x00-\x7F]|\\([0-9a-fA-F]{1,6}[ \t\n\r\f]?|[^\n\r\f0-9a-fA-F]))*\(")]
    Function,

    /// `#name`: id selectors and hex colors alike.
    #[regex(r"#([a-zA-Z0-9_-]|[^\x00-\x7F]|\\([0-9a-fA-F]{1,6}[ \t\n\r\f]?|[^\n\r\f0-9a-fA-F]))+")]
    Hash,

    /// Number with `%` suffix.
    #[regex(r"[+-]?([0-9]+(\.[0-9]+)?|\.[0-9]+)%")]
    Percentage,

    /// Number with a unit: `10px`, `2n`, `300dpi`.
    #[regex(r"[+-]?([0-9]+(\.[0-9]+)?|\.[0-9]+)[a-zA-Z]+")]
    Dimension,

    /// Integer or decimal, optionally signed.
    #[regex(r"[+-]?([0-9]+(\.[0-9]+)?|\.[0-9]+)")]
    Number,

    /// Double- or single-quoted string, escapes included.
    #[regex(r#""([^"\\\n]|\\(.|\n))*""#)]
    #[regex(r"'([^'\\\n]|\\(.|\n))*'")]
    String,

    /// Identifier, possibly with a leading `-` and backslash escapes.
    #[regex(r"-?([a-zA-Z_]|[^\x00-\x7F]|\\([0-9a-fA-F]{1,6}[ \t\n\r\f]?|[^\n\r\f0-9a-fA-F]))([a-zA-Z0-9_-]|[^\x00-\x7F]|\\([0-9a-fA-F]{1,6}[ \t\n\r\f]?|[^\n\r\f0-9a-fA-F]))*")]
    Ident,

    // ── Attribute operators ──────────────────────────────────────────

    /// `~=`
    #[token("~=")]
    Includes,

    /// `|=`
    #[token("|=")]
    DashMatch,

    /// `^=`
    #[token("^=")]
    PrefixMatch,

    /// `$=`
    #[token("$=")]
    SuffixMatch,

    /// `*=`
    #[token("*=")]
    SubstringMatch,

    // ── Single-character punctuation ─────────────────────────────────

    #[token("{")]
    BraceOpen,

    #[token("}")]
    BraceClose,

    #[token("(")]
    ParenOpen,

    #[token(")")]
    ParenClose,

    #[token("[")]
    BracketOpen,

    #[token("]")]
    BracketClose,

    #[token(":")]
    Colon,

    #[token(";")]
    Semicolon,

    #[token(",")]
    Comma,

    #[token(".")]
    Dot,

    #[token("*")]
    Star,

    #[token(">")]
    GreaterThan,

    #[token("+")]
    Plus,

    #[token("~")]
    Tilde,

    #[token("|")]
    Pipe,

    #[token("=")]
    Equals,

    #[token("/")]
    Slash,

    /// Any other single character, including an unterminated quote.
    Delim,
}

/// Tokenize a CSS string into `(Token, text)` pairs.
///
/// Input the lexer rejects comes back as [`Token::Delim`] so no source
/// text is lost.
pub fn tokenize(input: &str) -> Vec<(Token, String)> {
    Token::lexer(input)
        .spanned()
        .map(|(result, span)| (result.unwrap_or(Token::Delim), input[span].to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper: tokenize and return just the token variants.
    fn tokens(input: &str) -> Vec<Token> {
        tokenize(input).into_iter().map(|(t, _)| t).collect()
    }

    // ── Basic punctuation ────────────────────────────────────────────

    #[test]
    fn test_punctuation() {
        assert_eq!(
            tokens("{ } ( ) [ ] : ; , . * > + ~ | = /"),
            vec![
                Token::BraceOpen,
                Token::BraceClose,
                Token::ParenOpen,
                Token::ParenClose,
                Token::BracketOpen,
                Token::BracketClose,
                Token::Colon,
                Token::Semicolon,
                Token::Comma,
                Token::Dot,
                Token::Star,
                Token::GreaterThan,
                Token::Plus,
                Token::Tilde,
                Token::Pipe,
                Token::Equals,
                Token::Slash,
            ]
        );
    }

    #[test]
    fn test_attribute_operators() {
        assert_eq!(
            tokens("~= |= ^= $= *="),
            vec![
                Token::Includes,
                Token::DashMatch,
                Token::PrefixMatch,
                Token::SuffixMatch,
                Token::SubstringMatch,
            ]
        );
    }

    // ── Identifiers ──────────────────────────────────────────────────

    #[test]
    fn test_idents() {
        let result = tokenize("color -moz-any _private \\31 col");
        assert_eq!(result[0], (Token::Ident, "color".into()));
        assert_eq!(result[1], (Token::Ident, "-moz-any".into()));
        assert_eq!(result[2], (Token::Ident, "_private".into()));
        assert_eq!(result[3], (Token::Ident, "\\31 col".into()));
    }

    #[test]
    fn test_functions_and_at_keywords() {
        let result = tokenize("@media nth-child( @-moz-document");
        assert_eq!(result[0], (Token::AtKeyword, "@media".into()));
        assert_eq!(result[1], (Token::Function, "nth-child(".into()));
        assert_eq!(result[2], (Token::AtKeyword, "@-moz-document".into()));
    }

    // ── Numbers ──────────────────────────────────────────────────────

    #[test]
    fn test_numbers() {
        let result = tokenize("10 -5 3.14 +1 .5");
        assert_eq!(result[0], (Token::Number, "10".into()));
        assert_eq!(result[1], (Token::Number, "-5".into()));
        assert_eq!(result[2], (Token::Number, "3.14".into()));
        assert_eq!(result[3], (Token::Number, "+1".into()));
        assert_eq!(result[4], (Token::Number, ".5".into()));
    }

    #[test]
    fn test_dimensions_and_percentages() {
        let result = tokenize("10px 50% 2n 300dpi");
        assert_eq!(result[0], (Token::Dimension, "10px".into()));
        assert_eq!(result[1], (Token::Percentage, "50%".into()));
        assert_eq!(result[2], (Token::Dimension, "2n".into()));
        assert_eq!(result[3], (Token::Dimension, "300dpi".into()));
    }

    #[test]
    fn test_nth_pieces() {
        assert_eq!(tokens("2n+1"), vec![Token::Dimension, Token::Number]);
        assert_eq!(tokens("-n+3"), vec![Token::Ident, Token::Number]);
    }

    // ── Hash, strings, urls ──────────────────────────────────────────

    #[test]
    fn test_hash() {
        let result = tokenize("#fff #my-id");
        assert_eq!(result[0], (Token::Hash, "#fff".into()));
        assert_eq!(result[1], (Token::Hash, "#my-id".into()));
    }

    #[test]
    fn test_string_literals() {
        let result = tokenize(r#""hello" 'wor\'ld'"#);
        assert_eq!(result[0], (Token::String, "\"hello\"".into()));
        assert_eq!(result[1], (Token::String, "'wor\\'ld'".into()));
    }

    #[test]
    fn test_urls() {
        assert_eq!(tokens("url(a.png)"), vec![Token::Url]);
        assert_eq!(tokens("url( a.png )"), vec![Token::Url]);
        assert_eq!(
            tokens("url(\"a.png\")"),
            vec![Token::Function, Token::String, Token::ParenClose]
        );
    }

    // ── !important ───────────────────────────────────────────────────

    #[test]
    fn test_important() {
        assert_eq!(tokens("!important"), vec![Token::Important]);
        assert_eq!(tokens("! important"), vec![Token::Important]);
    }

    // ── Skipping and fallback ────────────────────────────────────────

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            tokens("a /* b { } */ c /***/"),
            vec![Token::Ident, Token::Ident]
        );
    }

    #[test]
    fn test_unknown_chars_become_delim() {
        let result = tokenize("a ? b");
        assert_eq!(result[1], (Token::Delim, "?".into()));
        assert_eq!(tokens("-"), vec![Token::Delim]);
    }

    #[test]
    fn test_empty_input() {
        assert!(tokens("").is_empty());
        assert!(tokens("   \t\n  ").is_empty());
    }

    // ── Full CSS rule ────────────────────────────────────────────────

    #[test]
    fn test_full_css_rule() {
        let input = "a.ext[href^='http']:hover { color: #fff !important; }";
        assert_eq!(
            tokens(input),
            vec![
                Token::Ident,
                Token::Dot,
                Token::Ident,
                Token::BracketOpen,
                Token::Ident,
                Token::PrefixMatch,
                Token::String,
                Token::BracketClose,
                Token::Colon,
                Token::Ident,
                Token::BraceOpen,
                Token::Ident,
                Token::Colon,
                Token::Hash,
                Token::Important,
                Token::Semicolon,
                Token::BraceClose,
            ]
        );
    }
}
