//! Recursive descent CSS parser.
//!
//! Turns CSS text into [`Rule`]s, selector lists, declaration blocks and
//! media lists. Uses the logos-based tokenizer from
//! [`crate::css::tokenizer`]; span adjacency decides whether two tokens
//! belong to one compound selector or are separated by a descendant
//! combinator.
//!
//! The object model only talks to the parser through [`RuleParser`], so an
//! embedder can swap in its own. [`CssParser`] is the default.

use logos::Logos;
use tracing::{debug, trace, warn};
use url::Url;

use crate::css::declaration::{ComponentValue, Declaration, PropertyDeclaration};
use crate::css::namespace::{NameSpaceMap, Namespace};
use crate::css::selector::{
    is_css2_pseudo_element, AttrOperator, AttrSelector, Combinator, CompoundSelector,
    PseudoClass, PseudoClassArg, Selector, SelectorList,
};
use crate::css::serialize::unescape;
use crate::css::tokenizer::Token;
use crate::media::expression::{MediaExpression, Range};
use crate::media::feature::{
    find_feature, Length, LengthUnit, MediaFeature, MediaValue, ResolutionUnit, ValueType,
};
use crate::media::query::{MediaList, MediaQuery};
use crate::rules::{
    CharsetRule, DocumentCondition, DocumentMatch, DocumentRule, FontFaceRule, GroupRule,
    ImportRule, Keyframe, KeyframesRule, MediaRule, NamespaceRule, PageRule, Rule, RuleBody,
    RuleKind, StyleRule, SupportsRule,
};
use crate::sheet::security::Principal;

/// Errors from CSS parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unexpected token at line {line}: {message}")]
    UnexpectedToken { line: u32, message: String },
    #[error("unexpected end of input: {0}")]
    UnexpectedEof(String),
    #[error("unknown namespace prefix '{0}'")]
    UnknownNamespacePrefix(String),
}

/// Everything the parser needs to know about the sheet it parses for.
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    pub sheet_uri: Option<&'a Url>,
    pub base_uri: Option<&'a Url>,
    pub principal: &'a Principal,
    /// Prefixes declared by the sheet's `@namespace` rules.
    pub namespaces: Option<&'a NameSpaceMap>,
    /// Accept rules reserved for privileged sheets, such as `@-moz-document`.
    pub allow_unsafe_rules: bool,
    /// Added to every recorded source line.
    pub line_offset: u32,
}

impl<'a> ParseContext<'a> {
    pub fn new(principal: &'a Principal) -> Self {
        Self {
            sheet_uri: None,
            base_uri: None,
            principal,
            namespaces: None,
            allow_unsafe_rules: false,
            line_offset: 0,
        }
    }

    pub fn with_uris(mut self, sheet_uri: Option<&'a Url>, base_uri: Option<&'a Url>) -> Self {
        self.sheet_uri = sheet_uri;
        self.base_uri = base_uri;
        self
    }

    pub fn with_namespaces(mut self, namespaces: Option<&'a NameSpaceMap>) -> Self {
        self.namespaces = namespaces;
        self
    }

    pub fn with_unsafe_rules(mut self, allow: bool) -> Self {
        self.allow_unsafe_rules = allow;
        self
    }

    pub fn with_line_offset(mut self, offset: u32) -> Self {
        self.line_offset = offset;
        self
    }
}

/// The text-to-rules collaborator used by [`Cssom`](crate::sheet::Cssom).
pub trait RuleParser {
    /// Parse exactly one top-level construct. An unknown at-rule yields no rules.
    fn parse_rule(&self, text: &str, ctx: &ParseContext<'_>) -> Result<Vec<Rule>, ParseError>;

    /// Best-effort parse of a whole sheet; invalid rules are dropped.
    fn parse_sheet(&self, text: &str, ctx: &ParseContext<'_>) -> Vec<Rule>;

    fn parse_selector_list(
        &self,
        text: &str,
        namespaces: Option<&NameSpaceMap>,
    ) -> Result<SelectorList, ParseError>;

    /// Parse the inside of a declaration block, without braces.
    fn parse_declaration(&self, text: &str) -> Result<Declaration, ParseError>;

    fn parse_media_list(&self, text: &str) -> MediaList {
        parse_media_list(text)
    }
}

/// The built-in [`RuleParser`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CssParser;

impl RuleParser for CssParser {
    fn parse_rule(&self, text: &str, ctx: &ParseContext<'_>) -> Result<Vec<Rule>, ParseError> {
        let mut parser = Parser::new(text, ctx);
        while parser.eat(Token::Semicolon) {}
        if parser.is_eof() {
            return Ok(Vec::new());
        }
        let rule = parser.parse_top_level()?;
        while parser.eat(Token::Semicolon) {}
        if !parser.is_eof() {
            return Err(parser.error_here("expected end of rule"));
        }
        Ok(rule.into_iter().collect())
    }

    fn parse_sheet(&self, text: &str, ctx: &ParseContext<'_>) -> Vec<Rule> {
        let mut parser = Parser::new(text, ctx);
        let rules = parser.parse_sheet();
        debug!(
            sheet = ctx.sheet_uri.map(Url::as_str),
            rules = rules.len(),
            "parsed sheet"
        );
        rules
    }

    fn parse_selector_list(
        &self,
        text: &str,
        namespaces: Option<&NameSpaceMap>,
    ) -> Result<SelectorList, ParseError> {
        let principal = Principal::System;
        let ctx = ParseContext::new(&principal).with_namespaces(namespaces);
        let mut parser = Parser::new(text, &ctx);
        let list = parser.parse_selector_list()?;
        if !parser.is_eof() {
            return Err(parser.error_here("expected end of selector"));
        }
        Ok(list)
    }

    fn parse_declaration(&self, text: &str) -> Result<Declaration, ParseError> {
        let principal = Principal::System;
        let mut parser = Parser::new(text, &ParseContext::new(&principal));
        Ok(parser.parse_declarations(false))
    }
}

/// Parse a comma-separated media query list.
///
/// Queries that fail to parse are kept as `not all` placeholders. Empty text
/// gives an empty list.
pub fn parse_media_list(text: &str) -> MediaList {
    let tokens = tokenize_with_spans(text);
    if tokens.is_empty() {
        return MediaList::new();
    }
    let queries = tokens
        .split(|t| t.token == Token::Comma)
        .map(|part| {
            let mut parser = Parser::with_tokens(text, part.to_vec());
            match parser.parse_media_query() {
                Ok(query) if parser.is_eof() => query,
                Ok(_) => {
                    trace!(text, "trailing input in media query");
                    MediaQuery::unknown()
                }
                Err(err) => {
                    trace!(text, error = %err, "unparseable media query");
                    MediaQuery::unknown()
                }
            }
        })
        .collect();
    MediaList::from_queries(queries)
}

/// A positioned token with byte-level span information for whitespace detection.
#[derive(Debug, Clone)]
struct PToken {
    token: Token,
    text: String,
    /// 1-based source line.
    line: u32,
    /// Byte offset where this token starts in the source.
    byte_start: usize,
    /// Byte offset where this token ends in the source.
    byte_end: usize,
}

/// Tokenize input using logos with span and line information preserved.
fn tokenize_with_spans(input: &str) -> Vec<PToken> {
    let line_starts: Vec<usize> = std::iter::once(0)
        .chain(input.match_indices('\n').map(|(i, _)| i + 1))
        .collect();
    Token::lexer(input)
        .spanned()
        .map(|(result, span)| PToken {
            token: result.unwrap_or(Token::Delim),
            text: input[span.clone()].to_string(),
            line: line_starts.partition_point(|&start| start <= span.start) as u32,
            byte_start: span.start,
            byte_end: span.end,
        })
        .collect()
}

// ---------- Token text helpers ----------

fn string_value(text: &str) -> String {
    unescape(&text[1..text.len() - 1])
}

fn url_value(text: &str) -> String {
    unescape(text[4..text.len() - 1].trim_matches([' ', '\t', '\n', '\r', '\x0c']))
}

fn function_name(text: &str) -> String {
    unescape(&text[..text.len() - 1])
}

fn split_dimension(text: &str) -> (&str, &str) {
    let at = text
        .char_indices()
        .skip(1)
        .find(|(_, c)| c.is_ascii_alphabetic() || *c == '%')
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    text.split_at(at)
}

/// Parse `an+b` text with whitespace already removed.
fn parse_nth(text: &str) -> Option<(i32, i32)> {
    let text = text.to_ascii_lowercase();
    match text.as_str() {
        "odd" => return Some((2, 1)),
        "even" => return Some((2, 0)),
        _ => {}
    }
    match text.find('n') {
        Some(at) => {
            let a = match &text[..at] {
                "" | "+" => 1,
                "-" => -1,
                digits => digits.parse().ok()?,
            };
            let rest = &text[at + 1..];
            let b = if rest.is_empty() {
                0
            } else if rest.starts_with(['+', '-']) {
                rest.parse().ok()?
            } else {
                return None;
            };
            Some((a, b))
        }
        None => Some((0, text.parse().ok()?)),
    }
}

/// HTML attributes whose values compare case-insensitively.
const CASE_INSENSITIVE_HTML_ATTRS: &[&str] = &[
    "align", "bgcolor", "checked", "clear", "color", "compact", "dir", "disabled", "face",
    "frame", "lang", "media", "method", "multiple", "nowrap", "readonly", "rel", "rev",
    "rules", "scope", "selected", "shape", "target", "text", "type", "valign", "valuetype",
];

fn starts_compound(token: Token) -> bool {
    matches!(
        token,
        Token::Ident
            | Token::Star
            | Token::Hash
            | Token::Dot
            | Token::BracketOpen
            | Token::Colon
            | Token::Pipe
    )
}

/// Join condition tokens with single spaces, tight inside parentheses and before `:`.
fn normalize_condition(tokens: &[PToken]) -> String {
    let mut out = String::new();
    for (i, tok) in tokens.iter().enumerate() {
        if i > 0 {
            let prev = tokens[i - 1].token;
            let tight = matches!(prev, Token::ParenOpen | Token::Function)
                || matches!(tok.token, Token::ParenClose | Token::Colon);
            if !tight {
                out.push(' ');
            }
        }
        out.push_str(&tok.text);
    }
    out
}

/// Where a sheet parse is in the `@charset`, `@import`, `@namespace`, body sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum SheetState {
    Start,
    Imports,
    Namespaces,
    Body,
}

/// Recursive descent parser state.
struct Parser<'a> {
    source: &'a str,
    tokens: Vec<PToken>,
    cursor: usize,
    namespaces: NameSpaceMap,
    allow_unsafe_rules: bool,
    line_offset: u32,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, ctx: &ParseContext<'_>) -> Self {
        Self {
            source,
            tokens: tokenize_with_spans(source),
            cursor: 0,
            namespaces: ctx.namespaces.cloned().unwrap_or_default(),
            allow_unsafe_rules: ctx.allow_unsafe_rules,
            line_offset: ctx.line_offset,
        }
    }

    fn with_tokens(source: &'a str, tokens: Vec<PToken>) -> Self {
        Self {
            source,
            tokens,
            cursor: 0,
            namespaces: NameSpaceMap::new(),
            allow_unsafe_rules: false,
            line_offset: 0,
        }
    }

    // ---------- Token stream ----------

    fn is_eof(&self) -> bool {
        self.cursor >= self.tokens.len()
    }

    fn peek(&self) -> Option<&PToken> {
        self.tokens.get(self.cursor)
    }

    fn peek_token(&self) -> Option<Token> {
        self.peek().map(|t| t.token)
    }

    fn advance(&mut self) -> Option<PToken> {
        let tok = self.tokens.get(self.cursor).cloned();
        if tok.is_some() {
            self.cursor += 1;
        }
        tok
    }

    /// Consume the next token if it is `token`.
    fn eat(&mut self, token: Token) -> bool {
        if self.peek_token() == Some(token) {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token, message: &str) -> Result<PToken, ParseError> {
        match self.advance() {
            Some(tok) if tok.token == expected => Ok(tok),
            Some(tok) => Err(self.unexpected(&tok, message)),
            None => Err(ParseError::UnexpectedEof(message.to_string())),
        }
    }

    fn unexpected(&self, tok: &PToken, message: &str) -> ParseError {
        ParseError::UnexpectedToken {
            line: tok.line + self.line_offset,
            message: format!("{message}, got '{}'", tok.text),
        }
    }

    fn error_here(&self, message: &str) -> ParseError {
        match self.peek() {
            Some(tok) => self.unexpected(tok, message),
            None => ParseError::UnexpectedEof(message.to_string()),
        }
    }

    fn line_here(&self) -> u32 {
        let line = self
            .peek()
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(1);
        line + self.line_offset
    }

    /// Returns `true` if the current token is immediately adjacent (no whitespace)
    /// to the previous token.
    fn is_adjacent(&self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        let prev = &self.tokens[self.cursor - 1];
        match self.peek() {
            Some(curr) => curr.byte_start == prev.byte_end,
            None => false,
        }
    }

    /// Consume tokens up to (not including) any of `stops`.
    fn tokens_until(&mut self, stops: &[Token]) -> Vec<PToken> {
        let mut out = Vec::new();
        while let Some(tok) = self.peek() {
            if stops.contains(&tok.token) {
                break;
            }
            out.push(tok.clone());
            self.cursor += 1;
        }
        out
    }

    /// Source text covered by the tokens up to any of `stops`.
    fn source_until(&mut self, stops: &[Token]) -> &'a str {
        let taken = self.tokens_until(stops);
        match (taken.first(), taken.last()) {
            (Some(first), Some(last)) => &self.source[first.byte_start..last.byte_end],
            _ => "",
        }
    }

    /// Skip the rest of a broken rule starting at `start`.
    ///
    /// Stops after a `;` or a balanced `{}` block. Inside a block, an
    /// unmatched `}` is left for the caller.
    fn recover(&mut self, start: usize, in_block: bool) {
        self.cursor = start;
        let mut depth = 0usize;
        while let Some(tok) = self.peek_token() {
            match tok {
                Token::BraceClose if depth == 0 => {
                    if !in_block {
                        self.cursor += 1;
                    }
                    return;
                }
                Token::BraceClose => {
                    self.cursor += 1;
                    depth -= 1;
                    if depth == 0 {
                        return;
                    }
                }
                Token::BraceOpen => {
                    self.cursor += 1;
                    depth += 1;
                }
                Token::Semicolon if depth == 0 => {
                    self.cursor += 1;
                    return;
                }
                _ => self.cursor += 1,
            }
        }
    }

    // ---------- Sheets and rules ----------

    /// Error-tolerant parse of a whole sheet.
    fn parse_sheet(&mut self) -> Vec<Rule> {
        let mut rules = Vec::new();
        let mut state = SheetState::Start;
        while !self.is_eof() {
            if self.eat(Token::Semicolon) {
                continue;
            }
            let start = self.cursor;
            let line = self.line_here();
            let rule = match self.parse_top_level() {
                Ok(Some(rule)) => rule,
                Ok(None) => continue,
                Err(err) => {
                    warn!(line, error = %err, "dropped invalid rule");
                    self.recover(start, false);
                    continue;
                }
            };
            let (allowed, next) = match rule.kind() {
                RuleKind::Charset => (state == SheetState::Start, SheetState::Imports),
                RuleKind::Import => (state <= SheetState::Imports, SheetState::Imports),
                RuleKind::Namespace => (state <= SheetState::Namespaces, SheetState::Namespaces),
                _ => (true, SheetState::Body),
            };
            if !allowed {
                warn!(line, kind = ?rule.kind(), "dropped misplaced rule");
                continue;
            }
            state = next;
            if let Some(ns) = rule.as_namespace() {
                self.namespaces.add_prefix(ns.prefix.as_deref(), &ns.url);
            }
            rules.push(rule);
        }
        rules
    }

    /// One rule at the current position. `Ok(None)` for a skipped at-rule.
    fn parse_top_level(&mut self) -> Result<Option<Rule>, ParseError> {
        let line = self.line_here();
        let rule = match self.peek_token() {
            Some(Token::AtKeyword) => self.parse_at_rule()?,
            _ => Some(self.parse_style_rule()?),
        };
        Ok(rule.map(|r| r.with_line(line)))
    }

    fn parse_style_rule(&mut self) -> Result<Rule, ParseError> {
        let selectors = self.parse_selector_list()?;
        let declaration = self.parse_declaration_block()?;
        Ok(Rule::new(RuleBody::Style(StyleRule::new(
            selectors,
            declaration,
        ))))
    }

    /// `;` or end of input.
    fn expect_statement_end(&mut self) -> Result<(), ParseError> {
        match self.peek_token() {
            None => Ok(()),
            Some(Token::Semicolon) => {
                self.cursor += 1;
                Ok(())
            }
            Some(_) => Err(self.error_here("expected ';'")),
        }
    }

    fn parse_at_rule(&mut self) -> Result<Option<Rule>, ParseError> {
        let keyword = self.expect(Token::AtKeyword, "expected at-rule")?;
        let name = unescape(&keyword.text[1..]).to_ascii_lowercase();
        let body = match name.as_str() {
            "charset" => {
                let encoding = self.expect(Token::String, "expected charset string")?;
                self.expect_statement_end()?;
                RuleBody::Charset(CharsetRule::new(string_value(&encoding.text)))
            }
            "import" => {
                let href = self.parse_url_or_string()?;
                let media = parse_media_list(self.source_until(&[Token::Semicolon]));
                self.expect_statement_end()?;
                RuleBody::Import(ImportRule::new(href, media))
            }
            "namespace" => {
                let prefix = if self.peek_token() == Some(Token::Ident) {
                    self.advance().map(|t| unescape(&t.text))
                } else {
                    None
                };
                let url = self.parse_url_or_string()?;
                self.expect_statement_end()?;
                RuleBody::Namespace(NamespaceRule::new(prefix.as_deref(), url))
            }
            "media" => {
                let media = parse_media_list(self.source_until(&[Token::BraceOpen, Token::Semicolon]));
                let rules = self.parse_group_body()?;
                RuleBody::Media(MediaRule::new(media, rules))
            }
            "font-face" => RuleBody::FontFace(FontFaceRule {
                declaration: self.parse_declaration_block()?,
            }),
            "page" => {
                let pseudo = if self.eat(Token::Colon) {
                    let name = self.expect(Token::Ident, "expected page pseudo-class")?;
                    Some(unescape(&name.text).to_ascii_lowercase())
                } else {
                    None
                };
                RuleBody::Page(PageRule {
                    pseudo,
                    declaration: self.parse_declaration_block()?,
                })
            }
            "keyframes" | "-moz-keyframes" => RuleBody::Keyframes(self.parse_keyframes()?),
            "document" => RuleBody::Document(self.parse_document(false)?),
            "-moz-document" if self.allow_unsafe_rules => {
                RuleBody::Document(self.parse_document(true)?)
            }
            "supports" => {
                let condition = self.tokens_until(&[Token::BraceOpen, Token::Semicolon]);
                if condition.is_empty() {
                    return Err(self.error_here("expected supports condition"));
                }
                let rules = self.parse_group_body()?;
                RuleBody::Supports(SupportsRule {
                    condition: normalize_condition(&condition),
                    group: GroupRule::new(rules),
                })
            }
            _ => {
                debug!(name = %name, line = keyword.line + self.line_offset, "skipped unsupported at-rule");
                let start = self.cursor;
                self.recover(start, true);
                return Ok(None);
            }
        };
        Ok(Some(Rule::new(body)))
    }

    fn parse_url_or_string(&mut self) -> Result<String, ParseError> {
        let tok = self
            .advance()
            .ok_or_else(|| ParseError::UnexpectedEof("expected url or string".into()))?;
        match tok.token {
            Token::Url => Ok(url_value(&tok.text)),
            Token::String => Ok(string_value(&tok.text)),
            Token::Function if function_name(&tok.text).eq_ignore_ascii_case("url") => {
                let value = self.expect(Token::String, "expected string in url()")?;
                self.expect(Token::ParenClose, "expected ')'")?;
                Ok(string_value(&value.text))
            }
            _ => Err(self.unexpected(&tok, "expected url or string")),
        }
    }

    /// `{ rule* }` of a group rule. Rules that may not nest are dropped.
    fn parse_group_body(&mut self) -> Result<Vec<Rule>, ParseError> {
        self.expect(Token::BraceOpen, "expected '{'")?;
        let mut rules = Vec::new();
        loop {
            match self.peek_token() {
                None => break,
                Some(Token::BraceClose) => {
                    self.cursor += 1;
                    break;
                }
                Some(Token::Semicolon) => self.cursor += 1,
                Some(_) => {
                    let start = self.cursor;
                    let line = self.line_here();
                    match self.parse_top_level() {
                        Ok(Some(rule)) if rule.kind().is_ruleset_compatible() => rules.push(rule),
                        Ok(Some(rule)) => {
                            warn!(line, kind = ?rule.kind(), "dropped rule not allowed in a group")
                        }
                        Ok(None) => {}
                        Err(err) => {
                            warn!(line, error = %err, "dropped invalid nested rule");
                            self.recover(start, true);
                        }
                    }
                }
            }
        }
        Ok(rules)
    }

    fn parse_keyframes(&mut self) -> Result<KeyframesRule, ParseError> {
        let name = match self.advance() {
            Some(t) if t.token == Token::Ident => unescape(&t.text),
            Some(t) if t.token == Token::String => string_value(&t.text),
            Some(t) => return Err(self.unexpected(&t, "expected keyframes name")),
            None => return Err(ParseError::UnexpectedEof("expected keyframes name".into())),
        };
        self.expect(Token::BraceOpen, "expected '{'")?;
        let mut keyframes = Vec::new();
        loop {
            match self.peek_token() {
                None => break,
                Some(Token::BraceClose) => {
                    self.cursor += 1;
                    break;
                }
                Some(_) => {
                    let start = self.cursor;
                    match self.parse_keyframe() {
                        Ok(frame) => keyframes.push(frame),
                        Err(err) => {
                            warn!(line = self.line_here(), error = %err, "dropped invalid keyframe");
                            self.recover(start, true);
                        }
                    }
                }
            }
        }
        Ok(KeyframesRule { name, keyframes })
    }

    fn parse_keyframe(&mut self) -> Result<Keyframe, ParseError> {
        let mut offsets = Vec::new();
        loop {
            let tok = self
                .advance()
                .ok_or_else(|| ParseError::UnexpectedEof("expected keyframe selector".into()))?;
            let offset = match tok.token {
                Token::Ident if tok.text.eq_ignore_ascii_case("from") => 0.0,
                Token::Ident if tok.text.eq_ignore_ascii_case("to") => 100.0,
                Token::Percentage => self.number(&tok, &tok.text[..tok.text.len() - 1])?,
                _ => return Err(self.unexpected(&tok, "expected keyframe selector")),
            };
            offsets.push(offset);
            if !self.eat(Token::Comma) {
                break;
            }
        }
        Ok(Keyframe {
            offsets,
            declaration: self.parse_declaration_block()?,
        })
    }

    fn parse_document(&mut self, prefixed: bool) -> Result<DocumentRule, ParseError> {
        let mut conditions = Vec::new();
        loop {
            let tok = self
                .advance()
                .ok_or_else(|| ParseError::UnexpectedEof("expected document condition".into()))?;
            let condition = match tok.token {
                Token::Url => DocumentCondition {
                    kind: DocumentMatch::Url,
                    value: url_value(&tok.text),
                },
                Token::Function => {
                    let kind = DocumentMatch::from_function_name(&function_name(&tok.text))
                        .ok_or_else(|| self.unexpected(&tok, "unknown document function"))?;
                    let value = if self.eat(Token::ParenClose) {
                        String::new()
                    } else {
                        let value = self.expect(Token::String, "expected string argument")?;
                        self.expect(Token::ParenClose, "expected ')'")?;
                        string_value(&value.text)
                    };
                    DocumentCondition { kind, value }
                }
                _ => return Err(self.unexpected(&tok, "expected document condition")),
            };
            conditions.push(condition);
            if !self.eat(Token::Comma) {
                break;
            }
        }
        let rules = self.parse_group_body()?;
        Ok(DocumentRule {
            conditions,
            group: GroupRule::new(rules),
            prefixed,
        })
    }

    // ---------- Declarations ----------

    fn parse_declaration_block(&mut self) -> Result<Declaration, ParseError> {
        self.expect(Token::BraceOpen, "expected '{'")?;
        Ok(self.parse_declarations(true))
    }

    /// Declarations up to the closing brace (consumed) or end of input.
    /// Invalid declarations are skipped.
    fn parse_declarations(&mut self, in_block: bool) -> Declaration {
        let mut declaration = Declaration::new();
        loop {
            match self.peek_token() {
                None => break,
                Some(Token::BraceClose) if in_block => {
                    self.cursor += 1;
                    break;
                }
                Some(Token::Semicolon) | Some(Token::BraceClose) => self.cursor += 1,
                Some(_) => {
                    let start = self.cursor;
                    match self.parse_property() {
                        Ok(property) => {
                            declaration.set(property);
                        }
                        Err(err) => {
                            debug!(line = self.line_here(), error = %err, "dropped invalid declaration");
                            self.skip_declaration(start);
                        }
                    }
                }
            }
        }
        declaration
    }

    fn skip_declaration(&mut self, start: usize) {
        self.cursor = start;
        let mut depth = 0usize;
        while let Some(tok) = self.peek_token() {
            match tok {
                Token::Semicolon if depth == 0 => {
                    self.cursor += 1;
                    return;
                }
                Token::BraceClose if depth == 0 => return,
                Token::BraceOpen | Token::ParenOpen | Token::BracketOpen | Token::Function => {
                    depth += 1
                }
                Token::BraceClose | Token::ParenClose | Token::BracketClose => {
                    depth = depth.saturating_sub(1)
                }
                _ => {}
            }
            self.cursor += 1;
        }
    }

    fn parse_property(&mut self) -> Result<PropertyDeclaration, ParseError> {
        let name = self.expect(Token::Ident, "expected property name")?;
        self.expect(Token::Colon, "expected ':'")?;
        let mut value = Vec::new();
        let mut important = false;
        loop {
            match self.peek_token() {
                None | Some(Token::Semicolon) | Some(Token::BraceClose) => break,
                Some(Token::Important) => {
                    self.cursor += 1;
                    important = true;
                    if !matches!(
                        self.peek_token(),
                        None | Some(Token::Semicolon) | Some(Token::BraceClose)
                    ) {
                        return Err(self.error_here("'!important' must end the declaration"));
                    }
                }
                Some(_) => value.push(self.parse_component_value()?),
            }
        }
        if value.is_empty() {
            return Err(self.error_here("expected property value"));
        }
        Ok(PropertyDeclaration::new(
            unescape(&name.text),
            value,
            important,
        ))
    }

    fn number(&self, tok: &PToken, text: &str) -> Result<f32, ParseError> {
        text.parse()
            .map_err(|_| self.unexpected(tok, "invalid number"))
    }

    fn integer(&self, tok: &PToken) -> Result<i32, ParseError> {
        tok.text
            .parse()
            .map_err(|_| self.unexpected(tok, "expected integer"))
    }

    fn parse_component_value(&mut self) -> Result<ComponentValue, ParseError> {
        let tok = self
            .advance()
            .ok_or_else(|| ParseError::UnexpectedEof("expected value".into()))?;
        let value = match tok.token {
            Token::Ident => ComponentValue::Ident(unescape(&tok.text)),
            Token::Number => ComponentValue::Number(self.number(&tok, &tok.text)?),
            Token::Percentage => {
                ComponentValue::Percentage(self.number(&tok, &tok.text[..tok.text.len() - 1])?)
            }
            Token::Dimension => {
                let (number, unit) = split_dimension(&tok.text);
                ComponentValue::Dimension(self.number(&tok, number)?, unit.to_ascii_lowercase())
            }
            Token::Hash => ComponentValue::Hash(unescape(&tok.text[1..])),
            Token::String => ComponentValue::String(string_value(&tok.text)),
            Token::Url => ComponentValue::Url(url_value(&tok.text)),
            Token::Function => {
                let name = function_name(&tok.text);
                let mut args = Vec::new();
                loop {
                    match self.peek_token() {
                        None => return Err(ParseError::UnexpectedEof("expected ')'".into())),
                        Some(Token::ParenClose) => {
                            self.cursor += 1;
                            break;
                        }
                        Some(Token::Semicolon) | Some(Token::BraceClose) => {
                            return Err(self.error_here("expected ')'"))
                        }
                        Some(_) => args.push(self.parse_component_value()?),
                    }
                }
                match args.as_slice() {
                    [ComponentValue::String(href)] if name.eq_ignore_ascii_case("url") => {
                        ComponentValue::Url(href.clone())
                    }
                    _ => ComponentValue::Function(name, args),
                }
            }
            Token::Comma => ComponentValue::Comma,
            Token::Slash => ComponentValue::Slash,
            Token::BraceOpen | Token::ParenOpen | Token::BracketOpen | Token::Important => {
                return Err(self.unexpected(&tok, "unexpected token in value"))
            }
            _ => ComponentValue::Delim(tok.text.chars().next().unwrap_or('\u{fffd}')),
        };
        Ok(value)
    }

    // ---------- Selectors ----------

    fn parse_selector_list(&mut self) -> Result<SelectorList, ParseError> {
        let mut selectors = vec![self.parse_selector()?];
        while self.eat(Token::Comma) {
            selectors.push(self.parse_selector()?);
        }
        Ok(SelectorList::new(selectors))
    }

    /// Parse a complex selector and store it key-first.
    fn parse_selector(&mut self) -> Result<Selector, ParseError> {
        let (first, mut pseudo_element) = self.parse_compound(false)?;
        let mut compounds = vec![first];
        let mut combinators = Vec::new();

        loop {
            let combinator = match self.peek_token() {
                Some(Token::GreaterThan) => Combinator::Child,
                Some(Token::Plus) => Combinator::NextSibling,
                Some(Token::Tilde) => Combinator::LaterSibling,
                // A selector-starting token that is not adjacent to the previous
                // token had whitespace before it: descendant combinator.
                Some(t) if starts_compound(t) && !self.is_adjacent() => Combinator::Descendant,
                _ => break,
            };
            if pseudo_element.is_some() {
                return Err(self.error_here("a pseudo-element must end the selector"));
            }
            if combinator != Combinator::Descendant {
                self.cursor += 1;
            }
            let (next, next_pseudo) = self.parse_compound(false)?;
            combinators.push(combinator);
            compounds.push(next);
            pseudo_element = next_pseudo;
        }

        let mut chain = Vec::with_capacity(compounds.len() + 1);
        if let Some(name) = pseudo_element {
            let mut element = CompoundSelector::pseudo_element(name);
            element.combinator = Some(Combinator::Child);
            chain.push(element);
        }
        for (i, mut compound) in compounds.into_iter().enumerate().rev() {
            compound.combinator = i.checked_sub(1).map(|prev| combinators[prev]);
            chain.push(compound);
        }
        Selector::new(chain).ok_or_else(|| self.error_here("malformed selector"))
    }

    /// Parse one compound selector, returning any trailing pseudo-element name.
    ///
    /// `negated` is set for the argument of `:not()`: pseudo-elements and
    /// nested negations are rejected there, and the default namespace only
    /// applies to an explicit type selector.
    fn parse_compound(
        &mut self,
        negated: bool,
    ) -> Result<(CompoundSelector, Option<String>), ParseError> {
        let mut compound = CompoundSelector::new();
        let (mut parsed_any, explicit_namespace) = self.parse_type_selector(&mut compound)?;
        let mut pseudo_element = None;

        loop {
            if parsed_any && !self.is_adjacent() {
                break;
            }
            let Some(tok) = self.peek_token() else { break };
            if pseudo_element.is_some()
                && matches!(tok, Token::Hash | Token::Dot | Token::BracketOpen | Token::Colon)
            {
                return Err(self.error_here("nothing may follow a pseudo-element"));
            }
            match tok {
                Token::Hash => {
                    let hash = self.advance().ok_or_else(|| self.error_here("expected id"))?;
                    let raw = &hash.text[1..];
                    if raw.starts_with(|c: char| c.is_ascii_digit())
                        || (raw.starts_with('-') && raw[1..].starts_with(|c: char| c.is_ascii_digit()))
                    {
                        return Err(self.unexpected(&hash, "invalid id selector"));
                    }
                    compound.ids.push(unescape(raw));
                }
                Token::Dot => {
                    self.cursor += 1;
                    if !self.is_adjacent() {
                        return Err(self.error_here("expected class name after '.'"));
                    }
                    let name = self.expect(Token::Ident, "expected class name")?;
                    compound.classes.push(unescape(&name.text));
                }
                Token::BracketOpen => {
                    let attr = self.parse_attribute()?;
                    compound.attributes.push(attr);
                }
                Token::Colon => {
                    if let Some(name) = self.parse_pseudo(&mut compound, negated)? {
                        pseudo_element = Some(name);
                    }
                }
                _ => break,
            }
            parsed_any = true;
        }

        if !parsed_any {
            return Err(self.error_here("expected selector"));
        }
        if !explicit_namespace && (!negated || compound.tag.is_some()) {
            compound.namespace = self.namespaces.default_namespace();
        }
        Ok((compound, pseudo_element))
    }

    /// Optional `[prefix|]name`, `*`, `*|name`, or `|name`.
    ///
    /// Returns whether anything was consumed and whether an explicit
    /// namespace was given.
    fn parse_type_selector(
        &mut self,
        compound: &mut CompoundSelector,
    ) -> Result<(bool, bool), ParseError> {
        match self.peek_token() {
            Some(Token::Ident) | Some(Token::Star) => {
                let first = self.advance().ok_or_else(|| self.error_here("expected selector"))?;
                if self.peek_token() == Some(Token::Pipe) && self.is_adjacent() {
                    self.cursor += 1;
                    compound.namespace = if first.token == Token::Star {
                        Namespace::Any
                    } else {
                        self.resolve_prefix(&unescape(&first.text))?
                    };
                    self.parse_element_name(compound)?;
                    return Ok((true, true));
                }
                if first.token == Token::Ident {
                    compound.tag = Some(unescape(&first.text));
                }
                Ok((true, false))
            }
            Some(Token::Pipe) => {
                self.cursor += 1;
                compound.namespace = Namespace::None;
                self.parse_element_name(compound)?;
                Ok((true, true))
            }
            _ => Ok((false, false)),
        }
    }

    fn parse_element_name(&mut self, compound: &mut CompoundSelector) -> Result<(), ParseError> {
        if !self.is_adjacent() {
            return Err(self.error_here("expected element name after '|'"));
        }
        match self.advance() {
            Some(t) if t.token == Token::Ident => {
                compound.tag = Some(unescape(&t.text));
                Ok(())
            }
            Some(t) if t.token == Token::Star => Ok(()),
            Some(t) => Err(self.unexpected(&t, "expected element name")),
            None => Err(ParseError::UnexpectedEof("expected element name".into())),
        }
    }

    fn resolve_prefix(&self, prefix: &str) -> Result<Namespace, ParseError> {
        self.namespaces
            .find_namespace(Some(prefix))
            .ok_or_else(|| ParseError::UnknownNamespacePrefix(prefix.to_string()))
    }

    fn parse_attribute(&mut self) -> Result<AttrSelector, ParseError> {
        self.expect(Token::BracketOpen, "expected '['")?;
        let first = self
            .advance()
            .ok_or_else(|| ParseError::UnexpectedEof("expected attribute name".into()))?;
        let (namespace, name) = match first.token {
            Token::Star => {
                self.expect(Token::Pipe, "expected '|'")?;
                (Namespace::Any, self.expect(Token::Ident, "expected attribute name")?)
            }
            Token::Pipe => (
                Namespace::None,
                self.expect(Token::Ident, "expected attribute name")?,
            ),
            Token::Ident if self.peek_token() == Some(Token::Pipe) => {
                self.cursor += 1;
                let namespace = self.resolve_prefix(&unescape(&first.text))?;
                (namespace, self.expect(Token::Ident, "expected attribute name")?)
            }
            Token::Ident => (Namespace::None, first),
            _ => return Err(self.unexpected(&first, "expected attribute name")),
        };
        let name = unescape(&name.text);

        let op = match self.peek_token() {
            Some(Token::BracketClose) => {
                self.cursor += 1;
                return Ok(AttrSelector {
                    namespace,
                    ..AttrSelector::exists(name)
                });
            }
            Some(Token::Equals) => AttrOperator::Equals,
            Some(Token::Includes) => AttrOperator::Includes,
            Some(Token::DashMatch) => AttrOperator::DashMatch,
            Some(Token::PrefixMatch) => AttrOperator::Prefix,
            Some(Token::SuffixMatch) => AttrOperator::Suffix,
            Some(Token::SubstringMatch) => AttrOperator::Substring,
            _ => return Err(self.error_here("expected attribute operator or ']'")),
        };
        self.cursor += 1;
        let value = match self.advance() {
            Some(t) if t.token == Token::Ident => unescape(&t.text),
            Some(t) if t.token == Token::String => string_value(&t.text),
            Some(t) => return Err(self.unexpected(&t, "expected attribute value")),
            None => return Err(ParseError::UnexpectedEof("expected attribute value".into())),
        };
        self.expect(Token::BracketClose, "expected ']'")?;

        let case_sensitive = !(namespace == Namespace::None
            && CASE_INSENSITIVE_HTML_ATTRS.contains(&name.to_ascii_lowercase().as_str()));
        Ok(AttrSelector {
            namespace,
            case_sensitive,
            ..AttrSelector::with_value(name, op, value)
        })
    }

    /// `:name`, `::name`, or `:name(...)`. Returns the name of a pseudo-element.
    fn parse_pseudo(
        &mut self,
        compound: &mut CompoundSelector,
        negated: bool,
    ) -> Result<Option<String>, ParseError> {
        self.expect(Token::Colon, "expected ':'")?;
        let double = self.peek_token() == Some(Token::Colon) && self.is_adjacent();
        if double {
            self.cursor += 1;
        }
        if !self.is_adjacent() {
            return Err(self.error_here("expected pseudo-class name"));
        }
        let tok = self
            .advance()
            .ok_or_else(|| ParseError::UnexpectedEof("expected pseudo-class name".into()))?;
        match tok.token {
            Token::Ident => {
                let name = unescape(&tok.text).to_ascii_lowercase();
                if double || is_css2_pseudo_element(&name) {
                    if negated {
                        return Err(self.unexpected(&tok, "pseudo-elements are not allowed in :not()"));
                    }
                    return Ok(Some(name));
                }
                compound.pseudo_classes.push(PseudoClass::new(name));
                Ok(None)
            }
            Token::Function if !double => {
                let name = function_name(&tok.text).to_ascii_lowercase();
                self.parse_functional_pseudo(compound, name, negated, &tok)?;
                Ok(None)
            }
            _ => Err(self.unexpected(&tok, "expected pseudo-class name")),
        }
    }

    fn parse_functional_pseudo(
        &mut self,
        compound: &mut CompoundSelector,
        name: String,
        negated: bool,
        tok: &PToken,
    ) -> Result<(), ParseError> {
        match name.as_str() {
            "not" => {
                if negated {
                    return Err(self.unexpected(tok, ":not() cannot nest"));
                }
                let (negation, pseudo) = self.parse_compound(true)?;
                if pseudo.is_some() {
                    return Err(self.unexpected(tok, "pseudo-elements are not allowed in :not()"));
                }
                self.expect(Token::ParenClose, "expected ')'")?;
                if !compound.add_negation(negation) {
                    return Err(self.unexpected(tok, "invalid :not() argument"));
                }
            }
            "nth-child" | "nth-last-child" | "nth-of-type" | "nth-last-of-type" => {
                let mut text = String::new();
                loop {
                    match self.advance() {
                        Some(t) if t.token == Token::ParenClose => break,
                        Some(t) => text.push_str(&t.text),
                        None => return Err(ParseError::UnexpectedEof("expected ')'".into())),
                    }
                }
                let (a, b) = parse_nth(&text)
                    .ok_or_else(|| self.unexpected(tok, &format!("invalid an+b '{text}'")))?;
                compound
                    .pseudo_classes
                    .push(PseudoClass::with_arg(name, PseudoClassArg::Nth { a, b }));
            }
            "-moz-any" | "any" => {
                let mut selectors = Vec::new();
                loop {
                    let (inner, pseudo) = self.parse_compound(false)?;
                    if pseudo.is_some() {
                        return Err(self.unexpected(tok, "pseudo-elements are not allowed here"));
                    }
                    selectors.push(Selector::from_compound(inner));
                    if !self.eat(Token::Comma) {
                        break;
                    }
                }
                self.expect(Token::ParenClose, "expected ')'")?;
                compound.pseudo_classes.push(PseudoClass::with_arg(
                    name,
                    PseudoClassArg::Selectors(SelectorList::new(selectors)),
                ));
            }
            _ => {
                let arg = match self.advance() {
                    Some(t) if t.token == Token::Ident => unescape(&t.text),
                    Some(t) if t.token == Token::String => string_value(&t.text),
                    Some(t) => return Err(self.unexpected(&t, "expected pseudo-class argument")),
                    None => return Err(ParseError::UnexpectedEof("expected ')'".into())),
                };
                self.expect(Token::ParenClose, "expected ')'")?;
                compound
                    .pseudo_classes
                    .push(PseudoClass::with_arg(name, PseudoClassArg::Ident(arg)));
            }
        }
        Ok(())
    }

    // ---------- Media queries ----------

    /// `[not|only] type [and (expr)]*` or `(expr) [and (expr)]*`.
    fn parse_media_query(&mut self) -> Result<MediaQuery, ParseError> {
        let mut query = match self.peek_token() {
            Some(Token::ParenOpen) => {
                let mut query = MediaQuery::with_type_omitted();
                self.parse_media_expression(&mut query)?;
                query
            }
            Some(Token::Ident) => {
                let first = self.expect(Token::Ident, "expected media type")?;
                let first = unescape(&first.text).to_ascii_lowercase();
                let (negated, has_only, media_type) = match first.as_str() {
                    "not" | "only" => {
                        let ty = self.expect(Token::Ident, "expected media type")?;
                        (first == "not", first == "only", unescape(&ty.text).to_ascii_lowercase())
                    }
                    _ => (false, false, first),
                };
                if matches!(media_type.as_str(), "and" | "or" | "not" | "only") {
                    return Err(self.error_here("reserved word used as media type"));
                }
                let mut query = MediaQuery::new(media_type);
                query.negated = negated;
                query.has_only = has_only;
                query
            }
            _ => return Err(self.error_here("expected media query")),
        };
        while let Some(tok) = self.peek() {
            if tok.token != Token::Ident || !tok.text.eq_ignore_ascii_case("and") {
                return Err(self.error_here("expected 'and'"));
            }
            self.cursor += 1;
            self.parse_media_expression(&mut query)?;
        }
        Ok(query)
    }

    fn parse_media_expression(&mut self, query: &mut MediaQuery) -> Result<(), ParseError> {
        self.expect(Token::ParenOpen, "expected '('")?;
        let name_tok = self.expect(Token::Ident, "expected media feature")?;
        let name = unescape(&name_tok.text).to_ascii_lowercase();
        let (range, feature_name) = if let Some(rest) = name.strip_prefix("min-") {
            (Range::Min, rest)
        } else if let Some(rest) = name.strip_prefix("max-") {
            (Range::Max, rest)
        } else {
            (Range::Equal, name.as_str())
        };
        let feature = find_feature(feature_name)
            .ok_or_else(|| self.unexpected(&name_tok, "unknown media feature"))?;
        let value = if self.eat(Token::Colon) {
            self.parse_media_value(feature)?
        } else {
            MediaValue::Null
        };
        self.expect(Token::ParenClose, "expected ')'")?;
        let expression = MediaExpression::new(feature, range, value).map_err(|err| {
            ParseError::UnexpectedToken {
                line: name_tok.line + self.line_offset,
                message: err.to_string(),
            }
        })?;
        query.expressions.push(expression);
        Ok(())
    }

    fn parse_media_value(&mut self, feature: &MediaFeature) -> Result<MediaValue, ParseError> {
        let tok = self
            .advance()
            .ok_or_else(|| ParseError::UnexpectedEof("expected media feature value".into()))?;
        let value = match (feature.value_type, tok.token) {
            (ValueType::Length, Token::Dimension) => {
                let (number, unit) = split_dimension(&tok.text);
                let unit = LengthUnit::parse(&unit.to_ascii_lowercase())
                    .ok_or_else(|| self.unexpected(&tok, "unknown length unit"))?;
                let value = self.number(&tok, number)?;
                if value < 0.0 {
                    return Err(self.unexpected(&tok, "negative length"));
                }
                MediaValue::Length(Length { value, unit })
            }
            (ValueType::Length, Token::Number) => {
                if self.number(&tok, &tok.text)? != 0.0 {
                    return Err(self.unexpected(&tok, "a non-zero length needs a unit"));
                }
                MediaValue::Length(Length::px(0.0))
            }
            (ValueType::Integer | ValueType::BoolInteger, Token::Number) => {
                let value = self.integer(&tok)?;
                if value < 0 {
                    return Err(self.unexpected(&tok, "negative integer"));
                }
                MediaValue::Integer(value)
            }
            (ValueType::Float, Token::Number) => {
                let value = self.number(&tok, &tok.text)?;
                if value < 0.0 {
                    return Err(self.unexpected(&tok, "negative number"));
                }
                MediaValue::Float(value)
            }
            (ValueType::IntRatio, Token::Number) => {
                let numerator = self.integer(&tok)?;
                self.expect(Token::Slash, "expected '/' in ratio")?;
                let denominator_tok = self.expect(Token::Number, "expected ratio denominator")?;
                let denominator = self.integer(&denominator_tok)?;
                if numerator <= 0 || denominator <= 0 {
                    return Err(self.unexpected(&tok, "ratio terms must be positive"));
                }
                MediaValue::Ratio(numerator, denominator)
            }
            (ValueType::Resolution, Token::Dimension) => {
                let (number, unit) = split_dimension(&tok.text);
                let unit = ResolutionUnit::parse(&unit.to_ascii_lowercase())
                    .ok_or_else(|| self.unexpected(&tok, "unknown resolution unit"))?;
                let value = self.number(&tok, number)?;
                if value <= 0.0 {
                    return Err(self.unexpected(&tok, "resolution must be positive"));
                }
                MediaValue::Resolution(value, unit)
            }
            (ValueType::Enumerated(_), Token::Ident) => {
                let index = feature
                    .keyword_index(&unescape(&tok.text))
                    .ok_or_else(|| self.unexpected(&tok, "unknown keyword"))?;
                MediaValue::Enumerated(index)
            }
            (ValueType::Ident, Token::Ident) => {
                MediaValue::Ident(unescape(&tok.text).to_ascii_lowercase())
            }
            _ => return Err(self.unexpected(&tok, "value does not fit the media feature")),
        };
        Ok(value)
    }
}
