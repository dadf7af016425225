//! Media queries and media lists.

use crate::css::parser::parse_media_list;
use crate::error::{CssomError, Result};
use crate::media::cache_key::MediaQueryResultCacheKey;
use crate::media::device::MediaContext;
use crate::media::expression::MediaExpression;

/// `[not|only] type [and (expr)]*`
#[derive(Debug, Clone, PartialEq)]
pub struct MediaQuery {
    pub negated: bool,
    pub has_only: bool,
    /// The source started with an expression, so the type is implied `all`.
    pub type_omitted: bool,
    /// Set when part of the query failed to parse; the query then never matches.
    pub had_unknown_expression: bool,
    /// Lowercased media type.
    pub media_type: String,
    pub expressions: Vec<MediaExpression>,
}

impl MediaQuery {
    pub fn new(media_type: impl Into<String>) -> Self {
        Self {
            negated: false,
            has_only: false,
            type_omitted: false,
            had_unknown_expression: false,
            media_type: media_type.into().to_ascii_lowercase(),
            expressions: Vec::new(),
        }
    }

    /// A query made only of expressions: `(color)`.
    pub fn with_type_omitted() -> Self {
        Self {
            type_omitted: true,
            ..Self::new("all")
        }
    }

    /// The placeholder for an unparseable query; serializes as `not all`.
    pub fn unknown() -> Self {
        Self {
            had_unknown_expression: true,
            ..Self::new("all")
        }
    }

    /// Evaluate against `ctx`, recording each expression result in `key`.
    pub fn matches(
        &self,
        ctx: &dyn MediaContext,
        mut key: Option<&mut MediaQueryResultCacheKey>,
    ) -> bool {
        if self.had_unknown_expression {
            return false;
        }
        let mut matched = self.media_type == ctx.medium() || self.media_type == "all";
        for expr in &self.expressions {
            if !matched {
                break;
            }
            let actual = expr.feature().current_value(ctx);
            matched = expr.matches(ctx, &actual);
            if let Some(key) = key.as_deref_mut() {
                key.add_expression(expr, matched);
            }
        }
        matched == !self.negated
    }

    pub fn write_css(&self, dest: &mut String) {
        if self.had_unknown_expression {
            dest.push_str("not all");
            return;
        }
        if self.negated {
            dest.push_str("not ");
        } else if self.has_only {
            dest.push_str("only ");
        }
        if !self.type_omitted {
            dest.push_str(&self.media_type);
        }
        for (i, expr) in self.expressions.iter().enumerate() {
            if i > 0 || !self.type_omitted {
                dest.push_str(" and ");
            }
            expr.write_css(dest);
        }
    }

    pub fn to_css(&self) -> String {
        let mut dest = String::new();
        self.write_css(&mut dest);
        dest
    }
}

/// A comma-separated list of media queries.
///
/// An empty list matches every context.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MediaList {
    queries: Vec<MediaQuery>,
}

impl MediaList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_queries(queries: Vec<MediaQuery>) -> Self {
        Self { queries }
    }

    /// Parse `text`; unparseable queries become `not all`.
    pub fn parse(text: &str) -> Self {
        parse_media_list(text)
    }

    pub fn queries(&self) -> &[MediaQuery] {
        &self.queries
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn item(&self, index: usize) -> Option<String> {
        self.queries.get(index).map(MediaQuery::to_css)
    }

    pub fn matches(
        &self,
        ctx: &dyn MediaContext,
        mut key: Option<&mut MediaQueryResultCacheKey>,
    ) -> bool {
        if self.queries.is_empty() {
            return true;
        }
        // Every query is evaluated so the cache key sees all of them.
        let mut any = false;
        for query in &self.queries {
            any |= query.matches(ctx, key.as_deref_mut());
        }
        any
    }

    pub fn media_text(&self) -> String {
        let mut dest = String::new();
        for (i, query) in self.queries.iter().enumerate() {
            if i > 0 {
                dest.push_str(", ");
            }
            query.write_css(&mut dest);
        }
        dest
    }

    pub fn set_media_text(&mut self, text: &str) {
        *self = parse_media_list(text);
    }

    /// Append one medium, moving it to the end if already present.
    ///
    /// Text that does not parse to exactly one query leaves the list without it.
    pub fn append_medium(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Err(CssomError::NotFound("empty medium".into()));
        }
        let _ = self.delete_medium(text);
        let mut parsed = parse_media_list(text);
        if parsed.queries.len() == 1 {
            self.queries.append(&mut parsed.queries);
        }
        Ok(())
    }

    /// Remove the query whose serialization equals `text`.
    pub fn delete_medium(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Err(CssomError::NotFound("empty medium".into()));
        }
        match self.queries.iter().position(|q| q.to_css() == text) {
            Some(pos) => {
                self.queries.remove(pos);
                Ok(())
            }
            None => Err(CssomError::NotFound(text.to_string())),
        }
    }
}
