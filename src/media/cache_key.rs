//! Records which media expressions a style resolution depended on.
//!
//! A consumer evaluates its media lists with a key, stores the key next to
//! the result, and later asks [`MediaQueryResultCacheKey::matches`] whether a
//! new context would produce the same answers. Only the recorded features
//! are read again.

use crate::media::device::MediaContext;
use crate::media::expression::MediaExpression;
use crate::media::feature::MediaFeature;

#[derive(Debug, Clone)]
struct FeatureEntry {
    feature: &'static MediaFeature,
    expressions: Vec<(MediaExpression, bool)>,
}

#[derive(Debug, Clone)]
pub struct MediaQueryResultCacheKey {
    medium: String,
    features: Vec<FeatureEntry>,
}

impl MediaQueryResultCacheKey {
    pub fn new(medium: impl Into<String>) -> Self {
        Self {
            medium: medium.into(),
            features: Vec::new(),
        }
    }

    /// Key for evaluating against `ctx`.
    pub fn for_context(ctx: &dyn MediaContext) -> Self {
        Self::new(ctx.medium())
    }

    pub fn medium(&self) -> &str {
        &self.medium
    }

    pub fn add_expression(&mut self, expr: &MediaExpression, matched: bool) {
        let feature = expr.feature();
        match self
            .features
            .iter_mut()
            .find(|e| std::ptr::eq(e.feature, feature))
        {
            Some(entry) => entry.expressions.push((expr.clone(), matched)),
            None => self.features.push(FeatureEntry {
                feature,
                expressions: vec![(expr.clone(), matched)],
            }),
        }
    }

    /// Number of distinct features recorded.
    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    /// Whether every recorded expression evaluates the same way in `ctx`.
    pub fn matches(&self, ctx: &dyn MediaContext) -> bool {
        if ctx.medium() != self.medium {
            return false;
        }
        self.features.iter().all(|entry| {
            let actual = entry.feature.current_value(ctx);
            entry
                .expressions
                .iter()
                .all(|(expr, matched)| expr.matches(ctx, &actual) == *matched)
        })
    }
}
