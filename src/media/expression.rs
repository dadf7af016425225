//! A single `(min-width: 500px)`-style media expression.

use std::cmp::Ordering;

use crate::error::{CssomError, Result};
use crate::media::device::MediaContext;
use crate::media::feature::{MediaFeature, MediaValue, RangeType, ValueType};

/// How the required value is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Range {
    Min,
    Max,
    Equal,
}

/// A feature test inside a media query.
#[derive(Debug, Clone)]
pub struct MediaExpression {
    feature: &'static MediaFeature,
    range: Range,
    value: MediaValue,
}

impl PartialEq for MediaExpression {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.feature, other.feature)
            && self.range == other.range
            && self.value == other.value
    }
}

impl MediaExpression {
    /// Build an expression, rejecting shapes the feature does not support.
    ///
    /// `min-`/`max-` need a value and a feature that allows ranges. A value
    /// must have the feature's type; a float feature also accepts an integer.
    pub fn new(feature: &'static MediaFeature, range: Range, value: MediaValue) -> Result<Self> {
        if range != Range::Equal {
            if feature.range_type == RangeType::MinMaxNotAllowed {
                return Err(CssomError::Syntax(format!(
                    "'{}' does not accept min-/max- prefixes",
                    feature.name
                )));
            }
            if value.is_null() {
                return Err(CssomError::Syntax(format!(
                    "min-/max-{} requires a value",
                    feature.name
                )));
            }
        }
        let value = match (feature.value_type, value) {
            (_, MediaValue::Null) => MediaValue::Null,
            (ValueType::Length, v @ MediaValue::Length(_)) => v,
            (ValueType::Integer, v @ MediaValue::Integer(_)) => v,
            (ValueType::BoolInteger, MediaValue::Integer(i)) if i == 0 || i == 1 => {
                MediaValue::Integer(i)
            }
            (ValueType::Float, v @ MediaValue::Float(_)) => v,
            (ValueType::Float, MediaValue::Integer(i)) => MediaValue::Float(i as f32),
            (ValueType::IntRatio, MediaValue::Ratio(n, d)) if n > 0 && d > 0 => {
                MediaValue::Ratio(n, d)
            }
            (ValueType::Resolution, MediaValue::Resolution(r, unit)) if r > 0.0 => {
                MediaValue::Resolution(r, unit)
            }
            (ValueType::Enumerated(keywords), MediaValue::Enumerated(i)) if i < keywords.len() => {
                MediaValue::Enumerated(i)
            }
            (ValueType::Ident, v @ MediaValue::Ident(_)) => v,
            (_, other) => {
                return Err(CssomError::Syntax(format!(
                    "value {:?} does not fit feature '{}'",
                    other, feature.name
                )))
            }
        };
        Ok(Self {
            feature,
            range,
            value,
        })
    }

    pub fn feature(&self) -> &'static MediaFeature {
        self.feature
    }

    pub fn range(&self) -> Range {
        self.range
    }

    pub fn value(&self) -> &MediaValue {
        &self.value
    }

    /// Test the expression against a value read from `ctx`.
    ///
    /// An absent actual value never matches. With no required value the
    /// feature is used as a boolean: anything but a numeric zero matches.
    pub fn matches(&self, ctx: &dyn MediaContext, actual: &MediaValue) -> bool {
        if actual.is_null() {
            return false;
        }
        if self.value.is_null() {
            return !actual.is_zero();
        }

        let cmp = match (actual, &self.value) {
            (MediaValue::Length(a), MediaValue::Length(r)) => {
                a.to_app_units(ctx).cmp(&r.to_app_units(ctx))
            }
            (MediaValue::Integer(a), MediaValue::Integer(r)) => a.cmp(r),
            (MediaValue::Float(a), MediaValue::Float(r)) => match a.partial_cmp(r) {
                Some(ord) => ord,
                None => return false,
            },
            (MediaValue::Ratio(an, ad), MediaValue::Ratio(rn, rd)) => {
                (i64::from(*an) * i64::from(*rd)).cmp(&(i64::from(*rn) * i64::from(*ad)))
            }
            (MediaValue::Resolution(a, au), MediaValue::Resolution(r, ru)) => {
                let a = MediaValue::resolution_dpi(*a, *au);
                let r = MediaValue::resolution_dpi(*r, *ru);
                match a.partial_cmp(&r) {
                    Some(ord) => ord,
                    None => return false,
                }
            }
            (MediaValue::Enumerated(a), MediaValue::Enumerated(r)) => {
                return self.range == Range::Equal && a == r;
            }
            (MediaValue::Ident(a), MediaValue::Ident(r)) => {
                return self.range == Range::Equal && a == r;
            }
            _ => return false,
        };

        match self.range {
            Range::Min => cmp != Ordering::Less,
            Range::Max => cmp != Ordering::Greater,
            Range::Equal => cmp == Ordering::Equal,
        }
    }

    /// Read the feature from `ctx` and test it.
    pub fn evaluate(&self, ctx: &dyn MediaContext) -> bool {
        self.matches(ctx, &self.feature.current_value(ctx))
    }

    pub(crate) fn write_css(&self, dest: &mut String) {
        dest.push('(');
        match self.range {
            Range::Min => dest.push_str("min-"),
            Range::Max => dest.push_str("max-"),
            Range::Equal => {}
        }
        dest.push_str(self.feature.name);
        if !self.value.is_null() {
            dest.push_str(": ");
            self.value.write_css(dest, self.feature);
        }
        dest.push(')');
    }

    pub fn to_css(&self) -> String {
        let mut dest = String::new();
        self.write_css(&mut dest);
        dest
    }
}
