//! Media feature table and typed feature values.

use std::fmt::Write;

use crate::css::serialize::write_ident;
use crate::media::device::{MediaContext, Scan};

/// App units per CSS pixel; lengths compare in whole app units.
pub const APP_UNITS_PER_PX: f32 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthUnit {
    Px,
    Em,
    Ex,
    Rem,
    In,
    Cm,
    Mm,
    Pt,
    Pc,
}

impl LengthUnit {
    pub fn parse(unit: &str) -> Option<Self> {
        let unit = unit.to_ascii_lowercase();
        Some(match unit.as_str() {
            "px" => LengthUnit::Px,
            "em" => LengthUnit::Em,
            "ex" => LengthUnit::Ex,
            "rem" => LengthUnit::Rem,
            "in" => LengthUnit::In,
            "cm" => LengthUnit::Cm,
            "mm" => LengthUnit::Mm,
            "pt" => LengthUnit::Pt,
            "pc" => LengthUnit::Pc,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LengthUnit::Px => "px",
            LengthUnit::Em => "em",
            LengthUnit::Ex => "ex",
            LengthUnit::Rem => "rem",
            LengthUnit::In => "in",
            LengthUnit::Cm => "cm",
            LengthUnit::Mm => "mm",
            LengthUnit::Pt => "pt",
            LengthUnit::Pc => "pc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Length {
    pub value: f32,
    pub unit: LengthUnit,
}

impl Length {
    pub fn px(value: f32) -> Self {
        Self {
            value,
            unit: LengthUnit::Px,
        }
    }

    /// Resolve to whole app units. Font-relative units use the context's initial font size.
    pub fn to_app_units(&self, ctx: &dyn MediaContext) -> i64 {
        let font = ctx.initial_font_size_px();
        let px = match self.unit {
            LengthUnit::Px => self.value,
            LengthUnit::Em | LengthUnit::Rem => self.value * font,
            LengthUnit::Ex => self.value * font * 0.5,
            LengthUnit::In => self.value * 96.0,
            LengthUnit::Cm => self.value * 96.0 / 2.54,
            LengthUnit::Mm => self.value * 96.0 / 25.4,
            LengthUnit::Pt => self.value * 96.0 / 72.0,
            LengthUnit::Pc => self.value * 16.0,
        };
        (px * APP_UNITS_PER_PX).round() as i64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionUnit {
    Dpi,
    Dpcm,
    Dppx,
}

impl ResolutionUnit {
    pub fn parse(unit: &str) -> Option<Self> {
        match unit.to_ascii_lowercase().as_str() {
            "dpi" => Some(ResolutionUnit::Dpi),
            "dpcm" => Some(ResolutionUnit::Dpcm),
            "dppx" => Some(ResolutionUnit::Dppx),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResolutionUnit::Dpi => "dpi",
            ResolutionUnit::Dpcm => "dpcm",
            ResolutionUnit::Dppx => "dppx",
        }
    }
}

/// A feature value, either reported by a context or required by a query.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaValue {
    /// Absent: the context does not report the feature, or the query gave no value.
    Null,
    Length(Length),
    Integer(i32),
    Float(f32),
    /// Width over height.
    Ratio(i32, i32),
    Resolution(f32, ResolutionUnit),
    /// Index into the feature's keyword table.
    Enumerated(usize),
    Ident(String),
}

impl MediaValue {
    pub fn is_null(&self) -> bool {
        matches!(self, MediaValue::Null)
    }

    /// Resolution normalized to dots per inch.
    pub fn resolution_dpi(value: f32, unit: ResolutionUnit) -> f32 {
        match unit {
            ResolutionUnit::Dpi => value,
            ResolutionUnit::Dpcm => value * 2.54,
            ResolutionUnit::Dppx => value * 96.0,
        }
    }

    /// Whether the value counts as false in a bare `(feature)` test.
    pub fn is_zero(&self) -> bool {
        match self {
            MediaValue::Integer(0) => true,
            MediaValue::Float(f) => *f == 0.0,
            MediaValue::Length(l) => l.value == 0.0,
            MediaValue::Ratio(n, _) => *n == 0,
            MediaValue::Resolution(r, _) => *r == 0.0,
            _ => false,
        }
    }

    pub(crate) fn write_css(&self, dest: &mut String, feature: &MediaFeature) {
        match self {
            MediaValue::Null => {}
            MediaValue::Length(l) => {
                let _ = write!(dest, "{}{}", l.value, l.unit.as_str());
            }
            MediaValue::Integer(i) => {
                let _ = write!(dest, "{i}");
            }
            MediaValue::Float(f) => {
                let _ = write!(dest, "{f}");
            }
            MediaValue::Ratio(n, d) => {
                let _ = write!(dest, "{n}/{d}");
            }
            MediaValue::Resolution(r, unit) => {
                let _ = write!(dest, "{r}{}", unit.as_str());
            }
            MediaValue::Enumerated(index) => {
                if let ValueType::Enumerated(keywords) = feature.value_type {
                    if let Some(keyword) = keywords.get(*index) {
                        dest.push_str(keyword);
                    }
                }
            }
            MediaValue::Ident(ident) => write_ident(dest, ident),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeType {
    MinMaxAllowed,
    MinMaxNotAllowed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Length,
    Integer,
    /// Integer restricted to 0 or 1.
    BoolInteger,
    Float,
    IntRatio,
    Resolution,
    Enumerated(&'static [&'static str]),
    Ident,
}

/// One entry of the feature table.
#[derive(Debug)]
pub struct MediaFeature {
    pub name: &'static str,
    pub range_type: RangeType,
    pub value_type: ValueType,
    /// Reads the feature's current value from a context.
    pub getter: fn(&dyn MediaContext) -> MediaValue,
}

impl MediaFeature {
    pub fn current_value(&self, ctx: &dyn MediaContext) -> MediaValue {
        (self.getter)(ctx)
    }

    pub fn keyword_index(&self, keyword: &str) -> Option<usize> {
        match self.value_type {
            ValueType::Enumerated(keywords) => keywords
                .iter()
                .position(|k| k.eq_ignore_ascii_case(keyword)),
            _ => None,
        }
    }
}

const ORIENTATION_KEYWORDS: &[&str] = &["portrait", "landscape"];
const SCAN_KEYWORDS: &[&str] = &["progressive", "interlace"];

fn width(ctx: &dyn MediaContext) -> MediaValue {
    MediaValue::Length(Length::px(ctx.viewport_size().0))
}

fn height(ctx: &dyn MediaContext) -> MediaValue {
    MediaValue::Length(Length::px(ctx.viewport_size().1))
}

fn device_width(ctx: &dyn MediaContext) -> MediaValue {
    MediaValue::Length(Length::px(ctx.device_size().0))
}

fn device_height(ctx: &dyn MediaContext) -> MediaValue {
    MediaValue::Length(Length::px(ctx.device_size().1))
}

fn orientation(ctx: &dyn MediaContext) -> MediaValue {
    let (w, h) = ctx.viewport_size();
    // Square viewports count as portrait.
    MediaValue::Enumerated(usize::from(w > h))
}

fn aspect_ratio(ctx: &dyn MediaContext) -> MediaValue {
    let (w, h) = ctx.viewport_size();
    MediaValue::Ratio(w.round() as i32, h.round() as i32)
}

fn device_aspect_ratio(ctx: &dyn MediaContext) -> MediaValue {
    let (w, h) = ctx.device_size();
    MediaValue::Ratio(w.round() as i32, h.round() as i32)
}

fn color(ctx: &dyn MediaContext) -> MediaValue {
    MediaValue::Integer(ctx.color_bits())
}

fn color_index(ctx: &dyn MediaContext) -> MediaValue {
    MediaValue::Integer(ctx.color_index())
}

fn monochrome(ctx: &dyn MediaContext) -> MediaValue {
    MediaValue::Integer(ctx.monochrome_bits())
}

fn resolution(ctx: &dyn MediaContext) -> MediaValue {
    MediaValue::Resolution(ctx.resolution_dpi(), ResolutionUnit::Dpi)
}

fn scan(ctx: &dyn MediaContext) -> MediaValue {
    match ctx.scan() {
        Some(Scan::Progressive) => MediaValue::Enumerated(0),
        Some(Scan::Interlace) => MediaValue::Enumerated(1),
        None => MediaValue::Null,
    }
}

fn grid(ctx: &dyn MediaContext) -> MediaValue {
    MediaValue::Integer(i32::from(ctx.grid()))
}

fn device_pixel_ratio(ctx: &dyn MediaContext) -> MediaValue {
    MediaValue::Float(ctx.device_pixel_ratio())
}

/// Every media feature the parser recognizes.
pub static MEDIA_FEATURES: &[MediaFeature] = &[
    MediaFeature {
        name: "width",
        range_type: RangeType::MinMaxAllowed,
        value_type: ValueType::Length,
        getter: width,
    },
    MediaFeature {
        name: "height",
        range_type: RangeType::MinMaxAllowed,
        value_type: ValueType::Length,
        getter: height,
    },
    MediaFeature {
        name: "device-width",
        range_type: RangeType::MinMaxAllowed,
        value_type: ValueType::Length,
        getter: device_width,
    },
    MediaFeature {
        name: "device-height",
        range_type: RangeType::MinMaxAllowed,
        value_type: ValueType::Length,
        getter: device_height,
    },
    MediaFeature {
        name: "orientation",
        range_type: RangeType::MinMaxNotAllowed,
        value_type: ValueType::Enumerated(ORIENTATION_KEYWORDS),
        getter: orientation,
    },
    MediaFeature {
        name: "aspect-ratio",
        range_type: RangeType::MinMaxAllowed,
        value_type: ValueType::IntRatio,
        getter: aspect_ratio,
    },
    MediaFeature {
        name: "device-aspect-ratio",
        range_type: RangeType::MinMaxAllowed,
        value_type: ValueType::IntRatio,
        getter: device_aspect_ratio,
    },
    MediaFeature {
        name: "color",
        range_type: RangeType::MinMaxAllowed,
        value_type: ValueType::Integer,
        getter: color,
    },
    MediaFeature {
        name: "color-index",
        range_type: RangeType::MinMaxAllowed,
        value_type: ValueType::Integer,
        getter: color_index,
    },
    MediaFeature {
        name: "monochrome",
        range_type: RangeType::MinMaxAllowed,
        value_type: ValueType::Integer,
        getter: monochrome,
    },
    MediaFeature {
        name: "resolution",
        range_type: RangeType::MinMaxAllowed,
        value_type: ValueType::Resolution,
        getter: resolution,
    },
    MediaFeature {
        name: "scan",
        range_type: RangeType::MinMaxNotAllowed,
        value_type: ValueType::Enumerated(SCAN_KEYWORDS),
        getter: scan,
    },
    MediaFeature {
        name: "grid",
        range_type: RangeType::MinMaxNotAllowed,
        value_type: ValueType::BoolInteger,
        getter: grid,
    },
    MediaFeature {
        name: "-moz-device-pixel-ratio",
        range_type: RangeType::MinMaxAllowed,
        value_type: ValueType::Float,
        getter: device_pixel_ratio,
    },
];

/// Look up a feature by name, ignoring ASCII case.
pub fn find_feature(name: &str) -> Option<&'static MediaFeature> {
    MEDIA_FEATURES
        .iter()
        .find(|f| f.name.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::device::Device;

    #[test]
    fn lookup_is_case_insensitive() {
        assert!(find_feature("Min-Width").is_none());
        assert_eq!(find_feature("WIDTH").map(|f| f.name), Some("width"));
        assert!(find_feature("-moz-device-pixel-ratio").is_some());
    }

    #[test]
    fn lengths_resolve_to_app_units() {
        let ctx = Device::new("screen");
        assert_eq!(Length::px(1.0).to_app_units(&ctx), 60);
        let inch = Length {
            value: 1.0,
            unit: LengthUnit::In,
        };
        assert_eq!(inch.to_app_units(&ctx), 96 * 60);
        let em = Length {
            value: 2.0,
            unit: LengthUnit::Em,
        };
        assert_eq!(em.to_app_units(&ctx), 32 * 60);
    }

    #[test]
    fn resolution_normalizes_to_dpi() {
        assert_eq!(MediaValue::resolution_dpi(2.0, ResolutionUnit::Dppx), 192.0);
        assert!((MediaValue::resolution_dpi(1.0, ResolutionUnit::Dpcm) - 2.54).abs() < 1e-6);
    }

    #[test]
    fn getters_read_context() {
        let ctx = Device::new("screen").with_viewport(1600.0, 900.0);
        let orientation = find_feature("orientation").map(|f| f.current_value(&ctx));
        assert_eq!(orientation, Some(MediaValue::Enumerated(1)));
        let ratio = find_feature("aspect-ratio").map(|f| f.current_value(&ctx));
        assert_eq!(ratio, Some(MediaValue::Ratio(1600, 900)));
        let scan = find_feature("scan").map(|f| f.current_value(&ctx));
        assert_eq!(scan, Some(MediaValue::Null));
    }

    #[test]
    fn zero_values() {
        assert!(MediaValue::Integer(0).is_zero());
        assert!(MediaValue::Length(Length::px(0.0)).is_zero());
        assert!(!MediaValue::Integer(8).is_zero());
        assert!(!MediaValue::Enumerated(0).is_zero());
    }
}
