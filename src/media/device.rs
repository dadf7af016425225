//! The environment media queries are evaluated against.

/// Values of `scan`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    Progressive,
    Interlace,
}

/// Supplies the medium and feature values for media query evaluation.
///
/// Only the medium and the two sizes are required; other features default to
/// a typical desktop screen. Returning `None` from [`scan`](Self::scan) means
/// the feature is absent, which makes every expression on it fail.
pub trait MediaContext {
    /// Medium name such as `screen` or `print`, lowercase.
    fn medium(&self) -> &str;
    /// Viewport size in CSS pixels.
    fn viewport_size(&self) -> (f32, f32);
    /// Output device size in CSS pixels.
    fn device_size(&self) -> (f32, f32);

    fn color_bits(&self) -> i32 {
        8
    }

    fn color_index(&self) -> i32 {
        0
    }

    fn monochrome_bits(&self) -> i32 {
        0
    }

    fn resolution_dpi(&self) -> f32 {
        96.0
    }

    fn device_pixel_ratio(&self) -> f32 {
        1.0
    }

    fn scan(&self) -> Option<Scan> {
        None
    }

    fn grid(&self) -> bool {
        false
    }

    /// Font size used to resolve `em`, `ex`, and `rem` in media expressions.
    fn initial_font_size_px(&self) -> f32 {
        16.0
    }
}

/// A plain-data [`MediaContext`].
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub medium: String,
    pub viewport: (f32, f32),
    pub device: (f32, f32),
    pub color_bits: i32,
    pub color_index: i32,
    pub monochrome_bits: i32,
    pub resolution_dpi: f32,
    pub device_pixel_ratio: f32,
    pub scan: Option<Scan>,
    pub grid: bool,
    pub font_size_px: f32,
}

impl Default for Device {
    fn default() -> Self {
        Self {
            medium: "screen".into(),
            viewport: (1024.0, 768.0),
            device: (1024.0, 768.0),
            color_bits: 8,
            color_index: 0,
            monochrome_bits: 0,
            resolution_dpi: 96.0,
            device_pixel_ratio: 1.0,
            scan: None,
            grid: false,
            font_size_px: 16.0,
        }
    }
}

impl Device {
    pub fn new(medium: impl Into<String>) -> Self {
        Self {
            medium: medium.into().to_ascii_lowercase(),
            ..Self::default()
        }
    }

    /// Set the viewport size (builder). The device size follows unless set separately.
    pub fn with_viewport(mut self, width: f32, height: f32) -> Self {
        self.viewport = (width, height);
        self.device = (width.max(self.device.0), height.max(self.device.1));
        self
    }

    pub fn with_device_size(mut self, width: f32, height: f32) -> Self {
        self.device = (width, height);
        self
    }

    pub fn with_color_bits(mut self, bits: i32) -> Self {
        self.color_bits = bits;
        self
    }

    pub fn with_monochrome_bits(mut self, bits: i32) -> Self {
        self.monochrome_bits = bits;
        self
    }

    /// Set the resolution (builder); also updates the device pixel ratio.
    pub fn with_resolution_dpi(mut self, dpi: f32) -> Self {
        self.resolution_dpi = dpi;
        self.device_pixel_ratio = dpi / 96.0;
        self
    }

    pub fn with_scan(mut self, scan: Scan) -> Self {
        self.scan = Some(scan);
        self
    }

    pub fn with_grid(mut self, grid: bool) -> Self {
        self.grid = grid;
        self
    }

    pub fn with_font_size(mut self, px: f32) -> Self {
        self.font_size_px = px;
        self
    }
}

impl MediaContext for Device {
    fn medium(&self) -> &str {
        &self.medium
    }

    fn viewport_size(&self) -> (f32, f32) {
        self.viewport
    }

    fn device_size(&self) -> (f32, f32) {
        self.device
    }

    fn color_bits(&self) -> i32 {
        self.color_bits
    }

    fn color_index(&self) -> i32 {
        self.color_index
    }

    fn monochrome_bits(&self) -> i32 {
        self.monochrome_bits
    }

    fn resolution_dpi(&self) -> f32 {
        self.resolution_dpi
    }

    fn device_pixel_ratio(&self) -> f32 {
        self.device_pixel_ratio
    }

    fn scan(&self) -> Option<Scan> {
        self.scan
    }

    fn grid(&self) -> bool {
        self.grid
    }

    fn initial_font_size_px(&self) -> f32 {
        self.font_size_px
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let device = Device::new("PRINT")
            .with_viewport(800.0, 600.0)
            .with_resolution_dpi(192.0)
            .with_scan(Scan::Interlace);
        assert_eq!(device.medium(), "print");
        assert_eq!(device.viewport_size(), (800.0, 600.0));
        assert_eq!(device.device_pixel_ratio(), 2.0);
        assert_eq!(device.scan(), Some(Scan::Interlace));
    }

    #[test]
    fn device_grows_with_viewport() {
        let device = Device::new("screen").with_viewport(2000.0, 100.0);
        assert_eq!(device.device_size(), (2000.0, 768.0));
    }
}
