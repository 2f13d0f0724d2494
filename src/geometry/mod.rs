//! Mapping of on-screen capture rectangles into native frame pixels.
//!
//! The live frame is rendered into a viewport whose size rarely matches the
//! camera's native resolution. Every cycle the code window (where the QR code
//! is expected) and the printed strip beneath it are re-mapped through the
//! per-axis scale factors so the detectors see exactly what the user framed.

use std::sync::RwLock;

use serde::{Deserialize, Serialize};

/// Strip height relative to the code window's display height.
pub const STRIP_HEIGHT_RATIO: f64 = 0.16;
/// Gap between the window's bottom edge and the strip, relative to window height.
pub const STRIP_MARGIN_RATIO: f64 = 0.04;
/// Half of the strip width relative to the window's display width.
pub const STRIP_HALF_WIDTH_RATIO: f64 = 0.35;

/// Rectangle in on-screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl DisplayRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// Integer pixel rectangle inside a native frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FrameRegion {
    /// Intersects an unclamped rectangle with `[0, native_width) × [0, native_height)`.
    pub fn clamped(
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        native_width: u32,
        native_height: u32,
    ) -> Self {
        if native_width == 0 || native_height == 0 {
            return Self::default();
        }

        let (left, span_x) = clamp_axis(x, width, native_width);
        let (top, span_y) = clamp_axis(y, height, native_height);

        Self {
            x: left,
            y: top,
            width: span_x,
            height: span_y,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

impl Default for FrameRegion {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            width: 0,
            height: 0,
        }
    }
}

fn clamp_axis(start: f64, span: f64, limit: u32) -> (u32, u32) {
    let limit = f64::from(limit);
    let start = if start.is_finite() { start } else { 0.0 };
    let end = if span.is_finite() { start + span.max(0.0) } else { start };

    let lo = start.clamp(0.0, limit - 1.0);
    let hi = end.clamp(lo, limit);
    (lo as u32, (hi - lo) as u32)
}

/// Ratio of native frame resolution to the viewport's rendered size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactors {
    pub x: f64,
    pub y: f64,
}

impl ScaleFactors {
    /// Degenerate viewports produce zero factors, which map everything to an empty region.
    pub fn new(viewport: &DisplayRect, native_width: u32, native_height: u32) -> Self {
        let axis = |native: u32, shown: f64| {
            if shown > 0.0 && shown.is_finite() {
                f64::from(native) / shown
            } else {
                0.0
            }
        };

        Self {
            x: axis(native_width, viewport.width),
            y: axis(native_height, viewport.height),
        }
    }
}

/// Maps `display` (on-screen, same coordinate space as `viewport`) into native frame pixels.
pub fn map_region(
    display: &DisplayRect,
    viewport: &DisplayRect,
    native_width: u32,
    native_height: u32,
) -> FrameRegion {
    let scale = ScaleFactors::new(viewport, native_width, native_height);

    let x = ((display.x - viewport.x) * scale.x).floor();
    let y = ((display.y - viewport.y) * scale.y).floor();
    let width = (display.width * scale.x).floor();
    let height = (display.height * scale.y).floor();

    FrameRegion::clamped(x, y, width, height, native_width, native_height)
}

/// Region of the printed code strip positioned beneath `window`.
pub fn strip_region(
    window: &DisplayRect,
    viewport: &DisplayRect,
    native_width: u32,
    native_height: u32,
) -> FrameRegion {
    if native_width == 0 || native_height == 0 {
        return FrameRegion::default();
    }

    let scale = ScaleFactors::new(viewport, native_width, native_height);
    let frame_w = f64::from(native_width);
    let frame_h = f64::from(native_height);

    let bottom = (window.bottom() - viewport.y) * scale.y;
    let left = (window.x - viewport.x) * scale.x;
    let window_width = window.width * scale.x;

    let margin = (window.height * STRIP_MARGIN_RATIO * scale.y).floor();
    let strip_height = (window.height * STRIP_HEIGHT_RATIO * scale.y).floor();
    let center_x = (left + window_width / 2.0).floor();
    let half_width = (window_width * STRIP_HALF_WIDTH_RATIO).floor();

    let x = (center_x - half_width).max(0.0);
    let y = (bottom + margin).floor().min(frame_h - 1.0);
    let width = (frame_w - x).min(half_width * 2.0);
    let height = (frame_h - y).min(strip_height);

    FrameRegion::clamped(x, y, width, height, native_width, native_height)
}

/// The two regions inspected by one sampling cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRegions {
    pub window: FrameRegion,
    pub strip: FrameRegion,
}

impl ScanRegions {
    pub fn compute(
        window: &DisplayRect,
        viewport: &DisplayRect,
        native_width: u32,
        native_height: u32,
    ) -> Self {
        Self {
            window: map_region(window, viewport, native_width, native_height),
            strip: strip_region(window, viewport, native_width, native_height),
        }
    }
}

/// Source of the rendered viewport and code window rectangles.
///
/// Implementations answer at call time; `None` means the element is not
/// currently laid out and the cycle is skipped.
pub trait GeometryProvider: Send + Sync {
    fn viewport(&self) -> Option<DisplayRect>;
    fn code_window(&self) -> Option<DisplayRect>;

    fn regions(&self, native_width: u32, native_height: u32) -> Option<ScanRegions> {
        let viewport = self.viewport().filter(|rect| !rect.is_empty())?;
        let window = self.code_window().filter(|rect| !rect.is_empty())?;
        Some(ScanRegions::compute(
            &window,
            &viewport,
            native_width,
            native_height,
        ))
    }
}

/// Fixed layout that can be updated when the host view is resized.
pub struct StaticLayout {
    rects: RwLock<Option<(DisplayRect, DisplayRect)>>,
}

impl StaticLayout {
    pub fn new(viewport: DisplayRect, window: DisplayRect) -> Self {
        Self {
            rects: RwLock::new(Some((viewport, window))),
        }
    }

    /// A layout whose elements are not rendered yet.
    pub fn detached() -> Self {
        Self {
            rects: RwLock::new(None),
        }
    }

    pub fn update(&self, viewport: DisplayRect, window: DisplayRect) {
        let mut guard = match self.rects.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some((viewport, window));
    }

    pub fn detach(&self) {
        let mut guard = match self.rects.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = None;
    }

    fn current(&self) -> Option<(DisplayRect, DisplayRect)> {
        match self.rects.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

impl GeometryProvider for StaticLayout {
    fn viewport(&self) -> Option<DisplayRect> {
        self.current().map(|(viewport, _)| viewport)
    }

    fn code_window(&self) -> Option<DisplayRect> {
        self.current().map(|(_, window)| window)
    }
}
