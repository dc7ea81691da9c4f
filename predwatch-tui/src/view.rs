//! Per-chart view window over the shared timeline.
//!
//! A window is a fractional index range `[i0, i1]` into the timeline. Fractions keep
//! repeated small pans and zooms smooth; [`ViewWindow::visible`] rounds outward to whole
//! indices for rendering. Because the timeline grows between frames, the window is
//! re-clamped against the current length on every use.

use crate::config::ViewConfig;
use std::ops::RangeInclusive;

/// Pointer state. Hover is tracked separately because it is orthogonal to dragging.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Interaction {
    Idle,
    Dragging { last_x: f64 },
}

/// Clamp `(i0, i1)` into a timeline of `len` indices.
///
/// For `len >= 2` the result satisfies `0 <= i0 < i1 <= len - 1` and
/// `i1 - i0 >= min(min_span, len - 1)`. A timeline with fewer than two entries collapses
/// the window to `(0, 0)`.
pub fn clamp_view(i0: f64, i1: f64, len: usize, min_span: f64) -> (f64, f64) {
    if len < 2 {
        return (0.0, 0.0);
    }
    let max = (len - 1) as f64;
    let floor = min_span.ceil().clamp(1.0, max);

    let (lo, hi) = match (i0.is_finite(), i1.is_finite()) {
        (true, true) if i0 <= i1 => (i0, i1),
        (true, true) => (i1, i0),
        _ => (max - floor, max),
    };

    let span = (hi - lo).clamp(floor, max);
    let hi = hi.clamp(span, max);
    let lo = (hi - span).max(0.0);
    (lo, hi)
}

/// Index range, pointer state and follow mode of one chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewWindow {
    i0: f64,
    i1: f64,
    interaction: Interaction,
    hover: Option<usize>,
    follow: bool,
    /// `false` until a timeline of at least two indices has anchored the window.
    anchored: bool,
    config: ViewConfig,
}

impl Default for ViewWindow {
    fn default() -> Self {
        Self::new(ViewConfig::default())
    }
}

impl ViewWindow {
    pub fn new(config: ViewConfig) -> Self {
        Self {
            i0: 0.0,
            i1: 0.0,
            interaction: Interaction::Idle,
            hover: None,
            follow: true,
            anchored: false,
            config,
        }
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.i0, self.i1)
    }

    pub fn span(&self) -> f64 {
        self.i1 - self.i0
    }

    pub fn interaction(&self) -> Interaction {
        self.interaction
    }

    pub fn hover_index(&self) -> Option<usize> {
        self.hover
    }

    pub fn is_following(&self) -> bool {
        self.follow
    }

    /// Re-clamp against the current timeline length.
    pub fn clamp(&mut self, len: usize) {
        (self.i0, self.i1) = clamp_view(self.i0, self.i1, len, self.config.min_span);
        if let Some(hover) = self.hover {
            self.hover = (hover < len).then_some(hover);
        }
    }

    /// Whole-index range to draw, or `None` while the timeline is empty.
    pub fn visible(&mut self, len: usize) -> Option<RangeInclusive<usize>> {
        if len == 0 {
            return None;
        }
        self.clamp(len);
        let last = len - 1;
        let start = (self.i0.floor() as usize).min(last);
        let end = (self.i1.ceil() as usize).min(last);
        Some(start..=end)
    }

    /// Right-anchored default span with follow mode on. Until the timeline holds two
    /// indices there is no span to anchor, so the window waits for more data.
    pub fn reset(&mut self, len: usize) {
        self.interaction = Interaction::Idle;
        self.hover = None;
        self.follow = true;
        self.anchored = len >= 2;

        let last = len.saturating_sub(1) as f64;
        self.i1 = last;
        self.i0 = last - self.config.default_span;
        self.clamp(len);
    }

    /// Called after a cycle admitted new rows.
    pub fn on_data(&mut self, len: usize) {
        if !self.anchored {
            self.reset(len);
        } else if self.follow {
            self.anchor_right(len);
        } else {
            self.clamp(len);
        }
    }

    /// Turn follow mode back on and snap to the newest index.
    pub fn follow(&mut self, len: usize) {
        self.follow = true;
        self.anchor_right(len);
    }

    fn anchor_right(&mut self, len: usize) {
        let span = self.span();
        self.i1 = len.saturating_sub(1) as f64;
        self.i0 = self.i1 - span;
        self.clamp(len);
    }

    /// Translate by `delta` indices, preserving the span where the edges allow.
    pub fn pan_by(&mut self, delta: f64, len: usize) {
        self.follow = false;
        self.i0 += delta;
        self.i1 += delta;
        self.clamp(len);
    }

    /// Translate by a pointer displacement of `dx` cells across a plot `width` cells wide.
    /// Dragging right reveals older data.
    pub fn pan_pixels(&mut self, dx: f64, width: f64, len: usize) {
        if width <= 0.0 {
            return;
        }
        let delta = -dx * self.span() / width;
        self.pan_by(delta, len);
    }

    /// Scale the span about the pointer at `focus` (0.0 = left edge, 1.0 = right edge)
    /// so the index under the pointer stays under it.
    pub fn zoom(&mut self, zoom_in: bool, focus: f64, len: usize) {
        self.follow = false;
        if len < 2 {
            self.clamp(len);
            return;
        }
        let max = (len - 1) as f64;
        let focus = if focus.is_finite() { focus.clamp(0.0, 1.0) } else { 0.5 };

        let span = self.span();
        let pivot = self.i0 + span * focus;
        let span = (span * self.config.zoom_factor(zoom_in)).clamp(self.config.min_span.min(max), max);

        self.i0 = pivot - span * focus;
        self.i1 = self.i0 + span;
        self.clamp(len);
    }

    pub fn begin_drag(&mut self, x: f64) {
        self.interaction = Interaction::Dragging { last_x: x };
    }

    /// Pan by the displacement since the previous drag position. No-op unless dragging.
    pub fn drag_to(&mut self, x: f64, width: f64, len: usize) {
        if let Interaction::Dragging { last_x } = self.interaction {
            self.pan_pixels(x - last_x, width, len);
            self.interaction = Interaction::Dragging { last_x: x };
        }
    }

    pub fn end_drag(&mut self) {
        self.interaction = Interaction::Idle;
    }

    /// Track the index under the pointer at `ratio` across the plot.
    pub fn hover(&mut self, ratio: f64, len: usize) {
        if len == 0 || !ratio.is_finite() {
            self.hover = None;
            return;
        }
        self.clamp(len);
        let index = self.i0 + self.span() * ratio.clamp(0.0, 1.0);
        self.hover = Some((index.round() as usize).min(len - 1));
    }

    pub fn leave(&mut self) {
        self.hover = None;
    }
}
