//! Scroll-Window Index Calculator
//!
//! Computes which rows of a fixed-height virtual list must be rendered for
//! a scroll offset: the visible rows plus `overscan` rows on each side,
//! clamped to the list.

use std::ops::Range;

use serde::{Deserialize, Serialize};

// == Geometry ==
/// Fixed list geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScrollGeometry {
    pub item_height: f64,
    pub viewport_height: f64,
    /// Extra rows rendered beyond each edge of the viewport
    pub overscan: usize,
    pub item_count: usize,
}

// == Window Range ==
/// Rows to render and the extents needed to position them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowRange {
    /// Rows to render; empty when there is nothing to render
    pub indices: Range<usize>,
    /// Height of the whole list
    pub total_extent: f64,
    /// Offset of the first rendered row
    pub offset_extent: f64,
}

impl WindowRange {
    pub fn start_index(&self) -> usize {
        self.indices.start
    }

    /// Last rendered row (inclusive), `None` if nothing is rendered.
    pub fn end_index(&self) -> Option<usize> {
        if self.indices.is_empty() {
            None
        } else {
            Some(self.indices.end - 1)
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

// == Compute ==
/// Computes the window from scratch for one scroll offset.
///
/// Negative or non-finite offsets count as 0; a non-positive or non-finite
/// item height yields an empty window.
pub fn compute_window(geometry: &ScrollGeometry, scroll_offset: f64) -> WindowRange {
    let ScrollGeometry {
        item_height,
        viewport_height,
        overscan,
        item_count,
    } = *geometry;

    let valid_height = item_height.is_finite() && item_height > 0.0;
    if item_count == 0 || !valid_height {
        return WindowRange {
            indices: 0..0,
            total_extent: 0.0,
            offset_extent: 0.0,
        };
    }

    let offset = if scroll_offset.is_finite() {
        scroll_offset.max(0.0)
    } else {
        0.0
    };
    let viewport = if viewport_height.is_finite() {
        viewport_height.max(0.0)
    } else {
        0.0
    };

    let last = item_count - 1;
    let first_visible = ((offset / item_height).floor() as usize).min(last);
    let last_visible = (((offset + viewport) / item_height).ceil() as usize)
        .saturating_sub(1)
        .clamp(first_visible, last);

    let start = first_visible.saturating_sub(overscan);
    let end = last_visible.saturating_add(overscan).min(last);

    WindowRange {
        indices: start..end + 1,
        total_extent: item_count as f64 * item_height,
        offset_extent: start as f64 * item_height,
    }
}

// == Virtual Window ==
/// Geometry plus the last scroll offset; every change recomputes the
/// window in full.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualWindow {
    geometry: ScrollGeometry,
    scroll_offset: f64,
}

impl VirtualWindow {
    pub fn new(geometry: ScrollGeometry) -> Self {
        Self {
            geometry,
            scroll_offset: 0.0,
        }
    }

    pub fn geometry(&self) -> &ScrollGeometry {
        &self.geometry
    }

    pub fn scroll_offset(&self) -> f64 {
        self.scroll_offset
    }

    pub fn set_scroll_offset(&mut self, offset: f64) -> WindowRange {
        self.scroll_offset = offset;
        self.window()
    }

    pub fn set_item_count(&mut self, item_count: usize) -> WindowRange {
        self.geometry.item_count = item_count;
        self.window()
    }

    pub fn set_viewport_height(&mut self, viewport_height: f64) -> WindowRange {
        self.geometry.viewport_height = viewport_height;
        self.window()
    }

    pub fn window(&self) -> WindowRange {
        compute_window(&self.geometry, self.scroll_offset)
    }
}
