//! Virtualized window over the filtered buffer
//!
//! Only the rows inside the viewport are ever cloned out of the buffer. The
//! predicate is evaluated lazily while walking newest-first, so the filtered
//! view is never materialized.

use serde::{Deserialize, Serialize};
use tailscope_core::Event;

use crate::buffer::EventBuffer;
use crate::filter::EventPredicate;

/// Row layout mode; each has a fixed row height
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowMode {
    #[default]
    Normal,
    /// Side-by-side layout with taller rows
    Collapsed,
}

impl RowMode {
    pub fn row_height_px(&self) -> u32 {
        match self {
            RowMode::Normal => 20,
            RowMode::Collapsed => 36,
        }
    }
}

/// Logical rows requested by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    /// Index of the first visible row in the filtered view (0 = newest)
    pub offset: usize,
    /// Number of visible rows
    pub rows: usize,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { offset: 0, rows: 50 }
    }
}

impl Viewport {
    pub fn new(offset: usize, rows: usize) -> Self {
        Self { offset, rows }
    }

    /// Convert pixel scroll geometry into logical rows
    ///
    /// A partially visible row at the bottom counts as visible.
    pub fn from_scroll(scroll_px: u32, height_px: u32, mode: RowMode) -> Self {
        let row = mode.row_height_px();
        Self {
            offset: (scroll_px / row) as usize,
            rows: height_px.div_ceil(row) as usize,
        }
    }
}

/// Select `size` matching events starting at `offset`, newest first
///
/// Returns fewer rows only when the filtered view runs out.
pub fn project<'a, I>(events: I, predicate: &EventPredicate, offset: usize, size: usize) -> Vec<Event>
where
    I: IntoIterator<Item = &'a Event>,
{
    events
        .into_iter()
        .filter(|e| predicate.matches(e))
        .skip(offset)
        .take(size)
        .cloned()
        .collect()
}

/// Number of events the predicate accepts
pub fn count_matching<'a, I>(events: I, predicate: &EventPredicate) -> usize
where
    I: IntoIterator<Item = &'a Event>,
{
    events.into_iter().filter(|e| predicate.matches(e)).count()
}

/// Rows to render plus the extent of the filtered view
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    pub rows: Vec<Event>,
    pub offset: usize,
    /// Total events passing the filter, for scroll extents
    pub total_matching: usize,
}

impl Projection {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether older matching rows exist below the window
    pub fn has_more(&self) -> bool {
        self.offset + self.rows.len() < self.total_matching
    }
}

/// Holds the viewport and projects the buffer through it
#[derive(Debug, Clone, Default)]
pub struct WindowProjector {
    viewport: Viewport,
}

impl WindowProjector {
    pub fn new(viewport: Viewport) -> Self {
        Self { viewport }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn scroll_to(&mut self, offset: usize) {
        self.viewport.offset = offset;
    }

    pub fn project(&self, buffer: &EventBuffer, predicate: &EventPredicate) -> Projection {
        let Viewport { offset, rows } = self.viewport;
        Projection {
            rows: project(buffer, predicate, offset, rows),
            offset,
            total_matching: count_matching(buffer, predicate),
        }
    }
}
