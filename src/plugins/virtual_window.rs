//! C9.2 — Virtual window plugin: row virtualization math, adapted from the
//! teacher's lazy dirty-flag `VirtualScrollEngine` pattern. A headless
//! crate has no animation-frame clock of its own, so the "coalesce
//! repeated scroll events into one pending frame" requirement becomes a
//! dirty flag a host's own frame loop can poll instead.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollAlign {
    Start,
    Center,
    End,
}

/// Computes which contiguous slice of `source_len` rows should render for
/// a given scroll offset, row height, and overscan.
#[derive(Debug, Clone)]
pub struct VirtualWindow {
    row_height: f64,
    container_height: f64,
    overscan: usize,
    scroll_offset: f64,
    source_len: usize,

    cached_start: usize,
    cached_end: usize,
    dirty: bool,
}

impl VirtualWindow {
    pub fn new(row_height: f64, overscan: usize) -> Self {
        VirtualWindow {
            row_height: row_height.max(1.0),
            container_height: 0.0,
            overscan,
            scroll_offset: 0.0,
            source_len: 0,
            cached_start: 0,
            cached_end: 0,
            dirty: true,
        }
    }

    pub fn set_container_height(&mut self, height: f64) {
        self.container_height = height;
        self.dirty = true;
    }

    pub fn set_source_len(&mut self, len: usize) {
        self.source_len = len;
        self.dirty = true;
    }

    pub fn set_overscan(&mut self, overscan: usize) {
        self.overscan = overscan;
        self.dirty = true;
    }

    /// Feeds a raw scroll event. Recomputation only actually happens the
    /// next time a `visible_*`/`window` accessor is called and `dirty` is
    /// set — the same lazy `ensure_*_computed` idiom the teacher uses for
    /// its visible-range cache, just invoked per-offset instead of
    /// per-animation-frame since this crate owns no frame clock.
    pub fn on_scroll(&mut self, offset: f64) {
        if offset != self.scroll_offset {
            self.scroll_offset = offset.max(0.0);
            self.dirty = true;
        }
    }

    pub fn total_height(&self) -> f64 {
        self.source_len as f64 * self.row_height
    }

    fn ensure_computed(&mut self) {
        if !self.dirty {
            return;
        }
        let (start, end) = self.compute_range();
        self.cached_start = start;
        self.cached_end = end;
        self.dirty = false;
    }

    fn compute_range(&self) -> (usize, usize) {
        if self.container_height <= 0.0 || self.source_len == 0 {
            return (0, 0);
        }
        let visible_start = (self.scroll_offset / self.row_height).floor() as i64;
        let visible_end = ((self.scroll_offset + self.container_height) / self.row_height).ceil() as i64;

        let start = (visible_start - self.overscan as i64).max(0) as usize;
        let end = ((visible_end + self.overscan as i64).max(0) as usize).min(self.source_len);
        (start.min(self.source_len), end)
    }

    /// The `[start, end)` window into the source collection.
    pub fn window(&mut self) -> (usize, usize) {
        self.ensure_computed();
        (self.cached_start, self.cached_end)
    }

    pub fn offset_y(&mut self) -> f64 {
        let (start, _) = self.window();
        if self.container_height <= 0.0 {
            0.0
        } else {
            start as f64 * self.row_height
        }
    }

    pub fn visible_count(&mut self) -> usize {
        let (start, end) = self.window();
        end - start
    }

    /// Applies `window()` to `source`, returning the contiguous slice of
    /// rows to render this frame.
    pub fn apply<'a, R>(&mut self, source: &'a [R]) -> &'a [R] {
        let (start, end) = self.window();
        &source[start.min(source.len())..end.min(source.len())]
    }

    pub fn scroll_to_index(&mut self, index: usize) {
        self.on_scroll(index as f64 * self.row_height);
    }

    pub fn scroll_to_index_aligned(&mut self, index: usize, align: ScrollAlign) {
        let top = index as f64 * self.row_height;
        let offset = match align {
            ScrollAlign::Start => top,
            ScrollAlign::Center => (top - (self.container_height - self.row_height) / 2.0).max(0.0),
            ScrollAlign::End => (top - self.container_height + self.row_height).max(0.0),
        };
        self.on_scroll(offset);
    }

    pub fn scroll_to_top(&mut self) {
        self.on_scroll(0.0);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.on_scroll(self.total_height());
    }

    pub fn is_index_visible(&mut self, index: usize) -> bool {
        let (start, end) = self.window();
        index >= start && index < end
    }
}

/// `max(3, floor(ceil(containerHeight/rowHeight)*0.5))`, clamped to 3 for
/// non-positive inputs.
pub fn calculate_optimal_overscan(row_height: f64, container_height: f64) -> usize {
    if row_height <= 0.0 || container_height <= 0.0 {
        return 3;
    }
    let visible = (container_height / row_height).ceil();
    ((visible * 0.5).floor() as usize).max(3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_literal_virtual_window_scenario() {
        let mut window = VirtualWindow::new(20.0, 2);
        window.set_container_height(100.0);
        window.set_source_len(50);
        window.on_scroll(58.0);

        let (start, end) = window.window();
        assert_eq!((start, end), (0, 10));
        assert_eq!(window.offset_y(), 0.0);
        assert_eq!(window.visible_count(), 10);
    }

    #[test]
    fn non_positive_container_height_yields_empty_window() {
        let mut window = VirtualWindow::new(20.0, 2);
        window.set_container_height(0.0);
        window.set_source_len(50);
        assert_eq!(window.window(), (0, 0));
        assert_eq!(window.offset_y(), 0.0);
    }

    #[test]
    fn window_never_exceeds_viewport_plus_overscan_bound() {
        let mut window = VirtualWindow::new(20.0, 2);
        window.set_container_height(100.0);
        window.set_source_len(1000);
        window.on_scroll(500.0);
        let (start, end) = window.window();
        let viewport_rows = (100.0f64 / 20.0).ceil() as usize;
        assert!(end - start <= viewport_rows + 2 * 2);
    }

    #[test]
    fn optimal_overscan_clamps_to_three_for_non_positive_inputs() {
        assert_eq!(calculate_optimal_overscan(0.0, 100.0), 3);
        assert_eq!(calculate_optimal_overscan(20.0, -5.0), 3);
        assert_eq!(calculate_optimal_overscan(20.0, 100.0), 3);
    }

    #[test]
    fn scroll_to_index_aligned_end_positions_row_at_viewport_bottom() {
        let mut window = VirtualWindow::new(20.0, 0);
        window.set_container_height(100.0);
        window.set_source_len(100);
        window.scroll_to_index_aligned(50, ScrollAlign::End);
        let offset = window.scroll_offset;
        assert_eq!(offset, 50.0 * 20.0 - 100.0 + 20.0);
    }
}
