/* Bounding window of a set of pixel indices */

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelIndex {
    pub row: isize,
    pub col: isize,
}

impl PixelIndex {
    pub fn new(row: isize, col: isize) -> Self {
        Self { row, col }
    }

    #[inline]
    pub fn is_inside(&self, nrows: usize, ncols: usize) -> bool {
        self.row >= 0 && self.col >= 0 && (self.row as usize) < nrows && (self.col as usize) < ncols
    }
}

/// Rectangular region of the pixel grid. Offsets may be negative before clipping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub col_off: isize,
    pub row_off: isize,
    pub width: usize,
    pub height: usize,
}

impl Window {
    pub fn new(col_off: isize, row_off: isize, width: usize, height: usize) -> Self {
        Self {
            col_off,
            row_off,
            width,
            height,
        }
    }

    /// Intersection with a `nrows` x `ncols` grid, `None` when they do not overlap.
    pub fn clip(&self, nrows: usize, ncols: usize) -> Option<Window> {
        let row0 = self.row_off.max(0);
        let col0 = self.col_off.max(0);
        let row1 = (self.row_off + self.height as isize).min(nrows as isize);
        let col1 = (self.col_off + self.width as isize).min(ncols as isize);

        if row1 <= row0 || col1 <= col0 {
            return None;
        }

        Some(Window::new(col0, row0, (col1 - col0) as usize, (row1 - row0) as usize))
    }

    pub fn is_inside(&self, nrows: usize, ncols: usize) -> bool {
        self.clip(nrows, ncols).as_ref() == Some(self)
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Window(col_off={}, row_off={}, width={}, height={})",
            self.col_off, self.row_off, self.width, self.height
        )
    }
}

/// A window together with the window-local `(row, col)` of every planned index.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowPlan {
    pub window: Window,
    pub local: Vec<(usize, usize)>,
}

/// Smallest window covering all indices. `None` for an empty index set.
///
/// No clipping happens here: the window may reach outside the raster.
pub fn plan_window(indices: &[PixelIndex]) -> Option<WindowPlan> {
    let first = indices.first()?;

    let (rmin, cmin, rmax, cmax) = indices.iter().fold(
        (first.row, first.col, first.row, first.col),
        |(rmin, cmin, rmax, cmax), idx| (rmin.min(idx.row), cmin.min(idx.col), rmax.max(idx.row), cmax.max(idx.col)),
    );

    let window = Window::new(cmin, rmin, (cmax - cmin) as usize + 1, (rmax - rmin) as usize + 1);
    let local = indices
        .iter()
        .map(|idx| ((idx.row - rmin) as usize, (idx.col - cmin) as usize))
        .collect();

    Some(WindowPlan { window, local })
}
