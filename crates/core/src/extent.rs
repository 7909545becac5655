//! Axis-aligned extents and the extent-derived default heuristics

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding extent of a set of locations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    /// Smallest extent containing every coordinate, `None` for an empty input
    pub fn from_coords<I>(coords: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        coords.into_iter().fold(None, |acc, (x, y)| {
            Some(match acc {
                None => Extent::new(x, y, x, y),
                Some(e) => Extent::new(e.min_x.min(x), e.min_y.min(y), e.max_x.max(x), e.max_y.max(y)),
            })
        })
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.min_x + self.max_x) / 2.0, (self.min_y + self.max_y) / 2.0)
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Grow the extent by `d` on every side
    pub fn expand(&self, d: f64) -> Self {
        Extent::new(self.min_x - d, self.min_y - d, self.max_x + d, self.max_y + d)
    }

    /// The shorter side, used by the default heuristics below.
    ///
    /// Collinear inputs have a zero-length side; the longer side is used
    /// instead so the heuristics stay positive.
    fn reference_length(&self) -> f64 {
        let short = self.width().min(self.height());
        if short > 0.0 {
            short
        } else {
            self.width().max(self.height())
        }
    }

    /// Default raster cell size: `min(width, height) / 250`
    pub fn default_cell_size(&self) -> f64 {
        self.reference_length() / 250.0
    }

    /// Default search radius: `min(width, height) / 30`
    pub fn default_search_radius(&self) -> f64 {
        self.reference_length() / 30.0
    }
}
