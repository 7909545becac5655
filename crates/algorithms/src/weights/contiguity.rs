//! Polygon contiguity (Queen / Rook / Bishop)
//!
//! Candidate pairs come from an R-tree over polygon envelopes; only pairs
//! whose envelopes touch are tested segment by segment.

use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{BoundingRect, Line, MultiPolygon};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};
use serde::{Deserialize, Serialize};

use geostat_core::{Error, Result};

use super::Location;
use crate::maybe_rayon::*;

/// Which boundary contacts make two polygons neighbors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContiguityType {
    /// Any shared boundary point
    #[default]
    Queen,
    /// A shared edge of positive length
    Rook,
    /// Shared points but no shared edge (corner contact only)
    Bishop,
}

/// Contacts shorter than this are treated as single points
const EDGE_EPSILON: f64 = 1e-10;

#[derive(Debug, Default, Clone, Copy)]
struct Contact {
    point: bool,
    edge: bool,
}

impl ContiguityType {
    fn accepts(&self, c: Contact) -> bool {
        match self {
            ContiguityType::Queen => c.point || c.edge,
            ContiguityType::Rook => c.edge,
            ContiguityType::Bishop => c.point && !c.edge,
        }
    }
}

type Envelope = GeomWithData<Rectangle<[f64; 2]>, usize>;

fn segments(mp: &MultiPolygon<f64>) -> Vec<Line<f64>> {
    mp.0.iter()
        .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors().iter()))
        .flat_map(|ring| ring.lines())
        .collect()
}

fn segment_boxes_touch(a: &Line<f64>, b: &Line<f64>) -> bool {
    a.start.x.min(a.end.x) <= b.start.x.max(b.end.x)
        && b.start.x.min(b.end.x) <= a.start.x.max(a.end.x)
        && a.start.y.min(a.end.y) <= b.start.y.max(b.end.y)
        && b.start.y.min(b.end.y) <= a.start.y.max(a.end.y)
}

fn contact(a: &[Line<f64>], b: &[Line<f64>]) -> Contact {
    let mut c = Contact::default();
    for la in a {
        for lb in b {
            if !segment_boxes_touch(la, lb) {
                continue;
            }
            match line_intersection(*la, *lb) {
                Some(LineIntersection::Collinear { intersection }) => {
                    let dx = intersection.end.x - intersection.start.x;
                    let dy = intersection.end.y - intersection.start.y;
                    if (dx * dx + dy * dy).sqrt() > EDGE_EPSILON {
                        c.edge = true;
                        return c;
                    }
                    c.point = true;
                }
                Some(LineIntersection::SinglePoint { .. }) => c.point = true,
                None => {}
            }
        }
    }
    c
}

/// Binary contiguity rows (`(neighbor, 1.0)`) for polygon locations.
///
/// Every location must carry a boundary; point-only input is a
/// configuration error for contiguity concepts.
pub fn contiguity_rows(locations: &[Location], kind: ContiguityType) -> Result<Vec<Vec<(usize, f64)>>> {
    let mut boundaries = Vec::with_capacity(locations.len());
    for loc in locations {
        match &loc.boundary {
            Some(b) => boundaries.push(b),
            None => {
                return Err(Error::invalid(
                    "concept",
                    "PolygonContiguity",
                    format!("feature {} has no polygon boundary", loc.feature),
                ))
            }
        }
    }

    let envelopes: Vec<Envelope> = boundaries
        .iter()
        .enumerate()
        .filter_map(|(i, b)| {
            b.bounding_rect().map(|r| {
                GeomWithData::new(
                    Rectangle::from_corners([r.min().x, r.min().y], [r.max().x, r.max().y]),
                    i,
                )
            })
        })
        .collect();
    let tree = RTree::bulk_load(envelopes);
    let segs: Vec<Vec<Line<f64>>> = boundaries.iter().map(|b| segments(b)).collect();

    let rows: Vec<Vec<(usize, f64)>> = (0..boundaries.len())
        .into_par_iter()
        .map(|i| {
            let Some(r) = boundaries[i].bounding_rect() else {
                return Vec::new();
            };
            let query = AABB::from_corners([r.min().x, r.min().y], [r.max().x, r.max().y]);
            tree.locate_in_envelope_intersecting(&query)
                .map(|env| env.data)
                .filter(|&j| j != i && kind.accepts(contact(&segs[i], &segs[j])))
                .map(|j| (j, 1.0))
                .collect::<Vec<_>>()
        })
        .collect();

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;
    use geostat_core::Feature;

    /// 3x3 grid of unit squares, row-major from the bottom-left
    fn grid3() -> Vec<Location> {
        let mut locs = Vec::new();
        for r in 0..3 {
            for c in 0..3 {
                let (x, y) = (c as f64, r as f64);
                let p = polygon![
                    (x: x, y: y),
                    (x: x + 1.0, y: y),
                    (x: x + 1.0, y: y + 1.0),
                    (x: x, y: y + 1.0),
                ];
                locs.push(Location::from_feature(locs.len(), &Feature::new(p)).unwrap());
            }
        }
        locs
    }

    fn counts(rows: &[Vec<(usize, f64)>]) -> Vec<usize> {
        rows.iter().map(Vec::len).collect()
    }

    #[test]
    fn test_queen_grid() {
        let rows = contiguity_rows(&grid3(), ContiguityType::Queen).unwrap();
        assert_eq!(counts(&rows), vec![3, 5, 3, 5, 8, 5, 3, 5, 3]);
    }

    #[test]
    fn test_rook_grid() {
        let rows = contiguity_rows(&grid3(), ContiguityType::Rook).unwrap();
        assert_eq!(counts(&rows), vec![2, 3, 2, 3, 4, 3, 2, 3, 2]);
        let mut center: Vec<usize> = rows[4].iter().map(|&(j, _)| j).collect();
        center.sort_unstable();
        assert_eq!(center, vec![1, 3, 5, 7]);
    }

    #[test]
    fn test_bishop_grid() {
        let rows = contiguity_rows(&grid3(), ContiguityType::Bishop).unwrap();
        let mut center: Vec<usize> = rows[4].iter().map(|&(j, _)| j).collect();
        center.sort_unstable();
        assert_eq!(center, vec![0, 2, 6, 8]);
    }

    #[test]
    fn test_points_rejected() {
        let locs = vec![Location::new(0, 0.0, 0.0), Location::new(1, 1.0, 0.0)];
        let err = contiguity_rows(&locs, ContiguityType::Queen).unwrap_err();
        assert!(err.is_configuration());
    }
}
