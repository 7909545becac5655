//! Locations: the representative coordinate (and boundary) of each feature

use geo::{Centroid, Geometry, MultiPolygon};
use geostat_core::{Error, Extent, Feature, Result};

/// One analysis unit: a feature reduced to a coordinate, plus its polygon
/// boundary when contiguity concepts need it.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    /// Index of the source feature in the input collection
    pub feature: usize,
    /// Feature id, if the source carried one
    pub id: Option<String>,
    pub x: f64,
    pub y: f64,
    /// Polygon boundary (polygon features only)
    pub boundary: Option<MultiPolygon<f64>>,
}

impl Location {
    pub fn new(feature: usize, x: f64, y: f64) -> Self {
        Self {
            feature,
            id: None,
            x,
            y,
            boundary: None,
        }
    }

    /// Reduce a feature to a location.
    ///
    /// Points keep their coordinate; polygons use their centroid and keep the
    /// boundary; other geometries use their centroid.
    pub fn from_feature(index: usize, feature: &Feature) -> Result<Self> {
        let geometry = feature
            .geometry
            .as_ref()
            .ok_or(Error::MissingGeometry { feature: index })?;

        let boundary = match geometry {
            Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p.clone()])),
            Geometry::MultiPolygon(mp) => Some(mp.clone()),
            Geometry::Rect(r) => Some(MultiPolygon::new(vec![r.to_polygon()])),
            _ => None,
        };

        let point = match geometry {
            Geometry::Point(p) => Some(*p),
            other => other.centroid(),
        }
        .filter(|p| p.x().is_finite() && p.y().is_finite())
        .ok_or(Error::MissingGeometry { feature: index })?;

        Ok(Self {
            feature: index,
            id: feature.id.clone(),
            x: point.x(),
            y: point.y(),
            boundary,
        })
    }

    pub fn coord(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

/// Extent of a location set, `None` if empty
pub fn extent_of(locations: &[Location]) -> Option<Extent> {
    Extent::from_coords(locations.iter().map(Location::coord))
}

/// Number of distinct coordinates in a location set
pub fn distinct_count(locations: &[Location]) -> usize {
    let mut coords: Vec<(f64, f64)> = locations.iter().map(Location::coord).collect();
    coords.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
    coords.dedup();
    coords.len()
}

/// Fail unless at least two distinct locations are present
pub fn validate_locations(locations: &[Location]) -> Result<()> {
    if locations.is_empty() {
        return Err(Error::EmptyInput);
    }
    let distinct = distinct_count(locations);
    if distinct < 2 {
        return Err(Error::InsufficientLocations { found: distinct });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Point};

    #[test]
    fn test_point_feature() {
        let f = Feature::new(Point::new(3.0, 4.0)).with_id("a");
        let loc = Location::from_feature(7, &f).unwrap();
        assert_eq!(loc.feature, 7);
        assert_eq!(loc.coord(), (3.0, 4.0));
        assert_eq!(loc.id.as_deref(), Some("a"));
        assert!(loc.boundary.is_none());
    }

    #[test]
    fn test_polygon_feature_uses_centroid() {
        let square = polygon![(x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 2.0), (x: 0.0, y: 2.0)];
        let loc = Location::from_feature(0, &Feature::new(square)).unwrap();
        assert!((loc.x - 1.0).abs() < 1e-12);
        assert!((loc.y - 1.0).abs() < 1e-12);
        assert!(loc.boundary.is_some());
    }

    #[test]
    fn test_missing_geometry() {
        let err = Location::from_feature(2, &Feature::empty()).unwrap_err();
        assert_eq!(err, Error::MissingGeometry { feature: 2 });
    }

    #[test]
    fn test_validate_requires_two_distinct() {
        assert_eq!(validate_locations(&[]), Err(Error::EmptyInput));
        let dup = vec![Location::new(0, 1.0, 1.0), Location::new(1, 1.0, 1.0)];
        assert_eq!(
            validate_locations(&dup),
            Err(Error::InsufficientLocations { found: 1 })
        );
        let ok = vec![Location::new(0, 1.0, 1.0), Location::new(1, 2.0, 1.0)];
        assert!(validate_locations(&ok).is_ok());
    }
}
