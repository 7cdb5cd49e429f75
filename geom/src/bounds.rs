use serde::{Deserialize, Serialize};

use crate::{LonLat, Pt2D};

/// Represents a rectangular boundary of `Pt2D` points.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    /// A boundary including no points.
    pub fn new() -> Bounds {
        Bounds {
            min_x: f64::MAX,
            min_y: f64::MAX,
            max_x: f64::MIN,
            max_y: f64::MIN,
        }
    }

    pub fn from(pts: &[Pt2D]) -> Bounds {
        let mut b = Bounds::new();
        for pt in pts {
            b.update(*pt);
        }
        b
    }

    pub fn rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Bounds {
        assert!(min_x <= max_x && min_y <= max_y);
        Bounds {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Update the boundary to include this point.
    pub fn update(&mut self, pt: Pt2D) {
        self.min_x = self.min_x.min(pt.x());
        self.max_x = self.max_x.max(pt.x());
        self.min_y = self.min_y.min(pt.y());
        self.max_y = self.max_y.max(pt.y());
    }

    /// Unions two boundaries.
    pub fn union(&mut self, other: &Bounds) {
        self.update(Pt2D::new(other.min_x, other.min_y));
        self.update(Pt2D::new(other.max_x, other.max_y));
    }

    /// True if the point is within the boundary, including the edges.
    pub fn contains(&self, pt: Pt2D) -> bool {
        pt.x() >= self.min_x && pt.x() <= self.max_x && pt.y() >= self.min_y && pt.y() <= self.max_y
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Area in square meters.
    pub fn area_m2(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> Pt2D {
        Pt2D::new(
            self.min_x + self.width() / 2.0,
            self.min_y + self.height() / 2.0,
        )
    }

    pub fn get_corners(&self) -> Vec<Pt2D> {
        vec![
            Pt2D::new(self.min_x, self.min_y),
            Pt2D::new(self.max_x, self.min_y),
            Pt2D::new(self.max_x, self.max_y),
            Pt2D::new(self.min_x, self.max_y),
        ]
    }

    /// The area of the overlap between two axis-aligned rectangles, in square meters. 0 if they
    /// only touch along an edge or don't overlap at all.
    pub fn intersection_area_m2(&self, other: &Bounds) -> f64 {
        let dx = self.max_x.min(other.max_x) - self.min_x.max(other.min_x);
        let dy = self.max_y.min(other.max_y) - self.min_y.max(other.min_y);
        if dx <= 0.0 || dy <= 0.0 {
            return 0.0;
        }
        dx * dy
    }

    pub fn overlaps(&self, other: &Bounds) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Bounds::new()
    }
}

/// Represents a rectangular boundary of `LonLat` points. Also acts as the bridge between GPS
/// space and world space: converting projects onto axes scaled by the real-world width and height
/// of these bounds, anchored at the southwest corner.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GPSBounds {
    min_lon: f64,
    min_lat: f64,
    max_lon: f64,
    max_lat: f64,
}

impl GPSBounds {
    /// A boundary including no points.
    pub fn new() -> GPSBounds {
        GPSBounds {
            min_lon: f64::MAX,
            min_lat: f64::MAX,
            max_lon: f64::MIN,
            max_lat: f64::MIN,
        }
    }

    pub fn from(pts: impl IntoIterator<Item = LonLat>) -> GPSBounds {
        let mut b = GPSBounds::new();
        for pt in pts {
            b.update(pt);
        }
        b
    }

    /// Update the boundary to include this point.
    pub fn update(&mut self, pt: LonLat) {
        self.min_lon = self.min_lon.min(pt.x());
        self.max_lon = self.max_lon.max(pt.x());
        self.min_lat = self.min_lat.min(pt.y());
        self.max_lat = self.max_lat.max(pt.y());
    }

    /// True if the point is within the boundary, including the edges.
    pub fn contains(&self, pt: LonLat) -> bool {
        pt.x() >= self.min_lon
            && pt.x() <= self.max_lon
            && pt.y() >= self.min_lat
            && pt.y() <= self.max_lat
    }

    pub fn is_empty(&self) -> bool {
        self.min_lon > self.max_lon
    }

    // Meters per degree along each axis, measured with Haversine along the southern and western
    // edges. Within a city-scale extent, treating these as constant keeps the projection affine,
    // so round-tripping is exact and lon/lat-aligned rectangles stay rectangles.
    fn meters_per_degree(&self) -> (f64, f64) {
        assert!(!self.is_empty());
        let sw = LonLat::new(self.min_lon, self.min_lat);
        let width_m = sw.gps_dist(LonLat::new(self.max_lon, self.min_lat));
        let height_m = sw.gps_dist(LonLat::new(self.min_lon, self.max_lat));
        (
            width_m.inner_meters() / (self.max_lon - self.min_lon),
            height_m.inner_meters() / (self.max_lat - self.min_lat),
        )
    }

    /// Projects a point into world space. The southwest corner of these bounds maps to (0, 0);
    /// x grows east, y grows north, both in meters. Points outside the bounds are allowed.
    pub fn convert(&self, pt: LonLat) -> Pt2D {
        let (scale_x, scale_y) = self.meters_per_degree();
        Pt2D::new(
            (pt.x() - self.min_lon) * scale_x,
            (pt.y() - self.min_lat) * scale_y,
        )
    }

    /// The inverse of `convert`. Within a city-scale extent, the round-trip error stays below the
    /// coordinate trimming precision.
    pub fn convert_back(&self, pt: Pt2D) -> LonLat {
        let (scale_x, scale_y) = self.meters_per_degree();
        LonLat::new(
            self.min_lon + pt.x() / scale_x,
            self.min_lat + pt.y() / scale_y,
        )
    }
}

impl Default for GPSBounds {
    fn default() -> Self {
        GPSBounds::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xian_bounds() -> GPSBounds {
        // Roughly the six-district core of Xi'an.
        let mut b = GPSBounds::new();
        b.update(LonLat::new(108.76, 34.15));
        b.update(LonLat::new(109.10, 34.40));
        b
    }

    #[test]
    fn convert_round_trip() {
        let bounds = xian_bounds();
        for pt in [
            LonLat::new(108.76, 34.15),
            LonLat::new(109.10, 34.40),
            LonLat::new(108.94, 34.26),
            LonLat::new(108.8123, 34.3987),
        ] {
            let there = bounds.convert(pt);
            let back = bounds.convert_back(there);
            // Under 1 meter of error.
            assert!(pt.gps_dist(back).inner_meters() < 1.0, "{} vs {}", pt, back);
        }
    }

    #[test]
    fn convert_anchors_southwest() {
        let bounds = xian_bounds();
        let origin = bounds.convert(LonLat::new(108.76, 34.15));
        assert_eq!(origin, Pt2D::new(0.0, 0.0));
        let ne = bounds.convert(LonLat::new(109.10, 34.40));
        assert!(ne.x() > 0.0 && ne.y() > 0.0);
    }

    #[test]
    fn rect_intersection() {
        let a = Bounds::rect(0.0, 0.0, 500.0, 500.0);
        let b = Bounds::rect(250.0, 0.0, 750.0, 500.0);
        assert_eq!(a.intersection_area_m2(&b), 250.0 * 500.0);
        // Sharing only an edge counts as zero overlap.
        let c = Bounds::rect(500.0, 0.0, 1000.0, 500.0);
        assert_eq!(a.intersection_area_m2(&c), 0.0);
        assert!(a.overlaps(&c));
    }
}
