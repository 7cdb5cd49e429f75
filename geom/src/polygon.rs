use std::fmt;

use geo::prelude::{Area, Contains, Intersects};
use geo::BooleanOps;
use serde::{Deserialize, Serialize};

use crate::{Bounds, Pt2D, EPSILON_DIST};

/// A polygon in world space: one exterior ring, maybe interior holes. Rings are stored closed
/// (first point equals last point).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    exterior: Vec<Pt2D>,
    holes: Vec<Vec<Pt2D>>,
}

impl Polygon {
    pub fn new(mut exterior: Vec<Pt2D>, holes: Vec<Vec<Pt2D>>) -> anyhow::Result<Polygon> {
        close_ring(&mut exterior)?;
        let mut closed_holes = Vec::new();
        for mut hole in holes {
            close_ring(&mut hole)?;
            closed_holes.push(hole);
        }
        Ok(Polygon {
            exterior,
            holes: closed_holes,
        })
    }

    pub fn must_new(exterior: Vec<Pt2D>) -> Polygon {
        Polygon::new(exterior, Vec::new()).unwrap()
    }

    /// An axis-aligned rectangle as a polygon.
    pub fn from_rect(rect: &Bounds) -> Polygon {
        let mut pts = rect.get_corners();
        pts.push(pts[0]);
        Polygon {
            exterior: pts,
            holes: Vec::new(),
        }
    }

    pub fn exterior(&self) -> &Vec<Pt2D> {
        &self.exterior
    }

    pub fn get_bounds(&self) -> Bounds {
        Bounds::from(&self.exterior)
    }

    /// Area in square meters.
    pub fn area_m2(&self) -> f64 {
        self.to_geo().unsigned_area()
    }

    /// True if the point is strictly inside. A point exactly on the boundary isn't contained;
    /// callers needing edge assignment handle ties themselves.
    pub fn contains_pt(&self, pt: Pt2D) -> bool {
        self.to_geo().contains(&geo::Point::from(pt))
    }

    pub fn intersects(&self, other: &Polygon) -> bool {
        self.to_geo().intersects(&other.to_geo())
    }

    /// The area of overlap between two polygons, in square meters.
    pub fn intersection_area_m2(&self, other: &Polygon) -> f64 {
        if !self.get_bounds().overlaps(&other.get_bounds()) {
            return 0.0;
        }
        self.to_geo().intersection(&other.to_geo()).unsigned_area()
    }

    fn to_geo(&self) -> geo::Polygon<f64> {
        geo::Polygon::new(
            ring_to_geo(&self.exterior),
            self.holes.iter().map(|h| ring_to_geo(h)).collect(),
        )
    }
}

impl From<geo::Polygon<f64>> for Polygon {
    fn from(poly: geo::Polygon<f64>) -> Polygon {
        let (exterior, interiors) = poly.into_inner();
        Polygon {
            exterior: ring_from_geo(exterior),
            holes: interiors.into_iter().map(ring_from_geo).collect(),
        }
    }
}

fn ring_to_geo(pts: &[Pt2D]) -> geo::LineString<f64> {
    geo::LineString(pts.iter().map(|pt| geo::Coordinate::from(*pt)).collect())
}

fn ring_from_geo(ring: geo::LineString<f64>) -> Vec<Pt2D> {
    ring.into_iter().map(Pt2D::from).collect()
}

fn close_ring(pts: &mut Vec<Pt2D>) -> anyhow::Result<()> {
    if pts.len() < 3 {
        anyhow::bail!("Ring with fewer than 3 points: {:?}", pts);
    }
    if pts[0].dist_to(*pts.last().unwrap()) > EPSILON_DIST {
        pts.push(pts[0]);
    }
    if pts.len() < 4 {
        anyhow::bail!("Degenerate ring: {:?}", pts);
    }
    Ok(())
}

impl fmt::Display for Polygon {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Polygon with {} exterior points and {} holes",
            self.exterior.len(),
            self.holes.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(min: f64, max: f64) -> Polygon {
        Polygon::from_rect(&Bounds::rect(min, min, max, max))
    }

    #[test]
    fn area() {
        assert_eq!(square(0.0, 500.0).area_m2(), 250_000.0);
    }

    #[test]
    fn contains() {
        let poly = square(0.0, 500.0);
        assert!(poly.contains_pt(Pt2D::new(250.0, 250.0)));
        assert!(!poly.contains_pt(Pt2D::new(600.0, 250.0)));
    }

    #[test]
    fn intersection_area() {
        // Two 500m squares overlapping by half.
        let a = square(0.0, 500.0);
        let b = Polygon::from_rect(&Bounds::rect(250.0, 0.0, 750.0, 500.0));
        let overlap = a.intersection_area_m2(&b);
        assert!((overlap - 125_000.0).abs() < 1.0, "got {}", overlap);

        // Disjoint.
        let c = Polygon::from_rect(&Bounds::rect(1000.0, 0.0, 1500.0, 500.0));
        assert_eq!(a.intersection_area_m2(&c), 0.0);
    }

    #[test]
    fn auto_close() {
        // An unclosed ring gets closed.
        let poly = Polygon::new(
            vec![
                Pt2D::new(0.0, 0.0),
                Pt2D::new(100.0, 0.0),
                Pt2D::new(100.0, 100.0),
            ],
            Vec::new(),
        )
        .unwrap();
        assert_eq!(poly.exterior().len(), 4);
    }
}
