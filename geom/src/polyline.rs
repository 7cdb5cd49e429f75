use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Bounds, Distance, Line, Pt2D, EPSILON_DIST};

/// An ordered list of at least two distinct points.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolyLine {
    pts: Vec<Pt2D>,
    // Cached; polylines are immutable and length gets asked for repeatedly.
    length: Distance,
}

impl PolyLine {
    pub fn new(pts: Vec<Pt2D>) -> anyhow::Result<PolyLine> {
        if pts.len() < 2 {
            anyhow::bail!("Need at least two points for a PolyLine");
        }
        if pts
            .windows(2)
            .any(|pair| pair[0].dist_to(pair[1]) <= EPSILON_DIST)
        {
            anyhow::bail!("PolyLine has repeat adjacent points: {:?}", pts);
        }

        let length = pts.windows(2).map(|pair| pair[0].dist_to(pair[1])).sum();
        Ok(PolyLine { pts, length })
    }

    pub fn must_new(pts: Vec<Pt2D>) -> PolyLine {
        PolyLine::new(pts).unwrap()
    }

    /// Squishes out adjacent duplicate points first, returning `None` if fewer than two distinct
    /// points remain. This is the forgiving constructor for real-world trajectory data.
    pub fn deduping_new(mut pts: Vec<Pt2D>) -> Option<PolyLine> {
        pts.dedup_by(|a, b| a.dist_to(*b) <= EPSILON_DIST);
        if pts.len() < 2 {
            return None;
        }
        Some(PolyLine::must_new(pts))
    }

    pub fn points(&self) -> &Vec<Pt2D> {
        &self.pts
    }

    pub fn lines(&self) -> impl Iterator<Item = Line> + '_ {
        self.pts
            .windows(2)
            .map(|pair| Line::must_new(pair[0], pair[1]))
    }

    pub fn length(&self) -> Distance {
        self.length
    }

    pub fn get_bounds(&self) -> Bounds {
        Bounds::from(&self.pts)
    }

    /// Clips to an axis-aligned rectangle, returning the pieces inside. A piece spanning several
    /// consecutive segments comes back stitched together, so the result is usually one part, but
    /// a polyline can leave and re-enter the rectangle.
    pub fn clip_to_rect(&self, rect: &Bounds) -> Vec<PolyLine> {
        let mut parts: Vec<Vec<Pt2D>> = Vec::new();
        for line in self.lines() {
            if let Some(clipped) = line.clip_to_rect(rect) {
                if let Some(last) = parts.last_mut() {
                    if last.last().unwrap().dist_to(clipped.pt1()) <= EPSILON_DIST {
                        last.push(clipped.pt2());
                        continue;
                    }
                }
                parts.push(vec![clipped.pt1(), clipped.pt2()]);
            }
        }
        parts.into_iter().map(PolyLine::must_new).collect()
    }
}

impl fmt::Display for PolyLine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "PolyLine::new(vec![")?;
        for pt in &self.pts {
            writeln!(f, "  Pt2D::new({}, {}),", pt.x(), pt.y())?;
        }
        write!(f, "])")
    }
}
