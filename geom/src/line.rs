use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Bounds, Distance, Pt2D, EPSILON_DIST};

/// A line segment.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Line(Pt2D, Pt2D);

impl Line {
    /// Creates a line segment between two points, which must not be the same.
    pub fn new(pt1: Pt2D, pt2: Pt2D) -> anyhow::Result<Line> {
        if pt1.dist_to(pt2) <= EPSILON_DIST {
            anyhow::bail!("Degenerate line from {} to {}", pt1, pt2);
        }
        Ok(Line(pt1, pt2))
    }

    /// Equivalent to `Line::new(pt1, pt2).unwrap()`. Use this to effectively document an
    /// assertion at the call-site.
    pub fn must_new(pt1: Pt2D, pt2: Pt2D) -> Line {
        Line::new(pt1, pt2).unwrap()
    }

    pub fn pt1(&self) -> Pt2D {
        self.0
    }

    pub fn pt2(&self) -> Pt2D {
        self.1
    }

    pub fn points(&self) -> Vec<Pt2D> {
        vec![self.0, self.1]
    }

    /// Length of the line segment.
    pub fn length(&self) -> Distance {
        self.pt1().dist_to(self.pt2())
    }

    pub fn middle(&self) -> Pt2D {
        Pt2D::new(
            (self.pt1().x() + self.pt2().x()) / 2.0,
            (self.pt1().y() + self.pt2().y()) / 2.0,
        )
    }

    /// Clips this segment to an axis-aligned rectangle using Liang-Barsky, returning the portion
    /// inside, if any. Degenerate results (the segment only grazing a corner or edge with zero
    /// remaining length) become `None`.
    pub fn clip_to_rect(&self, rect: &Bounds) -> Option<Line> {
        let x1 = self.pt1().x();
        let y1 = self.pt1().y();
        let dx = self.pt2().x() - x1;
        let dy = self.pt2().y() - y1;

        let mut t0: f64 = 0.0;
        let mut t1: f64 = 1.0;
        for (p, q) in [
            (-dx, x1 - rect.min_x),
            (dx, rect.max_x - x1),
            (-dy, y1 - rect.min_y),
            (dy, rect.max_y - y1),
        ] {
            if p == 0.0 {
                // Parallel to this edge; outside means no intersection at all.
                if q < 0.0 {
                    return None;
                }
            } else {
                let r = q / p;
                if p < 0.0 {
                    if r > t1 {
                        return None;
                    }
                    if r > t0 {
                        t0 = r;
                    }
                } else {
                    if r < t0 {
                        return None;
                    }
                    if r < t1 {
                        t1 = r;
                    }
                }
            }
        }
        if t0 >= t1 {
            return None;
        }

        let clipped = Line(
            Pt2D::new(x1 + t0 * dx, y1 + t0 * dy),
            Pt2D::new(x1 + t1 * dx, y1 + t1 * dy),
        );
        if clipped.length() <= EPSILON_DIST {
            return None;
        }
        Some(clipped)
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Line({}, {})", self.pt1(), self.pt2())
    }
}
