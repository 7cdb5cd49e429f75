//! Geometry for the grid pipeline. Everything downstream of the loaders works in "world space":
//! meters on a plane, anchored at the southwest corner of the study region's GPS bounds. `LonLat`
//! and `Pt2D` are distinct types on purpose; mixing coordinate systems becomes a compile error
//! instead of a silent unit bug.

mod bounds;
mod distance;
mod find_closest;
mod gps;
mod line;
mod polygon;
mod polyline;
mod pt;

pub use crate::bounds::{Bounds, GPSBounds};
pub use crate::distance::Distance;
pub use crate::find_closest::FindClosest;
pub use crate::gps::LonLat;
pub use crate::line::Line;
pub use crate::polygon::Polygon;
pub use crate::polyline::PolyLine;
pub use crate::pt::Pt2D;

/// Two points closer than this are considered the same. 0.1mm.
pub const EPSILON_DIST: Distance = Distance::const_meters(0.0001);

/// Reduce the precision of an f64. This helps ensure serialization is identical between platforms
/// and keeps geometry comparisons stable.
pub fn trim_f64(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

pub(crate) fn serialize_f64<S: serde::Serializer>(x: &f64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(*x)
}

pub(crate) fn deserialize_f64<'de, D: serde::Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    use serde::Deserialize;
    f64::deserialize(d)
}
