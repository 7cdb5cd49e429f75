//! Transit access: bus and metro stop counts per cell, distance from each cell centroid to the
//! city center, and distance to the nearest bus stop.

use std::collections::BTreeMap;

use geom::{FindClosest, LonLat, Pt2D};
use gridutil::{prettyprint_usize, Counter, Timer};

use crate::fishnet::Fishnet;
use crate::layers::{PointFeature, StudyRegion};

pub struct TransitAggregates {
    bus_counts: Counter<usize>,
    metro_counts: Counter<usize>,
    // grid_id -> km. Every active cell has both entries.
    dist_to_center_km: BTreeMap<usize, f64>,
    dist_to_nearest_bus_km: BTreeMap<usize, f64>,
}

impl TransitAggregates {
    pub fn bus_count(&self, grid_id: usize) -> usize {
        self.bus_counts.get(grid_id)
    }

    pub fn metro_count(&self, grid_id: usize) -> usize {
        self.metro_counts.get(grid_id)
    }

    pub fn dist_to_center_km(&self, grid_id: usize) -> f64 {
        self.dist_to_center_km.get(&grid_id).copied().unwrap_or(0.0)
    }

    pub fn dist_to_nearest_bus_km(&self, grid_id: usize) -> f64 {
        self.dist_to_nearest_bus_km
            .get(&grid_id)
            .copied()
            .unwrap_or(0.0)
    }
}

/// Counts stops per cell and measures the two centroid distances. Stops outside the grid don't
/// count toward any cell, but they stay in the nearest-bus index; the closest stop to a border
/// cell may well sit just over the boundary.
pub fn aggregate_transit(
    bus_stops: &[PointFeature],
    metro_stops: &[PointFeature],
    region: &StudyRegion,
    fishnet: &Fishnet,
    city_center: LonLat,
    timer: &mut Timer,
) -> TransitAggregates {
    let gps_bounds = region.gps_bounds();
    let center = gps_bounds.convert(city_center);

    let mut bus_counts = Counter::new();
    let mut bus_pts: Vec<(usize, Pt2D)> = Vec::new();
    let mut outside = 0;
    for (i, stop) in bus_stops.iter().enumerate() {
        let pt = gps_bounds.convert(stop.gps);
        bus_pts.push((i, pt));
        match fishnet.point_to_grid(pt) {
            Some(id) => {
                bus_counts.inc(id);
            }
            None => {
                outside += 1;
            }
        }
    }
    let mut metro_counts = Counter::new();
    for stop in metro_stops {
        match fishnet.point_to_grid(gps_bounds.convert(stop.gps)) {
            Some(id) => {
                metro_counts.inc(id);
            }
            None => {
                outside += 1;
            }
        }
    }
    log::info!(
        "transit: {} bus stops, {} metro stops ({} outside the grid)",
        prettyprint_usize(bus_stops.len()),
        prettyprint_usize(metro_stops.len()),
        prettyprint_usize(outside)
    );

    // With no bus stops anywhere there's no meaningful answer; fill with the grid diagonal,
    // farther than any real stop could be.
    let fallback = fishnet.diagonal();
    let closest_bus = FindClosest::new(bus_pts);
    if closest_bus.is_empty() {
        timer.warn(format!(
            "no bus stops at all; every cell's nearest-bus distance is the grid diagonal ({:.1} km)",
            fallback.to_km()
        ));
    }

    let mut dist_to_center_km = BTreeMap::new();
    let mut dist_to_nearest_bus_km = BTreeMap::new();
    timer.start_iter("measure cell distances", fishnet.len());
    for cell in fishnet.cells() {
        timer.next();
        let centroid = cell.rect.center();
        dist_to_center_km.insert(cell.id, centroid.dist_to(center).to_km());
        let nearest = match closest_bus.closest_pt(centroid) {
            Some((_, dist)) => dist.to_km(),
            None => fallback.to_km(),
        };
        dist_to_nearest_bus_km.insert(cell.id, nearest);
    }

    TransitAggregates {
        bus_counts,
        metro_counts,
        dist_to_center_km,
        dist_to_nearest_bus_km,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::tests::square_region;
    use geom::Distance;
    use serde_json::Map;

    fn stop(lon_offset_m: f64, lat_offset_m: f64) -> PointFeature {
        PointFeature {
            gps: LonLat::new(
                108.9 + lon_offset_m / 91_700.0,
                34.2 + lat_offset_m / 111_200.0,
            ),
            properties: Map::new(),
        }
    }

    fn aggregate(bus: Vec<PointFeature>, metro: Vec<PointFeature>) -> TransitAggregates {
        let region = square_region();
        let net = crate::fishnet::Fishnet::generate(&region, Distance::meters(500.0));
        let mut timer = Timer::throwaway();
        // Center at the centroid of cell 1.
        let center = LonLat::new(108.9 + 250.0 / 91_700.0, 34.2 + 250.0 / 111_200.0);
        aggregate_transit(&bus, &metro, &region, &net, center, &mut timer)
    }

    #[test]
    fn stop_counts() {
        let agg = aggregate(
            vec![stop(100.0, 100.0), stop(200.0, 100.0), stop(750.0, 250.0)],
            vec![stop(100.0, 200.0)],
        );
        assert_eq!(agg.bus_count(1), 2);
        assert_eq!(agg.bus_count(2), 1);
        assert_eq!(agg.bus_count(3), 0);
        assert_eq!(agg.metro_count(1), 1);
        assert_eq!(agg.metro_count(2), 0);
    }

    #[test]
    fn centroid_distances() {
        // One bus stop at the centroid of cell 1.
        let agg = aggregate(vec![stop(250.0, 250.0)], Vec::new());
        assert!(agg.dist_to_center_km(1).abs() < 1e-2);
        assert!(agg.dist_to_nearest_bus_km(1).abs() < 1e-2);
        // Cell 2's centroid is 500m east of the stop and the center.
        assert!((agg.dist_to_center_km(2) - 0.5).abs() < 1e-2);
        assert!((agg.dist_to_nearest_bus_km(2) - 0.5).abs() < 1e-2);
    }

    #[test]
    fn no_bus_stops_fall_back_to_grid_diagonal() {
        let agg = aggregate(Vec::new(), Vec::new());
        // The fill is pessimal, not flattering: longer than any within-grid distance, and the
        // same for every cell.
        let d = agg.dist_to_nearest_bus_km(1);
        assert!(d > 2.5, "got {}", d);
        assert_eq!(agg.dist_to_nearest_bus_km(2), d);
    }
}
