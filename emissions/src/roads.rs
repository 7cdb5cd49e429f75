//! Road network density: centerline kilometers per cell, and km per km² of cell area.

use std::collections::BTreeMap;

use geom::{Distance, PolyLine, Pt2D};
use gridutil::{prettyprint_usize, Timer};

use crate::fishnet::Fishnet;
use crate::layers::{LineFeature, StudyRegion};

pub struct RoadAggregates {
    // grid_id -> total clipped centerline length. Cells without roads are absent.
    lengths: BTreeMap<usize, Distance>,
    pub total_length: Distance,
    pub dropped_degenerate: usize,
}

impl RoadAggregates {
    pub fn length_km(&self, grid_id: usize) -> f64 {
        self.lengths
            .get(&grid_id)
            .copied()
            .unwrap_or(Distance::ZERO)
            .to_km()
    }

    /// km of road per km² of cell area.
    pub fn density_km_per_km2(&self, grid_id: usize, cell_area_km2: f64) -> f64 {
        self.length_km(grid_id) / cell_area_km2
    }
}

/// Clips every road against the fishnet and sums centerline length per cell. Roads are
/// independent, so the clipping fans out across a worker pool; per-cell merging happens
/// afterwards in input order, keeping the totals deterministic.
pub fn aggregate_roads(
    roads: &[LineFeature],
    region: &StudyRegion,
    fishnet: &Fishnet,
    timer: &mut Timer,
) -> RoadAggregates {
    let gps_bounds = region.gps_bounds();
    let mut polylines = Vec::new();
    let mut dropped_degenerate = 0;
    for road in roads {
        let pts: Vec<Pt2D> = road.pts.iter().map(|pt| gps_bounds.convert(*pt)).collect();
        match PolyLine::deduping_new(pts) {
            Some(pl) => polylines.push(pl),
            None => {
                dropped_degenerate += 1;
            }
        }
    }
    if dropped_degenerate > 0 {
        timer.warn(format!(
            "{} degenerate road geometries dropped",
            prettyprint_usize(dropped_degenerate)
        ));
    }

    let per_road = gridutil::parallelize(timer, "clip roads to cells", polylines, |pl| {
        fishnet.clip_polyline(&pl)
    });

    let mut lengths: BTreeMap<usize, Distance> = BTreeMap::new();
    let mut total_length = Distance::ZERO;
    for road_lengths in per_road {
        for (id, len) in road_lengths {
            *lengths.entry(id).or_insert(Distance::ZERO) += len;
            total_length += len;
        }
    }
    log::info!(
        "roads: {} clipped into {} cells, {} total",
        prettyprint_usize(roads.len()),
        prettyprint_usize(lengths.len()),
        total_length
    );

    RoadAggregates {
        lengths,
        total_length,
        dropped_degenerate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::tests::square_region;
    use geom::LonLat;
    use serde_json::Map;

    fn road(pts_m: Vec<(f64, f64)>) -> LineFeature {
        LineFeature {
            pts: pts_m
                .into_iter()
                .map(|(x, y)| LonLat::new(108.9 + x / 91_700.0, 34.2 + y / 111_200.0))
                .collect(),
            properties: Map::new(),
        }
    }

    fn aggregate(roads: Vec<LineFeature>) -> (RoadAggregates, crate::fishnet::Fishnet) {
        let region = square_region();
        let net = crate::fishnet::Fishnet::generate(&region, Distance::meters(500.0));
        let mut timer = Timer::throwaway();
        let agg = aggregate_roads(&roads, &region, &net, &mut timer);
        (agg, net)
    }

    #[test]
    fn splits_road_across_cells() {
        // 1000m east-west road through cells 1 and 2.
        let (agg, net) = aggregate(vec![road(vec![(0.0, 250.0), (1000.0, 250.0)])]);
        // The affine frame distorts these test coordinates by well under a meter.
        assert!((agg.length_km(1) - 0.5).abs() < 1e-2);
        assert!((agg.length_km(2) - 0.5).abs() < 1e-2);
        assert!((agg.total_length.to_km() - 1.0).abs() < 1e-2);
        // 0.5 km in a 0.25 km² cell.
        assert!((agg.density_km_per_km2(1, net.cell_area_km2()) - 2.0).abs() < 1e-1);
    }

    #[test]
    fn sums_multiple_roads_per_cell() {
        let (agg, _) = aggregate(vec![
            road(vec![(100.0, 100.0), (400.0, 100.0)]),
            road(vec![(100.0, 200.0), (400.0, 200.0)]),
        ]);
        assert!((agg.length_km(1) - 0.6).abs() < 1e-2);
        assert_eq!(agg.length_km(2), 0.0);
    }

    #[test]
    fn degenerate_roads_dropped() {
        let (agg, _) = aggregate(vec![road(vec![(100.0, 100.0), (100.0, 100.0)])]);
        assert_eq!(agg.dropped_degenerate, 1);
        assert_eq!(agg.total_length, Distance::ZERO);
    }
}
