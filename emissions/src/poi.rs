//! POI ingestion and per-cell aggregation: bucket counts, densities, and mixed-use entropy.

use std::collections::BTreeMap;

use gridutil::{prettyprint_usize, Timer};

use crate::fishnet::Fishnet;
use crate::layers::StudyRegion;
use crate::{Error, Result};

/// The five domain buckets POIs are classified into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum PoiBucket {
    Leisure,
    Office,
    PublicService,
    Transport,
    Residential,
}

impl PoiBucket {
    pub const ALL: [PoiBucket; 5] = [
        PoiBucket::Leisure,
        PoiBucket::Office,
        PoiBucket::PublicService,
        PoiBucket::Transport,
        PoiBucket::Residential,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PoiBucket::Leisure => "leisure",
            PoiBucket::Office => "office",
            PoiBucket::PublicService => "public-service",
            PoiBucket::Transport => "transport",
            PoiBucket::Residential => "residential",
        }
    }
}

// The single declarative mapping from a POI table's major class to a bucket. Matching is
// case-insensitive on the trimmed class name. Classes not listed here are dropped (with a count);
// that's deliberate, since classes like restaurants or shops don't fit the five-bucket scheme.
const CLASS_TO_BUCKET: &[(&str, PoiBucket)] = &[
    // Sports, recreation, entertainment.
    ("sports and recreation", PoiBucket::Leisure),
    ("recreation", PoiBucket::Leisure),
    ("entertainment", PoiBucket::Leisure),
    ("scenic spot", PoiBucket::Leisure),
    // Companies and other business establishments.
    ("company", PoiBucket::Office),
    ("enterprise", PoiBucket::Office),
    ("commercial building", PoiBucket::Office),
    ("office building", PoiBucket::Office),
    // Government, education, medical, cultural institutions.
    ("government agency", PoiBucket::PublicService),
    ("public service", PoiBucket::PublicService),
    ("education", PoiBucket::PublicService),
    ("school", PoiBucket::PublicService),
    ("medical service", PoiBucket::PublicService),
    ("hospital", PoiBucket::PublicService),
    ("culture", PoiBucket::PublicService),
    ("cultural venue", PoiBucket::PublicService),
    // Stations, terminals, parking.
    ("transportation station", PoiBucket::Transport),
    ("transport hub", PoiBucket::Transport),
    ("bus station", PoiBucket::Transport),
    ("railway station", PoiBucket::Transport),
    ("parking", PoiBucket::Transport),
    // Housing communities and dormitories.
    ("residential community", PoiBucket::Residential),
    ("residential area", PoiBucket::Residential),
    ("dormitory", PoiBucket::Residential),
];

pub fn bucket_for_class(major_class: &str) -> Option<PoiBucket> {
    let needle = major_class.trim().to_lowercase();
    CLASS_TO_BUCKET
        .iter()
        .find(|(class, _)| *class == needle)
        .map(|(_, bucket)| *bucket)
}

pub struct PoiRecord {
    pub lon: f64,
    pub lat: f64,
    pub major_class: String,
}

/// Reads one POI CSV. The header must carry `longitude`, `latitude`, `major_class` and
/// `district`; a missing class column is a mapping error, other missing columns are schema
/// errors. Rows with unparseable coordinates are dropped and counted, not fatal.
pub fn read_poi_csv(path: &str) -> Result<(Vec<PoiRecord>, usize)> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|err| Error::input(format!("{}: {}", path, err)))?;
    let headers = reader
        .headers()
        .map_err(|err| Error::input(format!("{}: {}", path, err)))?
        .clone();

    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim_start_matches('\u{feff}').trim().eq_ignore_ascii_case(name))
    };
    let class_idx = find("major_class")
        .ok_or_else(|| Error::mapping(format!("{}: no major_class column", path)))?;
    let lon_idx = find("longitude")
        .ok_or_else(|| Error::schema(format!("{}: no longitude column", path)))?;
    let lat_idx = find("latitude")
        .ok_or_else(|| Error::schema(format!("{}: no latitude column", path)))?;
    find("district").ok_or_else(|| Error::schema(format!("{}: no district column", path)))?;

    let mut records = Vec::new();
    let mut dropped_invalid = 0;
    for row in reader.records() {
        let row = row.map_err(|err| Error::input(format!("{}: {}", path, err)))?;
        let lon: Option<f64> = row.get(lon_idx).and_then(|v| v.trim().parse().ok());
        let lat: Option<f64> = row.get(lat_idx).and_then(|v| v.trim().parse().ok());
        match (lon, lat) {
            (Some(lon), Some(lat)) if geom::LonLat::new(lon, lat).is_valid() => {
                records.push(PoiRecord {
                    lon,
                    lat,
                    major_class: row.get(class_idx).unwrap_or("").to_string(),
                });
            }
            _ => {
                dropped_invalid += 1;
            }
        }
    }
    Ok((records, dropped_invalid))
}

pub struct PoiAggregates {
    // grid_id -> count per bucket, in PoiBucket::ALL order. Only cells with at least one POI
    // appear; lookups default to zero.
    counts: BTreeMap<usize, [usize; 5]>,
    pub dropped_unmapped: usize,
    pub dropped_outside: usize,
    pub assigned: usize,
}

impl PoiAggregates {
    pub fn count(&self, grid_id: usize, bucket: PoiBucket) -> usize {
        self.counts
            .get(&grid_id)
            .map(|per_bucket| per_bucket[bucket as usize])
            .unwrap_or(0)
    }

    /// POIs of one bucket per km² of cell area.
    pub fn density_per_km2(&self, grid_id: usize, bucket: PoiBucket, cell_area_km2: f64) -> f64 {
        (self.count(grid_id, bucket) as f64) / cell_area_km2
    }

    /// Normalized Shannon entropy of the bucket mix in one cell: -Σ p ln p / ln K, where K is
    /// the number of buckets present. 0 for cells with at most one POI or a single bucket.
    pub fn mixed_use_entropy(&self, grid_id: usize) -> f64 {
        let per_bucket = match self.counts.get(&grid_id) {
            Some(x) => x,
            None => return 0.0,
        };
        let total: usize = per_bucket.iter().sum();
        if total <= 1 {
            return 0.0;
        }
        let k = per_bucket.iter().filter(|c| **c > 0).count();
        if k <= 1 {
            return 0.0;
        }
        let mut h = 0.0;
        for count in per_bucket {
            if *count > 0 {
                let p = (*count as f64) / (total as f64);
                h -= p * p.ln();
            }
        }
        h / (k as f64).ln()
    }
}

/// Filters POIs to the study region, maps classes to buckets, and counts per (cell, bucket).
pub fn aggregate_pois(
    records: Vec<PoiRecord>,
    region: &StudyRegion,
    fishnet: &Fishnet,
    timer: &mut Timer,
) -> PoiAggregates {
    let mut counts: BTreeMap<usize, [usize; 5]> = BTreeMap::new();
    let mut dropped_unmapped = 0;
    let mut dropped_outside = 0;
    let mut assigned = 0;

    timer.start_iter("assign POIs to cells", records.len());
    for record in &records {
        timer.next();
        let bucket = match bucket_for_class(&record.major_class) {
            Some(bucket) => bucket,
            None => {
                dropped_unmapped += 1;
                continue;
            }
        };
        let pt = region
            .gps_bounds()
            .convert(geom::LonLat::new(record.lon, record.lat));
        // The fishnet only holds cells intersecting the study region, so assignment doubles as
        // the region filter. A POI on a cell edge still lands in exactly one cell.
        let grid_id = match fishnet.point_to_grid(pt) {
            Some(id) => id,
            None => {
                dropped_outside += 1;
                continue;
            }
        };
        counts.entry(grid_id).or_insert([0; 5])[bucket as usize] += 1;
        assigned += 1;
    }

    if dropped_unmapped > 0 {
        timer.warn(format!(
            "{} POIs had major classes outside the bucket mapping and were dropped",
            prettyprint_usize(dropped_unmapped)
        ));
    }
    log::info!(
        "POIs: {} in, {} assigned, {} unmapped, {} outside the grid",
        prettyprint_usize(records.len()),
        prettyprint_usize(assigned),
        prettyprint_usize(dropped_unmapped),
        prettyprint_usize(dropped_outside)
    );

    PoiAggregates {
        counts,
        dropped_unmapped,
        dropped_outside,
        assigned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::tests::square_region;
    use geom::Distance;

    fn record(lon_offset_m: f64, lat_offset_m: f64, major_class: &str) -> PoiRecord {
        // Offsets in meters from the test region's southwest corner, converted crudely.
        PoiRecord {
            lon: 108.9 + lon_offset_m / 91_700.0,
            lat: 34.2 + lat_offset_m / 111_200.0,
            major_class: major_class.to_string(),
        }
    }

    fn aggregate(records: Vec<PoiRecord>) -> (PoiAggregates, crate::fishnet::Fishnet) {
        let region = square_region();
        let net = crate::fishnet::Fishnet::generate(&region, Distance::meters(500.0));
        let mut timer = Timer::throwaway();
        let agg = aggregate_pois(records, &region, &net, &mut timer);
        (agg, net)
    }

    #[test]
    fn class_mapping() {
        assert_eq!(bucket_for_class("Company"), Some(PoiBucket::Office));
        assert_eq!(
            bucket_for_class("  sports and recreation "),
            Some(PoiBucket::Leisure)
        );
        assert_eq!(bucket_for_class("restaurant"), None);
    }

    #[test]
    fn single_poi_in_one_cell() {
        // One leisure POI near the middle of the first cell.
        let (agg, net) = aggregate(vec![record(250.0, 250.0, "entertainment")]);
        assert_eq!(agg.count(1, PoiBucket::Leisure), 1);
        for bucket in PoiBucket::ALL {
            if bucket != PoiBucket::Leisure {
                assert_eq!(agg.count(1, bucket), 0);
            }
        }
        // A single POI means no mix.
        assert_eq!(agg.mixed_use_entropy(1), 0.0);
        // Density: 1 POI over 0.25 km².
        assert_eq!(agg.density_per_km2(1, PoiBucket::Leisure, net.cell_area_km2()), 4.0);
        assert_eq!(agg.assigned, 1);
    }

    #[test]
    fn mixed_use_cell_entropy() {
        // 5 POIs in one cell: 2 leisure, 1 office, 1 residential, 1 public-service.
        let (agg, _) = aggregate(vec![
            record(100.0, 100.0, "entertainment"),
            record(150.0, 100.0, "recreation"),
            record(200.0, 100.0, "company"),
            record(250.0, 100.0, "residential community"),
            record(300.0, 100.0, "hospital"),
        ]);
        assert_eq!(agg.count(1, PoiBucket::Leisure), 2);
        assert_eq!(agg.count(1, PoiBucket::Office), 1);
        assert_eq!(agg.count(1, PoiBucket::Residential), 1);
        assert_eq!(agg.count(1, PoiBucket::PublicService), 1);
        assert_eq!(agg.count(1, PoiBucket::Transport), 0);

        let expected = -(0.4f64 * 0.4f64.ln() + 3.0 * 0.2 * 0.2f64.ln()) / 4.0f64.ln();
        let got = agg.mixed_use_entropy(1);
        assert!((got - expected).abs() < 1e-12, "got {}, expected {}", got, expected);
    }

    #[test]
    fn unmapped_classes_dropped_with_count() {
        let (agg, _) = aggregate(vec![
            record(100.0, 100.0, "restaurant"),
            record(150.0, 100.0, "company"),
        ]);
        assert_eq!(agg.dropped_unmapped, 1);
        assert_eq!(agg.assigned, 1);
    }

    #[test]
    fn exactly_one_cell_claims_each_poi() {
        // A POI exactly on the edge between cells 1 and 2 lands in exactly one bucket count.
        // Derive the edge coordinate through the region's own projection so it really sits on
        // x=500 after conversion.
        let region = square_region();
        let net = crate::fishnet::Fishnet::generate(&region, Distance::meters(500.0));
        let gps = region.gps_bounds().convert_back(geom::Pt2D::new(500.0, 250.0));
        let mut timer = Timer::throwaway();
        let agg = aggregate_pois(
            vec![PoiRecord {
                lon: gps.x(),
                lat: gps.y(),
                major_class: "company".to_string(),
            }],
            &region,
            &net,
            &mut timer,
        );
        let total: usize = [1, 2]
            .iter()
            .map(|id| agg.count(*id, PoiBucket::Office))
            .sum();
        assert_eq!(total, 1);
        // And specifically the smaller id.
        assert_eq!(agg.count(1, PoiBucket::Office), 1);
    }
}
