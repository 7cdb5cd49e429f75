//! Trajectory decoding and per-cell carbon emission accounting. Each trip arrives as a Google
//! encoded polyline (precision 5); its length is split across the cells it crosses, and each
//! cell's share of travel becomes emissions through the per-km factor.

use std::collections::BTreeMap;

use geom::{Distance, PolyLine, Pt2D};
use gridutil::{prettyprint_usize, Timer};

use crate::fishnet::Fishnet;
use crate::layers::StudyRegion;
use crate::{Error, Result};

/// The two commute windows, processed independently end to end.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Window {
    Morning,
    Evening,
}

impl Window {
    pub const ALL: [Window; 2] = [Window::Morning, Window::Evening];

    pub fn label(self) -> &'static str {
        match self {
            Window::Morning => "morning",
            Window::Evening => "evening",
        }
    }

    fn parse(raw: &str) -> Option<Window> {
        match raw.trim().to_lowercase().as_str() {
            "morning" => Some(Window::Morning),
            "evening" => Some(Window::Evening),
            _ => None,
        }
    }
}

pub struct WindowEmissions {
    pub window: Window,
    // grid_id -> kg CO2.
    emissions_kg: BTreeMap<usize, f64>,
    pub trips_in: usize,
    pub trips_used: usize,
    pub dropped_undecodable: usize,
    pub dropped_degenerate: usize,
    pub dropped_other_window: usize,
    /// Decoded trip length, whether or not it crossed the grid.
    pub total_length: Distance,
    /// The part of the length that landed in active cells.
    pub assigned_length: Distance,
}

impl WindowEmissions {
    pub fn emission_kg(&self, grid_id: usize) -> f64 {
        self.emissions_kg.get(&grid_id).copied().unwrap_or(0.0)
    }

    pub fn total_emissions_kg(&self) -> f64 {
        self.emissions_kg.values().sum()
    }
}

/// Reads one window's trajectory CSV and accumulates per-cell emissions. Undecodable or
/// degenerate rows are dropped and counted; rows labeled with the other window are skipped. The
/// emission factor and the post multiplier are each applied exactly once, to the per-cell length.
pub fn compute_emissions(
    path: &str,
    window: Window,
    region: &StudyRegion,
    fishnet: &Fishnet,
    emission_factor_kg_per_km: f64,
    post_multiplier: f64,
    timer: &mut Timer,
) -> Result<WindowEmissions> {
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
    let window_idx =
        find("window").ok_or_else(|| Error::schema(format!("{}: no window column", path)))?;
    let polyline_idx =
        find("polyline").ok_or_else(|| Error::schema(format!("{}: no polyline column", path)))?;

    let mut rows = Vec::new();
    for row in reader.records() {
        rows.push(row.map_err(|err| Error::input(format!("{}: {}", path, err)))?);
    }

    let gps_bounds = region.gps_bounds();
    let mut result = WindowEmissions {
        window,
        emissions_kg: BTreeMap::new(),
        trips_in: rows.len(),
        trips_used: 0,
        dropped_undecodable: 0,
        dropped_degenerate: 0,
        dropped_other_window: 0,
        total_length: Distance::ZERO,
        assigned_length: Distance::ZERO,
    };

    timer.start_iter(format!("assign {} trips", window.label()), rows.len());
    for row in rows {
        timer.next();
        match Window::parse(row.get(window_idx).unwrap_or("")) {
            Some(w) if w == window => {}
            _ => {
                result.dropped_other_window += 1;
                continue;
            }
        }
        let encoded = row.get(polyline_idx).unwrap_or("");
        let decoded = match polyline::decode_polyline(encoded, 5) {
            Ok(line) => line,
            Err(_) => {
                result.dropped_undecodable += 1;
                continue;
            }
        };
        let mut pts: Vec<Pt2D> = Vec::with_capacity(decoded.0.len());
        let mut bogus = false;
        for coord in &decoded.0 {
            let gps = geom::LonLat::new(coord.x, coord.y);
            if !gps.is_valid() {
                bogus = true;
                break;
            }
            pts.push(gps_bounds.convert(gps));
        }
        if bogus {
            result.dropped_undecodable += 1;
            continue;
        }
        let pl = match PolyLine::deduping_new(pts) {
            Some(pl) => pl,
            None => {
                result.dropped_degenerate += 1;
                continue;
            }
        };

        let length = pl.length();
        let per_cell = fishnet.clip_polyline(&pl);
        let assigned: Distance = per_cell.values().copied().sum();
        // Clipping partitions the trip, so the cell shares can never exceed the whole. Going
        // over means a piece got counted twice.
        if assigned > length + Distance::meters(0.01) {
            return Err(Error::invariant(format!(
                "{}: a {} trip split into {} across cells",
                path, length, assigned
            )));
        }
        for (id, len) in per_cell {
            *result.emissions_kg.entry(id).or_insert(0.0) +=
                len.to_km() * emission_factor_kg_per_km * post_multiplier;
        }
        result.total_length += length;
        result.assigned_length += assigned;
        result.trips_used += 1;
    }

    let dropped = result.dropped_undecodable + result.dropped_degenerate;
    if dropped > 0 {
        timer.warn(format!(
            "{}: {} of {} trips dropped ({} undecodable, {} degenerate)",
            path,
            prettyprint_usize(dropped),
            prettyprint_usize(result.trips_in),
            prettyprint_usize(result.dropped_undecodable),
            prettyprint_usize(result.dropped_degenerate)
        ));
    }
    log::info!(
        "{} window: {} trips used, {:.1} km traveled, {:.1} km inside the grid, {:.2} kg CO2",
        window.label(),
        prettyprint_usize(result.trips_used),
        result.total_length.to_km(),
        result.assigned_length.to_km(),
        result.total_emissions_kg()
    );

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::tests::square_region;
    use std::io::Write;

    fn encode(pts_m: &[(f64, f64)]) -> String {
        let coords: Vec<geo::Coordinate<f64>> = pts_m
            .iter()
            .map(|(x, y)| geo::Coordinate {
                x: 108.9 + x / 91_700.0,
                y: 34.2 + y / 111_200.0,
            })
            .collect();
        polyline::encode_coordinates(coords, 5).unwrap()
    }

    fn write_csv(name: &str, rows: &[(&str, String)]) -> String {
        let path =
            std::env::temp_dir().join(format!("traj_test_{}_{}.csv", std::process::id(), name));
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "window,polyline").unwrap();
        for (window, encoded) in rows {
            writeln!(f, "{},{}", window, encoded).unwrap();
        }
        path.to_string_lossy().to_string()
    }

    fn compute(path: &str, window: Window, ef: f64, multiplier: f64) -> WindowEmissions {
        let region = square_region();
        let net = crate::fishnet::Fishnet::generate(&region, Distance::meters(500.0));
        let mut timer = Timer::throwaway();
        let result =
            compute_emissions(path, window, &region, &net, ef, multiplier, &mut timer).unwrap();
        std::fs::remove_file(path).unwrap();
        result
    }

    #[test]
    fn splits_trip_emissions_between_cells() {
        // A bent 1km trip: 600m in cell 1, then 400m in cell 2. With 0.1 kg/km that's 0.06 and
        // 0.04 kg. Polyline encoding quantizes to about a meter, hence the loose tolerances.
        let path = write_csv(
            "split",
            &[(
                "morning",
                encode(&[(100.0, 200.0), (100.0, 400.0), (900.0, 400.0)]),
            )],
        );
        let result = compute(&path, Window::Morning, 0.1, 1.0);
        assert_eq!(result.trips_used, 1);
        assert!((result.emission_kg(1) - 0.06).abs() < 1e-3, "got {}", result.emission_kg(1));
        assert!((result.emission_kg(2) - 0.04).abs() < 1e-3, "got {}", result.emission_kg(2));
        assert!((result.total_emissions_kg() - 0.1).abs() < 1e-3);
    }

    #[test]
    fn post_multiplier_applied_once() {
        let path = write_csv(
            "multiplier",
            &[("morning", encode(&[(100.0, 250.0), (400.0, 250.0)]))],
        );
        let result = compute(&path, Window::Morning, 0.1, 1.3);
        // 300m at 0.1 kg/km, then x1.3.
        assert!((result.emission_kg(1) - 0.039).abs() < 1e-3, "got {}", result.emission_kg(1));
    }

    #[test]
    fn other_window_rows_skipped() {
        let path = write_csv(
            "mixed",
            &[
                ("morning", encode(&[(100.0, 250.0), (400.0, 250.0)])),
                ("evening", encode(&[(600.0, 250.0), (900.0, 250.0)])),
            ],
        );
        let result = compute(&path, Window::Morning, 0.1, 1.0);
        assert_eq!(result.trips_used, 1);
        assert_eq!(result.dropped_other_window, 1);
        assert!(result.emission_kg(1) > 0.0);
        assert_eq!(result.emission_kg(2), 0.0);
    }

    #[test]
    fn bad_rows_dropped_not_fatal() {
        let path = write_csv(
            "bad",
            &[
                ("morning", "!!not-a-polyline!!".to_string()),
                ("morning", encode(&[(100.0, 250.0), (100.0, 250.0)])),
                ("morning", encode(&[(100.0, 250.0), (400.0, 250.0)])),
            ],
        );
        let result = compute(&path, Window::Morning, 0.1, 1.0);
        assert_eq!(result.trips_used, 1);
        assert_eq!(result.dropped_undecodable + result.dropped_degenerate, 2);
    }

    #[test]
    fn windows_accumulate_independently() {
        // Morning travel only in cell 1, evening only in cell 2; each window's output reflects
        // only its own file.
        let morning = write_csv(
            "am",
            &[("morning", encode(&[(100.0, 250.0), (400.0, 250.0)]))],
        );
        let evening = write_csv(
            "pm",
            &[("evening", encode(&[(600.0, 250.0), (900.0, 250.0)]))],
        );
        let am = compute(&morning, Window::Morning, 0.1, 1.0);
        let pm = compute(&evening, Window::Evening, 0.1, 1.0);
        assert!(am.emission_kg(1) > 0.0);
        assert_eq!(am.emission_kg(2), 0.0);
        assert_eq!(pm.emission_kg(1), 0.0);
        assert!(pm.emission_kg(2) > 0.0);
    }

    #[test]
    fn trip_outside_grid_contributes_nothing() {
        let path = write_csv(
            "outside",
            &[("morning", encode(&[(5000.0, 250.0), (6000.0, 250.0)]))],
        );
        let result = compute(&path, Window::Morning, 0.1, 1.0);
        assert_eq!(result.trips_used, 1);
        assert_eq!(result.total_emissions_kg(), 0.0);
        assert_eq!(result.assigned_length, Distance::ZERO);
        assert!(result.total_length > Distance::ZERO);
    }
}
