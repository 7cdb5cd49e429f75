//! Area-weighted distribution of the population raster onto grid cells. Each pixel's value is
//! split across the cells it overlaps, proportional to overlap area. Pixels are axis-aligned
//! lon/lat rectangles and the world frame is affine in lon/lat, so a pixel stays a rectangle
//! after conversion and the overlap is just rectangle intersection.

use std::collections::BTreeMap;

use geom::Bounds;
use gridutil::{prettyprint_usize, Timer};

use crate::fishnet::Fishnet;
use crate::layers::StudyRegion;
use crate::raster::AsciiGridReader;
use crate::{Error, Result};

/// Largest relative mismatch tolerated between the population distributed to cells and the raw
/// values of the pixels sitting entirely inside the grid.
const CONSERVATION_TOLERANCE: f64 = 0.01;

pub struct PopulationAggregates {
    // grid_id -> persons.
    population: BTreeMap<usize, f64>,
    // grid_id -> fraction of the cell covered by raster pixels. QA only, not a model feature.
    coverage: BTreeMap<usize, f64>,
    pub total_population: f64,
    pub pixels_used: usize,
    pub pixels_nodata: usize,
}

impl PopulationAggregates {
    pub fn population(&self, grid_id: usize) -> f64 {
        self.population.get(&grid_id).copied().unwrap_or(0.0)
    }

    /// Thousands of persons per km² of cell area.
    pub fn density_kpersons_per_km2(&self, grid_id: usize, cell_area_km2: f64) -> f64 {
        self.population(grid_id) / 1000.0 / cell_area_km2
    }

    /// Fraction of the cell covered by raster pixels. 0 for cells the raster never touches.
    pub fn coverage_ratio(&self, grid_id: usize) -> f64 {
        self.coverage.get(&grid_id).copied().unwrap_or(0.0)
    }
}

/// Streams the raster row by row and distributes pixel values onto overlapping cells. A pixel
/// straddling the grid boundary only contributes its inside share. Aborts if any pixel's overlap
/// exceeds its own area, or if pixels lying entirely inside the grid don't land on cells to
/// within 1% of their raw values.
pub fn aggregate_population(
    path: &str,
    region: &StudyRegion,
    fishnet: &Fishnet,
    memory_budget_mb: usize,
    timer: &mut Timer,
) -> Result<PopulationAggregates> {
    let mut reader = AsciiGridReader::open(path)?;
    let header = reader.header().clone();
    log::info!(
        "population raster: {} x {} pixels, ~{:.0} MB if loaded whole (budget {} MB); streaming rows",
        header.ncols,
        header.nrows,
        header.estimated_mb(),
        memory_budget_mb
    );

    let gps_bounds = region.gps_bounds();
    let cell_area_m2 = fishnet.cell_area_km2() * 1_000_000.0;
    let mut population: BTreeMap<usize, f64> = BTreeMap::new();
    let mut coverage: BTreeMap<usize, f64> = BTreeMap::new();
    let mut distributed = 0.0;
    // Pixels fully inside active cells must land on cells in full; their raw values are the
    // conservation reference, untouched by any of the overlap-area arithmetic.
    let mut interior_value = 0.0;
    let mut interior_distributed = 0.0;
    let mut pixels_used = 0;
    let mut pixels_nodata = 0;
    let mut pixels_negative = 0;

    timer.start_iter("distribute population rows", header.nrows);
    while let Some((row, values)) = reader.next_row()? {
        timer.next();
        for (col, value) in values.into_iter().enumerate() {
            if header.is_nodata(value) {
                pixels_nodata += 1;
                continue;
            }
            if value < 0.0 {
                pixels_negative += 1;
                continue;
            }
            let (sw, ne) = header.pixel_corners(col, row);
            let sw = gps_bounds.convert(sw);
            let ne = gps_bounds.convert(ne);
            let pixel = Bounds::rect(sw.x(), sw.y(), ne.x(), ne.y());
            let pixel_area = pixel.area_m2();

            let overlaps = fishnet.rect_overlaps_m2(&pixel);
            if overlaps.is_empty() {
                continue;
            }
            let mut covered = 0.0;
            let mut landed = 0.0;
            for (id, area) in overlaps {
                *population.entry(id).or_insert(0.0) += value * area / pixel_area;
                *coverage.entry(id).or_insert(0.0) += area / cell_area_m2;
                landed += value * area / pixel_area;
                covered += area;
            }
            distributed += landed;
            if covered > pixel_area * (1.0 + 1e-9) {
                return Err(Error::invariant(format!(
                    "pixel ({}, {}) overlaps cells by {:.1} m² but is only {:.1} m²",
                    col, row, covered, pixel_area
                )));
            }
            if fishnet.covers_rect(&pixel) {
                interior_value += value;
                interior_distributed += landed;
            }
            pixels_used += 1;
        }
    }

    // Pixels never overlap each other, so the per-cell covered fractions can't legitimately
    // exceed 1.
    for (id, ratio) in &coverage {
        if *ratio > 1.0 + 1e-9 {
            return Err(Error::invariant(format!(
                "cell {} has coverage ratio {:.6}",
                id, ratio
            )));
        }
    }

    if pixels_negative > 0 {
        timer.warn(format!(
            "{} negative non-NODATA raster values skipped",
            prettyprint_usize(pixels_negative)
        ));
    }

    if interior_value > 0.0 {
        let drift = (interior_distributed - interior_value).abs() / interior_value;
        if drift > CONSERVATION_TOLERANCE {
            return Err(Error::invariant(format!(
                "interior pixels carry {:.1} persons but {:.1} landed on cells ({:.2}% drift)",
                interior_value,
                interior_distributed,
                drift * 100.0
            )));
        }
    }
    log::info!(
        "population: {:.0} persons over {} cells ({} pixels used, {} NODATA)",
        distributed,
        prettyprint_usize(population.len()),
        prettyprint_usize(pixels_used),
        prettyprint_usize(pixels_nodata)
    );

    Ok(PopulationAggregates {
        population,
        coverage,
        total_population: distributed,
        pixels_used,
        pixels_nodata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::tests::square_region;
    use geom::Distance;
    use std::io::Write;

    fn write_tmp(name: &str, contents: &str) -> String {
        let path = std::env::temp_dir().join(format!("pop_test_{}_{}.asc", std::process::id(), name));
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path.to_string_lossy().to_string()
    }

    fn aggregate(path: &str) -> PopulationAggregates {
        let region = square_region();
        let net = crate::fishnet::Fishnet::generate(&region, Distance::meters(500.0));
        let mut timer = Timer::throwaway();
        let result = aggregate_population(path, &region, &net, 512, &mut timer).unwrap();
        std::fs::remove_file(path).unwrap();
        result
    }

    #[test]
    fn pixel_inside_one_cell() {
        // A single small pixel entirely inside the southwest cell.
        let path = write_tmp(
            "inside",
            "ncols 1\nnrows 1\nxllcorner 108.9005\nyllcorner 34.2005\ncellsize 0.002\n100\n",
        );
        let agg = aggregate(&path);
        assert!((agg.population(1) - 100.0).abs() < 1e-6, "got {}", agg.population(1));
        assert_eq!(agg.pixels_used, 1);
        // 100 persons in a 0.25 km² cell is 0.4 kpersons/km².
        assert!((agg.density_kpersons_per_km2(1, 0.25) - 0.4).abs() < 1e-9);
        // A small pixel covers a small share of the cell; untouched cells have no coverage.
        let coverage = agg.coverage_ratio(1);
        assert!(coverage > 0.1 && coverage < 0.25, "got {}", coverage);
        assert_eq!(agg.coverage_ratio(2), 0.0);
        assert_eq!(agg.population(2), 0.0);
    }

    #[test]
    fn full_raster_coverage() {
        // One giant pixel blanketing the whole grid: every cell is fully covered and splits the
        // value in proportion to its share of the pixel.
        let path = write_tmp(
            "blanket",
            "ncols 1\nnrows 1\nxllcorner 108.88\nyllcorner 34.19\ncellsize 0.05\n1000\n",
        );
        let agg = aggregate(&path);
        assert!((agg.coverage_ratio(1) - 1.0).abs() < 1e-9, "got {}", agg.coverage_ratio(1));
        assert!(agg.population(1) > 0.0);
    }

    #[test]
    fn boundary_pixel_contributes_inside_share() {
        // The pixel's western half hangs off the grid, so only half its 100 persons land.
        let path = write_tmp(
            "boundary",
            "ncols 1\nnrows 1\nxllcorner 108.898\nyllcorner 34.2005\ncellsize 0.004\n100\n",
        );
        let agg = aggregate(&path);
        assert!(
            (agg.total_population - 50.0).abs() < 0.5,
            "got {}",
            agg.total_population
        );
        let coverage = agg.coverage_ratio(1);
        assert!(coverage > 0.0 && coverage < 1.0, "got {}", coverage);
    }

    #[test]
    fn interior_pixels_fully_conserved() {
        // Four pixels well inside the grid: every person they carry must land on some cell.
        let path = write_tmp(
            "interior",
            "ncols 2\nnrows 2\nxllcorner 108.9005\nyllcorner 34.2005\ncellsize 0.001\n\
             10 20\n30 40\n",
        );
        let agg = aggregate(&path);
        assert_eq!(agg.pixels_used, 4);
        assert!(
            (agg.total_population - 100.0).abs() < 1e-6,
            "got {}",
            agg.total_population
        );
    }

    #[test]
    fn nodata_skipped() {
        let path = write_tmp(
            "nodata",
            "ncols 2\nnrows 1\nxllcorner 108.9005\nyllcorner 34.2005\ncellsize 0.001\n\
             NODATA_value -9999\n-9999 40\n",
        );
        let agg = aggregate(&path);
        assert_eq!(agg.pixels_nodata, 1);
        assert!((agg.total_population - 40.0).abs() < 1e-6);
    }

    #[test]
    fn pixel_split_across_cells() {
        // A pixel straddling the vertical edge at x=500m splits between cells 1 and 2 in
        // proportion to area, and nothing is lost.
        let path = write_tmp(
            "split",
            "ncols 1\nnrows 1\nxllcorner 108.9040\nyllcorner 34.2005\ncellsize 0.003\n90\n",
        );
        let agg = aggregate(&path);
        let total = agg.population(1) + agg.population(2);
        assert!((total - 90.0).abs() < 1e-6, "got {}", total);
        assert!(agg.population(1) > 0.0);
        assert!(agg.population(2) > 0.0);
    }
}
