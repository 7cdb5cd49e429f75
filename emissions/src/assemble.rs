//! Joins every aggregate into one feature table per commute window and writes it as CSV. The
//! join is a left join against the fishnet, so a cell nothing matched still gets a row of zeros;
//! downstream model fitting expects every active cell present.

use serde::Serialize;

use crate::fishnet::Fishnet;
use crate::poi::{PoiAggregates, PoiBucket};
use crate::population::PopulationAggregates;
use crate::roads::RoadAggregates;
use crate::trajectories::WindowEmissions;
use crate::transit::TransitAggregates;
use crate::{Error, Result};

// Field order here is the CSV column order.
#[derive(Debug, PartialEq, Serialize)]
pub struct FeatureRow {
    pub grid_id: usize,
    pub leisure_poi: usize,
    pub office_poi: usize,
    pub public_service_poi: usize,
    pub transport_poi: usize,
    pub residential_poi: usize,
    pub leisure_poi_density: f64,
    pub office_poi_density: f64,
    pub public_service_poi_density: f64,
    pub transport_poi_density: f64,
    pub residential_poi_density: f64,
    pub mixed_use_entropy: f64,
    pub bus_stops: usize,
    pub metro_stops: usize,
    pub dist_to_nearest_bus_km: f64,
    pub dist_to_center_km: f64,
    pub road_density_km_per_km2: f64,
    pub population: f64,
    pub population_density_kpersons_per_km2: f64,
    pub carbon_emission_kg: f64,
}

/// One row per active cell, ascending grid_id.
pub fn assemble_features(
    fishnet: &Fishnet,
    pois: &PoiAggregates,
    transit: &TransitAggregates,
    roads: &RoadAggregates,
    population: &PopulationAggregates,
    emissions: &WindowEmissions,
) -> Vec<FeatureRow> {
    let area_km2 = fishnet.cell_area_km2();
    fishnet
        .cells()
        .iter()
        .map(|cell| {
            let id = cell.id;
            FeatureRow {
                grid_id: id,
                leisure_poi: pois.count(id, PoiBucket::Leisure),
                office_poi: pois.count(id, PoiBucket::Office),
                public_service_poi: pois.count(id, PoiBucket::PublicService),
                transport_poi: pois.count(id, PoiBucket::Transport),
                residential_poi: pois.count(id, PoiBucket::Residential),
                leisure_poi_density: pois.density_per_km2(id, PoiBucket::Leisure, area_km2),
                office_poi_density: pois.density_per_km2(id, PoiBucket::Office, area_km2),
                public_service_poi_density: pois
                    .density_per_km2(id, PoiBucket::PublicService, area_km2),
                transport_poi_density: pois.density_per_km2(id, PoiBucket::Transport, area_km2),
                residential_poi_density: pois
                    .density_per_km2(id, PoiBucket::Residential, area_km2),
                mixed_use_entropy: pois.mixed_use_entropy(id),
                bus_stops: transit.bus_count(id),
                metro_stops: transit.metro_count(id),
                dist_to_nearest_bus_km: transit.dist_to_nearest_bus_km(id),
                dist_to_center_km: transit.dist_to_center_km(id),
                road_density_km_per_km2: roads.density_km_per_km2(id, area_km2),
                population: population.population(id),
                population_density_kpersons_per_km2: population
                    .density_kpersons_per_km2(id, area_km2),
                carbon_emission_kg: emissions.emission_kg(id),
            }
        })
        .collect()
}

/// Writes the table with a UTF-8 BOM, so spreadsheet tools guess the encoding right. Parent
/// directories are created as needed.
pub fn write_features(rows: &[FeatureRow], path: &str) -> Result<()> {
    write_csv(rows, path)
}

#[derive(Serialize)]
struct EmissionRow {
    grid_id: usize,
    carbon_emission_kg: f64,
}

/// The slim emissions-only table some downstream consumers read instead of the full feature
/// table. Same left-join discipline: every active cell appears, zeros included.
pub fn write_emissions(fishnet: &Fishnet, emissions: &WindowEmissions, path: &str) -> Result<()> {
    let rows: Vec<EmissionRow> = fishnet
        .cells()
        .iter()
        .map(|cell| EmissionRow {
            grid_id: cell.id,
            carbon_emission_kg: emissions.emission_kg(cell.id),
        })
        .collect();
    write_csv(&rows, path)
}

fn write_csv<R: Serialize>(rows: &[R], path: &str) -> Result<()> {
    let mut bytes: Vec<u8> = b"\xEF\xBB\xBF".to_vec();
    {
        let mut writer = csv::Writer::from_writer(&mut bytes);
        for row in rows {
            writer
                .serialize(row)
                .map_err(|err| Error::input(format!("{}: {}", path, err)))?;
        }
        writer
            .flush()
            .map_err(|err| Error::input(format!("{}: {}", path, err)))?;
    }
    gridutil::write_file(path, &bytes).map_err(|err| Error::input(err.to_string()))?;
    log::info!("wrote {} rows to {}", rows.len(), path);
    Ok(())
}
