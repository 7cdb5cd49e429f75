//! Runs the whole grid-feature pipeline for one configured study area: load the districts, build
//! the fishnet, run every aggregator, then write one feature table per commute window.

use geom::{Distance, LonLat};
use gridutil::Timer;

use crate::assemble::{assemble_features, write_emissions, write_features};
use crate::config::Config;
use crate::fishnet::Fishnet;
use crate::layers;
use crate::poi::{aggregate_pois, PoiRecord};
use crate::population::aggregate_population;
use crate::roads::aggregate_roads;
use crate::trajectories::{compute_emissions, Window};
use crate::transit::aggregate_transit;
use crate::Result;

pub fn run(config: &Config, timer: &mut Timer) -> Result<()> {
    timer.start("load study region");
    let districts = layers::load_areas(&config.districts_path)?;
    let region = layers::StudyRegion::new(districts, &config.districts_path)?;
    // Lengths and areas use a local meters frame anchored on the region; the EPSG code is
    // provenance for downstream consumers.
    log::info!("declared CRS EPSG:{}", config.target_crs);
    timer.stop("load study region");

    timer.start("build fishnet");
    let cell_size = Distance::meters(config.grid_size_m);
    let fishnet = match &config.fishnet_path {
        Some(path) => {
            let features = layers::load_areas(path)?;
            Fishnet::load(features, &region, cell_size, path)?
        }
        None => Fishnet::generate(&region, cell_size),
    };
    timer.stop("build fishnet");

    timer.start("aggregate POIs");
    let mut poi_records: Vec<PoiRecord> = Vec::new();
    let mut poi_dropped_invalid = 0;
    for path in &config.poi_paths {
        let (records, dropped) = crate::poi::read_poi_csv(path)?;
        poi_records.extend(records);
        poi_dropped_invalid += dropped;
    }
    if poi_dropped_invalid > 0 {
        timer.warn(format!(
            "{} POI rows had unparseable coordinates",
            poi_dropped_invalid
        ));
    }
    let pois = aggregate_pois(poi_records, &region, &fishnet, timer);
    timer.stop("aggregate POIs");

    timer.start("aggregate transit");
    let bus_stops = layers::load_points(&config.bus_stops_path)?;
    let metro_stops = layers::load_points(&config.metro_stops_path)?;
    let city_center = LonLat::new(config.city_center.0, config.city_center.1);
    let transit = aggregate_transit(
        &bus_stops,
        &metro_stops,
        &region,
        &fishnet,
        city_center,
        timer,
    );
    timer.stop("aggregate transit");

    timer.start("aggregate roads");
    let road_lines = layers::load_lines(&config.roads_path)?;
    let roads = aggregate_roads(&road_lines, &region, &fishnet, timer);
    timer.stop("aggregate roads");

    timer.start("distribute population");
    let population = aggregate_population(
        &config.population_raster_path,
        &region,
        &fishnet,
        config.memory_budget_mb,
        timer,
    )?;
    timer.stop("distribute population");

    for window in Window::ALL {
        timer.start(format!("process {} window", window.label()));
        let path = match window {
            Window::Morning => &config.trajectory_paths.morning,
            Window::Evening => &config.trajectory_paths.evening,
        };
        let emissions = compute_emissions(
            path,
            window,
            &region,
            &fishnet,
            config.emission_factor_kg_per_km,
            config.emission_post_multiplier,
            timer,
        )?;
        let rows = assemble_features(&fishnet, &pois, &transit, &roads, &population, &emissions);
        write_features(
            &rows,
            &format!("{}/{}_features.csv", config.output_dir, window.label()),
        )?;
        write_emissions(
            &fishnet,
            &emissions,
            &format!("{}/{}_carbon_emission.csv", config.output_dir, window.label()),
        )?;
        timer.stop(format!("process {} window", window.label()));
    }

    log::info!(
        "done: {} cells, {:.0} persons, {:.1} km of road",
        fishnet.len(),
        population.total_population,
        roads.total_length.to_km()
    );
    Ok(())
}
