use serde::Deserialize;

use crate::{Error, Result};

/// All the knobs and file paths for one run, deserialized from a JSON file. Component code never
/// hard-codes a path; everything routes through here.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// The EPSG code the run is nominally working in. Recorded for provenance; lengths and areas
    /// are computed in a local meters frame anchored on the study region (see `geom::GPSBounds`).
    pub target_crs: u32,
    /// Must be 500.
    pub grid_size_m: f64,
    /// (longitude, latitude) of the city center, for the distance-to-center feature.
    pub city_center: (f64, f64),
    /// kg CO2 per km of travel.
    pub emission_factor_kg_per_km: f64,
    /// Applied once to computed emissions, after the emission factor. The historical Xi'an runs
    /// used 1.3.
    #[serde(default = "default_multiplier")]
    pub emission_post_multiplier: f64,

    pub districts_path: String,
    /// A numbered fishnet layer. When absent, the fishnet is generated from the study region
    /// bounds instead.
    #[serde(default)]
    pub fishnet_path: Option<String>,
    pub poi_paths: Vec<String>,
    pub roads_path: String,
    pub bus_stops_path: String,
    pub metro_stops_path: String,
    pub population_raster_path: String,
    pub trajectory_paths: TrajectoryPaths,

    /// Rasters estimated to exceed this get streamed row-by-row instead of loaded whole.
    #[serde(default = "default_memory_budget_mb")]
    pub memory_budget_mb: usize,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TrajectoryPaths {
    pub morning: String,
    pub evening: String,
}

fn default_multiplier() -> f64 {
    1.0
}

fn default_memory_budget_mb() -> usize {
    512
}

fn default_output_dir() -> String {
    "output".to_string()
}

impl Config {
    pub fn load(path: &str) -> Result<Config> {
        let bytes = gridutil::slurp_file(path).map_err(|err| Error::input(err.to_string()))?;
        let config: Config = serde_json::from_slice(&bytes)
            .map_err(|err| Error::input(format!("{}: {}", path, err)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.grid_size_m != 500.0 {
            return Err(Error::input(format!(
                "grid_size_m must be 500, got {}",
                self.grid_size_m
            )));
        }
        if self.emission_factor_kg_per_km < 0.0 {
            return Err(Error::input(format!(
                "emission_factor_kg_per_km can't be negative: {}",
                self.emission_factor_kg_per_km
            )));
        }
        if self.emission_post_multiplier < 0.0 {
            return Err(Error::input(format!(
                "emission_post_multiplier can't be negative: {}",
                self.emission_post_multiplier
            )));
        }
        if self.poi_paths.is_empty() {
            return Err(Error::input("poi_paths is empty"));
        }
        let center = geom::LonLat::new(self.city_center.0, self.city_center.1);
        if !center.is_valid() {
            return Err(Error::crs(format!(
                "city_center {:?} isn't lon/lat",
                self.city_center
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_json() -> serde_json::Value {
        serde_json::json!({
            "target_crs": 32649,
            "grid_size_m": 500.0,
            "city_center": [108.94, 34.26],
            "emission_factor_kg_per_km": 0.2,
            "districts_path": "data/districts.geojson",
            "poi_paths": ["data/poi.csv"],
            "roads_path": "data/roads.geojson",
            "bus_stops_path": "data/bus.geojson",
            "metro_stops_path": "data/metro.geojson",
            "population_raster_path": "data/pop.asc",
            "trajectory_paths": {"morning": "data/am.csv", "evening": "data/pm.csv"}
        })
    }

    #[test]
    fn defaults() {
        let config: Config = serde_json::from_value(minimal_json()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.emission_post_multiplier, 1.0);
        assert_eq!(config.memory_budget_mb, 512);
        assert!(config.fishnet_path.is_none());
    }

    #[test]
    fn rejects_wrong_grid_size() {
        let mut raw = minimal_json();
        raw["grid_size_m"] = serde_json::json!(1000.0);
        let config: Config = serde_json::from_value(raw).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_projected_city_center() {
        let mut raw = minimal_json();
        raw["city_center"] = serde_json::json!([413_000.0, 3_790_000.0]);
        let config: Config = serde_json::from_value(raw).unwrap();
        match config.validate() {
            Err(Error::Crs(_)) => {}
            other => panic!("expected CRS error, got {:?}", other),
        }
    }
}
