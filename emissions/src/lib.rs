//! Grid-level features and trip emissions for a city's central districts. Everything operates on
//! a 500m fishnet: POIs, transit stops, roads, a population raster, and commute trajectories all
//! get assigned to cells, and the per-window results land in one CSV per commute window.

pub mod assemble;
pub mod config;
mod error;
pub mod fishnet;
pub mod layers;
pub mod poi;
pub mod population;
pub mod pipeline;
pub mod raster;
pub mod roads;
pub mod trajectories;
pub mod transit;

pub use config::Config;
pub use error::{Error, Result};
