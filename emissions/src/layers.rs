//! Vector layer loading. Everything comes in as GeoJSON in WGS84 lon/lat; loaded features carry
//! `LonLat` coordinates, and downstream code converts to world-space meters through the study
//! region's `GPSBounds`. The two coordinate systems are separate types, so there's no silent
//! mixing to guard against at runtime; the loaders' job is to reject files whose coordinates
//! aren't plausibly lon/lat in the first place.

use geojson::{GeoJson, Value};
use geom::{Bounds, GPSBounds, LonLat, Polygon, Pt2D};
use serde_json::Map;

use crate::{Error, Result};

type Properties = Map<String, serde_json::Value>;

pub struct PointFeature {
    pub gps: LonLat,
    pub properties: Properties,
}

pub struct LineFeature {
    pub pts: Vec<LonLat>,
    pub properties: Properties,
}

pub struct AreaFeature {
    pub exterior: Vec<LonLat>,
    pub holes: Vec<Vec<LonLat>>,
    pub properties: Properties,
}

/// Loads a GeoJSON layer of points. MultiPoints are flattened.
pub fn load_points(path: &str) -> Result<Vec<PointFeature>> {
    let mut result = Vec::new();
    for (geometry, properties) in read_features(path)? {
        match geometry {
            Value::Point(pos) => result.push(PointFeature {
                gps: position(path, &pos)?,
                properties,
            }),
            Value::MultiPoint(list) => {
                for pos in list {
                    result.push(PointFeature {
                        gps: position(path, &pos)?,
                        properties: properties.clone(),
                    });
                }
            }
            other => {
                return Err(Error::input(format!(
                    "{}: expected points, found {}",
                    path,
                    describe(&other)
                )));
            }
        }
    }
    Ok(result)
}

/// Loads a GeoJSON layer of linestrings. MultiLineStrings are flattened.
pub fn load_lines(path: &str) -> Result<Vec<LineFeature>> {
    let mut result = Vec::new();
    for (geometry, properties) in read_features(path)? {
        match geometry {
            Value::LineString(list) => result.push(LineFeature {
                pts: positions(path, &list)?,
                properties,
            }),
            Value::MultiLineString(lists) => {
                for list in lists {
                    result.push(LineFeature {
                        pts: positions(path, &list)?,
                        properties: properties.clone(),
                    });
                }
            }
            other => {
                return Err(Error::input(format!(
                    "{}: expected linestrings, found {}",
                    path,
                    describe(&other)
                )));
            }
        }
    }
    Ok(result)
}

/// Loads a GeoJSON layer of polygons. MultiPolygons are flattened into one feature per polygon.
pub fn load_areas(path: &str) -> Result<Vec<AreaFeature>> {
    let mut result = Vec::new();
    for (geometry, properties) in read_features(path)? {
        match geometry {
            Value::Polygon(rings) => result.push(area_feature(path, rings, properties)?),
            Value::MultiPolygon(polys) => {
                for rings in polys {
                    result.push(area_feature(path, rings, properties.clone())?);
                }
            }
            other => {
                return Err(Error::input(format!(
                    "{}: expected polygons, found {}",
                    path,
                    describe(&other)
                )));
            }
        }
    }
    Ok(result)
}

fn area_feature(
    path: &str,
    rings: Vec<Vec<Vec<f64>>>,
    properties: Properties,
) -> Result<AreaFeature> {
    if rings.is_empty() {
        return Err(Error::input(format!("{}: polygon with no rings", path)));
    }
    let mut rings = rings.into_iter();
    let exterior = positions(path, &rings.next().unwrap())?;
    let mut holes = Vec::new();
    for ring in rings {
        holes.push(positions(path, &ring)?);
    }
    Ok(AreaFeature {
        exterior,
        holes,
        properties,
    })
}

fn read_features(path: &str) -> Result<Vec<(Value, Properties)>> {
    let bytes = gridutil::slurp_file(path).map_err(|err| Error::input(err.to_string()))?;
    let raw = String::from_utf8(bytes)
        .map_err(|_| Error::input(format!("{} isn't UTF-8", path)))?;
    let geojson = raw
        .parse::<GeoJson>()
        .map_err(|err| Error::input(format!("{}: {}", path, err)))?;

    let collection = match geojson {
        GeoJson::FeatureCollection(collection) => collection,
        _ => {
            return Err(Error::input(format!(
                "{}: expected a FeatureCollection",
                path
            )));
        }
    };

    let mut result = Vec::new();
    for feature in collection.features {
        let geometry = feature
            .geometry
            .ok_or_else(|| Error::input(format!("{}: feature missing geometry", path)))?;
        result.push((geometry.value, feature.properties.unwrap_or_default()));
    }
    Ok(result)
}

fn position(path: &str, pos: &[f64]) -> Result<LonLat> {
    if pos.len() < 2 {
        return Err(Error::input(format!("{}: malformed coordinate", path)));
    }
    let pt = LonLat::new(pos[0], pos[1]);
    if !pt.is_valid() {
        return Err(Error::crs(format!(
            "{}: coordinate ({}, {}) isn't lon/lat; reproject this layer to WGS84",
            path, pos[0], pos[1]
        )));
    }
    Ok(pt)
}

fn positions(path: &str, list: &[Vec<f64>]) -> Result<Vec<LonLat>> {
    list.iter().map(|pos| position(path, pos)).collect()
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Point(_) => "a Point",
        Value::MultiPoint(_) => "a MultiPoint",
        Value::LineString(_) => "a LineString",
        Value::MultiLineString(_) => "a MultiLineString",
        Value::Polygon(_) => "a Polygon",
        Value::MultiPolygon(_) => "a MultiPolygon",
        Value::GeometryCollection(_) => "a GeometryCollection",
    }
}

/// The six-district study area: the union of district polygons, and the GPS bounds that anchor
/// the world-space frame for the whole run.
pub struct StudyRegion {
    districts: Vec<Polygon>,
    gps_bounds: GPSBounds,
    bounds: Bounds,
}

impl StudyRegion {
    pub fn new(features: Vec<AreaFeature>, path: &str) -> Result<StudyRegion> {
        if features.is_empty() {
            return Err(Error::input(format!("{}: no district polygons", path)));
        }

        let gps_bounds = GPSBounds::from(
            features
                .iter()
                .flat_map(|f| f.exterior.iter().copied()),
        );

        let mut districts = Vec::new();
        for f in &features {
            let exterior: Vec<Pt2D> = f.exterior.iter().map(|pt| gps_bounds.convert(*pt)).collect();
            let holes: Vec<Vec<Pt2D>> = f
                .holes
                .iter()
                .map(|ring| ring.iter().map(|pt| gps_bounds.convert(*pt)).collect())
                .collect();
            districts.push(
                Polygon::new(exterior, holes)
                    .map_err(|err| Error::input(format!("{}: {}", path, err)))?,
            );
        }

        let mut bounds = Bounds::new();
        for d in &districts {
            bounds.union(&d.get_bounds());
        }

        log::info!(
            "study region: {} districts, {:.1} x {:.1} km",
            districts.len(),
            bounds.width() / 1000.0,
            bounds.height() / 1000.0
        );

        Ok(StudyRegion {
            districts,
            gps_bounds,
            bounds,
        })
    }

    pub fn gps_bounds(&self) -> &GPSBounds {
        &self.gps_bounds
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn districts(&self) -> &Vec<Polygon> {
        &self.districts
    }

    /// True if the point is inside any district.
    pub fn contains_pt(&self, pt: Pt2D) -> bool {
        self.districts.iter().any(|d| d.contains_pt(pt))
    }

    /// True if the rectangle overlaps any district.
    pub fn intersects_rect(&self, rect: &Bounds) -> bool {
        let rect_poly = Polygon::from_rect(rect);
        self.districts
            .iter()
            .any(|d| d.get_bounds().overlaps(rect) && d.intersects(&rect_poly))
    }
}
