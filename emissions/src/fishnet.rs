//! The canonical 500m fishnet over the study region, with O(1) spatial lookup keyed on
//! (column, row). Cells are axis-aligned squares on a lattice; every aggregator joins against
//! `cells()` with a left-outer join, so zero-match cells still show up with zeroed features.

use std::collections::{BTreeMap, HashMap};

use geom::{Bounds, Distance, Polygon, PolyLine, Pt2D};

use crate::layers::{AreaFeature, StudyRegion};
use crate::{Error, Result};

/// Side-length slop tolerated when validating a loaded fishnet, in meters.
const SIDE_TOLERANCE_M: f64 = 10.0;
/// A point this close to a cell edge counts as being on it, for the tie-breaking rule.
const EDGE_EPSILON_M: f64 = 1e-6;

#[derive(Clone, Debug)]
pub struct Cell {
    pub id: usize,
    pub rect: Bounds,
}

pub struct Fishnet {
    // Ascending id.
    cells: Vec<Cell>,
    origin_x: f64,
    origin_y: f64,
    size: f64,
    cols: usize,
    rows: usize,
    // (col, row) -> index into cells.
    lookup: HashMap<(usize, usize), usize>,
    id_to_idx: BTreeMap<usize, usize>,
}

impl Fishnet {
    /// Lays a fresh lattice over the study region's bounding box, keeping cells that intersect a
    /// district. Cells are numbered densely 1..N, row-major from the southwest corner.
    pub fn generate(region: &StudyRegion, cell_size: Distance) -> Fishnet {
        let size = cell_size.inner_meters();
        let bounds = region.bounds();
        let cols = (bounds.width() / size).ceil() as usize;
        let rows = (bounds.height() / size).ceil() as usize;

        let mut cells = Vec::new();
        let mut lookup = HashMap::new();
        let mut id_to_idx = BTreeMap::new();
        let mut next_id = 1;
        let mut skipped = 0;
        for row in 0..rows {
            for col in 0..cols {
                let rect = lattice_rect(bounds.min_x, bounds.min_y, size, col, row);
                if !region.intersects_rect(&rect) {
                    skipped += 1;
                    continue;
                }
                lookup.insert((col, row), cells.len());
                id_to_idx.insert(next_id, cells.len());
                cells.push(Cell { id: next_id, rect });
                next_id += 1;
            }
        }
        log::info!(
            "fishnet: generated {} cells ({} lattice positions outside the region)",
            cells.len(),
            skipped
        );

        Fishnet {
            cells,
            origin_x: bounds.min_x,
            origin_y: bounds.min_y,
            size,
            cols,
            rows,
            lookup,
            id_to_idx,
        }
    }

    /// Builds the index from a pre-numbered fishnet layer. Each feature must be an axis-aligned
    /// square of the expected size (within tolerance) carrying an integer `grid_id` property;
    /// squares are snapped onto a common lattice so neighboring cells share edges exactly. Cells
    /// not touching the study region are dropped, matching `generate`.
    pub fn load(
        features: Vec<AreaFeature>,
        region: &StudyRegion,
        cell_size: Distance,
        path: &str,
    ) -> Result<Fishnet> {
        let size = cell_size.inner_meters();
        let gps_bounds = region.gps_bounds();

        let mut raw: Vec<(usize, Bounds)> = Vec::new();
        for f in features {
            let id = f
                .properties
                .get("grid_id")
                .and_then(|v| v.as_u64())
                .ok_or_else(|| {
                    Error::schema(format!("{}: feature missing integer grid_id", path))
                })? as usize;
            if id == 0 {
                return Err(Error::schema(format!("{}: grid_id 0 isn't allowed", path)));
            }
            let pts: Vec<Pt2D> = f.exterior.iter().map(|pt| gps_bounds.convert(*pt)).collect();
            let rect = Bounds::from(&pts);
            if (rect.width() - size).abs() > SIDE_TOLERANCE_M
                || (rect.height() - size).abs() > SIDE_TOLERANCE_M
            {
                return Err(Error::input(format!(
                    "{}: cell {} is {:.1}m x {:.1}m, expected {}m squares",
                    path,
                    id,
                    rect.width(),
                    rect.height(),
                    size
                )));
            }
            raw.push((id, rect));
        }
        if raw.is_empty() {
            return Err(Error::input(format!("{}: empty fishnet", path)));
        }

        // Anchor the lattice at the southwestern-most cell.
        let origin_x = raw.iter().map(|(_, r)| r.min_x).fold(f64::MAX, f64::min);
        let origin_y = raw.iter().map(|(_, r)| r.min_y).fold(f64::MAX, f64::min);

        raw.sort_by_key(|(id, _)| *id);
        let mut cells = Vec::new();
        let mut lookup = HashMap::new();
        let mut id_to_idx = BTreeMap::new();
        let mut max_col = 0;
        let mut max_row = 0;
        let mut skipped = 0;
        for (id, rect) in raw {
            let col = ((rect.min_x - origin_x) / size).round();
            let row = ((rect.min_y - origin_y) / size).round();
            if (rect.min_x - (origin_x + col * size)).abs() > SIDE_TOLERANCE_M
                || (rect.min_y - (origin_y + row * size)).abs() > SIDE_TOLERANCE_M
            {
                return Err(Error::input(format!(
                    "{}: cell {} doesn't sit on the {}m lattice",
                    path, id, size
                )));
            }
            let (col, row) = (col as usize, row as usize);
            let snapped = lattice_rect(origin_x, origin_y, size, col, row);
            if !region.intersects_rect(&snapped) {
                skipped += 1;
                continue;
            }
            if lookup.insert((col, row), cells.len()).is_some() {
                return Err(Error::input(format!(
                    "{}: two cells occupy lattice position ({}, {})",
                    path, col, row
                )));
            }
            if id_to_idx.insert(id, cells.len()).is_some() {
                return Err(Error::input(format!("{}: duplicate grid_id {}", path, id)));
            }
            cells.push(Cell { id, rect: snapped });
            max_col = max_col.max(col);
            max_row = max_row.max(row);
        }
        log::info!(
            "fishnet: loaded {} cells from {} ({} outside the region dropped)",
            cells.len(),
            path,
            skipped
        );

        Ok(Fishnet {
            cells,
            origin_x,
            origin_y,
            size,
            cols: max_col + 1,
            rows: max_row + 1,
            lookup,
            id_to_idx,
        })
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&Cell> {
        self.id_to_idx.get(&id).map(|idx| &self.cells[*idx])
    }

    pub fn centroid(&self, id: usize) -> Option<Pt2D> {
        self.get(id).map(|cell| cell.rect.center())
    }

    /// Area of one cell in km². All cells are the same size by construction.
    pub fn cell_area_km2(&self) -> f64 {
        (self.size * self.size) / 1_000_000.0
    }

    /// Corner-to-corner span of the lattice's bounding box. An upper bound on any within-grid
    /// distance, which makes it the pessimal fill for distance features with no real answer.
    pub fn diagonal(&self) -> Distance {
        let width = (self.cols as f64) * self.size;
        let height = (self.rows as f64) * self.size;
        Distance::meters(width.hypot(height))
    }

    /// Which cell claims this point. A point on a shared edge goes to the cell with the smallest
    /// grid_id; a point outside every active cell gets `None`.
    pub fn point_to_grid(&self, pt: Pt2D) -> Option<usize> {
        let candidates_x = axis_candidates(pt.x() - self.origin_x, self.size, self.cols);
        let candidates_y = axis_candidates(pt.y() - self.origin_y, self.size, self.rows);

        let mut best: Option<usize> = None;
        for &col in &candidates_x {
            for &row in &candidates_y {
                if let Some(&idx) = self.lookup.get(&(col, row)) {
                    let id = self.cells[idx].id;
                    if best.map_or(true, |b| id < b) {
                        best = Some(id);
                    }
                }
            }
        }
        best
    }

    /// Clips a polyline against every cell it crosses, returning the length attributed to each.
    /// Each piece is attributed to exactly one cell (ties on shared edges go to the smaller
    /// grid_id), so summing the result reproduces the input length whenever the polyline stays
    /// within active cells. Tangent touches contribute nothing.
    pub fn clip_polyline(&self, pl: &PolyLine) -> BTreeMap<usize, Distance> {
        let mut lengths = BTreeMap::new();
        for line in pl.lines() {
            let b = Bounds::from(&line.points());
            for (col, row) in self.lattice_range(&b) {
                let idx = match self.lookup.get(&(col, row)) {
                    Some(idx) => *idx,
                    None => continue,
                };
                let cell = &self.cells[idx];
                if let Some(part) = line.clip_to_rect(&cell.rect) {
                    // A piece running along a shared edge gets clipped by both neighbors; only
                    // the owner of its midpoint counts it.
                    if self.point_to_grid(part.middle()) == Some(cell.id) {
                        *lengths.entry(cell.id).or_insert(Distance::ZERO) += part.length();
                    }
                }
            }
        }
        lengths
    }

    /// The pieces of a polyline lying inside one cell, possibly multi-part. Geometric clip only;
    /// no edge-ownership rule applied.
    pub fn clip_line_to_cell(&self, pl: &PolyLine, id: usize) -> Vec<PolyLine> {
        match self.get(id) {
            Some(cell) => pl.clip_to_rect(&cell.rect),
            None => Vec::new(),
        }
    }

    /// Overlap between an arbitrary polygon and one cell, in m².
    pub fn overlap_area_m2(&self, poly: &Polygon, id: usize) -> f64 {
        match self.get(id) {
            Some(cell) => poly.intersection_area_m2(&Polygon::from_rect(&cell.rect)),
            None => 0.0,
        }
    }

    /// True if the rectangle lies entirely within active cells. Pure containment test; no overlap
    /// areas involved, so it can serve as an independent reference for conservation checks.
    pub fn covers_rect(&self, rect: &Bounds) -> bool {
        if rect.min_x < self.origin_x - EDGE_EPSILON_M
            || rect.min_y < self.origin_y - EDGE_EPSILON_M
            || rect.max_x > self.origin_x + (self.cols as f64) * self.size + EDGE_EPSILON_M
            || rect.max_y > self.origin_y + (self.rows as f64) * self.size + EDGE_EPSILON_M
        {
            return false;
        }
        self.lattice_range(rect)
            .into_iter()
            .all(|pos| self.lookup.contains_key(&pos))
    }

    /// Fast path for axis-aligned rectangles (raster pixels): overlap area per intersected cell.
    pub fn rect_overlaps_m2(&self, rect: &Bounds) -> Vec<(usize, f64)> {
        let mut result = Vec::new();
        for (col, row) in self.lattice_range(rect) {
            if let Some(&idx) = self.lookup.get(&(col, row)) {
                let cell = &self.cells[idx];
                let area = cell.rect.intersection_area_m2(rect);
                if area > 0.0 {
                    result.push((cell.id, area));
                }
            }
        }
        result
    }

    // All lattice positions whose cells could intersect this rectangle, including neighbors that
    // only share an edge with it (the tie-breaking rule may hand them a boundary piece).
    fn lattice_range(&self, b: &Bounds) -> Vec<(usize, usize)> {
        let c0 = ((b.min_x - self.origin_x - EDGE_EPSILON_M) / self.size).floor() as i64;
        let c1 = ((b.max_x - self.origin_x + EDGE_EPSILON_M) / self.size).floor() as i64;
        let r0 = ((b.min_y - self.origin_y - EDGE_EPSILON_M) / self.size).floor() as i64;
        let r1 = ((b.max_y - self.origin_y + EDGE_EPSILON_M) / self.size).floor() as i64;

        let mut result = Vec::new();
        for row in r0.max(0)..=r1.min(self.rows as i64 - 1) {
            for col in c0.max(0)..=c1.min(self.cols as i64 - 1) {
                result.push((col as usize, row as usize));
            }
        }
        result
    }
}

fn lattice_rect(origin_x: f64, origin_y: f64, size: f64, col: usize, row: usize) -> Bounds {
    Bounds::rect(
        origin_x + (col as f64) * size,
        origin_y + (row as f64) * size,
        origin_x + ((col + 1) as f64) * size,
        origin_y + ((row + 1) as f64) * size,
    )
}

// The column (or row) indices whose cell could claim a coordinate along one axis. Usually one;
// two when the coordinate sits exactly on an interior edge.
fn axis_candidates(rel: f64, size: f64, limit: usize) -> Vec<usize> {
    if rel < -EDGE_EPSILON_M || limit == 0 {
        return Vec::new();
    }
    let rel = rel.max(0.0);
    // May equal `limit` when the coordinate sits on the outer boundary.
    let idx = (rel / size).floor() as usize;
    let mut result = Vec::new();
    let on_lower_edge = (rel - (idx as f64) * size).abs() <= EDGE_EPSILON_M;
    if on_lower_edge && idx >= 1 {
        result.push(idx - 1);
    }
    if idx < limit {
        result.push(idx);
    }
    result
}
