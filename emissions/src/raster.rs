//! ESRI ASCII grid reader for the population raster. The format is a small header (column/row
//! counts, lower-left corner in lon/lat, cell size in degrees, optional NODATA marker) followed
//! by row-major values, northernmost row first. Rows are streamed one at a time; the full grid is
//! never materialized, which keeps even large rasters well under the configured memory budget.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader};

use geom::LonLat;

use crate::{Error, Result};

#[derive(Clone, Debug, PartialEq)]
pub struct RasterHeader {
    pub ncols: usize,
    pub nrows: usize,
    pub xllcorner: f64,
    pub yllcorner: f64,
    pub cellsize: f64,
    pub nodata: Option<f64>,
}

impl RasterHeader {
    /// Rough in-memory size of the full grid, used to report the memory-budget decision.
    pub fn estimated_mb(&self) -> f64 {
        (self.ncols * self.nrows * std::mem::size_of::<f64>()) as f64 / (1024.0 * 1024.0)
    }

    /// The lon/lat corners (southwest, northeast) of one pixel. `row` counts from the top of the
    /// grid, matching the order rows appear in the file.
    pub fn pixel_corners(&self, col: usize, row: usize) -> (LonLat, LonLat) {
        let top = self.yllcorner + (self.nrows as f64) * self.cellsize;
        let west = self.xllcorner + (col as f64) * self.cellsize;
        let north = top - (row as f64) * self.cellsize;
        (
            LonLat::new(west, north - self.cellsize),
            LonLat::new(west + self.cellsize, north),
        )
    }

    pub fn is_nodata(&self, value: f64) -> bool {
        match self.nodata {
            Some(nodata) => value == nodata,
            None => false,
        }
    }
}

/// Streams an ASCII grid row by row.
pub struct AsciiGridReader {
    path: String,
    header: RasterHeader,
    reader: BufReader<std::fs::File>,
    // Values already split off lines but not yet consumed. Some writers wrap rows across lines,
    // so rows are reassembled from a token stream.
    pending: VecDeque<f64>,
    rows_read: usize,
}

impl AsciiGridReader {
    pub fn open(path: &str) -> Result<AsciiGridReader> {
        let file = std::fs::File::open(path)
            .map_err(|err| Error::input(format!("{}: {}", path, err)))?;
        let mut reader = BufReader::new(file);
        let header = parse_header(path, &mut reader)?;
        Ok(AsciiGridReader {
            path: path.to_string(),
            header,
            reader,
            pending: VecDeque::new(),
            rows_read: 0,
        })
    }

    pub fn header(&self) -> &RasterHeader {
        &self.header
    }

    /// The next row of values, northernmost first. `None` after the last row.
    pub fn next_row(&mut self) -> Result<Option<(usize, Vec<f64>)>> {
        if self.rows_read == self.header.nrows {
            return Ok(None);
        }
        while self.pending.len() < self.header.ncols {
            let mut line = String::new();
            let n = self
                .reader
                .read_line(&mut line)
                .map_err(|err| Error::input(format!("{}: {}", self.path, err)))?;
            if n == 0 {
                return Err(Error::input(format!(
                    "{}: ran out of values at row {} of {}",
                    self.path,
                    self.rows_read + 1,
                    self.header.nrows
                )));
            }
            for token in line.split_whitespace() {
                let value: f64 = token.parse().map_err(|_| {
                    Error::input(format!("{}: bad raster value {:?}", self.path, token))
                })?;
                self.pending.push_back(value);
            }
        }
        let row: Vec<f64> = self.pending.drain(..self.header.ncols).collect();
        let idx = self.rows_read;
        self.rows_read += 1;
        Ok(Some((idx, row)))
    }
}

fn parse_header(path: &str, reader: &mut BufReader<std::fs::File>) -> Result<RasterHeader> {
    let mut ncols = None;
    let mut nrows = None;
    let mut xllcorner = None;
    let mut yllcorner = None;
    let mut cellsize = None;
    let mut nodata = None;

    // The header is 5 or 6 "key value" lines before the data starts.
    loop {
        if ncols.is_some()
            && nrows.is_some()
            && xllcorner.is_some()
            && yllcorner.is_some()
            && cellsize.is_some()
        {
            // Peek whether the next line is NODATA_value or already data.
            let buf = reader
                .fill_buf()
                .map_err(|err| Error::input(format!("{}: {}", path, err)))?;
            let looks_like_nodata = buf
                .iter()
                .take_while(|b| !b.is_ascii_whitespace())
                .map(|b| b.to_ascii_lowercase())
                .eq("nodata_value".bytes());
            if !looks_like_nodata {
                break;
            }
        }

        let mut line = String::new();
        let n = reader
            .read_line(&mut line)
            .map_err(|err| Error::input(format!("{}: {}", path, err)))?;
        if n == 0 {
            break;
        }
        let mut parts = line.split_whitespace();
        let key = match parts.next() {
            Some(key) => key.to_ascii_lowercase(),
            None => continue,
        };
        let value: f64 = parts
            .next()
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| Error::input(format!("{}: bad header line {:?}", path, line.trim())))?;

        match key.as_str() {
            "ncols" => ncols = Some(value as usize),
            "nrows" => nrows = Some(value as usize),
            "xllcorner" => xllcorner = Some(value),
            "yllcorner" => yllcorner = Some(value),
            "cellsize" => cellsize = Some(value),
            "nodata_value" => nodata = Some(value),
            _ => {
                return Err(Error::input(format!(
                    "{}: unexpected header key {:?}",
                    path, key
                )));
            }
        }
    }

    let header = RasterHeader {
        ncols: ncols.ok_or_else(|| Error::input(format!("{}: header missing ncols", path)))?,
        nrows: nrows.ok_or_else(|| Error::input(format!("{}: header missing nrows", path)))?,
        xllcorner: xllcorner
            .ok_or_else(|| Error::input(format!("{}: header missing xllcorner", path)))?,
        yllcorner: yllcorner
            .ok_or_else(|| Error::input(format!("{}: header missing yllcorner", path)))?,
        cellsize: cellsize
            .ok_or_else(|| Error::input(format!("{}: header missing cellsize", path)))?,
        nodata,
    };
    if header.ncols == 0 || header.nrows == 0 || header.cellsize <= 0.0 {
        return Err(Error::input(format!("{}: degenerate raster header", path)));
    }
    if !LonLat::new(header.xllcorner, header.yllcorner).is_valid() {
        return Err(Error::crs(format!(
            "{}: raster corner ({}, {}) isn't lon/lat",
            path, header.xllcorner, header.yllcorner
        )));
    }
    Ok(header)
}
