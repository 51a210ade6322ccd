//! suggest-geo
//!
//! Geohash cell arithmetic for the geo context dimension: encode a point
//! into a fixed-length base-32 cell, decode a cell back into its bounding
//! box, and walk to adjacent cells. Neighbor lookup wraps across the ±180°
//! meridian; cells in the top or bottom latitude row have no neighbor
//! across the pole and those directions yield `None`.

/// The geohash base-32 alphabet, in bit order.
pub const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Longest supported cell string (5 bits per character).
pub const MAX_PRECISION: usize = 12;

/// The rectangle of the earth's surface covered by one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

// Adjacency lookup strings, indexed by [direction][cell-length parity].
// For the last character of a cell, its position in the NEIGHBOR string is
// the alphabet index of the adjacent cell's last character; BORDER lists
// the characters whose neighbor lies outside the shared parent cell.
const NEIGHBOR: [[&str; 2]; 4] = [
    ["p0r21436x8zb9dcf5h7kjnmqesgutwvy", "bc01fg45238967deuvhjyznpkmstqrwx"], // north
    ["14365h7k9dcfesgujnmqp0r2twvyx8zb", "238967debc01fg45kmstqrwxuvhjyznp"], // south
    ["bc01fg45238967deuvhjyznpkmstqrwx", "p0r21436x8zb9dcf5h7kjnmqesgutwvy"], // east
    ["238967debc01fg45kmstqrwxuvhjyznp", "14365h7k9dcfesgujnmqp0r2twvyx8zb"], // west
];
const BORDER: [[&str; 2]; 4] = [
    ["prxz", "bcfguvyz"], // north
    ["028b", "0145hjnp"], // south
    ["bcfguvyz", "prxz"], // east
    ["0145hjnp", "028b"], // west
];

/// True when `cell` is a non-empty string over the geohash alphabet.
pub fn is_valid_cell(cell: &str) -> bool {
    !cell.is_empty() && cell.bytes().all(|b| BASE32.contains(&b))
}

/// Encode a point into the cell of exactly `len` characters containing it.
///
/// Bits alternate longitude/latitude starting with longitude, five bits
/// per output character. Callers are expected to validate coordinate
/// ranges beforehand; out-of-range values saturate into the edge cells.
pub fn encode(lat: f64, lon: f64, len: usize) -> String {
    let len = len.clamp(1, MAX_PRECISION);
    let mut lat_range = (-90.0_f64, 90.0_f64);
    let mut lon_range = (-180.0_f64, 180.0_f64);
    let mut cell = String::with_capacity(len);
    let mut even = true;
    let mut bits = 0u8;
    let mut index = 0usize;
    while cell.len() < len {
        let range = if even { &mut lon_range } else { &mut lat_range };
        let value = if even { lon } else { lat };
        let mid = (range.0 + range.1) / 2.0;
        if value >= mid {
            index = (index << 1) | 1;
            range.0 = mid;
        } else {
            index <<= 1;
            range.1 = mid;
        }
        even = !even;
        bits += 1;
        if bits == 5 {
            cell.push(BASE32[index] as char);
            bits = 0;
            index = 0;
        }
    }
    cell
}

/// Decode a cell into its bounding box; `None` for invalid cells.
pub fn decode(cell: &str) -> Option<BoundingBox> {
    if !is_valid_cell(cell) || cell.len() > MAX_PRECISION {
        return None;
    }
    let mut lat_range = (-90.0_f64, 90.0_f64);
    let mut lon_range = (-180.0_f64, 180.0_f64);
    let mut even = true;
    for b in cell.bytes() {
        let index = BASE32.iter().position(|&c| c == b)?;
        for shift in (0..5).rev() {
            let bit = (index >> shift) & 1;
            let range = if even { &mut lon_range } else { &mut lat_range };
            let mid = (range.0 + range.1) / 2.0;
            if bit == 1 {
                range.0 = mid;
            } else {
                range.1 = mid;
            }
            even = !even;
        }
    }
    Some(BoundingBox {
        min_lat: lat_range.0,
        max_lat: lat_range.1,
        min_lon: lon_range.0,
        max_lon: lon_range.1,
    })
}

/// The same-length cell adjacent to `cell` in `direction`.
///
/// Returns `None` for invalid cells and for steps that would cross a pole.
pub fn neighbor(cell: &str, direction: Direction) -> Option<String> {
    if !is_valid_cell(cell) || cell.len() > MAX_PRECISION {
        return None;
    }
    adjacent(cell, direction)
}

fn adjacent(cell: &str, direction: Direction) -> Option<String> {
    let last = *cell.as_bytes().last()?;
    let parity = cell.len() % 2;
    let d = direction as usize;
    let parent = &cell[..cell.len() - 1];

    let base = if BORDER[d][parity].as_bytes().contains(&last) {
        if parent.is_empty() {
            // Top-level row: longitude wraps via the lookup string, but
            // there is nothing beyond the poles.
            match direction {
                Direction::North | Direction::South => return None,
                Direction::East | Direction::West => String::new(),
            }
        } else {
            adjacent(parent, direction)?
        }
    } else {
        parent.to_string()
    };

    let index = NEIGHBOR[d][parity].bytes().position(|b| b == last)?;
    let mut out = base;
    out.push(BASE32[index] as char);
    Some(out)
}

/// All surrounding cells at the same length, up to 8.
///
/// Rows beyond a pole are absent, so polar cells return fewer than 8.
pub fn neighbors(cell: &str) -> Vec<String> {
    let mut out = Vec::with_capacity(8);
    if let Some(n) = neighbor(cell, Direction::North) {
        if let Some(ne) = neighbor(&n, Direction::East) {
            out.push(ne);
        }
        if let Some(nw) = neighbor(&n, Direction::West) {
            out.push(nw);
        }
        out.push(n);
    }
    if let Some(e) = neighbor(cell, Direction::East) {
        out.push(e);
    }
    if let Some(w) = neighbor(cell, Direction::West) {
        out.push(w);
    }
    if let Some(s) = neighbor(cell, Direction::South) {
        if let Some(se) = neighbor(&s, Direction::East) {
            out.push(se);
        }
        if let Some(sw) = neighbor(&s, Direction::West) {
            out.push(sw);
        }
        out.push(s);
    }
    out
}
