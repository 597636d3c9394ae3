//! Tile id linearization.
//!
//! Tiles are numbered zoom level by zoom level; within a level the position
//! along a Hilbert curve gives the offset. Level `z` starts at
//! `(4^z - 1) / 3`, the number of tiles in all shallower levels.

use crate::error::FormatError;

/// Deepest zoom level whose ids still fit in 64 bits.
pub const MAX_ZOOM: u8 = 31;

/// A tile coordinate in the XYZ scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u8, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Tile id of this coordinate.
    pub fn tile_id(&self) -> Result<u64, FormatError> {
        zxy_to_tile_id(self.z, self.x, self.y)
    }
}

/// Id of the first tile on zoom level `z`.
fn zoom_base(z: u8) -> u64 {
    ((1u64 << (2 * u32::from(z))) - 1) / 3
}

/// Rotate/flip a quadrant of side `n`.
///
/// `x` and `y` must be below `n`.
fn rotate(n: u64, x: &mut u64, y: &mut u64, rx: u64, ry: u64) {
    if ry == 0 {
        if rx != 0 {
            *x = n - 1 - *x;
            *y = n - 1 - *y;
        }
        std::mem::swap(x, y);
    }
}

/// Linearize `(z, x, y)` into a tile id.
pub fn zxy_to_tile_id(z: u8, x: u32, y: u32) -> Result<u64, FormatError> {
    if z > MAX_ZOOM {
        return Err(FormatError::ZoomTooLarge(z));
    }
    let n = 1u64 << z;
    let (mut tx, mut ty) = (u64::from(x), u64::from(y));
    if tx >= n || ty >= n {
        return Err(FormatError::TileOutOfBounds { z, x, y });
    }

    let mut d = 0u64;
    let mut s = n / 2;
    while s > 0 {
        let rx = u64::from((tx & s) > 0);
        let ry = u64::from((ty & s) > 0);
        d += s * s * ((3 * rx) ^ ry);
        // Flip against the full side so x and y stay within [0, n)
        rotate(n, &mut tx, &mut ty, rx, ry);
        s /= 2;
    }

    Ok(zoom_base(z) + d)
}

/// Recover `(z, x, y)` from a tile id.
pub fn tile_id_to_zxy(tile_id: u64) -> Result<TileCoord, FormatError> {
    let mut z = 0u8;
    loop {
        if z > MAX_ZOOM {
            return Err(FormatError::TileIdOutOfRange(tile_id));
        }
        let base = zoom_base(z);
        let tiles = 1u64 << (2 * u32::from(z));
        if tile_id - base < tiles {
            let n = 1u64 << z;
            let mut t = tile_id - base;
            let (mut x, mut y) = (0u64, 0u64);
            let mut s = 1u64;
            while s < n {
                let rx = 1 & (t / 2);
                let ry = 1 & (t ^ rx);
                rotate(s, &mut x, &mut y, rx, ry);
                x += s * rx;
                y += s * ry;
                t /= 4;
                s *= 2;
            }
            return Ok(TileCoord::new(z, x as u32, y as u32));
        }
        z += 1;
    }
}
