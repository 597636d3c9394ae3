//! Fixed-size archive header.
//!
//! The header occupies the first 127 bytes of every archive:
//!
//! ```text
//! offset  size  field
//! 0       7     magic "PMTiles"
//! 7       1     spec version (3)
//! 8       8     root directory offset
//! 16      8     root directory length
//! 24      8     JSON metadata offset
//! 32      8     JSON metadata length
//! 40      8     leaf directories offset
//! 48      8     leaf directories length
//! 56      8     tile data offset
//! 64      8     tile data length
//! 72      8     addressed tiles count
//! 80      8     tile entries count
//! 88      8     tile contents count
//! 96      1     clustered
//! 97      1     internal compression
//! 98      1     tile compression
//! 99      1     tile type
//! 100     1     min zoom
//! 101     1     max zoom
//! 102     16    min lon, min lat, max lon, max lat (i32, E7)
//! 118     1     center zoom
//! 119     8     center lon, center lat (i32, E7)
//! ```

use serde::Serialize;

use crate::error::FormatError;
use crate::io::{read_i32_le, read_u64_le, ByteRange};

/// Size of the fixed header block in bytes.
pub const HEADER_LENGTH: usize = 127;

/// Magic bytes at the start of every archive.
pub const MAGIC: &[u8; 7] = b"PMTiles";

/// The only supported spec version.
pub const SPEC_VERSION: u8 = 3;

// =============================================================================
// Compression
// =============================================================================

/// Compression applied to tiles or to the internal structures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    Unknown,
    None,
    Gzip,
    Brotli,
    Zstd,
}

impl Compression {
    pub fn from_u8(value: u8) -> Result<Self, FormatError> {
        match value {
            0 => Ok(Compression::Unknown),
            1 => Ok(Compression::None),
            2 => Ok(Compression::Gzip),
            3 => Ok(Compression::Brotli),
            4 => Ok(Compression::Zstd),
            other => Err(FormatError::UnknownCompression(other)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::Unknown => "unknown",
            Compression::None => "none",
            Compression::Gzip => "gzip",
            Compression::Brotli => "brotli",
            Compression::Zstd => "zstd",
        }
    }

    /// Only uncompressed and gzip data can be decoded.
    pub fn is_supported(&self) -> bool {
        matches!(self, Compression::None | Compression::Gzip)
    }
}

// =============================================================================
// Tile Type
// =============================================================================

/// Content type of the tiles stored in the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TileType {
    Unknown,
    Mvt,
    Png,
    Jpeg,
    Webp,
    Avif,
    Mlt,
}

impl TileType {
    /// Bytes outside the known range map to [`TileType::Unknown`]; such
    /// archives still serve tiles, as `application/octet-stream`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => TileType::Mvt,
            2 => TileType::Png,
            3 => TileType::Jpeg,
            4 => TileType::Webp,
            5 => TileType::Avif,
            6 => TileType::Mlt,
            _ => TileType::Unknown,
        }
    }

    /// Media type served with tiles of this type.
    pub fn media_type(&self) -> &'static str {
        match self {
            TileType::Unknown => "application/octet-stream",
            TileType::Mvt => "application/x-protobuf",
            TileType::Png => "image/png",
            TileType::Jpeg => "image/jpeg",
            TileType::Webp => "image/webp",
            TileType::Avif => "image/avif",
            TileType::Mlt => "application/vnd.maplibre-tile",
        }
    }

    /// Short format name used in TileJSON documents.
    pub fn format(&self) -> &'static str {
        match self {
            TileType::Unknown => "unknown",
            TileType::Mvt => "pbf",
            TileType::Png => "png",
            TileType::Jpeg => "jpg",
            TileType::Webp => "webp",
            TileType::Avif => "avif",
            TileType::Mlt => "mlt",
        }
    }
}

// =============================================================================
// Geographic fields
// =============================================================================

/// Geographic bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

/// Default view: position in degrees plus zoom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Center {
    pub lon: f64,
    pub lat: f64,
    pub zoom: u8,
}

fn e7(bytes: &[u8]) -> f64 {
    read_i32_le(bytes) as f64 / 1e7
}

// =============================================================================
// Header
// =============================================================================

/// Parsed archive header.
///
/// Immutable once parsed; a session keeps exactly one per archive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Header {
    pub root_directory_offset: u64,
    pub root_directory_length: u64,
    pub metadata_offset: u64,
    pub metadata_length: u64,
    pub leaf_directories_offset: u64,
    pub leaf_directories_length: u64,
    pub tile_data_offset: u64,
    pub tile_data_length: u64,
    pub addressed_tiles_count: u64,
    pub tile_entries_count: u64,
    pub tile_contents_count: u64,
    pub clustered: bool,
    pub internal_compression: Compression,
    pub tile_compression: Compression,
    pub tile_type: TileType,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub bounds: Bounds,
    pub center: Center,
}

impl Header {
    /// Parse the header from the first [`HEADER_LENGTH`] bytes of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self, FormatError> {
        if bytes.len() < HEADER_LENGTH {
            return Err(FormatError::HeaderTooShort {
                required: HEADER_LENGTH,
                actual: bytes.len(),
            });
        }

        if &bytes[0..7] != MAGIC {
            return Err(FormatError::InvalidMagic);
        }
        if bytes[7] != SPEC_VERSION {
            return Err(FormatError::UnsupportedVersion(bytes[7]));
        }

        Ok(Self {
            root_directory_offset: read_u64_le(&bytes[8..]),
            root_directory_length: read_u64_le(&bytes[16..]),
            metadata_offset: read_u64_le(&bytes[24..]),
            metadata_length: read_u64_le(&bytes[32..]),
            leaf_directories_offset: read_u64_le(&bytes[40..]),
            leaf_directories_length: read_u64_le(&bytes[48..]),
            tile_data_offset: read_u64_le(&bytes[56..]),
            tile_data_length: read_u64_le(&bytes[64..]),
            addressed_tiles_count: read_u64_le(&bytes[72..]),
            tile_entries_count: read_u64_le(&bytes[80..]),
            tile_contents_count: read_u64_le(&bytes[88..]),
            clustered: bytes[96] == 1,
            internal_compression: Compression::from_u8(bytes[97])?,
            tile_compression: Compression::from_u8(bytes[98])?,
            tile_type: TileType::from_u8(bytes[99]),
            min_zoom: bytes[100],
            max_zoom: bytes[101],
            bounds: Bounds {
                min_lon: e7(&bytes[102..]),
                min_lat: e7(&bytes[106..]),
                max_lon: e7(&bytes[110..]),
                max_lat: e7(&bytes[114..]),
            },
            center: Center {
                zoom: bytes[118],
                lon: e7(&bytes[119..]),
                lat: e7(&bytes[123..]),
            },
        })
    }

    /// Reject archives whose compression this crate cannot decode.
    pub fn check_compression(&self) -> Result<(), FormatError> {
        if !self.internal_compression.is_supported() {
            return Err(FormatError::UnsupportedCompression(
                self.internal_compression.as_str(),
            ));
        }
        if !self.tile_compression.is_supported() {
            return Err(FormatError::UnsupportedCompression(
                self.tile_compression.as_str(),
            ));
        }
        Ok(())
    }

    pub fn root_directory(&self) -> ByteRange {
        ByteRange::new(self.root_directory_offset, self.root_directory_length)
    }

    pub fn metadata(&self) -> ByteRange {
        ByteRange::new(self.metadata_offset, self.metadata_length)
    }

    /// Whether `z` lies within the archive's zoom range.
    pub fn contains_zoom(&self, z: u8) -> bool {
        z >= self.min_zoom && z <= self.max_zoom
    }
}
