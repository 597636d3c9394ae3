//! Archive wire format.
//!
//! Pure decoding routines for the fixed binary layout: the 127-byte header,
//! varint-encoded directory blocks, Hilbert tile ids and gzip payloads. No I/O
//! happens here; the archive session feeds these functions with fetched bytes.

mod compression;
mod directory;
mod header;
mod tile_id;

pub use compression::decompress;
pub use directory::{decode_directory, find_entry, DirectoryEntry};
pub use header::{Bounds, Center, Compression, Header, TileType, HEADER_LENGTH, MAGIC, SPEC_VERSION};
pub use tile_id::{tile_id_to_zxy, zxy_to_tile_id, TileCoord, MAX_ZOOM};
