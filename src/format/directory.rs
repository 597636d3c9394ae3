//! Directory blocks.
//!
//! A directory is stored column-wise as unsigned LEB128 varints:
//!
//! ```text
//! count
//! tile_id deltas   (count values, each relative to the previous id)
//! run lengths      (count values)
//! lengths          (count values)
//! offsets          (count values, 0 = directly after the previous entry,
//!                   otherwise offset + 1)
//! ```

use crate::error::DecodeError;

/// One entry of a directory block.
///
/// `run_length > 0` marks tile data covering `[tile_id, tile_id + run_length)`
/// at `offset` relative to the tile data section. `run_length == 0` points at
/// a leaf directory at `offset` relative to the leaf directories section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub tile_id: u64,
    pub offset: u64,
    pub length: u32,
    pub run_length: u32,
}

impl DirectoryEntry {
    pub fn is_leaf_pointer(&self) -> bool {
        self.run_length == 0
    }
}

struct VarintReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> VarintReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn read(&mut self) -> Result<u64, DecodeError> {
        let start = self.pos;
        let mut value: u64 = 0;
        let mut shift = 0u32;
        loop {
            let byte = *self.bytes.get(self.pos).ok_or(DecodeError::Varint(start))?;
            self.pos += 1;
            if shift == 63 && byte > 1 {
                return Err(DecodeError::Varint(start));
            }
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
            if shift > 63 {
                return Err(DecodeError::Varint(start));
            }
        }
    }

    fn read_u32(&mut self, field: &str) -> Result<u32, DecodeError> {
        let value = self.read()?;
        u32::try_from(value)
            .map_err(|_| DecodeError::Directory(format!("{} {} does not fit in 32 bits", field, value)))
    }
}

/// Decode an uncompressed directory block.
pub fn decode_directory(bytes: &[u8]) -> Result<Vec<DirectoryEntry>, DecodeError> {
    let mut reader = VarintReader::new(bytes);
    let count = reader.read()?;

    // Every entry needs at least four bytes; anything larger is corrupt
    if count > (reader.remaining() / 4) as u64 {
        return Err(DecodeError::Directory(format!(
            "{} entries declared in {} bytes",
            count,
            bytes.len()
        )));
    }
    let count = count as usize;

    let mut entries = Vec::with_capacity(count);
    let mut last_id: u64 = 0;
    for _ in 0..count {
        let delta = reader.read()?;
        last_id = last_id
            .checked_add(delta)
            .ok_or_else(|| DecodeError::Directory("tile id overflow".to_string()))?;
        entries.push(DirectoryEntry {
            tile_id: last_id,
            offset: 0,
            length: 0,
            run_length: 0,
        });
    }

    for entry in entries.iter_mut() {
        entry.run_length = reader.read_u32("run length")?;
    }

    for entry in entries.iter_mut() {
        entry.length = reader.read_u32("length")?;
    }

    for i in 0..count {
        let value = reader.read()?;
        entries[i].offset = match (value, i) {
            (0, 0) => {
                return Err(DecodeError::Directory(
                    "first entry cannot follow a previous entry".to_string(),
                ))
            }
            (0, _) => {
                let prev = entries[i - 1];
                prev.offset
                    .checked_add(u64::from(prev.length))
                    .ok_or_else(|| DecodeError::Directory("offset overflow".to_string()))?
            }
            (v, _) => v - 1,
        };
    }

    Ok(entries)
}

/// Find the entry covering `tile_id` in a sorted directory.
///
/// The candidate is the entry with the greatest `tile_id <= target`. A tile
/// data entry covers its run; a leaf directory pointer covers everything up to
/// the next entry, since the leaf holds a contiguous id range.
pub fn find_entry(entries: &[DirectoryEntry], tile_id: u64) -> Option<&DirectoryEntry> {
    let idx = entries.partition_point(|e| e.tile_id <= tile_id);
    let entry = entries.get(idx.checked_sub(1)?)?;

    if entry.tile_id == tile_id || entry.is_leaf_pointer() {
        return Some(entry);
    }
    if tile_id - entry.tile_id < u64::from(entry.run_length) {
        return Some(entry);
    }
    None
}
