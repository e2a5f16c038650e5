//! Little-endian plot header: a fixed 16-byte prefix followed by a sorted
//! entry table, each entry `address[20] || identifier[16] || offset[i32]`.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::crypto::{Address, Identifier, ADDRESS_SIZE, IDENTIFIER_SIZE};
use crate::error::{Result, ShadowyError};

/// Only this version is accepted by readers.
pub const PLOT_VERSION: i64 = 1;
/// A single private key blob, bytes.
pub const PRIVATE_KEY_BLOB_SIZE: i64 = 4_896;
/// Fixed prefix before the entry table: version(i64) + k(i32) + count(i32).
const HEADER_PREFIX_SIZE: usize = 16;
/// Bytes per entry: address(20) + identifier(16) + offset(i32).
const ENTRY_SIZE: usize = ADDRESS_SIZE + IDENTIFIER_SIZE + 4;
/// Plots above this `k` clip to 2^20 entries.
pub const MAX_K: u32 = 20;
pub const MAX_COUNT: u32 = 1 << MAX_K;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlotEntry {
    pub address: Address,
    pub identifier: Identifier,
    pub offset: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlotHeader {
    pub version: i64,
    pub k: i32,
    pub count: i32,
    pub entries: Vec<PlotEntry>,
}

/// `count = 2^k` for `k <= MAX_K`, clipped to `MAX_COUNT` above that.
pub fn count_for_k(k: u32) -> u32 {
    if k <= MAX_K {
        1u32 << k
    } else {
        MAX_COUNT
    }
}

/// Absolute byte size of the header (prefix + entry table) for `count` entries.
pub fn header_size(count: i32) -> usize {
    HEADER_PREFIX_SIZE + count as usize * ENTRY_SIZE
}

/// Absolute byte offset of the private key for entry `index`, given the
/// header size it follows.
pub fn key_offset(header_size: usize, index: usize) -> i64 {
    header_size as i64 + index as i64 * PRIVATE_KEY_BLOB_SIZE
}

impl PlotHeader {
    pub fn new(k: i32, entries: Vec<PlotEntry>) -> Self {
        Self {
            version: PLOT_VERSION,
            k,
            count: entries.len() as i32,
            entries,
        }
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_i64::<LittleEndian>(self.version)?;
        w.write_i32::<LittleEndian>(self.k)?;
        w.write_i32::<LittleEndian>(self.count)?;
        for entry in &self.entries {
            w.write_all(&entry.address)?;
            w.write_all(&entry.identifier)?;
            w.write_i32::<LittleEndian>(entry.offset)?;
        }
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let version = r
            .read_i64::<LittleEndian>()
            .map_err(|e| ShadowyError::Format(format!("plot header: {e}")))?;
        if version != PLOT_VERSION {
            return Err(ShadowyError::Format(format!(
                "unsupported plot version {version}"
            )));
        }
        let k = r
            .read_i32::<LittleEndian>()
            .map_err(|e| ShadowyError::Format(format!("plot header: {e}")))?;
        let count = r
            .read_i32::<LittleEndian>()
            .map_err(|e| ShadowyError::Format(format!("plot header: {e}")))?;
        if count < 0 {
            return Err(ShadowyError::Format("negative entry count".to_string()));
        }

        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let mut address = [0u8; ADDRESS_SIZE];
            r.read_exact(&mut address)
                .map_err(|_| ShadowyError::Format("truncated plot header".to_string()))?;
            let mut identifier = [0u8; IDENTIFIER_SIZE];
            r.read_exact(&mut identifier)
                .map_err(|_| ShadowyError::Format("truncated plot header".to_string()))?;
            let offset = r
                .read_i32::<LittleEndian>()
                .map_err(|_| ShadowyError::Format("truncated plot header".to_string()))?;
            entries.push(PlotEntry {
                address,
                identifier,
                offset,
            });
        }

        Ok(Self {
            version,
            k,
            count,
            entries,
        })
    }

    pub fn byte_size(&self) -> usize {
        header_size(self.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_entry(seed: u8) -> PlotEntry {
        PlotEntry {
            address: [seed; ADDRESS_SIZE],
            identifier: [seed; IDENTIFIER_SIZE],
            offset: seed as i32,
        }
    }

    #[test]
    fn k4_header_size_matches_spec_scenario() {
        let entries: Vec<_> = (0..16u8).map(dummy_entry).collect();
        let header = PlotHeader::new(4, entries);
        assert_eq!(header.byte_size(), 656);
    }

    #[test]
    fn header_round_trips_through_bytes() {
        let entries: Vec<_> = (0..4u8).map(dummy_entry).collect();
        let header = PlotHeader::new(2, entries);

        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), header.byte_size());

        let mut cursor = std::io::Cursor::new(buf);
        let parsed = PlotHeader::read_from(&mut cursor).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn count_for_k_clips_above_cap() {
        assert_eq!(count_for_k(0), 1);
        assert_eq!(count_for_k(20), 1 << 20);
        assert_eq!(count_for_k(21), 1 << 20);
        assert_eq!(count_for_k(63), 1 << 20);
    }

    #[test]
    fn rejects_wrong_version() {
        let mut buf = Vec::new();
        buf.write_i64::<LittleEndian>(2).unwrap();
        buf.write_i32::<LittleEndian>(0).unwrap();
        buf.write_i32::<LittleEndian>(0).unwrap();
        let mut cursor = std::io::Cursor::new(buf);
        assert!(PlotHeader::read_from(&mut cursor).is_err());
    }
}
