//! Read access to a finalized plot file: write-once, read-many, no locking
//! needed once `create_plot` has returned.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::crypto::{Identifier, KeyPair};
use crate::error::{Result, ShadowyError};
use crate::plot::header::{key_offset, PlotHeader, PRIVATE_KEY_BLOB_SIZE};

/// A handle onto a plot file: the parsed header plus the path to the
/// backing file. Private keys are read lazily, via a scoped seek+read.
#[derive(Debug)]
pub struct PlotFile {
    path: PathBuf,
    header: PlotHeader,
}

impl PlotFile {
    /// Opens `path`, parses the header, and memoises the entry table.
    /// Concurrent readers may each call this independently; the file is
    /// never mutated after creation.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let mut reader = BufReader::new(file);
        let header = PlotHeader::read_from(&mut reader)?;
        Ok(Self { path, header })
    }

    pub fn header(&self) -> &PlotHeader {
        &self.header
    }

    pub fn identifiers(&self) -> Vec<Identifier> {
        self.header.entries.iter().map(|e| e.identifier).collect()
    }

    /// Reads the `PRIVATE_KEY_BLOB_SIZE`-byte private key for entry `index`
    /// via a bounded seek+read, then reconstructs its `KeyPair`. The file
    /// handle is scoped to this call and always released.
    pub fn read_keypair(&self, index: usize) -> Result<KeyPair> {
        let entry = self.header.entries.get(index).ok_or_else(|| {
            ShadowyError::Input(format!("entry index {index} out of range"))
        })?;

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(entry.offset as u64))?;

        let mut buf = vec![0u8; PRIVATE_KEY_BLOB_SIZE as usize];
        file.read_exact(&mut buf)
            .map_err(|_| ShadowyError::Format("corrupt plot: truncated key read".to_string()))?;

        let keypair = KeyPair::from_private_key_bytes(&buf)?;
        if keypair.address != entry.address || keypair.identifier != entry.identifier {
            return Err(ShadowyError::Format(
                "corrupt plot: key does not match its index entry".to_string(),
            ));
        }
        Ok(keypair)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn count(&self) -> usize {
        self.header.count as usize
    }

    /// Sanity-checks that entry offsets follow the expected `header_size +
    /// i * PRIVATE_KEY_BLOB_SIZE` progression.
    pub fn validate_layout(&self) -> Result<()> {
        let expected_header_size = self.header.byte_size() as i64;
        for (i, entry) in self.header.entries.iter().enumerate() {
            let expected = key_offset(expected_header_size as usize, i);
            if entry.offset as i64 != expected {
                return Err(ShadowyError::Format(format!(
                    "corrupt plot: entry {i} offset {} != expected {expected}",
                    entry.offset
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plot::builder::create_plot;
    use tempfile::tempdir;

    #[test]
    fn k4_plot_has_expected_total_size() {
        let dir = tempdir().unwrap();
        let path = create_plot(dir.path(), 4).unwrap();

        let metadata = std::fs::metadata(&path).unwrap();
        assert_eq!(metadata.len(), 78_992);

        let plot = PlotFile::open(&path).unwrap();
        assert_eq!(plot.count(), 16);
        plot.validate_layout().unwrap();
    }

    #[test]
    fn reads_keypair_matching_its_index_entry() {
        let dir = tempdir().unwrap();
        let path = create_plot(dir.path(), 2).unwrap();
        let plot = PlotFile::open(&path).unwrap();

        for i in 0..plot.count() {
            let kp = plot.read_keypair(i).unwrap();
            assert_eq!(kp.identifier, plot.header().entries[i].identifier);
            assert_eq!(kp.address, plot.header().entries[i].address);
        }
    }

    #[test]
    fn rejects_out_of_range_index() {
        let dir = tempdir().unwrap();
        let path = create_plot(dir.path(), 1).unwrap();
        let plot = PlotFile::open(&path).unwrap();
        assert!(plot.read_keypair(999).is_err());
    }
}
