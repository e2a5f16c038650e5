//! Plot creation: generate `2^k` key pairs, lay out the file, write the
//! header followed by the private key blob table.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use rand::RngCore;

use crate::crypto::KeyPair;
use crate::error::Result;
use crate::plot::header::{count_for_k, header_size, PlotEntry, PlotHeader};

#[cfg(unix)]
fn set_permissions(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_permissions(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}

/// Builds the `umbra_v1_k{K}_{YYYYMMDD-HHMMSS}_{rand4hex}.dat` filename.
fn plot_filename(k: u32) -> String {
    let timestamp = Utc::now().format("%Y%m%d-%H%M%S");
    let mut rand_bytes = [0u8; 2];
    rand::thread_rng().fill_bytes(&mut rand_bytes);
    format!("umbra_v1_k{k}_{timestamp}_{}.dat", hex::encode(rand_bytes))
}

/// Generates `min(2^k, 2^20)` fresh key pairs, writes the header followed by
/// the private key blob table, and returns the written file's path.
pub fn create_plot<P: AsRef<Path>>(dir: P, k: u32) -> Result<PathBuf> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    set_permissions(dir, 0o755)?;

    let count = count_for_k(k);
    log::info!("building plot: k={k} count={count}");

    let mut keypairs = Vec::with_capacity(count as usize);
    for _ in 0..count {
        keypairs.push(KeyPair::generate()?);
    }

    let size = header_size(count as i32);
    let mut entries = Vec::with_capacity(count as usize);
    for (i, kp) in keypairs.iter().enumerate() {
        entries.push(PlotEntry {
            address: kp.address,
            identifier: kp.identifier,
            offset: (size + i * crate::plot::header::PRIVATE_KEY_BLOB_SIZE as usize) as i32,
        });
    }

    let header = PlotHeader::new(k as i32, entries);

    let path = dir.join(plot_filename(k));
    let file = File::create(&path)?;
    let mut writer = BufWriter::new(file);
    header.write_to(&mut writer)?;
    for kp in &keypairs {
        writer.write_all(&kp.private_key)?;
    }
    writer.flush()?;
    drop(writer);

    set_permissions(&path, 0o644)?;
    log::info!("wrote plot {}", path.display());

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plot::file::PlotFile;
    use tempfile::tempdir;

    #[test]
    fn create_plot_k0_has_single_entry() {
        let dir = tempdir().unwrap();
        let path = create_plot(dir.path(), 0).unwrap();
        let plot = PlotFile::open(&path).unwrap();
        assert_eq!(plot.count(), 1);
    }

    #[test]
    fn create_plot_clips_above_cap() {
        // k=21 would exceed 2^20 without clipping.
        let dir = tempdir().unwrap();
        // Use a smaller stand-in assertion on count_for_k directly; actually
        // building a 2^20-entry plot here would be too slow for a unit test.
        assert_eq!(
            crate::plot::header::count_for_k(21),
            crate::plot::header::MAX_COUNT
        );
        let _ = dir; // directory unused beyond demonstrating the API shape
    }

    #[test]
    fn filename_has_expected_prefix_and_extension() {
        let name = plot_filename(4);
        assert!(name.starts_with("umbra_v1_k4_"));
        assert!(name.ends_with(".dat"));
    }
}
