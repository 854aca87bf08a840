// LabWired Harness - Armv8-M Device Bus Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

pub use harness_core::SimulationError;

/// A flat program image, loaded verbatim at RAM offset 0.
#[derive(Debug, Clone)]
pub struct ProgramImage {
    pub bytes: Vec<u8>,
}

impl ProgramImage {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn sha256(&self) -> String {
        let digest = Sha256::digest(&self.bytes);
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

/// Reads a raw binary image, refusing anything larger than `capacity`.
///
/// The size is checked against the file metadata before any data is read, and
/// a read that returns fewer bytes than the file claims is an error.
pub fn load_raw(path: &Path, capacity: usize) -> Result<ProgramImage> {
    let mut file =
        File::open(path).with_context(|| format!("Failed to open image file: {:?}", path))?;
    let expected = file
        .metadata()
        .with_context(|| format!("Failed to stat image file: {:?}", path))?
        .len();

    if expected > capacity as u64 {
        return Err(SimulationError::ImageTooLarge {
            len: expected as usize,
            capacity,
        })
        .with_context(|| format!("Image {:?} does not fit in RAM", path));
    }

    let mut bytes = Vec::with_capacity(expected as usize);
    file.read_to_end(&mut bytes)
        .with_context(|| format!("Failed to read image file: {:?}", path))?;
    debug!("Read {} of {} bytes from {:?}", bytes.len(), expected, path);

    if (bytes.len() as u64) < expected {
        anyhow::bail!(
            "Short read from {:?}: got {} of {} bytes",
            path,
            bytes.len(),
            expected
        );
    }
    if bytes.len() > capacity {
        return Err(SimulationError::ImageTooLarge {
            len: bytes.len(),
            capacity,
        })
        .with_context(|| format!("Image {:?} grew while being read", path));
    }

    let image = ProgramImage { bytes };
    info!("Image: {} bytes, sha256 {}", image.len(), image.sha256());
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn write_temp_image(prefix: &str, contents: &[u8]) -> PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push("harness-loader-tests");
        let _ = std::fs::create_dir_all(&dir);
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = dir.join(format!("{}-{}.bin", prefix, nonce));
        std::fs::write(&path, contents).expect("Failed to write temp image");
        path
    }

    #[test]
    fn test_load_exact_capacity() {
        let path = write_temp_image("exact", &[7; 64]);
        let image = load_raw(&path, 64).unwrap();
        assert_eq!(image.bytes, vec![7; 64]);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_load_too_large() {
        let path = write_temp_image("large", &[7; 65]);
        let err = load_raw(&path, 64).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SimulationError>(),
            Some(SimulationError::ImageTooLarge {
                len: 65,
                capacity: 64
            })
        ));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_raw(Path::new("definitely/not/here.bin"), 64).unwrap_err();
        assert!(err.to_string().contains("Failed to open image file"));
    }

    #[test]
    fn test_sha256() {
        let image = ProgramImage { bytes: Vec::new() };
        assert!(image.is_empty());
        assert_eq!(
            image.sha256(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
