// Checksum module: MD5 and SHA-256 of a file, computed in one pass.

use crate::error::{Result, UploadError};
use md5::Md5;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

const BLOCK_SIZE: usize = 8192;

/// Hex digests of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksums {
    pub md5: String,
    pub sha256: String,
    /// Bytes hashed.
    pub len: u64,
}

impl Checksums {
    /// Hash the file at `path` block by block.
    pub fn compute(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(UploadError::io(path))?;
        Self::from_reader(file).map_err(UploadError::io(path))
    }

    pub fn from_reader<R: Read>(mut reader: R) -> std::io::Result<Self> {
        let mut md5 = Md5::new();
        let mut sha256 = Sha256::new();
        let mut buf = [0u8; BLOCK_SIZE];
        let mut len = 0u64;
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            };
            md5.update(&buf[..n]);
            sha256.update(&buf[..n]);
            len += n as u64;
        }
        Ok(Self {
            md5: hex::encode(md5.finalize()),
            sha256: hex::encode(sha256.finalize()),
            len,
        })
    }
}
