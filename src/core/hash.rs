use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("IO error while hashing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Hex-encoded SHA-256 digest of a file's full byte stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

const CHUNK_SIZE: usize = 8192;

/// Computes content fingerprints for exact duplicate detection.
pub struct HashService;

impl HashService {
    pub fn new() -> Self {
        Self
    }

    /// Fingerprint an arbitrary byte stream, reading it in fixed-size chunks.
    pub fn fingerprint_reader<R: Read>(&self, mut reader: R) -> std::io::Result<Fingerprint> {
        let mut hasher = Sha256::new();
        let mut buffer = [0; CHUNK_SIZE];

        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(Fingerprint(format!("{:x}", hasher.finalize())))
    }

    pub fn fingerprint(&self, file_path: &Path) -> Result<Fingerprint, HashError> {
        let io_err = |source| HashError::Io {
            path: file_path.display().to_string(),
            source,
        };
        let file = File::open(file_path).map_err(io_err)?;
        self.fingerprint_reader(BufReader::new(file)).map_err(io_err)
    }

    /// Fingerprint many files in parallel. The output keeps the input order.
    pub fn fingerprint_batch(
        &self,
        file_paths: &[PathBuf],
    ) -> Vec<(PathBuf, Result<Fingerprint, HashError>)> {
        file_paths
            .par_iter()
            .map(|path| (path.clone(), self.fingerprint(path)))
            .collect()
    }
}

impl Default for HashService {
    fn default() -> Self {
        Self::new()
    }
}
