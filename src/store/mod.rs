use crate::common::error::{DispatchError, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Content-addressed store for source documents and translated artifacts.
/// Layout: <root>/<first2>/<full_sha256>.json
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(ArtifactStore { root })
    }

    /// Stores bytes and returns their hash. Identical content is written once.
    pub fn put(&self, data: &[u8]) -> Result<String> {
        let hash = hex::encode(Sha256::digest(data));
        let path = self.path_for(&hash)?;

        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, data)?;
        }

        Ok(hash)
    }

    pub fn get(&self, hash: &str) -> Result<Vec<u8>> {
        let path = self.path_for(hash)?;
        if !path.exists() {
            return Err(DispatchError::Store(format!("{} not found", hash)));
        }
        Ok(fs::read(path)?)
    }

    pub fn put_json(&self, value: &serde_json::Value) -> Result<String> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.put(&bytes)
    }

    pub fn get_json(&self, hash: &str) -> Result<serde_json::Value> {
        let bytes = self.get(hash)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Where the artifact with this hash lives on disk.
    pub fn path_for(&self, hash: &str) -> Result<PathBuf> {
        if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DispatchError::Store(format!("invalid hash {:?}", hash)));
        }
        Ok(self.root.join(&hash[0..2]).join(format!("{}.json", hash)))
    }
}
