//! File-backed save store.
//!
//! Layout inside the store directory:
//! ```text
//! world.meta.json           - metadata and schema version
//! saves/
//!   000001.save.cbor.zst    - CBOR+zstd compressed saves
//! integrity/
//!   manifest.json           - hash chain manifest
//! ```

use crate::snapshot::SaveState;
use blockfield_common::CodecError;
use blockfield_sim::{TickEngine, WorldState};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Current on-disk schema version.
const SAVE_SCHEMA_VERSION: u32 = 1;

/// Errors from file-backed persistence operations.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CBOR serialization error: {0}")]
    CborEncode(String),
    #[error("CBOR deserialization error: {0}")]
    CborDecode(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("integrity check failed: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },
    #[error("schema version mismatch: file has v{file_version}, expected v{expected_version}")]
    SchemaMismatch {
        file_version: u32,
        expected_version: u32,
    },
    #[error("no saves found")]
    NoSaves,
}

/// Metadata stored in world.meta.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldMeta {
    pub save_schema_version: u32,
    pub save_count: u32,
}

/// A single entry in the integrity manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub filename: String,
    pub sha256: String,
    pub prev_hash: Option<String>,
}

/// Integrity manifest tracking save file hashes in a chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrityManifest {
    pub entries: Vec<ManifestEntry>,
}

/// File-backed save store with schema versioning and integrity checking.
pub struct WorldStore {
    root: PathBuf,
    meta: WorldMeta,
    manifest: IntegrityManifest,
}

impl WorldStore {
    /// Open or create a save store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SaveError> {
        let root = path.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join("saves"))?;
        std::fs::create_dir_all(root.join("integrity"))?;

        let meta_path = root.join("world.meta.json");
        let manifest_path = root.join("integrity").join("manifest.json");

        let (meta, manifest) = if meta_path.exists() {
            let meta: WorldMeta = serde_json::from_reader(std::fs::File::open(&meta_path)?)?;
            if meta.save_schema_version != SAVE_SCHEMA_VERSION {
                return Err(SaveError::SchemaMismatch {
                    file_version: meta.save_schema_version,
                    expected_version: SAVE_SCHEMA_VERSION,
                });
            }
            let manifest: IntegrityManifest = if manifest_path.exists() {
                serde_json::from_reader(std::fs::File::open(&manifest_path)?)?
            } else {
                IntegrityManifest::default()
            };
            (meta, manifest)
        } else {
            let meta = WorldMeta {
                save_schema_version: SAVE_SCHEMA_VERSION,
                save_count: 0,
            };
            let manifest = IntegrityManifest::default();
            serde_json::to_writer_pretty(std::fs::File::create(&meta_path)?, &meta)?;
            serde_json::to_writer_pretty(std::fs::File::create(&manifest_path)?, &manifest)?;
            (meta, manifest)
        };

        Ok(Self {
            root,
            meta,
            manifest,
        })
    }

    /// Capture and write a new save.
    pub fn take_save(&mut self, world: &WorldState, engine: &TickEngine) -> Result<(), SaveError> {
        let save = SaveState::capture(world, engine);
        self.meta.save_count += 1;
        let filename = format!("{:06}.save.cbor.zst", self.meta.save_count);
        let path = self.root.join("saves").join(&filename);

        let cbor_bytes = cbor_serialize(&save)?;
        let compressed = zstd_compress(&cbor_bytes)?;

        let hash = sha256_hex(&compressed);
        let prev_hash = self.manifest.entries.last().map(|e| e.sha256.clone());

        std::fs::write(&path, &compressed)?;
        tracing::info!(
            tick = save.tick,
            bytes = compressed.len(),
            %filename,
            "save written"
        );

        self.manifest.entries.push(ManifestEntry {
            filename,
            sha256: hash,
            prev_hash,
        });

        self.save_meta()?;
        self.save_manifest()?;
        Ok(())
    }

    /// Load the latest save, restoring the world and a queue-primed engine.
    pub fn load_latest(&self) -> Result<(WorldState, TickEngine), SaveError> {
        if self.meta.save_count == 0 {
            return Err(SaveError::NoSaves);
        }
        let save = self.load_save(self.meta.save_count)?;
        if !save.verify() {
            return Err(SaveError::IntegrityMismatch {
                expected: "matching content hash".into(),
                actual: "content hash mismatch".into(),
            });
        }
        save.restore()
    }

    /// Verify the whole hash chain and every file against it.
    pub fn verify_integrity(&self) -> Result<(), SaveError> {
        let mut prev_hash: Option<String> = None;
        for entry in &self.manifest.entries {
            if entry.prev_hash != prev_hash {
                return Err(SaveError::IntegrityMismatch {
                    expected: prev_hash.unwrap_or_else(|| "None".into()),
                    actual: entry.prev_hash.clone().unwrap_or_else(|| "None".into()),
                });
            }

            let path = self.root.join("saves").join(&entry.filename);
            let data = std::fs::read(&path)?;
            let actual = sha256_hex(&data);
            if actual != entry.sha256 {
                return Err(SaveError::IntegrityMismatch {
                    expected: entry.sha256.clone(),
                    actual,
                });
            }
            prev_hash = Some(entry.sha256.clone());
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn meta(&self) -> &WorldMeta {
        &self.meta
    }

    fn load_save(&self, index: u32) -> Result<SaveState, SaveError> {
        let filename = format!("{index:06}.save.cbor.zst");
        let path = self.root.join("saves").join(&filename);
        let compressed = std::fs::read(&path)?;

        self.verify_file_hash(&filename, &compressed)?;

        let cbor_bytes = zstd_decompress(&compressed)?;
        cbor_deserialize(&cbor_bytes)
    }

    fn verify_file_hash(&self, filename: &str, data: &[u8]) -> Result<(), SaveError> {
        let actual = sha256_hex(data);
        for entry in &self.manifest.entries {
            if entry.filename == filename {
                if entry.sha256 != actual {
                    return Err(SaveError::IntegrityMismatch {
                        expected: entry.sha256.clone(),
                        actual,
                    });
                }
                return Ok(());
            }
        }
        // A file absent from the manifest is acceptable only before the
        // first manifest write.
        Ok(())
    }

    fn save_meta(&self) -> Result<(), SaveError> {
        let path = self.root.join("world.meta.json");
        serde_json::to_writer_pretty(std::fs::File::create(path)?, &self.meta)?;
        Ok(())
    }

    fn save_manifest(&self) -> Result<(), SaveError> {
        let path = self.root.join("integrity").join("manifest.json");
        serde_json::to_writer_pretty(std::fs::File::create(path)?, &self.manifest)?;
        Ok(())
    }
}

fn cbor_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, SaveError> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| SaveError::CborEncode(e.to_string()))?;
    Ok(buf)
}

fn cbor_deserialize<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, SaveError> {
    ciborium::from_reader(data).map_err(|e| SaveError::CborDecode(e.to_string()))
}

fn zstd_compress(data: &[u8]) -> Result<Vec<u8>, SaveError> {
    let mut encoder = zstd::Encoder::new(Vec::new(), 3)?;
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn zstd_decompress(data: &[u8]) -> Result<Vec<u8>, SaveError> {
    let mut decoder = zstd::Decoder::new(data)?;
    let mut buf = Vec::new();
    decoder.read_to_end(&mut buf)?;
    Ok(buf)
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
