use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::io::{Cursor, Write};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub name: String,
    pub content: String,
}

impl ArchiveEntry {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("Archive entry name must not be empty")]
    EmptyName,

    #[error("Duplicate archive entry: {0}")]
    DuplicateEntry(String),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Packs named text blobs into one archive, returned base64 encoded.
#[async_trait]
pub trait ArchiveBuilder: Send + Sync {
    async fn build(&self, entries: &[ArchiveEntry]) -> Result<String, ArchiveError>;
}

/// Deflate-compressed zip.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipArchiveBuilder;

impl ZipArchiveBuilder {
    pub fn build_bytes(entries: &[ArchiveEntry]) -> Result<Vec<u8>, ArchiveError> {
        let mut seen = HashSet::new();
        for entry in entries {
            if entry.name.trim().is_empty() {
                return Err(ArchiveError::EmptyName);
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(ArchiveError::DuplicateEntry(entry.name.clone()));
            }
        }

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);

        for entry in entries {
            writer.start_file(entry.name.clone(), options)?;
            writer.write_all(entry.content.as_bytes())?;
        }

        let bytes = writer.finish()?.into_inner();
        debug!("Built archive: {} entries, {} bytes", entries.len(), bytes.len());
        Ok(bytes)
    }
}

#[async_trait]
impl ArchiveBuilder for ZipArchiveBuilder {
    async fn build(&self, entries: &[ArchiveEntry]) -> Result<String, ArchiveError> {
        let bytes = Self::build_bytes(entries)?;
        Ok(STANDARD.encode(bytes))
    }
}

/// Hex SHA-256 of the decoded archive bytes.
pub fn archive_digest(archive_base64: &str) -> Option<String> {
    let bytes = STANDARD.decode(archive_base64).ok()?;
    Some(hex::encode(Sha256::digest(&bytes)))
}
