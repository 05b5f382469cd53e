//! One JSON index artifact per document on the local filesystem

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

use super::vector_index::{IndexArtifact, VectorIndex};

const ARTIFACT_SUFFIX: &str = ".index.json";

/// Directory of persisted session indexes
#[derive(Debug, Clone)]
pub struct IndexStore {
    dir: PathBuf,
}

impl IndexStore {
    /// Open (creating if needed) an artifact directory
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Artifact path for a document
    pub fn path_for(&self, document_id: &str) -> Result<PathBuf> {
        validate_document_id(document_id)?;
        Ok(self.dir.join(format!("{}{}", document_id, ARTIFACT_SUFFIX)))
    }

    pub fn exists(&self, document_id: &str) -> Result<bool> {
        Ok(self.path_for(document_id)?.exists())
    }

    /// Write the index atomically: temp file in the same directory, then rename
    pub fn save(&self, document_id: &str, index: &VectorIndex) -> Result<PathBuf> {
        let path = self.path_for(document_id)?;
        let artifact = index.to_artifact(document_id);

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer(&mut writer, &artifact)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| Error::Io(e.error))?;

        tracing::info!(
            "Persisted index for {} ({} chunks) to {}",
            short_id(document_id),
            index.len(),
            path.display()
        );
        Ok(path)
    }

    /// Load a persisted index, `None` if the document has no artifact
    pub fn load(
        &self,
        document_id: &str,
        expected_model_id: &str,
        expected_dimensions: usize,
    ) -> Result<Option<VectorIndex>> {
        let path = self.path_for(document_id)?;
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let artifact: IndexArtifact = serde_json::from_reader(BufReader::new(file))?;
        if artifact.document_id != document_id {
            return Err(Error::InvalidInput(format!(
                "artifact {} belongs to document {}",
                path.display(),
                artifact.document_id
            )));
        }

        let index = VectorIndex::from_artifact(artifact, expected_model_id, expected_dimensions)?;
        tracing::info!(
            "Loaded persisted index for {} ({} chunks)",
            short_id(document_id),
            index.len()
        );
        Ok(Some(index))
    }

    /// Delete a document's artifact; returns whether one existed
    pub fn remove(&self, document_id: &str) -> Result<bool> {
        let path = self.path_for(document_id)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Document ids with a persisted artifact
    pub fn list(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let name = entry?.file_name();
            if let Some(id) = name.to_str().and_then(|n| n.strip_suffix(ARTIFACT_SUFFIX)) {
                ids.push(id.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// Document ids become file names, so only allow a conservative alphabet
fn validate_document_id(document_id: &str) -> Result<()> {
    let valid = !document_id.is_empty()
        && document_id.len() <= 128
        && document_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("invalid document id '{}'", document_id)))
    }
}

pub(crate) fn short_id(document_id: &str) -> &str {
    document_id.get(..12).unwrap_or(document_id)
}
