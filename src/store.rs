use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use tempfile::Builder;
use tracing::{debug, warn};

use crate::error::MetabError;
use crate::interchange::NetworkDocument;

/// One organism as persisted: its annotation, quality score and the
/// prebuilt network (without seed annotations).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenomeRecord {
    pub name: String,
    pub taxonomy: String,
    #[serde(default)]
    pub nsti: Option<f64>,
    pub genes: Vec<String>,
    pub network: NetworkDocument,
    pub created_at: String,
}

impl GenomeRecord {
    pub fn new(
        name: impl Into<String>,
        taxonomy: impl Into<String>,
        nsti: Option<f64>,
        genes: Vec<String>,
        network: NetworkDocument,
    ) -> Self {
        Self {
            name: name.into(),
            taxonomy: taxonomy.into(),
            nsti,
            genes,
            network,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Store {
    root: Utf8PathBuf,
}

impl Store {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn organisms_dir(&self) -> Utf8PathBuf {
        self.root.join("organisms")
    }

    pub fn organism_path(&self, name: &str) -> Result<Utf8PathBuf, MetabError> {
        validate_name(name)?;
        Ok(self.organisms_dir().join(format!("{name}.json")))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.organism_path(name)
            .map(|path| path.as_std_path().exists())
            .unwrap_or(false)
    }

    /// Writes through a temp file in the same directory so a reader never
    /// sees a partial record.
    pub fn save(&self, record: &GenomeRecord) -> Result<Utf8PathBuf, MetabError> {
        let path = self.organism_path(&record.name)?;
        let dir = self.organisms_dir();
        fs::create_dir_all(dir.as_std_path())
            .map_err(|err| MetabError::Filesystem(err.to_string()))?;
        let content = serde_json::to_vec_pretty(record)
            .map_err(|err| MetabError::Filesystem(err.to_string()))?;
        let mut temp = Builder::new()
            .prefix(".organism")
            .suffix(".tmp")
            .tempfile_in(dir.as_std_path())
            .map_err(|err| MetabError::Filesystem(err.to_string()))?;
        temp.write_all(&content)
            .map_err(|err| MetabError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| MetabError::Filesystem(err.to_string()))?;
        debug!(organism = %record.name, path = %path, "saved organism record");
        Ok(path)
    }

    pub fn load(&self, name: &str) -> Result<GenomeRecord, MetabError> {
        let path = self.organism_path(name)?;
        if !path.as_std_path().exists() {
            return Err(MetabError::OrganismNotFound(name.to_string()));
        }
        read_record(&path)
    }

    /// Every stored record, ordered by name. Unreadable files are skipped
    /// with a warning.
    pub fn list(&self) -> Result<Vec<GenomeRecord>, MetabError> {
        let dir = self.organisms_dir();
        if !dir.as_std_path().exists() {
            return Ok(Vec::new());
        }
        let mut records = Vec::new();
        let entries = fs::read_dir(dir.as_std_path())
            .map_err(|err| MetabError::Filesystem(err.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|err| MetabError::Filesystem(err.to_string()))?;
            let Ok(path) = Utf8PathBuf::from_path_buf(entry.path()) else {
                continue;
            };
            if path.extension() != Some("json") {
                continue;
            }
            match read_record(&path) {
                Ok(record) => records.push(record),
                Err(err) => warn!(path = %path, error = %err, "skipping unreadable organism record"),
            }
        }
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    pub fn remove(&self, name: &str) -> Result<bool, MetabError> {
        let path = self.organism_path(name)?;
        if !path.as_std_path().exists() {
            return Ok(false);
        }
        fs::remove_file(path.as_std_path())
            .map_err(|err| MetabError::Filesystem(err.to_string()))?;
        Ok(true)
    }
}

fn read_record(path: &Utf8Path) -> Result<GenomeRecord, MetabError> {
    let content = fs::read_to_string(path.as_std_path())
        .map_err(|err| MetabError::Filesystem(format!("read {path}: {err}")))?;
    serde_json::from_str(&content)
        .map_err(|err| MetabError::Filesystem(format!("parse {path}: {err}")))
}

fn validate_name(name: &str) -> Result<(), MetabError> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(MetabError::InvalidIdentifier {
            kind: "organism",
            value: name.to_string(),
        })
    }
}
