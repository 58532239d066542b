//! Precomputed list of hub compounds removed by the very-common filter.
//!
//! The list is derived offline from a reference network (every ortholog in
//! the knowledge base, no filters): any compound whose degree reaches the
//! threshold is listed. The file holds one compound id per line.

use std::collections::BTreeSet;
use std::fs;

use camino::Utf8Path;
use tracing::{info, warn};

use crate::error::MetabError;
use crate::network::MetabolicNetwork;

pub const DEFAULT_EXCLUSION_FILE: &str = "cos_to_remove.txt";
pub const DEFAULT_HUB_THRESHOLD: usize = 30;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionList {
    compounds: BTreeSet<String>,
}

impl ExclusionList {
    pub fn parse(text: &str) -> Self {
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect()
    }

    pub fn load(path: &Utf8Path) -> Result<Self, MetabError> {
        let text = fs::read_to_string(path.as_std_path())
            .map_err(|err| MetabError::Filesystem(format!("read {path}: {err}")))?;
        Ok(Self::parse(&text))
    }

    /// A missing or unreadable list is not fatal: the filter is skipped.
    pub fn load_optional(path: &Utf8Path) -> Option<Self> {
        match Self::load(path) {
            Ok(list) => Some(list),
            Err(err) => {
                warn!(path = %path, error = %err, "exclusion list not available; very-common filter will be skipped");
                None
            }
        }
    }

    /// Every compound of `reference` with degree at or above `threshold`.
    pub fn from_reference(reference: &MetabolicNetwork, threshold: usize) -> Self {
        let list: Self = reference
            .degrees()
            .into_iter()
            .filter(|(_, degree)| *degree >= threshold)
            .map(|(id, _)| id)
            .collect();
        info!(
            compounds = list.len(),
            threshold, "computed hub exclusion list"
        );
        list
    }

    pub fn to_text(&self) -> String {
        let mut text = String::new();
        for compound in &self.compounds {
            text.push_str(compound);
            text.push('\n');
        }
        text
    }

    pub fn write(&self, path: &Utf8Path) -> Result<(), MetabError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_str().is_empty()) {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| MetabError::Filesystem(err.to_string()))?;
        }
        let tmp_path = path.with_extension("tmp");
        fs::write(tmp_path.as_std_path(), self.to_text())
            .map_err(|err| MetabError::Filesystem(err.to_string()))?;
        fs::rename(tmp_path.as_std_path(), path.as_std_path())
            .map_err(|err| MetabError::Filesystem(err.to_string()))?;
        Ok(())
    }

    pub fn contains(&self, compound: &str) -> bool {
        self.compounds.contains(compound)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.compounds.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.compounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compounds.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ExclusionList {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self {
            compounds: iter.into_iter().map(Into::into).collect(),
        }
    }
}
