use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Result, WasteError};

/// Fixed table translating classifier output indices to category names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    names: Vec<String>,
}

impl LabelMap {
    /// Load a label table written as a JSON object with stringified integer
    /// keys, e.g. `{"0": "cardboard", "1": "glass"}`.
    ///
    /// The keys must cover exactly `0..n`. Any problem with the file is a
    /// configuration error since the table is only read at startup.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(WasteError::configuration("label map", path, "file not found"));
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|e| WasteError::configuration("label map", path, e))?;
        let table: BTreeMap<String, String> = serde_json::from_str(&raw)
            .map_err(|e| WasteError::configuration("label map", path, e))?;

        let mut indexed = BTreeMap::new();
        for (key, name) in table {
            let index: usize = key.trim().parse().map_err(|_| {
                WasteError::configuration(
                    "label map",
                    path,
                    format!("key {key:?} is not a non-negative integer"),
                )
            })?;
            if indexed.insert(index, name).is_some() {
                return Err(WasteError::configuration(
                    "label map",
                    path,
                    format!("index {index} appears more than once"),
                ));
            }
        }

        if indexed.is_empty() {
            return Err(WasteError::configuration("label map", path, "table is empty"));
        }

        // BTreeMap keys are sorted, so the table is complete iff each key
        // equals its position.
        if let Some((position, index)) = indexed
            .keys()
            .enumerate()
            .find(|(position, index)| position != *index)
        {
            return Err(WasteError::configuration(
                "label map",
                path,
                format!("index {position} is missing (next key is {index})"),
            ));
        }

        let names: Vec<String> = indexed.into_values().collect();
        tracing::info!(path = %path.display(), classes = names.len(), "label map loaded");

        Ok(Self { names })
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.names.iter().enumerate().map(|(i, name)| (i, name.as_str()))
    }
}
