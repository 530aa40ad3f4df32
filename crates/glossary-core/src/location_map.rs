//! Input identifier to remote location mapping, with line-oriented persistence.
//!
//! File format: one `identifier location` pair per line, in insertion order.

use crate::naming::fold_key;
use crate::{GlossaryError, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize)]
pub struct LocationMap {
    entries: Vec<LocationEntry>,
    #[serde(skip)]
    positions: HashMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationEntry {
    pub id: String,
    pub location: String,
}

impl LocationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `location` for `id`. Re-inserting an identifier replaces its location
    /// but keeps the original position.
    pub fn insert(&mut self, id: impl Into<String>, location: impl Into<String>) {
        let id = id.into();
        let location = location.into();
        match self.positions.get(&fold_key(&id)) {
            Some(&i) => self.entries[i].location = location,
            None => {
                self.positions.insert(fold_key(&id), self.entries.len());
                self.entries.push(LocationEntry { id, location });
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.positions
            .get(&fold_key(id))
            .map(|&i| self.entries[i].location.as_str())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(&fold_key(id))
    }

    pub fn remove(&mut self, id: &str) -> Option<String> {
        let i = self.positions.remove(&fold_key(id))?;
        let entry = self.entries.remove(i);
        for pos in self.positions.values_mut() {
            if *pos > i {
                *pos -= 1;
            }
        }
        Some(entry.location)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order; parents come before their children after a sync.
    pub fn entries(&self) -> &[LocationEntry] {
        &self.entries
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut map = Self::new();
        for (n, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut parts = line.splitn(2, char::is_whitespace);
            let id = parts.next().unwrap_or_default();
            let location = parts.next().map(str::trim).unwrap_or_default();
            if id.is_empty() || location.is_empty() {
                return Err(GlossaryError::LocationMap {
                    line: n + 1,
                    reason: format!("expected `identifier location`, found `{line}`"),
                });
            }
            map.insert(id, location);
        }
        Ok(map)
    }

    pub fn to_lines(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("{} {}\n", e.id, e.location))
            .collect()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Writes the map to `path`, replacing any existing file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.to_lines())?;
        Ok(())
    }
}
