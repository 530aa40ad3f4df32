//! Parent and name lookups over one snapshot of the remote glossary.

use crate::RemoteTerm;
use std::collections::HashMap;

/// Lookup tables over a snapshot of the remote hierarchy.
///
/// Children keep the order in which the service listed them. The root level lives
/// under the `None` key; an empty `parentId` also counts as root.
#[derive(Debug, Clone, Default)]
pub struct RemoteIndex {
    names: HashMap<String, String>,
    children: HashMap<Option<String>, Vec<String>>,
}

impl RemoteIndex {
    pub fn build(remote_terms: &[RemoteTerm]) -> Self {
        let mut index = Self::default();
        for term in remote_terms {
            index.names.insert(term.id.clone(), term.name.clone());
            let parent = term.parent_id.clone().filter(|p| !p.is_empty());
            index
                .children
                .entry(parent)
                .or_default()
                .push(term.id.clone());
        }
        index
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn name(&self, id: &str) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    /// Child identifiers of `parent`, or of the root level when `parent` is `None`.
    pub fn children(&self, parent: Option<&str>) -> &[String] {
        self.children
            .get(&parent.map(str::to_string))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
