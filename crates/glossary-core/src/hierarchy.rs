//! Hierarchy validation and parent-first ordering of input records.

use crate::naming::fold_key;
use crate::{GlossaryError, Result, TermRecord};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Input records in breadth-first order, parents always before their children.
#[derive(Debug, Clone)]
pub struct OrderedHierarchy {
    terms: Vec<TermRecord>,
    depths: Vec<usize>,
    positions: HashMap<String, usize>,
}

/// Orders `records` breadth-first from the roots.
///
/// Siblings keep their input order. Fails when identifiers collide (ignoring case) or
/// when any record cannot be reached from a root, which covers both dangling parent
/// references and cycles.
pub fn order(records: Vec<TermRecord>) -> Result<OrderedHierarchy> {
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(records.len());
    for (i, record) in records.iter().enumerate() {
        if positions.insert(fold_key(&record.id), i).is_some() {
            return Err(GlossaryError::DuplicateIdentifier(record.id.clone()));
        }
    }

    let mut children: HashMap<String, Vec<usize>> = HashMap::new();
    let mut queue: VecDeque<(usize, usize)> = VecDeque::new();
    for (i, record) in records.iter().enumerate() {
        match &record.parent_id {
            None => queue.push_back((i, 0)),
            Some(parent) => children.entry(fold_key(parent)).or_default().push(i),
        }
    }

    let mut visited = vec![false; records.len()];
    let mut arranged: Vec<(usize, usize)> = Vec::with_capacity(records.len());
    while let Some((i, depth)) = queue.pop_front() {
        if visited[i] {
            continue;
        }
        visited[i] = true;
        arranged.push((i, depth));

        if let Some(kids) = children.get(&fold_key(&records[i].id)) {
            for &kid in kids {
                if !visited[kid] {
                    queue.push_back((kid, depth + 1));
                }
            }
        }
    }

    if arranged.len() < records.len() {
        let unresolved: Vec<String> = records
            .iter()
            .zip(&visited)
            .filter(|(_, seen)| !**seen)
            .map(|(r, _)| r.id.clone())
            .collect();
        return Err(GlossaryError::InvalidHierarchy { unresolved });
    }

    let mut slots: Vec<Option<TermRecord>> = records.into_iter().map(Some).collect();
    let mut terms = Vec::with_capacity(arranged.len());
    let mut depths = Vec::with_capacity(arranged.len());
    positions.clear();
    for (i, depth) in arranged {
        if let Some(record) = slots[i].take() {
            positions.insert(fold_key(&record.id), terms.len());
            terms.push(record);
            depths.push(depth);
        }
    }

    debug!(
        terms = terms.len(),
        levels = depths.last().map(|d| d + 1).unwrap_or(0),
        "Ordered glossary hierarchy"
    );

    Ok(OrderedHierarchy {
        terms,
        depths,
        positions,
    })
}

impl OrderedHierarchy {
    pub fn terms(&self) -> &[TermRecord] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Looks a record up by input identifier, ignoring case.
    pub fn get(&self, id: &str) -> Option<&TermRecord> {
        self.positions.get(&fold_key(id)).map(|&i| &self.terms[i])
    }

    /// Distance from the root for the term at `position` in [`Self::terms`].
    pub fn depth(&self, position: usize) -> usize {
        self.depths[position]
    }

    /// Consecutive runs of terms sharing the same depth.
    pub fn levels(&self) -> Vec<&[TermRecord]> {
        let mut levels = Vec::new();
        let mut start = 0;
        for i in 1..=self.terms.len() {
            if i == self.terms.len() || self.depths[i] != self.depths[start] {
                levels.push(&self.terms[start..i]);
                start = i;
            }
        }
        levels
    }

    /// Names from the root down to the term identified by `id`.
    pub fn name_path(&self, id: &str) -> Vec<String> {
        let mut path = Vec::new();
        let mut current = self.get(id);
        while let Some(term) = current {
            path.push(term.name.clone());
            if path.len() > self.terms.len() {
                break;
            }
            current = term.parent_id.as_deref().and_then(|p| self.get(p));
        }
        path.reverse();
        path
    }
}
