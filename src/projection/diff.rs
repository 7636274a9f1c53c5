//! Diff Engine
//!
//! Compares consecutive projections and describes the change as section and
//! row operations a list view can animate.

use serde::Serialize;
use std::collections::{HashMap, HashSet};

use super::query::{IndexPath, ProjectedTracker, Projection, Section, SectionKey};
use crate::domain::TrackerId;

/// A row that kept its identity but changed coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RowMove {
    pub from: IndexPath,
    pub to: IndexPath,
}

/// Change between two projections.
///
/// Deleted sections and rows (and move sources) are indices into the
/// previous projection; everything else indexes `projection`, the new one.
/// All lists are sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct StructuralUpdate {
    pub deleted_sections: Vec<usize>,
    pub inserted_sections: Vec<usize>,
    pub deleted_rows: Vec<IndexPath>,
    pub inserted_rows: Vec<IndexPath>,
    pub updated_rows: Vec<IndexPath>,
    pub moved_rows: Vec<RowMove>,
    pub projection: Projection,
}

impl StructuralUpdate {
    /// Compute the operations that turn `previous` into `next`.
    ///
    /// Rows are matched by tracker id and sections by key. A row whose old
    /// or new section is itself deleted or inserted is reported as a delete
    /// plus an insert, never as a move.
    pub fn between(previous: &Projection, next: Projection) -> Self {
        let old_sections = section_index(previous);
        let new_sections = section_index(&next);

        let deleted_sections = previous
            .sections()
            .iter()
            .enumerate()
            .filter(|(_, s)| !new_sections.contains_key(&s.key))
            .map(|(i, _)| i)
            .collect();
        let inserted_sections = next
            .sections()
            .iter()
            .enumerate()
            .filter(|(_, s)| !old_sections.contains_key(&s.key))
            .map(|(i, _)| i)
            .collect();

        let mut old_rows: HashMap<TrackerId, (IndexPath, &SectionKey, &ProjectedTracker)> =
            HashMap::new();
        for (path, row) in previous.rows() {
            old_rows.insert(row.id, (path, &previous.sections()[path.section].key, row));
        }

        let mut update = StructuralUpdate {
            deleted_sections,
            inserted_sections,
            ..Default::default()
        };
        let mut seen = HashSet::new();

        for (path, row) in next.rows() {
            let key = &next.sections()[path.section].key;
            let Some(&(old_path, old_key, old_row)) = old_rows.get(&row.id) else {
                update.inserted_rows.push(path);
                continue;
            };
            seen.insert(row.id);

            let sections_persist =
                new_sections.contains_key(old_key) && old_sections.contains_key(key);
            if !sections_persist {
                update.deleted_rows.push(old_path);
                update.inserted_rows.push(path);
                continue;
            }

            // section indices shift with inserted and deleted sections, so a
            // row is stationary when it keeps its section and its row index
            if old_key != key || old_path.row != path.row {
                update.moved_rows.push(RowMove {
                    from: old_path,
                    to: path,
                });
            }
            if !old_row.same_display(row) {
                update.updated_rows.push(path);
            }
        }

        update.deleted_rows.extend(
            old_rows
                .values()
                .filter(|(_, _, row)| !seen.contains(&row.id))
                .map(|(path, _, _)| *path),
        );

        update.deleted_rows.sort_unstable();
        update.inserted_rows.sort_unstable();
        update.updated_rows.sort_unstable();
        update.moved_rows.sort_unstable();
        update.projection = next;
        update
    }

    /// No operations at all. The change batch did not touch anything visible.
    pub fn is_empty(&self) -> bool {
        self.deleted_sections.is_empty()
            && self.inserted_sections.is_empty()
            && self.deleted_rows.is_empty()
            && self.inserted_rows.is_empty()
            && self.updated_rows.is_empty()
            && self.moved_rows.is_empty()
    }

    /// Replay the operations on `previous` the way a list view would:
    /// removals at old coordinates, then section inserts, then row inserts
    /// and move targets at new coordinates in ascending order, then updates.
    ///
    /// # Panics
    ///
    /// If `previous` is not the projection this update was computed from.
    pub fn apply(&self, previous: &Projection) -> Projection {
        let removed: HashSet<IndexPath> = self
            .deleted_rows
            .iter()
            .copied()
            .chain(self.moved_rows.iter().map(|m| m.from))
            .collect();
        let deleted_sections: HashSet<usize> = self.deleted_sections.iter().copied().collect();

        let mut carried: Vec<(IndexPath, ProjectedTracker)> = self
            .moved_rows
            .iter()
            .map(|m| (m.to, previous.sections()[m.from.section].rows[m.from.row].clone()))
            .collect();

        let mut sections: Vec<Section> = previous
            .sections()
            .iter()
            .enumerate()
            .filter(|(s, _)| !deleted_sections.contains(s))
            .map(|(s, section)| Section {
                key: section.key.clone(),
                title: section.title.clone(),
                rows: section
                    .rows
                    .iter()
                    .enumerate()
                    .filter(|(r, _)| !removed.contains(&IndexPath::new(s, *r)))
                    .map(|(_, row)| row.clone())
                    .collect(),
            })
            .collect();

        for &index in &self.inserted_sections {
            let fresh = &self.projection.sections()[index];
            sections.insert(
                index,
                Section {
                    key: fresh.key.clone(),
                    title: fresh.title.clone(),
                    rows: Vec::new(),
                },
            );
        }

        carried.extend(
            self.inserted_rows
                .iter()
                .map(|&path| (path, self.row(path).clone())),
        );
        carried.sort_by_key(|(path, _)| *path);
        for (path, row) in carried {
            sections[path.section].rows.insert(path.row, row);
        }

        for &path in &self.updated_rows {
            sections[path.section].rows[path.row] = self.row(path).clone();
        }

        Projection::new(sections)
    }

    fn row(&self, path: IndexPath) -> &ProjectedTracker {
        &self.projection.sections()[path.section].rows[path.row]
    }
}

fn section_index(projection: &Projection) -> HashMap<&SectionKey, usize> {
    projection
        .sections()
        .iter()
        .enumerate()
        .map(|(i, s)| (&s.key, i))
        .collect()
}

/// What caused a recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeCause {
    /// View parameters were replaced. The whole list is different.
    Parameters,
    /// Trackers, categories or completions changed under fixed parameters.
    Facts,
}

/// A notification for the consumer of the list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeEvent {
    FullReload(Projection),
    StructuralUpdate(StructuralUpdate),
}

impl ChangeEvent {
    /// The projection the consumer holds once this event is handled.
    pub fn projection(&self) -> &Projection {
        match self {
            ChangeEvent::FullReload(projection) => projection,
            ChangeEvent::StructuralUpdate(update) => &update.projection,
        }
    }

    pub fn is_full_reload(&self) -> bool {
        matches!(self, ChangeEvent::FullReload(_))
    }
}

#[derive(Debug, Clone, Default)]
enum DiffState {
    #[default]
    AwaitingFirstProjection,
    Tracking(Projection),
}

/// Remembers the last delivered projection and turns each new one into an
/// event.
#[derive(Debug, Clone, Default)]
pub struct DiffEngine {
    state: DiffState,
}

impl DiffEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<&Projection> {
        match &self.state {
            DiffState::AwaitingFirstProjection => None,
            DiffState::Tracking(projection) => Some(projection),
        }
    }

    /// Full reload for the first projection and for parameter changes,
    /// a structural update otherwise.
    pub fn advance(&mut self, next: Projection, cause: ChangeCause) -> ChangeEvent {
        let event = match (&self.state, cause) {
            (DiffState::Tracking(previous), ChangeCause::Facts) => {
                ChangeEvent::StructuralUpdate(StructuralUpdate::between(previous, next.clone()))
            }
            _ => ChangeEvent::FullReload(next.clone()),
        };
        self.state = DiffState::Tracking(next);
        event
    }
}
