//! Pure next-state computation for a batch of instructions.

use std::collections::HashMap;

use crate::archive::{ArchiveSnapshot, Entry, EntryMeta};

use super::operation::{Action, MutationBatch};

/// Outcome counts of one planned batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanSummary {
    /// Original entries copied through untouched.
    pub entries_kept: usize,
    pub created: usize,
    pub replaced: usize,
    pub appended: usize,
    pub deleted: usize,
    /// Creates on existing paths and deletes of absent paths.
    pub noops: usize,
}

impl PlanSummary {
    pub fn changed(&self) -> bool {
        self.created + self.replaced + self.appended + self.deleted > 0
    }
}

/// Working state of one path while the batch is folded over it.
struct PathState {
    content: Option<Vec<u8>>,
    meta: Option<EntryMeta>,
}

/// Compute the snapshot that results from applying `batch` to `current`.
///
/// Instructions for the same path are folded in batch order: the last
/// create/replace/delete decides existence, appends accumulate onto whatever
/// content the path has at that point. Creating an existing path and deleting
/// an absent one are no-ops. Surviving original entries keep their positions;
/// paths new to the archive follow in order of first mention. Paths that
/// (re)appear after being absent get `defaults` as metadata.
pub fn plan(
    current: ArchiveSnapshot,
    batch: &MutationBatch,
    defaults: &EntryMeta,
) -> (ArchiveSnapshot, PlanSummary) {
    let created_at = current.created();
    let originals = current.into_entries();
    let orig_paths: Vec<String> = originals.iter().map(|e| e.path.clone()).collect();
    let index: HashMap<&str, usize> = orig_paths
        .iter()
        .enumerate()
        .map(|(i, p)| (p.as_str(), i))
        .collect();
    let mut slots: Vec<Option<Entry>> = originals.into_iter().map(Some).collect();

    let mut states: HashMap<&str, PathState> = HashMap::new();
    let mut fresh_order: Vec<&str> = Vec::new();
    let mut summary = PlanSummary::default();

    for instr in batch.instructions() {
        let path = instr.target_path.as_str();
        let state = states.entry(path).or_insert_with(|| {
            match index.get(path).and_then(|&i| slots[i].take()) {
                Some(orig) => PathState {
                    content: Some(orig.content),
                    meta: Some(orig.meta),
                },
                None => {
                    fresh_order.push(path);
                    PathState {
                        content: None,
                        meta: None,
                    }
                }
            }
        });

        match instr.action {
            Action::Create => {
                if state.content.is_some() {
                    summary.noops += 1;
                } else {
                    state.content = Some(instr.payload.clone());
                    state.meta = Some(*defaults);
                    summary.created += 1;
                }
            }
            Action::Replace => {
                state.meta.get_or_insert(*defaults);
                state.content = Some(instr.payload.clone());
                summary.replaced += 1;
            }
            Action::Append => {
                state.meta.get_or_insert(*defaults);
                state
                    .content
                    .get_or_insert_with(Vec::new)
                    .extend_from_slice(&instr.payload);
                summary.appended += 1;
            }
            Action::Delete => {
                if state.content.take().is_some() {
                    state.meta = None;
                    summary.deleted += 1;
                } else {
                    summary.noops += 1;
                }
            }
        }
    }

    let mut next = Vec::with_capacity(slots.len() + fresh_order.len());

    for (slot, path) in slots.into_iter().zip(&orig_paths) {
        match slot {
            Some(untouched) => {
                summary.entries_kept += 1;
                next.push(untouched);
            }
            None => next.extend(resolve(path, &mut states)),
        }
    }
    for path in fresh_order {
        next.extend(resolve(path, &mut states));
    }

    (ArchiveSnapshot::from_unique(next, created_at), summary)
}

fn resolve(path: &str, states: &mut HashMap<&str, PathState>) -> Option<Entry> {
    let state = states.remove(path)?;
    Some(Entry {
        path: path.to_string(),
        content: state.content?,
        meta: state.meta?,
    })
}
