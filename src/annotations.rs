use crate::model::{Annotation, Draft, SphericalCoord, TourId};
use std::collections::HashMap;

/// An annotation that just left the draft slot and still has to be persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct CommittedAnnotation {
    pub tour_id: TourId,
    pub annotation: Annotation,
}

/// A local commit waiting for its write to show up in a snapshot.
#[derive(Clone, Debug, PartialEq)]
struct Unconfirmed {
    // persisted length when it was committed; the write can only land at or after it
    base: usize,
    annotation: Annotation,
}

/// Committed annotations per tour (append-only, insertion ordered) plus the
/// single draft slot.
#[derive(Debug, Default)]
pub struct AnnotationStore {
    committed: HashMap<TourId, Vec<Annotation>>,
    unconfirmed: HashMap<TourId, Vec<Unconfirmed>>,
    // length of the latest snapshot per tour
    persisted: HashMap<TourId, usize>,
    draft: Option<Draft>,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces whatever draft was in progress, on any tour.
    pub fn begin_draft(&mut self, tour_id: TourId, at: SphericalCoord) -> &Draft {
        self.draft.insert(Draft {
            tour_id,
            at,
            text: String::new(),
        })
    }

    pub fn draft(&self) -> Option<&Draft> {
        self.draft.as_ref()
    }

    /// Returns false (and does nothing) when no draft is active.
    pub fn update_draft_text(&mut self, text: impl Into<String>) -> bool {
        match self.draft.as_mut() {
            Some(draft) => {
                draft.text = text.into();
                true
            }
            None => false,
        }
    }

    pub fn draft_text_mut(&mut self) -> Option<&mut String> {
        self.draft.as_mut().map(|draft| &mut draft.text)
    }

    pub fn discard_draft(&mut self) -> Option<Draft> {
        self.draft.take()
    }

    /// Promotes the draft when it has text. An empty draft stays in place.
    pub fn commit_draft(&mut self) -> Option<CommittedAnnotation> {
        if self.draft.as_ref()?.text.is_empty() {
            return None;
        }
        let draft = self.draft.take()?;
        let annotation = Annotation::new(draft.at, draft.text);
        self.committed
            .entry(draft.tour_id.clone())
            .or_default()
            .push(annotation.clone());
        let base = self.persisted.get(&draft.tour_id).copied().unwrap_or(0);
        self.unconfirmed
            .entry(draft.tour_id.clone())
            .or_default()
            .push(Unconfirmed {
                base,
                annotation: annotation.clone(),
            });
        Some(CommittedAnnotation {
            tour_id: draft.tour_id,
            annotation,
        })
    }

    pub fn annotations_for(&self, tour_id: &TourId) -> &[Annotation] {
        self.committed
            .get(tour_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Replace a tour's committed list with a persisted snapshot. Local
    /// commits the snapshot does not contain yet stay at the end.
    ///
    /// Writes only append and land in commit order, so a pending entry is
    /// confirmed by the first equal snapshot entry at or after its base index
    /// and after the entry that confirmed the previous one. Each snapshot
    /// entry confirms at most one pending entry.
    pub fn apply_snapshot(&mut self, tour_id: &TourId, snapshot: Vec<Annotation>) {
        let mut merged = snapshot;
        self.persisted.insert(tour_id.clone(), merged.len());
        if let Some(pending) = self.unconfirmed.get_mut(tour_id) {
            let mut cursor = 0;
            pending.retain(|entry| {
                let found = merged
                    .iter()
                    .enumerate()
                    .skip(cursor.max(entry.base))
                    .find(|(_, ann)| **ann == entry.annotation);
                match found {
                    Some((index, _)) => {
                        cursor = index + 1;
                        false
                    }
                    None => true,
                }
            });
            // whatever is still pending was written after the last confirmed entry
            for entry in pending.iter_mut() {
                entry.base = entry.base.max(cursor);
            }
            merged.extend(pending.iter().map(|entry| entry.annotation.clone()));
            if pending.is_empty() {
                self.unconfirmed.remove(tour_id);
            }
        }
        self.committed.insert(tour_id.clone(), merged);
    }

    pub fn unconfirmed_count(&self, tour_id: &TourId) -> usize {
        self.unconfirmed.get(tour_id).map_or(0, Vec::len)
    }
}
