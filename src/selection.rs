use crate::model::TourId;

/// How many tours can be compared at once.
pub const WINDOW_CAPACITY: usize = 2;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectOutcome {
    AlreadySelected,
    Appended,
    Slid { evicted: TourId },
}

/// Fixed-capacity FIFO of the tours being compared. Selecting into a full
/// window evicts the oldest entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectionWindow {
    tours: Vec<TourId>,
}

impl SelectionWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&mut self, id: TourId) -> SelectOutcome {
        if self.contains(&id) {
            return SelectOutcome::AlreadySelected;
        }
        if self.tours.len() < WINDOW_CAPACITY {
            self.tours.push(id);
            return SelectOutcome::Appended;
        }
        let evicted = self.tours.remove(0);
        self.tours.push(id);
        SelectOutcome::Slid { evicted }
    }

    pub fn clear(&mut self) {
        self.tours.clear();
    }

    /// Keep only the tours matching `keep`, in their current order.
    pub fn retain(&mut self, mut keep: impl FnMut(&TourId) -> bool) {
        self.tours.retain(|id| keep(id));
    }

    pub fn tours(&self) -> &[TourId] {
        &self.tours
    }

    pub fn contains(&self, id: &TourId) -> bool {
        self.tours.contains(id)
    }

    pub fn len(&self) -> usize {
        self.tours.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tours.is_empty()
    }
}
