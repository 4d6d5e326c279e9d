use crate::model::{Tour, TourId};

/// The tours of the open project, as of the latest snapshot.
#[derive(Debug, Default)]
pub struct TourRegistry {
    tours: Vec<Tour>,
}

impl TourRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_snapshot(&mut self, tours: Vec<Tour>) {
        log::debug!("tour registry now holds {} tours", tours.len());
        self.tours = tours;
    }

    pub fn tours(&self) -> &[Tour] {
        &self.tours
    }

    pub fn get(&self, id: &TourId) -> Option<&Tour> {
        self.tours.iter().find(|tour| &tour.id == id)
    }

    pub fn contains(&self, id: &TourId) -> bool {
        self.get(id).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.tours.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ImageRef;
    use chrono::Utc;

    fn tour(id: &str) -> Tour {
        Tour {
            id: id.into(),
            name: format!("{id}.jpg"),
            image_ref: ImageRef::new(format!("images/{id}.jpg")),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn snapshot_replaces_the_whole_list() {
        let mut registry = TourRegistry::new();
        assert!(registry.is_empty());
        registry.apply_snapshot(vec![tour("a"), tour("b")]);
        assert!(registry.contains(&"a".into()));
        registry.apply_snapshot(vec![tour("c")]);
        assert!(!registry.contains(&"a".into()));
        assert_eq!(registry.tours().len(), 1);
        assert_eq!(registry.get(&"c".into()).map(|t| t.name.as_str()), Some("c.jpg"));
    }
}
