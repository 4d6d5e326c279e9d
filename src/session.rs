use crate::annotations::{AnnotationStore, CommittedAnnotation};
use crate::documents::{DocumentStore, ProjectInfo, Subscription};
use crate::model::{Annotation, Draft, SphericalCoord, Tour, TourId};
use crate::registry::TourRegistry;
use crate::selection::{SelectOutcome, SelectionWindow};
use crate::writer::{BackgroundWriter, WriteJob, WriteReport};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Everything one open project view owns: the tours, which of them are being
/// compared, their comments and the live feeds keeping those current.
pub struct ProjectSession {
    store: Arc<DocumentStore>,
    project: ProjectInfo,
    registry: TourRegistry,
    selection: SelectionWindow,
    annotations: AnnotationStore,
    writer: BackgroundWriter,
    tour_feed: Option<Subscription<Vec<Tour>>>,
    annotation_feeds: HashMap<TourId, Subscription<Vec<Annotation>>>,
    last_failure: Option<String>,
}

impl ProjectSession {
    pub fn open(store: Arc<DocumentStore>) -> anyhow::Result<Self> {
        let project = store.project()?;
        let tour_feed = store.subscribe_tours()?;
        let mut session = Self {
            writer: BackgroundWriter::new(store.clone()),
            store,
            project,
            registry: TourRegistry::new(),
            selection: SelectionWindow::new(),
            annotations: AnnotationStore::new(),
            tour_feed: Some(tour_feed),
            annotation_feeds: HashMap::new(),
            last_failure: None,
        };
        session.pump();
        log::info!(
            "opened project \"{}\" with {} tours",
            session.project.name,
            session.registry.tours().len()
        );
        Ok(session)
    }

    pub fn project(&self) -> &ProjectInfo {
        &self.project
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn registry(&self) -> &TourRegistry {
        &self.registry
    }

    pub fn selection(&self) -> &SelectionWindow {
        &self.selection
    }

    pub fn annotations(&self) -> &AnnotationStore {
        &self.annotations
    }

    pub fn annotations_mut(&mut self) -> &mut AnnotationStore {
        &mut self.annotations
    }

    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }

    pub fn dismiss_failure(&mut self) {
        self.last_failure = None;
    }

    // ── Selection ───────────────────────────────────────────────────────────

    pub fn select(&mut self, id: TourId) -> SelectOutcome {
        let outcome = self.selection.select(id);
        self.sync_annotation_feeds();
        outcome
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
        self.sync_annotation_feeds();
    }

    /// One annotation feed per selected tour; feeds of tours that left the
    /// window are dropped.
    fn sync_annotation_feeds(&mut self) {
        if self.is_closed() {
            return;
        }
        let selection = &self.selection;
        self.annotation_feeds.retain(|id, _| selection.contains(id));
        for id in self.selection.tours() {
            if self.annotation_feeds.contains_key(id) {
                continue;
            }
            match self.store.subscribe_annotations(id) {
                Ok(feed) => {
                    if let Some(snapshot) = feed.latest() {
                        self.annotations.apply_snapshot(id, snapshot);
                    }
                    self.annotation_feeds.insert(id.clone(), feed);
                }
                Err(err) => {
                    log::error!("cannot load comments of {id}: {err:#}");
                    self.last_failure = Some(format!("{err:#}"));
                }
            }
        }
    }

    // ── Drafts ──────────────────────────────────────────────────────────────

    pub fn begin_draft(&mut self, tour_id: TourId, at: SphericalCoord) -> &Draft {
        self.annotations.begin_draft(tour_id, at)
    }

    pub fn draft(&self) -> Option<&Draft> {
        self.annotations.draft()
    }

    pub fn update_draft_text(&mut self, text: impl Into<String>) -> bool {
        self.annotations.update_draft_text(text)
    }

    pub fn discard_draft(&mut self) {
        self.annotations.discard_draft();
    }

    /// Commits locally and queues the write. The draft stays cleared even if
    /// the write later fails.
    pub fn commit_draft(&mut self) -> bool {
        let Some(CommittedAnnotation {
            tour_id,
            annotation,
        }) = self.annotations.commit_draft()
        else {
            return false;
        };
        self.writer.submit(WriteJob::AppendAnnotation {
            tour_id,
            annotation,
        });
        true
    }

    pub fn annotations_for(&self, tour_id: &TourId) -> &[Annotation] {
        self.annotations.annotations_for(tour_id)
    }

    // ── Uploads ─────────────────────────────────────────────────────────────

    pub fn import_tour(&self, source: PathBuf) {
        log::info!("importing {}", source.display());
        self.writer.submit(WriteJob::ImportTour { source });
    }

    // ── Feeds ───────────────────────────────────────────────────────────────

    /// Applies snapshots and write reports that arrived since the last call.
    pub fn pump(&mut self) {
        if let Some(tours) = self.tour_feed.as_ref().and_then(Subscription::latest) {
            self.registry.apply_snapshot(tours);
            let registry = &self.registry;
            let before = self.selection.len();
            self.selection.retain(|id| registry.contains(id));
            if self.selection.len() != before {
                self.sync_annotation_feeds();
            }
        }
        for (id, feed) in &self.annotation_feeds {
            if let Some(snapshot) = feed.latest() {
                self.annotations.apply_snapshot(id, snapshot);
            }
        }
        for report in self.writer.poll_reports() {
            match report {
                WriteReport::Done(job) => log::debug!("{job} done"),
                WriteReport::Failed { job, error } => {
                    self.last_failure = Some(format!("{job} failed: {error}"));
                }
            }
        }
    }

    /// Tears down every live feed. Nothing is delivered after this returns.
    pub fn close(&mut self) {
        self.tour_feed = None;
        self.annotation_feeds.clear();
        log::debug!("closed project \"{}\"", self.project.name);
    }

    pub fn is_closed(&self) -> bool {
        self.tour_feed.is_none()
    }

    /// Waits for queued writes, then applies what they produced.
    pub fn flush(&mut self) {
        self.writer.shutdown();
        self.pump();
        self.writer = BackgroundWriter::new(self.store.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ImageRef;

    fn at(pitch: f32, yaw: f32) -> SphericalCoord {
        SphericalCoord::new(pitch, yaw).unwrap()
    }

    fn project(tours: &[&str]) -> (tempfile::TempDir, Arc<DocumentStore>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(DocumentStore::open(dir.path().join("project")).unwrap());
        for name in tours {
            store
                .create_tour(name, ImageRef::new(format!("images/{name}")))
                .unwrap();
        }
        (dir, store)
    }

    fn selected(session: &ProjectSession) -> Vec<&str> {
        session.selection().tours().iter().map(TourId::as_str).collect()
    }

    #[test]
    fn open_loads_the_registry() {
        let (_dir, store) = project(&["a.jpg", "b.jpg"]);
        let session = ProjectSession::open(store).unwrap();
        assert_eq!(session.project().name, "project");
        assert_eq!(session.registry().tours().len(), 2);
        assert!(session.selection().is_empty());
    }

    #[test]
    fn selecting_tracks_annotation_feeds() {
        let (_dir, store) = project(&["a.jpg", "b.jpg", "c.jpg"]);
        let mut session = ProjectSession::open(store.clone()).unwrap();
        assert_eq!(store.subscription_count(), 1);

        session.select("tour-1".into());
        session.select("tour-2".into());
        session.select("tour-3".into());
        assert_eq!(selected(&session), ["tour-2", "tour-3"]);
        assert_eq!(store.subscription_count(), 3);

        session.clear_selection();
        assert_eq!(store.subscription_count(), 1);
        session.close();
        assert!(session.is_closed());
        assert_eq!(store.subscription_count(), 0);
    }

    #[test]
    fn committed_comment_is_persisted() {
        let (_dir, store) = project(&["a.jpg"]);
        let mut session = ProjectSession::open(store.clone()).unwrap();
        let t1 = TourId::from("tour-1");
        session.select(t1.clone());

        session.begin_draft(t1.clone(), at(10.0, 180.0));
        session.update_draft_text("nice view");
        assert!(session.commit_draft());
        assert!(session.draft().is_none());
        assert_eq!(session.annotations_for(&t1).len(), 1);

        session.flush();
        let expected = [Annotation::new(at(10.0, 180.0), "nice view")];
        assert_eq!(store.annotations(&t1).unwrap(), expected);
        assert_eq!(session.annotations_for(&t1), expected);
        assert_eq!(session.annotations().unconfirmed_count(&t1), 0);
    }

    #[test]
    fn empty_comment_is_not_committed() {
        let (_dir, store) = project(&["a.jpg"]);
        let mut session = ProjectSession::open(store.clone()).unwrap();
        let t1 = TourId::from("tour-1");
        session.begin_draft(t1.clone(), at(5.0, 5.0));
        assert!(!session.commit_draft());
        session.flush();
        assert!(session.annotations_for(&t1).is_empty());
        assert!(store.annotations(&t1).unwrap().is_empty());
        assert!(session.draft().is_some());
    }

    #[test]
    fn failed_write_keeps_local_state() {
        let (dir, store) = project(&["a.jpg"]);
        let mut session = ProjectSession::open(store.clone()).unwrap();
        let t1 = TourId::from("tour-1");
        session.select(t1.clone());

        // make the annotation file unwritable by putting a directory in its place
        let blocked = dir.path().join("project/annotations/tour-1.json");
        std::fs::create_dir_all(&blocked).unwrap();

        session.begin_draft(t1.clone(), at(0.0, 0.0));
        session.update_draft_text("lost on disk");
        assert!(session.commit_draft());
        session.flush();

        assert!(session.draft().is_none());
        assert_eq!(session.annotations_for(&t1).len(), 1);
        assert!(session.last_failure().unwrap().contains("tour-1"));
        session.dismiss_failure();
        assert!(session.last_failure().is_none());
    }

    #[test]
    fn imported_tour_appears_after_pump() {
        let (dir, store) = project(&[]);
        let mut session = ProjectSession::open(store).unwrap();
        let source = dir.path().join("atrium.jpg");
        std::fs::write(&source, b"pixels").unwrap();
        session.import_tour(source);
        session.flush();
        let names: Vec<_> = session.registry().tours().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["atrium.jpg"]);
    }

    #[test]
    fn tours_removed_from_registry_leave_the_window() {
        let (dir, store) = project(&["a.jpg", "b.jpg"]);
        let mut session = ProjectSession::open(store.clone()).unwrap();
        session.select("tour-1".into());
        session.select("tour-2".into());

        // another writer rewrites the tour list without tour-1
        let remaining: Vec<_> = store
            .list_tours()
            .unwrap()
            .into_iter()
            .filter(|t| t.id.as_str() != "tour-1")
            .collect();
        std::fs::write(
            dir.path().join("project/tours.json"),
            serde_json::to_string(&serde_json::json!({ "tours": remaining })).unwrap(),
        )
        .unwrap();
        store.create_tour("c.jpg", ImageRef::new("images/c.jpg")).unwrap();

        session.pump();
        assert_eq!(selected(&session), ["tour-2"]);
        assert_eq!(store.subscription_count(), 2);
    }

    #[test]
    fn closed_session_opens_no_feeds() {
        let (_dir, store) = project(&["a.jpg", "b.jpg"]);
        let t1 = TourId::from("tour-1");
        store
            .append_annotation(&t1, &Annotation::new(at(1.0, 2.0), "on disk"))
            .unwrap();
        let mut session = ProjectSession::open(store.clone()).unwrap();
        session.close();
        assert_eq!(store.subscription_count(), 0);

        session.select(t1.clone());
        session.select("tour-2".into());
        session.pump();
        store.create_tour("c.jpg", ImageRef::new("images/c.jpg")).unwrap();
        session.pump();

        assert_eq!(store.subscription_count(), 0);
        assert!(session.annotations_for(&t1).is_empty());
        assert_eq!(session.registry().tours().len(), 2);
    }
}
