//! Project documents on disk: tours, their annotations and uploaded images.
//!
//! Layout of a project directory:
//!
//! ```text
//! project.json            name and creation time
//! tours.json              every tour of the project
//! annotations/<tour>.json committed annotations of one tour
//! images/<file>           uploaded panoramas
//! ```
//!
//! Readers subscribe to tours or to one tour's annotations and receive a full
//! snapshot on subscribe and after every write.

use crate::model::{Annotation, ImageRef, Tour, TourId};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

const PROJECT_FILE: &str = "project.json";
const TOURS_FILE: &str = "tours.json";
const ANNOTATIONS_DIR: &str = "annotations";
const IMAGES_DIR: &str = "images";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TourFile {
    tours: Vec<Tour>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AnnotationFile {
    annotations: Vec<Annotation>,
}

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    tours: Vec<(u64, Sender<Vec<Tour>>)>,
    annotations: Vec<(u64, TourId, Sender<Vec<Annotation>>)>,
}

impl Subscribers {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn remove(&mut self, id: u64) {
        self.tours.retain(|(sub, _)| *sub != id);
        self.annotations.retain(|(sub, _, _)| *sub != id);
    }

    fn len(&self) -> usize {
        self.tours.len() + self.annotations.len()
    }
}

/// Live feed of snapshots. Dropping it unsubscribes.
pub struct Subscription<T> {
    id: u64,
    rx: Receiver<T>,
    subscribers: Weak<Mutex<Subscribers>>,
}

impl<T> Subscription<T> {
    /// The newest snapshot delivered since the last call, if any. Older
    /// snapshots are superseded and skipped.
    pub fn latest(&self) -> Option<T> {
        self.rx.try_iter().last()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(self.id);
        }
    }
}

pub struct DocumentStore {
    root: PathBuf,
    // held across read-modify-write and the notification that follows
    io: Mutex<()>,
    subscribers: Arc<Mutex<Subscribers>>,
}

fn read_json<T: DeserializeOwned + Default>(path: &Path) -> anyhow::Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let data =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let data = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, data).with_context(|| format!("writing {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))
}

fn next_tour_id(tours: &[Tour]) -> TourId {
    let next = tours
        .iter()
        .filter_map(|tour| tour.id.as_str().strip_prefix("tour-")?.parse::<u64>().ok())
        .max()
        .map_or(1, |n| n + 1);
    TourId::new(format!("tour-{next}"))
}

impl DocumentStore {
    /// Opens the project in `root`, creating an empty one if needed.
    pub fn open(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let root = root.into();
        for dir in [ANNOTATIONS_DIR, IMAGES_DIR] {
            let dir = root.join(dir);
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        let store = Self {
            root,
            io: Mutex::new(()),
            subscribers: Arc::default(),
        };
        let project_path = store.root.join(PROJECT_FILE);
        if !project_path.exists() {
            let name = store
                .root
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("Untitled project")
                .to_string();
            log::info!("creating project \"{name}\" in {}", store.root.display());
            write_json(
                &project_path,
                &ProjectInfo {
                    name,
                    created_at: Utc::now(),
                },
            )?;
        }
        Ok(store)
    }

    pub fn resolve(&self, image: &ImageRef) -> PathBuf {
        self.root.join(image.as_str())
    }

    fn io(&self) -> MutexGuard<'_, ()> {
        self.io.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn subscribers(&self) -> MutexGuard<'_, Subscribers> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Tour ids become file names, so anything that could leave the
    /// annotations directory is refused.
    fn annotations_path(&self, tour_id: &TourId) -> anyhow::Result<PathBuf> {
        let id = tour_id.as_str();
        anyhow::ensure!(
            !id.is_empty() && id != "." && id != ".." && !id.contains(['/', '\\']),
            "invalid tour id {id:?}"
        );
        Ok(self.root.join(ANNOTATIONS_DIR).join(format!("{id}.json")))
    }

    pub fn project(&self) -> anyhow::Result<ProjectInfo> {
        let path = self.root.join(PROJECT_FILE);
        let data =
            std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
    }

    // ── Tours ───────────────────────────────────────────────────────────────

    pub fn list_tours(&self) -> anyhow::Result<Vec<Tour>> {
        Ok(read_json::<TourFile>(&self.root.join(TOURS_FILE))?.tours)
    }

    pub fn subscribe_tours(&self) -> anyhow::Result<Subscription<Vec<Tour>>> {
        let _io = self.io();
        let tours = self.list_tours()?;
        let (tx, rx) = channel();
        let _ = tx.send(tours);
        let mut subscribers = self.subscribers();
        let id = subscribers.next_id();
        subscribers.tours.push((id, tx));
        Ok(Subscription {
            id,
            rx,
            subscribers: Arc::downgrade(&self.subscribers),
        })
    }

    pub fn create_tour(&self, name: &str, image_ref: ImageRef) -> anyhow::Result<Tour> {
        let _io = self.io();
        let path = self.root.join(TOURS_FILE);
        let mut file: TourFile = read_json(&path)?;
        let tour = Tour {
            id: next_tour_id(&file.tours),
            name: name.to_string(),
            image_ref,
            created_at: Utc::now(),
        };
        file.tours.push(tour.clone());
        write_json(&path, &file)?;
        log::info!("created tour {} ({})", tour.id, tour.name);
        self.subscribers()
            .tours
            .retain(|(_, tx)| tx.send(file.tours.clone()).is_ok());
        Ok(tour)
    }

    // ── Images ──────────────────────────────────────────────────────────────

    /// Stores `bytes` under the images directory and returns the reference.
    /// An existing image with the same name is never overwritten.
    pub fn upload(&self, bytes: &[u8], file_name: &str) -> anyhow::Result<ImageRef> {
        let name = Path::new(file_name)
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty())
            .with_context(|| format!("invalid image name {file_name:?}"))?;
        let _io = self.io();
        let images = self.root.join(IMAGES_DIR);
        let mut target = name.to_string();
        let mut n = 1;
        while images.join(&target).exists() {
            let path = Path::new(name);
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
            target = match path.extension().and_then(|e| e.to_str()) {
                Some(ext) => format!("{stem}-{n}.{ext}"),
                None => format!("{stem}-{n}"),
            };
            n += 1;
        }
        let path = images.join(&target);
        std::fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))?;
        log::debug!("stored {} bytes as {}", bytes.len(), path.display());
        Ok(ImageRef::new(format!("{IMAGES_DIR}/{target}")))
    }

    // ── Annotations ─────────────────────────────────────────────────────────

    pub fn annotations(&self, tour_id: &TourId) -> anyhow::Result<Vec<Annotation>> {
        Ok(read_json::<AnnotationFile>(&self.annotations_path(tour_id)?)?.annotations)
    }

    pub fn subscribe_annotations(
        &self,
        tour_id: &TourId,
    ) -> anyhow::Result<Subscription<Vec<Annotation>>> {
        let _io = self.io();
        let annotations = self.annotations(tour_id)?;
        let (tx, rx) = channel();
        let _ = tx.send(annotations);
        let mut subscribers = self.subscribers();
        let id = subscribers.next_id();
        subscribers.annotations.push((id, tour_id.clone(), tx));
        Ok(Subscription {
            id,
            rx,
            subscribers: Arc::downgrade(&self.subscribers),
        })
    }

    pub fn append_annotation(&self, tour_id: &TourId, annotation: &Annotation) -> anyhow::Result<()> {
        let _io = self.io();
        let path = self.annotations_path(tour_id)?;
        let mut file: AnnotationFile = read_json(&path)?;
        file.annotations.push(annotation.clone());
        write_json(&path, &file)?;
        self.subscribers()
            .annotations
            .retain(|(_, tour, tx)| tour != tour_id || tx.send(file.annotations.clone()).is_ok());
        Ok(())
    }

    pub fn subscription_count(&self) -> usize {
        self.subscribers().len()
    }
}
