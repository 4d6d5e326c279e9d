use crate::documents::DocumentStore;
use crate::model::{Annotation, TourId};
use anyhow::Context;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Work handed to the background writer. The caller never waits for it.
#[derive(Clone, Debug, PartialEq)]
pub enum WriteJob {
    AppendAnnotation {
        tour_id: TourId,
        annotation: Annotation,
    },
    /// Upload an image file and create a tour named after it.
    ImportTour { source: PathBuf },
}

impl fmt::Display for WriteJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteJob::AppendAnnotation { tour_id, .. } => write!(f, "saving comment on {tour_id}"),
            WriteJob::ImportTour { source } => write!(f, "uploading {}", source.display()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum WriteReport {
    Done(WriteJob),
    Failed { job: WriteJob, error: String },
}

/// Single worker thread applying writes to the document store in order.
pub struct BackgroundWriter {
    jobs: Option<Sender<WriteJob>>,
    reports: Receiver<WriteReport>,
    worker: Option<JoinHandle<()>>,
}

impl BackgroundWriter {
    pub fn new(store: Arc<DocumentStore>) -> Self {
        let (jobs_tx, jobs_rx) = channel::<WriteJob>();
        let (reports_tx, reports_rx) = channel();
        let worker = thread::spawn(move || {
            for job in jobs_rx {
                let report = match run_job(&store, &job) {
                    Ok(()) => WriteReport::Done(job),
                    Err(err) => {
                        log::error!("{job} failed: {err:#}");
                        WriteReport::Failed {
                            job,
                            error: format!("{err:#}"),
                        }
                    }
                };
                if reports_tx.send(report).is_err() {
                    break;
                }
            }
        });
        Self {
            jobs: Some(jobs_tx),
            reports: reports_rx,
            worker: Some(worker),
        }
    }

    pub fn submit(&self, job: WriteJob) {
        let Some(jobs) = &self.jobs else {
            return;
        };
        if let Err(err) = jobs.send(job) {
            log::error!("writer is gone, dropping {}", err.0);
        }
    }

    /// Reports finished since the last call, oldest first.
    pub fn poll_reports(&self) -> Vec<WriteReport> {
        self.reports.try_iter().collect()
    }

    /// Blocks until every submitted job ran, then stops the worker.
    pub fn shutdown(&mut self) {
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("writer thread panicked");
            }
        }
    }
}

impl Drop for BackgroundWriter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_job(store: &DocumentStore, job: &WriteJob) -> anyhow::Result<()> {
    match job {
        WriteJob::AppendAnnotation {
            tour_id,
            annotation,
        } => store.append_annotation(tour_id, annotation),
        WriteJob::ImportTour { source } => import_tour(store, source),
    }
}

fn import_tour(store: &DocumentStore, source: &Path) -> anyhow::Result<()> {
    let name = source
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("no file name in {}", source.display()))?;
    let bytes = std::fs::read(source).with_context(|| format!("reading {}", source.display()))?;
    let image_ref = store.upload(&bytes, name)?;
    store.create_tour(name, image_ref)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SphericalCoord;

    fn note(text: &str) -> Annotation {
        Annotation::new(SphericalCoord::new(-5.0, 90.0).unwrap(), text)
    }

    #[test]
    fn jobs_run_in_order_and_report_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(DocumentStore::open(dir.path().join("project")).unwrap());
        let mut writer = BackgroundWriter::new(store.clone());
        let tour = TourId::from("tour-1");
        for text in ["first", "second"] {
            writer.submit(WriteJob::AppendAnnotation {
                tour_id: tour.clone(),
                annotation: note(text),
            });
        }
        writer.shutdown();

        assert_eq!(store.annotations(&tour).unwrap(), [note("first"), note("second")]);
        let reports = writer.poll_reports();
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| matches!(r, WriteReport::Done(_))));
    }

    #[test]
    fn import_uploads_and_creates_tour() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("lobby.jpg");
        std::fs::write(&source, b"jpeg bytes").unwrap();
        let store = Arc::new(DocumentStore::open(dir.path().join("project")).unwrap());
        let mut writer = BackgroundWriter::new(store.clone());
        writer.submit(WriteJob::ImportTour { source });
        writer.shutdown();

        let tours = store.list_tours().unwrap();
        assert_eq!(tours.len(), 1);
        assert_eq!(tours[0].name, "lobby.jpg");
        assert_eq!(std::fs::read(store.resolve(&tours[0].image_ref)).unwrap(), b"jpeg bytes");
    }

    #[test]
    fn failures_are_reported_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(DocumentStore::open(dir.path().join("project")).unwrap());
        let mut writer = BackgroundWriter::new(store.clone());
        let missing = dir.path().join("missing.jpg");
        writer.submit(WriteJob::ImportTour {
            source: missing.clone(),
        });
        writer.shutdown();

        match writer.poll_reports().as_slice() {
            [WriteReport::Failed { job, error }] => {
                assert_eq!(job, &WriteJob::ImportTour { source: missing });
                assert!(error.contains("missing.jpg"));
            }
            other => panic!("unexpected reports {other:?}"),
        }
        assert!(store.list_tours().unwrap().is_empty());
    }
}
