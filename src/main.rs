use eframe::egui;
use pano_annotate::app::ProjectApp;
use pano_annotate::config::ViewerConfig;
use pano_annotate::documents::DocumentStore;
use pano_annotate::session::ProjectSession;
use std::path::PathBuf;
use std::sync::Arc;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: pano-annotate <project-dir>");
        std::process::exit(1);
    }

    let project_dir = PathBuf::from(&args[1]);
    let project_dir = std::path::absolute(&project_dir).unwrap_or(project_dir);
    let session = match DocumentStore::open(&project_dir)
        .and_then(|store| ProjectSession::open(Arc::new(store)))
    {
        Ok(session) => session,
        Err(err) => {
            eprintln!("Cannot open project {}: {err:#}", project_dir.display());
            std::process::exit(1);
        }
    };
    let config = ViewerConfig::load();

    let title = format!("pano-annotate - {}", session.project().name);
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 900.0])
            .with_title(&title),
        ..Default::default()
    };

    if let Err(err) = eframe::run_native(
        &title,
        options,
        Box::new(move |_cc| Ok(Box::new(ProjectApp::new(session, config)))),
    ) {
        log::error!("eframe stopped: {err}");
        std::process::exit(1);
    }
}
