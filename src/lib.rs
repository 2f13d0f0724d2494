//! Real-time reward-code acquisition from a camera feed.
//!
//! A [`ScanController`] opens a camera through a [`capture::CaptureBackend`],
//! samples frames on an interval, looks for a QR code inside the code window
//! and for a printed code in the strip beneath it, validates what it finds
//! and checks it against a [`store::CodeStore`] before reporting `Found`.

pub mod audio;
pub mod capture;
pub mod db;
pub mod detect;
pub mod geometry;
pub mod platform;
pub mod scanner;
pub mod settings;
pub mod store;
pub mod utils;
pub mod validation;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

pub use capture::{CaptureBackend, CaptureStream, Frame};
pub use db::Database;
pub use geometry::{DisplayRect, GeometryProvider, StaticLayout};
pub use platform::ScannerDependencies;
pub use scanner::{
    Candidate, CandidateSource, FoundOutcome, ScanController, ScanError, ScanSnapshot, ScanState,
    StatusKind,
};
pub use settings::{ScannerSettings, SettingsStore};
pub use store::{CodeRecord, CodeStore};
pub use validation::is_valid_candidate;

pub const DATABASE_FILE: &str = "codescan.sqlite3";
pub const SETTINGS_FILE: &str = "settings.json";

/// Initialises `env_logger` at `Info`. Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}

/// Opens settings and the local code database under `data_dir` and builds a
/// scanner around the given camera and layout.
pub async fn build_scanner(
    data_dir: &Path,
    camera: Arc<dyn CaptureBackend>,
    geometry: Arc<dyn GeometryProvider>,
) -> Result<ScanController> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    let settings = SettingsStore::new(data_dir.join(SETTINGS_FILE))
        .context("failed to load scanner settings")?
        .scanner();
    let database =
        Database::new(data_dir.join(DATABASE_FILE)).context("failed to open code database")?;

    log::info!(
        "codescan starting with origin {}, codes in {}",
        settings.origin,
        database.path().display()
    );

    let deps =
        ScannerDependencies::new(camera, geometry, &settings).with_store(Arc::new(database));
    Ok(ScanController::new(deps, settings).await)
}
