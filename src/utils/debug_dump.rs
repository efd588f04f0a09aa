//! Optional dumps of intermediate images for troubleshooting.
//!
//! Files are named `{timestamp}_{session}_{stage}.png` so a listing sorts
//! chronologically and groups naturally by session.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use image::RgbImage;
use tracing::{debug, warn};

/// Writes images to a directory when enabled; a no-op otherwise.
#[derive(Debug, Clone, Default)]
pub struct DebugDumper {
    directory: Option<PathBuf>,
}

impl DebugDumper {
    #[must_use]
    pub fn new<P: AsRef<Path>>(directory: Option<P>) -> Self {
        Self {
            directory: directory.map(|d| d.as_ref().to_path_buf()),
        }
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.directory.is_some()
    }

    /// File name used for a dump, without the directory.
    #[must_use]
    pub fn file_name(session: &str, stage: &str) -> String {
        let timestamp = Utc::now().format("%Y%m%dT%H%M%S%.3f");
        format!("{timestamp}_{session}_{stage}.png")
    }

    /// Saves `image`, returning the written path.
    ///
    /// Failures are logged and swallowed; dumps never affect the pipeline.
    pub fn dump(&self, session: &str, stage: &str, image: &RgbImage) -> Option<PathBuf> {
        let directory = self.directory.as_ref()?;

        if let Err(e) = fs::create_dir_all(directory) {
            warn!(error = %e, dir = %directory.display(), "Could not create debug dump directory");
            return None;
        }

        let path = directory.join(Self::file_name(session, stage));
        match image.save(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "Wrote debug image");
                Some(path)
            }
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Failed to write debug image");
                None
            }
        }
    }
}
