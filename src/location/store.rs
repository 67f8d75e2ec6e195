//! Last-known location persisted as a small JSON file

use std::fs;
use std::path::PathBuf;

use tracing::{debug, warn};

use super::{LocationStore, ObserverLocation};
use crate::error::LocationError;

pub struct JsonLocationStore {
    path: PathBuf,
}

impl JsonLocationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl LocationStore for JsonLocationStore {
    fn last_known(&self) -> Option<ObserverLocation> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) => {
                debug!("no stored location at {}: {e}", self.path.display());
                return None;
            }
        };
        match serde_json::from_str(&text) {
            Ok(location) => Some(location),
            Err(e) => {
                warn!("ignoring corrupt location file {}: {e}", self.path.display());
                None
            }
        }
    }

    fn persist(&self, location: &ObserverLocation) -> Result<(), LocationError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| LocationError::Store(e.to_string()))?;
        }
        let json =
            serde_json::to_string_pretty(location).map_err(|e| LocationError::Store(e.to_string()))?;
        // Write then rename so a crash never leaves a truncated file
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| LocationError::Store(e.to_string()))?;
        fs::rename(&tmp, &self.path).map_err(|e| LocationError::Store(e.to_string()))
    }
}
