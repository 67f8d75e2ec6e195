//! JPL SPK kernel ephemeris read through ANISE
//!
//! Positions come out of the kernel in the J2000/ICRF frame and are
//! precessed to the mean equator of date before leaving this module.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anise::almanac::Almanac;
use anise::constants::frames::{EARTH_J2000, MOON_J2000, SUN_J2000};
use chrono::{DateTime, Utc};
use tracing::info;
use ureq::Agent;

use super::{Body, EphemerisProvider};
use crate::error::EphemerisError;
use crate::utils::coordinates::precess_j2000_to_date;
use crate::utils::hifi_time::chrono_to_epoch;
use crate::utils::time_utils::terrestrial_jd;

/// Budget for the whole kernel transfer (DE440s is about 32 MB)
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

pub struct SpkEphemeris {
    almanac: Almanac,
    path: PathBuf,
}

impl SpkEphemeris {
    /// Load an SPK kernel (DE440s or compatible).
    pub fn load(path: &Path) -> Result<Self, EphemerisError> {
        let path_str = path.to_string_lossy();
        let almanac = Almanac::new(&path_str).map_err(|e| EphemerisError::Load {
            path: path_str.to_string(),
            reason: format!("{e:?}"),
        })?;
        info!("loaded SPK kernel {}", path.display());
        Ok(Self {
            almanac,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EphemerisProvider for SpkEphemeris {
    fn name(&self) -> &str {
        "spk"
    }

    fn geocentric(&self, body: Body, utc: &DateTime<Utc>) -> Result<[f64; 3], EphemerisError> {
        let target = match body {
            Body::Earth => return Ok([0.0; 3]),
            Body::Moon => MOON_J2000,
            Body::Sun => SUN_J2000,
        };
        let epoch = chrono_to_epoch(utc);
        let state = self
            .almanac
            .translate(target, EARTH_J2000, epoch, None)
            .map_err(|e| EphemerisError::Compute {
                body: body.name(),
                reason: format!("{e:?}"),
            })?;

        let j2000 = [state.radius_km.x, state.radius_km.y, state.radius_km.z];
        if j2000.iter().any(|c| !c.is_finite()) {
            return Err(EphemerisError::NonPhysical { body: body.name() });
        }
        Ok(precess_j2000_to_date(&j2000, terrestrial_jd(utc)))
    }
}

/// Download a kernel to `dest`, writing through a temporary file so a
/// partial transfer never looks like a valid kernel.
pub fn download_kernel(url: &str, dest: &Path) -> Result<(), EphemerisError> {
    let download_err = |reason: String| EphemerisError::Download {
        url: url.to_string(),
        reason,
    };

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| download_err(e.to_string()))?;
    }
    info!("downloading ephemeris kernel {url} -> {}", dest.display());

    let agent: Agent = Agent::config_builder()
        .timeout_connect(Some(CONNECT_TIMEOUT))
        .timeout_global(Some(DOWNLOAD_TIMEOUT))
        .build()
        .into();
    let response = agent
        .get(url)
        .call()
        .map_err(|e| download_err(e.to_string()))?;
    let mut reader = response.into_body().into_reader();

    let tmp = dest.with_extension("part");
    let mut file = File::create(&tmp).map_err(|e| download_err(e.to_string()))?;
    let bytes = io::copy(&mut reader, &mut file).map_err(|e| download_err(e.to_string()))?;
    drop(file);
    fs::rename(&tmp, dest).map_err(|e| download_err(e.to_string()))?;

    info!("downloaded {bytes} bytes to {}", dest.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreadable_kernel_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.bsp");
        fs::write(&path, b"definitely not a DAF file").unwrap();
        assert!(matches!(
            SpkEphemeris::load(&path),
            Err(EphemerisError::Load { .. })
        ));
    }
}
