//! The end-to-end check: echo a greeting, then sample Mount Everest.

use anyhow::{Result, bail};

use crate::client::Session;
use crate::expression::LonLat;

pub const GREETING: &str = "Greetings from the Earth Engine servers!";

/// SRTM 1 arc-second global elevation.
pub const SRTM_DATASET: &str = "USGS/SRTMGL1_003";

pub const EVEREST: LonLat = LonLat::new(86.9250, 27.9881);

#[derive(Debug, Clone)]
pub struct SmokeTest {
    pub greeting: String,
    pub dataset: String,
    pub point: LonLat,
    /// Sampling scale in metres.
    pub scale: f64,
    pub band: String,
}

impl Default for SmokeTest {
    fn default() -> Self {
        Self {
            greeting: GREETING.to_string(),
            dataset: SRTM_DATASET.to_string(),
            point: EVEREST,
            scale: 30.0,
            band: "elevation".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SmokeReport {
    pub greeting: String,
    pub elevation: f64,
}

impl SmokeTest {
    /// Runs both calls against an initialized session and verifies the result.
    pub fn run(&self, session: &Session) -> Result<SmokeReport> {
        let greeting = session.echo(&self.greeting)?;
        if greeting != self.greeting {
            bail!(
                "echo mismatch: sent {:?}, received {:?}",
                self.greeting,
                greeting
            );
        }
        tracing::info!(%greeting, "echo round trip ok");

        let elevation =
            session.sample_point(&self.dataset, self.point, self.scale, &self.band)?;
        tracing::info!(
            dataset = %self.dataset,
            lon = self.point.lon,
            lat = self.point.lat,
            elevation,
            "sampled elevation"
        );
        verify_elevation(elevation)?;

        Ok(SmokeReport {
            greeting,
            elevation,
        })
    }
}

pub fn verify_elevation(elevation: f64) -> Result<()> {
    // NaN fails too.
    if !(elevation > 0.0) {
        bail!(
            "Error: Elevation should be a positive number (got {}).",
            elevation
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_elevation_passes() {
        assert!(verify_elevation(8729.0).is_ok());
        assert!(verify_elevation(0.001).is_ok());
    }

    #[test]
    fn non_positive_elevation_fails() {
        for v in [0.0, -0.0, -12.5, f64::NAN, f64::NEG_INFINITY] {
            let err = verify_elevation(v).unwrap_err();
            assert!(err.to_string().contains("Elevation should be a positive number"));
        }
    }

    #[test]
    fn default_targets_everest_on_srtm() {
        let t = SmokeTest::default();
        assert_eq!(t.dataset, "USGS/SRTMGL1_003");
        assert_eq!(t.point, LonLat::new(86.925, 27.9881));
        assert_eq!(t.scale, 30.0);
        assert_eq!(t.band, "elevation");
    }
}
