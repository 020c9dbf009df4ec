use crate::core::live_timing::TimingError;
use serde::Deserialize;

/// * `total_laps` - Scheduled race distance in laps
/// * `track_length_meters` - (m) Length of one lap, required for all distance math
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SessionPars {
    pub total_laps: u32,
    #[serde(default)]
    pub track_length_meters: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct Track {
    pub total_laps: u32,
    pub length: f64,
}

impl Track {
    /// Validates the session parameters. A missing or non-positive track length is fatal since
    /// distance-to-time conversion is undefined without it.
    pub fn new(session: &SessionPars) -> Result<Track, TimingError> {
        let length = session
            .track_length_meters
            .ok_or(TimingError::MissingTrackLength)?;

        if !(length.is_finite() && length > 0.0) {
            return Err(TimingError::InvalidTrackLength(length));
        }

        Ok(Track {
            total_laps: session.total_laps,
            length,
        })
    }

    /// race_distance returns the distance covered after `completed_laps` full laps plus
    /// `lap_distance` meters into the current lap.
    pub fn race_distance(&self, completed_laps: u32, lap_distance: f64) -> f64 {
        completed_laps as f64 * self.length + lap_distance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_track_length_is_fatal() {
        let pars = SessionPars {
            total_laps: 50,
            track_length_meters: None,
        };
        assert!(matches!(Track::new(&pars), Err(TimingError::MissingTrackLength)));
    }

    #[test]
    fn non_positive_track_length_is_rejected() {
        let pars = SessionPars {
            total_laps: 50,
            track_length_meters: Some(0.0),
        };
        assert!(matches!(
            Track::new(&pars),
            Err(TimingError::InvalidTrackLength(_))
        ));
    }

    #[test]
    fn race_distance_adds_full_laps() {
        let track = Track::new(&SessionPars {
            total_laps: 3,
            track_length_meters: Some(5000.0),
        })
        .unwrap();
        assert_eq!(track.race_distance(2, 1250.0), 11250.0);
    }
}
