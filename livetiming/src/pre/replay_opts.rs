use clap::Parser;
use helpers::general::InputValueError;
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[clap(
    version = "0.1.0",
    author = "Alexander Heilmeier <alexander.heilmeier@tum.de>",
    name = "LT-RS",
    about = "Live timing replay of recorded race sessions written in Rust"
)]
pub struct ReplayOpts {
    // FLAGS ---------------------------------------------------------------------------------------
    /// Activate debug printing
    #[clap(short, long)]
    pub debug: bool,

    /// Replay in real time and stream every tick to the console
    #[clap(long)]
    pub realtime: bool,

    /// Write a PNG chart of the gaps to the leader per lap to output/
    #[clap(long)]
    pub plot: bool,

    // OPTIONS -------------------------------------------------------------------------------------
    /// Set path to the race data file (session parameters, laps and pit stops per driver)
    #[clap(short, long)]
    pub race_data: PathBuf,

    /// Set path to the track status timeline file
    #[clap(short, long)]
    pub track_status: Option<PathBuf>,

    /// Set path to the retirement file (driver code -> race second from which the driver is out)
    #[clap(long)]
    pub retirements: Option<PathBuf>,

    /// Set the track length in meters (overrides the value of the race data file)
    #[clap(short = 'l', long)]
    pub track_length: Option<f64>,

    /// Set replay speed factor, one tick lasts 1000ms / speed (only relevant in real-time mode)
    #[clap(short, long, default_value = "1.0")]
    pub speed: f64,

    /// Set race second at which the replay starts
    #[clap(long, default_value = "0")]
    pub start_second: f64,

    /// Set path of the classification CSV file (default output/classification.csv)
    #[clap(short, long)]
    pub output: Option<PathBuf>,
}

impl ReplayOpts {
    /// check_opts checks the option values for plausibility.
    pub fn check_opts(&self) -> Result<(), InputValueError> {
        if !(self.speed.is_finite() && self.speed > 0.0) {
            return Err(InputValueError::new("replay speed must be positive"));
        }
        if !(self.start_second.is_finite() && self.start_second >= 0.0) {
            return Err(InputValueError::new("start second must not be negative"));
        }
        if let Some(track_length) = self.track_length {
            if !(track_length.is_finite() && track_length > 0.0) {
                return Err(InputValueError::new("track length must be positive"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let opts = ReplayOpts::parse_from(["lt-rs", "--race-data", "race.json"]);
        assert!(opts.check_opts().is_ok());
        assert_eq!(opts.speed, 1.0);
        assert!(!opts.realtime);
    }

    #[test]
    fn non_positive_speed_is_rejected() {
        let opts = ReplayOpts::parse_from(["lt-rs", "-r", "race.json", "--speed", "0"]);
        assert!(opts.check_opts().is_err());
    }

    #[test]
    fn non_positive_track_length_is_rejected() {
        let opts = ReplayOpts::parse_from(["lt-rs", "-r", "race.json", "-l", "0"]);
        assert!(opts.check_opts().is_err());
    }
}
