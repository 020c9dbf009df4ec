use crate::core::driver::DriverData;
use crate::core::track::SessionPars;
use crate::core::track_status::StatusFrame;
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::Path;

/// RaceData is the static record of one race session, loaded once.
#[derive(Debug, Deserialize, Clone)]
pub struct RaceData {
    pub session: SessionPars,
    pub drivers: BTreeMap<String, DriverData>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TrackStatusFile {
    pub track_status_data: Vec<StatusFrame>,
}

fn read_json<T: DeserializeOwned>(filepath: &Path, what: &str) -> anyhow::Result<T> {
    let fh = OpenOptions::new()
        .read(true)
        .open(filepath)
        .context(format!(
            "Failed to open {} file {}!",
            what,
            filepath.display()
        ))?;
    let pars = serde_json::from_reader(&fh).context(format!(
        "Failed to parse {} file {}!",
        what,
        filepath.display()
    ))?;
    Ok(pars)
}

/// read_race_data reads the JSON file and decodes it into the static race record.
pub fn read_race_data(filepath: &Path) -> anyhow::Result<RaceData> {
    read_json(filepath, "race data")
}

/// read_track_status reads the flag timeline of a session.
pub fn read_track_status(filepath: &Path) -> anyhow::Result<Vec<StatusFrame>> {
    let file: TrackStatusFile = read_json(filepath, "track status")?;
    Ok(file.track_status_data)
}

/// read_retirements reads a map of driver code to the race second from which the driver is
/// absent from telemetry.
pub fn read_retirements(filepath: &Path) -> anyhow::Result<BTreeMap<String, f64>> {
    read_json(filepath, "retirements")
}
