use serde::Deserialize;

/// * `lap_number` - Lap number, 1-based
/// * `lap_start_time` - (s) Absolute race time at which the lap started
/// * `lap_time` - (s) Lap duration, a missing or non-positive value marks the lap as untimed
/// * `sector_times` - (s) Sector durations S1..S3, S1 may be null on a driver's first lap
/// * `position_at_lap_end` - Official classification at the end of the lap
/// * `tyre_life` - (laps) Age of the fitted tyre set at the end of the lap
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Lap {
    pub lap_number: u32,
    #[serde(default)]
    pub lap_start_time: Option<f64>,
    #[serde(default)]
    pub lap_time: Option<f64>,
    #[serde(default)]
    pub sector_times: Vec<Option<f64>>,
    #[serde(default)]
    pub position_at_lap_end: Option<u32>,
    #[serde(default)]
    pub tyre_life: Option<f64>,
}

impl Lap {
    /// is_timed returns true if the lap can serve as a timing reference.
    pub fn is_timed(&self) -> bool {
        matches!(self.lap_start_time, Some(t) if t.is_finite())
            && matches!(self.lap_time, Some(t) if t.is_finite() && t > 0.0)
    }

    /// end_time returns the absolute race time at which the lap was completed (timed laps only).
    pub fn end_time(&self) -> Option<f64> {
        if self.is_timed() {
            Some(self.lap_start_time? + self.lap_time?)
        } else {
            None
        }
    }

    /// sector_time returns the duration of sector 1, 2 or 3 if it was recorded.
    pub fn sector_time(&self, sector: u8) -> Option<f64> {
        if !(1..=3).contains(&sector) {
            return None;
        }
        self.sector_times
            .get(sector as usize - 1)
            .copied()
            .flatten()
            .filter(|t| t.is_finite() && *t >= 0.0)
    }

    /// sector_at returns the sector a car is in after `elapsed` seconds into this lap. Without a
    /// sector 1 time the lap cannot be split and sector 1 is reported.
    pub fn sector_at(&self, elapsed: f64) -> u8 {
        let s1 = match self.sector_time(1) {
            Some(s1) => s1,
            None => return 1,
        };
        if elapsed < s1 {
            return 1;
        }
        match self.sector_time(2) {
            Some(s2) if elapsed >= s1 + s2 => 3,
            _ => 2,
        }
    }
}

/// * `lap_number` - In-lap of the pit event
/// * `pit_in_time` - (s) Pit lane entry, absent for a start from the pit lane
/// * `pit_out_time` - (s) Pit lane exit, absent if the car never left (e.g. retirement in the pits)
/// * `compound` - Tyre compound fitted during this stop
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct PitStop {
    pub lap_number: u32,
    #[serde(default)]
    pub pit_in_time: Option<f64>,
    #[serde(default)]
    pub pit_out_time: Option<f64>,
    #[serde(default)]
    pub compound: Option<String>,
}

impl PitStop {
    /// is_pitlane_start returns true for the lap-1 record without an entry time, which marks a
    /// race start from the pit lane rather than a stop.
    pub fn is_pitlane_start(&self) -> bool {
        self.lap_number == 1 && self.pit_in_time.is_none()
    }
}

/// * `driver_number` - Car number, e.g. "44"
/// * `team` - Team name
/// * `laps` - Recorded laps
/// * `pit_stops` - Recorded pit lane events in order of occurrence
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct DriverData {
    pub driver_number: String,
    pub team: String,
    #[serde(default)]
    pub laps: Vec<Lap>,
    #[serde(default)]
    pub pit_stops: Vec<PitStop>,
}

#[derive(Debug, Clone)]
pub struct Driver {
    pub code: String,
    pub number: String,
    pub team: String,
    laps: Vec<Lap>,
    pit_stops: Vec<PitStop>,
}

impl Driver {
    pub fn new(code: &str, driver_data: &DriverData) -> Driver {
        let mut laps = driver_data.laps.to_owned();
        laps.sort_by_key(|lap| lap.lap_number);

        let mut pit_stops = driver_data.pit_stops.to_owned();
        pit_stops.sort_by_key(|stop| stop.lap_number);

        Driver {
            code: code.to_owned(),
            number: driver_data.driver_number.to_owned(),
            team: driver_data.team.to_owned(),
            laps,
            pit_stops,
        }
    }

    pub fn laps(&self) -> &[Lap] {
        &self.laps
    }

    pub fn pit_stops(&self) -> &[PitStop] {
        &self.pit_stops
    }

    /// completed_laps counts the timed laps that ended at or before `race_time`.
    pub fn completed_laps(&self, race_time: f64) -> u32 {
        self.laps
            .iter()
            .filter(|lap| matches!(lap.end_time(), Some(t_end) if t_end <= race_time))
            .count() as u32
    }

    /// timed_lap_at returns the lap at the given 0-based index if it is timed.
    pub fn timed_lap_at(&self, idx: usize) -> Option<&Lap> {
        self.laps.get(idx).filter(|lap| lap.is_timed())
    }

    /// lap_end_at returns the completion time of the lap at the given 0-based index.
    pub fn lap_end_at(&self, idx: usize) -> Option<f64> {
        self.laps.get(idx).and_then(|lap| lap.end_time())
    }

    /// reference_lap returns the lap used for distance and sector reconstruction: the current lap
    /// record if there is one, else the previous lap record. The returned lap may be untimed.
    pub fn reference_lap(&self, completed_laps: u32) -> Option<&Lap> {
        let idx = completed_laps as usize;
        self.laps
            .get(idx)
            .or_else(|| idx.checked_sub(1).and_then(|prev| self.laps.get(prev)))
    }

    /// current_lap_timed returns true if the lap the driver is currently on has valid timing.
    pub fn current_lap_timed(&self, completed_laps: u32) -> bool {
        self.timed_lap_at(completed_laps as usize).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lap(lap_number: u32, start: f64, duration: f64) -> Lap {
        Lap {
            lap_number,
            lap_start_time: Some(start),
            lap_time: Some(duration),
            sector_times: vec![Some(30.0), Some(30.0), Some(duration - 60.0)],
            ..Default::default()
        }
    }

    #[test]
    fn untimed_laps_never_count_as_completed() {
        let data = DriverData {
            driver_number: "1".to_owned(),
            team: "Team".to_owned(),
            laps: vec![
                lap(1, 0.0, 90.0),
                Lap {
                    lap_number: 2,
                    lap_start_time: Some(90.0),
                    lap_time: Some(0.0),
                    ..Default::default()
                },
            ],
            pit_stops: vec![],
        };
        let driver = Driver::new("AAA", &data);
        assert_eq!(driver.completed_laps(1000.0), 1);
        assert!(!driver.current_lap_timed(1));
        assert_eq!(driver.reference_lap(1).map(|l| l.lap_number), Some(2));
        assert_eq!(driver.reference_lap(2).map(|l| l.lap_number), Some(2));
    }

    #[test]
    fn laps_are_sorted_by_lap_number() {
        let data = DriverData {
            laps: vec![lap(2, 90.0, 90.0), lap(1, 0.0, 90.0)],
            ..Default::default()
        };
        let driver = Driver::new("AAA", &data);
        assert_eq!(driver.laps()[0].lap_number, 1);
        assert_eq!(driver.lap_end_at(1), Some(180.0));
    }

    #[test]
    fn missing_first_sector_reports_sector_one() {
        let first = Lap {
            lap_number: 1,
            lap_start_time: Some(0.0),
            lap_time: Some(95.0),
            sector_times: vec![None, Some(30.0), Some(30.0)],
            ..Default::default()
        };
        assert_eq!(first.sector_at(0.0), 1);
        assert_eq!(first.sector_at(80.0), 1);
    }

    #[test]
    fn sector_follows_cumulative_sector_times() {
        let l = lap(3, 180.0, 90.0);
        assert_eq!(l.sector_at(10.0), 1);
        assert_eq!(l.sector_at(30.0), 2);
        assert_eq!(l.sector_at(65.0), 3);
    }
}
