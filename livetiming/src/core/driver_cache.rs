/// DriverCache holds everything the timing computer remembers about one driver between ticks.
/// It is owned by `LiveTiming` and never shared.
#[derive(Debug, Default, Clone)]
pub struct DriverCache {
    // progress memory
    race_distance: f64,
    completed_laps: u32,
    cur_lap: Option<u32>,
    cur_sector: Option<u8>,
    // gap memory
    gap: Option<f64>,
    valid_gap: Option<f64>,
    recovery_lock: bool,
}

impl DriverCache {
    /// clamp_completed_laps keeps the completed lap count non-decreasing.
    pub fn clamp_completed_laps(&mut self, completed_laps: u32) -> u32 {
        self.completed_laps = self.completed_laps.max(completed_laps);
        self.completed_laps
    }

    /// clamp_race_distance keeps the race distance non-decreasing.
    pub fn clamp_race_distance(&mut self, race_distance: f64) -> f64 {
        if race_distance > self.race_distance {
            self.race_distance = race_distance;
        }
        self.race_distance
    }

    /// update_sector stores the current lap and sector and returns true on a sector edge within
    /// the same lap.
    pub fn update_sector(&mut self, cur_lap: u32, cur_sector: u8) -> bool {
        let edge = matches!(
            (self.cur_lap, self.cur_sector),
            (Some(lap_prev), Some(sector_prev)) if lap_prev == cur_lap && cur_sector > sector_prev
        );
        self.cur_lap = Some(cur_lap);
        self.cur_sector = Some(cur_sector);
        edge
    }

    /// get_gap returns the gap emitted on the previous tick.
    pub fn get_gap(&self) -> Option<f64> {
        self.gap
    }

    pub fn set_gap(&mut self, gap: Option<f64>) {
        self.gap = gap;
    }

    /// get_valid_gap returns the last gap computed from valid timing data.
    pub fn get_valid_gap(&self) -> Option<f64> {
        self.valid_gap
    }

    pub fn store_valid_gap(&mut self, gap: f64) {
        if gap.is_finite() {
            self.valid_gap = Some(gap);
        }
    }

    /// act_recovery_lock returns true if the lock was not active before.
    pub fn act_recovery_lock(&mut self) -> bool {
        let newly = !self.recovery_lock;
        self.recovery_lock = true;
        newly
    }

    /// deact_recovery_lock returns true if the lock was active before.
    pub fn deact_recovery_lock(&mut self) -> bool {
        let was = self.recovery_lock;
        self.recovery_lock = false;
        was
    }

    pub fn is_recovery_locked(&self) -> bool {
        self.recovery_lock
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn race_distance_never_regresses() {
        let mut cache = DriverCache::default();
        assert_eq!(cache.clamp_race_distance(100.0), 100.0);
        assert_eq!(cache.clamp_race_distance(80.0), 100.0);
        assert_eq!(cache.clamp_race_distance(120.0), 120.0);
    }

    #[test]
    fn sector_edge_only_within_same_lap() {
        let mut cache = DriverCache::default();
        assert!(!cache.update_sector(1, 1));
        assert!(cache.update_sector(1, 2));
        assert!(!cache.update_sector(1, 2));
        assert!(!cache.update_sector(2, 1));
    }

    #[test]
    fn recovery_lock_reports_transitions() {
        let mut cache = DriverCache::default();
        assert!(cache.act_recovery_lock());
        assert!(!cache.act_recovery_lock());
        assert!(cache.is_recovery_locked());
        assert!(cache.deact_recovery_lock());
        assert!(!cache.deact_recovery_lock());
    }
}
