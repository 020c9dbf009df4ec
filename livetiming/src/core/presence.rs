use std::collections::{BTreeMap, HashSet};

/// DriverPresence tells whether a driver has dropped out of the telemetry feed.
pub trait DriverPresence {
    fn is_absent(&self, driver: &str, race_time: f64) -> bool;
}

/// FramePresenceTracker compares the drivers of consecutive telemetry frames. A driver that was
/// present in the previous frame and is missing from the current one is out for good.
#[derive(Debug, Default)]
pub struct FramePresenceTracker {
    active: HashSet<String>,
    out: HashSet<String>,
}

impl FramePresenceTracker {
    /// update must be called once per telemetry frame with the driver codes of that frame.
    pub fn update<'a, I>(&mut self, frame_drivers: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let present: HashSet<String> = frame_drivers.into_iter().map(str::to_owned).collect();

        for driver in self.active.iter() {
            if !present.contains(driver) {
                self.out.insert(driver.to_owned());
            }
        }
        self.active = present;
    }

    pub fn is_out(&self, driver: &str) -> bool {
        self.out.contains(driver)
    }
}

impl DriverPresence for FramePresenceTracker {
    fn is_absent(&self, driver: &str, _race_time: f64) -> bool {
        self.is_out(driver)
    }
}

/// RetirementSchedule marks drivers absent from a fixed race second on.
#[derive(Debug, Default, Clone)]
pub struct RetirementSchedule {
    retirements: BTreeMap<String, f64>,
}

impl RetirementSchedule {
    pub fn new(retirements: BTreeMap<String, f64>) -> RetirementSchedule {
        RetirementSchedule { retirements }
    }
}

impl DriverPresence for RetirementSchedule {
    fn is_absent(&self, driver: &str, race_time: f64) -> bool {
        matches!(self.retirements.get(driver), Some(&t_out) if race_time >= t_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disappearing_driver_stays_out() {
        let mut tracker = FramePresenceTracker::default();
        tracker.update(["VER", "HAM", "LEC"]);
        tracker.update(["VER", "LEC"]);
        assert!(tracker.is_absent("HAM", 0.0));
        tracker.update(["VER", "HAM", "LEC"]);
        assert!(tracker.is_absent("HAM", 0.0));
        assert!(!tracker.is_absent("VER", 0.0));
    }

    #[test]
    fn never_seen_driver_is_not_out() {
        let mut tracker = FramePresenceTracker::default();
        tracker.update(["VER"]);
        assert!(!tracker.is_absent("SAR", 0.0));
    }

    #[test]
    fn schedule_applies_from_retirement_second() {
        let schedule = RetirementSchedule::new([("ALB".to_owned(), 500.0)].into_iter().collect());
        assert!(!schedule.is_absent("ALB", 499.0));
        assert!(schedule.is_absent("ALB", 500.0));
        assert!(!schedule.is_absent("VER", 1000.0));
    }
}
