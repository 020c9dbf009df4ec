use crate::core::driver::{Driver, PitStop};

/// (s) During the formation/grid phase pit data is unreliable, no car is reported in the pits.
pub const PIT_GRACE_PERIOD: f64 = 60.0;

pub const UNKNOWN_COMPOUND: &str = "UNKNOWN";

/// PitTyreState is the pit lane and tyre status of a driver at a given race time.
#[derive(Debug, Clone, PartialEq)]
pub struct PitTyreState {
    pub is_in_pit: bool,
    pub compound: String,
    pub tyre_life: Option<f64>,
}

impl PitTyreState {
    pub fn resolve(driver: &Driver, completed_laps: u32, race_time: f64) -> PitTyreState {
        PitTyreState {
            is_in_pit: is_in_pit(driver.pit_stops(), race_time),
            compound: current_compound(driver.pit_stops(), race_time),
            tyre_life: tyre_life(driver, completed_laps),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PitEvent {
    Entry,
    Exit,
}

/// is_in_pit returns true if the most recent pit lane event at or before `race_time` is an
/// entry. An exit recorded at the same instant as an entry counts as the later event.
pub fn is_in_pit(pit_stops: &[PitStop], race_time: f64) -> bool {
    if race_time < PIT_GRACE_PERIOD {
        return false;
    }

    let mut latest: Option<(f64, PitEvent)> = None;

    for stop in pit_stops {
        let events = [
            (stop.pit_in_time, PitEvent::Entry),
            (stop.pit_out_time, PitEvent::Exit),
        ];

        for (t_event, kind) in events {
            let t_event = match t_event {
                Some(t) if t.is_finite() && t <= race_time => t,
                _ => continue,
            };

            let is_later = match latest {
                None => true,
                Some((t_latest, kind_latest)) => {
                    t_event > t_latest
                        || (t_event == t_latest
                            && kind_latest == PitEvent::Entry
                            && kind == PitEvent::Exit)
                }
            };
            if is_later {
                latest = Some((t_event, kind));
            }
        }
    }

    matches!(latest, Some((_, PitEvent::Entry)))
}

/// current_compound returns the starting compound (declared on the first pit record) superseded
/// by the compound of every later record whose exit time has passed.
pub fn current_compound(pit_stops: &[PitStop], race_time: f64) -> String {
    let mut compound = pit_stops
        .first()
        .and_then(|stop| stop.compound.to_owned())
        .unwrap_or_else(|| UNKNOWN_COMPOUND.to_owned());

    for stop in pit_stops.iter().skip(1) {
        let exited = matches!(stop.pit_out_time, Some(t_out) if t_out <= race_time);
        if let (true, Some(fitted)) = (exited, stop.compound.as_ref()) {
            compound = fitted.to_owned();
        }
    }

    compound
}

/// tyre_life returns the tyre age recorded at the end of the most recently completed lap.
pub fn tyre_life(driver: &Driver, completed_laps: u32) -> Option<f64> {
    let idx = (completed_laps as usize).checked_sub(1)?;
    driver.laps().get(idx).and_then(|lap| lap.tyre_life)
}

/// count_pit_stops counts the stops whose pit exit has passed. A start from the pit lane is not
/// a stop.
pub fn count_pit_stops(pit_stops: &[PitStop], race_time: f64) -> u32 {
    pit_stops
        .iter()
        .filter(|stop| matches!(stop.pit_out_time, Some(t_out) if t_out <= race_time))
        .filter(|stop| !stop.is_pitlane_start())
        .count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::driver::{DriverData, Lap};

    fn stop(lap_number: u32, t_in: Option<f64>, t_out: Option<f64>, compound: &str) -> PitStop {
        PitStop {
            lap_number,
            pit_in_time: t_in,
            pit_out_time: t_out,
            compound: Some(compound.to_owned()),
        }
    }

    #[test]
    fn in_pit_between_entry_and_exit() {
        let stops = vec![stop(20, Some(1800.0), Some(1822.0), "HARD")];
        assert!(!is_in_pit(&stops, 1799.0));
        assert!(is_in_pit(&stops, 1800.0));
        assert!(is_in_pit(&stops, 1821.0));
        assert!(!is_in_pit(&stops, 1822.0));
    }

    #[test]
    fn grace_window_hides_pitlane_start() {
        let stops = vec![stop(1, Some(0.0), Some(120.0), "MEDIUM")];
        assert!(!is_in_pit(&stops, 30.0));
        assert!(is_in_pit(&stops, 61.0));
    }

    #[test]
    fn entry_without_exit_stays_in_pit() {
        let stops = vec![stop(33, Some(3000.0), None, "SOFT")];
        assert!(is_in_pit(&stops, 5000.0));
    }

    #[test]
    fn compound_changes_after_pit_exit() {
        let stops = vec![
            stop(1, None, Some(10.0), "MEDIUM"),
            stop(25, Some(2200.0), Some(2222.0), "HARD"),
        ];
        assert_eq!(current_compound(&stops, 100.0), "MEDIUM");
        assert_eq!(current_compound(&stops, 2210.0), "MEDIUM");
        assert_eq!(current_compound(&stops, 2222.0), "HARD");
        assert_eq!(current_compound(&[], 100.0), UNKNOWN_COMPOUND);
    }

    #[test]
    fn pitlane_start_is_not_counted() {
        let stops = vec![
            stop(1, None, Some(10.0), "MEDIUM"),
            stop(25, Some(2200.0), Some(2222.0), "HARD"),
        ];
        assert_eq!(count_pit_stops(&stops, 100.0), 0);
        assert_eq!(count_pit_stops(&stops, 2221.0), 0);
        assert_eq!(count_pit_stops(&stops, 2300.0), 1);
    }

    #[test]
    fn tyre_life_comes_from_last_completed_lap() {
        let driver = Driver::new(
            "AAA",
            &DriverData {
                laps: vec![
                    Lap {
                        lap_number: 1,
                        tyre_life: Some(4.0),
                        ..Default::default()
                    },
                    Lap {
                        lap_number: 2,
                        tyre_life: Some(5.0),
                        ..Default::default()
                    },
                ],
                ..Default::default()
            },
        );
        assert_eq!(tyre_life(&driver, 0), None);
        assert_eq!(tyre_life(&driver, 2), Some(5.0));
    }
}
