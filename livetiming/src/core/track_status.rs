use log::info;
use serde::{Deserialize, Serialize};

/// (s) A green flag is shown for this long before the display clears.
pub const GREEN_DISPLAY_DURATION: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackStatus {
    Green,
    Yellow,
    SafetyCar,
    VirtualSafetyCar,
    VirtualSafetyCarEnding,
    Red,
}

impl TrackStatus {
    /// from_feed_code maps the numeric status of the recorded timing feed.
    pub fn from_feed_code(code: i32) -> Option<TrackStatus> {
        match code {
            1 => Some(TrackStatus::Green),
            2 => Some(TrackStatus::Yellow),
            4 => Some(TrackStatus::SafetyCar),
            5 => Some(TrackStatus::Red),
            6 => Some(TrackStatus::VirtualSafetyCar),
            7 => Some(TrackStatus::VirtualSafetyCarEnding),
            _ => None,
        }
    }

    /// is_neutralizing returns true for every status that suspends live gap computation.
    pub fn is_neutralizing(&self) -> bool {
        !matches!(self, TrackStatus::Green)
    }

    pub fn label(&self) -> &'static str {
        match self {
            TrackStatus::Green => "GREEN FLAG",
            TrackStatus::Yellow => "YELLOW FLAG",
            TrackStatus::SafetyCar => "SAFETY CAR",
            TrackStatus::VirtualSafetyCar => "VIRTUAL SAFETY CAR",
            TrackStatus::VirtualSafetyCarEnding => "VSC ENDING",
            TrackStatus::Red => "RED FLAG",
        }
    }
}

/// StatusFrame is one entry of the recorded flag timeline.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StatusFrame {
    pub race_second: f64,
    pub track_status: i32,
}

/// * `active` - Status in force at the resolved race time
/// * `displayed` - Status to show externally (initial green hidden, green clears after a delay)
/// * `neutralized` - True while live gaps must be pinned
/// * `green_transition` - One-shot pulse on the tick a green period starts
/// * `green_leader_lap` - Leader lap recorded at the latest green transition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackStatusSnapshot {
    pub active: Option<TrackStatus>,
    pub displayed: Option<TrackStatus>,
    pub neutralized: bool,
    pub green_transition: bool,
    pub green_leader_lap: Option<u32>,
}

#[derive(Debug, Default)]
pub struct TrackStatusResolver {
    timeline: Vec<(f64, Option<TrackStatus>)>,
    last_status: Option<TrackStatus>,
    resolved_any: bool,
    displayed: Option<TrackStatus>,
    green_display_until: Option<f64>,
    green_leader_lap: Option<u32>,
}

impl TrackStatusResolver {
    pub fn new(frames: &[StatusFrame]) -> TrackStatusResolver {
        let mut timeline: Vec<(f64, Option<TrackStatus>)> = frames
            .iter()
            .filter(|frame| frame.race_second.is_finite())
            .map(|frame| {
                (
                    frame.race_second,
                    TrackStatus::from_feed_code(frame.track_status),
                )
            })
            .collect();
        timeline.sort_by(|a, b| a.0.total_cmp(&b.0));

        TrackStatusResolver {
            timeline,
            ..Default::default()
        }
    }

    /// status_at returns the last timeline status at or before `race_time`.
    pub fn status_at(&self, race_time: f64) -> Option<TrackStatus> {
        let idx = self
            .timeline
            .partition_point(|(race_second, _)| *race_second <= race_time);
        if idx == 0 {
            None
        } else {
            self.timeline[idx - 1].1
        }
    }

    /// resolve advances the resolver to `race_time`. `leader_lap` is recorded on green
    /// transitions.
    pub fn resolve(&mut self, race_time: f64, leader_lap: u32) -> TrackStatusSnapshot {
        let active = self.status_at(race_time);
        let mut green_transition = false;

        if !self.resolved_any || active != self.last_status {
            let had_status = self.last_status.is_some();
            self.resolved_any = true;
            self.last_status = active;
            self.green_display_until = None;

            match active {
                Some(TrackStatus::Green) => {
                    green_transition = true;
                    self.green_leader_lap = Some(leader_lap);

                    // green at the very start is never shown
                    if had_status {
                        self.displayed = Some(TrackStatus::Green);
                        self.green_display_until = Some(race_time + GREEN_DISPLAY_DURATION);
                        info!("Green flag at {:.0}s on leader lap {}", race_time, leader_lap);
                    } else {
                        self.displayed = None;
                    }
                }
                other => {
                    if let Some(status) = other {
                        info!("{} at {:.0}s", status.label(), race_time);
                    }
                    self.displayed = other;
                }
            }
        }

        if let Some(t_clear) = self.green_display_until {
            if race_time >= t_clear {
                self.displayed = None;
                self.green_display_until = None;
            }
        }

        TrackStatusSnapshot {
            active,
            displayed: self.displayed,
            neutralized: active.map_or(false, |status| status.is_neutralizing()),
            green_transition,
            green_leader_lap: self.green_leader_lap,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(entries: &[(f64, i32)]) -> Vec<StatusFrame> {
        entries
            .iter()
            .map(|&(race_second, track_status)| StatusFrame {
                race_second,
                track_status,
            })
            .collect()
    }

    #[test]
    fn initial_green_is_hidden_but_pulses() {
        let mut resolver = TrackStatusResolver::new(&frames(&[(0.0, 1)]));
        let snap = resolver.resolve(0.0, 1);
        assert_eq!(snap.active, Some(TrackStatus::Green));
        assert_eq!(snap.displayed, None);
        assert!(snap.green_transition);
        assert!(!snap.neutralized);

        let snap = resolver.resolve(1.0, 1);
        assert!(!snap.green_transition);
    }

    #[test]
    fn restart_green_clears_after_delay() {
        let mut resolver = TrackStatusResolver::new(&frames(&[(0.0, 1), (100.0, 4), (300.0, 1)]));
        resolver.resolve(0.0, 1);

        let snap = resolver.resolve(150.0, 3);
        assert_eq!(snap.displayed, Some(TrackStatus::SafetyCar));
        assert!(snap.neutralized);

        let snap = resolver.resolve(300.0, 5);
        assert!(snap.green_transition);
        assert_eq!(snap.displayed, Some(TrackStatus::Green));
        assert_eq!(snap.green_leader_lap, Some(5));

        let snap = resolver.resolve(304.0, 5);
        assert_eq!(snap.displayed, Some(TrackStatus::Green));
        let snap = resolver.resolve(305.0, 5);
        assert_eq!(snap.displayed, None);
        assert!(!snap.neutralized);
    }

    #[test]
    fn vsc_ending_is_shown_and_neutralizing() {
        let mut resolver = TrackStatusResolver::new(&frames(&[(0.0, 1), (50.0, 6), (80.0, 7)]));
        resolver.resolve(0.0, 1);
        let snap = resolver.resolve(85.0, 2);
        assert_eq!(snap.displayed, Some(TrackStatus::VirtualSafetyCarEnding));
        assert!(snap.neutralized);
    }

    #[test]
    fn no_status_before_first_entry() {
        let mut resolver = TrackStatusResolver::new(&frames(&[(10.0, 2)]));
        let snap = resolver.resolve(5.0, 1);
        assert_eq!(snap.active, None);
        assert!(!snap.neutralized);
        assert!(resolver.resolve(10.0, 1).neutralized);
    }

    #[test]
    fn unknown_feed_codes_map_to_none() {
        assert_eq!(TrackStatus::from_feed_code(3), None);
        assert_eq!(TrackStatus::from_feed_code(5), Some(TrackStatus::Red));
    }
}
