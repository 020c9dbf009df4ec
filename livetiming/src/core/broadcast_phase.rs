use crate::core::track_status::TrackStatusSnapshot;
use serde::Serialize;

/// Leader laps after a green flag during which gaps are shown to the leader instead of to the car
/// ahead.
pub const GAP_TO_LEADER_LAPS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BroadcastPhase {
    Hidden,
    GapToLeader,
    Interval,
}

impl Default for BroadcastPhase {
    fn default() -> Self {
        BroadcastPhase::Hidden
    }
}

/// BroadcastPhaseDecider decides which gap column a timing screen shows.
#[derive(Debug, Default)]
pub struct BroadcastPhaseDecider {
    phase: BroadcastPhase,
}

impl BroadcastPhaseDecider {
    pub fn update(&mut self, status: &TrackStatusSnapshot, leader_lap: u32) -> BroadcastPhase {
        self.phase = if status.neutralized || status.green_transition {
            BroadcastPhase::Hidden
        } else if leader_lap == 0 {
            self.phase
        } else {
            let green_lap = status.green_leader_lap.unwrap_or(0);
            if leader_lap.saturating_sub(green_lap) < GAP_TO_LEADER_LAPS {
                BroadcastPhase::GapToLeader
            } else {
                BroadcastPhase::Interval
            }
        };
        self.phase
    }

    pub fn get_phase(&self) -> BroadcastPhase {
        self.phase
    }
}
