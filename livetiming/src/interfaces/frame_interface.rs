use crate::core::leaderboard::LeaderboardView;
use crate::core::live_timing::LiveDriverState;
use crate::core::track_status::TrackStatusSnapshot;
use crate::post::race_result::RaceResult;
use serde::Serialize;

/// (Hz) Upper bound for frames sent to a consumer in real-time mode.
pub const MAX_FRAME_UPDATE_FREQUENCY: f64 = 20.0;

/// ReplayFrame is everything a presentation layer needs for one tick.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayFrame {
    pub race_time: f64,
    pub track_status: TrackStatusSnapshot,

    // authoritative timing state in display order
    pub states: Vec<LiveDriverState>,
    pub leaderboard: LeaderboardView,

    // final results payload (sent once when the replay ends)
    pub final_result: Option<RaceResult>,
}
