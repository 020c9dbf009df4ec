pub mod core {
    pub mod broadcast_phase;
    pub mod driver;
    pub mod driver_cache;
    pub mod handle_replay;
    pub mod leaderboard;
    pub mod live_timing;
    pub mod pit_tyre;
    pub mod presence;
    pub mod sector_anchors;
    pub mod track;
    pub mod track_status;
}
pub mod interfaces {
    pub mod frame_interface;
}
pub mod post {
    pub mod race_result;
}
pub mod pre {
    pub mod read_race_data;
    pub mod replay_opts;
}
