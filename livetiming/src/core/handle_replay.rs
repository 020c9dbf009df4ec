use crate::core::broadcast_phase::BroadcastPhaseDecider;
use crate::core::leaderboard::{LeaderboardProjector, LeaderboardView};
use crate::core::live_timing::{LiveDriverState, LiveTiming, TimingError};
use crate::core::presence::{DriverPresence, RetirementSchedule};
use crate::core::track_status::{StatusFrame, TrackStatusResolver};
use crate::interfaces::frame_interface::{ReplayFrame, MAX_FRAME_UPDATE_FREQUENCY};
use crate::post::race_result::RaceResult;
use crate::pre::read_race_data::RaceData;
use anyhow::Context;
use flume::Sender;
use log::{info, warn};
use std::collections::BTreeMap;
use std::thread::sleep;
use std::time::{Duration, Instant};

/// ReplaySession composes the timing computer, the track status resolver, the broadcast phase and
/// the leaderboard projector. Each tick runs them in that order.
pub struct ReplaySession {
    timing: LiveTiming,
    track_status: TrackStatusResolver,
    phase_decider: BroadcastPhaseDecider,
    leaderboard: LeaderboardProjector,
    presence: Box<dyn DriverPresence + Send>,
    lap_gaps: BTreeMap<String, Vec<Option<f64>>>,
    lap_gaps_seeded: bool,
    last_view: LeaderboardView,
}

impl ReplaySession {
    pub fn new(
        race_data: &RaceData,
        status_frames: &[StatusFrame],
        presence: Box<dyn DriverPresence + Send>,
    ) -> Result<ReplaySession, TimingError> {
        let timing = LiveTiming::new(race_data)?;
        let leaderboard = LeaderboardProjector::new(timing.get_drivers(), timing.get_track().total_laps);

        Ok(ReplaySession {
            lap_gaps: timing
                .get_drivers()
                .map(|driver| (driver.code.to_owned(), Vec::new()))
                .collect(),
            lap_gaps_seeded: false,
            track_status: TrackStatusResolver::new(status_frames),
            phase_decider: BroadcastPhaseDecider::default(),
            leaderboard,
            presence,
            last_view: LeaderboardView::default(),
            timing,
        })
    }

    /// tick advances the session to `race_time` using the current wall clock for arrow decay.
    pub fn tick(&mut self, race_time: f64) -> Result<ReplayFrame, TimingError> {
        self.tick_at(race_time, Instant::now())
    }

    pub fn tick_at(&mut self, race_time: f64, now: Instant) -> Result<ReplayFrame, TimingError> {
        // the status resolver records the leader lap of the previous tick on green transitions
        let status = self.track_status.resolve(race_time, self.timing.leader_lap());
        let states = self.timing.recompute(race_time, status.neutralized)?;
        self.record_lap_gaps(&states);

        let phase = self.phase_decider.update(&status, self.timing.leader_lap());
        let view = self
            .leaderboard
            .project(&states, race_time, &*self.presence, now, phase);
        self.last_view = view.to_owned();

        Ok(ReplayFrame {
            race_time,
            track_status: status,
            states,
            leaderboard: view,
            final_result: None,
        })
    }

    /// record_lap_gaps stores each driver's gap for every leader lap completed since the last call.
    /// Laps completed before the first tick stay empty.
    fn record_lap_gaps(&mut self, states: &[LiveDriverState]) {
        let leader_compl_laps = match states.iter().find(|state| state.is_leader) {
            Some(leader) => leader.completed_laps as usize,
            None => return,
        };
        let seeded = std::mem::replace(&mut self.lap_gaps_seeded, true);

        for state in states {
            let gaps = self.lap_gaps.entry(state.driver.to_owned()).or_default();
            while gaps.len() < leader_compl_laps {
                gaps.push(if seeded { state.gap_to_leader } else { None });
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.timing.is_race_finished()
    }

    pub fn get_timing(&self) -> &LiveTiming {
        &self.timing
    }

    pub fn get_leaderboard(&self) -> &LeaderboardView {
        &self.last_view
    }

    pub fn get_race_result(&self) -> RaceResult {
        RaceResult::from_view(&self.last_view, self.is_finished(), self.lap_gaps.to_owned())
    }
}

/// handle_replay replays a recorded session tick by tick (one race second per tick) and returns
/// the result for post-processing. If a sender is inserted, the replay runs in real time (scaled
/// by `speed`) and every frame is sent to the consumer.
pub fn handle_replay(
    race_data: &RaceData,
    status_frames: &[StatusFrame],
    retirements: &BTreeMap<String, f64>,
    start_second: f64,
    print_debug: bool,
    tx: Option<&Sender<ReplayFrame>>,
    speed: f64,
) -> anyhow::Result<RaceResult> {
    let mut session = ReplaySession::new(
        race_data,
        status_frames,
        Box::new(RetirementSchedule::new(retirements.to_owned())),
    )
    .context("Failed to set up the replay session!")?;

    let t_end = session.get_timing().last_recorded_time().floor() + 1.0;
    let mut race_time = start_second.max(0.0).floor();
    let mut frames_after_finish = 0u32;
    let mut last_printed_lap = 0u32;

    // t_frame_update holds the wall clock of the last frame sent to the consumer
    let mut t_frame_update: Option<Instant> = None;
    let mut last_frame: ReplayFrame;

    loop {
        let t_start = Instant::now();
        let frame = session
            .tick(race_time)
            .context(format!("Replay failed at race second {}!", race_time))?;

        if print_debug && frame.leaderboard.leader_lap > last_printed_lap {
            info!(
                "Replaying... race time is {:.0}s, leader is on lap {}",
                race_time, frame.leaderboard.leader_lap
            );
            last_printed_lap = frame.leaderboard.leader_lap;
        }

        if let Some(tx) = tx {
            let due = t_frame_update.map_or(true, |t| {
                t.elapsed().as_secs_f64() >= 1.0 / MAX_FRAME_UPDATE_FREQUENCY - 0.001
            });
            if due {
                tx.send(frame.to_owned())
                    .context("Failed to send replay frame to consumer!")?;
                t_frame_update = Some(Instant::now());
            }
        }
        last_frame = frame;

        if session.is_finished() {
            frames_after_finish += 1;
        }
        if frames_after_finish > 1 || race_time >= t_end {
            break;
        }
        race_time += 1.0;

        // sleep until the tick is finished in real time as well (calculation in ms)
        if tx.is_some() {
            let t_sleep =
                (1000.0 / speed) as i64 - t_start.elapsed().as_millis() as i64;
            if t_sleep > 0 {
                sleep(Duration::from_millis(t_sleep as u64));
            } else {
                warn!("Could not keep up with real-time!");
            }
        }
    }

    let result = session.get_race_result();
    if result.finished {
        info!("Replay finished at race second {:.0}", race_time);
    } else {
        info!(
            "Replay reached the end of the record at race second {:.0} before the race was finished",
            race_time
        );
    }

    // after the loop finishes, send the final result once
    if let Some(tx) = tx {
        let mut frame = last_frame;
        frame.final_result = Some(result.to_owned());
        tx.send(frame)
            .context("Failed to send final replay result to consumer!")?;
    }

    Ok(result)
}
