use crate::core::driver::Driver;
use crate::core::driver_cache::DriverCache;
use crate::core::pit_tyre::PitTyreState;
use crate::core::sector_anchors::SectorAnchorIndex;
use crate::core::track::Track;
use crate::pre::read_race_data::RaceData;
use log::{debug, info};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, thiserror::Error)]
pub enum TimingError {
    #[error("track length not available, distance math is undefined")]
    MissingTrackLength,
    #[error("invalid track length {0}m, must be positive")]
    InvalidTrackLength(f64),
    #[error("race data contains no drivers")]
    NoDrivers,
    #[error("invalid race time {0}s")]
    InvalidRaceTime(f64),
    #[error("race clock went backwards: {requested}s requested after {previous}s")]
    ClockRewind { previous: f64, requested: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProvisionalStatus {
    Up,
    Down,
}

/// LiveDriverState is the derived state of one driver at one tick. Rebuilt on every tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveDriverState {
    // identity
    pub driver: String,
    pub driver_number: String,
    pub team: String,

    // timing
    pub current_lap: u32,
    pub completed_laps: u32,
    pub current_sector: u8,
    pub timing_position: u32,
    pub display_position: u32,
    pub gap_to_leader: Option<f64>,
    pub interval_gap: Option<f64>,
    pub laps_down: u32,
    pub provisional_status: Option<ProvisionalStatus>,

    // progress
    pub lap_distance: f64,
    pub race_distance: f64,

    // flags
    pub is_leader: bool,
    pub is_finished: bool,
    pub is_in_pit: bool,

    pub compound: String,
    pub tyre_life: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ProvisionalLatch {
    lap: u32,
    loser: String,
    gainer: String,
}

/// LiveTiming derives the running order, gaps and pit/tyre state of all drivers from the static
/// race record and the current race time.
#[derive(Debug)]
pub struct LiveTiming {
    track: Track,
    drivers: BTreeMap<String, Driver>,
    sector_anchors: SectorAnchorIndex,
    caches: HashMap<String, DriverCache>,
    cur_racetime: Option<f64>,
    leader_lap: u32,
    last_leader: Option<String>,
    last_leader_compl_laps: Option<u32>,
    neutralized_order: Option<Vec<String>>,
    provisional_latches: HashSet<ProvisionalLatch>,
    final_snapshot: Option<Vec<LiveDriverState>>,
}

impl LiveTiming {
    pub fn new(race_data: &RaceData) -> Result<LiveTiming, TimingError> {
        let track = Track::new(&race_data.session)?;

        if race_data.drivers.is_empty() {
            return Err(TimingError::NoDrivers);
        }

        let drivers: BTreeMap<String, Driver> = race_data
            .drivers
            .iter()
            .map(|(code, driver_data)| (code.to_owned(), Driver::new(code, driver_data)))
            .collect();

        let sector_anchors = SectorAnchorIndex::build(drivers.values());

        info!(
            "Live timing initialized: {} drivers, {} laps, track length {:.1}m",
            drivers.len(),
            track.total_laps,
            track.length
        );

        Ok(LiveTiming {
            caches: drivers
                .keys()
                .map(|code| (code.to_owned(), DriverCache::default()))
                .collect(),
            track,
            drivers,
            sector_anchors,
            cur_racetime: None,
            leader_lap: 1,
            last_leader: None,
            last_leader_compl_laps: None,
            neutralized_order: None,
            provisional_latches: HashSet::new(),
            final_snapshot: None,
        })
    }

    // ---------------------------------------------------------------------------------------------
    // MAIN METHOD ---------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// recompute derives the ordered driver states for `race_time`. The race time must not
    /// decrease between calls. `neutralized` holds the order and all gaps (yellow, SC, VSC, red).
    pub fn recompute(
        &mut self,
        race_time: f64,
        neutralized: bool,
    ) -> Result<Vec<LiveDriverState>, TimingError> {
        if !(race_time.is_finite() && race_time >= 0.0) {
            return Err(TimingError::InvalidRaceTime(race_time));
        }
        if let Some(previous) = self.cur_racetime {
            if race_time < previous {
                return Err(TimingError::ClockRewind {
                    previous,
                    requested: race_time,
                });
            }
        }
        self.cur_racetime = Some(race_time);

        // the classified result never changes once the leader took the flag
        if let Some(snapshot) = &self.final_snapshot {
            return Ok(snapshot.to_owned());
        }

        let (mut states, sector_edges) = self.reconstruct_drivers(race_time);

        // order by track position, held at the onset order while neutralized
        states.sort_by(compare_by_track_position);
        if neutralized {
            if let Some(order) = &self.neutralized_order {
                hold_order(&mut states, order);
            }
        }
        states[0].is_leader = true;

        let leader_compl_laps = states[0].completed_laps;
        for state in states.iter_mut() {
            state.laps_down = leader_compl_laps.saturating_sub(state.completed_laps);
        }

        if sector_edges.contains(&states[0].driver) {
            debug!(
                "Sector edge: leader {} lap {} sector {}",
                states[0].driver, states[0].current_lap, states[0].current_sector
            );
        }

        // final classification
        if self.track.total_laps > 0 && leader_compl_laps >= self.track.total_laps {
            let snapshot = self.classify_final(states);
            self.store_emitted(&snapshot);
            info!(
                "Race finished at {:.0}s, winner {}",
                race_time, snapshot[0].driver
            );
            self.final_snapshot = Some(snapshot.to_owned());
            return Ok(snapshot);
        }

        // lap boundary and leader change
        let leader = states[0].driver.to_owned();
        let lap_boundary = self.last_leader_compl_laps != Some(leader_compl_laps);
        let leader_changed = matches!(&self.last_leader, Some(prev) if *prev != leader);

        if lap_boundary {
            self.provisional_latches.clear();
            if leader_compl_laps >= 1 {
                info!(
                    "Leader {} completed lap {} at {:.0}s",
                    leader, leader_compl_laps, race_time
                );
            }
        }
        if leader_changed {
            info!("Lead changed to {} at {:.0}s", leader, race_time);
        }
        self.last_leader_compl_laps = Some(leader_compl_laps);
        self.last_leader = Some(leader);

        // gaps
        if neutralized {
            if self.neutralized_order.is_some() {
                self.hold_gaps(&mut states);
            } else {
                info!(
                    "Neutralization at {:.0}s, order and gaps held from lap {}",
                    race_time, leader_compl_laps
                );
                self.apply_lap_end_gaps(&mut states, leader_compl_laps);
                self.neutralized_order =
                    Some(states.iter().map(|state| state.driver.to_owned()).collect());
            }
        } else {
            if self.neutralized_order.take().is_some() {
                info!("Neutralization ended at {:.0}s", race_time);
            }
            if lap_boundary || leader_changed {
                self.apply_lap_end_gaps(&mut states, leader_compl_laps);
            } else {
                self.apply_mid_lap_gaps(&mut states);
            }
        }
        calc_intervals(&mut states);

        // provisional overtakes (display overlay only, no new swaps while the order is held)
        if !neutralized {
            self.detect_provisional_overtakes(&states, race_time);
        }
        self.apply_provisional_overlay(&mut states);

        self.store_emitted(&states);
        Ok(states)
    }

    // ---------------------------------------------------------------------------------------------
    // TIMING PARTS --------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// reconstruct_drivers rebuilds lap, sector, distance and pit state of every driver. Returns
    /// the unordered states and the drivers that crossed a sector line since the last tick.
    fn reconstruct_drivers(&mut self, race_time: f64) -> (Vec<LiveDriverState>, HashSet<String>) {
        let mut states = Vec::with_capacity(self.drivers.len());
        let mut sector_edges = HashSet::new();

        for (code, driver) in self.drivers.iter() {
            let cache = self.caches.entry(code.to_owned()).or_default();

            let completed_laps = cache.clamp_completed_laps(driver.completed_laps(race_time));
            let current_lap = if self.track.total_laps > 0 {
                (completed_laps + 1).min(self.track.total_laps)
            } else {
                completed_laps + 1
            };

            // an untimed reference lap puts the driver at the start of it
            let (lap_distance, current_sector) = match driver.reference_lap(completed_laps) {
                Some(lap) => {
                    let elapsed = (race_time - lap.lap_start_time.unwrap_or(0.0)).max(0.0);
                    let lap_distance = match lap.lap_time {
                        Some(t_lap) if lap.is_timed() => {
                            elapsed.min(t_lap) / t_lap * self.track.length
                        }
                        _ => 0.0,
                    };
                    (lap_distance, lap.sector_at(elapsed))
                }
                None => (0.0, 1),
            };

            let race_distance = cache
                .clamp_race_distance(self.track.race_distance(completed_laps, lap_distance));

            if cache.update_sector(current_lap, current_sector) {
                sector_edges.insert(code.to_owned());
            }

            let pit_tyre = PitTyreState::resolve(driver, completed_laps, race_time);

            states.push(LiveDriverState {
                driver: code.to_owned(),
                driver_number: driver.number.to_owned(),
                team: driver.team.to_owned(),
                current_lap,
                completed_laps,
                current_sector,
                timing_position: 0,
                display_position: 0,
                gap_to_leader: None,
                interval_gap: None,
                laps_down: 0,
                provisional_status: None,
                lap_distance,
                race_distance,
                is_leader: false,
                is_finished: self.track.total_laps > 0
                    && completed_laps >= self.track.total_laps,
                is_in_pit: pit_tyre.is_in_pit,
                compound: pit_tyre.compound,
                tyre_life: pit_tyre.tyre_life,
            });
        }

        (states, sector_edges)
    }

    /// lap_end_gap returns the difference between the completion times of the given lap (0-based
    /// index) of a driver and of the leader. None if the driver crossed the line ahead of the
    /// current leader, i.e. the lead changed after that lap was completed.
    fn lap_end_gap(&self, leader: &str, driver: &str, lap_idx: usize) -> Option<f64> {
        let t_leader = self.drivers.get(leader)?.lap_end_at(lap_idx)?;
        let t_driver = self.drivers.get(driver)?.lap_end_at(lap_idx)?;
        Some(t_driver - t_leader).filter(|gap| *gap >= 0.0)
    }

    /// apply_lap_end_gaps sets all gaps from the recorded completion times of lap
    /// `leader_compl_laps`. Drivers without a timed lap there keep their previous gap.
    fn apply_lap_end_gaps(&mut self, states: &mut [LiveDriverState], leader_compl_laps: u32) {
        states[0].gap_to_leader = Some(0.0);
        let leader = states[0].driver.to_owned();

        for state in states.iter_mut().skip(1) {
            let gap = match (leader_compl_laps as usize).checked_sub(1) {
                Some(lap_idx) => self.lap_end_gap(&leader, &state.driver, lap_idx),
                None => None,
            };

            let cache = self.caches.entry(state.driver.to_owned()).or_default();
            state.gap_to_leader = match gap {
                Some(gap) => {
                    cache.store_valid_gap(gap);
                    Some(gap)
                }
                None => cache.get_gap(),
            };
        }
    }

    /// hold_gaps emits the previous gap of every driver unchanged.
    fn hold_gaps(&self, states: &mut [LiveDriverState]) {
        states[0].gap_to_leader = Some(0.0);
        for state in states.iter_mut().skip(1) {
            state.gap_to_leader = self.caches.get(&state.driver).and_then(|cache| cache.get_gap());
        }
    }

    /// apply_mid_lap_gaps converts the distance to the leader into time using the leader's speed
    /// on the current lap. Drivers that have not yet completed the leader's last lap keep the
    /// authoritative lap-end gap.
    fn apply_mid_lap_gaps(&mut self, states: &mut [LiveDriverState]) {
        states[0].gap_to_leader = Some(0.0);

        let leader = states[0].driver.to_owned();
        let leader_compl_laps = states[0].completed_laps;
        let leader_dist = states[0].race_distance;
        let leader_speed = self
            .drivers
            .get(&leader)
            .and_then(|driver| driver.timed_lap_at(leader_compl_laps as usize))
            .and_then(|lap| lap.lap_time)
            .map(|t_lap| self.track.length / t_lap);

        for state in states.iter_mut().skip(1) {
            // lap-end hold
            if leader_compl_laps >= 1 && state.completed_laps < leader_compl_laps {
                let gap = self.lap_end_gap(&leader, &state.driver, leader_compl_laps as usize - 1);
                let cache = self.caches.entry(state.driver.to_owned()).or_default();
                state.gap_to_leader = match gap {
                    Some(gap) => {
                        cache.store_valid_gap(gap);
                        Some(gap)
                    }
                    None => cache.get_gap(),
                };
                continue;
            }

            let current_lap_timed = self
                .drivers
                .get(&state.driver)
                .map_or(false, |driver| driver.current_lap_timed(state.completed_laps));
            let cache = self.caches.entry(state.driver.to_owned()).or_default();

            let leader_speed = match leader_speed {
                Some(v) if v > 0.0 => v,
                _ => {
                    // leader timing invalid -> hold everything
                    state.gap_to_leader = cache.get_gap();
                    continue;
                }
            };

            if current_lap_timed {
                if cache.deact_recovery_lock() {
                    debug!("Recovery lock released for {}", state.driver);
                }
                let gap = ((leader_dist - state.race_distance) / leader_speed).max(0.0);
                cache.store_valid_gap(gap);
                state.gap_to_leader = Some(gap);
            } else {
                if cache.act_recovery_lock() {
                    debug!(
                        "Recovery lock engaged for {} on lap {}",
                        state.driver, state.current_lap
                    );
                }
                state.gap_to_leader = cache.get_valid_gap().or_else(|| cache.get_gap());
            }
        }
    }

    /// classify_final builds the frozen result: finishers ordered by their final lap completion
    /// time, then everybody else in track order with a laps-down count and no gap.
    fn classify_final(&mut self, states: Vec<LiveDriverState>) -> Vec<LiveDriverState> {
        let total_laps = self.track.total_laps;
        let lap_idx = total_laps as usize - 1;

        let mut finishers: Vec<(f64, LiveDriverState)> = Vec::new();
        let mut others: Vec<LiveDriverState> = Vec::new();
        for state in states {
            match self
                .drivers
                .get(&state.driver)
                .and_then(|driver| driver.lap_end_at(lap_idx))
            {
                Some(t_finish) => finishers.push((t_finish, state)),
                None => others.push(state),
            }
        }
        finishers.sort_by(|a, b| a.0.total_cmp(&b.0));

        let t_winner = finishers.first().map(|(t, _)| *t);
        let finish_distance = self.track.race_distance(total_laps, 0.0);
        let mut classified: Vec<LiveDriverState> = Vec::with_capacity(finishers.len() + others.len());

        for (t_finish, mut state) in finishers {
            let cache = self.caches.entry(state.driver.to_owned()).or_default();
            state.completed_laps = cache.clamp_completed_laps(total_laps);
            state.current_lap = total_laps;
            state.race_distance = cache.clamp_race_distance(finish_distance);
            state.is_finished = true;
            state.laps_down = 0;
            state.gap_to_leader = t_winner.map(|t_winner| t_finish - t_winner);
            classified.push(state);
        }

        let winner_dist = classified
            .first()
            .map(|state| state.race_distance)
            .unwrap_or(finish_distance);
        for mut state in others {
            let deficit = ((winner_dist - state.race_distance) / self.track.length).floor();
            state.laps_down = (deficit.max(1.0)) as u32;
            state.gap_to_leader = None;
            state.is_finished = false;
            classified.push(state);
        }

        for (i, state) in classified.iter_mut().enumerate() {
            state.is_leader = i == 0;
            state.timing_position = i as u32 + 1;
            state.display_position = i as u32 + 1;
            state.provisional_status = None;
        }
        if let Some(winner) = classified.first_mut() {
            winner.gap_to_leader = Some(0.0);
        }
        calc_intervals(&mut classified);

        classified
    }

    /// detect_provisional_overtakes latches a swap when the trailing car of an adjacent pair on
    /// the same lap completed its latest sector before the car ahead completed the same sector.
    fn detect_provisional_overtakes(&mut self, states: &[LiveDriverState], race_time: f64) {
        for pair in states.windows(2) {
            let (ahead, behind) = (&pair[0], &pair[1]);
            if ahead.current_lap != behind.current_lap || ahead.is_finished || behind.is_finished {
                continue;
            }

            let (anchor_ahead, anchor_behind) = match (
                self.sector_anchors.last_anchor_before(&ahead.driver, race_time),
                self.sector_anchors.last_anchor_before(&behind.driver, race_time),
            ) {
                (Some(a), Some(b)) => (a, b),
                _ => continue,
            };

            if anchor_behind.lap != behind.current_lap
                || (anchor_ahead.lap, anchor_ahead.sector) != (anchor_behind.lap, anchor_behind.sector)
            {
                continue;
            }

            if anchor_behind.race_time < anchor_ahead.race_time {
                let latch = ProvisionalLatch {
                    lap: anchor_behind.lap,
                    loser: ahead.driver.to_owned(),
                    gainer: behind.driver.to_owned(),
                };
                if self.provisional_latches.insert(latch) {
                    info!(
                        "Provisional overtake lap {} sector {}: {} ahead of {}",
                        anchor_behind.lap, anchor_behind.sector, behind.driver, ahead.driver
                    );
                }
            }
        }
    }

    /// apply_provisional_overlay swaps latched adjacent pairs in the display order and tags them.
    /// The authoritative order stays available through `timing_position`.
    fn apply_provisional_overlay(&self, states: &mut [LiveDriverState]) {
        for (i, state) in states.iter_mut().enumerate() {
            state.timing_position = i as u32 + 1;
            state.provisional_status = None;
        }

        let mut i = 0;
        while i + 1 < states.len() {
            let latch = ProvisionalLatch {
                lap: states[i + 1].current_lap,
                loser: states[i].driver.to_owned(),
                gainer: states[i + 1].driver.to_owned(),
            };
            if states[i].current_lap == states[i + 1].current_lap
                && self.provisional_latches.contains(&latch)
            {
                states.swap(i, i + 1);
                states[i].provisional_status = Some(ProvisionalStatus::Up);
                states[i + 1].provisional_status = Some(ProvisionalStatus::Down);
                i += 2;
            } else {
                i += 1;
            }
        }

        for (i, state) in states.iter_mut().enumerate() {
            state.display_position = i as u32 + 1;
        }
    }

    fn store_emitted(&mut self, states: &[LiveDriverState]) {
        for state in states {
            if let Some(cache) = self.caches.get_mut(&state.driver) {
                cache.set_gap(state.gap_to_leader);
            }
            if state.is_leader {
                self.leader_lap = state.current_lap;
            }
        }
    }

    // ---------------------------------------------------------------------------------------------
    // METHODS (HELPERS) ---------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// leader_lap returns the lap the leader is currently on (as of the last tick).
    pub fn leader_lap(&self) -> u32 {
        self.leader_lap
    }

    pub fn is_race_finished(&self) -> bool {
        self.final_snapshot.is_some()
    }

    pub fn get_track(&self) -> &Track {
        &self.track
    }

    pub fn get_driver(&self, code: &str) -> Option<&Driver> {
        self.drivers.get(code)
    }

    pub fn get_drivers(&self) -> impl Iterator<Item = &Driver> {
        self.drivers.values()
    }

    pub fn get_sector_anchors(&self) -> &SectorAnchorIndex {
        &self.sector_anchors
    }

    pub fn is_recovery_locked(&self, code: &str) -> bool {
        self.caches
            .get(code)
            .map_or(false, |cache| cache.is_recovery_locked())
    }

    /// last_recorded_time returns the latest lap completion time found in the record.
    pub fn last_recorded_time(&self) -> f64 {
        self.drivers
            .values()
            .flat_map(|driver| driver.laps().iter().filter_map(|lap| lap.end_time()))
            .fold(0.0, f64::max)
    }
}

/// compare_by_track_position orders by completed laps, then lap distance, then race distance,
/// all descending.
fn compare_by_track_position(a: &LiveDriverState, b: &LiveDriverState) -> Ordering {
    b.completed_laps
        .cmp(&a.completed_laps)
        .then_with(|| b.lap_distance.total_cmp(&a.lap_distance))
        .then_with(|| b.race_distance.total_cmp(&a.race_distance))
}

/// hold_order sorts the states into the given driver order. Drivers missing from it keep their
/// relative order at the end.
fn hold_order(states: &mut [LiveDriverState], order: &[String]) {
    states.sort_by_key(|state| {
        order
            .iter()
            .position(|driver| *driver == state.driver)
            .unwrap_or(usize::MAX)
    });
}

/// calc_intervals sets each driver's interval to its gap minus the nearest non-null gap ahead.
fn calc_intervals(states: &mut [LiveDriverState]) {
    let mut gap_ahead: Option<f64> = None;

    for (i, state) in states.iter_mut().enumerate() {
        if i == 0 {
            state.interval_gap = None;
            gap_ahead = state.gap_to_leader;
            continue;
        }
        state.interval_gap = match (state.gap_to_leader, gap_ahead) {
            (Some(gap), Some(ahead)) => Some(gap - ahead),
            _ => None,
        };
        if state.gap_to_leader.is_some() {
            gap_ahead = state.gap_to_leader;
        }
    }
}
