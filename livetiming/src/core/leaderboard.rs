use crate::core::broadcast_phase::BroadcastPhase;
use crate::core::driver::{Driver, PitStop};
use crate::core::live_timing::{LiveDriverState, ProvisionalStatus};
use crate::core::pit_tyre::count_pit_stops;
use crate::core::presence::DriverPresence;
use helpers::general::{argsort, SortOrder};
use log::info;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// A position change arrow is shown for this long after the change.
pub const POSITION_ARROW_DURATION: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionArrow {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntryStatus {
    #[serde(rename = "OUT")]
    Out,
}

impl EntryStatus {
    pub fn label(&self) -> &'static str {
        match self {
            EntryStatus::Out => "OUT",
        }
    }
}

/// LeaderboardEntry is one displayable row. Positions are contiguous 1..N.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub position: u32,
    pub driver: String,
    pub driver_number: String,
    pub team: String,
    pub lap: u32,
    pub gap_to_leader: Option<f64>,
    pub interval_gap: Option<f64>,
    pub laps_down: u32,
    pub lap_distance: f64,
    pub race_distance: f64,
    pub is_in_pit: bool,
    pub is_finished: bool,
    pub compound: String,
    pub tyre_life: Option<f64>,
    pub pit_stops: u32,
    pub position_arrow: Option<PositionArrow>,
    pub provisional: Option<ProvisionalStatus>,
    pub status: Option<EntryStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct LeaderboardView {
    pub entries: Vec<LeaderboardEntry>,
    pub leader_lap: u32,
    pub total_laps: u32,
    pub phase: BroadcastPhase,
}

/// LeaderboardProjector turns the timing snapshot into the final displayable order: active
/// drivers in timing order, retired drivers appended by retirement time.
#[derive(Debug)]
pub struct LeaderboardProjector {
    total_laps: u32,
    pit_stops: HashMap<String, Vec<PitStop>>,
    retired_at: HashMap<String, f64>,
    previous_positions: HashMap<String, u32>,
    arrows: HashMap<String, (PositionArrow, Instant)>,
    last_stable_leader_lap: u32,
}

impl LeaderboardProjector {
    pub fn new<'a, I>(drivers: I, total_laps: u32) -> LeaderboardProjector
    where
        I: IntoIterator<Item = &'a Driver>,
    {
        LeaderboardProjector {
            total_laps,
            pit_stops: drivers
                .into_iter()
                .map(|driver| (driver.code.to_owned(), driver.pit_stops().to_vec()))
                .collect(),
            retired_at: HashMap::new(),
            previous_positions: HashMap::new(),
            arrows: HashMap::new(),
            last_stable_leader_lap: 1,
        }
    }

    /// project builds the leaderboard for one tick. `now` is the wall clock used for arrow decay.
    pub fn project(
        &mut self,
        states: &[LiveDriverState],
        race_time: f64,
        presence: &dyn DriverPresence,
        now: Instant,
        phase: BroadcastPhase,
    ) -> LeaderboardView {
        // retirement bookkeeping
        for state in states {
            if !self.retired_at.contains_key(&state.driver)
                && presence.is_absent(&state.driver, race_time)
            {
                info!("{} is out at {:.0}s", state.driver, race_time);
                self.retired_at.insert(state.driver.to_owned(), race_time);
            }
        }

        let (active, retired): (Vec<&LiveDriverState>, Vec<&LiveDriverState>) = states
            .iter()
            .partition(|state| !self.retired_at.contains_key(&state.driver));

        let t_retired: Vec<f64> = retired
            .iter()
            .map(|state| self.retired_at[&state.driver])
            .collect();
        let retired_order = argsort(&t_retired, SortOrder::Ascending);

        let ordered = active
            .iter()
            .map(|state| (*state, false))
            .chain(retired_order.iter().map(|&idx| (retired[idx], true)));

        let mut entries = Vec::with_capacity(states.len());
        for (i, (state, is_retired)) in ordered.enumerate() {
            let position = i as u32 + 1;
            let position_arrow = self.update_arrow(state, position, is_retired, now);

            entries.push(LeaderboardEntry {
                position,
                driver: state.driver.to_owned(),
                driver_number: state.driver_number.to_owned(),
                team: state.team.to_owned(),
                lap: state.current_lap,
                gap_to_leader: state.gap_to_leader,
                interval_gap: state.interval_gap,
                laps_down: state.laps_down,
                lap_distance: state.lap_distance,
                race_distance: state.race_distance,
                is_in_pit: state.is_in_pit,
                is_finished: state.is_finished,
                compound: state.compound.to_owned(),
                tyre_life: state.tyre_life,
                pit_stops: self
                    .pit_stops
                    .get(&state.driver)
                    .map_or(0, |stops| count_pit_stops(stops, race_time)),
                position_arrow,
                provisional: state.provisional_status,
                status: if is_retired {
                    Some(EntryStatus::Out)
                } else {
                    None
                },
            });
        }

        // leader lap never falls back below 1
        let leader_lap = states
            .iter()
            .find(|state| state.is_leader)
            .map_or(0, |state| state.current_lap);
        if leader_lap >= 1 {
            self.last_stable_leader_lap = leader_lap;
        }

        LeaderboardView {
            entries,
            leader_lap: self.last_stable_leader_lap,
            total_laps: self.total_laps,
            phase,
        }
    }

    /// update_arrow records a position change of a driver whose timing is already displayable and
    /// returns the arrow to show, if any.
    fn update_arrow(
        &mut self,
        state: &LiveDriverState,
        position: u32,
        is_retired: bool,
        now: Instant,
    ) -> Option<PositionArrow> {
        let displayable = state.gap_to_leader.is_some() || state.interval_gap.is_some();

        if let Some(&pos_prev) = self.previous_positions.get(&state.driver) {
            if displayable && pos_prev != position {
                let arrow = if position < pos_prev {
                    PositionArrow::Up
                } else {
                    PositionArrow::Down
                };
                self.arrows.insert(
                    state.driver.to_owned(),
                    (arrow, now + POSITION_ARROW_DURATION),
                );
            }
        }
        self.previous_positions
            .insert(state.driver.to_owned(), position);

        if is_retired {
            return None;
        }
        match self.arrows.get(&state.driver) {
            Some(&(arrow, expires_at)) if expires_at > now => Some(arrow),
            _ => None,
        }
    }

    pub fn get_retirement_time(&self, driver: &str) -> Option<f64> {
        self.retired_at.get(driver).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::presence::RetirementSchedule;

    fn state(driver: &str, gap: Option<f64>) -> LiveDriverState {
        LiveDriverState {
            driver: driver.to_owned(),
            driver_number: String::new(),
            team: String::new(),
            current_lap: 5,
            completed_laps: 4,
            current_sector: 1,
            timing_position: 0,
            display_position: 0,
            gap_to_leader: gap,
            interval_gap: None,
            laps_down: 0,
            provisional_status: None,
            lap_distance: 0.0,
            race_distance: 0.0,
            is_leader: false,
            is_finished: false,
            is_in_pit: false,
            compound: "MEDIUM".to_owned(),
            tyre_life: None,
        }
    }

    fn projector() -> LeaderboardProjector {
        LeaderboardProjector::new(std::iter::empty(), 50)
    }

    #[test]
    fn arrows_decay_after_duration() {
        let mut projector = projector();
        let presence = RetirementSchedule::default();
        let t0 = Instant::now();

        let mut a = state("AAA", Some(0.0));
        a.is_leader = true;
        let b = state("BBB", Some(1.0));
        projector.project(&[a.clone(), b.clone()], 100.0, &presence, t0, BroadcastPhase::Interval);

        let view = projector.project(&[b.clone(), a.clone()], 101.0, &presence, t0, BroadcastPhase::Interval);
        assert_eq!(view.entries[0].position_arrow, Some(PositionArrow::Up));
        assert_eq!(view.entries[1].position_arrow, Some(PositionArrow::Down));

        let later = t0 + POSITION_ARROW_DURATION + Duration::from_millis(1);
        let view = projector.project(&[b, a], 102.0, &presence, later, BroadcastPhase::Interval);
        assert_eq!(view.entries[0].position_arrow, None);
    }

    #[test]
    fn no_arrows_before_timing_is_displayable() {
        let mut projector = projector();
        let presence = RetirementSchedule::default();
        let t0 = Instant::now();
        let a = state("AAA", None);
        let b = state("BBB", None);

        projector.project(&[a.clone(), b.clone()], 10.0, &presence, t0, BroadcastPhase::Hidden);
        let view = projector.project(&[b, a], 11.0, &presence, t0, BroadcastPhase::Hidden);
        assert!(view.entries.iter().all(|e| e.position_arrow.is_none()));
    }

    #[test]
    fn retired_drivers_sorted_by_retirement_time() {
        let mut projector = projector();
        let t0 = Instant::now();
        let states: Vec<LiveDriverState> = ["AAA", "BBB", "CCC", "DDD"]
            .iter()
            .map(|code| state(code, Some(0.0)))
            .collect();

        let presence = RetirementSchedule::new(
            [("BBB".to_owned(), 300.0), ("AAA".to_owned(), 200.0)]
                .into_iter()
                .collect(),
        );
        projector.project(&states, 250.0, &presence, t0, BroadcastPhase::Interval);
        let view = projector.project(&states, 350.0, &presence, t0, BroadcastPhase::Interval);

        let order: Vec<&str> = view.entries.iter().map(|e| e.driver.as_str()).collect();
        assert_eq!(order, vec!["CCC", "DDD", "AAA", "BBB"]);
        let positions: Vec<u32> = view.entries.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![1, 2, 3, 4]);
        assert_eq!(view.entries[2].status, Some(EntryStatus::Out));
        assert!(view.entries[2].position_arrow.is_none());
        assert_eq!(projector.get_retirement_time("AAA"), Some(250.0));
    }

    #[test]
    fn leader_lap_is_stabilized() {
        let mut projector = projector();
        let presence = RetirementSchedule::default();
        let mut a = state("AAA", Some(0.0));
        a.is_leader = true;
        a.current_lap = 7;
        let view = projector.project(&[a.clone()], 600.0, &presence, Instant::now(), BroadcastPhase::Interval);
        assert_eq!(view.leader_lap, 7);

        a.current_lap = 0;
        let view = projector.project(&[a], 601.0, &presence, Instant::now(), BroadcastPhase::Interval);
        assert_eq!(view.leader_lap, 7);
        assert_eq!(view.total_laps, 50);
    }
}
