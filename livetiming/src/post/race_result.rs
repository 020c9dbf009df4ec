use crate::core::leaderboard::LeaderboardView;
use anyhow::Context;
use helpers::general::fmt_gap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::Path;

/// ClassificationRow is one line of the final classification.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ClassificationRow {
    pub position: u32,
    pub driver: String,
    pub driver_number: String,
    pub team: String,
    pub laps: u32,
    pub gap: Option<f64>,
    pub laps_down: u32,
    pub pit_stops: u32,
    pub status: String,
}

impl ClassificationRow {
    /// gap_label returns the gap to the winner or the laps-down count.
    pub fn gap_label(&self) -> String {
        if self.position == 1 {
            "WINNER".to_owned()
        } else if self.laps_down > 0 {
            format!("+{} LAP{}", self.laps_down, if self.laps_down > 1 { "S" } else { "" })
        } else {
            fmt_gap(self.gap)
        }
    }
}

/// RaceResult contains the information required for post-processing a replayed session.
///
/// * `tot_no_laps` - Scheduled race distance in laps
/// * `finished` - True if the leader completed the race distance during the replay
/// * `classification` - Final order
/// * `lap_gaps` - Per driver gap to the leader at each leader lap completion (index = lap - 1)
#[derive(Debug, Serialize, Clone, PartialEq, Default)]
pub struct RaceResult {
    pub tot_no_laps: u32,
    pub finished: bool,
    pub classification: Vec<ClassificationRow>,
    pub lap_gaps: BTreeMap<String, Vec<Option<f64>>>,
}

impl RaceResult {
    /// from_view builds the result from the last leaderboard of the replay.
    pub fn from_view(
        view: &LeaderboardView,
        finished: bool,
        lap_gaps: BTreeMap<String, Vec<Option<f64>>>,
    ) -> RaceResult {
        let classification = view
            .entries
            .iter()
            .map(|entry| {
                let status = if let Some(status) = entry.status {
                    status.label().to_owned()
                } else if entry.is_finished {
                    "FINISHED".to_owned()
                } else {
                    "RUNNING".to_owned()
                };

                ClassificationRow {
                    position: entry.position,
                    driver: entry.driver.to_owned(),
                    driver_number: entry.driver_number.to_owned(),
                    team: entry.team.to_owned(),
                    laps: if entry.is_finished {
                        view.total_laps
                    } else {
                        entry.lap.saturating_sub(1)
                    },
                    gap: entry.gap_to_leader,
                    laps_down: entry.laps_down,
                    pit_stops: entry.pit_stops,
                    status,
                }
            })
            .collect();

        RaceResult {
            tot_no_laps: view.total_laps,
            finished,
            classification,
            lap_gaps,
        }
    }

    /// write_classification_csv writes the classification to a CSV file (default
    /// output/classification.csv) and returns the path of the written file.
    pub fn write_classification_csv(&self, path: Option<&Path>) -> anyhow::Result<String> {
        let out_path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let out_dir = Path::new("output");
                std::fs::create_dir_all(out_dir).context("Failed to create output directory!")?;
                out_dir.join("classification.csv")
            }
        };

        let mut writer = csv::Writer::from_path(&out_path).context(format!(
            "Failed to open classification file {}!",
            out_path.display()
        ))?;
        for row in self.classification.iter() {
            writer
                .serialize(row)
                .context("Failed to write classification row!")?;
        }
        writer.flush()?;

        Ok(out_path.to_string_lossy().into_owned())
    }

    /// classification_table renders the classification as a plain text table.
    pub fn classification_table(&self) -> anyhow::Result<String> {
        let mut content = String::new();
        writeln!(
            &mut content,
            "{:>3}  {:<4} {:>3}  {:<24} {:>4}  {:>10}  {:>3}  {}",
            "pos", "drv", "no", "team", "laps", "gap", "pit", "status"
        )?;
        for row in self.classification.iter() {
            writeln!(
                &mut content,
                "{:>3}  {:<4} {:>3}  {:<24} {:>4}  {:>10}  {:>3}  {}",
                row.position,
                row.driver,
                row.driver_number,
                row.team,
                row.laps,
                row.gap_label(),
                row.pit_stops,
                row.status
            )?;
        }
        Ok(content)
    }

    /// print_classification prints the final classification to the console output.
    pub fn print_classification(&self) -> anyhow::Result<()> {
        println!(
            "RESULT: Classification after {} laps{}",
            self.tot_no_laps,
            if self.finished { "" } else { " (race not finished)" }
        );
        print!("{}", self.classification_table()?);
        Ok(())
    }

    /// print_lap_gaps prints the gap to the leader of every driver at every completed leader lap.
    pub fn print_lap_gaps(&self) -> anyhow::Result<()> {
        let mut content = String::new();
        write!(&mut content, "lap")?;
        for driver in self.lap_gaps.keys() {
            write!(&mut content, ", {:>8}", driver)?;
        }
        writeln!(&mut content)?;

        let no_laps = self.lap_gaps.values().map(Vec::len).max().unwrap_or(0);
        for lap_idx in 0..no_laps {
            write!(&mut content, "{:3}", lap_idx + 1)?;
            for gaps in self.lap_gaps.values() {
                write!(
                    &mut content,
                    ", {:>8}",
                    fmt_gap(gaps.get(lap_idx).copied().flatten())
                )?;
            }
            writeln!(&mut content)?;
        }

        println!("RESULT: Gaps to leader per lap");
        print!("{}", content);
        Ok(())
    }
}
