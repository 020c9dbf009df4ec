use anyhow::Context;
use clap::Parser;
use helpers::general::fmt_gap;
use livetiming::core::handle_replay::handle_replay;
use livetiming::core::leaderboard::LeaderboardView;
use livetiming::core::track_status::TrackStatusSnapshot;
use livetiming::post::race_result::RaceResult;
use livetiming::pre::read_race_data::{read_race_data, read_retirements, read_track_status};
use livetiming::pre::replay_opts::ReplayOpts;
use log::{info, warn};
use plotters::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;
use std::thread;
use std::time::Instant;

/// export_gap_plot draws the gap to the leader at each completed leader lap for every driver.
fn export_gap_plot(result: &RaceResult) -> anyhow::Result<String> {
    let out_dir = Path::new("output");
    std::fs::create_dir_all(out_dir).context("Failed to create output directory!")?;
    let out_path = out_dir.join("gap_chart.png");

    let no_laps = result.lap_gaps.values().map(Vec::len).max().unwrap_or(0) as u32;
    let mut y_max = result
        .lap_gaps
        .values()
        .flat_map(|gaps| gaps.iter().flatten())
        .filter(|gap| gap.is_finite())
        .fold(0.0, |acc: f64, &gap| acc.max(gap));
    if y_max <= 0.0 {
        y_max = 1.0;
    }
    y_max *= 1.05;

    let root = BitMapBackend::new(&out_path, (1280, 720)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Gap to leader", ("sans-serif", 24).into_font())
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(1u32..no_laps.max(2), 0.0..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Lap")
        .y_desc("s")
        .label_style(("sans-serif", 16))
        .axis_desc_style(("sans-serif", 16))
        .draw()?;

    let palette = Palette99::pick;
    for (i, (driver, gaps)) in result.lap_gaps.iter().enumerate() {
        let series: Vec<(u32, f64)> = gaps
            .iter()
            .enumerate()
            .filter_map(|(lap_idx, gap)| match gap {
                Some(gap) if gap.is_finite() => Some((lap_idx as u32 + 1, *gap)),
                _ => None,
            })
            .collect();
        chart
            .draw_series(LineSeries::new(series.into_iter(), palette(i)))?
            .label(driver.to_owned())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], palette(i)));
    }

    chart
        .configure_series_labels()
        .border_style(&BLACK)
        .background_style(&WHITE.mix(0.8))
        .label_font(("sans-serif", 16))
        .position(plotters::chart::SeriesLabelPosition::UpperLeft)
        .draw()?;

    root.present()?;
    Ok(out_path.to_string_lossy().into_owned())
}

/// print_frame prints one live leaderboard to the console output.
fn print_frame(race_time: f64, status: &TrackStatusSnapshot, view: &LeaderboardView) {
    let status_label = status.displayed.map_or("", |status| status.label());
    println!(
        "LIVE: {:5.0}s  lap {}/{}  {:?}  {}",
        race_time, view.leader_lap, view.total_laps, view.phase, status_label
    );

    for entry in view.entries.iter() {
        let gap = if entry.position == 1 {
            "LEADER".to_owned()
        } else if entry.laps_down > 0 {
            format!("+{}L", entry.laps_down)
        } else {
            fmt_gap(entry.gap_to_leader)
        };
        let marker = match (entry.status, entry.position_arrow, entry.provisional) {
            (Some(status), _, _) => status.label().to_owned(),
            (None, Some(arrow), _) => format!("{:?}", arrow),
            (None, None, Some(provisional)) => format!("({:?})", provisional),
            _ => String::new(),
        };
        println!(
            "{:>3}  {:<4} {:>10} {:>10}  {:<12} {:>3}  {}{}",
            entry.position,
            entry.driver,
            gap,
            fmt_gap(entry.interval_gap),
            entry.compound,
            entry.pit_stops,
            if entry.is_in_pit { "PIT " } else { "" },
            marker
        );
    }
}

fn main() -> anyhow::Result<()> {
    // PRE-PROCESSING ------------------------------------------------------------------------------
    // get replay options from the command line arguments
    let replay_opts: ReplayOpts = ReplayOpts::parse();
    replay_opts.check_opts()?;

    env_logger::Builder::from_default_env()
        .filter_level(if replay_opts.debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    // get race data
    info!("Reading race data from {}", replay_opts.race_data.display());
    let mut race_data = read_race_data(&replay_opts.race_data)?;
    if let Some(track_length) = replay_opts.track_length {
        race_data.session.track_length_meters = Some(track_length);
    }

    let status_frames = match &replay_opts.track_status {
        Some(path) => read_track_status(path)?,
        None => {
            warn!("No track status file given, replaying without flags");
            Vec::new()
        }
    };
    let retirements = match &replay_opts.retirements {
        Some(path) => read_retirements(path)?,
        None => BTreeMap::new(),
    };

    info!(
        "Replaying {} drivers over {} laps from race second {:.0}",
        race_data.drivers.len(),
        race_data.session.total_laps,
        replay_opts.start_second
    );

    // EXECUTION -----------------------------------------------------------------------------------
    let race_result = if !replay_opts.realtime {
        let t_start = Instant::now();
        let race_result = handle_replay(
            &race_data,
            &status_frames,
            &retirements,
            replay_opts.start_second,
            replay_opts.debug,
            None,
            replay_opts.speed,
        )?;
        info!("Execution time: {}ms", t_start.elapsed().as_millis());
        race_result
    } else {
        // the replay runs on its own thread, the main thread consumes the frames
        let (tx, rx) = flume::unbounded();
        let opts_thread = replay_opts.clone();

        let replay_thread = thread::spawn(move || {
            handle_replay(
                &race_data,
                &status_frames,
                &retirements,
                opts_thread.start_second,
                opts_thread.debug,
                Some(&tx),
                opts_thread.speed,
            )
        });

        for frame in rx.iter() {
            if frame.final_result.is_some() {
                break;
            }
            print_frame(frame.race_time, &frame.track_status, &frame.leaderboard);
        }

        replay_thread
            .join()
            .map_err(|_| anyhow::anyhow!("Replay thread panicked!"))??
    };

    // POST-PROCESSING -----------------------------------------------------------------------------
    race_result.print_classification()?;
    if replay_opts.debug {
        race_result.print_lap_gaps()?;
    }

    let csv_path = race_result.write_classification_csv(replay_opts.output.as_deref())?;
    info!("Classification written to {}", csv_path);

    if replay_opts.plot {
        match export_gap_plot(&race_result) {
            Ok(path) => info!("Gap chart written to {}", path),
            Err(e) => warn!("Failed to write gap chart: {}", e),
        }
    }

    Ok(())
}
