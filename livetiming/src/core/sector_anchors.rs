use crate::core::driver::Driver;
use log::warn;
use std::collections::HashMap;

/// SectorAnchor is a recorded sector completion of one driver.
///
/// * `lap` - Lap number the sector belongs to
/// * `sector` - Sector 1, 2 or 3
/// * `race_time` - (s) Absolute race time at which the sector was completed
/// * `sector_time` - (s) Sector duration
#[derive(Debug, Clone, PartialEq)]
pub struct SectorAnchor {
    pub driver: String,
    pub lap: u32,
    pub sector: u8,
    pub race_time: f64,
    pub sector_time: f64,
}

/// SectorAnchorIndex holds the sector anchors of every driver, sorted by race time. It is built
/// once per session and never mutated afterwards.
#[derive(Debug, Default)]
pub struct SectorAnchorIndex {
    anchors: HashMap<String, Vec<SectorAnchor>>,
}

impl SectorAnchorIndex {
    pub fn build<'a, I>(drivers: I) -> SectorAnchorIndex
    where
        I: IntoIterator<Item = &'a Driver>,
    {
        let mut anchors = HashMap::new();

        for driver in drivers {
            let mut list: Vec<SectorAnchor> = Vec::new();

            for lap in driver.laps() {
                let lap_start = match lap.lap_start_time {
                    Some(t) if t.is_finite() => t,
                    _ => continue,
                };

                // a missing sector adds no anchor, but later sectors still count from lap start
                let mut cumulative = 0.0;
                for sector in 1..=3u8 {
                    if let Some(sector_time) = lap.sector_time(sector) {
                        cumulative += sector_time;
                        list.push(SectorAnchor {
                            driver: driver.code.to_owned(),
                            lap: lap.lap_number,
                            sector,
                            race_time: lap_start + cumulative,
                            sector_time,
                        });
                    }
                }
            }

            // keep the list strictly increasing in race time and (lap, sector)
            let len_raw = list.len();
            let mut ordered: Vec<SectorAnchor> = Vec::with_capacity(len_raw);
            for anchor in list {
                let keep = match ordered.last() {
                    Some(prev) => {
                        anchor.race_time > prev.race_time
                            && (anchor.lap, anchor.sector) > (prev.lap, prev.sector)
                    }
                    None => true,
                };
                if keep {
                    ordered.push(anchor);
                }
            }
            if ordered.len() < len_raw {
                warn!(
                    "Dropped {} out-of-order sector anchors for driver {}",
                    len_raw - ordered.len(),
                    driver.code
                );
            }

            anchors.insert(driver.code.to_owned(), ordered);
        }

        SectorAnchorIndex { anchors }
    }

    /// last_anchor_before returns the latest anchor of the driver completed at or before
    /// `race_time`.
    pub fn last_anchor_before(&self, driver: &str, race_time: f64) -> Option<&SectorAnchor> {
        let list = self.anchors.get(driver)?;
        let idx = list.partition_point(|anchor| anchor.race_time <= race_time);
        if idx == 0 {
            None
        } else {
            list.get(idx - 1)
        }
    }

    pub fn anchors_of(&self, driver: &str) -> &[SectorAnchor] {
        self.anchors.get(driver).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn driver_count(&self) -> usize {
        self.anchors.len()
    }
}
