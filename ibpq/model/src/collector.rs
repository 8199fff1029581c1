// Copyright (c) Facebook, Inc. and its affiliates.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use slog::debug;
use slog::error;

use config::IbpqConfig;
use perfquery::IbCounters;
use perfquery::IbPort;
use perfquery::PerfQueryable;
use perfquery::PortReader;

use crate::sample::IbRate;
use crate::sample::SeriesTrack;
use crate::sample::TOTAL_SERIES;
use crate::sample::WORD_SIZE;
use crate::series;
use crate::series::select_series;

macro_rules! bytes_per_sec {
    ($prev:expr, $cur:expr, $factor:expr, $elapsed:expr) => {{
        // Counters are cumulative modulo 2^64; wrapping_sub folds a wrapped
        // counter back into the true delta.
        $cur.wrapping_sub($prev) as f64 * $factor / $elapsed.as_secs_f64()
    }};
}

/// Samples port counters and maintains per-series throughput rates.
///
/// One instance per monitored host. The embedding framework drives it:
/// every poll calls `sample`, passing the time elapsed since the last
/// report and whether this poll closes a reporting interval.
pub struct Collector {
    logger: slog::Logger,
    reader: PortReader,
    ports: Vec<IbPort>,
    selected: Vec<String>,
    series: BTreeMap<String, SeriesTrack>,
}

impl Collector {
    /// Discover adapter ports and resolve the published series set.
    ///
    /// Discovery and selection failures are fatal; no partial collector is
    /// produced.
    pub fn new<T: PerfQueryable>(logger: slog::Logger, config: &IbpqConfig) -> Result<Self> {
        let reader = PortReader::new();
        let ports = reader
            .discover::<T>()
            .context("Failed to discover adapter ports")?;
        debug!(logger, "discovered {} active adapter port(s)", ports.len());

        let names: Vec<String> = ports.iter().map(|p| p.name.clone()).collect();
        let selected = select_series(config, &names)?;

        let mut series = BTreeMap::new();
        for name in &selected {
            if name != TOTAL_SERIES {
                series.insert(name.clone(), SeriesTrack::new(WORD_SIZE as f64));
            }
        }
        // The aggregate is tracked whether or not it is published, and its
        // components are already scaled to bytes when accumulated.
        series.insert(TOTAL_SERIES.to_string(), SeriesTrack::new(1.0));

        Ok(Self {
            logger,
            reader,
            ports,
            selected,
            series,
        })
    }

    /// Discovered adapter ports, in tool output order.
    pub fn ports(&self) -> &[IbPort] {
        &self.ports
    }

    /// Names of the published series, in selection order.
    pub fn series_names(&self) -> &[String] {
        &self.selected
    }

    /// Display labels for the published series.
    pub fn display_names(&self) -> Vec<String> {
        series::display_names(&self.selected)
    }

    /// Query every discovered port and refresh the current snapshots.
    ///
    /// The aggregate spans all discovered ports, not just the published
    /// ones, so one failed query fails the whole cycle rather than leave a
    /// partial sum behind. When `boundary` is set the scheduler is closing
    /// a reporting interval: rates are recomputed from the snapshot deltas
    /// and the current snapshots rotate into the previous ones.
    pub fn sample<T: PerfQueryable>(&mut self, elapsed: Duration, boundary: bool) -> Result<()> {
        let mut total = IbCounters::default();
        for port in &self.ports {
            let counters = match self.reader.read_counters::<T>(port.lid) {
                Ok(counters) => counters,
                Err(e) => {
                    error!(self.logger, "{:#}", e);
                    return Err(anyhow::Error::new(e)
                        .context(format!("Failed to query counters for {}", port.name)));
                }
            };
            total.rcv_data = total
                .rcv_data
                .wrapping_add(counters.rcv_data.wrapping_mul(WORD_SIZE));
            total.xmit_data = total
                .xmit_data
                .wrapping_add(counters.xmit_data.wrapping_mul(WORD_SIZE));
            if let Some(track) = self.series.get_mut(&port.name) {
                track.current = counters;
            }
        }
        if let Some(track) = self.series.get_mut(TOTAL_SERIES) {
            track.current = total;
        }

        if boundary {
            for track in self.series.values_mut() {
                track.rate = IbRate {
                    rcv_bytes_per_sec: bytes_per_sec!(
                        track.previous.rcv_data,
                        track.current.rcv_data,
                        track.factor,
                        elapsed
                    ),
                    xmit_bytes_per_sec: bytes_per_sec!(
                        track.previous.xmit_data,
                        track.current.xmit_data,
                        track.factor,
                        elapsed
                    ),
                };
                track.previous = track.current;
            }
        }

        Ok(())
    }

    /// Last published rates, keyed by series name.
    pub fn rates(&self) -> BTreeMap<String, IbRate> {
        self.selected
            .iter()
            .filter_map(|name| self.series.get(name).map(|track| (name.clone(), track.rate)))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use common::logutil::get_logger;
    use maplit::btreemap;
    use perfquery::PerfQueryError;

    use super::*;

    const DEVINFO_OUTPUT: &str = "\
hca_id:\tmlx4_0
\t\tport:\t1
\t\t\tport_lid:\t\t17
hca_id:\tmlx4_0
\t\tport:\t2
\t\t\tport_lid:\t\t23
";

    fn perfquery_output(rcv: u64, xmit: u64) -> String {
        format!(
            "PortXmitData:....................{}\nPortRcvData:.....................{}\n",
            xmit, rcv
        )
    }

    struct FakePerfQuery;

    impl PerfQueryable for FakePerfQuery {
        fn new() -> perfquery::Result<Self> {
            Ok(Self {})
        }

        fn devinfo(&self) -> perfquery::Result<String> {
            Ok(DEVINFO_OUTPUT.to_string())
        }

        fn counters(&self, lid: u32) -> perfquery::Result<String> {
            match lid {
                17 => Ok(perfquery_output(100, 200)),
                23 => Ok(perfquery_output(50, 75)),
                _ => Err(PerfQueryError::MissingCounter("PortRcvData")),
            }
        }
    }

    struct FlakyPerfQuery;

    impl PerfQueryable for FlakyPerfQuery {
        fn new() -> perfquery::Result<Self> {
            Ok(Self {})
        }

        fn devinfo(&self) -> perfquery::Result<String> {
            Ok(DEVINFO_OUTPUT.to_string())
        }

        fn counters(&self, lid: u32) -> perfquery::Result<String> {
            match lid {
                17 => Ok(perfquery_output(100, 200)),
                // Port went away mid-cycle: only unrelated counters left.
                _ => Ok("PortXmitWait:....................0\n".to_string()),
            }
        }
    }

    #[test]
    fn test_total_aggregates_all_discovered_ports() {
        let mut collector =
            Collector::new::<FakePerfQuery>(get_logger(), &IbpqConfig::default()).unwrap();
        assert_eq!(collector.series_names(), &["total".to_string()]);

        collector
            .sample::<FakePerfQuery>(Duration::from_secs(1), true)
            .unwrap();

        // (100 + 50) * 4 and (200 + 75) * 4 from a zero baseline over 1s.
        assert_eq!(
            collector.rates(),
            btreemap! {
                "total".to_string() => IbRate {
                    rcv_bytes_per_sec: 600.0,
                    xmit_bytes_per_sec: 1100.0,
                },
            }
        );
    }

    #[test]
    fn test_selected_port_uses_raw_snapshots() {
        let config = IbpqConfig {
            interfaces: vec!["mlx4_0:1".to_string()],
            report_all: false,
        };
        let mut collector = Collector::new::<FakePerfQuery>(get_logger(), &config).unwrap();

        collector
            .sample::<FakePerfQuery>(Duration::from_secs(2), true)
            .unwrap();

        let rates = collector.rates();
        assert_eq!(rates.len(), 1);
        let rate = rates.get("mlx4_0:1").unwrap();
        assert_eq!(rate.rcv_bytes_per_sec, 100.0 * 4.0 / 2.0);
        assert_eq!(rate.xmit_bytes_per_sec, 200.0 * 4.0 / 2.0);

        // The port snapshot stays in word units; only the rate is scaled.
        assert_eq!(
            collector.series.get("mlx4_0:1").unwrap().current,
            IbCounters {
                rcv_data: 100,
                xmit_data: 200,
            }
        );
    }

    #[test]
    fn test_no_boundary_no_rotation() {
        let mut collector =
            Collector::new::<FakePerfQuery>(get_logger(), &IbpqConfig::default()).unwrap();

        for _ in 0..3 {
            collector
                .sample::<FakePerfQuery>(Duration::from_secs(1), false)
                .unwrap();
            assert_eq!(
                collector.rates(),
                btreemap! { "total".to_string() => IbRate::default() }
            );
            assert_eq!(
                collector.series.get(TOTAL_SERIES).unwrap().previous,
                IbCounters::default()
            );
        }

        // The boundary still sees the full delta from the zero baseline.
        collector
            .sample::<FakePerfQuery>(Duration::from_secs(1), true)
            .unwrap();
        let rates = collector.rates();
        assert_eq!(rates.get(TOTAL_SERIES).unwrap().rcv_bytes_per_sec, 600.0);
    }

    #[test]
    fn test_rotation_zeroes_next_interval() {
        let mut collector =
            Collector::new::<FakePerfQuery>(get_logger(), &IbpqConfig::default()).unwrap();

        collector
            .sample::<FakePerfQuery>(Duration::from_secs(1), true)
            .unwrap();
        // Counters did not move between intervals.
        collector
            .sample::<FakePerfQuery>(Duration::from_secs(1), true)
            .unwrap();

        assert_eq!(
            collector.rates(),
            btreemap! { "total".to_string() => IbRate::default() }
        );
    }

    #[test]
    fn test_bytes_per_sec_wraparound() {
        // Previous sample 10 words below the modulus, current 5 words past
        // it: 15 words moved, 60 bytes.
        let prev: u64 = u64::MAX - 9;
        let cur: u64 = 5;
        assert_eq!(bytes_per_sec!(prev, cur, 4.0, Duration::from_secs(1)), 60.0);
    }

    #[test]
    fn test_counter_wraparound() {
        let config = IbpqConfig {
            interfaces: vec!["mlx4_0:1".to_string()],
            report_all: false,
        };
        let mut collector = Collector::new::<FakePerfQuery>(get_logger(), &config).unwrap();

        // Pretend the previous interval ended just below the 2^64 modulus;
        // the fake reports (100, 200) for this one.
        let track = collector.series.get_mut("mlx4_0:1").unwrap();
        track.previous = IbCounters {
            rcv_data: u64::MAX - 9,
            xmit_data: u64::MAX - 99,
        };

        collector
            .sample::<FakePerfQuery>(Duration::from_secs(2), true)
            .unwrap();

        let rates = collector.rates();
        let rate = rates.get("mlx4_0:1").unwrap();
        assert_eq!(rate.rcv_bytes_per_sec, (100.0 + 10.0) * 4.0 / 2.0);
        assert_eq!(rate.xmit_bytes_per_sec, (200.0 + 100.0) * 4.0 / 2.0);
    }

    #[test]
    fn test_query_failure_fails_cycle() {
        let mut collector =
            Collector::new::<FlakyPerfQuery>(get_logger(), &IbpqConfig::default()).unwrap();
        assert!(
            collector
                .sample::<FlakyPerfQuery>(Duration::from_secs(1), true)
                .is_err()
        );
    }

    #[test]
    fn test_unresolvable_config_fails_construction() {
        let config = IbpqConfig {
            interfaces: vec!["nonexistent:1".to_string()],
            report_all: false,
        };
        assert!(Collector::new::<FakePerfQuery>(get_logger(), &config).is_err());
    }
}
