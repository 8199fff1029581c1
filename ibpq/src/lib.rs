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

#![deny(clippy::all)]

//! InfiniBand/RoCE throughput collection plugin.
//!
//! Discovers host channel adapter ports, samples their hardware data
//! counters through `perfquery`, and publishes per-interval receive/send
//! byte rates per adapter port plus an aggregate `total` series. The
//! embedding monitoring framework owns scheduling and display; it drives
//! [`IbpqPlugin::sample`] and reads back [`IbpqPlugin::rates`].

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Result;

pub use common::logutil;
pub use config::IbpqConfig;
pub use model::Collector;
pub use model::IbRate;
pub use model::TOTAL_SERIES;
pub use perfquery::PerfQuery;
pub use perfquery::PerfQueryable;


/// Collaborator-facing plugin surface, bound to the live query tools.
pub struct IbpqPlugin {
    collector: Collector,
}

impl IbpqPlugin {
    pub fn new(logger: slog::Logger, config: &IbpqConfig) -> Result<Self> {
        Ok(Self {
            collector: Collector::new::<PerfQuery>(logger, config)?,
        })
    }

    /// Display labels, one per published series ("ib/<name>").
    pub fn names(&self) -> Vec<String> {
        self.collector.display_names()
    }

    /// Sample all ports; on an interval boundary also publish fresh rates.
    pub fn sample(&mut self, elapsed: Duration, boundary: bool) -> Result<()> {
        self.collector.sample::<PerfQuery>(elapsed, boundary)
    }

    /// Last published rates in bytes/sec, keyed by series name.
    pub fn rates(&self) -> BTreeMap<String, IbRate> {
        self.collector.rates()
    }
}
