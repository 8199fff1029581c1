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

use serde::Deserialize;
use serde::Serialize;

use perfquery::IbCounters;

/// Name of the synthesized aggregate series. Always computed over every
/// discovered port; published only when selected.
pub const TOTAL_SERIES: &str = "total";

/// Extended data counters tick in 4-byte words.
pub const WORD_SIZE: u64 = 4;

/// Per-interval throughput for one series, in bytes/sec.
#[derive(Default, Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub struct IbRate {
    pub rcv_bytes_per_sec: f64,
    pub xmit_bytes_per_sec: f64,
}

/// Snapshot pair and scaling for one tracked series.
///
/// `previous` holds the counters at the start of the open interval and only
/// rotates forward on an interval boundary. `factor` converts snapshot
/// deltas to bytes: the word size for raw port counters, 1.0 for the
/// aggregate whose components are scaled before accumulation.
#[derive(Default, Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct SeriesTrack {
    pub previous: IbCounters,
    pub current: IbCounters,
    pub factor: f64,
    pub rate: IbRate,
}

impl SeriesTrack {
    pub fn new(factor: f64) -> Self {
        Self {
            factor,
            ..Default::default()
        }
    }
}
