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

use serde::{Deserialize, Serialize};

/// One active adapter port. `name` is the stable `"<device>:<port>"` key;
/// `lid` is the port's local identifier on the fabric, used for counter
/// queries. Ports without an assigned lid (lid 0) are never emitted.
#[derive(Default, Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct IbPort {
    pub name: String,
    pub lid: u32,
}

/// Cumulative data counters for one port since adapter reset.
///
/// The extended counters tick in 4-byte words and wrap at 2^64.
#[derive(Default, Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub struct IbCounters {
    pub rcv_data: u64,
    pub xmit_data: u64,
}
