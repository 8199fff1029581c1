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

use anyhow::Result;
use anyhow::bail;

use config::IbpqConfig;

use crate::sample::TOTAL_SERIES;

/// Resolve which series get published, in order.
///
/// An explicit interface list wins verbatim. Otherwise the aggregate
/// `total` alone, or every discovered name sorted lexicographically when
/// `report_all` is set. Names matching nothing discovered (and not `total`)
/// are dropped; an empty result is a configuration error.
pub fn select_series(config: &IbpqConfig, discovered: &[String]) -> Result<Vec<String>> {
    let candidates: Vec<String> = if !config.interfaces.is_empty() {
        config.interfaces.clone()
    } else if !config.report_all {
        vec![TOTAL_SERIES.to_string()]
    } else {
        let mut names = discovered.to_vec();
        names.sort();
        names
    };

    let selected: Vec<String> = candidates
        .into_iter()
        .filter(|name| name == TOTAL_SERIES || discovered.contains(name))
        .collect();

    if selected.is_empty() {
        bail!("No suitable network interfaces found to monitor");
    }

    Ok(selected)
}

/// Display labels for the published series.
pub fn display_names(series: &[String]) -> Vec<String> {
    series.iter().map(|name| format!("ib/{}", name)).collect()
}
