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

use std::fs;
use std::path::Path;

use anyhow::Result;
use anyhow::bail;
use serde::Deserialize;
use serde::Serialize;


pub const IBPQ_DEFAULT_CONF: &str = "/etc/ibpq/ibpq.conf";

/// Plugin configuration supplied by the embedding framework.
///
/// `interfaces` selects series to publish by `"<device>:<port>"` name (the
/// synthesized `"total"` is also a valid entry). When empty, `report_all`
/// decides between publishing every discovered port or just `"total"`.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
// If value is missing during deserialization, use the Default::default()
#[serde(default)]
pub struct IbpqConfig {
    pub interfaces: Vec<String>,
    pub report_all: bool,
}

impl IbpqConfig {
    pub fn load(path: &Path) -> Result<Self> {
        match path.exists() {
            true if !path.is_file() => bail!("{} exists and is not a file", path.to_string_lossy()),
            true => IbpqConfig::load_exists(path),
            false if path.to_string_lossy() == IBPQ_DEFAULT_CONF => Ok(Default::default()),
            false => bail!("No such file or directory: {}", path.to_string_lossy()),
        }
    }

    fn load_exists(path: &Path) -> Result<Self> {
        let string_config = match fs::read_to_string(path) {
            Ok(sc) => sc,
            Err(e) => {
                bail!(
                    "Failed to read from config file {}: {}",
                    path.to_string_lossy(),
                    e
                );
            }
        };

        match toml::from_str(string_config.as_str()) {
            Ok(ic) => Ok(ic),
            Err(e) => {
                bail!(
                    "Failed to parse config file {}: {}\n{}",
                    path.to_string_lossy(),
                    e,
                    string_config
                );
            }
        }
    }
}
