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

use std::process::Command;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Captures;
use regex::Regex;

use crate::PerfQueryError;
use crate::Result;
use crate::types::{IbCounters, IbPort};

/// Tool listing host channel adapters and their ports.
pub const DEVINFO_TOOL: &str = "ibv_devinfo";
/// Tool reading port performance counters by lid.
pub const PERFQUERY_TOOL: &str = "perfquery";

/// Counter labels of interest in `perfquery` output, in word units.
pub const XMIT_DATA_COUNTER: &str = "PortXmitData";
pub const RCV_DATA_COUNTER: &str = "PortRcvData";

static HCA_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^hca_id:\s+(\S+)").unwrap());
static PORT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s+port:\s*(\d+)").unwrap());
static PORT_LID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s+port_lid:\s+(\d+)").unwrap());
static COUNTER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.+?):\.+(\d+)").unwrap());

fn parse_capture<T: FromStr>(cap: &Captures, group: usize, line: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    cap[group]
        .parse()
        .map_err(|e| PerfQueryError::ParseError(format!("{} in line {:?}", e, line)))
}

/// Scan `ibv_devinfo` output for adapter ports with an assigned lid.
///
/// A `hca_id:` line opens a device record and a nested `port:` line opens a
/// port record; the first `port_lid:` line consumes both, emitting the port
/// if its lid is nonzero. Emission order follows tool output order.
pub fn parse_devinfo(output: &str) -> Result<Vec<IbPort>> {
    let mut ports = Vec::new();
    let mut current_device: Option<&str> = None;
    let mut current_port: Option<u32> = None;

    for line in output.lines() {
        if let Some(cap) = HCA_ID_RE.captures(line) {
            current_device = Some(cap.get(1).map_or("", |m| m.as_str()));
        } else if let Some(cap) = PORT_RE.captures(line) {
            current_port = Some(parse_capture(&cap, 1, line)?);
        } else if let Some(cap) = PORT_LID_RE.captures(line) {
            if let (Some(device), Some(port)) = (current_device, current_port) {
                let lid: u32 = parse_capture(&cap, 1, line)?;
                if lid != 0 {
                    ports.push(IbPort {
                        name: format!("{}:{}", device, port),
                        lid,
                    });
                }
            }
            current_device = None;
            current_port = None;
        }
    }

    Ok(ports)
}

/// Extract the receive/transmit data counters from `perfquery` output.
///
/// Counter lines look like `PortRcvData:....................5738988`.
/// Scanning stops as soon as both labels have been seen; unrelated lines
/// are skipped. Output that ends before both labels appear is an error.
pub fn parse_counters(output: &str) -> Result<IbCounters> {
    let mut rcv_data = None;
    let mut xmit_data = None;

    for line in output.lines() {
        let cap = match COUNTER_RE.captures(line) {
            Some(cap) => cap,
            None => continue,
        };
        match &cap[1] {
            XMIT_DATA_COUNTER => xmit_data = Some(parse_capture(&cap, 2, line)?),
            RCV_DATA_COUNTER => rcv_data = Some(parse_capture(&cap, 2, line)?),
            _ => {}
        }
        if let (Some(rcv_data), Some(xmit_data)) = (rcv_data, xmit_data) {
            return Ok(IbCounters {
                rcv_data,
                xmit_data,
            });
        }
    }

    Err(PerfQueryError::MissingCounter(if rcv_data.is_none() {
        RCV_DATA_COUNTER
    } else {
        XMIT_DATA_COUNTER
    }))
}

/// A source of raw tool output for discovery and counter queries.
///
/// This trait allows mocking the tool invocations for unit testing.
pub trait PerfQueryable {
    fn new() -> Result<Self>
    where
        Self: Sized;
    /// Capture `ibv_devinfo` output.
    fn devinfo(&self) -> Result<String>;
    /// Capture `perfquery` output for the port identified by `lid`.
    fn counters(&self, lid: u32) -> Result<String>;
}

pub struct PerfQuery;

impl PerfQuery {
    fn capture(tool: &'static str, args: &[&str]) -> Result<String> {
        let output = Command::new(tool)
            .args(args)
            .output()
            .map_err(|source| PerfQueryError::InvocationError { tool, source })?;
        if !output.status.success() {
            return Err(PerfQueryError::CommandFailed {
                tool,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl PerfQueryable for PerfQuery {
    fn new() -> Result<Self> {
        Ok(Self {})
    }

    fn devinfo(&self) -> Result<String> {
        Self::capture(DEVINFO_TOOL, &[])
    }

    /// Equivalent to `perfquery -x <lid> 1`: -x selects the 64-bit extended
    /// counters, the trailing 1 is the tool's own sampling window in seconds.
    fn counters(&self, lid: u32) -> Result<String> {
        Self::capture(PERFQUERY_TOOL, &["-x", &lid.to_string(), "1"])
    }
}

#[derive(Default)]
pub struct PortReader;

impl PortReader {
    pub fn new() -> Self {
        Self {}
    }

    /// Discover active adapter ports, in tool output order.
    pub fn discover<T: PerfQueryable>(&self) -> Result<Vec<IbPort>> {
        let querier = T::new()?;
        parse_devinfo(&querier.devinfo()?)
    }

    /// Read cumulative data counters for a single port identified by `lid`.
    pub fn read_counters<T: PerfQueryable>(&self, lid: u32) -> Result<IbCounters> {
        let querier = T::new()?;
        parse_counters(&querier.counters(lid)?)
    }
}
