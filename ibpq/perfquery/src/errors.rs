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

use std::process::ExitStatus;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PerfQueryError {
    #[error("Failed to run {tool}, error={source:}")]
    InvocationError {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {status}: {stderr}")]
    CommandFailed {
        tool: &'static str,
        status: ExitStatus,
        stderr: String,
    },

    #[error("{0} counter not found in perfquery output")]
    MissingCounter(&'static str),

    #[error("Failed to parse tool output, error={0:}")]
    ParseError(String),
}
