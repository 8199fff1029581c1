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

use std::fs::OpenOptions;
use std::io;
use std::path::Path;

use slog::Drain;
use slog::error;
use slog::o;

fn setup_log<T: 'static + io::Write + Send>(out: T) -> slog::Logger {
    let decorator = slog_term::PlainSyncDecorator::new(out);
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    slog::Logger::root(drain, o!())
}

/// Logger for hosts that want a log file. Falls back to stderr when the
/// path cannot be opened, so the plugin never brings down its host over
/// logging.
pub fn setup(path: &Path) -> slog::Logger {
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => setup_log(file),
        Err(e) => {
            let logger = setup_log(io::stderr());
            error!(
                logger,
                "Fail to open log path: {}. Redirecting all log to stderr.", e
            );
            logger
        }
    }
}

pub fn get_logger() -> slog::Logger {
    let plain = slog_term::PlainSyncDecorator::new(std::io::stderr());
    slog::Logger::root(slog_term::FullFormat::new(plain).build().fuse(), slog::o!())
}
