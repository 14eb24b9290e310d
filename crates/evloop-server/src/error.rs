// SPDX-License-Identifier: (MIT OR Apache-2.0)
use std::io;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("worker pool is shut down")]
    WorkerPoolClosed,

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}
