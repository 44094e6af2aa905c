//! Process supervisor error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no free port available")]
    NoFreePort,

    #[error("process {0} did not exit within the grace period")]
    KillTimeout(u32),
}
