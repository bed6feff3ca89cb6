use crate::debugger::engine::EngineError;
use nix::unistd::Pid;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // --------------------------------- attach errors ---------------------------------------------
    #[error("process pid {0} not found")]
    AttachedProcessNotFound(Pid),
    #[error("runtime module `{module}` not found in process {pid}")]
    RuntimeNotFound { pid: Pid, module: String },

    // --------------------------------- engine errors ---------------------------------------------
    #[error(transparent)]
    Engine(#[from] EngineError),

    // --------------------------------- session state errors --------------------------------------
    #[error("no active debug session")]
    NoSession,
    #[error("debug session already active")]
    AlreadyAttached,

    // --------------------------------- debugee process errors ------------------------------------
    #[error("debugee process is not running")]
    ProcessNotRunning,
}

#[macro_export]
macro_rules! _error {
    ($log_fn: path, $res: expr) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                $log_fn!(target: "debugger", "{:#}", e);
                None
            }
        }
    };
    ($log_fn: path, $res: expr, $msg: tt) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                $log_fn!(target: "debugger", concat!($msg, " {:#}"), e);
                None
            }
        }
    };
}

/// Transforms `Result` into `Option` and logs an error if it occurs.
#[macro_export]
macro_rules! weak_error {
    ($res: expr) => {
        $crate::_error!(log::warn, $res)
    };
    ($res: expr, $msg: tt) => {
        $crate::_error!(log::warn, $res, $msg)
    };
}

/// Transforms `Result` into `Option` and put error into debug logs if it occurs.
#[macro_export]
macro_rules! muted_error {
    ($res: expr) => {
        $crate::_error!(log::debug, $res)
    };
    ($res: expr, $msg: tt) => {
        $crate::_error!(log::debug, $res, $msg)
    };
}
