//! Abstraction over the native debugging engine.
//!
//! The engine is an external capability: it attaches to a debugee, delivers
//! notifications and accepts control calls (stop, resume, detach, terminate,
//! read-memory). The session core is written entirely against the traits in
//! this module; an embedder supplies the concrete binding for its runtime,
//! the same way a `gdbstub` user supplies a `Target`.

use crate::debugger::error::Error;
use crate::debugger::event::DebugEvent;
use nix::unistd::Pid;
use std::any::Any;
use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Numeric status code delivered by the engine on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStatus(pub u32);

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Error returned by any call into the debugging engine.
///
/// Engine failures are never retried automatically, the status code is
/// surfaced to the caller as is.
#[derive(Debug, Clone, thiserror::Error)]
#[error("engine call failed with status {status}")]
pub struct EngineError {
    pub status: EngineStatus,
}

impl EngineError {
    pub fn new(status: u32) -> Self {
        Self {
            status: EngineStatus(status),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Receiver of debugee notifications.
///
/// The engine delivers notifications for one debugee serially, one at a
/// time, on its own thread. Implementations must nevertheless be safe to
/// invoke concurrently with control calls issued from the command thread.
pub trait EventSink: Send + Sync {
    fn dispatch(&self, event: DebugEvent);
}

/// Control surface shared by processes and execution domains: both can stop
/// or resume execution of everything they own.
pub trait ExecutionControl: Send + Sync {
    /// Synchronously stop the debugee.
    fn stop(&self) -> EngineResult<()>;

    /// Let the debugee run after a notification or an explicit stop.
    fn resume(&self) -> EngineResult<()>;
}

/// Live debugee process handle.
pub trait Process: ExecutionControl {
    fn detach(&self) -> EngineResult<()>;

    /// Request a forceful debugee termination. Termination is asynchronous,
    /// the engine reports completion with a process-exited notification.
    fn terminate(&self) -> EngineResult<()>;

    /// Read debugee memory at `addr` into `buf`, returning the number of
    /// bytes actually read.
    fn read_memory(&self, addr: u64, buf: &mut [u8]) -> EngineResult<usize>;

    /// Enumerate the execution domains currently present in the debugee.
    fn domains(&self) -> EngineResult<Vec<Arc<dyn Domain>>>;
}

/// Isolated execution context inside the debugee with its own engine-side
/// breakpoints and steppers.
pub trait Domain: ExecutionControl {
    fn breakpoints(&self) -> EngineResult<Vec<Arc<dyn Breakpoint>>>;
    fn steppers(&self) -> EngineResult<Vec<Arc<dyn Stepper>>>;
}

/// Engine-side breakpoint handle.
pub trait Breakpoint: Send + Sync {
    fn activate(&self, active: bool) -> EngineResult<()>;
}

/// Engine-side stepper handle.
pub trait Stepper: Send + Sync {
    fn deactivate(&self) -> EngineResult<()>;
}

/// Debugee thread handle.
pub trait Thread: Send + Sync {
    fn id(&self) -> u32;

    /// Topmost frame of the thread at its current stop location.
    fn active_frame(&self) -> EngineResult<Arc<dyn Frame>>;

    /// Exception object currently in flight on this thread.
    fn current_exception(&self) -> EngineResult<Arc<dyn Value>>;
}

/// Opaque stack frame handle, interpreted by a frame renderer.
pub trait Frame: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// Opaque debugee module handle, interpreted by a module store.
pub trait Module: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// Opaque debugee value handle (e.g. an in-flight exception object).
pub trait Value: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// Negotiated engine capability for one debugee runtime version.
pub trait DebugEngine: Send {
    fn initialize(&self) -> EngineResult<()>;

    /// Register the sink all debugee notifications are delivered to. The
    /// engine holds its own reference until [`DebugEngine::shutdown`].
    fn set_event_sink(&self, sink: Arc<dyn EventSink>) -> EngineResult<()>;

    fn attach(&self, pid: Pid) -> EngineResult<Arc<dyn Process>>;

    /// Tear the capability down, releasing engine-side resources.
    fn shutdown(&self) -> EngineResult<()>;
}

/// Entry point of an engine binding: locates the runtime inside a target
/// process and negotiates a capability compatible with its version.
pub trait EngineFactory: Send {
    /// File name of the runtime support module this engine debugs.
    fn runtime_module(&self) -> &str;

    /// Locate the runtime module inside the target process.
    ///
    /// The default implementation scans the process memory mappings for
    /// [`EngineFactory::runtime_module`].
    fn locate_runtime(&self, pid: Pid) -> Result<PathBuf, Error> {
        find_module_in_process(pid, self.runtime_module())
    }

    /// Derive a version token from the runtime module found in the debugee.
    fn version_token(&self, pid: Pid, module_path: &Path) -> EngineResult<String>;

    /// Negotiate an engine capability for the given version token.
    fn negotiate(&self, version: &str) -> EngineResult<Box<dyn DebugEngine>>;
}

/// Find a module mapped into a running process by its file name.
pub fn find_module_in_process(pid: Pid, module: &str) -> Result<PathBuf, Error> {
    let maps = proc_maps::get_process_maps(pid.as_raw())
        .map_err(|_| Error::AttachedProcessNotFound(pid))?;

    maps.iter()
        .filter_map(|range| range.filename())
        .find(|path| path.file_name() == Some(OsStr::new(module)))
        .map(Path::to_path_buf)
        .ok_or_else(|| Error::RuntimeNotFound {
            pid,
            module: module.to_string(),
        })
}
