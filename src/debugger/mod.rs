//! Debugee session controller and the collaborator seams it drives.

mod dispatch;
pub mod engine;
pub mod error;
pub mod event;
pub mod memory;
pub mod session;

pub use error::Error;

use crate::debugger::dispatch::EventDispatcher;
use crate::debugger::engine::{DebugEngine, EngineFactory, Frame, Module, Process, Thread, Value};
use crate::debugger::memory::MemoryReader;
use crate::debugger::session::SessionContext;
use crate::mi::OutputSink;
use crate::weak_error;
use nix::unistd::Pid;
use std::sync::Arc;

/// Storage and resolution of user breakpoints (external component).
pub trait BreakpointStore: Send + Sync {
    /// Protocol id of the breakpoint the given thread is currently stopped
    /// at, if it can be resolved.
    fn find_current_id(&self, thread: &dyn Thread) -> Option<u32>;

    /// Try to bind pending breakpoints against a module whose symbols just
    /// became available.
    fn resolve_pending(&self, module: &dyn Module);

    /// Disable and forget every breakpoint known to the store.
    fn disable_and_clear_all(&self);
}

/// Module and symbol state resolved on a library load.
#[derive(Debug, Default, Clone)]
pub struct ModuleInfo {
    pub id: String,
    pub name: String,
    pub symbols_loaded: bool,
    pub base_address: u64,
    pub size: u32,
}

/// Module and symbol bookkeeping (external component).
pub trait ModuleStore: Send + Sync {
    /// Load symbols for a freshly mapped module and describe it.
    fn load_symbols(&self, module: &dyn Module) -> anyhow::Result<ModuleInfo>;

    /// Drop all cached per-module state.
    fn drop_cached(&self);
}

/// Renders the location fields of a stack frame for stop records (external
/// component).
pub trait FrameRenderer: Send + Sync {
    fn render(&self, frame: &dyn Frame) -> anyhow::Result<String>;
}

/// Resolves exception metadata from debugee metadata (external component).
pub trait ExceptionInspector: Send + Sync {
    fn type_of(&self, exception: &dyn Value) -> anyhow::Result<String>;

    /// Name of the module declaring the function the frame executes.
    fn declaring_module(&self, frame: &dyn Frame) -> anyhow::Result<String>;
}

/// Wait side of expression evaluation (external component).
pub trait EvalWaiter: Send + Sync {
    /// Wake every thread blocked on an evaluation result.
    fn signal_complete(&self);
}

/// External collaborators the session core drives.
pub struct Externals {
    pub breakpoints: Arc<dyn BreakpointStore>,
    pub modules: Arc<dyn ModuleStore>,
    pub frames: Arc<dyn FrameRenderer>,
    pub exceptions: Arc<dyn ExceptionInspector>,
    pub evals: Arc<dyn EvalWaiter>,
}

/// Owner of the debug session lifecycle: attach, detach and terminate.
///
/// Runs on the command thread. The event dispatcher it registers with the
/// engine runs on the engine notification thread; the two coordinate only
/// through the shared [`SessionContext`].
pub struct Debugger {
    factory: Box<dyn EngineFactory>,
    engine: Option<Box<dyn DebugEngine>>,
    process: Option<Arc<dyn Process>>,
    dispatcher: Arc<EventDispatcher>,
    ctx: Arc<SessionContext>,
    breakpoints: Arc<dyn BreakpointStore>,
    modules: Arc<dyn ModuleStore>,
}

impl Debugger {
    pub fn new(factory: Box<dyn EngineFactory>, out: OutputSink, externals: Externals) -> Self {
        let ctx = Arc::new(SessionContext::default());
        let breakpoints = externals.breakpoints.clone();
        let modules = externals.modules.clone();
        let dispatcher = Arc::new(EventDispatcher::new(ctx.clone(), out, externals));

        Self {
            factory,
            engine: None,
            process: None,
            dispatcher,
            ctx,
            breakpoints,
            modules,
        }
    }

    /// State shared with the event dispatcher: the live process slot and the
    /// last stopped thread marker.
    pub fn context(&self) -> &Arc<SessionContext> {
        &self.ctx
    }

    /// Reader over the live debugee memory.
    pub fn memory(&self) -> MemoryReader {
        MemoryReader::new(self.ctx.clone())
    }

    /// Thread that caused the most recent stop, `None` before the first one.
    pub fn last_stopped_thread(&self) -> Option<u32> {
        self.ctx.last_stopped_thread()
    }

    /// True while an attach succeeded and neither detach nor terminate
    /// completed.
    pub fn is_attached(&self) -> bool {
        self.engine.is_some() && self.process.is_some()
    }

    /// Block the calling thread until the debugee has exited.
    pub fn wait_for_exit(&self) {
        self.ctx.process().wait_until_empty();
    }

    /// Attach to the process with the given pid.
    ///
    /// Locates the target runtime module in the process, negotiates an
    /// engine capability for its version, registers the event dispatcher and
    /// requests the attach. A stale previous session is forcefully
    /// terminated first; attaching over a debugee that is still alive fails
    /// instead.
    pub fn attach(&mut self, pid: Pid) -> Result<(), Error> {
        if self.engine.is_some() || self.process.is_some() {
            if self.ctx.process().is_occupied() {
                return Err(Error::AlreadyAttached);
            }
            self.terminate()?;
        }

        let module_path = self.factory.locate_runtime(pid)?;
        let version = self.factory.version_token(pid, &module_path)?;
        let engine = self.factory.negotiate(&version)?;

        // past this point a failure must tear the half-built capability down
        if let Err(e) = engine.initialize() {
            weak_error!(engine.shutdown(), "engine teardown:");
            return Err(e.into());
        }
        if let Err(e) = engine.set_event_sink(self.dispatcher.clone()) {
            weak_error!(engine.shutdown(), "engine teardown:");
            return Err(e.into());
        }
        let process = match engine.attach(pid) {
            Ok(process) => process,
            Err(e) => {
                weak_error!(engine.shutdown(), "engine teardown:");
                return Err(e.into());
            }
        };

        self.ctx.clear_last_stopped_thread();
        self.engine = Some(engine);
        self.process = Some(process);
        Ok(())
    }

    /// Detach from the debugee, leaving it running.
    pub fn detach(&mut self) -> Result<(), Error> {
        let (engine, process) = self.take_session()?;

        if process.stop().is_ok() {
            self.disable_breakpoints_and_steppers(process.as_ref());
            weak_error!(process.detach(), "detach:");
        }
        self.modules.drop_cached();

        // detach produces no exit notification, the controller owns the
        // slot transition here
        self.ctx.process().clear_and_signal();

        drop(process);
        weak_error!(engine.shutdown(), "engine teardown:");
        Ok(())
    }

    /// Forcefully terminate the debugee and wait until it actually exited.
    ///
    /// Termination is asynchronous from the engine's point of view, so this
    /// blocks the calling thread until the process-exited notification has
    /// been observed by the dispatcher. Not cancellable.
    pub fn terminate(&mut self) -> Result<(), Error> {
        let (engine, process) = self.take_session()?;

        if process.stop().is_ok() {
            self.disable_breakpoints_and_steppers(process.as_ref());
        }
        self.modules.drop_cached();

        weak_error!(process.terminate(), "terminate:");
        self.ctx.process().wait_until_empty();

        drop(process);
        weak_error!(engine.shutdown(), "engine teardown:");
        Ok(())
    }

    fn take_session(&mut self) -> Result<(Box<dyn DebugEngine>, Arc<dyn Process>), Error> {
        match (self.engine.take(), self.process.take()) {
            (Some(engine), Some(process)) => Ok((engine, process)),
            (engine, process) => {
                self.engine = engine;
                self.process = process;
                Err(Error::NoSession)
            }
        }
    }

    /// Deactivate engine-side breakpoints and steppers in every execution
    /// domain and clear the breakpoint store. Ownership of engine-side state
    /// is being relinquished, stale state must not fire after us.
    fn disable_breakpoints_and_steppers(&self, process: &dyn Process) {
        let domains = match process.domains() {
            Ok(domains) => domains,
            Err(e) => {
                log::warn!(target: "debugger", "enumerate domains: {e:#}");
                return;
            }
        };

        for domain in domains {
            if let Some(breakpoints) = weak_error!(domain.breakpoints(), "enumerate breakpoints:")
            {
                for brkpt in breakpoints {
                    weak_error!(brkpt.activate(false), "deactivate breakpoint:");
                }
            }
            if let Some(steppers) = weak_error!(domain.steppers(), "enumerate steppers:") {
                for stepper in steppers {
                    weak_error!(stepper.deactivate(), "deactivate stepper:");
                }
            }
        }

        self.breakpoints.disable_and_clear_all();
    }
}
