//! Notifications delivered by the debugging engine.

use crate::debugger::engine::{Domain, EngineStatus, ExecutionControl, Module, Process, Thread};
use std::sync::Arc;
use strum_macros::AsRefStr;

/// A single debugee notification.
///
/// The set is closed: every notification kind the engine can deliver has a
/// variant here, which forces the dispatcher match to decide a continuation
/// for each of them. Variants carry the engine handles a reaction needs.
#[derive(Clone, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum DebugEvent {
    ProcessCreated(Arc<dyn Process>),
    ProcessExited {
        exit_code: i32,
    },
    ThreadCreated {
        domain: Arc<dyn Domain>,
        thread: Arc<dyn Thread>,
    },
    ThreadExited {
        domain: Arc<dyn Domain>,
        thread: Arc<dyn Thread>,
    },
    BreakpointHit {
        domain: Arc<dyn Domain>,
        thread: Arc<dyn Thread>,
    },
    StepComplete {
        domain: Arc<dyn Domain>,
        thread: Arc<dyn Thread>,
    },
    /// Asynchronous break requested in the debugee.
    Break {
        domain: Arc<dyn Domain>,
        thread: Arc<dyn Thread>,
    },
    /// Managed exception, first chance (`unhandled == false`) or unhandled.
    Exception {
        domain: Arc<dyn Domain>,
        thread: Arc<dyn Thread>,
        unhandled: bool,
    },
    /// Staged exception-processing notice (catch handler found and similar).
    ExceptionPhase {
        domain: Arc<dyn Domain>,
        thread: Arc<dyn Thread>,
    },
    ExceptionUnwind {
        domain: Arc<dyn Domain>,
        thread: Arc<dyn Thread>,
    },
    EvalComplete {
        domain: Arc<dyn Domain>,
        thread: Arc<dyn Thread>,
    },
    EvalException {
        domain: Arc<dyn Domain>,
        thread: Arc<dyn Thread>,
    },
    ModuleLoaded {
        domain: Arc<dyn Domain>,
        module: Arc<dyn Module>,
    },
    ModuleUnloaded {
        domain: Arc<dyn Domain>,
        module: Arc<dyn Module>,
    },
    ClassLoaded {
        domain: Arc<dyn Domain>,
    },
    ClassUnloaded {
        domain: Arc<dyn Domain>,
    },
    AssemblyLoaded {
        domain: Arc<dyn Domain>,
    },
    AssemblyUnloaded {
        domain: Arc<dyn Domain>,
    },
    DomainCreated {
        process: Arc<dyn Process>,
    },
    DomainExited {
        domain: Arc<dyn Domain>,
    },
    LogMessage {
        domain: Arc<dyn Domain>,
    },
    LogSwitch {
        domain: Arc<dyn Domain>,
    },
    NameChanged {
        domain: Arc<dyn Domain>,
    },
    SymbolsUpdated {
        domain: Arc<dyn Domain>,
        module: Arc<dyn Module>,
    },
    RemapOpportunity {
        domain: Arc<dyn Domain>,
        thread: Arc<dyn Thread>,
    },
    RemapComplete {
        domain: Arc<dyn Domain>,
        thread: Arc<dyn Thread>,
    },
    BreakpointSetError {
        domain: Arc<dyn Domain>,
        thread: Arc<dyn Thread>,
    },
    /// The engine reported an internal fault for the debugee.
    EngineFault {
        process: Arc<dyn Process>,
        status: EngineStatus,
    },
    ControlTrap {
        process: Arc<dyn Process>,
    },
    ConnectionCreated {
        process: Arc<dyn Process>,
    },
    ConnectionChanged {
        process: Arc<dyn Process>,
    },
    ConnectionDestroyed {
        process: Arc<dyn Process>,
    },
    MdaNotification {
        process: Arc<dyn Process>,
        thread: Arc<dyn Thread>,
    },
}

impl DebugEvent {
    /// Notification kind name for logs.
    pub fn kind(&self) -> &str {
        self.as_ref()
    }

    /// Execution controller the notification was delivered on, used to
    /// acknowledge it. `None` only for process exit, the one notification
    /// with nothing left to resume.
    pub fn controller(&self) -> Option<&dyn ExecutionControl> {
        use DebugEvent::*;

        match self {
            ProcessCreated(process) => Some(process.as_ref()),
            ProcessExited { .. } => None,
            ThreadCreated { domain, .. }
            | ThreadExited { domain, .. }
            | BreakpointHit { domain, .. }
            | StepComplete { domain, .. }
            | Break { domain, .. }
            | Exception { domain, .. }
            | ExceptionPhase { domain, .. }
            | ExceptionUnwind { domain, .. }
            | EvalComplete { domain, .. }
            | EvalException { domain, .. }
            | ModuleLoaded { domain, .. }
            | ModuleUnloaded { domain, .. }
            | ClassLoaded { domain }
            | ClassUnloaded { domain }
            | AssemblyLoaded { domain }
            | AssemblyUnloaded { domain }
            | DomainExited { domain }
            | LogMessage { domain }
            | LogSwitch { domain }
            | NameChanged { domain }
            | SymbolsUpdated { domain, .. }
            | RemapOpportunity { domain, .. }
            | RemapComplete { domain, .. }
            | BreakpointSetError { domain, .. } => Some(domain.as_ref()),
            DomainCreated { process }
            | EngineFault { process, .. }
            | ControlTrap { process }
            | ConnectionCreated { process }
            | ConnectionChanged { process }
            | ConnectionDestroyed { process }
            | MdaNotification { process, .. } => Some(process.as_ref()),
        }
    }
}
