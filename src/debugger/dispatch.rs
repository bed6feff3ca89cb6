//! The callback state machine reacting to debugee notifications.

use crate::debugger::engine::{EventSink, Thread};
use crate::debugger::event::DebugEvent;
use crate::debugger::session::SessionContext;
use crate::debugger::{
    BreakpointStore, EvalWaiter, ExceptionInspector, Externals, FrameRenderer, ModuleStore,
};
use crate::mi::{escape, OutputSink};
use crate::{muted_error, weak_error};
use std::sync::Arc;

/// Reacts to every notification the engine delivers: decides whether the
/// debugee resumes, updates the shared session state and emits protocol
/// records.
///
/// Handlers run on the engine notification thread, serially per debugee.
/// Every handler ends in exactly one of two states: a resume was issued, or
/// the debugee is deliberately left stopped. A failed sub-step degrades to
/// partial protocol output, leaving a handler without deciding the
/// continuation would stall the debugee forever.
pub struct EventDispatcher {
    ctx: Arc<SessionContext>,
    out: OutputSink,
    breakpoints: Arc<dyn BreakpointStore>,
    modules: Arc<dyn ModuleStore>,
    frames: Arc<dyn FrameRenderer>,
    exceptions: Arc<dyn ExceptionInspector>,
    evals: Arc<dyn EvalWaiter>,
}

impl EventDispatcher {
    pub(super) fn new(ctx: Arc<SessionContext>, out: OutputSink, externals: Externals) -> Self {
        Self {
            ctx,
            out,
            breakpoints: externals.breakpoints,
            modules: externals.modules,
            frames: externals.frames,
            exceptions: externals.exceptions,
            evals: externals.evals,
        }
    }

    /// Location fields of the thread's topmost frame, empty on any failure.
    fn render_current_frame(&self, thread: &dyn Thread) -> String {
        muted_error!(thread.active_frame(), "active frame:")
            .and_then(|frame| weak_error!(self.frames.render(frame.as_ref()), "render frame:"))
            .unwrap_or_default()
    }

    fn exception_info(&self, thread: &dyn Thread) -> (String, String) {
        let exc_type = muted_error!(thread.current_exception(), "current exception:")
            .and_then(|exc| weak_error!(self.exceptions.type_of(exc.as_ref()), "exception type:"))
            .unwrap_or_default();
        let exc_module = muted_error!(thread.active_frame(), "active frame:")
            .and_then(|frame| {
                weak_error!(
                    self.exceptions.declaring_module(frame.as_ref()),
                    "exception module:"
                )
            })
            .unwrap_or_default();
        (exc_type, exc_module)
    }

    /// Nobody consumes these notification kinds, but the debugee must still
    /// be resumed, otherwise it stalls forever.
    fn acknowledge(&self, event: DebugEvent) {
        if let Some(controller) = event.controller() {
            weak_error!(controller.resume(), "acknowledge notification:");
        }
    }
}

impl EventSink for EventDispatcher {
    fn dispatch(&self, event: DebugEvent) {
        log::debug!(target: "debugger", "notification: {}", event.kind());

        match event {
            // silent: the attach path already reports status elsewhere
            DebugEvent::ProcessCreated(process) => {
                self.ctx.process().set(process.clone());
                weak_error!(process.resume(), "resume debugee:");
            }
            DebugEvent::ProcessExited { exit_code } => {
                self.out
                    .line(format!("*stopped,reason=\"exited\",exit-code=\"{exit_code}\""));
                // pending evaluation results are void once the debugee is gone
                self.evals.signal_complete();
                self.ctx.process().clear_and_signal();
            }
            DebugEvent::ThreadCreated { domain, thread } => {
                self.out
                    .line(format!("=thread-created,id=\"{}\"", thread.id()));
                weak_error!(domain.resume(), "resume debugee:");
            }
            DebugEvent::ThreadExited { domain, thread } => {
                self.out
                    .line(format!("=thread-exited,id=\"{}\"", thread.id()));
                weak_error!(domain.resume(), "resume debugee:");
            }
            DebugEvent::BreakpointHit { thread, .. } => {
                let number = self
                    .breakpoints
                    .find_current_id(thread.as_ref())
                    .unwrap_or(0);
                let frame = self.render_current_frame(thread.as_ref());

                self.out.line(format!(
                    "*stopped,reason=\"breakpoint-hit\",thread-id=\"{}\",stopped-threads=\"all\",bkptno=\"{}\",frame={{{}}}",
                    thread.id(),
                    number,
                    frame,
                ));
                self.ctx.set_last_stopped_thread(thread.id());
                // the debugee stays stopped, that is the point of a breakpoint
            }
            DebugEvent::StepComplete { thread, .. } => {
                let frame = self.render_current_frame(thread.as_ref());

                self.out.line(format!(
                    "*stopped,reason=\"end-stepping-range\",thread-id=\"{}\",stopped-threads=\"all\",{}",
                    thread.id(),
                    frame,
                ));
                self.ctx.set_last_stopped_thread(thread.id());
            }
            DebugEvent::Exception {
                domain,
                thread,
                unhandled,
            } => {
                if unhandled {
                    let frame = self.render_current_frame(thread.as_ref());
                    self.out.line(format!(
                        "*stopped,reason=\"exception-received\",exception-stage=\"unhandled\",thread-id=\"{}\",stopped-threads=\"all\",{}",
                        thread.id(),
                        frame,
                    ));
                    self.ctx.set_last_stopped_thread(thread.id());
                } else {
                    let (exc_type, exc_module) = self.exception_info(thread.as_ref());
                    let mut text = format!("Exception thrown: '{exc_type}' in {exc_module}");
                    text.push('\n');
                    self.out.line(format!(
                        "=message,text=\"{}\",send-to=\"output-window\",source=\"target-exception\"",
                        escape(&text),
                    ));
                    weak_error!(domain.resume(), "resume debugee:");
                }
            }
            // the evaluation owner is woken and resumes the debugee itself
            DebugEvent::EvalComplete { .. } | DebugEvent::EvalException { .. } => {
                self.evals.signal_complete();
            }
            DebugEvent::ModuleLoaded { domain, module } => {
                let info = weak_error!(
                    self.modules.load_symbols(module.as_ref()),
                    "load module symbols:"
                )
                .unwrap_or_default();

                self.out.line(format!(
                    "=library-loaded,id=\"{{{}}}\",target-name=\"{}\",host-name=\"{}\",symbols-loaded=\"{}\",base-address=\"0x{:x}\",size=\"{}\"",
                    info.id,
                    escape(&info.name),
                    escape(&info.name),
                    info.symbols_loaded as u8,
                    info.base_address,
                    info.size,
                ));

                if info.symbols_loaded {
                    self.breakpoints.resolve_pending(module.as_ref());
                }
                weak_error!(domain.resume(), "resume debugee:");
            }
            DebugEvent::EngineFault { process, status } => {
                let text = format!("debugger error: {status}");
                self.out
                    .line(format!("=message,text=\"{}\"", escape(&text)));
                weak_error!(process.resume(), "resume debugee:");
            }
            event => self.acknowledge(event),
        }
    }
}
