//! Session core of a machine-interface debugger for managed runtimes.
//!
//! `mdbg` attaches to a running debugee, reacts to the asynchronous
//! notifications its debugging engine delivers, and emits a line-oriented
//! MI protocol stream for a driving console or IDE.
//!
//! The crate is built around three seams:
//!
//! * [`debugger::engine`], the opaque debugging-engine capability. The core
//!   never talks to a concrete engine; an embedder supplies implementations
//!   of the engine traits (attach, stop/resume, memory reads, notification
//!   delivery).
//! * Collaborator traits in [`debugger`]: breakpoint storage, module and
//!   symbol bookkeeping, frame rendering, exception metadata and evaluation
//!   waits live in external components and are consumed through narrow
//!   interfaces.
//! * [`mi`], the synchronized protocol writer and the value escaping used
//!   for every quoted field.
//!
//! [`debugger::Debugger`] owns the session lifecycle (attach, detach,
//! terminate) and is the object a frontend calls into, while the event
//! dispatcher runs on the engine's own notification thread. Both sides share
//! one [`debugger::session::SessionContext`].

pub mod debugger;
pub mod mi;
