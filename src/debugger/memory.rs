//! Best-effort reads of debugee memory.

use crate::debugger::error::Error;
use crate::debugger::session::SessionContext;
use nix::unistd::{sysconf, SysconfVar};
use once_cell::sync::Lazy;
use std::sync::Arc;

static PAGE_SIZE: Lazy<u64> = Lazy::new(|| {
    sysconf(SysconfVar::PAGE_SIZE)
        .ok()
        .flatten()
        .map(|size| size as u64)
        .unwrap_or(4096)
});

/// OS page size of the debugger host.
pub fn page_size() -> u64 {
    *PAGE_SIZE
}

/// Address of the first byte after the page containing `addr`.
pub fn next_page_boundary(addr: u64) -> u64 {
    let page = page_size();
    (addr + page) & !(page - 1)
}

/// Reader of debugee memory that tolerates ranges spanning into unmapped
/// pages.
///
/// Callers like stack walking and value formatting prefer best-effort
/// partial data over a hard failure, debugee memory can be unmapped past
/// arbitrary offsets.
pub struct MemoryReader {
    ctx: Arc<SessionContext>,
}

impl MemoryReader {
    pub fn new(ctx: Arc<SessionContext>) -> Self {
        Self { ctx }
    }

    /// Read up to `len` bytes at `addr` from the debugee.
    ///
    /// If the full-length read fails, the read is retried clipped to the
    /// page containing `addr` and the shorter result is returned. Fails with
    /// [`Error::ProcessNotRunning`] when there is no live debugee, or with
    /// the engine error when even the clipped read fails.
    pub fn read(&self, addr: u64, len: usize) -> Result<Vec<u8>, Error> {
        let process = self
            .ctx
            .process()
            .get()
            .ok_or(Error::ProcessNotRunning)?;

        let mut buf = vec![0u8; len];
        match process.read_memory(addr, &mut buf) {
            Ok(read) => {
                buf.truncate(read);
                Ok(buf)
            }
            Err(_) => {
                let to_boundary = (next_page_boundary(addr) - addr) as usize;
                let mut buf = vec![0u8; len.min(to_boundary)];
                let read = process.read_memory(addr, &mut buf)?;
                buf.truncate(read);
                Ok(buf)
            }
        }
    }
}
