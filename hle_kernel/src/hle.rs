//! High-level service emulation
//!
//! A service implemented on the host side registers a
//! [`SessionRequestHandler`]. Ports created with a handler bypass the guest
//! entirely: connecting immediately binds the session to the handler, and a
//! sync request is answered by host code against the requesting thread's
//! command buffer instead of signaling a server thread.

use crate::object::ObjectId;
use crate::Kernel;
use kernel_types::{KernelError, ResultCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Words in a thread's IPC command buffer.
pub const COMMAND_BUFFER_WORDS: usize = 64;

/// Registry key for an installed session request handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandlerId(u32);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler({})", self.0)
    }
}

/// Host-side implementation of a service protocol.
///
/// Handlers receive the full kernel so they can create objects, signal
/// events or open further sessions while answering a request.
pub trait SessionRequestHandler {
    /// Answers one sync request. The request words are in the requesting
    /// thread's command buffer; the reply is written back into it.
    fn handle_sync_request(
        &mut self,
        kernel: &mut Kernel,
        session: ObjectId,
        thread: ObjectId,
    ) -> ResultCode;

    /// A new session was bound to this handler.
    fn client_connected(&mut self, _kernel: &mut Kernel, _session: ObjectId) {}

    /// A bound session's client went away.
    fn client_disconnected(&mut self, _kernel: &mut Kernel, _session: ObjectId) {}
}

/// Owns the installed handlers and the sessions bound to each.
///
/// Dispatch removes the entry for the duration of the call so the handler
/// can borrow the kernel mutably, then puts it back.
#[derive(Default)]
pub struct HandlerRegistry {
    entries: HashMap<HandlerId, HandlerEntry>,
    next_id: u32,
}

pub(crate) struct HandlerEntry {
    pub(crate) handler: Box<dyn SessionRequestHandler>,
    /// Sessions currently bound to the handler. Keeping them here means a
    /// service can enumerate its clients even after the guest drops its
    /// own handles.
    pub(crate) connected_sessions: Vec<ObjectId>,
}

impl HandlerRegistry {
    pub(crate) fn install(&mut self, handler: Box<dyn SessionRequestHandler>) -> HandlerId {
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        self.entries.insert(
            id,
            HandlerEntry {
                handler,
                connected_sessions: Vec::new(),
            },
        );
        id
    }

    pub(crate) fn take(&mut self, id: HandlerId) -> Option<HandlerEntry> {
        self.entries.remove(&id)
    }

    pub(crate) fn put_back(&mut self, id: HandlerId, entry: HandlerEntry) {
        self.entries.insert(id, entry);
    }

    pub(crate) fn connected_sessions(&self, id: HandlerId) -> &[ObjectId] {
        self.entries
            .get(&id)
            .map(|entry| entry.connected_sessions.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Kernel {
    /// Installs a handler so ports can be created against it.
    pub fn install_handler(&mut self, handler: Box<dyn SessionRequestHandler>) -> HandlerId {
        self.handlers.install(handler)
    }

    /// Sessions currently bound to the handler.
    pub fn handler_sessions(&self, id: HandlerId) -> Vec<ObjectId> {
        self.handlers.connected_sessions(id).to_vec()
    }

    /// Reads a thread's IPC command buffer.
    pub fn command_buffer(
        &self,
        thread: ObjectId,
    ) -> Result<&[u32; COMMAND_BUFFER_WORDS], KernelError> {
        Ok(&self.thread(thread)?.command_buffer)
    }

    /// Writes words at the start of a thread's IPC command buffer.
    pub fn write_command_buffer(
        &mut self,
        thread: ObjectId,
        words: &[u32],
    ) -> Result<(), KernelError> {
        if words.len() > COMMAND_BUFFER_WORDS {
            return Err(KernelError::OutOfRange(format!(
                "command of {} words exceeds buffer of {COMMAND_BUFFER_WORDS}",
                words.len()
            )));
        }
        self.thread_mut(thread)?.command_buffer[..words.len()].copy_from_slice(words);
        Ok(())
    }

    pub(crate) fn notify_client_connected(&mut self, id: HandlerId, session: ObjectId) {
        if let Some(mut entry) = self.handlers.take(id) {
            entry.connected_sessions.push(session);
            entry.handler.client_connected(self, session);
            self.handlers.put_back(id, entry);
        }
    }

    pub(crate) fn notify_client_disconnected(&mut self, id: HandlerId, session: ObjectId) {
        if let Some(mut entry) = self.handlers.take(id) {
            entry.connected_sessions.retain(|&s| s != session);
            entry.handler.client_disconnected(self, session);
            self.handlers.put_back(id, entry);
        }
    }

    /// Runs the handler for one request. Returns the handler's result
    /// unchanged; the caller decides how to surface an error code.
    pub(crate) fn dispatch_sync_request(
        &mut self,
        id: HandlerId,
        session: ObjectId,
        thread: ObjectId,
    ) -> Option<ResultCode> {
        let mut entry = self.handlers.take(id)?;
        let result = entry.handler.handle_sync_request(self, session, thread);
        self.handlers.put_back(id, entry);
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::THREADPRIO_DEFAULT;
    use kernel_types::RESULT_SUCCESS;

    struct Echo;

    impl SessionRequestHandler for Echo {
        fn handle_sync_request(
            &mut self,
            kernel: &mut Kernel,
            _session: ObjectId,
            thread: ObjectId,
        ) -> ResultCode {
            let word = kernel.command_buffer(thread).unwrap()[0];
            kernel.write_command_buffer(thread, &[word, word]).unwrap();
            RESULT_SUCCESS
        }
    }

    #[test]
    fn test_command_buffer_round_trip() {
        let mut kernel = Kernel::new();
        let thread = kernel.create_thread("t", THREADPRIO_DEFAULT).unwrap();
        kernel.write_command_buffer(thread, &[1, 2, 3]).unwrap();
        assert_eq!(&kernel.command_buffer(thread).unwrap()[..3], &[1, 2, 3]);
    }

    #[test]
    fn test_oversized_command_is_rejected() {
        let mut kernel = Kernel::new();
        let thread = kernel.create_thread("t", THREADPRIO_DEFAULT).unwrap();
        let words = vec![0u32; COMMAND_BUFFER_WORDS + 1];
        assert!(matches!(
            kernel.write_command_buffer(thread, &words),
            Err(KernelError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_dispatch_takes_out_and_puts_back() {
        let mut kernel = Kernel::new();
        let id = kernel.install_handler(Box::new(Echo));
        let thread = kernel.create_thread("t", THREADPRIO_DEFAULT).unwrap();
        let session = kernel.create_thread("fake", THREADPRIO_DEFAULT).unwrap();

        kernel.write_command_buffer(thread, &[7]).unwrap();
        let result = kernel.dispatch_sync_request(id, session, thread);
        assert_eq!(result, Some(RESULT_SUCCESS));
        assert_eq!(&kernel.command_buffer(thread).unwrap()[..2], &[7, 7]);
        assert_eq!(kernel.handlers.len(), 1);
    }
}
