//! Sessions
//!
//! A session is one client's channel to a service. The client half carries
//! requests in; the server half is waitable and becomes signaled when a
//! request (or the client's departure) needs attention. Sessions bound to a
//! host-side handler never signal for requests; the handler answers inline.

use crate::hle::HandlerId;
use crate::object::{KernelObject, ObjectId};
use crate::wait_object::{SyncEvent, WaitList};
use crate::Kernel;
use kernel_types::{KernelError, ResultCode};

#[derive(Debug)]
pub struct ClientSession {
    pub(crate) name: String,
    /// Liveness-checked; the server half can die first.
    pub(crate) server_session: ObjectId,
}

#[derive(Debug)]
pub struct ServerSession {
    pub(crate) name: String,
    pub(crate) signaled: bool,
    pub(crate) handler: Option<HandlerId>,
    pub(crate) client_open: bool,
    /// Thread whose request is currently pending on a raw session.
    pub(crate) current_requester: Option<ObjectId>,
    pub(crate) waiting: WaitList,
}

impl Kernel {
    /// Creates a connected session pair named `name_Client` / `name_Server`.
    /// Each half carries its own creation reference.
    pub fn create_session_pair(
        &mut self,
        name: &str,
        handler: Option<HandlerId>,
    ) -> (ObjectId, ObjectId) {
        let server = self.objects.insert(KernelObject::ServerSession(ServerSession {
            name: format!("{name}_Server"),
            signaled: false,
            handler,
            client_open: true,
            current_requester: None,
            waiting: WaitList::new(),
        }));
        let client = self.objects.insert(KernelObject::ClientSession(ClientSession {
            name: format!("{name}_Client"),
            server_session: server,
        }));
        (client, server)
    }

    /// Sends one sync request down a client session on behalf of a thread.
    ///
    /// With a handler bound, the request is answered before this returns
    /// and the handler's result code is passed through unchanged. On a raw
    /// session the server half is signaled and its waiters woken; the reply
    /// arrives whenever server code gets around to it.
    pub fn send_sync_request(
        &mut self,
        client_session: ObjectId,
        thread: ObjectId,
    ) -> Result<ResultCode, KernelError> {
        let server = self.client_session(client_session)?.server_session;
        if !self.objects.is_alive(server) {
            log::error!("sync request on {client_session} whose server half is gone");
            return Err(KernelError::SessionClosed);
        }

        match self.server_session(server)?.handler {
            Some(handler) => self
                .dispatch_sync_request(handler, server, thread)
                .ok_or(KernelError::SessionClosed),
            None => {
                let session = self.server_session_mut(server)?;
                session.signaled = true;
                session.current_requester = Some(thread);
                self.sync_audit
                    .push(SyncEvent::ObjectSignaled { object: server });
                self.wakeup_all_waiting_threads(server);
                Ok(kernel_types::RESULT_SUCCESS)
            }
        }
    }

    /// Thread whose raw request is pending on the server half, if any.
    pub fn session_current_requester(
        &self,
        server_session: ObjectId,
    ) -> Result<Option<ObjectId>, KernelError> {
        Ok(self.server_session(server_session)?.current_requester)
    }

    pub fn session_client_open(&self, server_session: ObjectId) -> Result<bool, KernelError> {
        Ok(self.server_session(server_session)?.client_open)
    }

    /// Called while releasing a client session's last reference. Marks the
    /// server half closed, wakes its waiters so they observe the close, and
    /// detaches the handler binding.
    pub(crate) fn finalize_client_session(&mut self, server_session: ObjectId) {
        if !self.objects.is_alive(server_session) {
            return;
        }
        let handler = match self.server_session_mut(server_session) {
            Ok(session) => {
                session.client_open = false;
                session.signaled = true;
                session.handler.take()
            }
            Err(_) => return,
        };
        self.wakeup_all_waiting_threads(server_session);
        if let Some(handler) = handler {
            self.notify_client_disconnected(handler, server_session);
            // The registry's reference from connect time.
            self.release(server_session);
        }
    }
}
