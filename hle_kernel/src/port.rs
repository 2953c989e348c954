//! Ports
//!
//! A port is the named rendezvous point for sessions. The client half is
//! what services hand out; connecting through it creates a session pair.
//! The server half queues pending sessions until an accepting context pops
//! them, and is waitable so a server thread can sleep until a client shows
//! up.

use crate::hle::HandlerId;
use crate::object::{KernelObject, ObjectId};
use crate::wait_object::{SyncEvent, WaitList};
use crate::Kernel;
use kernel_types::KernelError;
use std::collections::VecDeque;

#[derive(Debug)]
pub struct ClientPort {
    pub(crate) name: String,
    pub(crate) server_port: ObjectId,
    pub(crate) max_sessions: u32,
    pub(crate) active_sessions: u32,
}

#[derive(Debug)]
pub struct ServerPort {
    pub(crate) name: String,
    /// Server sessions created by connects and not yet accepted. The queue
    /// owns one strong reference per entry.
    pub(crate) pending_sessions: VecDeque<ObjectId>,
    pub(crate) handler: Option<HandlerId>,
    pub(crate) waiting: WaitList,
}

impl Kernel {
    /// Creates a connected port pair named `name_Client` / `name_Server`.
    /// The client half keeps the server half alive. A handler, when given,
    /// is inherited by every session connected through this port.
    pub fn create_port_pair(
        &mut self,
        max_sessions: u32,
        name: &str,
        handler: Option<HandlerId>,
    ) -> (ObjectId, ObjectId) {
        let server = self.objects.insert(KernelObject::ServerPort(ServerPort {
            name: format!("{name}_Server"),
            pending_sessions: VecDeque::new(),
            handler,
            waiting: WaitList::new(),
        }));
        // Back-reference from the client half.
        self.objects.retain(server);
        let client = self.objects.insert(KernelObject::ClientPort(ClientPort {
            name: format!("{name}_Client"),
            server_port: server,
            max_sessions,
            active_sessions: 0,
        }));
        (client, server)
    }

    /// Connects through a client port: creates a session pair, binds the
    /// port's handler to the server half, queues it on the server port and
    /// wakes the port's waiters. Returns the client session immediately.
    ///
    /// The session limit is counted but not enforced; going over it is
    /// logged and the connection proceeds.
    pub fn connect_to_port(&mut self, client_port: ObjectId) -> Result<ObjectId, KernelError> {
        let (server_port, base_name) = {
            let port = self.client_port(client_port)?;
            let base = port
                .name
                .strip_suffix("_Client")
                .unwrap_or(&port.name)
                .to_string();
            (port.server_port, base)
        };

        {
            let port = self.client_port_mut(client_port)?;
            port.active_sessions += 1;
            if port.active_sessions > port.max_sessions {
                log::warn!(
                    "port {base_name} has {} sessions, over its limit of {}",
                    port.active_sessions,
                    port.max_sessions
                );
            }
        }

        let handler = self.server_port(server_port)?.handler;
        let (client_session, server_session) = self.create_session_pair(&base_name, handler);

        if let Some(handler) = handler {
            // The registry keeps the session alive while it is connected.
            self.objects.retain(server_session);
            self.notify_client_connected(handler, server_session);
        }

        self.server_port_mut(server_port)?
            .pending_sessions
            .push_back(server_session);
        self.sync_audit
            .push(SyncEvent::ObjectSignaled { object: server_port });
        self.wakeup_all_waiting_threads(server_port);

        Ok(client_session)
    }

    /// Pops the oldest pending session off a server port. Ownership of the
    /// queue's reference moves to the caller.
    pub fn accept_session(&mut self, server_port: ObjectId) -> Result<ObjectId, KernelError> {
        self.server_port_mut(server_port)?
            .pending_sessions
            .pop_front()
            .ok_or(KernelError::NoPendingSessions)
    }

    pub fn port_pending_count(&self, server_port: ObjectId) -> Result<usize, KernelError> {
        Ok(self.server_port(server_port)?.pending_sessions.len())
    }

    pub fn port_active_sessions(&self, client_port: ObjectId) -> Result<u32, KernelError> {
        Ok(self.client_port(client_port)?.active_sessions)
    }
}
