//! # HLE Kernel
//!
//! Deterministic, in-process model of a guest kernel's synchronization and
//! IPC layer. An external interpreter loop drives it one call at a time;
//! nothing here spawns host threads or blocks the host.
//!
//! ## Philosophy
//!
//! - **Single executor**: exactly one guest thread is logically running at
//!   any instant, so object state needs no host-side locking. What the
//!   model expresses is which guest threads *would* block and in what order
//!   they wake.
//! - **Explicit ownership**: objects live in an arena keyed by [`ObjectId`]
//!   with a counted strong reference per handle, queue entry or
//!   back-reference. Weak references are plain ids checked for liveness.
//! - **Inspectable**: every field of interest is reachable through accessor
//!   methods, and wakeups are recorded in an audit log, so tests assert on
//!   real kernel state instead of mocks.

pub mod event;
pub mod handle_table;
pub mod hle;
pub mod object;
pub mod port;
pub mod semaphore;
pub mod session;
pub mod svc;
pub mod thread;
pub mod wait_object;

pub use event::{Event, ResetType};
pub use handle_table::HandleTable;
pub use hle::{HandlerId, SessionRequestHandler, COMMAND_BUFFER_WORDS};
pub use object::{KernelObject, ObjectClass, ObjectId, ObjectTable};
pub use port::{ClientPort, ServerPort};
pub use semaphore::Semaphore;
pub use session::{ClientSession, ServerSession};
pub use svc::SyncOutcome;
pub use thread::{
    Thread, ThreadStatus, WaitDescriptor, THREADPRIO_DEFAULT, THREADPRIO_HIGHEST,
    THREADPRIO_LOWEST,
};
pub use wait_object::{SyncEvent, WaitList};

pub use kernel_types::{Handle, KernelError, ResultCode, RESULT_SUCCESS};

use crate::hle::HandlerRegistry;
use crate::object::Process;

/// The kernel context. Owns every object, the handle table and the
/// installed service handlers; all operations hang off it.
pub struct Kernel {
    pub(crate) objects: ObjectTable,
    pub(crate) handle_table: HandleTable,
    pub(crate) handlers: HandlerRegistry,
    pub(crate) current_thread: Option<ObjectId>,
    pub(crate) current_process: Option<ObjectId>,
    pub(crate) sync_audit: Vec<SyncEvent>,
}

impl Kernel {
    /// Creates a kernel with a full-size handle table and one process.
    pub fn new() -> Self {
        Self::with_handle_capacity(handle_table::MAX_COUNT)
    }

    /// Creates a kernel whose handle table holds at most `capacity`
    /// entries. Small capacities make exhaustion observable in tests.
    pub fn with_handle_capacity(capacity: usize) -> Self {
        let mut objects = ObjectTable::default();
        let process = objects.insert(KernelObject::Process(Process {
            name: "main_process".to_string(),
        }));
        Self {
            objects,
            handle_table: HandleTable::with_capacity(capacity),
            handlers: HandlerRegistry::default(),
            current_thread: None,
            current_process: Some(process),
            sync_audit: Vec::new(),
        }
    }

    /// Sets which thread the pseudo-handle and the implicit-thread svcs
    /// resolve to. The interpreter loop calls this on every switch.
    pub fn set_current_thread(&mut self, thread: Option<ObjectId>) {
        self.current_thread = thread;
    }

    pub fn current_thread(&self) -> Option<ObjectId> {
        self.current_thread
    }

    pub fn current_process(&self) -> Option<ObjectId> {
        self.current_process
    }

    /// Adds a strong reference.
    pub fn retain(&mut self, object: ObjectId) {
        self.objects.retain(object);
    }

    /// Drops a strong reference, destroying the object at zero. Destruction
    /// cascades: a dying object's own references are dropped in turn, and a
    /// dying client session closes its server half for its waiters.
    pub fn release(&mut self, object: ObjectId) {
        let Some(destroyed) = self.objects.release(object) else {
            return;
        };
        log::trace!("destroying {object}");
        match destroyed {
            KernelObject::ClientPort(port) => self.release(port.server_port),
            KernelObject::ServerPort(port) => {
                for session in port.pending_sessions {
                    self.release(session);
                }
            }
            KernelObject::ClientSession(session) => {
                self.finalize_client_session(session.server_session);
            }
            _ => {}
        }
    }

    /// Closes every handle. Objects kept alive only by handles are
    /// destroyed; ids held by host code stay valid until released.
    pub fn shutdown(&mut self) {
        for object in self.handle_table.clear() {
            self.release(object);
        }
    }

    pub fn is_alive(&self, object: ObjectId) -> bool {
        self.objects.is_alive(object)
    }

    pub fn strong_count(&self, object: ObjectId) -> u32 {
        self.objects.strong_count(object)
    }

    pub fn object_class(&self, object: ObjectId) -> Result<ObjectClass, KernelError> {
        self.objects
            .get(object)
            .map(KernelObject::class)
            .ok_or(KernelError::InvalidHandle)
    }

    pub fn object_name(&self, object: ObjectId) -> Result<&str, KernelError> {
        self.objects
            .get(object)
            .map(KernelObject::name)
            .ok_or(KernelError::InvalidHandle)
    }

    /// Wakeups and signals in the order they happened.
    pub fn sync_audit(&self) -> &[SyncEvent] {
        &self.sync_audit
    }

    pub fn clear_sync_audit(&mut self) {
        self.sync_audit.clear();
    }

    /// Live objects, the bootstrap process included.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}
