//! Kernel object arena
//!
//! All kernel objects live in an [`ObjectTable`] keyed by stable
//! [`ObjectId`]s. Each entry carries an explicit strong count: handles,
//! pending-session queues, port back-references and handler-connected lists
//! hold strong references (retain/release), while weak references are plain
//! ids checked for liveness. An object is destroyed when its last strong
//! reference is released; the [`Kernel`](crate::Kernel) then finalizes it,
//! releasing the references the dead object itself held.

use crate::event::Event;
use crate::port::{ClientPort, ServerPort};
use crate::semaphore::Semaphore;
use crate::session::{ClientSession, ServerSession};
use crate::thread::Thread;
use crate::wait_object::WaitList;
use crate::Kernel;
use kernel_types::KernelError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Stable identifier of a kernel object in the arena.
///
/// Ids are sequential, never reused, and carry no ownership: holding an
/// `ObjectId` does not keep the object alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId(u32);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({})", self.0)
    }
}

/// Type tag of a kernel object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectClass {
    Event,
    Semaphore,
    ClientPort,
    ServerPort,
    ClientSession,
    ServerSession,
    Thread,
    Process,
}

/// A process-wide singleton object; the target of the `CURRENT_PROCESS`
/// pseudo-handle. Address spaces and resource limits are out of scope, so
/// only identity is modeled.
#[derive(Debug)]
pub struct Process {
    pub(crate) name: String,
}

/// Closed set of kernel object kinds.
///
/// The concrete kind set is small and fixed, so a tagged variant replaces
/// the usual virtual-base hierarchy.
#[derive(Debug)]
pub enum KernelObject {
    Event(Event),
    Semaphore(Semaphore),
    ClientPort(ClientPort),
    ServerPort(ServerPort),
    ClientSession(ClientSession),
    ServerSession(ServerSession),
    Thread(Thread),
    Process(Process),
}

impl KernelObject {
    pub fn class(&self) -> ObjectClass {
        match self {
            KernelObject::Event(_) => ObjectClass::Event,
            KernelObject::Semaphore(_) => ObjectClass::Semaphore,
            KernelObject::ClientPort(_) => ObjectClass::ClientPort,
            KernelObject::ServerPort(_) => ObjectClass::ServerPort,
            KernelObject::ClientSession(_) => ObjectClass::ClientSession,
            KernelObject::ServerSession(_) => ObjectClass::ServerSession,
            KernelObject::Thread(_) => ObjectClass::Thread,
            KernelObject::Process(_) => ObjectClass::Process,
        }
    }

    /// Human-readable name, for diagnostics only.
    pub fn name(&self) -> &str {
        match self {
            KernelObject::Event(o) => &o.name,
            KernelObject::Semaphore(o) => &o.name,
            KernelObject::ClientPort(o) => &o.name,
            KernelObject::ServerPort(o) => &o.name,
            KernelObject::ClientSession(o) => &o.name,
            KernelObject::ServerSession(o) => &o.name,
            KernelObject::Thread(o) => &o.name,
            KernelObject::Process(o) => &o.name,
        }
    }

    /// Wait list, for kinds a thread can block on.
    pub(crate) fn wait_list(&self) -> Option<&WaitList> {
        match self {
            KernelObject::Event(o) => Some(&o.waiting),
            KernelObject::Semaphore(o) => Some(&o.waiting),
            KernelObject::ServerPort(o) => Some(&o.waiting),
            KernelObject::ServerSession(o) => Some(&o.waiting),
            KernelObject::Thread(o) => Some(&o.joiners),
            _ => None,
        }
    }

    pub(crate) fn wait_list_mut(&mut self) -> Option<&mut WaitList> {
        match self {
            KernelObject::Event(o) => Some(&mut o.waiting),
            KernelObject::Semaphore(o) => Some(&mut o.waiting),
            KernelObject::ServerPort(o) => Some(&mut o.waiting),
            KernelObject::ServerSession(o) => Some(&mut o.waiting),
            KernelObject::Thread(o) => Some(&mut o.joiners),
            _ => None,
        }
    }

    /// Whether a thread may block on this object.
    pub fn is_waitable(&self) -> bool {
        self.wait_list().is_some()
    }
}

#[derive(Debug)]
struct Entry {
    strong: u32,
    object: KernelObject,
}

/// Arena of reference-counted kernel objects.
///
/// Like the rest of the kernel state, the arena is directly inspectable:
/// strong counts and liveness are exposed so tests can assert ownership
/// transfers instead of guessing at them.
#[derive(Debug, Default)]
pub struct ObjectTable {
    entries: HashMap<ObjectId, Entry>,
    next_id: u32,
}

impl ObjectTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an object with a single strong reference owned by the caller.
    pub fn insert(&mut self, object: KernelObject) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        self.entries.insert(id, Entry { strong: 1, object });
        id
    }

    /// Adds a strong reference.
    pub fn retain(&mut self, id: ObjectId) {
        match self.entries.get_mut(&id) {
            Some(entry) => entry.strong += 1,
            None => debug_assert!(false, "retain of dead object {id}"),
        }
    }

    /// Drops a strong reference. Returns the object when this was the last
    /// reference, so the caller can finalize it.
    #[must_use]
    pub fn release(&mut self, id: ObjectId) -> Option<KernelObject> {
        let entry = match self.entries.get_mut(&id) {
            Some(entry) => entry,
            None => {
                debug_assert!(false, "release of dead object {id}");
                return None;
            }
        };
        debug_assert!(entry.strong > 0);
        entry.strong = entry.strong.saturating_sub(1);
        if entry.strong == 0 {
            return self.entries.remove(&id).map(|entry| entry.object);
        }
        None
    }

    pub fn get(&self, id: ObjectId) -> Option<&KernelObject> {
        self.entries.get(&id).map(|entry| &entry.object)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut KernelObject> {
        self.entries.get_mut(&id).map(|entry| &mut entry.object)
    }

    /// Liveness check used to resolve weak references.
    pub fn is_alive(&self, id: ObjectId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn strong_count(&self, id: ObjectId) -> u32 {
        self.entries.get(&id).map(|entry| entry.strong).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Typed accessors over the arena. A mismatched kind is reported as
/// `InvalidHandle`, matching what the guest observes when it passes a
/// handle of the wrong type to a system call.
impl Kernel {
    pub(crate) fn event(&self, id: ObjectId) -> Result<&Event, KernelError> {
        match self.objects.get(id) {
            Some(KernelObject::Event(event)) => Ok(event),
            _ => Err(KernelError::InvalidHandle),
        }
    }

    pub(crate) fn event_mut(&mut self, id: ObjectId) -> Result<&mut Event, KernelError> {
        match self.objects.get_mut(id) {
            Some(KernelObject::Event(event)) => Ok(event),
            _ => Err(KernelError::InvalidHandle),
        }
    }

    pub(crate) fn semaphore(&self, id: ObjectId) -> Result<&Semaphore, KernelError> {
        match self.objects.get(id) {
            Some(KernelObject::Semaphore(semaphore)) => Ok(semaphore),
            _ => Err(KernelError::InvalidHandle),
        }
    }

    pub(crate) fn semaphore_mut(&mut self, id: ObjectId) -> Result<&mut Semaphore, KernelError> {
        match self.objects.get_mut(id) {
            Some(KernelObject::Semaphore(semaphore)) => Ok(semaphore),
            _ => Err(KernelError::InvalidHandle),
        }
    }

    pub(crate) fn thread(&self, id: ObjectId) -> Result<&Thread, KernelError> {
        match self.objects.get(id) {
            Some(KernelObject::Thread(thread)) => Ok(thread),
            _ => Err(KernelError::InvalidHandle),
        }
    }

    pub(crate) fn thread_mut(&mut self, id: ObjectId) -> Result<&mut Thread, KernelError> {
        match self.objects.get_mut(id) {
            Some(KernelObject::Thread(thread)) => Ok(thread),
            _ => Err(KernelError::InvalidHandle),
        }
    }

    pub(crate) fn client_port(&self, id: ObjectId) -> Result<&ClientPort, KernelError> {
        match self.objects.get(id) {
            Some(KernelObject::ClientPort(port)) => Ok(port),
            _ => Err(KernelError::InvalidHandle),
        }
    }

    pub(crate) fn client_port_mut(&mut self, id: ObjectId) -> Result<&mut ClientPort, KernelError> {
        match self.objects.get_mut(id) {
            Some(KernelObject::ClientPort(port)) => Ok(port),
            _ => Err(KernelError::InvalidHandle),
        }
    }

    pub(crate) fn server_port(&self, id: ObjectId) -> Result<&ServerPort, KernelError> {
        match self.objects.get(id) {
            Some(KernelObject::ServerPort(port)) => Ok(port),
            _ => Err(KernelError::InvalidHandle),
        }
    }

    pub(crate) fn server_port_mut(&mut self, id: ObjectId) -> Result<&mut ServerPort, KernelError> {
        match self.objects.get_mut(id) {
            Some(KernelObject::ServerPort(port)) => Ok(port),
            _ => Err(KernelError::InvalidHandle),
        }
    }

    pub(crate) fn client_session(&self, id: ObjectId) -> Result<&ClientSession, KernelError> {
        match self.objects.get(id) {
            Some(KernelObject::ClientSession(session)) => Ok(session),
            _ => Err(KernelError::InvalidHandle),
        }
    }

    pub(crate) fn server_session(&self, id: ObjectId) -> Result<&ServerSession, KernelError> {
        match self.objects.get(id) {
            Some(KernelObject::ServerSession(session)) => Ok(session),
            _ => Err(KernelError::InvalidHandle),
        }
    }

    pub(crate) fn server_session_mut(
        &mut self,
        id: ObjectId,
    ) -> Result<&mut ServerSession, KernelError> {
        match self.objects.get_mut(id) {
            Some(KernelObject::ServerSession(session)) => Ok(session),
            _ => Err(KernelError::InvalidHandle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_object(name: &str) -> KernelObject {
        KernelObject::Process(Process {
            name: name.to_string(),
        })
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut table = ObjectTable::new();
        let id = table.insert(test_object("p"));
        assert!(table.is_alive(id));
        assert_eq!(table.strong_count(id), 1);
        assert_eq!(table.get(id).map(|o| o.name()), Some("p"));
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut table = ObjectTable::new();
        let first = table.insert(test_object("a"));
        assert!(table.release(first).is_some());
        let second = table.insert(test_object("b"));
        assert_ne!(first, second);
        assert!(!table.is_alive(first));
    }

    #[test]
    fn test_retain_release_destroys_at_zero() {
        let mut table = ObjectTable::new();
        let id = table.insert(test_object("p"));
        table.retain(id);
        assert_eq!(table.strong_count(id), 2);

        assert!(table.release(id).is_none());
        assert!(table.is_alive(id));

        let dead = table.release(id);
        assert!(dead.is_some());
        assert!(!table.is_alive(id));
        assert_eq!(table.strong_count(id), 0);
    }

    #[test]
    fn test_class_tags() {
        let object = test_object("p");
        assert_eq!(object.class(), ObjectClass::Process);
        assert!(!object.is_waitable());
    }
}
