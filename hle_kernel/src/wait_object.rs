//! Wait-object engine
//!
//! Every synchronizable kernel object shares one wakeup algorithm; only the
//! `should_wait` / `acquire` pair differs per kind. The engine runs on the
//! single logical executor: nothing here is re-entrant for the same object,
//! which stands in for mutual exclusion.
//!
//! A thread enters an object's wait list when it blocks and is purged
//! lazily: wakeup first drops any waiter whose status shows it was already
//! resolved elsewhere (running, ready or dead), then picks candidates in
//! strict priority order.

use crate::object::{KernelObject, ObjectId};
use crate::thread::{ThreadStatus, THREADPRIO_LOWEST};
use crate::Kernel;
use serde::{Deserialize, Serialize};

/// Insertion-ordered set of threads blocked on one object.
#[derive(Debug, Default)]
pub struct WaitList {
    threads: Vec<ObjectId>,
}

impl WaitList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a thread; a thread appears at most once.
    pub fn insert(&mut self, thread: ObjectId) {
        if !self.threads.contains(&thread) {
            self.threads.push(thread);
        }
    }

    /// Removes a thread; removing an absent thread is a no-op, so a thread
    /// that timed out or died elsewhere can be detached any number of times.
    pub fn remove(&mut self, thread: ObjectId) {
        self.threads.retain(|&t| t != thread);
    }

    pub fn contains(&self, thread: ObjectId) -> bool {
        self.threads.contains(&thread)
    }

    pub fn threads(&self) -> &[ObjectId] {
        &self.threads
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub(crate) fn set_threads(&mut self, threads: Vec<ObjectId>) {
        self.threads = threads;
    }
}

/// Synchronization event recorded for inspection in tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncEvent {
    /// An object became available and woke waiters.
    ObjectSignaled { object: ObjectId },
    /// A waiting thread was selected, acquired its object(s) and resumed.
    ThreadWoken {
        thread: ObjectId,
        object: ObjectId,
        priority: u32,
    },
}

impl Kernel {
    /// Whether the object is currently unavailable, so a waiter must block.
    ///
    /// This is an object-level check: it cannot express per-thread
    /// exceptions such as re-entry by a lock's owner. Non-waitable or dead
    /// objects report available, so a stale entry in a wait set never
    /// blocks its thread forever.
    pub fn should_wait(&self, object: ObjectId) -> bool {
        match self.objects.get(object) {
            Some(KernelObject::Event(event)) => !event.signaled,
            Some(KernelObject::Semaphore(semaphore)) => semaphore.available_count <= 0,
            Some(KernelObject::ServerPort(port)) => port.pending_sessions.is_empty(),
            Some(KernelObject::ServerSession(session)) => !session.signaled,
            Some(KernelObject::Thread(thread)) => thread.status != ThreadStatus::Dead,
            _ => false,
        }
    }

    /// Consumes the object on behalf of a thread already determined ready.
    /// Must not be called while [`Kernel::should_wait`] still holds.
    pub(crate) fn acquire(&mut self, object: ObjectId, _thread: ObjectId) {
        debug_assert!(!self.should_wait(object), "object unavailable");
        match self.objects.get_mut(object) {
            Some(KernelObject::Event(event)) => event.acquire(),
            Some(KernelObject::Semaphore(semaphore)) => semaphore.acquire(),
            // The accepting thread pops the pending queue itself.
            Some(KernelObject::ServerPort(_)) => {}
            Some(KernelObject::ServerSession(session)) => session.signaled = false,
            // Join observes death; there is nothing to consume.
            Some(KernelObject::Thread(_)) => {}
            _ => debug_assert!(false, "acquire of non-waitable object {object}"),
        }
    }

    /// Registers a thread on the object's wait list. Idempotent.
    pub fn add_waiting_thread(&mut self, object: ObjectId, thread: ObjectId) {
        if let Some(list) = self.objects.get_mut(object).and_then(KernelObject::wait_list_mut) {
            list.insert(thread);
        }
    }

    /// Detaches a thread from the object's wait list. Idempotent.
    pub fn remove_waiting_thread(&mut self, object: ObjectId, thread: ObjectId) {
        if let Some(list) = self.objects.get_mut(object).and_then(KernelObject::wait_list_mut) {
            list.remove(thread);
        }
    }

    /// Threads currently on the object's wait list, in insertion order.
    pub fn waiting_threads(&self, object: ObjectId) -> Vec<ObjectId> {
        self.objects
            .get(object)
            .and_then(KernelObject::wait_list)
            .map(|list| list.threads().to_vec())
            .unwrap_or_default()
    }

    /// Selects the next thread this object should wake, or `None`.
    ///
    /// Purges waiters already resolved elsewhere, then refuses to pick
    /// anyone while the object itself is exhausted, then returns the
    /// lowest-priority-value waiter whose whole wait set is acquirable
    /// (ties broken by wait-list insertion order).
    pub fn highest_priority_ready_thread(&mut self, object: ObjectId) -> Option<ObjectId> {
        let waiters = match self.objects.get(object).and_then(KernelObject::wait_list) {
            Some(list) => list.threads().to_vec(),
            None => return None,
        };

        // Drop threads that are ready, already running, or dead: whatever
        // they were waiting for was settled elsewhere.
        let remaining: Vec<ObjectId> = waiters
            .into_iter()
            .filter(|&thread| match self.objects.get(thread) {
                Some(KernelObject::Thread(state)) => !matches!(
                    state.status,
                    ThreadStatus::Running | ThreadStatus::Ready | ThreadStatus::Dead
                ),
                _ => false,
            })
            .collect();
        if let Some(list) = self.objects.get_mut(object).and_then(KernelObject::wait_list_mut) {
            list.set_threads(remaining.clone());
        }

        // TODO: perform this check per candidate inside the loop below, so
        // an object can be acquirable for one specific thread (recursive
        // locking). Until then no thread is woken while the object itself
        // is exhausted.
        if self.should_wait(object) {
            return None;
        }

        let mut candidate = None;
        let mut candidate_priority = THREADPRIO_LOWEST + 1;
        for thread in remaining {
            let (priority, awaited) = match self.objects.get(thread) {
                Some(KernelObject::Thread(state)) => {
                    (state.priority, state.wait.objects().to_vec())
                }
                _ => continue,
            };
            if priority >= candidate_priority {
                continue;
            }
            let ready_to_run = awaited.iter().all(|&awaited| !self.should_wait(awaited));
            if ready_to_run {
                candidate = Some(thread);
                candidate_priority = priority;
            }
        }
        candidate
    }

    /// Wakes every waiter this object can satisfy, in priority order.
    ///
    /// A wait-any thread acquires this object alone; a wait-all thread
    /// acquires its entire wait set and is detached from each object in it.
    /// The loop ends once the object is exhausted or no waiter is ready;
    /// woken threads fall out of this object's wait list on the next purge.
    pub fn wakeup_all_waiting_threads(&mut self, object: ObjectId) {
        while let Some(thread) = self.highest_priority_ready_thread(object) {
            let (wait_all, wants_output, priority) = match self.thread(thread) {
                Ok(state) => (state.wait.is_wait_all(), state.wants_output, state.priority),
                Err(_) => break,
            };

            if !wait_all {
                self.acquire(object, thread);
                if wants_output {
                    let index = self
                        .thread(thread)
                        .ok()
                        .and_then(|state| state.wait.index_of(object));
                    debug_assert!(index.is_some(), "woken thread not waiting on {object}");
                    if let Some(index) = index {
                        self.set_wait_synchronization_output(thread, index);
                    }
                }
            } else {
                let awaited = match self.thread(thread) {
                    Ok(state) => state.wait.objects().to_vec(),
                    Err(_) => break,
                };
                for awaited_object in awaited {
                    self.acquire(awaited_object, thread);
                    self.remove_waiting_thread(awaited_object, thread);
                }
                // No output index is reported for a satisfied wait-all.
            }

            log::trace!("waking {thread} (priority {priority}) on {object}");
            self.set_wait_synchronization_result(thread, kernel_types::RESULT_SUCCESS);
            self.resume_from_wait(thread);
            self.sync_audit.push(SyncEvent::ThreadWoken {
                thread,
                object,
                priority,
            });
        }
    }
}
