//! Guest-facing syscall surface
//!
//! Everything here speaks [`Handle`]s. Each call resolves its handles
//! against the current handle table (honoring the pseudo-handles for the
//! current thread and process), performs the object-level operation and
//! hands back handles or plain values.
//!
//! Waiting never suspends the host: `svc_wait_synchronization` either
//! completes immediately or parks the current thread in `WaitSync` and
//! returns [`SyncOutcome::Waiting`] for the interpreter loop to act on.

use crate::event::ResetType;
use crate::hle::HandlerId;
use crate::object::ObjectId;
use crate::thread::WaitDescriptor;
use crate::Kernel;
use kernel_types::{Handle, KernelError, ResultCode, CURRENT_PROCESS, CURRENT_THREAD};

/// Result of a wait that does not use host-side blocking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A resource was acquirable immediately. For a wait-any the index of
    /// the acquired handle is reported; a satisfied wait-all reports none.
    Completed { index: Option<usize> },
    /// Nothing was acquirable. The current thread is now in `WaitSync` and
    /// registered on every awaited object.
    Waiting,
}

impl Kernel {
    /// Resolves a handle to an object id, honoring pseudo-handles.
    pub fn object_from_handle(&self, handle: Handle) -> Result<ObjectId, KernelError> {
        if handle == CURRENT_THREAD {
            return self.current_thread.ok_or(KernelError::InvalidHandle);
        }
        if handle == CURRENT_PROCESS {
            return self.current_process.ok_or(KernelError::InvalidHandle);
        }
        self.handle_table.get(handle).ok_or_else(|| {
            log::error!("invalid handle {handle}");
            KernelError::InvalidHandle
        })
    }

    /// Moves a creation reference into the handle table. On table
    /// exhaustion the reference is dropped, which may destroy the object.
    fn install_handle(&mut self, object: ObjectId) -> Result<Handle, KernelError> {
        let result = self.handle_table.create(&mut self.objects, object);
        self.release(object);
        result
    }

    /// Closes a handle and drops its reference.
    pub fn svc_close_handle(&mut self, handle: Handle) -> Result<(), KernelError> {
        let object = self.handle_table.close(handle)?;
        self.release(object);
        Ok(())
    }

    /// Opens a second handle to the object behind `handle`. Pseudo-handles
    /// duplicate into real handles to the current thread or process.
    pub fn svc_duplicate_handle(&mut self, handle: Handle) -> Result<Handle, KernelError> {
        if handle.is_pseudo() {
            let object = self.object_from_handle(handle)?;
            return self.handle_table.create(&mut self.objects, object);
        }
        self.handle_table.duplicate(&mut self.objects, handle)
    }

    pub fn svc_create_event(
        &mut self,
        reset_type: ResetType,
        name: &str,
    ) -> Result<Handle, KernelError> {
        let event = self.create_event(reset_type, name)?;
        self.install_handle(event)
    }

    pub fn svc_signal_event(&mut self, handle: Handle) -> Result<(), KernelError> {
        let event = self.object_from_handle(handle)?;
        self.signal_event(event)
    }

    pub fn svc_clear_event(&mut self, handle: Handle) -> Result<(), KernelError> {
        let event = self.object_from_handle(handle)?;
        self.clear_event(event)
    }

    pub fn svc_create_semaphore(
        &mut self,
        initial_count: i32,
        max_count: i32,
        name: &str,
    ) -> Result<Handle, KernelError> {
        let semaphore = self.create_semaphore(initial_count, max_count, name)?;
        self.install_handle(semaphore)
    }

    pub fn svc_release_semaphore(
        &mut self,
        handle: Handle,
        release_count: i32,
    ) -> Result<i32, KernelError> {
        let semaphore = self.object_from_handle(handle)?;
        self.release_semaphore(semaphore, release_count)
    }

    /// Creates a port pair and returns `(client, server)` handles.
    pub fn svc_create_port(
        &mut self,
        max_sessions: u32,
        name: &str,
        handler: Option<HandlerId>,
    ) -> Result<(Handle, Handle), KernelError> {
        let (client, server) = self.create_port_pair(max_sessions, name, handler);
        let server_handle = match self.install_handle(server) {
            Ok(handle) => handle,
            Err(err) => {
                self.release(client);
                return Err(err);
            }
        };
        let client_handle = match self.install_handle(client) {
            Ok(handle) => handle,
            Err(err) => {
                self.svc_close_handle(server_handle)?;
                return Err(err);
            }
        };
        Ok((client_handle, server_handle))
    }

    pub fn svc_connect_to_port(&mut self, handle: Handle) -> Result<Handle, KernelError> {
        let port = self.object_from_handle(handle)?;
        let session = self.connect_to_port(port)?;
        self.install_handle(session)
    }

    pub fn svc_accept_session(&mut self, handle: Handle) -> Result<Handle, KernelError> {
        let port = self.object_from_handle(handle)?;
        let session = self.accept_session(port)?;
        self.install_handle(session)
    }

    /// Sends a sync request on behalf of the current thread.
    pub fn svc_send_sync_request(&mut self, handle: Handle) -> Result<ResultCode, KernelError> {
        let session = self.object_from_handle(handle)?;
        let thread = self.require_current_thread()?;
        self.send_sync_request(session, thread)
    }

    /// Exits the current thread, waking its joiners.
    pub fn svc_exit_thread(&mut self) -> Result<(), KernelError> {
        let thread = self.require_current_thread()?;
        self.current_thread = None;
        self.exit_thread(thread)
    }

    /// Waits on one or many handles.
    ///
    /// Wait-any completes on the first acquirable handle in argument order.
    /// Wait-all completes only when every handle is acquirable at once, and
    /// then acquires all of them. Otherwise the current thread blocks.
    pub fn svc_wait_synchronization(
        &mut self,
        handles: &[Handle],
        wait_all: bool,
    ) -> Result<SyncOutcome, KernelError> {
        if handles.is_empty() {
            return Err(KernelError::InvalidCombination(
                "wait on an empty handle list".into(),
            ));
        }
        let thread = self.require_current_thread()?;
        // Duplicated handles to one object collapse to its first position,
        // so a wait-all acquires each object exactly once.
        let mut objects: Vec<ObjectId> = Vec::with_capacity(handles.len());
        for &handle in handles {
            let object = self.object_from_handle(handle)?;
            match self.objects.get(object) {
                Some(entry) if entry.is_waitable() => {}
                _ => {
                    log::error!("wait on non-waitable handle {handle}");
                    return Err(KernelError::InvalidHandle);
                }
            }
            if !objects.contains(&object) {
                objects.push(object);
            }
        }

        if !wait_all {
            for (index, &object) in objects.iter().enumerate() {
                if !self.should_wait(object) {
                    self.acquire(object, thread);
                    return Ok(SyncOutcome::Completed { index: Some(index) });
                }
            }
            self.block_thread(thread, WaitDescriptor::Any(objects), true)?;
            return Ok(SyncOutcome::Waiting);
        }

        let all_ready = objects.iter().all(|&object| !self.should_wait(object));
        if all_ready {
            for &object in &objects {
                self.acquire(object, thread);
            }
            return Ok(SyncOutcome::Completed { index: None });
        }
        self.block_thread(thread, WaitDescriptor::All(objects), false)?;
        Ok(SyncOutcome::Waiting)
    }

    fn require_current_thread(&self) -> Result<ObjectId, KernelError> {
        self.current_thread.ok_or_else(|| {
            KernelError::InvalidCombination("no current thread is running".into())
        })
    }
}
