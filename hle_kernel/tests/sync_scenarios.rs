//! End-to-end synchronization and IPC scenarios driven the way an
//! interpreter loop would drive the kernel: through the svc surface where
//! handles exist, and through host-side accessors to assert on state.

use hle_kernel::{
    Kernel, KernelError, ObjectId, ResetType, ResultCode, SessionRequestHandler, SyncEvent,
    SyncOutcome, ThreadStatus, WaitDescriptor, RESULT_SUCCESS,
};

#[test]
fn sticky_signal_wakes_waiters_in_priority_order() {
    let mut kernel = Kernel::new();
    let event = kernel.create_event(ResetType::Sticky, "barrier").unwrap();
    let mid = kernel.create_thread("mid", 3).unwrap();
    let low = kernel.create_thread("low", 5).unwrap();
    let high = kernel.create_thread("high", 1).unwrap();

    // Insertion order 5, 1, 3 so priority must override list order.
    for thread in [low, high, mid] {
        kernel
            .block_thread(thread, WaitDescriptor::Any(vec![event]), false)
            .unwrap();
    }
    kernel.signal_event(event).unwrap();

    let woken: Vec<ObjectId> = kernel
        .sync_audit()
        .iter()
        .filter_map(|entry| match entry {
            SyncEvent::ThreadWoken { thread, .. } => Some(*thread),
            _ => None,
        })
        .collect();
    assert_eq!(woken, vec![high, mid, low]);
}

#[test]
fn wait_all_thread_stays_blocked_until_both_objects_ready() {
    let mut kernel = Kernel::new();
    let main = kernel.create_thread("main", 24).unwrap();
    kernel.set_current_thread(Some(main));

    let a = kernel.svc_create_event(ResetType::OneShot, "a").unwrap();
    let b = kernel.svc_create_event(ResetType::OneShot, "b").unwrap();

    let outcome = kernel.svc_wait_synchronization(&[a, b], true).unwrap();
    assert_eq!(outcome, SyncOutcome::Waiting);

    kernel.svc_signal_event(a).unwrap();
    assert_eq!(kernel.thread_status(main).unwrap(), ThreadStatus::WaitSync);

    kernel.svc_signal_event(b).unwrap();
    assert_eq!(kernel.thread_status(main).unwrap(), ThreadStatus::Ready);
    assert_eq!(kernel.thread_wait_result(main).unwrap(), RESULT_SUCCESS);
    // The wait-all consumed both one-shots atomically.
    for handle in [a, b] {
        let object = kernel.object_from_handle(handle).unwrap();
        assert!(!kernel.event_signaled(object).unwrap());
    }
}

#[test]
fn wait_any_reports_index_of_satisfying_object() {
    let mut kernel = Kernel::new();
    let main = kernel.create_thread("main", 24).unwrap();
    kernel.set_current_thread(Some(main));

    let a = kernel.svc_create_event(ResetType::OneShot, "a").unwrap();
    let b = kernel.svc_create_event(ResetType::OneShot, "b").unwrap();
    let c = kernel.svc_create_event(ResetType::OneShot, "c").unwrap();

    let outcome = kernel.svc_wait_synchronization(&[a, b, c], false).unwrap();
    assert_eq!(outcome, SyncOutcome::Waiting);

    kernel.svc_signal_event(c).unwrap();
    assert_eq!(kernel.thread_status(main).unwrap(), ThreadStatus::Ready);
    assert_eq!(kernel.thread_wait_output(main).unwrap(), Some(2));
}

#[test]
fn connect_before_accept_grows_the_pending_queue() {
    let mut kernel = Kernel::new();
    let (client_handle, server_handle) =
        kernel.svc_create_port(1, "srv:soc", None).unwrap();

    let first = kernel.svc_connect_to_port(client_handle);
    let second = kernel.svc_connect_to_port(client_handle);
    assert!(first.is_ok());
    // Over the declared session limit; the connect still succeeds.
    assert!(second.is_ok());

    let server_port = kernel.object_from_handle(server_handle).unwrap();
    assert_eq!(kernel.port_pending_count(server_port).unwrap(), 2);

    assert!(kernel.svc_accept_session(server_handle).is_ok());
    assert!(kernel.svc_accept_session(server_handle).is_ok());
    assert!(matches!(
        kernel.svc_accept_session(server_handle),
        Err(KernelError::NoPendingSessions)
    ));
}

#[test]
fn raw_session_round_trip_wakes_the_server_thread() {
    let mut kernel = Kernel::new();
    let (client_handle, server_handle) =
        kernel.svc_create_port(4, "srv:raw", None).unwrap();
    let server_thread = kernel.create_thread("server", 16).unwrap();
    let client_thread = kernel.create_thread("client", 32).unwrap();

    // Server side accepts the incoming connection and waits for a request.
    let session_handle = kernel.svc_connect_to_port(client_handle).unwrap();
    let accepted_handle = kernel.svc_accept_session(server_handle).unwrap();
    let accepted = kernel.object_from_handle(accepted_handle).unwrap();
    kernel
        .block_thread(server_thread, WaitDescriptor::Any(vec![accepted]), false)
        .unwrap();

    // Client side sends a request.
    kernel.set_current_thread(Some(client_thread));
    let result = kernel.svc_send_sync_request(session_handle).unwrap();
    assert_eq!(result, RESULT_SUCCESS);

    assert_eq!(
        kernel.thread_status(server_thread).unwrap(),
        ThreadStatus::Ready
    );
    assert_eq!(
        kernel.session_current_requester(accepted).unwrap(),
        Some(client_thread)
    );
}

struct ReverseService;

impl SessionRequestHandler for ReverseService {
    fn handle_sync_request(
        &mut self,
        kernel: &mut Kernel,
        _session: ObjectId,
        thread: ObjectId,
    ) -> ResultCode {
        let buffer = kernel.command_buffer(thread).unwrap();
        let count = buffer[0] as usize;
        let mut words: Vec<u32> = buffer[1..1 + count].to_vec();
        words.reverse();
        let mut reply = vec![count as u32];
        reply.extend(words);
        kernel.write_command_buffer(thread, &reply).unwrap();
        RESULT_SUCCESS
    }
}

#[test]
fn handled_session_answers_inline_through_command_buffer() {
    let mut kernel = Kernel::new();
    let handler = kernel.install_handler(Box::new(ReverseService));
    let (client_handle, _server_handle) = kernel
        .svc_create_port(4, "srv:rev", Some(handler))
        .unwrap();
    let main = kernel.create_thread("main", 24).unwrap();
    kernel.set_current_thread(Some(main));

    let session_handle = kernel.svc_connect_to_port(client_handle).unwrap();
    assert_eq!(kernel.handler_sessions(handler).len(), 1);

    kernel.write_command_buffer(main, &[3, 10, 20, 30]).unwrap();
    let result = kernel.svc_send_sync_request(session_handle).unwrap();
    assert_eq!(result, RESULT_SUCCESS);
    assert_eq!(
        &kernel.command_buffer(main).unwrap()[..4],
        &[3, 30, 20, 10]
    );
}

#[test]
fn closing_the_client_session_detaches_it_from_its_handler() {
    let mut kernel = Kernel::new();
    let handler = kernel.install_handler(Box::new(ReverseService));
    let (client_handle, server_handle) = kernel
        .svc_create_port(4, "srv:rev", Some(handler))
        .unwrap();

    let session_handle = kernel.svc_connect_to_port(client_handle).unwrap();
    let server_session = kernel.handler_sessions(handler)[0];
    assert!(kernel.session_client_open(server_session).unwrap());

    kernel.svc_close_handle(session_handle).unwrap();
    assert!(kernel.handler_sessions(handler).is_empty());
    assert!(!kernel.session_client_open(server_session).unwrap());

    // The port's pending queue still holds the unaccepted session; tearing
    // the port down drops the last reference.
    assert!(kernel.is_alive(server_session));
    kernel.svc_close_handle(client_handle).unwrap();
    kernel.svc_close_handle(server_handle).unwrap();
    assert!(!kernel.is_alive(server_session));
}

#[test]
fn request_after_server_teardown_reports_closed_session() {
    let mut kernel = Kernel::new();
    let (client_handle, server_handle) =
        kernel.svc_create_port(4, "srv:dead", None).unwrap();
    let main = kernel.create_thread("main", 24).unwrap();
    kernel.set_current_thread(Some(main));

    let session_handle = kernel.svc_connect_to_port(client_handle).unwrap();

    // Tearing down the server side destroys the pending server session.
    let accepted_handle = kernel.svc_accept_session(server_handle).unwrap();
    kernel.svc_close_handle(accepted_handle).unwrap();

    assert!(matches!(
        kernel.svc_send_sync_request(session_handle),
        Err(KernelError::SessionClosed)
    ));
}

#[test]
fn stale_handle_is_rejected_after_slot_reuse() {
    let mut kernel = Kernel::with_handle_capacity(1);
    let old = kernel.svc_create_event(ResetType::OneShot, "old").unwrap();
    kernel.svc_close_handle(old).unwrap();

    // With one slot the new handle must reuse the old one's slot.
    let new = kernel.svc_create_event(ResetType::OneShot, "new").unwrap();
    assert_ne!(old, new);
    assert!(kernel.svc_signal_event(new).is_ok());
    assert!(matches!(
        kernel.svc_signal_event(old),
        Err(KernelError::InvalidHandle)
    ));
}

#[test]
fn handle_table_exhaustion_surfaces_out_of_handles() {
    let mut kernel = Kernel::with_handle_capacity(3);
    for i in 0..3 {
        kernel
            .svc_create_event(ResetType::OneShot, &format!("evt{i}"))
            .unwrap();
    }
    assert!(matches!(
        kernel.svc_create_event(ResetType::OneShot, "overflow"),
        Err(KernelError::OutOfHandles)
    ));
}

#[test]
fn semaphore_gates_a_worker_pool() {
    let mut kernel = Kernel::new();
    let main = kernel.create_thread("main", 24).unwrap();
    kernel.set_current_thread(Some(main));
    let sem_handle = kernel.svc_create_semaphore(1, 2, "pool").unwrap();
    let sem = kernel.object_from_handle(sem_handle).unwrap();

    // One slot available: the first wait completes, the second blocks.
    let outcome = kernel.svc_wait_synchronization(&[sem_handle], false).unwrap();
    assert_eq!(outcome, SyncOutcome::Completed { index: Some(0) });
    let outcome = kernel.svc_wait_synchronization(&[sem_handle], false).unwrap();
    assert_eq!(outcome, SyncOutcome::Waiting);

    assert_eq!(kernel.svc_release_semaphore(sem_handle, 1).unwrap(), 0);
    assert_eq!(kernel.thread_status(main).unwrap(), ThreadStatus::Ready);
    assert_eq!(kernel.semaphore_available_count(sem).unwrap(), 0);
}
