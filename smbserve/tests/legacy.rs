//! Legacy-family integration tests: AndX batching, the 16-bit id spaces,
//! open searches, and the out-of-band cancel path.

use std::sync::Arc;

use smbserve_core::nt_status::NtStatus;

use smbserve::protocol::body::access_mask::SMBAccessMask;
use smbserve::protocol::body::cancel::LegacySMBCancelRequest;
use smbserve::protocol::body::change_notify::{LegacySMBChangeNotifyRequest, SMBCompletionFilter};
use smbserve::protocol::body::create::{LegacySMBOpenRequest, SMBCreateDisposition, SMBCreateOptions};
use smbserve::protocol::body::dialect::SMBDialect;
use smbserve::protocol::body::empty::{SMBEchoRequest, SMBLogoffRequest, SMBTreeDisconnectRequest};
use smbserve::protocol::body::file_ops::{
    LegacySMBCloseRequest, LegacySMBFlushRequest, LegacySMBReadRequest, LegacySMBWriteRequest, LEGACY_FLUSH_ALL_FID,
};
use smbserve::protocol::body::find::{LegacySMBFindCloseRequest, LegacySMBFindFirstRequest, LegacySMBFindNextRequest};
use smbserve::protocol::body::negotiate::{LegacySMBNegotiateRequest, NO_SUPPORTED_DIALECT_INDEX};
use smbserve::protocol::body::session_setup::LegacySMBSessionSetupRequest;
use smbserve::protocol::body::tree_connect::LegacySMBTreeConnectRequest;
use smbserve::protocol::body::LegacySMBBody;
use smbserve::protocol::header::{LegacySMBCommandCode, LegacySMBHeader};
use smbserve::protocol::message::{LegacySMBMessage, SMBFrame};
use smbserve::server::share::file_system::SMBFileSystemShare;
use smbserve::server::{FrameDisposition, SMBConnection, SMBSendReceiver, SMBServer};
use smbserve::store::memory::MemoryFileStore;
use smbserve::util::auth::challenge::ChallengeAuthProvider;
use smbserve::util::auth::User;

type Provider = ChallengeAuthProvider;

struct Harness {
    server: Arc<SMBServer<Provider>>,
    connection: Arc<SMBConnection<Provider>>,
    receiver: SMBSendReceiver,
    next_mid: u16,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(MemoryFileStore::new());
        let server = Arc::new(
            SMBServer::builder()
                .security_provider(ChallengeAuthProvider::new(
                    vec![User::new("alice", "hunter2")],
                    false,
                ))
                .add_share(SMBFileSystemShare::new("shared", store))
                .build()
                .unwrap(),
        );
        let (connection, receiver) = server.accept_connection("legacy-peer");
        Self {
            server,
            connection,
            receiver,
            next_mid: 0,
        }
    }

    fn header(&mut self, command: LegacySMBCommandCode, uid: u16, tid: u16) -> LegacySMBHeader {
        let mid = self.next_mid;
        self.next_mid += 1;
        LegacySMBHeader::request(command, mid, 0x10, uid, tid)
    }

    fn send(&mut self, message: LegacySMBMessage) -> FrameDisposition {
        self.server.process_frame(&self.connection, SMBFrame::Legacy(message))
    }

    fn recv(&mut self) -> LegacySMBMessage {
        match self.receiver.try_recv() {
            Some(SMBFrame::Legacy(message)) => message,
            Some(SMBFrame::Smb2(_)) => panic!("unexpected modern-family frame"),
            None => panic!("expected a response frame"),
        }
    }

    fn roundtrip(&mut self, command: LegacySMBCommandCode, uid: u16, tid: u16, body: LegacySMBBody) -> LegacySMBMessage {
        let header = self.header(command, uid, tid);
        assert_eq!(self.send(LegacySMBMessage::single(header, body)), FrameDisposition::Continue);
        self.recv()
    }

    fn negotiate(&mut self) -> Vec<u8> {
        let response = self.roundtrip(
            LegacySMBCommandCode::Negotiate,
            0,
            0,
            LegacySMBBody::NegotiateRequest(LegacySMBNegotiateRequest {
                dialects: vec!["PC NETWORK PROGRAM 1.0".into(), "NT LM 0.12".into()],
            }),
        );
        assert_eq!(response.header.status, NtStatus::Success);
        match &response.commands[0] {
            LegacySMBBody::NegotiateResponse(negotiate) => {
                assert_eq!(negotiate.dialect_index, 1);
                negotiate.challenge.clone()
            }
            other => panic!("unexpected negotiate response: {other:?}"),
        }
    }

    fn logon(&mut self) -> u16 {
        let challenge = self.negotiate();
        let token = ChallengeAuthProvider::client_token(&challenge, &User::new("alice", "hunter2"), "legacybox");
        let response = self.roundtrip(
            LegacySMBCommandCode::SessionSetupAndX,
            0,
            0,
            LegacySMBBody::SessionSetupRequest(LegacySMBSessionSetupRequest::new(token)),
        );
        assert_eq!(response.header.status, NtStatus::Success);
        assert_ne!(response.header.uid, 0);
        response.header.uid
    }

    fn tree_connect(&mut self, uid: u16) -> u16 {
        let response = self.roundtrip(
            LegacySMBCommandCode::TreeConnectAndX,
            uid,
            0,
            LegacySMBBody::TreeConnectRequest(LegacySMBTreeConnectRequest::new("\\\\server\\shared")),
        );
        assert_eq!(response.header.status, NtStatus::Success);
        assert_ne!(response.header.tid, 0);
        response.header.tid
    }

    fn open(&mut self, uid: u16, tid: u16, path: &str, disposition: SMBCreateDisposition) -> (u16, NtStatus) {
        let response = self.roundtrip(
            LegacySMBCommandCode::NTCreateAndX,
            uid,
            tid,
            LegacySMBBody::OpenRequest(LegacySMBOpenRequest::new(
                path,
                SMBAccessMask::GENERIC_READ | SMBAccessMask::GENERIC_WRITE,
                disposition,
            )),
        );
        let status = response.header.status;
        let fid = match &response.commands[0] {
            LegacySMBBody::OpenResponse(open) => open.fid,
            _ => 0,
        };
        (fid, status)
    }
}

#[test]
fn full_scenario_round_trip() {
    let mut harness = Harness::new();
    let uid = harness.logon();
    let tid = harness.tree_connect(uid);

    let (fid, status) = harness.open(uid, tid, "a.txt", SMBCreateDisposition::OpenIf);
    assert_eq!(status, NtStatus::Success);
    assert_ne!(fid, 0);

    let payload = b"legacy payload".to_vec();
    let response = harness.roundtrip(
        LegacySMBCommandCode::WriteAndX,
        uid,
        tid,
        LegacySMBBody::WriteRequest(LegacySMBWriteRequest {
            fid,
            offset: 0,
            data: payload.clone(),
        }),
    );
    assert_eq!(response.header.status, NtStatus::Success);

    let response = harness.roundtrip(
        LegacySMBCommandCode::ReadAndX,
        uid,
        tid,
        LegacySMBBody::ReadRequest(LegacySMBReadRequest {
            fid,
            offset: 0,
            max_count: payload.len() as u32,
        }),
    );
    assert_eq!(response.header.status, NtStatus::Success);
    match &response.commands[0] {
        LegacySMBBody::ReadResponse(read) => {
            assert_eq!(read.data, payload);
            assert_eq!(read.available, 0xFFFF);
        }
        other => panic!("unexpected read response: {other:?}"),
    }

    let response = harness.roundtrip(
        LegacySMBCommandCode::Close,
        uid,
        tid,
        LegacySMBBody::CloseRequest(LegacySMBCloseRequest { fid }),
    );
    assert_eq!(response.header.status, NtStatus::Success);

    let response = harness.roundtrip(
        LegacySMBCommandCode::TreeDisconnect,
        uid,
        tid,
        LegacySMBBody::TreeDisconnectRequest(SMBTreeDisconnectRequest::default()),
    );
    assert_eq!(response.header.status, NtStatus::Success);

    let response = harness.roundtrip(
        LegacySMBCommandCode::LogoffAndX,
        uid,
        0,
        LegacySMBBody::LogoffRequest(SMBLogoffRequest::default()),
    );
    assert_eq!(response.header.status, NtStatus::Success);
}

#[test]
fn command_before_negotiate_gets_error_response_and_connection_survives() {
    let mut harness = Harness::new();
    let response = harness.roundtrip(
        LegacySMBCommandCode::Echo,
        0,
        0,
        LegacySMBBody::EchoRequest(SMBEchoRequest::default()),
    );
    assert_eq!(response.header.status, NtStatus::InvalidSmb);
    assert!(matches!(response.commands[0], LegacySMBBody::ErrorResponse(_)));

    // Unlike the modern family, the connection stays open and negotiation
    // still works.
    harness.negotiate();
    assert_eq!(harness.connection.information().dialect, SMBDialect::NtLm012);
}

#[test]
fn repeat_negotiate_rejected_without_mutating_dialect() {
    let mut harness = Harness::new();
    harness.negotiate();
    let response = harness.roundtrip(
        LegacySMBCommandCode::Negotiate,
        0,
        0,
        LegacySMBBody::NegotiateRequest(LegacySMBNegotiateRequest {
            dialects: vec!["NT LM 0.12".into()],
        }),
    );
    assert_eq!(response.header.status, NtStatus::InvalidSmb);
    assert_eq!(harness.connection.information().dialect, SMBDialect::NtLm012);
}

#[test]
fn unknown_dialects_yield_not_supported_index() {
    let mut harness = Harness::new();
    let response = harness.roundtrip(
        LegacySMBCommandCode::Negotiate,
        0,
        0,
        LegacySMBBody::NegotiateRequest(LegacySMBNegotiateRequest {
            dialects: vec!["PC NETWORK PROGRAM 1.0".into()],
        }),
    );
    assert_eq!(response.header.status, NtStatus::Success);
    match &response.commands[0] {
        LegacySMBBody::NegotiateResponse(negotiate) => {
            assert_eq!(negotiate.dialect_index, NO_SUPPORTED_DIALECT_INDEX);
        }
        other => panic!("unexpected negotiate response: {other:?}"),
    }
    assert_eq!(harness.connection.information().dialect, SMBDialect::NotSet);
}

#[test]
fn wildcard_probe_upgrades_to_modern_family_response() {
    let mut harness = Harness::new();
    let header = harness.header(LegacySMBCommandCode::Negotiate, 0, 0);
    let message = LegacySMBMessage::single(
        header,
        LegacySMBBody::NegotiateRequest(LegacySMBNegotiateRequest {
            dialects: vec!["NT LM 0.12".into(), "SMB 2.???".into()],
        }),
    );
    assert_eq!(harness.send(message), FrameDisposition::Continue);
    match harness.receiver.try_recv() {
        Some(SMBFrame::Smb2(chain)) => match &chain[0].body {
            smbserve::protocol::body::SMBBody::NegotiateResponse(negotiate) => {
                assert_eq!(negotiate.dialect, 0x02FF);
            }
            other => panic!("unexpected wildcard response: {other:?}"),
        },
        other => panic!("expected a modern-family frame, got {other:?}"),
    }
    // Dialect stays unset until the real modern-family negotiate arrives.
    assert_eq!(harness.connection.information().dialect, SMBDialect::NotSet);
}

#[test]
fn andx_batch_chains_responses_and_stops_on_error() {
    let mut harness = Harness::new();
    let uid = harness.logon();
    let tid = harness.tree_connect(uid);

    // A batched open + read: both execute, and the responses chain into a
    // single message because every response in front is AndX-kind.
    let (fid, _) = harness.open(uid, tid, "batch.txt", SMBCreateDisposition::OpenIf);
    harness.roundtrip(
        LegacySMBCommandCode::WriteAndX,
        uid,
        tid,
        LegacySMBBody::WriteRequest(LegacySMBWriteRequest {
            fid,
            offset: 0,
            data: b"xy".to_vec(),
        }),
    );
    let header = harness.header(LegacySMBCommandCode::ReadAndX, uid, tid);
    let message = LegacySMBMessage::new(
        header,
        vec![
            LegacySMBBody::ReadRequest(LegacySMBReadRequest { fid, offset: 0, max_count: 2 }),
            LegacySMBBody::ReadRequest(LegacySMBReadRequest { fid, offset: 1, max_count: 1 }),
        ],
    );
    assert_eq!(harness.send(message), FrameDisposition::Continue);
    let response = harness.recv();
    assert_eq!(response.commands.len(), 2);
    assert!(harness.receiver.try_recv().is_none());

    // A batch whose first command fails executes nothing further.
    let header = harness.header(LegacySMBCommandCode::ReadAndX, uid, tid);
    let message = LegacySMBMessage::new(
        header,
        vec![
            LegacySMBBody::ReadRequest(LegacySMBReadRequest { fid: 999, offset: 0, max_count: 2 }),
            LegacySMBBody::WriteRequest(LegacySMBWriteRequest {
                fid,
                offset: 0,
                data: b"zz".to_vec(),
            }),
        ],
    );
    assert_eq!(harness.send(message), FrameDisposition::Continue);
    let response = harness.recv();
    assert_eq!(response.header.status, NtStatus::InvalidHandle);
    assert_eq!(response.commands.len(), 1);

    // The write after the failing command never ran.
    let response = harness.roundtrip(
        LegacySMBCommandCode::ReadAndX,
        uid,
        tid,
        LegacySMBBody::ReadRequest(LegacySMBReadRequest { fid, offset: 0, max_count: 2 }),
    );
    match &response.commands[0] {
        LegacySMBBody::ReadResponse(read) => assert_eq!(read.data, b"xy"),
        other => panic!("unexpected read response: {other:?}"),
    }
}

#[test]
fn read_past_end_of_file_reports_success_with_no_data() {
    let mut harness = Harness::new();
    let uid = harness.logon();
    let tid = harness.tree_connect(uid);
    let (fid, _) = harness.open(uid, tid, "empty.txt", SMBCreateDisposition::OpenIf);

    let response = harness.roundtrip(
        LegacySMBCommandCode::ReadAndX,
        uid,
        tid,
        LegacySMBBody::ReadRequest(LegacySMBReadRequest { fid, offset: 100, max_count: 16 }),
    );
    assert_eq!(response.header.status, NtStatus::Success);
    match &response.commands[0] {
        LegacySMBBody::ReadResponse(read) => assert!(read.data.is_empty()),
        other => panic!("unexpected read response: {other:?}"),
    }
}

#[test]
fn flush_all_ones_fid_succeeds_unconditionally() {
    let mut harness = Harness::new();
    let uid = harness.logon();
    let tid = harness.tree_connect(uid);

    let response = harness.roundtrip(
        LegacySMBCommandCode::Flush,
        uid,
        tid,
        LegacySMBBody::FlushRequest(LegacySMBFlushRequest { fid: LEGACY_FLUSH_ALL_FID }),
    );
    assert_eq!(response.header.status, NtStatus::Success);
    assert!(matches!(response.commands[0], LegacySMBBody::FlushResponse(_)));
}

#[test]
fn find_first_next_close_pages_a_materialized_listing() {
    let mut harness = Harness::new();
    let uid = harness.logon();
    let tid = harness.tree_connect(uid);

    // Populate docs\ with three files.
    let response = harness.roundtrip(
        LegacySMBCommandCode::NTCreateAndX,
        uid,
        tid,
        LegacySMBBody::OpenRequest(LegacySMBOpenRequest {
            path: "docs".into(),
            desired_access: SMBAccessMask::GENERIC_READ,
            disposition: SMBCreateDisposition::OpenIf,
            options: SMBCreateOptions::DIRECTORY_FILE,
        }),
    );
    assert_eq!(response.header.status, NtStatus::Success);
    for name in ["docs\\a.txt", "docs\\b.txt", "docs\\c.txt"] {
        let (_, status) = harness.open(uid, tid, name, SMBCreateDisposition::OpenIf);
        assert_eq!(status, NtStatus::Success);
    }

    let response = harness.roundtrip(
        LegacySMBCommandCode::Transaction2,
        uid,
        tid,
        LegacySMBBody::FindFirstRequest(LegacySMBFindFirstRequest::new("docs\\*", 2)),
    );
    assert_eq!(response.header.status, NtStatus::Success);
    let (search_handle, first_entries) = match &response.commands[0] {
        LegacySMBBody::FindFirstResponse(find) => {
            assert!(!find.end_of_search);
            (find.search_handle, find.entries.clone())
        }
        other => panic!("unexpected find response: {other:?}"),
    };
    assert_eq!(first_entries.len(), 2);

    let response = harness.roundtrip(
        LegacySMBCommandCode::Transaction2,
        uid,
        tid,
        LegacySMBBody::FindNextRequest(LegacySMBFindNextRequest { search_handle, max_count: 8 }),
    );
    match &response.commands[0] {
        LegacySMBBody::FindNextResponse(find) => {
            assert_eq!(find.entries.len(), 1);
            assert!(find.end_of_search);
        }
        other => panic!("unexpected find response: {other:?}"),
    }

    let response = harness.roundtrip(
        LegacySMBCommandCode::FindClose2,
        uid,
        tid,
        LegacySMBBody::FindCloseRequest(LegacySMBFindCloseRequest { search_handle }),
    );
    assert_eq!(response.header.status, NtStatus::Success);

    // The handle is gone afterwards.
    let response = harness.roundtrip(
        LegacySMBCommandCode::FindClose2,
        uid,
        tid,
        LegacySMBBody::FindCloseRequest(LegacySMBFindCloseRequest { search_handle }),
    );
    assert_eq!(response.header.status, NtStatus::InvalidHandle);
}

#[test]
fn out_of_band_cancel_completes_pending_watch_without_own_response() {
    let mut harness = Harness::new();
    let uid = harness.logon();
    let tid = harness.tree_connect(uid);

    let response = harness.roundtrip(
        LegacySMBCommandCode::NTCreateAndX,
        uid,
        tid,
        LegacySMBBody::OpenRequest(LegacySMBOpenRequest {
            path: "watched".into(),
            desired_access: SMBAccessMask::GENERIC_READ,
            disposition: SMBCreateDisposition::OpenIf,
            options: SMBCreateOptions::DIRECTORY_FILE,
        }),
    );
    let fid = match &response.commands[0] {
        LegacySMBBody::OpenResponse(open) => open.fid,
        other => panic!("unexpected open response: {other:?}"),
    };

    // The watch produces no immediate response.
    let watch_header = harness.header(LegacySMBCommandCode::NTTransact, uid, tid);
    let watch_pid = watch_header.pid;
    let watch_mid = watch_header.mid;
    let message = LegacySMBMessage::single(
        watch_header,
        LegacySMBBody::ChangeNotifyRequest(LegacySMBChangeNotifyRequest {
            fid,
            completion_filter: SMBCompletionFilter::FILE_NAME,
            watch_tree: false,
        }),
    );
    assert_eq!(harness.send(message), FrameDisposition::Continue);
    assert!(harness.receiver.try_recv().is_none());
    assert_eq!(harness.connection.pending().len(), 1);

    // Cancel by PID/MID; the cancel itself has no response, the watch
    // completes exactly once with the cancelled status.
    let cancel_header = LegacySMBHeader::request(LegacySMBCommandCode::NTCancel, watch_mid, watch_pid, uid, tid);
    let message = LegacySMBMessage::single(cancel_header.clone(), LegacySMBBody::CancelRequest(LegacySMBCancelRequest::default()));
    assert_eq!(harness.send(message), FrameDisposition::Continue);

    let completion = harness.recv();
    assert_eq!(completion.header.status, NtStatus::Cancelled);
    assert!(matches!(completion.commands[0], LegacySMBBody::ChangeNotifyResponse(_)));
    assert!(harness.receiver.try_recv().is_none());
    assert!(harness.connection.pending().is_empty());

    // A repeated cancel is a no-op.
    let message = LegacySMBMessage::single(cancel_header, LegacySMBBody::CancelRequest(LegacySMBCancelRequest::default()));
    assert_eq!(harness.send(message), FrameDisposition::Continue);
    assert!(harness.receiver.try_recv().is_none());
}

#[test]
fn logoff_releases_sessions_trees_files_and_searches() {
    let mut harness = Harness::new();
    let uid = harness.logon();
    let tid = harness.tree_connect(uid);
    harness.open(uid, tid, "x.txt", SMBCreateDisposition::OpenIf);
    harness.roundtrip(
        LegacySMBCommandCode::Transaction2,
        uid,
        tid,
        LegacySMBBody::FindFirstRequest(LegacySMBFindFirstRequest::new("*", 10)),
    );

    let response = harness.roundtrip(
        LegacySMBCommandCode::LogoffAndX,
        uid,
        0,
        LegacySMBBody::LogoffRequest(SMBLogoffRequest::default()),
    );
    assert_eq!(response.header.status, NtStatus::Success);
    assert!(harness.connection.information().sessions.is_empty());

    // The removed user id no longer resolves.
    let response = harness.roundtrip(
        LegacySMBCommandCode::ReadAndX,
        uid,
        tid,
        LegacySMBBody::ReadRequest(LegacySMBReadRequest { fid: 1, offset: 0, max_count: 1 }),
    );
    assert_eq!(response.header.status, NtStatus::UserSessionDeleted);
}
