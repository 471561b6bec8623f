//! Legacy-family dispatch engine: AndX batch processing, negotiation by
//! dialect string, and the 16-bit id spaces for sessions, trees, files, and
//! searches.

use std::sync::Arc;

use smbserve_core::logging::{debug, info, warn};
use smbserve_core::nt_status::NtStatus;

use crate::protocol::body::access_mask::FileAccess;
use crate::protocol::body::change_notify::{LegacySMBChangeNotifyRequest, LegacySMBChangeNotifyResponse};
use crate::protocol::body::create::{LegacySMBOpenRequest, LegacySMBOpenResponse};
use crate::protocol::body::dialect::{SMBDialect, NT_LAN_MANAGER_DIALECT, SMB2_WILDCARD_DIALECT};
use crate::protocol::body::empty::{
    SMBEchoResponse, SMBErrorResponse, SMBLogoffResponse, SMBTreeDisconnectResponse,
};
use crate::protocol::body::file_ops::{
    LegacySMBCloseRequest, LegacySMBCloseResponse, LegacySMBFlushRequest, LegacySMBFlushResponse,
    LegacySMBReadRequest, LegacySMBReadResponse, LegacySMBWriteRequest, LegacySMBWriteResponse, LEGACY_FLUSH_ALL_FID,
};
use crate::protocol::body::filetime::FileTime;
use crate::protocol::body::find::{
    LegacySMBFindCloseRequest, LegacySMBFindCloseResponse, LegacySMBFindFirstRequest, LegacySMBFindFirstResponse,
    LegacySMBFindNextRequest, LegacySMBFindNextResponse,
};
use crate::protocol::body::info::{FileInformation, SMBFileInformationClass};
use crate::protocol::body::negotiate::{LegacySMBNegotiateRequest, LegacySMBNegotiateResponse};
use crate::protocol::body::security_mode::SecurityMode;
use crate::protocol::body::session_setup::{LegacySMBSessionSetupRequest, LegacySMBSessionSetupResponse};
use crate::protocol::body::tree_connect::{LegacySMBTreeConnectRequest, LegacySMBTreeConnectResponse};
use crate::protocol::body::create::{SMBCreateDisposition, SMBCreateOptions, SMBFileAttributes, SMBShareAccess};
use crate::protocol::body::access_mask::SMBAccessMask;
use crate::protocol::body::LegacySMBBody;
use crate::protocol::header::LegacySMBHeader;
use crate::protocol::message::{LegacySMBMessage, SMBFrame};
use crate::server::connection::{LegacyConnectionState, SMBConnection, SMBConnectionState, SMBDialectFamilyState};
use crate::server::open::OpenFileObject;
use crate::server::pending::{legacy_cancel_key, PendingOperation};
use crate::server::server::SMBServer;
use crate::server::session::{LegacySMBSession, SecurityContext};
use crate::server::smb2;
use crate::server::FrameDisposition;
use crate::store::NotifyCompletion;
use crate::util::auth::{AuthContext, SecurityProvider};

fn error_body() -> LegacySMBBody {
    LegacySMBBody::ErrorResponse(SMBErrorResponse::default())
}

/// Process one legacy message: every command in the batch shares the header;
/// processing stops at the first command that produced an error status, and
/// responses chain while they remain of a chainable (AndX) kind.
pub(crate) fn process_message<P: SecurityProvider>(
    server: &SMBServer<P>,
    connection: &Arc<SMBConnection<P>>,
    message: LegacySMBMessage,
) -> FrameDisposition {
    let mut guard = connection.state();
    let state = &mut *guard;

    // A legacy-framed negotiate probing for the modern family gets a
    // wildcard modern-family response and leaves the dialect unset.
    if state.dialect == SMBDialect::NotSet {
        if let Some(LegacySMBBody::NegotiateRequest(request)) = message.commands.first() {
            if request.dialects.iter().any(|dialect| dialect == SMB2_WILDCARD_DIALECT) {
                debug!("legacy negotiate probes for the modern family");
                let response = smb2::wildcard_negotiate_response(server);
                let _ = connection.send_queue().enqueue(SMBFrame::Smb2(vec![response]));
                return FrameDisposition::Continue;
            }
        }
    }

    let mut response_header = message.header.create_response_header();
    let mut responses: Vec<LegacySMBBody> = Vec::new();
    let is_batched_request = message.commands.len() > 1;

    for command in &message.commands {
        let command_responses = process_command(server, connection, state, &mut response_header, command);
        responses.extend(command_responses);
        if response_header.status != NtStatus::Success {
            break;
        }
    }

    if is_batched_request && !responses.is_empty() {
        // Batch into an AndX chain: responses stay chained while the last
        // chained response is of a chainable kind.
        let mut chained: Vec<LegacySMBBody> = Vec::new();
        while !responses.is_empty() {
            let chainable = match chained.last() {
                None => true,
                Some(last) => last.is_andx_response(),
            };
            if !chainable {
                break;
            }
            chained.push(responses.remove(0));
        }
        let _ = connection.send_queue().enqueue(SMBFrame::Legacy(LegacySMBMessage::new(
            response_header.clone(),
            chained,
        )));
    }
    for response in responses {
        let _ = connection
            .send_queue()
            .enqueue(SMBFrame::Legacy(LegacySMBMessage::single(response_header.clone(), response)));
    }
    FrameDisposition::Continue
}

/// May return an empty list (cancel has no response).
fn process_command<P: SecurityProvider>(
    server: &SMBServer<P>,
    connection: &Arc<SMBConnection<P>>,
    state: &mut SMBConnectionState<P>,
    header: &mut LegacySMBHeader,
    command: &LegacySMBBody,
) -> Vec<LegacySMBBody> {
    if state.dialect == SMBDialect::NotSet {
        return match command {
            LegacySMBBody::NegotiateRequest(request) => handle_negotiate(server, state, request),
            _ => {
                // A negotiate exchange must complete before any other
                // command; the legacy family answers with an error and the
                // connection stays open.
                debug!("command before negotiate");
                header.status = NtStatus::InvalidSmb;
                vec![error_body()]
            }
        };
    }
    if matches!(command, LegacySMBBody::NegotiateRequest(_)) {
        // Only one negotiate exchange per connection; repeats are rejected
        // without touching the negotiated dialect.
        debug!("repeat negotiate rejected");
        header.status = NtStatus::InvalidSmb;
        return vec![error_body()];
    }

    let SMBConnectionState { auth_context, family, .. } = state;
    let SMBDialectFamilyState::Legacy(legacy) = family else {
        debug!("legacy frame on a modern-family connection");
        header.status = NtStatus::InvalidSmb;
        return vec![error_body()];
    };

    match command {
        LegacySMBBody::SessionSetupRequest(request) => {
            handle_session_setup(server, connection, auth_context, legacy, header, request)
        }
        LegacySMBBody::EchoRequest(_) => vec![LegacySMBBody::EchoResponse(SMBEchoResponse::default())],
        _ => {
            if legacy.get_session(header.uid).is_none() {
                header.status = NtStatus::UserSessionDeleted;
                return vec![error_body()];
            }
            match command {
                LegacySMBBody::TreeConnectRequest(request) => handle_tree_connect(server, legacy, header, request),
                LegacySMBBody::LogoffRequest(_) => handle_logoff(server, auth_context, legacy, header),
                _ => {
                    let Some(session) = legacy.get_session(header.uid) else {
                        header.status = NtStatus::UserSessionDeleted;
                        return vec![error_body()];
                    };
                    if session.get_connected_tree(header.tid).is_none() {
                        debug!(uid = header.uid, tid = header.tid, "command against unknown tree");
                        header.status = NtStatus::SmbBadTid;
                        return vec![error_body()];
                    }
                    handle_tree_command(connection, legacy, header, command)
                }
            }
        }
    }
}

fn handle_negotiate<P: SecurityProvider>(
    server: &SMBServer<P>,
    state: &mut SMBConnectionState<P>,
    request: &LegacySMBNegotiateRequest,
) -> Vec<LegacySMBBody> {
    let Some(index) = request
        .dialects
        .iter()
        .position(|dialect| dialect == NT_LAN_MANAGER_DIALECT)
    else {
        debug!("no supported legacy dialect offered");
        return vec![LegacySMBBody::NegotiateResponse(LegacySMBNegotiateResponse::not_supported())];
    };

    state.dialect = SMBDialect::NtLm012;
    state.family = SMBDialectFamilyState::Legacy(LegacyConnectionState::new());
    let (context, challenge, _status) = server.security_provider().get_challenge(&[]);
    state.auth_context = Some(context);
    info!("legacy dialect negotiated");

    vec![LegacySMBBody::NegotiateResponse(LegacySMBNegotiateResponse {
        dialect_index: index as u16,
        security_mode: SecurityMode::SIGNING_ENABLED,
        max_buffer_size: 65535,
        system_time: FileTime::now(),
        challenge,
    })]
}

fn handle_session_setup<P: SecurityProvider>(
    server: &SMBServer<P>,
    connection: &Arc<SMBConnection<P>>,
    auth_context: &mut Option<P::Context>,
    legacy: &mut LegacyConnectionState,
    header: &mut LegacySMBHeader,
    request: &LegacySMBSessionSetupRequest,
) -> Vec<LegacySMBBody> {
    legacy.max_buffer_size = request.max_buffer_size;
    let context = auth_context.get_or_insert_with(P::Context::init);
    let provider = server.security_provider();
    let (output_token, status) = provider.accept_security_token(context, &request.security_buffer);

    match status {
        NtStatus::SecIContinueNeeded | NtStatus::MoreProcessingRequired => {
            let user_id = if header.uid != 0 && legacy.preauth_user_ids.contains_key(&header.uid) {
                header.uid
            } else {
                match legacy.allocate_user_id() {
                    Some(id) => id,
                    None => {
                        header.status = NtStatus::RequestNotAccepted;
                        return vec![error_body()];
                    }
                }
            };
            legacy.preauth_user_ids.insert(user_id, FileTime::now());
            header.uid = user_id;
            header.status = NtStatus::MoreProcessingRequired;
            vec![LegacySMBBody::SessionSetupResponse(LegacySMBSessionSetupResponse {
                guest: false,
                security_buffer: output_token,
            })]
        }
        NtStatus::Success => {
            let Some(principal) = provider.authenticated_principal(context) else {
                warn!("provider reported success without a principal");
                header.status = NtStatus::LogonFailure;
                return vec![error_body()];
            };
            let user_id = if header.uid != 0 && legacy.preauth_user_ids.remove(&header.uid).is_some() {
                header.uid
            } else {
                match legacy.allocate_user_id() {
                    Some(id) => id,
                    None => {
                        header.status = NtStatus::RequestNotAccepted;
                        return vec![error_body()];
                    }
                }
            };
            let security_context = SecurityContext {
                user_name: principal.user_name.clone(),
                machine_name: principal.machine_name.clone(),
                client_endpoint: connection.client_endpoint().to_string(),
                guest: principal.guest,
            };
            info!(user = %principal.user_name, uid = user_id, "legacy session established");
            legacy
                .session_table
                .insert(user_id, LegacySMBSession::new(user_id, security_context));
            header.uid = user_id;
            vec![LegacySMBBody::SessionSetupResponse(LegacySMBSessionSetupResponse {
                guest: principal.guest,
                security_buffer: output_token,
            })]
        }
        failure => {
            if header.uid != 0 {
                legacy.preauth_user_ids.remove(&header.uid);
            }
            warn!(status = ?failure, "legacy logon failed");
            header.status = NtStatus::LogonFailure;
            vec![error_body()]
        }
    }
}

fn handle_logoff<P: SecurityProvider>(
    server: &SMBServer<P>,
    auth_context: &mut Option<P::Context>,
    legacy: &mut LegacyConnectionState,
    header: &mut LegacySMBHeader,
) -> Vec<LegacySMBBody> {
    let Some(mut session) = legacy.remove_session(header.uid) else {
        header.status = NtStatus::UserSessionDeleted;
        return vec![error_body()];
    };
    info!(user = %session.security_context().user_name, uid = header.uid, "logoff");
    if let Some(context) = auth_context.as_mut() {
        server.security_provider().delete_security_context(context);
    }
    *auth_context = None;
    session.close();
    vec![LegacySMBBody::LogoffResponse(SMBLogoffResponse::default())]
}

fn handle_tree_connect<P: SecurityProvider>(
    server: &SMBServer<P>,
    legacy: &mut LegacyConnectionState,
    header: &mut LegacySMBHeader,
    request: &LegacySMBTreeConnectRequest,
) -> Vec<LegacySMBBody> {
    let share_name = request.share_name();
    let Some(share) = server.share_named(share_name) else {
        debug!(share = share_name, "tree connect to unknown share");
        header.status = NtStatus::BadNetworkName;
        return vec![error_body()];
    };
    let Some(tree_id) = legacy.allocate_tree_id() else {
        header.status = NtStatus::RequestNotAccepted;
        return vec![error_body()];
    };
    let Some(session) = legacy.get_session_mut(header.uid) else {
        header.status = NtStatus::UserSessionDeleted;
        return vec![error_body()];
    };
    if !share.has_access(session.security_context(), "\\", FileAccess::Read) {
        warn!(share = share_name, user = %session.security_context().user_name, "tree connect denied");
        header.status = NtStatus::AccessDenied;
        return vec![error_body()];
    }
    let service = share.service_name().to_string();
    session.add_connected_tree(tree_id, share);
    header.tid = tree_id;
    debug!(share = share_name, tid = tree_id, "legacy tree connected");
    vec![LegacySMBBody::TreeConnectResponse(LegacySMBTreeConnectResponse { service })]
}

fn handle_tree_command<P: SecurityProvider>(
    connection: &Arc<SMBConnection<P>>,
    legacy: &mut LegacyConnectionState,
    header: &mut LegacySMBHeader,
    command: &LegacySMBBody,
) -> Vec<LegacySMBBody> {
    match command {
        LegacySMBBody::TreeDisconnectRequest(_) => {
            if let Some(session) = legacy.get_session_mut(header.uid) {
                session.disconnect_tree(header.tid);
            }
            vec![LegacySMBBody::TreeDisconnectResponse(SMBTreeDisconnectResponse::default())]
        }
        LegacySMBBody::OpenRequest(request) => handle_open(legacy, header, request),
        LegacySMBBody::CloseRequest(request) => handle_close(legacy, header, request),
        LegacySMBBody::ReadRequest(request) => handle_read(legacy, header, request),
        LegacySMBBody::WriteRequest(request) => handle_write(legacy, header, request),
        LegacySMBBody::FlushRequest(request) => handle_flush(legacy, header, request),
        LegacySMBBody::FindFirstRequest(request) => handle_find_first(legacy, header, request),
        LegacySMBBody::FindNextRequest(request) => handle_find_next(legacy, header, request),
        LegacySMBBody::FindCloseRequest(request) => handle_find_close(legacy, header, request),
        LegacySMBBody::ChangeNotifyRequest(request) => handle_change_notify(connection, legacy, header, request),
        LegacySMBBody::CancelRequest(_) => handle_cancel(connection, header),
        _ => {
            debug!("unsupported legacy command");
            header.status = NtStatus::SmbBadCommand;
            vec![error_body()]
        }
    }
}

struct ResolvedTree {
    share: Arc<dyn crate::server::share::SharedResource>,
}

fn resolve_tree(session: &LegacySMBSession, tid: u16) -> Option<ResolvedTree> {
    session.get_connected_tree(tid).map(|share| ResolvedTree { share: share.clone() })
}

fn handle_open(
    legacy: &mut LegacyConnectionState,
    header: &mut LegacySMBHeader,
    request: &LegacySMBOpenRequest,
) -> Vec<LegacySMBBody> {
    let Some(file_id) = legacy.allocate_file_id() else {
        header.status = NtStatus::RequestNotAccepted;
        return vec![error_body()];
    };
    let Some(session) = legacy.get_session_mut(header.uid) else {
        header.status = NtStatus::UserSessionDeleted;
        return vec![error_body()];
    };
    let Some(tree) = resolve_tree(session, header.tid) else {
        header.status = NtStatus::SmbBadTid;
        return vec![error_body()];
    };
    let access = request.desired_access.file_access();
    if !tree.share.has_access(session.security_context(), &request.path, access) {
        warn!(path = %request.path, user = %session.security_context().user_name, "open denied");
        header.status = NtStatus::AccessDenied;
        return vec![error_body()];
    }
    let store = tree.share.file_store();
    match store.create_file(
        &request.path,
        request.desired_access,
        SMBFileAttributes::NORMAL,
        SMBShareAccess::READ | SMBShareAccess::WRITE,
        request.disposition,
        request.options,
    ) {
        Ok((handle, create_action)) => {
            let end_of_file = match store.get_file_information(handle, SMBFileInformationClass::Standard) {
                Ok(FileInformation::Standard { end_of_file, .. }) => end_of_file,
                _ => 0,
            };
            session.add_open_file(
                file_id,
                OpenFileObject::new(u32::from(header.tid), tree.share.name().into(), request.path.clone(), handle, access),
            );
            debug!(path = %request.path, fid = file_id, "legacy file opened");
            vec![LegacySMBBody::OpenResponse(LegacySMBOpenResponse {
                fid: file_id,
                create_action,
                end_of_file,
            })]
        }
        Err(status) => {
            debug!(path = %request.path, status = ?status, "legacy open failed");
            header.status = status;
            vec![error_body()]
        }
    }
}

fn handle_close(
    legacy: &mut LegacyConnectionState,
    header: &mut LegacySMBHeader,
    request: &LegacySMBCloseRequest,
) -> Vec<LegacySMBBody> {
    let Some(session) = legacy.get_session_mut(header.uid) else {
        header.status = NtStatus::UserSessionDeleted;
        return vec![error_body()];
    };
    let Some(tree) = resolve_tree(session, header.tid) else {
        header.status = NtStatus::SmbBadTid;
        return vec![error_body()];
    };
    match session.remove_open_file(request.fid) {
        Some(open) => {
            let _ = tree.share.file_store().close_file(open.handle());
            vec![LegacySMBBody::CloseResponse(LegacySMBCloseResponse {})]
        }
        None => {
            debug!(fid = request.fid, "close with invalid fid");
            header.status = NtStatus::InvalidHandle;
            vec![error_body()]
        }
    }
}

fn handle_read(
    legacy: &mut LegacyConnectionState,
    header: &mut LegacySMBHeader,
    request: &LegacySMBReadRequest,
) -> Vec<LegacySMBBody> {
    let Some(session) = legacy.get_session(header.uid) else {
        header.status = NtStatus::UserSessionDeleted;
        return vec![error_body()];
    };
    let Some(tree) = resolve_tree(session, header.tid) else {
        header.status = NtStatus::SmbBadTid;
        return vec![error_body()];
    };
    let Some(open) = session.get_open_file(request.fid) else {
        debug!(uid = header.uid, tid = header.tid, fid = request.fid, "read with invalid fid");
        header.status = NtStatus::InvalidHandle;
        return vec![error_body()];
    };
    if !tree.share.has_access(session.security_context(), open.path(), FileAccess::Read) {
        warn!(path = open.path(), user = %session.security_context().user_name, "read denied");
        header.status = NtStatus::AccessDenied;
        return vec![error_body()];
    }
    match tree.share.file_store().read_file(open.handle(), request.offset, request.max_count) {
        Ok(data) => vec![LegacySMBBody::ReadResponse(LegacySMBReadResponse {
            data,
            available: 0xFFFF,
        })],
        // Reads past end-of-file report success with no data; legacy
        // clients expect this rather than an error status.
        Err(NtStatus::EndOfFile) => vec![LegacySMBBody::ReadResponse(LegacySMBReadResponse {
            data: Vec::new(),
            available: 0xFFFF,
        })],
        Err(status) => {
            debug!(path = open.path(), status = ?status, "legacy read failed");
            header.status = status;
            vec![error_body()]
        }
    }
}

fn handle_write(
    legacy: &mut LegacyConnectionState,
    header: &mut LegacySMBHeader,
    request: &LegacySMBWriteRequest,
) -> Vec<LegacySMBBody> {
    let Some(session) = legacy.get_session(header.uid) else {
        header.status = NtStatus::UserSessionDeleted;
        return vec![error_body()];
    };
    let Some(tree) = resolve_tree(session, header.tid) else {
        header.status = NtStatus::SmbBadTid;
        return vec![error_body()];
    };
    let Some(open) = session.get_open_file(request.fid) else {
        debug!(uid = header.uid, tid = header.tid, fid = request.fid, "write with invalid fid");
        header.status = NtStatus::InvalidHandle;
        return vec![error_body()];
    };
    if !tree.share.has_access(session.security_context(), open.path(), FileAccess::Write) {
        warn!(path = open.path(), user = %session.security_context().user_name, "write denied");
        header.status = NtStatus::AccessDenied;
        return vec![error_body()];
    }
    match tree.share.file_store().write_file(open.handle(), request.offset, &request.data) {
        Ok(count) => vec![LegacySMBBody::WriteResponse(LegacySMBWriteResponse { count, available: 0xFFFF })],
        Err(status) => {
            debug!(path = open.path(), status = ?status, "legacy write failed");
            header.status = status;
            vec![error_body()]
        }
    }
}

fn handle_flush(
    legacy: &mut LegacyConnectionState,
    header: &mut LegacySMBHeader,
    request: &LegacySMBFlushRequest,
) -> Vec<LegacySMBBody> {
    // The all-ones FID addresses every file the requester opened; answered
    // with unconditional success, without enumerating the open table.
    if request.fid == LEGACY_FLUSH_ALL_FID {
        return vec![LegacySMBBody::FlushResponse(LegacySMBFlushResponse {})];
    }
    let Some(session) = legacy.get_session(header.uid) else {
        header.status = NtStatus::UserSessionDeleted;
        return vec![error_body()];
    };
    let Some(tree) = resolve_tree(session, header.tid) else {
        header.status = NtStatus::SmbBadTid;
        return vec![error_body()];
    };
    let Some(open) = session.get_open_file(request.fid) else {
        header.status = NtStatus::InvalidHandle;
        return vec![error_body()];
    };
    match tree.share.file_store().flush_file_buffers(open.handle()) {
        Ok(()) => vec![LegacySMBBody::FlushResponse(LegacySMBFlushResponse {})],
        Err(status) => {
            header.status = status;
            vec![error_body()]
        }
    }
}

/// Split a search pattern into its directory part and file mask.
fn split_pattern(pattern: &str) -> (String, String) {
    let normalized = pattern.replace('/', "\\");
    match normalized.rfind('\\') {
        Some(index) => (normalized[..index].to_string(), normalized[index + 1..].to_string()),
        None => (String::new(), normalized),
    }
}

fn handle_find_first(
    legacy: &mut LegacyConnectionState,
    header: &mut LegacySMBHeader,
    request: &LegacySMBFindFirstRequest,
) -> Vec<LegacySMBBody> {
    let Some(session) = legacy.get_session_mut(header.uid) else {
        header.status = NtStatus::UserSessionDeleted;
        return vec![error_body()];
    };
    let Some(tree) = resolve_tree(session, header.tid) else {
        header.status = NtStatus::SmbBadTid;
        return vec![error_body()];
    };
    if !tree.share.has_access(session.security_context(), &request.pattern, FileAccess::Read) {
        header.status = NtStatus::AccessDenied;
        return vec![error_body()];
    }
    let (directory, mask) = split_pattern(&request.pattern);
    let store = tree.share.file_store();
    let listing = store
        .create_file(
            &directory,
            SMBAccessMask::GENERIC_READ,
            SMBFileAttributes::DIRECTORY,
            SMBShareAccess::READ,
            SMBCreateDisposition::Open,
            SMBCreateOptions::DIRECTORY_FILE,
        )
        .and_then(|(handle, _)| {
            let result = store.query_directory(handle, &mask);
            let _ = store.close_file(handle);
            result
        });
    let entries = match listing {
        Ok(entries) => entries,
        Err(status) => {
            debug!(pattern = %request.pattern, status = ?status, "find first failed");
            header.status = status;
            return vec![error_body()];
        }
    };
    let Some(search_handle) = session.add_open_search(header.tid, entries) else {
        header.status = NtStatus::RequestNotAccepted;
        return vec![error_body()];
    };
    // The allocation above guarantees the search exists.
    let Some(search) = session.get_open_search_mut(search_handle) else {
        header.status = NtStatus::RequestNotAccepted;
        return vec![error_body()];
    };
    let (entries, end_of_search) = search.next_entries(usize::from(request.max_count));
    if end_of_search && request.close_at_end_of_search {
        session.remove_open_search(search_handle);
    }
    vec![LegacySMBBody::FindFirstResponse(LegacySMBFindFirstResponse {
        search_handle,
        entries,
        end_of_search,
    })]
}

fn handle_find_next(
    legacy: &mut LegacyConnectionState,
    header: &mut LegacySMBHeader,
    request: &LegacySMBFindNextRequest,
) -> Vec<LegacySMBBody> {
    let Some(session) = legacy.get_session_mut(header.uid) else {
        header.status = NtStatus::UserSessionDeleted;
        return vec![error_body()];
    };
    let Some(search) = session.get_open_search_mut(request.search_handle) else {
        debug!(search_handle = request.search_handle, "find next with invalid handle");
        header.status = NtStatus::InvalidHandle;
        return vec![error_body()];
    };
    let (entries, end_of_search) = search.next_entries(usize::from(request.max_count));
    vec![LegacySMBBody::FindNextResponse(LegacySMBFindNextResponse { entries, end_of_search })]
}

fn handle_find_close(
    legacy: &mut LegacyConnectionState,
    header: &mut LegacySMBHeader,
    request: &LegacySMBFindCloseRequest,
) -> Vec<LegacySMBBody> {
    let Some(session) = legacy.get_session_mut(header.uid) else {
        header.status = NtStatus::UserSessionDeleted;
        return vec![error_body()];
    };
    match session.remove_open_search(request.search_handle) {
        Some(_) => vec![LegacySMBBody::FindCloseResponse(LegacySMBFindCloseResponse {})],
        None => {
            header.status = NtStatus::InvalidHandle;
            vec![error_body()]
        }
    }
}

/// Register a change watch; no response is produced until the watch
/// completes (or is cancelled), at which point the completion callback
/// enqueues the final message.
fn handle_change_notify<P: SecurityProvider>(
    connection: &Arc<SMBConnection<P>>,
    legacy: &mut LegacyConnectionState,
    header: &mut LegacySMBHeader,
    request: &LegacySMBChangeNotifyRequest,
) -> Vec<LegacySMBBody> {
    let Some(session) = legacy.get_session(header.uid) else {
        header.status = NtStatus::UserSessionDeleted;
        return vec![error_body()];
    };
    let Some(tree) = resolve_tree(session, header.tid) else {
        header.status = NtStatus::SmbBadTid;
        return vec![error_body()];
    };
    let Some(open) = session.get_open_file(request.fid) else {
        header.status = NtStatus::InvalidHandle;
        return vec![error_body()];
    };

    let cancel_key = legacy_cancel_key(header.pid, header.mid);
    let pending = connection.pending().clone();
    let queue = connection.send_queue().clone();
    let response_header = header.create_response_header();

    let on_complete: NotifyCompletion = Box::new(move |status, buffer| {
        pending.take(cancel_key);
        let mut final_header = response_header.clone();
        final_header.status = status;
        let _ = queue.enqueue(SMBFrame::Legacy(LegacySMBMessage::single(
            final_header,
            LegacySMBBody::ChangeNotifyResponse(LegacySMBChangeNotifyResponse { buffer }),
        )));
    });

    let store = tree.share.file_store().clone();
    match store.notify_change(open.handle(), request.completion_filter, request.watch_tree, 4096, on_complete) {
        Ok(token) => {
            connection.pending().register(PendingOperation {
                cancel_key,
                file_id: u64::from(request.fid),
                message_id: u64::from(header.mid),
                token,
                store,
            });
            debug!(fid = request.fid, "legacy change watch pending");
            Vec::new()
        }
        Err(status) => {
            header.status = status;
            vec![error_body()]
        }
    }
}

/// Out-of-band cancel: no response, even when nothing matched.
fn handle_cancel<P: SecurityProvider>(connection: &Arc<SMBConnection<P>>, header: &LegacySMBHeader) -> Vec<LegacySMBBody> {
    let cancel_key = legacy_cancel_key(header.pid, header.mid);
    if let Some(operation) = connection.pending().take(cancel_key) {
        debug!(pid = header.pid, mid = header.mid, "cancelling pending legacy operation");
        operation.store.cancel(operation.token);
    }
    Vec::new()
}
