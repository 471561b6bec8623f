//! Modern-family dispatch engine: compound-chain processing, the
//! negotiate/session-setup handshake, per-operation routing, credit grants,
//! and signing policy.

use std::sync::Arc;

use smbserve_core::logging::{debug, info, warn};
use smbserve_core::nt_status::NtStatus;

use crate::protocol::body::change_notify::{SMBChangeNotifyRequest, SMBChangeNotifyResponse};
use crate::protocol::body::create::{SMBCreateRequest, SMBCreateResponse, SMBFileId};
use crate::protocol::body::dialect::{SMBDialect, SMB2_WILDCARD_CODE};
use crate::protocol::body::empty::{
    SMBEchoResponse, SMBErrorResponse, SMBLogoffResponse, SMBTreeDisconnectResponse,
};
use crate::protocol::body::file_ops::{
    SMBCloseRequest, SMBCloseResponse, SMBFlushRequest, SMBFlushResponse, SMBReadRequest, SMBReadResponse,
    SMBWriteRequest, SMBWriteResponse,
};
use crate::protocol::body::filetime::FileTime;
use crate::protocol::body::info::{
    FileInformation, SMBFileInformationClass, SMBInfoType, SMBQueryDirectoryRequest, SMBQueryDirectoryResponse,
    SMBQueryInfoRequest, SMBQueryInfoResponse, SMBSetInfoRequest, SMBSetInfoResponse,
};
use crate::protocol::body::ioctl::{SMBIoCtlRequest, SMBIoCtlResponse, FSCTL_DFS_GET_REFERRALS};
use crate::protocol::body::lock::SMBLockRequest;
use crate::protocol::body::negotiate::{SMBNegotiateRequest, SMBNegotiateResponse};
use crate::protocol::body::security_mode::SecurityMode;
use crate::protocol::body::session_setup::{SMBSessionFlags, SMBSessionSetupRequest, SMBSessionSetupResponse};
use crate::protocol::body::tree_connect::{SMBShareType, SMBTreeConnectRequest, SMBTreeConnectResponse};
use crate::protocol::body::SMBBody;
use crate::protocol::body::access_mask::FileAccess;
use crate::protocol::header::{SMBCommandCode, SMBFlags, SMBSyncHeader};
use crate::protocol::message::{SMBFrame, SMBMessage, SMBMessageType};
use crate::server::connection::{
    SMBConnection, SMBConnectionState, SMBDialectFamilyState, SMBPreauthSession, Smb2ConnectionState,
};
use crate::server::pending::PendingOperation;
use crate::server::server::SMBServer;
use crate::server::session::{SMBSession, SecurityContext};
use crate::server::share::{ResourceType, SharedResource};
use crate::server::FrameDisposition;
use crate::store::NotifyCompletion;
use crate::util::auth::{AuthContext, SecurityProvider};
use crate::util::crypto;

enum CommandOutcome {
    Response(SMBMessageType),
    Disconnect,
}

fn respond(request: &SMBMessageType, status: NtStatus, body: SMBBody) -> CommandOutcome {
    CommandOutcome::Response(SMBMessage::new(request.header.create_response_header(status), body))
}

fn respond_error(request: &SMBMessageType, status: NtStatus) -> CommandOutcome {
    respond(request, status, SMBBody::ErrorResponse(SMBErrorResponse::default()))
}

fn error_response(request: &SMBMessageType, status: NtStatus) -> SMBMessageType {
    SMBMessage::new(
        request.header.create_response_header(status),
        SMBBody::ErrorResponse(SMBErrorResponse::default()),
    )
}

/// Process one compound chain: commands execute strictly in request order,
/// with the carried file identifier threaded across consecutive related
/// commands, and the whole chain leaves as one ordered response unit.
pub(crate) fn process_request_chain<P: SecurityProvider>(
    server: &SMBServer<P>,
    connection: &Arc<SMBConnection<P>>,
    chain: Vec<SMBMessageType>,
) -> FrameDisposition {
    let mut guard = connection.state();
    let state = &mut *guard;

    let mut responses: Vec<SMBMessageType> = Vec::new();
    let mut carried_id: Option<SMBFileId> = None;
    let mut carried_status: Option<NtStatus> = None;
    let mut disposition = FrameDisposition::Continue;

    for mut request in chain {
        let outcome = if request.header.is_related_operations() && request.body.contains_file_id() {
            match (carried_status, carried_id) {
                (Some(status), _) if !status.carries_payload() => {
                    // The command this one depends on failed; surface that
                    // exact status without executing.
                    debug!(status = ?status, "related command inherits prior failure");
                    CommandOutcome::Response(error_response(&request, status))
                }
                (_, Some(id)) => {
                    request.body.set_request_file_id(id);
                    process_command(server, connection, state, &request)
                }
                (_, None) => {
                    // The previous command neither contains nor generates a
                    // file identifier.
                    debug!("related command has no carried file id");
                    CommandOutcome::Response(error_response(&request, NtStatus::InvalidParameter))
                }
            }
        } else {
            carried_id = request.body.request_file_id();
            process_command(server, connection, state, &request)
        };

        match outcome {
            CommandOutcome::Response(mut response) => {
                update_response_header(state.family.smb2(), &request, &mut response);
                let generates_id = matches!(
                    request.header.command,
                    SMBCommandCode::Create | SMBCommandCode::IoCtl
                );
                if generates_id {
                    carried_id = response.body.response_file_id();
                    carried_status = Some(response.header.status);
                } else if request.body.contains_file_id() {
                    carried_status = Some(response.header.status);
                }
                responses.push(response);
            }
            CommandOutcome::Disconnect => {
                disposition = FrameDisposition::Disconnect;
                break;
            }
        }
    }

    if !responses.is_empty() {
        enqueue_response_chain(state, connection, responses);
    }
    disposition
}

/// Back-fill the uniform response header fields from the request: matching
/// identifiers, credits granted as at least one, the related flag, and the
/// signing decision (never for an interim async pending response).
fn update_response_header(
    smb2: Option<&Smb2ConnectionState>,
    request: &SMBMessageType,
    response: &mut SMBMessageType,
) {
    response.header.message_id = request.header.message_id;
    response.header.credit_charge = request.header.credit_charge;
    response.header.credits = request.header.credits.max(1);
    if request.header.is_related_operations() {
        response.header.flags |= SMBFlags::RELATED_OPERATIONS;
    }
    if response.header.session_id == 0 {
        response.header.session_id = request.header.session_id;
    }
    if response.header.tree_id == 0 {
        response.header.tree_id = request.header.tree_id;
    }
    let signing_required = smb2
        .and_then(|state| state.get_session(response.header.session_id))
        .map(|session| session.signing_required())
        .unwrap_or(false);
    let is_interim = response.header.is_async() && response.header.status == NtStatus::Pending;
    if (request.header.is_signed() || signing_required) && !is_interim {
        response.header.flags |= SMBFlags::SIGNED;
    }
}

fn enqueue_response_chain<P: SecurityProvider>(
    state: &SMBConnectionState<P>,
    connection: &Arc<SMBConnection<P>>,
    mut chain: Vec<SMBMessageType>,
) {
    // Sessions may be multiplexed on one connection; signing follows the
    // session of the first response in the chain.
    let signing_key = state.family.smb2().and_then(|smb2| {
        let session_id = chain.first().map(|message| message.header.session_id).unwrap_or(0);
        if session_id == 0 {
            None
        } else {
            smb2.get_session(session_id).and_then(|session| session.signing_key())
        }
    });
    for message in &mut chain {
        if message.header.is_signed() {
            match signing_key {
                Some(key) => {
                    if let Err(error) = message.sign(&key) {
                        warn!(error = %error, "response signing failed");
                        message.header.flags -= SMBFlags::SIGNED;
                    }
                }
                None => message.header.flags -= SMBFlags::SIGNED,
            }
        }
    }
    let _ = connection.send_queue().enqueue(SMBFrame::Smb2(chain));
}

fn process_command<P: SecurityProvider>(
    server: &SMBServer<P>,
    connection: &Arc<SMBConnection<P>>,
    state: &mut SMBConnectionState<P>,
    request: &SMBMessageType,
) -> CommandOutcome {
    if state.dialect == SMBDialect::NotSet {
        return match &request.body {
            SMBBody::NegotiateRequest(body) => handle_negotiate(server, state, request, body),
            _ => {
                // No response is protocol-legal without a negotiated
                // dialect; the connection must be closed.
                debug!(command = ?request.header.command, "command before negotiate, disconnecting");
                CommandOutcome::Disconnect
            }
        };
    }
    if matches!(request.body, SMBBody::NegotiateRequest(_)) {
        // Repeat negotiation is a protocol violation on this family.
        debug!("negotiate after dialect already set, disconnecting");
        return CommandOutcome::Disconnect;
    }

    match &request.body {
        SMBBody::SessionSetupRequest(body) => handle_session_setup(server, connection, state, request, body),
        SMBBody::EchoRequest(_) => respond(request, NtStatus::Success, SMBBody::EchoResponse(SMBEchoResponse::default())),
        _ => {
            let SMBConnectionState { auth_context, family, .. } = state;
            let SMBDialectFamilyState::Smb2(smb2) = family else {
                debug!("modern-family frame on a legacy connection, disconnecting");
                return CommandOutcome::Disconnect;
            };
            if smb2.get_session(request.header.session_id).is_none() {
                return respond_error(request, NtStatus::UserSessionDeleted);
            }
            match &request.body {
                SMBBody::TreeConnectRequest(body) => handle_tree_connect(server, smb2, request, body),
                SMBBody::LogoffRequest(_) => handle_logoff(server, auth_context, smb2, request),
                SMBBody::CancelRequest(_) => handle_cancel(connection, request),
                _ => handle_tree_command(connection, smb2, request),
            }
        }
    }
}

fn handle_negotiate<P: SecurityProvider>(
    server: &SMBServer<P>,
    state: &mut SMBConnectionState<P>,
    request: &SMBMessageType,
    body: &SMBNegotiateRequest,
) -> CommandOutcome {
    let selected = body
        .dialects
        .iter()
        .filter_map(|code| SMBDialect::from_wire_code(*code))
        .filter(|dialect| server.enable_smb3() || *dialect != SMBDialect::V3_0_0)
        .max();
    let Some(dialect) = selected else {
        debug!("negotiate offered no supported dialect");
        return respond_error(request, NtStatus::NotSupported);
    };

    state.dialect = dialect;
    state.family = SMBDialectFamilyState::Smb2(Smb2ConnectionState::new());
    let (context, challenge_token, _status) = server.security_provider().get_challenge(&[]);
    state.auth_context = Some(context);
    info!(dialect = ?dialect, "dialect negotiated");

    let mut security_mode = SecurityMode::SIGNING_ENABLED;
    if server.require_signing() {
        security_mode |= SecurityMode::SIGNING_REQUIRED;
    }
    let response = SMBNegotiateResponse {
        dialect: dialect.wire_code().unwrap_or(SMB2_WILDCARD_CODE),
        security_mode,
        capabilities: server.capabilities(),
        server_guid: server.guid(),
        system_time: FileTime::now(),
        server_start_time: server.start_time(),
        max_transact_size: server.max_transact_size(),
        max_read_size: server.max_read_size(),
        max_write_size: server.max_write_size(),
        security_buffer: challenge_token,
    };
    respond(request, NtStatus::Success, SMBBody::NegotiateResponse(response))
}

/// Wildcard response to a legacy-framed negotiate that probes for this
/// family; the connection stays un-negotiated until the real negotiate
/// arrives.
pub(crate) fn wildcard_negotiate_response<P: SecurityProvider>(server: &SMBServer<P>) -> SMBMessageType {
    let mut header = SMBSyncHeader::new(SMBCommandCode::Negotiate);
    header.flags = SMBFlags::SERVER_TO_REDIR;
    let response = SMBNegotiateResponse {
        dialect: SMB2_WILDCARD_CODE,
        security_mode: SecurityMode::SIGNING_ENABLED,
        capabilities: server.capabilities(),
        server_guid: server.guid(),
        system_time: FileTime::now(),
        server_start_time: server.start_time(),
        max_transact_size: server.max_transact_size(),
        max_read_size: server.max_read_size(),
        max_write_size: server.max_write_size(),
        security_buffer: Vec::new(),
    };
    SMBMessage::new(header, SMBBody::NegotiateResponse(response))
}

fn handle_session_setup<P: SecurityProvider>(
    server: &SMBServer<P>,
    connection: &Arc<SMBConnection<P>>,
    state: &mut SMBConnectionState<P>,
    request: &SMBMessageType,
    body: &SMBSessionSetupRequest,
) -> CommandOutcome {
    let SMBConnectionState { auth_context, family, .. } = state;
    let SMBDialectFamilyState::Smb2(smb2) = family else {
        return CommandOutcome::Disconnect;
    };
    let context = auth_context.get_or_insert_with(P::Context::init);
    let provider = server.security_provider();
    let (output_token, status) = provider.accept_security_token(context, &body.security_buffer);

    match status {
        NtStatus::SecIContinueNeeded | NtStatus::MoreProcessingRequired => {
            let session_id = if request.header.session_id != 0 {
                request.header.session_id
            } else {
                smb2.allocate_session_id()
            };
            smb2.preauth_session_table
                .insert(session_id, SMBPreauthSession::new(session_id));
            let mut response = error_response(request, NtStatus::MoreProcessingRequired);
            response.body = SMBBody::SessionSetupResponse(SMBSessionSetupResponse {
                session_flags: SMBSessionFlags::empty(),
                security_buffer: output_token,
            });
            response.header.session_id = session_id;
            CommandOutcome::Response(response)
        }
        NtStatus::Success => {
            let Some(principal) = provider.authenticated_principal(context) else {
                warn!("provider reported success without a principal");
                return respond_error(request, NtStatus::LogonFailure);
            };
            let session_id = if request.header.session_id != 0 {
                request.header.session_id
            } else {
                smb2.allocate_session_id()
            };
            smb2.preauth_session_table.remove(&session_id);

            let signing_key = if principal.session_key.is_empty() {
                None
            } else {
                crypto::derive_signing_key(&principal.session_key).ok()
            };
            let signing_required = server.require_signing() && !principal.guest;
            let security_context = SecurityContext {
                user_name: principal.user_name.clone(),
                machine_name: principal.machine_name.clone(),
                client_endpoint: connection.client_endpoint().to_string(),
                guest: principal.guest,
            };
            info!(user = %principal.user_name, session_id, "session established");
            smb2.session_table.insert(
                session_id,
                SMBSession::new(session_id, security_context, signing_key, signing_required),
            );

            let mut session_flags = SMBSessionFlags::empty();
            if principal.guest {
                session_flags |= SMBSessionFlags::IS_GUEST;
            }
            let mut response = respond(
                request,
                NtStatus::Success,
                SMBBody::SessionSetupResponse(SMBSessionSetupResponse {
                    session_flags,
                    security_buffer: output_token,
                }),
            );
            if let CommandOutcome::Response(message) = &mut response {
                message.header.session_id = session_id;
            }
            response
        }
        failure => {
            if request.header.session_id != 0 {
                smb2.preauth_session_table.remove(&request.header.session_id);
            }
            warn!(status = ?failure, "logon failed");
            let status = if failure == NtStatus::LogonFailure {
                failure
            } else {
                NtStatus::LogonFailure
            };
            respond_error(request, status)
        }
    }
}

fn handle_logoff<P: SecurityProvider>(
    server: &SMBServer<P>,
    auth_context: &mut Option<P::Context>,
    smb2: &mut Smb2ConnectionState,
    request: &SMBMessageType,
) -> CommandOutcome {
    let Some(mut session) = smb2.remove_session(request.header.session_id) else {
        return respond_error(request, NtStatus::UserSessionDeleted);
    };
    info!(user = %session.security_context().user_name, session_id = request.header.session_id, "logoff");
    if let Some(context) = auth_context.as_mut() {
        server.security_provider().delete_security_context(context);
    }
    *auth_context = None;
    session.close();
    respond(request, NtStatus::Success, SMBBody::LogoffResponse(SMBLogoffResponse::default()))
}

fn handle_tree_connect<P: SecurityProvider>(
    server: &SMBServer<P>,
    smb2: &mut Smb2ConnectionState,
    request: &SMBMessageType,
    body: &SMBTreeConnectRequest,
) -> CommandOutcome {
    let Some(session) = smb2.get_session_mut(request.header.session_id) else {
        return respond_error(request, NtStatus::UserSessionDeleted);
    };
    let share_name = body.share_name();
    let Some(share) = server.share_named(share_name) else {
        debug!(share = share_name, "tree connect to unknown share");
        return respond_error(request, NtStatus::BadNetworkName);
    };
    if !share.has_access(session.security_context(), "\\", FileAccess::Read) {
        warn!(share = share_name, user = %session.security_context().user_name, "tree connect denied");
        return respond_error(request, NtStatus::AccessDenied);
    }
    let response_body = match SMBShareType::from(share.resource_type()) {
        SMBShareType::Pipe => SMBTreeConnectResponse::ipc(),
        _ => SMBTreeConnectResponse::disk(),
    };
    let Some(tree_id) = session.add_connected_tree(share) else {
        return respond_error(request, NtStatus::RequestNotAccepted);
    };
    debug!(share = share_name, tree_id, "tree connected");
    let mut response = respond(request, NtStatus::Success, SMBBody::TreeConnectResponse(response_body));
    if let CommandOutcome::Response(message) = &mut response {
        message.header.tree_id = tree_id;
    }
    response
}

fn handle_cancel<P: SecurityProvider>(connection: &Arc<SMBConnection<P>>, request: &SMBMessageType) -> CommandOutcome {
    let pending = if request.header.is_async() {
        connection.pending().take(request.header.async_id)
    } else {
        connection.pending().take_by_message_id(request.header.message_id)
    };
    match pending {
        Some(operation) => {
            debug!(async_id = operation.cancel_key, "cancelling pending operation");
            operation.store.cancel(operation.token);
        }
        // Cancelling a finished or unknown operation is a no-op.
        None => debug!("cancel matched no pending operation"),
    }
    respond(
        request,
        NtStatus::Success,
        SMBBody::CancelResponse(crate::protocol::body::cancel::SMBCancelResponse::default()),
    )
}

/// Commands below here require a share binding resolved from the header's
/// tree id.
fn handle_tree_command<P: SecurityProvider>(
    connection: &Arc<SMBConnection<P>>,
    smb2: &mut Smb2ConnectionState,
    request: &SMBMessageType,
) -> CommandOutcome {
    let session_id = request.header.session_id;
    let tree_id = request.header.tree_id;
    let Some(session) = smb2.get_session_mut(session_id) else {
        return respond_error(request, NtStatus::UserSessionDeleted);
    };
    let Some(tree) = session.get_connected_tree(tree_id) else {
        debug!(session_id, tree_id, "command against unknown tree");
        return respond_error(request, NtStatus::NetworkNameDeleted);
    };
    let share = tree.share().clone();

    match &request.body {
        SMBBody::TreeDisconnectRequest(_) => {
            session.disconnect_tree(tree_id);
            respond(
                request,
                NtStatus::Success,
                SMBBody::TreeDisconnectResponse(SMBTreeDisconnectResponse::default()),
            )
        }
        SMBBody::CreateRequest(body) => handle_create(session, &share, request, body),
        SMBBody::CloseRequest(body) => handle_close(session, &share, request, body),
        SMBBody::ReadRequest(body) => handle_read(session, &share, request, body),
        SMBBody::WriteRequest(body) => handle_write(session, &share, request, body),
        SMBBody::FlushRequest(body) => handle_flush(session, &share, request, body),
        SMBBody::LockRequest(body) => handle_lock(session, request, body),
        SMBBody::IoCtlRequest(body) => handle_ioctl(session, &share, request, body),
        SMBBody::QueryDirectoryRequest(body) => handle_query_directory(session, &share, request, body),
        SMBBody::QueryInfoRequest(body) => handle_query_info(session, &share, request, body),
        SMBBody::SetInfoRequest(body) => handle_set_info(session, &share, request, body),
        SMBBody::ChangeNotifyRequest(body) => handle_change_notify(connection, session, &share, request, body),
        _ => {
            debug!(command = ?request.header.command, "unsupported command");
            respond_error(request, NtStatus::NotSupported)
        }
    }
}

/// Resolve an open handle, re-validating that it belongs to the resolving
/// session and tree.
fn resolve_open<'a>(session: &'a SMBSession, request: &SMBMessageType, file_id: SMBFileId) -> Result<&'a crate::server::open::OpenFileObject, NtStatus> {
    let open = session.get_open_file(file_id.volatile).ok_or(NtStatus::FileClosed)?;
    if open.tree_id() != request.header.tree_id {
        return Err(NtStatus::FileClosed);
    }
    Ok(open)
}

fn handle_create(
    session: &mut SMBSession,
    share: &Arc<dyn SharedResource>,
    request: &SMBMessageType,
    body: &SMBCreateRequest,
) -> CommandOutcome {
    if body.path.split(['\\', '/']).any(|component| component == "..") {
        return respond_error(request, NtStatus::InvalidParameter);
    }
    let access = body.desired_access.file_access();
    if !share.has_access(session.security_context(), &body.path, access) {
        warn!(share = share.name(), path = %body.path, user = %session.security_context().user_name, "create denied");
        return respond_error(request, NtStatus::AccessDenied);
    }
    let store = share.file_store();
    let (handle, create_action) = match store.create_file(
        &body.path,
        body.desired_access,
        body.file_attributes,
        body.share_access,
        body.disposition,
        body.options,
    ) {
        Ok(result) => result,
        Err(status) => {
            debug!(share = share.name(), path = %body.path, status = ?status, "create failed");
            return respond_error(request, status);
        }
    };
    let end_of_file = match store.get_file_information(handle, SMBFileInformationClass::Standard) {
        Ok(FileInformation::Standard { end_of_file, .. }) => end_of_file,
        _ => 0,
    };
    let file_id = session.add_open_file(request.header.tree_id, share.name(), &body.path, handle, access);
    debug!(share = share.name(), path = %body.path, volatile = file_id.volatile, "file opened");
    respond(
        request,
        NtStatus::Success,
        SMBBody::CreateResponse(SMBCreateResponse {
            file_id,
            create_action,
            creation_time: FileTime::now(),
            file_attributes: body.file_attributes,
            end_of_file,
        }),
    )
}

fn handle_close(
    session: &mut SMBSession,
    share: &Arc<dyn SharedResource>,
    request: &SMBMessageType,
    body: &SMBCloseRequest,
) -> CommandOutcome {
    let open = match resolve_open(session, request, body.file_id) {
        Ok(open) => open,
        Err(status) => return respond_error(request, status),
    };
    let handle = open.handle();
    let store = share.file_store();
    let response_body = if body.post_query_attrib {
        let end_of_file = match store.get_file_information(handle, SMBFileInformationClass::Standard) {
            Ok(FileInformation::Standard { end_of_file, .. }) => end_of_file,
            _ => 0,
        };
        let creation_time = match store.get_file_information(handle, SMBFileInformationClass::Basic) {
            Ok(FileInformation::Basic { creation_time, .. }) => creation_time,
            _ => FileTime::default(),
        };
        SMBCloseResponse { creation_time, end_of_file }
    } else {
        SMBCloseResponse::default()
    };
    if let Err(status) = store.close_file(handle) {
        debug!(status = ?status, "store close failed");
    }
    session.remove_open_file(body.file_id.volatile);
    respond(request, NtStatus::Success, SMBBody::CloseResponse(response_body))
}

fn handle_read(
    session: &SMBSession,
    share: &Arc<dyn SharedResource>,
    request: &SMBMessageType,
    body: &SMBReadRequest,
) -> CommandOutcome {
    let open = match resolve_open(session, request, body.file_id) {
        Ok(open) => open,
        Err(status) => return respond_error(request, status),
    };
    if !share.has_access(session.security_context(), open.path(), FileAccess::Read) {
        warn!(share = share.name(), path = open.path(), "read denied");
        return respond_error(request, NtStatus::AccessDenied);
    }
    let data = match share.file_store().read_file(open.handle(), body.offset, body.length) {
        Ok(data) => data,
        Err(status) => {
            debug!(path = open.path(), status = ?status, "read failed");
            return respond_error(request, status);
        }
    };
    if data.len() < body.minimum_count as usize {
        return respond_error(request, NtStatus::EndOfFile);
    }
    respond(
        request,
        NtStatus::Success,
        SMBBody::ReadResponse(SMBReadResponse { data, data_remaining: 0 }),
    )
}

fn handle_write(
    session: &SMBSession,
    share: &Arc<dyn SharedResource>,
    request: &SMBMessageType,
    body: &SMBWriteRequest,
) -> CommandOutcome {
    let open = match resolve_open(session, request, body.file_id) {
        Ok(open) => open,
        Err(status) => return respond_error(request, status),
    };
    if !share.has_access(session.security_context(), open.path(), FileAccess::Write) {
        warn!(share = share.name(), path = open.path(), "write denied");
        return respond_error(request, NtStatus::AccessDenied);
    }
    match share.file_store().write_file(open.handle(), body.offset, &body.data) {
        Ok(count) => respond(request, NtStatus::Success, SMBBody::WriteResponse(SMBWriteResponse { count })),
        Err(status) => {
            debug!(path = open.path(), status = ?status, "write failed");
            respond_error(request, status)
        }
    }
}

fn handle_flush(
    session: &SMBSession,
    share: &Arc<dyn SharedResource>,
    request: &SMBMessageType,
    body: &SMBFlushRequest,
) -> CommandOutcome {
    let open = match resolve_open(session, request, body.file_id) {
        Ok(open) => open,
        Err(status) => return respond_error(request, status),
    };
    match share.file_store().flush_file_buffers(open.handle()) {
        Ok(()) => respond(request, NtStatus::Success, SMBBody::FlushResponse(SMBFlushResponse {})),
        Err(status) => respond_error(request, status),
    }
}

fn handle_lock(session: &SMBSession, request: &SMBMessageType, body: &SMBLockRequest) -> CommandOutcome {
    if body.locks.is_empty() {
        return respond_error(request, NtStatus::InvalidParameter);
    }
    match resolve_open(session, request, body.file_id) {
        // Lock ranges are tracked at the protocol level only; the store
        // capability carries no byte-range lock surface.
        Ok(_) => respond(
            request,
            NtStatus::Success,
            SMBBody::LockResponse(crate::protocol::body::lock::SMBLockResponse {}),
        ),
        Err(status) => respond_error(request, status),
    }
}

fn handle_ioctl(
    session: &SMBSession,
    share: &Arc<dyn SharedResource>,
    request: &SMBMessageType,
    body: &SMBIoCtlRequest,
) -> CommandOutcome {
    if body.ctl_code == FSCTL_DFS_GET_REFERRALS {
        return respond_error(request, NtStatus::NotSupported);
    }
    if share.resource_type() != ResourceType::IPC && !body.is_fsctl {
        return respond_error(request, NtStatus::InvalidDeviceRequest);
    }
    let open = match resolve_open(session, request, body.file_id) {
        Ok(open) => open,
        Err(status) => return respond_error(request, status),
    };
    match share
        .file_store()
        .device_io_control(open.handle(), body.ctl_code, &body.input, body.max_output_length)
    {
        Ok(output) => respond(
            request,
            NtStatus::Success,
            SMBBody::IoCtlResponse(SMBIoCtlResponse {
                ctl_code: body.ctl_code,
                file_id: body.file_id,
                output,
            }),
        ),
        Err(status) => respond_error(request, status),
    }
}

fn handle_query_directory(
    session: &SMBSession,
    share: &Arc<dyn SharedResource>,
    request: &SMBMessageType,
    body: &SMBQueryDirectoryRequest,
) -> CommandOutcome {
    let open = match resolve_open(session, request, body.file_id) {
        Ok(open) => open,
        Err(status) => return respond_error(request, status),
    };
    if !share.has_access(session.security_context(), open.path(), FileAccess::Read) {
        return respond_error(request, NtStatus::AccessDenied);
    }
    match share.file_store().query_directory(open.handle(), &body.pattern) {
        Ok(entries) if entries.is_empty() => respond_error(request, NtStatus::NoMoreFiles),
        Ok(entries) => respond(
            request,
            NtStatus::Success,
            SMBBody::QueryDirectoryResponse(SMBQueryDirectoryResponse { entries }),
        ),
        Err(status) => respond_error(request, status),
    }
}

fn handle_query_info(
    session: &SMBSession,
    share: &Arc<dyn SharedResource>,
    request: &SMBMessageType,
    body: &SMBQueryInfoRequest,
) -> CommandOutcome {
    let open = match resolve_open(session, request, body.file_id) {
        Ok(open) => open,
        Err(status) => return respond_error(request, status),
    };
    let store = share.file_store();
    let result = match body.info_type {
        SMBInfoType::File => store
            .get_file_information(open.handle(), body.file_info_class)
            .map(SMBQueryInfoResponse::File),
        SMBInfoType::FileSystem => store
            .get_file_system_information(body.file_info_class)
            .map(SMBQueryInfoResponse::FileSystem),
        SMBInfoType::Security => store
            .get_security_information(open.handle())
            .map(SMBQueryInfoResponse::Security),
        SMBInfoType::Quota => Err(NtStatus::NotSupported),
    };
    match result {
        Ok(response) => respond(request, NtStatus::Success, SMBBody::QueryInfoResponse(response)),
        Err(status) => {
            debug!(info_type = ?body.info_type, class = ?body.file_info_class, status = ?status, "query info failed");
            respond_error(request, status)
        }
    }
}

fn handle_set_info(
    session: &SMBSession,
    share: &Arc<dyn SharedResource>,
    request: &SMBMessageType,
    body: &SMBSetInfoRequest,
) -> CommandOutcome {
    let open = match resolve_open(session, request, body.file_id) {
        Ok(open) => open,
        Err(status) => return respond_error(request, status),
    };
    if body.info_type != SMBInfoType::File {
        return respond_error(request, NtStatus::NotSupported);
    }
    if !share.has_access(session.security_context(), open.path(), FileAccess::Write) {
        return respond_error(request, NtStatus::AccessDenied);
    }
    match share.file_store().set_file_information(open.handle(), body.information.clone()) {
        Ok(()) => respond(request, NtStatus::Success, SMBBody::SetInfoResponse(SMBSetInfoResponse {})),
        Err(status) => respond_error(request, status),
    }
}

/// Register a change watch with the store and answer with an interim
/// pending response. The final response is enqueued by the completion
/// callback, from whichever context completes or cancels the watch; the
/// interim response itself is never signed.
fn handle_change_notify<P: SecurityProvider>(
    connection: &Arc<SMBConnection<P>>,
    session: &SMBSession,
    share: &Arc<dyn SharedResource>,
    request: &SMBMessageType,
    body: &SMBChangeNotifyRequest,
) -> CommandOutcome {
    let open = match resolve_open(session, request, body.file_id) {
        Ok(open) => open,
        Err(status) => return respond_error(request, status),
    };
    if !share.has_access(session.security_context(), open.path(), FileAccess::Read) {
        return respond_error(request, NtStatus::AccessDenied);
    }

    let async_id = connection.allocate_async_id();
    let pending = connection.pending().clone();
    let queue = connection.send_queue().clone();
    let template = request.header.clone();
    let signing_key = session.signing_key();
    let sign_final = session.signing_required() || request.header.is_signed();

    let on_complete: NotifyCompletion = Box::new(move |status, buffer| {
        pending.take(async_id);
        let mut header = template.create_response_header(status);
        header.flags |= SMBFlags::ASYNC_COMMAND;
        header.async_id = async_id;
        header.credits = template.credits.max(1);
        header.credit_charge = template.credit_charge;
        let mut message = SMBMessage::new(
            header,
            SMBBody::ChangeNotifyResponse(SMBChangeNotifyResponse { buffer }),
        );
        if sign_final {
            if let Some(key) = signing_key {
                message.header.flags |= SMBFlags::SIGNED;
                let _ = message.sign(&key);
            }
        }
        let _ = queue.enqueue(SMBFrame::Smb2(vec![message]));
    });

    let store = share.file_store().clone();
    match store.notify_change(
        open.handle(),
        body.completion_filter,
        body.watch_tree,
        body.max_output_length,
        on_complete,
    ) {
        Ok(token) => {
            connection.pending().register(PendingOperation {
                cancel_key: async_id,
                file_id: body.file_id.volatile,
                message_id: request.header.message_id,
                token,
                store,
            });
            debug!(async_id, volatile = body.file_id.volatile, "change watch pending");
            let mut response = respond(
                request,
                NtStatus::Pending,
                SMBBody::ChangeNotifyResponse(SMBChangeNotifyResponse::default()),
            );
            if let CommandOutcome::Response(message) = &mut response {
                message.header.flags |= SMBFlags::ASYNC_COMMAND;
                message.header.async_id = async_id;
            }
            response
        }
        Err(status) => respond_error(request, status),
    }
}
