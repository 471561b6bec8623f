pub mod access_mask;
pub mod cancel;
pub mod capabilities;
pub mod change_notify;
pub mod create;
pub mod dialect;
pub mod empty;
pub mod file_ops;
pub mod filetime;
pub mod find;
pub mod info;
pub mod ioctl;
pub mod lock;
pub mod negotiate;
pub mod security_mode;
pub mod session_setup;
pub mod tree_connect;

use serde::{Deserialize, Serialize};

pub use crate::protocol::body::access_mask::{FileAccess, SMBAccessMask};
pub use crate::protocol::body::capabilities::Capabilities;
pub use crate::protocol::body::dialect::SMBDialect;
pub use crate::protocol::body::filetime::FileTime;
pub use crate::protocol::body::security_mode::SecurityMode;

use crate::protocol::body::cancel::{LegacySMBCancelRequest, SMBCancelRequest, SMBCancelResponse};
use crate::protocol::body::change_notify::{
    LegacySMBChangeNotifyRequest, LegacySMBChangeNotifyResponse, SMBChangeNotifyRequest, SMBChangeNotifyResponse,
};
use crate::protocol::body::create::{
    LegacySMBOpenRequest, LegacySMBOpenResponse, SMBCreateRequest, SMBCreateResponse, SMBFileId,
};
use crate::protocol::body::empty::{
    SMBEchoRequest, SMBEchoResponse, SMBErrorResponse, SMBLogoffRequest, SMBLogoffResponse,
    SMBTreeDisconnectRequest, SMBTreeDisconnectResponse,
};
use crate::protocol::body::file_ops::{
    LegacySMBCloseRequest, LegacySMBCloseResponse, LegacySMBFlushRequest, LegacySMBFlushResponse,
    LegacySMBReadRequest, LegacySMBReadResponse, LegacySMBWriteRequest, LegacySMBWriteResponse, SMBCloseRequest,
    SMBCloseResponse, SMBFlushRequest, SMBFlushResponse, SMBReadRequest, SMBReadResponse, SMBWriteRequest,
    SMBWriteResponse,
};
use crate::protocol::body::find::{
    LegacySMBFindCloseRequest, LegacySMBFindCloseResponse, LegacySMBFindFirstRequest, LegacySMBFindFirstResponse,
    LegacySMBFindNextRequest, LegacySMBFindNextResponse,
};
use crate::protocol::body::info::{
    SMBQueryDirectoryRequest, SMBQueryDirectoryResponse, SMBQueryInfoRequest, SMBQueryInfoResponse,
    SMBSetInfoRequest, SMBSetInfoResponse,
};
use crate::protocol::body::ioctl::{SMBIoCtlRequest, SMBIoCtlResponse};
use crate::protocol::body::lock::{SMBLockRequest, SMBLockResponse};
use crate::protocol::body::negotiate::{
    LegacySMBNegotiateRequest, LegacySMBNegotiateResponse, SMBNegotiateRequest, SMBNegotiateResponse,
};
use crate::protocol::body::session_setup::{
    LegacySMBSessionSetupRequest, LegacySMBSessionSetupResponse, SMBSessionSetupRequest, SMBSessionSetupResponse,
};
use crate::protocol::body::tree_connect::{
    LegacySMBTreeConnectRequest, LegacySMBTreeConnectResponse, SMBTreeConnectRequest, SMBTreeConnectResponse,
};
use crate::protocol::header::SMBCommandCode;

/// Modern-family command body.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub enum SMBBody {
    NegotiateRequest(SMBNegotiateRequest),
    NegotiateResponse(SMBNegotiateResponse),
    SessionSetupRequest(SMBSessionSetupRequest),
    SessionSetupResponse(SMBSessionSetupResponse),
    LogoffRequest(SMBLogoffRequest),
    LogoffResponse(SMBLogoffResponse),
    EchoRequest(SMBEchoRequest),
    EchoResponse(SMBEchoResponse),
    TreeConnectRequest(SMBTreeConnectRequest),
    TreeConnectResponse(SMBTreeConnectResponse),
    TreeDisconnectRequest(SMBTreeDisconnectRequest),
    TreeDisconnectResponse(SMBTreeDisconnectResponse),
    CreateRequest(SMBCreateRequest),
    CreateResponse(SMBCreateResponse),
    CloseRequest(SMBCloseRequest),
    CloseResponse(SMBCloseResponse),
    FlushRequest(SMBFlushRequest),
    FlushResponse(SMBFlushResponse),
    ReadRequest(SMBReadRequest),
    ReadResponse(SMBReadResponse),
    WriteRequest(SMBWriteRequest),
    WriteResponse(SMBWriteResponse),
    LockRequest(SMBLockRequest),
    LockResponse(SMBLockResponse),
    IoCtlRequest(SMBIoCtlRequest),
    IoCtlResponse(SMBIoCtlResponse),
    CancelRequest(SMBCancelRequest),
    CancelResponse(SMBCancelResponse),
    QueryDirectoryRequest(SMBQueryDirectoryRequest),
    QueryDirectoryResponse(SMBQueryDirectoryResponse),
    QueryInfoRequest(SMBQueryInfoRequest),
    QueryInfoResponse(SMBQueryInfoResponse),
    SetInfoRequest(SMBSetInfoRequest),
    SetInfoResponse(SMBSetInfoResponse),
    ChangeNotifyRequest(SMBChangeNotifyRequest),
    ChangeNotifyResponse(SMBChangeNotifyResponse),
    ErrorResponse(SMBErrorResponse),
}

impl SMBBody {
    pub fn command_code(&self) -> Option<SMBCommandCode> {
        let code = match self {
            SMBBody::NegotiateRequest(_) | SMBBody::NegotiateResponse(_) => SMBCommandCode::Negotiate,
            SMBBody::SessionSetupRequest(_) | SMBBody::SessionSetupResponse(_) => SMBCommandCode::SessionSetup,
            SMBBody::LogoffRequest(_) | SMBBody::LogoffResponse(_) => SMBCommandCode::Logoff,
            SMBBody::EchoRequest(_) | SMBBody::EchoResponse(_) => SMBCommandCode::Echo,
            SMBBody::TreeConnectRequest(_) | SMBBody::TreeConnectResponse(_) => SMBCommandCode::TreeConnect,
            SMBBody::TreeDisconnectRequest(_) | SMBBody::TreeDisconnectResponse(_) => SMBCommandCode::TreeDisconnect,
            SMBBody::CreateRequest(_) | SMBBody::CreateResponse(_) => SMBCommandCode::Create,
            SMBBody::CloseRequest(_) | SMBBody::CloseResponse(_) => SMBCommandCode::Close,
            SMBBody::FlushRequest(_) | SMBBody::FlushResponse(_) => SMBCommandCode::Flush,
            SMBBody::ReadRequest(_) | SMBBody::ReadResponse(_) => SMBCommandCode::Read,
            SMBBody::WriteRequest(_) | SMBBody::WriteResponse(_) => SMBCommandCode::Write,
            SMBBody::LockRequest(_) | SMBBody::LockResponse(_) => SMBCommandCode::Lock,
            SMBBody::IoCtlRequest(_) | SMBBody::IoCtlResponse(_) => SMBCommandCode::IoCtl,
            SMBBody::CancelRequest(_) | SMBBody::CancelResponse(_) => SMBCommandCode::Cancel,
            SMBBody::QueryDirectoryRequest(_) | SMBBody::QueryDirectoryResponse(_) => SMBCommandCode::QueryDirectory,
            SMBBody::QueryInfoRequest(_) | SMBBody::QueryInfoResponse(_) => SMBCommandCode::QueryInfo,
            SMBBody::SetInfoRequest(_) | SMBBody::SetInfoResponse(_) => SMBCommandCode::SetInfo,
            SMBBody::ChangeNotifyRequest(_) | SMBBody::ChangeNotifyResponse(_) => SMBCommandCode::ChangeNotify,
            SMBBody::ErrorResponse(_) => return None,
        };
        Some(code)
    }

    /// Whether this request addresses an open file by identifier, making it
    /// eligible for carried-identifier substitution in a related chain.
    pub fn contains_file_id(&self) -> bool {
        self.request_file_id().is_some()
    }

    pub fn request_file_id(&self) -> Option<SMBFileId> {
        match self {
            SMBBody::ChangeNotifyRequest(x) => Some(x.file_id),
            SMBBody::CloseRequest(x) => Some(x.file_id),
            SMBBody::FlushRequest(x) => Some(x.file_id),
            SMBBody::IoCtlRequest(x) => Some(x.file_id),
            SMBBody::LockRequest(x) => Some(x.file_id),
            SMBBody::QueryDirectoryRequest(x) => Some(x.file_id),
            SMBBody::QueryInfoRequest(x) => Some(x.file_id),
            SMBBody::ReadRequest(x) => Some(x.file_id),
            SMBBody::SetInfoRequest(x) => Some(x.file_id),
            SMBBody::WriteRequest(x) => Some(x.file_id),
            _ => None,
        }
    }

    pub fn set_request_file_id(&mut self, file_id: SMBFileId) {
        match self {
            SMBBody::ChangeNotifyRequest(x) => x.file_id = file_id,
            SMBBody::CloseRequest(x) => x.file_id = file_id,
            SMBBody::FlushRequest(x) => x.file_id = file_id,
            SMBBody::IoCtlRequest(x) => x.file_id = file_id,
            SMBBody::LockRequest(x) => x.file_id = file_id,
            SMBBody::QueryDirectoryRequest(x) => x.file_id = file_id,
            SMBBody::QueryInfoRequest(x) => x.file_id = file_id,
            SMBBody::ReadRequest(x) => x.file_id = file_id,
            SMBBody::SetInfoRequest(x) => x.file_id = file_id,
            SMBBody::WriteRequest(x) => x.file_id = file_id,
            _ => {}
        }
    }

    /// File identifier exposed by a response that generated one.
    pub fn response_file_id(&self) -> Option<SMBFileId> {
        match self {
            SMBBody::CreateResponse(x) => Some(x.file_id),
            SMBBody::IoCtlResponse(x) => Some(x.file_id),
            _ => None,
        }
    }
}

/// Legacy-family command body. A legacy message carries one or more of
/// these behind a single shared header.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub enum LegacySMBBody {
    NegotiateRequest(LegacySMBNegotiateRequest),
    NegotiateResponse(LegacySMBNegotiateResponse),
    SessionSetupRequest(LegacySMBSessionSetupRequest),
    SessionSetupResponse(LegacySMBSessionSetupResponse),
    LogoffRequest(SMBLogoffRequest),
    LogoffResponse(SMBLogoffResponse),
    EchoRequest(SMBEchoRequest),
    EchoResponse(SMBEchoResponse),
    TreeConnectRequest(LegacySMBTreeConnectRequest),
    TreeConnectResponse(LegacySMBTreeConnectResponse),
    TreeDisconnectRequest(SMBTreeDisconnectRequest),
    TreeDisconnectResponse(SMBTreeDisconnectResponse),
    OpenRequest(LegacySMBOpenRequest),
    OpenResponse(LegacySMBOpenResponse),
    CloseRequest(LegacySMBCloseRequest),
    CloseResponse(LegacySMBCloseResponse),
    ReadRequest(LegacySMBReadRequest),
    ReadResponse(LegacySMBReadResponse),
    WriteRequest(LegacySMBWriteRequest),
    WriteResponse(LegacySMBWriteResponse),
    FlushRequest(LegacySMBFlushRequest),
    FlushResponse(LegacySMBFlushResponse),
    FindFirstRequest(LegacySMBFindFirstRequest),
    FindFirstResponse(LegacySMBFindFirstResponse),
    FindNextRequest(LegacySMBFindNextRequest),
    FindNextResponse(LegacySMBFindNextResponse),
    FindCloseRequest(LegacySMBFindCloseRequest),
    FindCloseResponse(LegacySMBFindCloseResponse),
    ChangeNotifyRequest(LegacySMBChangeNotifyRequest),
    ChangeNotifyResponse(LegacySMBChangeNotifyResponse),
    CancelRequest(LegacySMBCancelRequest),
    ErrorResponse(SMBErrorResponse),
}

impl LegacySMBBody {
    /// Whether this response may carry a follow-up command in the same
    /// message (AndX chaining).
    pub fn is_andx_response(&self) -> bool {
        matches!(
            self,
            LegacySMBBody::SessionSetupResponse(_)
                | LegacySMBBody::LogoffResponse(_)
                | LegacySMBBody::TreeConnectResponse(_)
                | LegacySMBBody::OpenResponse(_)
                | LegacySMBBody::ReadResponse(_)
                | LegacySMBBody::WriteResponse(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::body::create::SMBCreateAction;

    #[test]
    fn file_id_substitution_targets() {
        let mut body = SMBBody::ReadRequest(SMBReadRequest::new(SMBFileId::default(), 0, 16));
        assert!(body.contains_file_id());
        let replacement = SMBFileId::new(1, 2);
        body.set_request_file_id(replacement);
        assert_eq!(body.request_file_id(), Some(replacement));

        let body = SMBBody::EchoRequest(SMBEchoRequest::default());
        assert!(!body.contains_file_id());
    }

    #[test]
    fn create_response_generates_file_id() {
        let response = SMBBody::CreateResponse(SMBCreateResponse {
            file_id: SMBFileId::new(9, 9),
            create_action: SMBCreateAction::Created,
            creation_time: FileTime::default(),
            file_attributes: Default::default(),
            end_of_file: 0,
        });
        assert_eq!(response.response_file_id(), Some(SMBFileId::new(9, 9)));
        let response = SMBBody::ErrorResponse(SMBErrorResponse::default());
        assert_eq!(response.response_file_id(), None);
    }
}
