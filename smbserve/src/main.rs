use std::sync::Arc;

use smbserve::protocol::body::access_mask::SMBAccessMask;
use smbserve::protocol::body::create::{SMBCreateDisposition, SMBCreateRequest};
use smbserve::protocol::body::file_ops::{SMBCloseRequest, SMBReadRequest, SMBWriteRequest};
use smbserve::protocol::body::negotiate::SMBNegotiateRequest;
use smbserve::protocol::body::security_mode::SecurityMode;
use smbserve::protocol::body::session_setup::SMBSessionSetupRequest;
use smbserve::protocol::body::tree_connect::SMBTreeConnectRequest;
use smbserve::protocol::body::SMBBody;
use smbserve::protocol::header::{SMBCommandCode, SMBSyncHeader};
use smbserve::protocol::message::{SMBFrame, SMBMessage};
use smbserve::server::share::file_system::SMBFileSystemShare;
use smbserve::server::share::ipc::SMBIPCShare;
use smbserve::server::SMBServer;
use smbserve::store::memory::MemoryFileStore;
use smbserve::transport::{frame_channel_pair, SMBFrameReadStream, SMBFrameWriteStream};
use smbserve::util::auth::challenge::{ChallengeAuthProvider, ChallengeMessage};
use smbserve::util::auth::User;
use uuid::Uuid;

fn request(command: SMBCommandCode, message_id: u64, session_id: u64, tree_id: u32, body: SMBBody) -> SMBMessage<SMBSyncHeader, SMBBody> {
    SMBMessage::new(SMBSyncHeader::request(command, message_id, session_id, tree_id), body)
}

/// Spin a server over the in-process transport and walk one full client
/// exchange: negotiate, session setup, tree connect, write, read back,
/// close, and print each response status along the way.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    #[cfg(feature = "tracing")]
    tracing_subscriber::fmt::init();

    let store = Arc::new(MemoryFileStore::new());
    let server = Arc::new(
        SMBServer::builder()
            .security_provider(ChallengeAuthProvider::new(
                vec![User::new("demo", "demo-password")],
                false,
            ))
            .add_share(SMBFileSystemShare::new("shared", store.clone()))
            .add_share(SMBIPCShare::new(store))
            .build()?,
    );

    let (mut client, server_side) = frame_channel_pair();
    let server_task = {
        let server = server.clone();
        tokio::spawn(async move {
            server
                .serve_connection(server_side.reader, server_side.writer, "demo-client".into())
                .await;
        })
    };

    let negotiate = SMBNegotiateRequest::new(vec![0x0202, 0x0210], SecurityMode::SIGNING_ENABLED, Uuid::new_v4());
    client
        .writer
        .write_frame(SMBFrame::single(request(
            SMBCommandCode::Negotiate,
            0,
            0,
            0,
            SMBBody::NegotiateRequest(negotiate),
        )))
        .await?;
    let Some(SMBFrame::Smb2(responses)) = client.reader.next_frame().await else {
        anyhow::bail!("no negotiate response");
    };
    let challenge = match &responses[0].body {
        SMBBody::NegotiateResponse(response) => {
            println!("negotiated dialect 0x{:04X}", response.dialect);
            response.security_buffer.clone()
        }
        other => anyhow::bail!("unexpected negotiate reply: {other:?}"),
    };

    let token = ChallengeAuthProvider::client_token(&challenge, &User::new("demo", "demo-password"), "demo-box");
    client
        .writer
        .write_frame(SMBFrame::single(request(
            SMBCommandCode::SessionSetup,
            1,
            0,
            0,
            SMBBody::SessionSetupRequest(SMBSessionSetupRequest::new(token)),
        )))
        .await?;
    let Some(SMBFrame::Smb2(responses)) = client.reader.next_frame().await else {
        anyhow::bail!("no session setup response");
    };
    let session_id = responses[0].header.session_id;
    println!("session established: {session_id} ({:?})", responses[0].header.status);

    client
        .writer
        .write_frame(SMBFrame::single(request(
            SMBCommandCode::TreeConnect,
            2,
            session_id,
            0,
            SMBBody::TreeConnectRequest(SMBTreeConnectRequest::new("\\\\demo\\shared")),
        )))
        .await?;
    let Some(SMBFrame::Smb2(responses)) = client.reader.next_frame().await else {
        anyhow::bail!("no tree connect response");
    };
    let tree_id = responses[0].header.tree_id;
    println!("tree connected: {tree_id} ({:?})", responses[0].header.status);

    let create = SMBCreateRequest::new(
        "hello.txt",
        SMBAccessMask::GENERIC_READ | SMBAccessMask::GENERIC_WRITE,
        SMBCreateDisposition::OpenIf,
    );
    client
        .writer
        .write_frame(SMBFrame::single(request(
            SMBCommandCode::Create,
            3,
            session_id,
            tree_id,
            SMBBody::CreateRequest(create),
        )))
        .await?;
    let Some(SMBFrame::Smb2(responses)) = client.reader.next_frame().await else {
        anyhow::bail!("no create response");
    };
    let file_id = match &responses[0].body {
        SMBBody::CreateResponse(response) => {
            println!("file opened: {:?} ({:?})", response.file_id, response.create_action);
            response.file_id
        }
        other => anyhow::bail!("unexpected create reply: {other:?}"),
    };

    let payload = b"hello from the demo client".to_vec();
    client
        .writer
        .write_frame(SMBFrame::single(request(
            SMBCommandCode::Write,
            4,
            session_id,
            tree_id,
            SMBBody::WriteRequest(SMBWriteRequest::new(file_id, 0, payload.clone())),
        )))
        .await?;
    let _ = client.reader.next_frame().await;

    client
        .writer
        .write_frame(SMBFrame::single(request(
            SMBCommandCode::Read,
            5,
            session_id,
            tree_id,
            SMBBody::ReadRequest(SMBReadRequest::new(file_id, 0, 1024)),
        )))
        .await?;
    let Some(SMBFrame::Smb2(responses)) = client.reader.next_frame().await else {
        anyhow::bail!("no read response");
    };
    match &responses[0].body {
        SMBBody::ReadResponse(response) => {
            println!("read back {} bytes: {}", response.data.len(), String::from_utf8_lossy(&response.data));
            assert_eq!(response.data, payload);
        }
        other => anyhow::bail!("unexpected read reply: {other:?}"),
    }

    client
        .writer
        .write_frame(SMBFrame::single(request(
            SMBCommandCode::Close,
            6,
            session_id,
            tree_id,
            SMBBody::CloseRequest(SMBCloseRequest::new(file_id)),
        )))
        .await?;
    let _ = client.reader.next_frame().await;
    println!("file closed, shutting down");

    drop(client);
    server_task.await?;
    server.shutdown();
    Ok(())
}
