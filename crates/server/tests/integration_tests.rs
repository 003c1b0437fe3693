//! End-to-end tests against the `uboat-server` binary
//!
//! Each test starts the binary on a free loopback port with its own config
//! file and talks USB/IP to it over TCP.
//!
//! Run with: `cargo test -p server --test integration_tests`

use common::test_utils::{
    DEFAULT_TEST_TIMEOUT, create_cmd_submit_frame, create_cmd_unlink_frame,
    create_devlist_request, create_import_request, with_timeout,
};
use protocol::{
    DevListReply, ImportReply, OpCode, RetSubmit, URB_DATA_PATTERN, URB_FRAME_SIZE,
    URB_MESSAGE_SIZE, USBIP_VERSION,
};
use std::net::SocketAddr;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Running server process, killed on drop
struct ServerProcess {
    child: Child,
    addr: SocketAddr,
    _dir: TempDir,
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn start_server() -> ServerProcess {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("server.toml");
    std::fs::write(&config_path, "[server]\nlog_level = \"warn\"\n").unwrap();

    let addr: SocketAddr = format!("127.0.0.1:{}", free_port()).parse().unwrap();
    let child = Command::new(env!("CARGO_BIN_EXE_uboat-server"))
        .arg("--config")
        .arg(&config_path)
        .arg("--bind")
        .arg(addr.to_string())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let server = ServerProcess {
        child,
        addr,
        _dir: dir,
    };

    // Wait for the listener to come up
    for _ in 0..100 {
        if TcpStream::connect(addr).await.is_ok() {
            return server;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("server did not start listening on {}", addr);
}

async fn connect(server: &ServerProcess) -> TcpStream {
    TcpStream::connect(server.addr).await.unwrap()
}

async fn read_exact_vec(stream: &mut TcpStream, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    with_timeout(DEFAULT_TEST_TIMEOUT, stream.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    buf
}

async fn read_until_closed(stream: &mut TcpStream) -> Vec<u8> {
    let mut rest = Vec::new();
    with_timeout(DEFAULT_TEST_TIMEOUT, stream.read_to_end(&mut rest))
        .await
        .unwrap()
        .unwrap();
    rest
}

#[tokio::test]
async fn test_device_list_is_single_shot() {
    let server = start_server().await;
    let mut stream = connect(&server).await;

    stream
        .write_all(&create_devlist_request(USBIP_VERSION))
        .await
        .unwrap();

    let bytes = read_until_closed(&mut stream).await;
    assert_eq!(bytes.len(), DevListReply::SIZE);

    let reply = DevListReply::decode(&bytes).unwrap();
    assert_eq!(reply.header.command, OpCode::DevListReply);
    assert_eq!(reply.num_devices, 1);
    assert_eq!(reply.device.busid_str(), "1-1");
    assert_eq!(reply.device.busnum, 1);
    assert_eq!(reply.device.devnum, 1);
}

#[tokio::test]
async fn test_import_then_overflowing_submits() {
    let server = start_server().await;
    let mut stream = connect(&server).await;

    stream
        .write_all(&create_import_request("1-1"))
        .await
        .unwrap();
    let reply = ImportReply::decode(&read_exact_vec(&mut stream, ImportReply::SIZE).await).unwrap();
    assert_eq!(reply.header.command, OpCode::ImportReply);
    assert_eq!(reply.header.status, 0);
    assert_eq!(reply.device.id_vendor, 0xDEAD);
    assert_eq!(reply.device.id_product, 0xBEEF);

    for (seqnum, length) in [(1u32, 1024u32), (2, 64)] {
        stream
            .write_all(&create_cmd_submit_frame(seqnum, length))
            .await
            .unwrap();

        let frame = read_exact_vec(&mut stream, URB_FRAME_SIZE).await;
        let ret = RetSubmit::decode(&frame).unwrap();
        assert_eq!(ret.header.seqnum, seqnum);
        assert_eq!(ret.status, 0);
        assert_eq!(ret.actual_length, length + 512);
        assert_eq!(&frame[URB_MESSAGE_SIZE..URB_MESSAGE_SIZE + 4], &URB_DATA_PATTERN);
    }
}

#[tokio::test]
async fn test_unlink_gets_no_reply() {
    let server = start_server().await;
    let mut stream = connect(&server).await;

    stream
        .write_all(&create_import_request("1-1"))
        .await
        .unwrap();
    read_exact_vec(&mut stream, ImportReply::SIZE).await;

    stream
        .write_all(&create_cmd_unlink_frame(3, 2))
        .await
        .unwrap();
    // Give the server time to consume the unlink before the next frame
    tokio::time::sleep(Duration::from_millis(50)).await;
    stream
        .write_all(&create_cmd_submit_frame(4, 0))
        .await
        .unwrap();

    let ret = RetSubmit::decode(&read_exact_vec(&mut stream, URB_FRAME_SIZE).await).unwrap();
    assert_eq!(ret.header.seqnum, 4);
    assert_eq!(ret.actual_length, 512);
}

#[tokio::test]
async fn test_short_header_closes_without_response() {
    let server = start_server().await;
    let mut stream = connect(&server).await;

    stream.write_all(&[0x01, 0x11, 0x80]).await.unwrap();
    assert!(read_until_closed(&mut stream).await.is_empty());

    // The listener keeps serving other clients
    let mut next = connect(&server).await;
    next.write_all(&create_devlist_request(USBIP_VERSION))
        .await
        .unwrap();
    assert_eq!(read_until_closed(&mut next).await.len(), DevListReply::SIZE);
}
