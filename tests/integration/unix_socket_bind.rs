//! `Listener::bind` against `Bind::UnixSocket` serves clients the same way
//! the TCP listener does (§4.7, §4.8).

use broker::{Bind, Config, Core, Listener, TimezoneOffset};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

#[tokio::test]
async fn ping_pong_over_a_unix_socket() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("broker.sock").to_string_lossy().into_owned();

    let config = Arc::new(Config {
        bind: Bind::UnixSocket { path: path.clone() },
        read_size: 4096,
        max_clients: 4,
        codec: broker::CodecKind::Json.build(),
        timezone: TimezoneOffset::UTC,
    });
    let listener = Listener::bind(&config.bind).await.expect("bind unix socket");
    let core = Core::new(config);
    tokio::spawn(async move {
        listener.serve(core).await;
    });

    let mut client = UnixStream::connect(&path).await.expect("connect to unix socket");
    client.write_all(b"{\"action\":\"ping\"}\n").await.unwrap();

    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        client.read_exact(&mut byte).await.expect("read from server");
        if byte[0] == b'\n' {
            break;
        }
        buf.push(byte[0]);
    }
    assert_eq!(String::from_utf8(buf).unwrap(), r#"{"type":"message","data":"PONG"}"#);
}

#[tokio::test]
async fn binding_removes_a_stale_socket_file_left_behind_by_a_previous_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("stale.sock").to_string_lossy().into_owned();
    std::fs::write(&path, b"not a real socket").expect("write stale file");

    let bind = Bind::UnixSocket { path };
    assert!(Listener::bind(&bind).await.is_ok());
}
