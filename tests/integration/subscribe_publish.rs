//! Subscribe/publish delivery, and channel teardown on last-unsubscribe
//! (§4.2, §4.3, §8 scenarios 2-3).

use broker::test_support;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn read_line(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        stream.read_exact(&mut byte).await.expect("read from server");
        if byte[0] == b'\n' {
            break;
        }
        buf.push(byte[0]);
    }
    String::from_utf8(buf).expect("utf8 reply")
}

async fn send(stream: &mut TcpStream, line: &str) {
    stream.write_all(line.as_bytes()).await.unwrap();
    stream.write_all(b"\n").await.unwrap();
}

#[tokio::test]
async fn a_published_event_reaches_every_subscriber() {
    let server = test_support::start(8).await;
    let mut subscriber = test_support::connect(&server).await;
    let mut publisher = test_support::connect(&server).await;

    send(&mut subscriber, r#"{"action":"subscribe","channel_name":"weather"}"#).await;
    send(
        &mut publisher,
        r#"{"action":"publish","channel_name":"weather","data":{"temp_c":21}}"#,
    )
    .await;

    let reply = read_line(&mut subscriber).await;
    assert_eq!(reply, r#"{"type":"published_event","data":{"temp_c":21}}"#);
}

#[tokio::test]
async fn publish_to_a_channel_with_no_subscribers_is_a_silent_no_op() {
    let server = test_support::start(8).await;
    let mut publisher = test_support::connect(&server).await;

    send(
        &mut publisher,
        r#"{"action":"publish","channel_name":"nobody-home","data":1}"#,
    )
    .await;

    // No reply is expected; a follow-up ping proves the session is still alive.
    send(&mut publisher, r#"{"action":"ping"}"#).await;
    assert_eq!(read_line(&mut publisher).await, r#"{"type":"message","data":"PONG"}"#);
}

#[tokio::test]
async fn unsubscribing_the_last_member_destroys_the_channel() {
    let server = test_support::start(8).await;
    let mut subscriber = test_support::connect(&server).await;

    send(&mut subscriber, r#"{"action":"subscribe","channel_name":"temp"}"#).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(server.core.channels.count().await, 1);

    send(&mut subscriber, r#"{"action":"unsubscribe","channel_name":"temp"}"#).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(server.core.channels.count().await, 0);
}

#[tokio::test]
async fn double_subscribe_delivers_the_same_event_twice() {
    let server = test_support::start(8).await;
    let mut subscriber = test_support::connect(&server).await;
    let mut publisher = test_support::connect(&server).await;

    send(&mut subscriber, r#"{"action":"subscribe","channel_name":"dup"}"#).await;
    send(&mut subscriber, r#"{"action":"subscribe","channel_name":"dup"}"#).await;
    send(&mut publisher, r#"{"action":"publish","channel_name":"dup","data":"x"}"#).await;

    assert_eq!(read_line(&mut subscriber).await, r#"{"type":"published_event","data":"x"}"#);
    assert_eq!(read_line(&mut subscriber).await, r#"{"type":"published_event","data":"x"}"#);
}
