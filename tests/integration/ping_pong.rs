//! A client that sends `ping` gets back exactly `PONG`, byte for byte
//! (§6, §8 scenario 1).

use broker::test_support;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

async fn read_line(stream: &mut tokio::net::TcpStream) -> String {
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

#[tokio::test]
async fn ping_gets_back_pong() {
    let server = test_support::start(4).await;
    let mut client = test_support::connect(&server).await;

    client.write_all(b"{\"action\":\"ping\"}\n").await.unwrap();
    let reply = read_line(&mut client).await;

    assert_eq!(reply, r#"{"type":"message","data":"PONG"}"#);
}

#[tokio::test]
async fn unknown_action_gets_an_error_message_and_the_session_stays_open() {
    let server = test_support::start(4).await;
    let mut client = test_support::connect(&server).await;

    client.write_all(b"{\"action\":\"dance\"}\n").await.unwrap();
    let reply = read_line(&mut client).await;
    assert_eq!(
        reply,
        r#"{"type":"error_message","data":{"message":"Unknown action: dance"}}"#
    );

    // The session survived the bad request; a follow-up ping still works.
    client.write_all(b"{\"action\":\"ping\"}\n").await.unwrap();
    assert_eq!(read_line(&mut client).await, r#"{"type":"message","data":"PONG"}"#);
}
