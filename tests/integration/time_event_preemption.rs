//! A time event fires once at its deadline, and a later timer watching an
//! event that is since superseded by an earlier one never fires it twice
//! (§4.6, §8 scenarios 4-5).

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
async fn a_time_event_fires_once_at_its_deadline() {
    let server = test_support::start(4).await;
    let mut client = test_support::connect(&server).await;

    send(&mut client, r#"{"action":"subscribe","channel_name":"ticks"}"#).await;

    let exec_at = broker::now_timestamp() + 0.2;
    send(
        &mut client,
        &format!(
            r#"{{"action":"add_time_event","channel_name":"ticks","exec_timestamp":{exec_at},"data":"tock"}}"#
        ),
    )
    .await;

    let reply = tokio::time::timeout(Duration::from_secs(2), read_line(&mut client))
        .await
        .expect("time event should have fired by now");
    let value: serde_json::Value = serde_json::from_str(&reply).unwrap();
    assert_eq!(value["type"], "time_event");
    assert_eq!(value["data"]["channel_name"], "ticks");
    assert_eq!(value["data"]["data"], "tock");

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.core.scheduler.count().await, 0);
}

#[tokio::test]
async fn an_earlier_added_event_preempts_one_added_first() {
    let server = test_support::start(4).await;
    let mut client = test_support::connect(&server).await;

    send(&mut client, r#"{"action":"subscribe","channel_name":"ticks"}"#).await;

    let now = broker::now_timestamp();
    send(
        &mut client,
        &format!(
            r#"{{"action":"add_time_event","channel_name":"ticks","exec_timestamp":{},"data":"late"}}"#,
            now + 5.0
        ),
    )
    .await;
    send(
        &mut client,
        &format!(
            r#"{{"action":"add_time_event","channel_name":"ticks","exec_timestamp":{},"data":"early"}}"#,
            now + 0.2
        ),
    )
    .await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(server.core.scheduler.count().await, 2);

    let reply = tokio::time::timeout(Duration::from_secs(2), read_line(&mut client))
        .await
        .expect("the earlier event should fire first");
    let value: serde_json::Value = serde_json::from_str(&reply).unwrap();
    assert_eq!(value["data"]["data"], "early");
    assert_eq!(server.core.scheduler.count().await, 1);
}
