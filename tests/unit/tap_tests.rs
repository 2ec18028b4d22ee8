//! Traffic tap: bytes pass through unchanged and complete lines reach the
//! observer with their direction and message kind.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use agent_link::acp::protocol::MessageKind;
use agent_link::acp::tap::{Direction, TrafficObserver, TrafficRecord, TrafficTap};
use agent_link::{AppError, Result};

#[derive(Default)]
struct Collect {
    records: Mutex<Vec<TrafficRecord>>,
    fail: bool,
}

impl TrafficObserver for Collect {
    fn observe(&self, record: &TrafficRecord) -> Result<()> {
        self.records.lock().unwrap().push(record.clone());
        if self.fail {
            return Err(AppError::Io("observer sink full".into()));
        }
        Ok(())
    }
}

async fn wait_for_records(observer: &Collect, count: usize) -> Vec<TrafficRecord> {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let records = observer.records.lock().unwrap().clone();
            if records.len() >= count {
                return records;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("observer saw the lines")
}

#[tokio::test]
async fn both_directions_are_observed_and_bytes_pass_through() {
    let observer = Arc::new(Collect::default());
    let tap = TrafficTap::spawn("agent-1", observer.clone());

    let (client_side, mut agent_side) = tokio::io::duplex(4096);
    let (read_half, write_half) = tokio::io::split(client_side);
    let mut reader = tap.reader(read_half);
    let mut writer = tap.writer(write_half);

    let request: &[u8] = b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"initialize\"}\n";
    writer.write_all(request).await.unwrap();
    writer.flush().await.unwrap();

    let mut received = vec![0_u8; request.len()];
    agent_side.read_exact(&mut received).await.unwrap();
    assert_eq!(received, request);

    let response: &[u8] = b"{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n";
    agent_side.write_all(response).await.unwrap();
    let mut echoed = vec![0_u8; response.len()];
    reader.read_exact(&mut echoed).await.unwrap();
    assert_eq!(echoed, response);

    let records = wait_for_records(&observer, 2).await;
    assert_eq!(records[0].peer, "agent-1");
    assert_eq!(records[0].direction, Direction::Outbound);
    assert_eq!(records[0].kind, MessageKind::Request);
    assert_eq!(records[1].direction, Direction::Inbound);
    assert_eq!(records[1].kind, MessageKind::Response);
    assert_eq!(records[1].line, "{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}");
}

/// Observer errors are swallowed; later lines are still observed.
#[tokio::test]
async fn failing_observer_does_not_break_the_stream() {
    let observer = Arc::new(Collect {
        fail: true,
        ..Collect::default()
    });
    let tap = TrafficTap::spawn("agent-2", observer.clone());

    let (client_side, mut agent_side) = tokio::io::duplex(4096);
    let mut writer = tap.writer(client_side);

    let bytes: &[u8] = b"not json\n{\"method\":\"x\"}\n";
    writer.write_all(bytes).await.unwrap();
    writer.flush().await.unwrap();

    let mut received = vec![0_u8; bytes.len()];
    agent_side.read_exact(&mut received).await.unwrap();
    assert_eq!(received, bytes);

    let records = wait_for_records(&observer, 2).await;
    assert_eq!(records[0].kind, MessageKind::Unparseable);
    assert_eq!(records[1].kind, MessageKind::Notification);
}
