#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::time::Duration;

use authwire::core::segment::Segment;
use authwire::core::stream_buffer::StreamBuffer;
use authwire::protocol::framer;
use authwire::protocol::message::Message;
use authwire::reactor::Reactor;
use authwire::service::server::{self, LoginServer};
use authwire::service::RemoteClient;
use authwire::store::{CredentialStore, RowStore};
use authwire::utils::security::{HashParams, Security};

#[test]
fn stress_framer_large_series() {
    // Heavy burst of frames in one buffer, drained in a single pass
    let mut buffer = StreamBuffer::new();
    let mut expected = 0usize;
    for size in [0usize, 1, 64, 512, 4096] {
        for i in 0..2_000 {
            let message = if i % 2 == 0 {
                Message::display("d".repeat(size))
            } else {
                Message::LoginAuthenticateResponse(i % 3 == 0)
            };
            buffer.append(framer::encode_segment(&message).unwrap());
            expected += 1;
        }
    }

    let mut decoded = 0usize;
    while framer::get(&mut buffer).unwrap().is_some() {
        decoded += 1;
    }
    assert_eq!(decoded, expected);
    assert!(buffer.is_empty());
}

#[test]
fn stress_byte_at_a_time_delivery() {
    let messages = [
        Message::LoginSetUsername("alice".into()),
        Message::LoginAuthenticate("secret".into()),
        Message::Hello,
        Message::Menu,
    ];
    let mut wire = Vec::new();
    for message in &messages {
        wire.extend_from_slice(&framer::encode(message).unwrap());
    }

    let mut buffer = StreamBuffer::new();
    let mut received = Vec::new();
    for _ in 0..500 {
        for byte in &wire {
            buffer.append(Segment::copy_from(std::slice::from_ref(byte)));
            while let Some(message) = framer::get(&mut buffer).unwrap() {
                received.push(message);
            }
        }
    }
    assert_eq!(received.len(), messages.len() * 500);
    assert_eq!(&received[..messages.len()], &messages[..]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stress_concurrent_logins() {
    const CLIENTS: usize = 32;

    let dir = tempfile::TempDir::new().unwrap();
    let passwd = dir.path().join("passwd");
    let security = Security::new(HashParams {
        t_cost: 1,
        m_cost_kib: 8,
        ..HashParams::default()
    });
    let store = CredentialStore::new(&passwd);
    for i in 0..CLIENTS {
        let salt = security.generate_salt();
        let hash = security.hash(&format!("pw{i}"), &salt).unwrap();
        store.insert([format!("user{i}"), salt, hash]).unwrap();
    }

    let (tx, rx) = std::sync::mpsc::channel();
    let server_security = security.clone();
    let server_thread = std::thread::spawn(move || {
        let mut reactor = Reactor::new();
        let addr = server::bind(&mut reactor, "127.0.0.1:0", 128).unwrap();
        let stop = reactor.stop_handle();
        let mut handler = LoginServer::new(CredentialStore::new(&passwd), server_security, 3);
        tx.send((addr, stop.clone())).unwrap();
        while !stop.is_stopped() {
            reactor.turn(&mut handler, Some(Duration::from_millis(20)));
        }
        reactor.shutdown();
    });
    let (addr, stop) = rx.recv().unwrap();

    let tasks: Vec<_> = (0..CLIENTS)
        .map(|i| {
            let addr = addr.to_string();
            tokio::spawn(async move {
                let mut client =
                    RemoteClient::connect(&addr, Duration::from_secs(5), Duration::from_secs(30))
                        .await
                        .unwrap();
                assert!(client
                    .login(&format!("user{i}"), &format!("pw{i}"))
                    .await
                    .unwrap());
                for _ in 0..10 {
                    assert_eq!(client.request(Message::Hello).await.unwrap(), "Hello there.\n");
                }
            })
        })
        .collect();

    for result in futures::future::join_all(tasks).await {
        result.expect("client task");
    }

    stop.stop();
    server_thread.join().unwrap();
}
