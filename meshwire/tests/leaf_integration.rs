//! Leaf link federation over real loopback TCP: a hub `Bus` and a leaf
//! `Bus` joined by a `LeafLink`, exercising the `respond` leaf fallback,
//! inbound `SUB` forwarding, and the JWT auth gate against raw wire bytes.

use bytes::Bytes;
use compio::buf::BufResult;
use compio::io::{AsyncReadExt, AsyncWriteExt};
use compio::net::{TcpListener, TcpStream};
use meshwire::{Bus, BusOptions, LeafLink};
use meshwire_leaf::config::LeafOptions;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

async fn settle() {
    compio::time::sleep(Duration::from_millis(100)).await;
}

async fn read_line(stream: &mut TcpStream) -> String {
    let mut collected = Vec::new();
    loop {
        let buf = vec![0u8; 256];
        let BufResult(res, buf) = stream.read(buf).await;
        let n = res.unwrap();
        assert!(n > 0, "peer closed before sending a line");
        collected.extend_from_slice(&buf[..n]);
        if let Some(pos) = collected.iter().position(|&b| b == b'\n') {
            return String::from_utf8_lossy(&collected[..pos]).into_owned();
        }
    }
}

#[compio::test]
async fn respond_fallback_crosses_leaf_link_to_local_subscriber() {
    let hub = Bus::new(BusOptions::new());
    let leaf = Bus::new(BusOptions::new());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hub_clone = hub.clone();
    let _accept = compio::runtime::spawn(async move {
        let _ = LeafLink::accept_loop(hub_clone, listener, LeafOptions::default()).await;
    });

    let _link = LeafLink::connect(leaf.clone(), addr, LeafOptions::default(), None, None).await.unwrap();
    settle().await;

    let hits = Arc::new(AtomicUsize::new(0));
    let hits2 = hits.clone();
    leaf.subscribe_with_handler(b"orphan.reply", move |d| {
        hits2.fetch_add(1, Ordering::SeqCst);
        assert_eq!(&d.payload[..], b"answer");
    })
    .unwrap();
    settle().await;

    // Nobody on the hub bus is listening for this subject, so `respond`
    // falls through to every registered leaf.
    hub.respond(b"orphan.reply", Bytes::from_static(b"answer")).unwrap();
    settle().await;

    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[compio::test]
async fn raw_peer_sub_is_forwarded_as_pub_on_publish() {
    let hub = Bus::new(BusOptions::new());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hub_clone = hub.clone();
    let _accept = compio::runtime::spawn(async move {
        let _ = LeafLink::accept_loop(hub_clone, listener, LeafOptions::default()).await;
    });

    let mut peer = TcpStream::connect(addr).await.unwrap();
    let _info_line = read_line(&mut peer).await;

    let BufResult(res, _) = peer.write_all(Bytes::from_static(b"SUB weather.sf\n")).await;
    res.unwrap();
    settle().await;

    hub.publish(b"weather.sf", Bytes::from_static(b"sunny"));

    let header = read_line(&mut peer).await;
    assert_eq!(header, "PUB weather.sf 5");
    let buf = vec![0u8; 5];
    let BufResult(res, buf) = peer.read_exact(buf).await;
    res.unwrap();
    assert_eq!(&buf[..], b"sunny");
}

#[compio::test]
async fn unauthenticated_raw_peer_sub_is_rejected() {
    let secret = b"shared-secret".to_vec();
    let hub = Bus::new(BusOptions::new().with_auth_secret(secret));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let _accept = compio::runtime::spawn(async move {
        let _ = LeafLink::accept_loop(hub, listener, LeafOptions::default()).await;
    });

    let mut peer = TcpStream::connect(addr).await.unwrap();
    let _info_line = read_line(&mut peer).await;

    let BufResult(res, _) = peer.write_all(Bytes::from_static(b"SUB weather.sf\n")).await;
    res.unwrap();

    let line = read_line(&mut peer).await;
    assert!(line.starts_with("-ERR"), "expected an auth error frame, got: {line}");
}

#[compio::test]
async fn valid_bearer_token_authenticates_then_allows_sub() {
    let secret = b"shared-secret".to_vec();
    let hub = Bus::new(BusOptions::new().with_auth_secret(secret.clone()));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hub_clone = hub.clone();
    let _accept = compio::runtime::spawn(async move {
        let _ = LeafLink::accept_loop(hub_clone, listener, LeafOptions::default()).await;
    });

    let mut peer = TcpStream::connect(addr).await.unwrap();
    let _info_line = read_line(&mut peer).await;

    let now = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_secs();
    let token = meshwire_leaf::auth::sign(&secret, "leaf-test", now, 3600).unwrap();
    let auth_line = format!("AUTH BEARER {token}\n");
    let BufResult(res, _) = peer.write_all(Bytes::from(auth_line.into_bytes())).await;
    res.unwrap();
    assert_eq!(read_line(&mut peer).await, "+OK");

    let BufResult(res, _) = peer.write_all(Bytes::from_static(b"SUB news.world\n")).await;
    res.unwrap();
    settle().await;

    hub.publish(b"news.world", Bytes::from_static(b"hi"));
    let header = read_line(&mut peer).await;
    assert_eq!(header, "PUB news.world 2");
}
