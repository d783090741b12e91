//! End-to-end exercises of the bus's public API, independent of any
//! in-crate test module.

use bytes::Bytes;
use meshwire::{Bus, BusOptions};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[compio::test]
async fn exact_and_wildcard_subscriptions_both_deliver() {
    let bus = Bus::new(BusOptions::new());

    let exact_hits = Arc::new(AtomicUsize::new(0));
    let exact_hits2 = exact_hits.clone();
    bus.subscribe_with_handler(b"orders.created", move |_| {
        exact_hits2.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    let wild_hits = Arc::new(AtomicUsize::new(0));
    let wild_hits2 = wild_hits.clone();
    bus.subscribe_with_handler(b"orders.*", move |_| {
        wild_hits2.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    let tail_hits = Arc::new(AtomicUsize::new(0));
    let tail_hits2 = tail_hits.clone();
    bus.subscribe_with_handler(b"orders.>", move |_| {
        tail_hits2.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    bus.publish(b"orders.created", Bytes::from_static(b"p"));
    bus.publish(b"orders.created.v2", Bytes::from_static(b"p"));

    assert_eq!(exact_hits.load(Ordering::SeqCst), 1);
    assert_eq!(wild_hits.load(Ordering::SeqCst), 1);
    assert_eq!(tail_hits.load(Ordering::SeqCst), 2);
}

#[compio::test]
async fn request_reply_round_trip() {
    let bus = Bus::new(BusOptions::new());
    let responder = bus.clone();
    bus.subscribe_with_handler(b"svc.echo", move |d| {
        if let Some(reply) = d.reply {
            let _ = responder.respond(&reply, d.payload);
        }
    })
    .unwrap();

    let reply = bus.request(b"svc.echo", Bytes::from_static(b"hello"), Duration::from_secs(1)).await.unwrap();
    assert_eq!(&reply[..], b"hello");
}

#[compio::test]
async fn request_without_a_responder_times_out() {
    let bus = Bus::new(BusOptions::new());
    let err = bus.request(b"svc.nobody", Bytes::from_static(b"x"), Duration::from_millis(30)).await;
    assert!(err.is_err());
}

#[compio::test]
async fn unsubscribing_stops_delivery() {
    let bus = Bus::new(BusOptions::new());
    let hits = Arc::new(AtomicUsize::new(0));
    let hits2 = hits.clone();
    bus.subscribe_with_handler(b"metrics.tick", move |_| {
        hits2.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();
    bus.publish(b"metrics.tick", Bytes::from_static(b"1"));
    bus.unsubscribe(b"metrics.tick");
    bus.publish(b"metrics.tick", Bytes::from_static(b"2"));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[compio::test]
async fn client_removal_drops_its_subscriptions_only() {
    let bus = Bus::new(BusOptions::new());
    let left_hits = Arc::new(AtomicUsize::new(0));
    let right_hits = Arc::new(AtomicUsize::new(0));

    let client_a = bus.new_client();
    let client_b = bus.new_client();

    let left2 = left_hits.clone();
    bus.subscribe_for_client(
        &client_a,
        b"room.a",
        b"",
        Arc::new(move |_| {
            left2.fetch_add(1, Ordering::SeqCst);
        }),
    )
    .unwrap();

    let right2 = right_hits.clone();
    bus.subscribe_for_client(
        &client_b,
        b"room.a",
        b"",
        Arc::new(move |_| {
            right2.fetch_add(1, Ordering::SeqCst);
        }),
    )
    .unwrap();

    bus.remove_client(client_a.id());
    bus.publish(b"room.a", Bytes::from_static(b"x"));

    assert_eq!(left_hits.load(Ordering::SeqCst), 0);
    assert_eq!(right_hits.load(Ordering::SeqCst), 1);
}
