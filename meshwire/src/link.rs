//! TCP-owning leaf link: bridges the wire protocol to `Bus` operations.
//!
//! `meshwire-leaf` only knows about frames and JWTs; this module is where a
//! link actually owns a socket, runs its event loop, and turns `SUB`/`PUB`/
//! `RESP` into calls on a concrete `Bus`. Kept in this crate (not
//! `meshwire-leaf`) so the protocol crate never depends on the bus.

use crate::bus::{Bus, LeafSink};
use crate::client::{Client, Delivery};
use crate::error::{BusError, Result};
use crate::io_buf::IoBytes;
use bytes::Bytes;
use compio::buf::BufResult;
use compio::io::{AsyncReadExt, AsyncWriteExt};
use compio::net::{TcpListener, TcpStream};
use meshwire_core::transform::SubjectTransform;
use meshwire_leaf::codec::{InfoPayload, LeafCodec, LeafCommand};
use meshwire_leaf::config::LeafOptions;
use meshwire_leaf::poison::PoisonGuard;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, trace, warn};

const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A live TCP peer bridging this Bus to a remote one.
pub struct LeafLink {
    id: String,
    bus: Arc<Bus>,
    client: Arc<Client>,
    outbound_tx: flume::Sender<LeafCommand>,
    transform: Option<SubjectTransform>,
    poisoned: AtomicBool,
    authed: AtomicBool,
}

impl LeafLink {
    fn bind(bus: Arc<Bus>, id: String, transform: Option<SubjectTransform>) -> (Arc<Self>, flume::Receiver<LeafCommand>) {
        let (outbound_tx, outbound_rx) = flume::unbounded();
        let client = bus.new_client();
        let auth_required = bus.options().auth_secret.is_some();
        let link = Arc::new_cyclic(|weak: &Weak<Self>| {
            let weak_sub = weak.clone();
            client.set_on_subscribe(Arc::new(move |subject: &[u8]| {
                let Some(link) = weak_sub.upgrade() else { return };
                if !link.client.has_remote_interest(subject) {
                    let out = link.apply_transform_out(subject);
                    let _ = link.outbound_tx.send(LeafCommand::Sub { subject: out });
                }
            }));
            let weak_unsub = weak.clone();
            client.set_on_unsubscribe(Arc::new(move |subject: &[u8]| {
                let Some(link) = weak_unsub.upgrade() else { return };
                let out = link.apply_transform_out(subject);
                let _ = link.outbound_tx.send(LeafCommand::Unsub { subject: out });
            }));
            Self {
                id,
                bus,
                client,
                outbound_tx,
                transform,
                poisoned: AtomicBool::new(false),
                authed: AtomicBool::new(!auth_required),
            }
        });
        (link, outbound_rx)
    }

    fn apply_transform_out(&self, subject: &[u8]) -> Box<[u8]> {
        match &self.transform {
            Some(t) => t.apply(subject).map(Vec::into_boxed_slice).unwrap_or_else(|_| subject.into()),
            None => subject.into(),
        }
    }

    /// Dial `addr`, perform the `INFO`/`AUTH` hello, and start the link's
    /// event loop as a background task.
    pub async fn connect(
        bus: Arc<Bus>,
        addr: SocketAddr,
        options: LeafOptions,
        auth_token: Option<String>,
        transform: Option<SubjectTransform>,
    ) -> Result<Arc<LeafLink>> {
        let mut stream = TcpStream::connect(addr).await?;
        let local_id = format!("leaf-{:016x}", rand::random::<u64>());
        write_frame(
            &mut stream,
            LeafCommand::Info(InfoPayload { id: local_id.clone(), kind: "leaf".into(), version: CRATE_VERSION.into() }),
        )
        .await?;
        if let Some(token) = auth_token {
            write_frame(&mut stream, LeafCommand::AuthBearer(token)).await?;
        }

        let (link, outbound_rx) = Self::bind(bus.clone(), local_id, transform);
        bus.add_leaf(link.clone() as Arc<dyn LeafSink>);
        info!(link = %link.id, peer = %addr, "leaf link connected (outbound)");

        let run_link = link.clone();
        let _handle = compio::runtime::spawn(async move { run_link.run(stream, outbound_rx, options).await });
        Ok(link)
    }

    /// Accept connections on `listener` forever, spawning one link per peer.
    pub async fn accept_loop(bus: Arc<Bus>, listener: TcpListener, options: LeafOptions) -> std::io::Result<()> {
        loop {
            let (stream, peer) = listener.accept().await?;
            let bus = bus.clone();
            let _handle = compio::runtime::spawn(async move {
                if let Err(e) = Self::accept_one(bus, stream, peer, options).await {
                    warn!(peer = %peer, error = %e, "leaf accept failed");
                }
            });
        }
    }

    async fn accept_one(bus: Arc<Bus>, mut stream: TcpStream, peer: SocketAddr, options: LeafOptions) -> Result<()> {
        let local_id = format!("leaf-{:016x}", rand::random::<u64>());
        write_frame(
            &mut stream,
            LeafCommand::Info(InfoPayload { id: local_id.clone(), kind: "leaf".into(), version: CRATE_VERSION.into() }),
        )
        .await?;

        let (link, outbound_rx) = Self::bind(bus.clone(), local_id, None);
        bus.add_leaf(link.clone() as Arc<dyn LeafSink>);
        info!(link = %link.id, peer = %peer, "leaf link connected (inbound)");
        link.run(stream, outbound_rx, options).await;
        Ok(())
    }

    async fn run(self: Arc<Self>, mut stream: TcpStream, outbound_rx: flume::Receiver<LeafCommand>, options: LeafOptions) {
        let mut codec = LeafCodec::new();
        loop {
            while let Ok(cmd) = outbound_rx.try_recv() {
                if self.write_command(&mut stream, cmd).await.is_err() {
                    self.close().await;
                    return;
                }
            }

            let buf = vec![0u8; options.read_buffer_size];
            match compio::time::timeout(options.ping_interval, stream.read(buf)).await {
                Ok(BufResult(Ok(0), _)) => {
                    info!(link = %self.id, "leaf link EOF");
                    break;
                }
                Ok(BufResult(Ok(n), buf)) => {
                    codec.feed(Bytes::copy_from_slice(&buf[..n]));
                    loop {
                        match codec.next() {
                            Ok(Some(cmd)) => Self::handle_inbound(&self, &mut stream, cmd).await,
                            Ok(None) => break,
                            Err(e) => {
                                warn!(link = %self.id, error = %e, "protocol violation, closing link");
                                self.close().await;
                                return;
                            }
                        }
                    }
                }
                Ok(BufResult(Err(e), _)) => {
                    warn!(link = %self.id, error = %e, "leaf read error");
                    break;
                }
                Err(_elapsed) => {
                    if self.write_command(&mut stream, LeafCommand::Ping).await.is_err() {
                        break;
                    }
                }
            }
        }
        self.close().await;
    }

    async fn handle_inbound(self: &Arc<Self>, stream: &mut TcpStream, cmd: LeafCommand) {
        match cmd {
            LeafCommand::Info(info) => {
                debug!(link = %self.id, peer_id = %info.id, version = %info.version, "leaf info received");
            }
            LeafCommand::AuthBearer(jwt) => match self.bus.authenticate(&jwt) {
                Ok(()) => {
                    self.authed.store(true, Ordering::Release);
                    let _ = self.outbound_tx.send(LeafCommand::Ok);
                }
                Err(_) => {
                    let _ = self.outbound_tx.send(LeafCommand::Err("invalid token".into()));
                }
            },
            LeafCommand::Sub { subject } => {
                if !self.authed.load(Ordering::Acquire) {
                    let _ = self.outbound_tx.send(LeafCommand::Err("not authenticated".into()));
                    return;
                }
                self.client.mark_remote_interest(&subject);
                let link = self.clone();
                let result = self.bus.subscribe_for_client(
                    &self.client,
                    &subject,
                    b"",
                    Arc::new(move |delivery: Delivery| {
                        let out_subject = link.apply_transform_out(&delivery.subject);
                        let _ = link.outbound_tx.send(LeafCommand::Pub { subject: out_subject, payload: delivery.payload });
                    }),
                );
                if let Err(e) = result {
                    warn!(link = %self.id, error = %e, "rejected remote SUB");
                    let _ = self.outbound_tx.send(LeafCommand::Err(format!("bad subject: {e}")));
                }
            }
            LeafCommand::Unsub { subject } => {
                self.client.clear_remote_interest(&subject);
                self.bus.unsubscribe_client(&self.client, &subject);
            }
            LeafCommand::Pub { subject, payload } => {
                if !self.authed.load(Ordering::Acquire) {
                    return;
                }
                self.bus.publish(&subject, payload);
            }
            LeafCommand::Resp { subject, payload } => {
                if !self.authed.load(Ordering::Acquire) {
                    return;
                }
                if let Err(e) = self.bus.respond(&subject, payload) {
                    trace!(link = %self.id, error = %e, "respond had no route");
                }
            }
            LeafCommand::Ping => {
                let _ = self.outbound_tx.send(LeafCommand::Pong);
            }
            LeafCommand::Pong => trace!(link = %self.id, "pong received"),
            LeafCommand::Ok | LeafCommand::Ack => trace!(link = %self.id, "ack received"),
            LeafCommand::Err(msg) => warn!(link = %self.id, message = %msg, "peer reported protocol error"),
        }
        let _ = stream;
    }

    async fn write_command(&self, stream: &mut TcpStream, cmd: LeafCommand) -> std::io::Result<()> {
        if self.poisoned.load(Ordering::Acquire) {
            warn!(link = %self.id, "refusing to write on a poisoned link");
            return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "link poisoned by a cancelled write"));
        }
        write_frame_with(stream, cmd, &self.poisoned).await
    }

    async fn close(&self) {
        self.bus.remove_client(self.client.id());
        info!(link = %self.id, "leaf link closed");
    }
}

impl LeafSink for LeafLink {
    fn send_resp(&self, subject: &[u8], payload: &Bytes) -> Result<()> {
        let out_subject = self.apply_transform_out(subject);
        self.outbound_tx
            .send(LeafCommand::Resp { subject: out_subject, payload: payload.clone() })
            .map_err(|_| BusError::NoRoute)
    }
}

async fn write_frame(stream: &mut TcpStream, cmd: LeafCommand) -> std::io::Result<()> {
    // Placeholder poisoned flag for calls made before a link is fully bound
    // (the INFO/AUTH hello, written before `LeafLink::bind` runs).
    let local_flag = AtomicBool::new(false);
    write_frame_with(stream, cmd, &local_flag).await
}

async fn write_frame_with(stream: &mut TcpStream, cmd: LeafCommand, poisoned: &AtomicBool) -> std::io::Result<()> {
    let bytes = cmd.encode();
    let guard = PoisonGuard::new(poisoned);
    let BufResult(res, _) = stream.write_all(IoBytes::new(bytes)).await;
    res?;
    guard.disarm();
    Ok(())
}
