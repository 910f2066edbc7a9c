//! Stateless STUN Binding responder.
//!
//! Each datagram is handled on its own: decode, check that it is a Binding
//! request, answer with a success response carrying the source address in
//! XOR-MAPPED-ADDRESS. Nothing is remembered between datagrams, so any
//! number of receive loops may share the socket.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::task::JoinSet;
use tracing::{debug, error, info, trace, warn};

use super::message::Message;
use crate::error::{Result, StunError};

/// Largest datagram accepted; anything longer is truncated and then fails to decode
const MAX_DATAGRAM_SIZE: usize = 65_535;

/// Responder configuration
#[derive(Debug, Clone)]
pub struct ResponderConfig {
    /// Number of receive loops sharing the socket
    pub workers: usize,
    /// Kernel send/receive buffer size in bytes
    pub socket_buffer_size: usize,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            socket_buffer_size: 256 * 1024,
        }
    }
}

/// Responder statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponderStats {
    /// Datagrams read from the socket
    pub received: u64,
    /// Binding responses sent
    pub answered: u64,
    /// Datagrams that failed to decode
    pub malformed: u64,
    /// Well-formed messages that were not Binding requests
    pub ignored: u64,
    /// Requests whose source address could not be reported
    pub unusable_source: u64,
    /// Failed sends
    pub send_errors: u64,
    /// Failed receives
    pub recv_errors: u64,
}

#[derive(Debug, Default)]
struct Counters {
    received: AtomicU64,
    answered: AtomicU64,
    malformed: AtomicU64,
    ignored: AtomicU64,
    unusable_source: AtomicU64,
    send_errors: AtomicU64,
    recv_errors: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ResponderStats {
        ResponderStats {
            received: self.received.load(Ordering::Relaxed),
            answered: self.answered.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            unusable_source: self.unusable_source.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
            recv_errors: self.recv_errors.load(Ordering::Relaxed),
        }
    }
}

/// Address to report for a datagram source.
///
/// IPv4-mapped IPv6 sources seen on dual-stack sockets are reported as plain
/// IPv4. An unspecified address or port 0 cannot be reached by the peer and
/// is rejected.
pub fn observed_address(source: SocketAddr) -> Result<SocketAddr> {
    let ip = source.ip().to_canonical();
    if ip.is_unspecified() || source.port() == 0 {
        return Err(StunError::UnusableSource(source));
    }
    Ok(SocketAddr::new(ip, source.port()))
}

/// Build the reply for one datagram.
///
/// Returns `Ok(None)` for well-formed messages that are not Binding requests.
///
/// # Errors
///
/// Returns the decode error for malformed datagrams, or
/// [`StunError::UnusableSource`] if the source cannot be reported.
pub fn handle_datagram(packet: &[u8], source: SocketAddr) -> Result<Option<Vec<u8>>> {
    let request = Message::decode(packet)?;
    if !request.is_binding_request() {
        return Ok(None);
    }

    let observed = observed_address(source)?;
    let response = Message::binding_success(request.transaction_id, observed);
    Ok(Some(response.encode()?))
}

/// UDP server answering STUN Binding requests
pub struct BindingResponder {
    socket: Arc<UdpSocket>,
    config: ResponderConfig,
    counters: Arc<Counters>,
}

impl BindingResponder {
    /// Bind a responder with default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be created or bound.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        Self::bind_with_config(addr, ResponderConfig::default()).await
    }

    /// Bind a responder with custom configuration
    ///
    /// IPv6 addresses are bound dual-stack where the platform allows it.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be created or bound.
    pub async fn bind_with_config(addr: SocketAddr, config: ResponderConfig) -> Result<Self> {
        let domain = if addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };

        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        if addr.is_ipv6() {
            if let Err(e) = socket.set_only_v6(false) {
                debug!(error = %e, "Dual-stack STUN socket unavailable, serving IPv6 only");
            }
        }
        socket.set_recv_buffer_size(config.socket_buffer_size)?;
        socket.set_send_buffer_size(config.socket_buffer_size)?;
        socket.bind(&addr.into())?;
        socket.set_nonblocking(true)?;

        let std_socket: std::net::UdpSocket = socket.into();
        let socket = UdpSocket::from_std(std_socket)?;

        Ok(Self::from_socket(socket, config))
    }

    /// Wrap an already bound socket
    #[must_use]
    pub fn from_socket(socket: UdpSocket, config: ResponderConfig) -> Self {
        Self {
            socket: Arc::new(socket),
            config,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Get local socket address
    ///
    /// # Errors
    ///
    /// Returns an error if the local address cannot be determined
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Current statistics
    #[must_use]
    pub fn stats(&self) -> ResponderStats {
        self.counters.snapshot()
    }

    /// Run the receive loops
    ///
    /// Loops never stop on their own; receive and send errors are logged and
    /// the loop continues. Returns once every loop has ended (only possible
    /// if one panics).
    pub async fn run(&self) {
        let workers = self.config.workers.max(1);
        info!(
            addr = ?self.socket.local_addr().ok(),
            workers,
            "STUN responder listening"
        );

        let mut loops = JoinSet::new();
        for worker in 0..workers {
            loops.spawn(receive_loop(
                worker,
                Arc::clone(&self.socket),
                Arc::clone(&self.counters),
            ));
        }

        while let Some(result) = loops.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "STUN receive loop terminated");
            }
        }
    }
}

async fn receive_loop(worker: usize, socket: Arc<UdpSocket>, counters: Arc<Counters>) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

    loop {
        let (len, from) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                Counters::bump(&counters.recv_errors);
                warn!(worker, error = %e, "STUN receive error");
                continue;
            }
        };
        Counters::bump(&counters.received);

        match handle_datagram(&buf[..len], from) {
            Ok(Some(reply)) => match socket.send_to(&reply, from).await {
                Ok(_) => {
                    Counters::bump(&counters.answered);
                    debug!(worker, peer = %from, "Answered binding request");
                }
                Err(e) => {
                    Counters::bump(&counters.send_errors);
                    warn!(worker, peer = %from, error = %e, "Failed to send binding response");
                }
            },
            Ok(None) => {
                Counters::bump(&counters.ignored);
                trace!(worker, peer = %from, "Ignoring non-binding STUN message");
            }
            Err(e) if e.is_decode() => {
                Counters::bump(&counters.malformed);
                trace!(worker, peer = %from, error = %e, "Dropping malformed datagram");
            }
            Err(e) => {
                Counters::bump(&counters.unusable_source);
                debug!(worker, peer = %from, error = %e, "Dropping binding request");
            }
        }
    }
}
