//! One-shot STUN Binding client.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tracing::debug;

use super::message::{Message, MessageClass};
use crate::error::{Result, StunError};

/// Default STUN timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// STUN client for server reflexive address discovery
pub struct BindingClient {
    socket: UdpSocket,
    timeout: Duration,
}

impl BindingClient {
    /// Bind a new STUN client to a local address
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self {
            socket,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Set query timeout
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Get local socket address
    ///
    /// # Errors
    ///
    /// Returns an error if the local address cannot be determined
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Ask `server` which address this client's packets arrive from.
    ///
    /// Datagrams from other sources, undecodable datagrams and responses to
    /// other transactions are skipped until the timeout expires.
    ///
    /// # Errors
    ///
    /// Returns `StunError` if:
    /// - Network I/O fails
    /// - The server doesn't respond within the timeout
    /// - The server answers with an error response
    /// - The response carries no mapped address
    pub async fn query(&self, server: SocketAddr) -> Result<SocketAddr> {
        let request = Message::binding_request();
        self.socket.send_to(&request.encode()?, server).await?;

        let response = tokio::time::timeout(self.timeout, self.recv_response(server, &request))
            .await
            .map_err(|_| StunError::Timeout)??;

        if response.class != MessageClass::SuccessResponse {
            return Err(StunError::ErrorResponse);
        }

        response
            .xor_mapped_address()
            .or_else(|| response.mapped_address())
            .ok_or(StunError::MissingAttribute)
    }

    async fn recv_response(&self, server: SocketAddr, request: &Message) -> Result<Message> {
        let mut buf = [0u8; 1024];

        loop {
            let (len, from) = self.socket.recv_from(&mut buf).await?;
            if from != server {
                debug!(%from, "Ignoring datagram from unexpected source");
                continue;
            }

            match Message::decode(&buf[..len]) {
                Ok(msg) if msg.transaction_id == request.transaction_id => return Ok(msg),
                Ok(msg) => {
                    debug!(txid = %msg.transaction_id, "Ignoring response to another transaction");
                }
                Err(e) => debug!(error = %e, "Ignoring undecodable datagram"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stun::message::{Attribute, TransactionId};
    use crate::stun::responder::BindingResponder;
    use std::sync::Arc;

    /// Fake server answering the first request with the datagrams `build` returns
    async fn answer_once<F>(build: F) -> (SocketAddr, tokio::task::JoinHandle<()>)
    where
        F: FnOnce(&Message) -> Vec<Message> + Send + 'static,
    {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let mut buf = [0u8; 512];
            let (len, from) = server.recv_from(&mut buf).await.unwrap();
            let request = Message::decode(&buf[..len]).unwrap();
            for reply in build(&request) {
                server.send_to(&reply.encode().unwrap(), from).await.unwrap();
            }
        });
        (addr, handle)
    }

    #[tokio::test]
    async fn test_client_bind() {
        let client = BindingClient::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        assert!(client.local_addr().unwrap().ip().is_loopback());
    }

    #[tokio::test]
    async fn test_query_against_responder() {
        let responder = Arc::new(
            BindingResponder::bind("127.0.0.1:0".parse().unwrap())
                .await
                .unwrap(),
        );
        let server_addr = responder.local_addr().unwrap();
        let server = Arc::clone(&responder);
        let handle = tokio::spawn(async move { server.run().await });

        let client = BindingClient::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let mapped = client.query(server_addr).await.unwrap();
        assert_eq!(mapped, client.local_addr().unwrap());

        handle.abort();
    }

    #[tokio::test]
    async fn test_query_timeout() {
        // A bound socket that never answers
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut client = BindingClient::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        client.set_timeout(Duration::from_millis(100));

        let result = client.query(silent.local_addr().unwrap()).await;
        assert!(matches!(result, Err(StunError::Timeout)));
    }

    #[tokio::test]
    async fn test_query_error_response() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_addr = server.local_addr().unwrap();
        let client = BindingClient::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();

        let fake = tokio::spawn(async move {
            let mut buf = [0u8; 512];
            let (len, from) = server.recv_from(&mut buf).await.unwrap();
            let request = Message::decode(&buf[..len]).unwrap();
            let reply = Message::new(
                MessageClass::ErrorResponse,
                request.method,
                request.transaction_id,
            );
            server
                .send_to(&reply.encode().unwrap(), from)
                .await
                .unwrap();
        });

        let result = client.query(server_addr).await;
        assert!(matches!(result, Err(StunError::ErrorResponse)));
        fake.await.unwrap();
    }

    #[tokio::test]
    async fn test_query_falls_back_to_mapped_address() {
        let reported: SocketAddr = "198.51.100.20:6000".parse().unwrap();
        let (server_addr, fake) = answer_once(move |request| {
            let mut reply = Message::new(
                MessageClass::SuccessResponse,
                request.method,
                request.transaction_id,
            );
            reply.add_attribute(Attribute::MappedAddress(reported));
            vec![reply]
        })
        .await;

        let client = BindingClient::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(client.query(server_addr).await.unwrap(), reported);
        fake.await.unwrap();
    }

    #[tokio::test]
    async fn test_query_prefers_xor_mapped_address() {
        let xored: SocketAddr = "198.51.100.20:6000".parse().unwrap();
        let plain: SocketAddr = "198.51.100.99:7000".parse().unwrap();
        let (server_addr, fake) = answer_once(move |request| {
            let mut reply = Message::new(
                MessageClass::SuccessResponse,
                request.method,
                request.transaction_id,
            );
            reply.add_attribute(Attribute::MappedAddress(plain));
            reply.add_attribute(Attribute::XorMappedAddress(xored));
            vec![reply]
        })
        .await;

        let client = BindingClient::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(client.query(server_addr).await.unwrap(), xored);
        fake.await.unwrap();
    }

    #[tokio::test]
    async fn test_query_without_address_is_missing_attribute() {
        let (server_addr, fake) = answer_once(|request| {
            let mut reply = Message::new(
                MessageClass::SuccessResponse,
                request.method,
                request.transaction_id,
            );
            reply.add_attribute(Attribute::Software("no address here".to_string()));
            vec![reply]
        })
        .await;

        let client = BindingClient::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let result = client.query(server_addr).await;
        assert!(matches!(result, Err(StunError::MissingAttribute)));
        fake.await.unwrap();
    }

    #[tokio::test]
    async fn test_query_skips_other_transactions() {
        let stale: SocketAddr = "203.0.113.1:1111".parse().unwrap();
        let fresh: SocketAddr = "203.0.113.2:2222".parse().unwrap();
        let (server_addr, fake) = answer_once(move |request| {
            vec![
                Message::binding_success(TransactionId::random(), stale),
                Message::binding_success(request.transaction_id, fresh),
            ]
        })
        .await;

        let client = BindingClient::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(client.query(server_addr).await.unwrap(), fresh);
        fake.await.unwrap();
    }

    #[tokio::test]
    async fn test_query_skips_foreign_source() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_addr = server.local_addr().unwrap();
        let intruder = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let spoofed: SocketAddr = "203.0.113.66:6666".parse().unwrap();
        let genuine: SocketAddr = "203.0.113.7:7777".parse().unwrap();

        let fake = tokio::spawn(async move {
            let mut buf = [0u8; 512];
            let (len, from) = server.recv_from(&mut buf).await.unwrap();
            let request = Message::decode(&buf[..len]).unwrap();

            // Same transaction, wrong sender
            let forged = Message::binding_success(request.transaction_id, spoofed);
            intruder
                .send_to(&forged.encode().unwrap(), from)
                .await
                .unwrap();

            let reply = Message::binding_success(request.transaction_id, genuine);
            server
                .send_to(&reply.encode().unwrap(), from)
                .await
                .unwrap();
        });

        let client = BindingClient::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(client.query(server_addr).await.unwrap(), genuine);
        fake.await.unwrap();
    }
}
