use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use hickory_proto::error::ProtoError;
use hickory_proto::op::Message;
use hickory_proto::serialize::binary::{BinDecodable, BinEncodable};
use thiserror::Error;
use tokio::net::UdpSocket;

use crate::cache::Cache;
use crate::dnssec::ValidationError;

/// Errors surfaced by an [`Exchange`] round trip.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error(transparent)]
    Proto(#[from] ProtoError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("response ID {got} does not match request ID {want}")]
    UnexpectedId { want: u16, got: u16 },
    #[error("DNSSEC validation failed: {0}")]
    Validation(Box<ValidationError>),
}

/// An outbound DNS exchange: one request in, one response out.
///
/// Implementations must be safe for concurrent use, must not retain or
/// mutate the request, and should issue a single wire round trip per
/// call. Cancellation is by dropping the returned future.
#[async_trait]
pub trait Exchange: Send + Sync {
    async fn exchange(&self, request: Message) -> Result<Message, ExchangeError>;
}

/// Adapts a closure into an [`Exchange`], for tests and lightweight
/// integrations that have no state worth a dedicated type.
pub struct ExchangeFn<F>(pub F);

#[async_trait]
impl<F, Fut> Exchange for ExchangeFn<F>
where
    F: Fn(Message) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Message, ExchangeError>> + Send + 'static,
{
    async fn exchange(&self, request: Message) -> Result<Message, ExchangeError> {
        (self.0)(request).await
    }
}

/// Boxes a closure up as a shareable [`Exchange`].
pub fn exchange_fn<F, Fut>(f: F) -> Arc<dyn Exchange>
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Message, ExchangeError>> + Send + 'static,
{
    Arc::new(ExchangeFn(f))
}

const DEFAULT_UPSTREAM: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1)), 53);

// Large enough for the EDNS0 payload size advertised by the validator.
const MAX_RESPONSE_SIZE: usize = 4096;

/// Plain UDP exchange against a single upstream resolver.
///
/// A fresh socket is bound for every call so concurrent exchanges never
/// share transaction state.
#[derive(Debug, Clone)]
pub struct UdpExchange {
    upstream: SocketAddr,
}

impl UdpExchange {
    pub fn new(upstream: SocketAddr) -> Self {
        UdpExchange { upstream }
    }
}

impl Default for UdpExchange {
    fn default() -> Self {
        UdpExchange::new(DEFAULT_UPSTREAM)
    }
}

#[async_trait]
impl Exchange for UdpExchange {
    async fn exchange(&self, request: Message) -> Result<Message, ExchangeError> {
        let bind_addr: SocketAddr = if self.upstream.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(self.upstream).await?;

        let wire = request.to_bytes()?;
        socket.send(&wire).await?;

        let mut buf = vec![0u8; MAX_RESPONSE_SIZE];
        let len = socket.recv(&mut buf).await?;
        let response = Message::from_bytes(&buf[..len])?;

        if response.id() != request.id() {
            return Err(ExchangeError::UnexpectedId {
                want: request.id(),
                got: response.id(),
            });
        }

        Ok(response)
    }
}

struct CachedExchange {
    inner: Arc<dyn Exchange>,
    cache: Arc<dyn Cache>,
}

#[async_trait]
impl Exchange for CachedExchange {
    async fn exchange(&self, request: Message) -> Result<Message, ExchangeError> {
        if let Some(response) = self.cache.get(&request) {
            tracing::debug!("response cache hit for request {}", request.id());
            return Ok(response);
        }

        let response = self.inner.exchange(request.clone()).await?;
        self.cache.add(&request, &response);
        Ok(response)
    }
}

/// Wraps an exchange with a request-keyed response cache. Hits skip the
/// inner exchange entirely; successful responses are offered to the cache
/// on the way out.
pub fn wrap_exchange_with_cache(
    exchange: Arc<dyn Exchange>,
    cache: Arc<dyn Cache>,
) -> Arc<dyn Exchange> {
    Arc::new(CachedExchange {
        inner: exchange,
        cache,
    })
}
