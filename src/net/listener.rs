//! Bounded TCP listeners, one per transport.
//!
//! # Responsibilities
//! - Bind the secure or insecure address
//! - Hold one slot per open connection (`max_connections`)
//! - Tag accepted sockets with the listener's transport
//!
//! # Design Decisions
//! - A slot is taken before `accept`, so a saturated listener leaves new
//!   sockets in the kernel backlog instead of accepting and dropping them
//! - Saturation is logged once per episode

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

use crate::http::request::Transport;

#[derive(Debug)]
pub enum ListenerError {
    Bind(std::io::Error),
    Accept(std::io::Error),
    /// The slot semaphore was closed.
    Closed,
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Bind(e) => write!(f, "bind failed: {}", e),
            ListenerError::Accept(e) => write!(f, "accept failed: {}", e),
            ListenerError::Closed => write!(f, "listener closed"),
        }
    }
}

impl std::error::Error for ListenerError {}

pub struct Listener {
    socket: TcpListener,
    slots: Arc<Semaphore>,
    capacity: usize,
    transport: Transport,
    saturated: AtomicBool,
}

impl Listener {
    pub async fn bind(
        address: &str,
        max_connections: usize,
        transport: Transport,
    ) -> Result<Self, ListenerError> {
        let addr: SocketAddr = address.parse().map_err(|e| {
            ListenerError::Bind(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
        })?;
        let socket = TcpListener::bind(addr).await.map_err(ListenerError::Bind)?;
        let bound = socket.local_addr().map_err(ListenerError::Bind)?;

        tracing::info!(
            address = %bound,
            transport = transport.as_str(),
            max_connections,
            "Listener bound"
        );

        Ok(Self {
            socket,
            slots: Arc::new(Semaphore::new(max_connections)),
            capacity: max_connections,
            transport,
            saturated: AtomicBool::new(false),
        })
    }

    /// Wait for a free slot, then accept one socket.
    ///
    /// The returned permit must live as long as the connection.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit), ListenerError> {
        let permit = self.acquire_slot().await?;
        let (stream, peer) = self.socket.accept().await.map_err(ListenerError::Accept)?;

        tracing::debug!(
            peer = %peer,
            transport = self.transport.as_str(),
            free_slots = self.slots.available_permits(),
            "Connection accepted"
        );
        Ok((stream, peer, ConnectionPermit { _slot: permit }))
    }

    async fn acquire_slot(&self) -> Result<OwnedSemaphorePermit, ListenerError> {
        match Arc::clone(&self.slots).try_acquire_owned() {
            Ok(permit) => {
                self.saturated.store(false, Ordering::Relaxed);
                return Ok(permit);
            }
            Err(TryAcquireError::Closed) => return Err(ListenerError::Closed),
            Err(TryAcquireError::NoPermits) => {}
        }
        if !self.saturated.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                transport = self.transport.as_str(),
                max_connections = self.capacity,
                "Connection limit reached, new connections wait"
            );
        }
        Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Closed)
    }

    /// Stop handing out slots; pending and future `accept` calls fail with `Closed`.
    pub fn close(&self) {
        self.slots.close();
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.socket.local_addr()
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn available_permits(&self) -> usize {
        self.slots.available_permits()
    }
}

/// One connection slot, released on drop.
#[derive(Debug)]
pub struct ConnectionPermit {
    _slot: OwnedSemaphorePermit,
}
