//! # Connection
//!
//! One descriptor, its inbound and outbound [`StreamBuffer`]s, a read/write/close
//! strategy and the application record the reactor hands to callbacks.
//!
//! ## Strategies
//! - **Default**: plain non-blocking stream read/write, close drops the socket
//! - **Listener**: read accepts one peer, write always fails
//! - **LocalEcho**: reads an interactive input descriptor and writes to a
//!   different output descriptor; close leaves both descriptors open
//!
//! Ownership is exclusive: moving a `Connection` moves its descriptor, and the
//! close strategy runs exactly once, either on explicit [`Connection::close`] or on drop.

use std::fs::File;
use std::io::{self, Read, Write};
use std::mem::ManuallyDrop;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::fd::{AsRawFd, FromRawFd, RawFd};

use tracing::{debug, warn};

use crate::core::segment::Segment;
use crate::core::stream_buffer::StreamBuffer;
use crate::error::constants;

/// Read/write/close behavior selected when the connection is created
#[derive(Debug)]
pub enum Strategy {
    Default(TcpStream),
    Listener(TcpListener),
    LocalEcho {
        input: ManuallyDrop<File>,
        output: ManuallyDrop<File>,
    },
}

impl Strategy {
    /// Wrap borrowed input/output descriptors, typically stdin and stdout.
    ///
    /// # Safety
    /// Both descriptors must stay open for as long as the strategy exists. They
    /// are never closed by it.
    pub unsafe fn local_echo(input: RawFd, output: RawFd) -> Self {
        Strategy::LocalEcho {
            input: ManuallyDrop::new(File::from_raw_fd(input)),
            output: ManuallyDrop::new(File::from_raw_fd(output)),
        }
    }

    fn raw_fd(&self) -> RawFd {
        match self {
            Strategy::Default(stream) => stream.as_raw_fd(),
            Strategy::Listener(listener) => listener.as_raw_fd(),
            Strategy::LocalEcho { input, .. } => input.as_raw_fd(),
        }
    }

    /// Descriptor the write strategy targets
    fn write_fd(&self) -> RawFd {
        match self {
            Strategy::LocalEcho { output, .. } => output.as_raw_fd(),
            other => other.raw_fd(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Strategy::Default(_) => "default",
            Strategy::Listener(_) => "listener",
            Strategy::LocalEcho { .. } => "local-echo",
        }
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<usize> {
        match self {
            Strategy::Default(stream) => stream.write(bytes),
            Strategy::Listener(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                constants::ERR_LISTENER_WRITE,
            )),
            Strategy::LocalEcho { output, .. } => {
                let written = output.write(bytes)?;
                output.flush()?;
                Ok(written)
            }
        }
    }
}

/// Outcome of one read readiness
#[derive(Debug)]
pub enum ReadEvent {
    /// Bytes to append to the inbound buffer
    Data(Segment),
    /// A listener accepted a new, already non-blocking peer
    Accepted(TcpStream, SocketAddr),
    /// Nothing to do this cycle
    Idle,
    /// End of stream or a fatal read error; the connection must be removed
    Closed,
}

#[inline]
pub(crate) fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// A registered descriptor and everything the reactor tracks for it
#[derive(Debug)]
pub struct Connection<T> {
    pub(crate) fd: RawFd,
    pub(crate) serial: u64,
    strategy: Option<Strategy>,
    pub(crate) inbound: StreamBuffer,
    pub(crate) outbound: StreamBuffer,
    pub(crate) data: T,
}

impl<T> Connection<T> {
    pub fn new(strategy: Strategy, data: T) -> Self {
        Self {
            fd: strategy.raw_fd(),
            serial: 0,
            strategy: Some(strategy),
            inbound: StreamBuffer::new(),
            outbound: StreamBuffer::new(),
            data,
        }
    }

    #[inline]
    pub fn fd(&self) -> RawFd {
        self.fd
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut T {
        &mut self.data
    }

    pub fn inbound(&self) -> &StreamBuffer {
        &self.inbound
    }

    pub fn outbound(&self) -> &StreamBuffer {
        &self.outbound
    }

    pub fn outbound_mut(&mut self) -> &mut StreamBuffer {
        &mut self.outbound
    }

    /// Descriptor to watch for write readiness; differs from [`fd`](Self::fd)
    /// only for `LocalEcho`
    pub fn write_fd(&self) -> RawFd {
        self.strategy.as_ref().map_or(self.fd, Strategy::write_fd)
    }

    pub fn is_listener(&self) -> bool {
        matches!(self.strategy, Some(Strategy::Listener(_)))
    }

    pub fn is_closed(&self) -> bool {
        self.strategy.is_none()
    }

    /// Run the read strategy once
    pub fn do_read(&mut self, chunk: usize) -> ReadEvent {
        match self.strategy.as_mut() {
            None => ReadEvent::Closed,
            Some(Strategy::Listener(listener)) => match listener.accept() {
                Ok((stream, peer)) => match stream.set_nonblocking(true) {
                    Ok(()) => ReadEvent::Accepted(stream, peer),
                    Err(e) => {
                        warn!(error = %e, %peer, "Failed to make accepted socket non-blocking");
                        ReadEvent::Idle
                    }
                },
                Err(e) if is_transient(&e) => ReadEvent::Idle,
                Err(e) => {
                    warn!(fd = self.fd, error = %e, "Accept failed");
                    ReadEvent::Idle
                }
            },
            Some(Strategy::Default(stream)) => read_chunk(self.fd, stream, chunk),
            Some(Strategy::LocalEcho { input, .. }) => read_chunk(self.fd, &mut **input, chunk),
        }
    }

    /// Drain the outbound buffer until the write strategy would block.
    ///
    /// A short write consumes only what was written; the rest stays queued.
    /// Any error other than would-block/interrupted is returned and is fatal
    /// for the connection.
    pub fn do_write(&mut self) -> io::Result<usize> {
        let Some(strategy) = self.strategy.as_mut() else {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                constants::ERR_CONNECTION_CLOSED,
            ));
        };

        let mut total = 0;
        while let Some(front) = self.outbound.front() {
            match strategy.write_bytes(front.view()) {
                Ok(0) => break,
                Ok(n) => {
                    total += n;
                    self.outbound.consume(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    }

    /// Run the close strategy. Returns `false` if it already ran.
    pub fn close(&mut self) -> bool {
        match self.strategy.take() {
            Some(strategy) => {
                debug!(fd = self.fd, strategy = strategy.name(), "Closing descriptor");
                drop(strategy);
                true
            }
            None => false,
        }
    }
}

impl<T> Drop for Connection<T> {
    fn drop(&mut self) {
        self.close();
    }
}

fn read_chunk(fd: RawFd, src: &mut impl Read, chunk: usize) -> ReadEvent {
    let mut buf = vec![0u8; chunk];
    match src.read(&mut buf) {
        Ok(0) => ReadEvent::Closed,
        Ok(n) => {
            buf.truncate(n);
            ReadEvent::Data(Segment::from(buf))
        }
        Err(e) if is_transient(&e) => ReadEvent::Idle,
        Err(e) => {
            debug!(fd, error = %e, "Read failed");
            ReadEvent::Closed
        }
    }
}
