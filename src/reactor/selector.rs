//! # Reactor
//!
//! Single-threaded readiness loop over a registry of [`Connection`]s.
//!
//! Each cycle:
//! 1. snapshot the registry in registration order
//! 2. ask for read + exceptional readiness on every descriptor, and write
//!    readiness only where the outbound buffer is non-empty (on the output
//!    descriptor for `LocalEcho` connections)
//! 3. block in `ppoll` (termination signals are unblocked only there)
//! 4. service each ready descriptor of the snapshot at most once:
//!    exceptional removes it, else readable reads it, else writable drains it
//!
//! Descriptors registered during a cycle (accepted peers) are not part of that
//! cycle's snapshot, so they are never dispatched before the next wait.
//!
//! Application code reacts through a [`Handler`] and requests output, removal or
//! shutdown through a [`Control`] that the reactor applies after the callback
//! returns.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::fd::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::core::segment::Segment;
use crate::core::stream_buffer::StreamBuffer;
use crate::error::Result;
use crate::protocol::framer;
use crate::protocol::message::Message;
use crate::reactor::connection::{Connection, ReadEvent, Strategy};
use crate::reactor::signals::{self, SignalMask};

/// Default size of a single non-blocking read
pub const DEFAULT_READ_CHUNK: usize = 1024;

/// Why the loop returned
#[derive(Debug)]
pub enum Termination {
    /// Stop was requested or nothing is left to serve
    Completed,
    /// A termination signal interrupted the wait
    Interrupted,
    /// The wait primitive failed
    Failed(io::Error),
}

impl Termination {
    pub fn is_completed(&self) -> bool {
        matches!(self, Termination::Completed)
    }
}

/// Shared stop flag, polled at the top of every loop iteration
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Deferred request issued from a callback
#[derive(Debug)]
pub enum Command {
    Send(RawFd, Segment),
    Disconnect(RawFd),
    Stop,
}

/// Collects what a callback wants done once it returns
#[derive(Debug, Default)]
pub struct Control {
    commands: Vec<Command>,
}

impl Control {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue raw bytes on the outbound buffer of `fd`
    pub fn send(&mut self, fd: RawFd, segment: impl Into<Segment>) {
        self.commands.push(Command::Send(fd, segment.into()));
    }

    /// Encode and queue a message on the outbound buffer of `fd`
    pub fn send_message(&mut self, fd: RawFd, message: &Message) -> Result<()> {
        let segment = framer::encode_segment(message)?;
        self.send(fd, segment);
        Ok(())
    }

    /// Flush what is queued for `fd` as far as possible, then remove it
    pub fn disconnect(&mut self, fd: RawFd) {
        self.commands.push(Command::Disconnect(fd));
    }

    /// End the loop after the current cycle
    pub fn stop(&mut self) {
        self.commands.push(Command::Stop);
    }

    pub fn take(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }
}

/// Application callbacks driven by the reactor
pub trait Handler<T> {
    /// A listener accepted `peer` as `fd`; return its application record
    fn on_accept(&mut self, fd: RawFd, peer: SocketAddr, control: &mut Control) -> T;

    /// New bytes arrived on `fd`.
    ///
    /// Consume only complete frames from `inbound`; a trailing partial frame
    /// must stay buffered for the next cycle.
    fn on_data(&mut self, fd: RawFd, data: &mut T, inbound: &mut StreamBuffer, control: &mut Control);

    /// `fd` is being removed; runs exactly once per connection
    fn on_close(&mut self, _fd: RawFd, _data: &mut T, _control: &mut Control) {}
}

/// The event loop and its connection registry
pub struct Reactor<T> {
    connections: Vec<Connection<T>>,
    next_serial: u64,
    read_chunk: usize,
    max_connections: Option<usize>,
    stop: StopHandle,
}

impl<T> Default for Reactor<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Reactor<T> {
    pub fn new() -> Self {
        Self {
            connections: Vec::new(),
            next_serial: 0,
            read_chunk: DEFAULT_READ_CHUNK,
            max_connections: None,
            stop: StopHandle::default(),
        }
    }

    /// Size of each non-blocking read
    pub fn with_read_chunk(mut self, read_chunk: usize) -> Self {
        self.read_chunk = read_chunk.max(1);
        self
    }

    /// Refuse accepted peers once this many connections are registered
    pub fn with_connection_limit(mut self, max_connections: usize) -> Self {
        self.max_connections = Some(max_connections);
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn start(&self) {
        self.stop.reset();
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Registered descriptors in registration order
    pub fn descriptors(&self) -> Vec<RawFd> {
        self.connections.iter().map(Connection::fd).collect()
    }

    pub fn connection(&self, fd: RawFd) -> Option<&Connection<T>> {
        self.connections.iter().find(|c| c.fd == fd)
    }

    pub fn connection_mut(&mut self, fd: RawFd) -> Option<&mut Connection<T>> {
        self.connections.iter_mut().find(|c| c.fd == fd)
    }

    /// Register a connection; returns its descriptor
    pub fn register(&mut self, mut connection: Connection<T>) -> RawFd {
        connection.serial = self.next_serial;
        self.next_serial += 1;
        let fd = connection.fd;
        debug!(fd, serial = connection.serial, "Registered descriptor");
        self.connections.push(connection);
        fd
    }

    pub fn add_listener(&mut self, listener: TcpListener, data: T) -> io::Result<RawFd> {
        listener.set_nonblocking(true)?;
        Ok(self.register(Connection::new(Strategy::Listener(listener), data)))
    }

    pub fn add_stream(&mut self, stream: TcpStream, data: T) -> io::Result<RawFd> {
        stream.set_nonblocking(true)?;
        Ok(self.register(Connection::new(Strategy::Default(stream), data)))
    }

    /// Queue bytes for `fd`; returns `false` if it is not registered
    pub fn queue_write(&mut self, fd: RawFd, segment: impl Into<Segment>) -> bool {
        match self.connection_mut(fd) {
            Some(connection) => {
                connection.outbound.append(segment);
                true
            }
            None => false,
        }
    }

    /// Move every segment of `buffer` onto the outbound buffer of `fd`
    pub fn queue_buffer(&mut self, fd: RawFd, buffer: &mut StreamBuffer) -> bool {
        match self.connection_mut(fd) {
            Some(connection) => {
                buffer.drain_into(&mut connection.outbound);
                true
            }
            None => false,
        }
    }

    /// Close every connection without running handler callbacks
    pub fn shutdown(&mut self) {
        info!(connections = self.connections.len(), "Closing all descriptors");
        self.connections.clear();
    }

    /// Run cycles until stopped, interrupted, or out of descriptors
    pub fn run<H: Handler<T>>(&mut self, handler: &mut H) -> Termination {
        let mask = match SignalMask::install() {
            Ok(mask) => mask,
            Err(e) => return Termination::Failed(e),
        };

        loop {
            if self.stop.is_stopped() || self.connections.is_empty() {
                return Termination::Completed;
            }
            if let Err(e) = self.cycle(handler, None, Some(mask.wait_mask())) {
                return classify(e);
            }
        }
    }

    /// Run exactly one cycle, waiting at most `timeout`.
    ///
    /// Signals are left as the caller configured them.
    pub fn turn<H: Handler<T>>(&mut self, handler: &mut H, timeout: Option<Duration>) -> Termination {
        match self.cycle(handler, timeout, None) {
            Ok(_) => Termination::Completed,
            Err(e) => classify(e),
        }
    }

    fn cycle<H: Handler<T>>(
        &mut self,
        handler: &mut H,
        timeout: Option<Duration>,
        mask: Option<&libc::sigset_t>,
    ) -> io::Result<usize> {
        let snapshot: Vec<(RawFd, u64)> = self.connections.iter().map(|c| (c.fd, c.serial)).collect();
        let mut interest: Vec<libc::pollfd> = Vec::with_capacity(snapshot.len());
        // Snapshot index of each entry, and whether it is a separate output descriptor
        let mut owners: Vec<(usize, bool)> = Vec::with_capacity(snapshot.len());
        for (i, c) in self.connections.iter().enumerate() {
            let wants_write = !c.outbound.is_empty();
            let write_fd = c.write_fd();
            let mut events = libc::POLLIN | libc::POLLPRI;
            if wants_write && write_fd == c.fd {
                events |= libc::POLLOUT;
            }
            interest.push(libc::pollfd {
                fd: c.fd,
                events,
                revents: 0,
            });
            owners.push((i, false));

            if wants_write && write_fd != c.fd {
                interest.push(libc::pollfd {
                    fd: write_fd,
                    events: libc::POLLOUT,
                    revents: 0,
                });
                owners.push((i, true));
            }
        }

        let ready = signals::wait_ready(&mut interest, timeout, mask)?;
        if ready == 0 {
            return Ok(0);
        }

        let mut revents: Vec<libc::c_short> = vec![0; snapshot.len()];
        for (event, &(owner, output_only)) in interest.iter().zip(&owners) {
            revents[owner] |= if output_only {
                output_events(event.revents)
            } else {
                event.revents
            };
        }

        for ((fd, serial), events) in snapshot.into_iter().zip(revents) {
            if events != 0 {
                self.dispatch(fd, serial, events, handler);
            }
        }
        Ok(ready)
    }

    fn dispatch<H: Handler<T>>(&mut self, fd: RawFd, serial: u64, revents: libc::c_short, handler: &mut H) {
        // Removed earlier in this cycle, or the descriptor number was reused
        let Some(index) = self.index_of(fd, serial) else {
            return;
        };

        if revents & (libc::POLLERR | libc::POLLNVAL | libc::POLLPRI) != 0 {
            debug!(fd, revents, "Exceptional condition");
            self.remove_at(index, handler);
        } else if revents & (libc::POLLIN | libc::POLLHUP) != 0 {
            self.handle_readable(index, handler);
        } else if revents & libc::POLLOUT != 0 {
            let connection = &mut self.connections[index];
            if let Err(e) = connection.do_write() {
                warn!(fd, error = %e, "Write failed");
                self.remove_at(index, handler);
            }
        }
    }

    fn handle_readable<H: Handler<T>>(&mut self, index: usize, handler: &mut H) {
        let read_chunk = self.read_chunk;
        let connection = &mut self.connections[index];
        let fd = connection.fd;

        match connection.do_read(read_chunk) {
            ReadEvent::Idle => {}
            ReadEvent::Closed => {
                info!(fd, "Peer closed connection");
                self.remove_at(index, handler);
            }
            ReadEvent::Accepted(stream, peer) => self.accept(stream, peer, handler),
            ReadEvent::Data(segment) => {
                connection.inbound.append(segment);
                let mut control = Control::new();
                if !connection.inbound.is_empty() {
                    handler.on_data(fd, &mut connection.data, &mut connection.inbound, &mut control);
                }
                self.apply(control, handler);
            }
        }
    }

    fn accept<H: Handler<T>>(&mut self, stream: TcpStream, peer: SocketAddr, handler: &mut H) {
        let fd = stream.as_raw_fd();
        if self
            .max_connections
            .is_some_and(|max| self.connections.len() >= max)
        {
            warn!(fd, %peer, "Connection limit reached, refusing peer");
            return;
        }

        info!(fd, %peer, "Received connection");
        let mut control = Control::new();
        let data = handler.on_accept(fd, peer, &mut control);
        self.register(Connection::new(Strategy::Default(stream), data));
        self.apply(control, handler);
    }

    fn apply<H: Handler<T>>(&mut self, mut control: Control, handler: &mut H) {
        for command in control.take() {
            match command {
                Command::Send(fd, segment) => {
                    if !self.queue_write(fd, segment) {
                        debug!(fd, "Dropping output for unregistered descriptor");
                    }
                }
                Command::Disconnect(fd) => {
                    if let Some(index) = self.connections.iter().position(|c| c.fd == fd) {
                        // Best effort: queued replies go out before the close
                        if let Err(e) = self.connections[index].do_write() {
                            debug!(fd, error = %e, "Final flush failed");
                        }
                        self.remove_at(index, handler);
                    }
                }
                Command::Stop => self.stop.stop(),
            }
        }
    }

    fn remove_at<H: Handler<T>>(&mut self, index: usize, handler: &mut H) {
        let mut connection = self.connections.remove(index);
        info!(fd = connection.fd, "Closing connection");

        let mut control = Control::new();
        handler.on_close(connection.fd, &mut connection.data, &mut control);
        connection.close();
        self.apply(control, handler);
    }

    fn index_of(&self, fd: RawFd, serial: u64) -> Option<usize> {
        self.connections
            .iter()
            .position(|c| c.fd == fd && c.serial == serial)
    }
}

/// Fold the readiness of a separate output descriptor into its connection's events
fn output_events(revents: libc::c_short) -> libc::c_short {
    let mut folded = revents & libc::POLLOUT;
    if revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 {
        folded |= libc::POLLERR;
    }
    folded
}

fn classify(e: io::Error) -> Termination {
    if e.kind() == io::ErrorKind::Interrupted {
        Termination::Interrupted
    } else {
        Termination::Failed(e)
    }
}
