//! # Login Server
//!
//! Reactor handler that frames inbound bytes, runs each request through the
//! session state machine and queues the replies.
//!
//! One [`Session`] lives in each connection's registry entry. Any framing error
//! is a protocol desynchronization and drops the connection; other peers are
//! unaffected.

use std::io;
use std::mem;
use std::net::{SocketAddr, TcpListener};
use std::os::fd::{FromRawFd, RawFd};

use tracing::{debug, error, info, instrument, warn};

use crate::config::AppConfig;
use crate::core::stream_buffer::StreamBuffer;
use crate::error::{ProtocolError, Result};
use crate::protocol::framer;
use crate::protocol::message::Message;
use crate::protocol::session::{Authenticator, Session};
use crate::reactor::{Control, Handler, Reactor, Termination};
use crate::store::{CredentialStore, Whitelist};
use crate::utils::security::{HashParams, Security};

pub const NOT_WHITELISTED: &str = "You are not permitted to connect.\n";

/// Server-side [`Handler`] for the login protocol
pub struct LoginServer {
    store: CredentialStore,
    whitelist: Option<Whitelist>,
    security: Security,
    max_attempts: u8,
}

impl LoginServer {
    pub fn new(store: CredentialStore, security: Security, max_attempts: u8) -> Self {
        Self {
            store,
            whitelist: None,
            security,
            max_attempts,
        }
    }

    /// Only peers whose IP is a row of `whitelist` are served
    pub fn with_whitelist(mut self, whitelist: Whitelist) -> Self {
        self.whitelist = Some(whitelist);
        self
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let delimiter = config.store.delimiter_byte();
        let store = CredentialStore::with_delimiter(&config.store.passwd_path, delimiter);
        let security = Security::new(HashParams::from(&config.security));
        let server = Self::new(store, security, config.security.max_attempts);
        match &config.store.whitelist_path {
            Some(path) => server.with_whitelist(Whitelist::with_delimiter(path, delimiter)),
            None => server,
        }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    fn peer_allowed(&self, peer: &SocketAddr) -> bool {
        let Some(whitelist) = &self.whitelist else {
            return true;
        };
        whitelist
            .allows(&peer.ip().to_string())
            .unwrap_or_else(|e| {
                warn!(error = %e, "Whitelist lookup failed, refusing peer");
                false
            })
    }
}

impl Handler<Session> for LoginServer {
    fn on_accept(&mut self, fd: RawFd, peer: SocketAddr, control: &mut Control) -> Session {
        if !self.peer_allowed(&peer) {
            info!(fd, %peer, "Peer not whitelisted");
            if let Err(e) = control.send_message(fd, &Message::display(NOT_WHITELISTED)) {
                debug!(fd, error = %e, "Failed to queue refusal");
            }
            control.disconnect(fd);
        }
        Session::new(peer)
    }

    fn on_data(
        &mut self,
        fd: RawFd,
        session: &mut Session,
        inbound: &mut StreamBuffer,
        control: &mut Control,
    ) {
        let auth = Authenticator::new(&self.store, &self.security, self.max_attempts);
        loop {
            let message = match framer::get(inbound) {
                Ok(Some(message)) => message,
                Ok(None) => return,
                Err(e) => {
                    warn!(fd, error = %e, "Protocol desynchronization, dropping peer");
                    control.disconnect(fd);
                    return;
                }
            };

            debug!(fd, opcode = message.opcode_byte(), "Received message");
            let reply = auth.handle(session, message);
            for outgoing in &reply.messages {
                if let Err(e) = control.send_message(fd, outgoing) {
                    error!(fd, error = %e, "Failed to encode reply");
                }
            }
            if reply.disconnect {
                control.disconnect(fd);
                return;
            }
        }
    }

    fn on_close(&mut self, fd: RawFd, session: &mut Session, _control: &mut Control) {
        if let Some(peer) = session.peer() {
            info!(fd, %peer, username = session.username(), "Session ended");
        }
    }
}

/// Bind a non-blocking listener with `SO_REUSEADDR` and the requested backlog
pub fn listen(address: SocketAddr, backlog: u32) -> io::Result<TcpListener> {
    let domain = match address {
        SocketAddr::V4(_) => libc::AF_INET,
        SocketAddr::V6(_) => libc::AF_INET6,
    };

    // SAFETY: plain socket creation; ownership passes to the TcpListener below
    let fd = unsafe {
        libc::socket(
            domain,
            libc::SOCK_STREAM | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
            0,
        )
    };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: fd is a freshly created socket owned by nobody else
    let listener = unsafe { TcpListener::from_raw_fd(fd) };

    let one: libc::c_int = 1;
    // SAFETY: option value points at a live c_int of the advertised size
    let rc = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            &one as *const libc::c_int as *const libc::c_void,
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }

    let (storage, len) = socket_address(&address);
    // SAFETY: storage holds a sockaddr of `len` bytes matching `domain`
    if unsafe { libc::bind(fd, &storage as *const _ as *const libc::sockaddr, len) } != 0 {
        return Err(io::Error::last_os_error());
    }

    let backlog = libc::c_int::try_from(backlog).unwrap_or(libc::c_int::MAX);
    // SAFETY: fd is a bound stream socket
    if unsafe { libc::listen(fd, backlog) } != 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(listener)
}

fn socket_address(address: &SocketAddr) -> (libc::sockaddr_storage, libc::socklen_t) {
    // SAFETY: all-zero is a valid sockaddr_storage
    let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
    let len = match address {
        SocketAddr::V4(v4) => {
            // SAFETY: zero-initialise padding fields before filling the rest
            let mut sin: libc::sockaddr_in = unsafe { mem::zeroed() };
            sin.sin_family = libc::AF_INET as libc::sa_family_t;
            sin.sin_port = v4.port().to_be();
            sin.sin_addr = libc::in_addr {
                s_addr: u32::from_ne_bytes(v4.ip().octets()),
            };
            // SAFETY: sockaddr_storage is large and aligned enough for any sockaddr
            unsafe { (&mut storage as *mut libc::sockaddr_storage as *mut libc::sockaddr_in).write(sin) };
            mem::size_of::<libc::sockaddr_in>()
        }
        SocketAddr::V6(v6) => {
            // SAFETY: as above
            let mut sin6: libc::sockaddr_in6 = unsafe { mem::zeroed() };
            sin6.sin6_family = libc::AF_INET6 as libc::sa_family_t;
            sin6.sin6_port = v6.port().to_be();
            sin6.sin6_flowinfo = v6.flowinfo();
            sin6.sin6_addr = libc::in6_addr {
                s6_addr: v6.ip().octets(),
            };
            sin6.sin6_scope_id = v6.scope_id();
            // SAFETY: as above
            unsafe { (&mut storage as *mut libc::sockaddr_storage as *mut libc::sockaddr_in6).write(sin6) };
            mem::size_of::<libc::sockaddr_in6>()
        }
    };
    (storage, len as libc::socklen_t)
}

/// Parse, bind and register the listening socket
pub fn bind(reactor: &mut Reactor<Session>, address: &str, backlog: u32) -> Result<SocketAddr> {
    let address: SocketAddr = address
        .parse()
        .map_err(|e| ProtocolError::ConfigError(format!("invalid bind address '{address}': {e}")))?;
    let listener = listen(address, backlog)?;
    let local = listener.local_addr()?;
    reactor.add_listener(listener, Session::default())?;
    info!(address = %local, "Listening");
    Ok(local)
}

/// Build the reactor from `config` and serve until stopped or signalled
#[instrument(skip(config), fields(address = %config.server.address))]
pub fn serve(config: &AppConfig) -> Result<Termination> {
    let mut reactor = Reactor::new()
        .with_read_chunk(config.server.read_chunk)
        .with_connection_limit(config.server.max_connections);
    bind(&mut reactor, &config.server.address, config.server.backlog)?;

    let mut server = LoginServer::from_config(config);
    let termination = reactor.run(&mut server);
    reactor.shutdown();
    Ok(termination)
}
