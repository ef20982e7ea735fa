//! # Interactive Client
//!
//! Runs the login prompt on the same reactor as the server connection: the
//! socket and the local terminal are both registered descriptors.
//!
//! - socket frames feed [`Prompt::on_message`]
//! - typed lines feed [`Prompt::on_input`]
//! - printed text is queued on the terminal connection, whose local-echo
//!   strategy writes it to the output descriptor
//!
//! When the server closes the connection the loop stops.

use std::net::{SocketAddr, TcpStream};
use std::os::fd::{AsRawFd, RawFd};

use tracing::{debug, info, instrument, warn};

use crate::config::ClientConfig;
use crate::core::stream_buffer::StreamBuffer;
use crate::error::{ProtocolError, Result};
use crate::protocol::framer;
use crate::protocol::prompt::{ClientAction, Prompt};
use crate::reactor::{Command, Connection, Control, Handler, Reactor, Strategy, Termination};
use crate::utils::terminal;

/// Client-side [`Handler`] bridging the socket, the terminal and the prompt
pub struct InteractiveClient {
    socket: RawFd,
    input: RawFd,
    prompt: Prompt,
}

impl InteractiveClient {
    /// Register `stream` and the local `input`/`output` pair with `reactor`
    /// and queue the first prompt.
    ///
    /// # Safety
    /// `input` must be non-blocking, and both descriptors must stay open for as
    /// long as the reactor holds them. They are never closed here.
    pub unsafe fn attach(
        reactor: &mut Reactor<()>,
        stream: TcpStream,
        input: RawFd,
        output: RawFd,
    ) -> Result<Self> {
        let socket = reactor.add_stream(stream, ())?;
        reactor.register(Connection::new(Strategy::local_echo(input, output), ()));

        let mut client = Self {
            socket,
            input,
            prompt: Prompt::new(),
        };
        let mut control = Control::new();
        let actions = client.prompt.start();
        client.apply(actions, &mut control);
        for command in control.take() {
            if let Command::Send(fd, segment) = command {
                reactor.queue_write(fd, segment);
            }
        }
        Ok(client)
    }

    pub fn prompt(&self) -> &Prompt {
        &self.prompt
    }

    fn apply(&mut self, actions: Vec<ClientAction>, control: &mut Control) {
        for action in actions {
            match action {
                ClientAction::Send(message) => {
                    if let Err(e) = control.send_message(self.socket, &message) {
                        warn!(error = %e, "Failed to encode request");
                        control.send(self.input, format!("{e}\n"));
                    }
                }
                ClientAction::Print(text) => control.send(self.input, text),
                ClientAction::SetEcho(enabled) => {
                    if let Err(e) = terminal::set_echo(self.input, enabled) {
                        warn!(error = %e, "Failed to change terminal echo");
                    }
                }
                ClientAction::Exit => {
                    info!("Exit requested");
                    control.stop();
                }
            }
        }
    }

    fn on_socket_data(&mut self, inbound: &mut StreamBuffer, control: &mut Control) {
        loop {
            match framer::get(inbound) {
                Ok(Some(message)) => {
                    debug!(opcode = message.opcode_byte(), "Received message");
                    let actions = self.prompt.on_message(message);
                    self.apply(actions, control);
                }
                Ok(None) => return,
                Err(e) => {
                    warn!(error = %e, "Protocol desynchronization, closing connection");
                    control.disconnect(self.socket);
                    return;
                }
            }
        }
    }

    fn on_input_data(&mut self, inbound: &mut StreamBuffer, control: &mut Control) {
        let is_terminator = |b: u8| b == b'\r' || b == b'\n';
        loop {
            while inbound.at(0).is_some_and(is_terminator) {
                inbound.consume(1);
            }
            let Some(end) = inbound.position(is_terminator) else {
                return;
            };
            let line = inbound.take(end).unwrap_or_default();
            inbound.consume(1);

            let line = String::from_utf8_lossy(&line);
            let actions = self.prompt.on_input(&line);
            self.apply(actions, control);
        }
    }
}

impl Handler<()> for InteractiveClient {
    fn on_accept(&mut self, fd: RawFd, peer: SocketAddr, control: &mut Control) {
        warn!(fd, %peer, "Client does not accept connections");
        control.disconnect(fd);
    }

    fn on_data(&mut self, fd: RawFd, _data: &mut (), inbound: &mut StreamBuffer, control: &mut Control) {
        if fd == self.socket {
            self.on_socket_data(inbound, control);
        } else if fd == self.input {
            self.on_input_data(inbound, control);
        }
    }

    fn on_close(&mut self, fd: RawFd, _data: &mut (), control: &mut Control) {
        if fd == self.socket {
            info!("Server closed the connection");
            control.stop();
        } else if fd == self.input {
            info!("Input closed");
            control.stop();
        }
    }
}

/// Open the connection to the server within the configured timeout
#[instrument(skip(config), fields(address = %config.address))]
pub fn connect(config: &ClientConfig) -> Result<TcpStream> {
    let address: SocketAddr = config.address.parse().map_err(|e| {
        ProtocolError::ConfigError(format!("invalid server address '{}': {e}", config.address))
    })?;
    let stream = TcpStream::connect_timeout(&address, config.connect_timeout)?;
    stream.set_nodelay(true)?;
    info!(fd = stream.as_raw_fd(), "Connected");
    Ok(stream)
}

/// Puts a descriptor in non-blocking mode and restores its flags on drop
pub struct NonBlocking {
    fd: RawFd,
    flags: libc::c_int,
}

impl NonBlocking {
    pub fn enable(fd: RawFd) -> Result<Self> {
        // SAFETY: fcntl only reads and sets status flags
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
        if flags < 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        // SAFETY: as above
        if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        Ok(Self { fd, flags })
    }
}

impl Drop for NonBlocking {
    fn drop(&mut self) {
        // SAFETY: restores the flags captured in `enable`
        unsafe {
            libc::fcntl(self.fd, libc::F_SETFL, self.flags);
        }
    }
}

/// Connect and run the interactive prompt on stdin/stdout until exit
pub fn run(config: &ClientConfig) -> Result<Termination> {
    let stream = connect(config)?;
    let input = libc::STDIN_FILENO;
    let output = libc::STDOUT_FILENO;
    let _nonblocking = NonBlocking::enable(input)?;

    let mut reactor = Reactor::new();
    // SAFETY: stdin/stdout outlive the reactor and stdin was made non-blocking above
    let mut client = unsafe { InteractiveClient::attach(&mut reactor, stream, input, output)? };
    let termination = reactor.run(&mut client);
    reactor.shutdown();

    if let Err(e) = terminal::set_echo(input, true) {
        warn!(error = %e, "Failed to restore terminal echo");
    }
    Ok(termination)
}
