//! # Remote Client
//!
//! Async counterpart of the interactive client: the same frames over
//! `Framed<TcpStream, MessageCodec>`, with connect and response timeouts.

use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{debug, instrument};

use crate::config::ClientConfig;
use crate::core::codec::MessageCodec;
use crate::error::{ProtocolError, Result};
use crate::protocol::message::Message;

/// Scripted async client for the login protocol
///
/// Speaks the same frames as the interactive client but drives them through
/// `Framed<TcpStream, MessageCodec>`, which suits tests and automation.
pub struct RemoteClient {
    framed: Framed<TcpStream, MessageCodec>,
    response_timeout: Duration,
}

impl RemoteClient {
    /// Connect using the addresses and timeouts in `config`
    #[instrument(skip(config), fields(address = %config.address))]
    pub async fn connect_with_config(config: &ClientConfig) -> Result<Self> {
        Self::connect(&config.address, config.connect_timeout, config.response_timeout).await
    }

    /// Connect to `addr`, failing with [`ProtocolError::ConnectionTimeout`]
    /// if the handshake does not finish in `connect_timeout`
    #[instrument]
    pub async fn connect(
        addr: &str,
        connect_timeout: Duration,
        response_timeout: Duration,
    ) -> Result<Self> {
        let stream = timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| ProtocolError::ConnectionTimeout)??;
        stream.set_nodelay(true)?;
        debug!("Connected");

        Ok(Self {
            framed: Framed::new(stream, MessageCodec),
            response_timeout,
        })
    }

    pub async fn send(&mut self, message: Message) -> Result<()> {
        self.framed.send(message).await
    }

    /// Next message from the server
    pub async fn recv(&mut self) -> Result<Message> {
        match timeout(self.response_timeout, self.framed.next()).await {
            Ok(Some(result)) => result,
            Ok(None) => Err(ProtocolError::ConnectionClosed),
            Err(_) => Err(ProtocolError::Timeout),
        }
    }

    /// Receive until `done` matches, returning every message including the last
    pub async fn recv_until<F>(&mut self, done: F) -> Result<Vec<Message>>
    where
        F: Fn(&Message) -> bool,
    {
        let mut received = Vec::new();
        loop {
            let message = self.recv().await?;
            let finished = done(&message);
            received.push(message);
            if finished {
                return Ok(received);
            }
        }
    }

    /// Username then password; `Ok(true)` once authenticated
    #[instrument(skip(self, password))]
    pub async fn login(&mut self, username: &str, password: &str) -> Result<bool> {
        self.send(Message::LoginSetUsername(username.to_string())).await?;
        let replies = self
            .recv_until(|m| matches!(m, Message::LoginSetUsernameResponse(_)))
            .await?;
        if replies.last() != Some(&Message::LoginSetUsernameResponse(true)) {
            return Ok(false);
        }

        self.send(Message::LoginAuthenticate(password.to_string())).await?;
        let replies = self
            .recv_until(|m| matches!(m, Message::LoginAuthenticateResponse(_)))
            .await?;
        Ok(replies.last() == Some(&Message::LoginAuthenticateResponse(true)))
    }

    /// Send a request and return the text of the display message it produces
    pub async fn request(&mut self, message: Message) -> Result<String> {
        self.send(message).await?;
        match self.recv().await? {
            Message::DisplayMessage(text) => Ok(text),
            _ => Err(ProtocolError::UnexpectedMessage),
        }
    }

    /// `Ok(true)` when the server acknowledged the new password
    pub async fn change_password(&mut self, password: &str) -> Result<bool> {
        self.send(Message::LoginSetPassword(password.to_string())).await?;
        let replies = self
            .recv_until(|m| matches!(m, Message::LoginSetPasswordResponse(_)))
            .await?;
        Ok(replies.last() == Some(&Message::LoginSetPasswordResponse(true)))
    }

    /// Flush pending frames and shut the write half
    pub async fn close(mut self) -> Result<()> {
        SinkExt::<Message>::close(&mut self.framed).await
    }
}
