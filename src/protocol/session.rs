//! # Session
//!
//! Per-connection login state and the server-side rules that turn one request
//! into replies.
//!
//! ```text
//! Unauthenticated --username found--> UsernameVerified --password ok--> Authenticated
//! ```
//!
//! The state only moves forward. The failed-attempt counter lives in the
//! session, so it resets only when the peer reconnects.
//!
//! Every transition returns a [`Reply`]: the messages to queue, in order, and
//! whether the connection must be dropped once they are flushed.

use std::net::SocketAddr;

use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::error::constants;
use crate::protocol::message::Message;
use crate::store::{Credential, RowStore};
use crate::utils::security::Security;

/// Commands the server advertises after login
pub const MENU: &str = "Available Commands:\n\
    \x20   hello      Custom server greeting\n\
    \x20   1,2,3,4,5  Each number provides a different message\n\
    \x20   passwd     Change your password\n\
    \x20   menu       Displays this menu\n\
    \x20   exit       Disconnects you from the server\n";

pub const PASSWORD_CHANGED: &str = "Password changed.\n";
pub const PASSWORD_UNCHANGED: &str = "Password could not be changed.\n";

/// Text shown once a password is accepted
pub fn greeting() -> String {
    format!("Welcome!\n\n{MENU}")
}

/// Where a session stands in the login sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AuthState {
    Unauthenticated,
    UsernameVerified,
    Authenticated,
}

/// Login record owned by one server connection
#[derive(Debug, Clone, Default)]
pub struct Session {
    username: String,
    username_verified: bool,
    password_verified: bool,
    failed_attempts: u8,
    peer: Option<SocketAddr>,
}

impl Session {
    pub fn new(peer: SocketAddr) -> Self {
        Self {
            peer: Some(peer),
            ..Self::default()
        }
    }

    pub fn state(&self) -> AuthState {
        match (self.username_verified, self.password_verified) {
            (true, true) => AuthState::Authenticated,
            (true, false) => AuthState::UsernameVerified,
            _ => AuthState::Unauthenticated,
        }
    }

    /// Verified username, empty before verification
    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn failed_attempts(&self) -> u8 {
        self.failed_attempts
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == AuthState::Authenticated
    }
}

/// Messages to queue and whether to drop the connection afterwards
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub messages: Vec<Message>,
    pub disconnect: bool,
}

impl Reply {
    fn send(messages: impl IntoIterator<Item = Message>) -> Self {
        Self {
            messages: messages.into_iter().collect(),
            disconnect: false,
        }
    }

    fn send_and_close(messages: impl IntoIterator<Item = Message>) -> Self {
        Self {
            messages: messages.into_iter().collect(),
            disconnect: true,
        }
    }

    fn not_logged_in() -> Self {
        Self::send_and_close([Message::display(constants::ERR_NOT_LOGGED_IN)])
    }

    fn unknown() -> Self {
        Self::send([Message::display(constants::ERR_UNKNOWN_MESSAGE)])
    }
}

/// Applies the login rules against a credential store
pub struct Authenticator<'a, S> {
    store: &'a S,
    security: &'a Security,
    max_attempts: u8,
}

impl<'a, S: RowStore<3>> Authenticator<'a, S> {
    pub fn new(store: &'a S, security: &'a Security, max_attempts: u8) -> Self {
        Self {
            store,
            security,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Run one decoded request through the state machine
    pub fn handle(&self, session: &mut Session, message: Message) -> Reply {
        match message {
            Message::LoginSetUsername(name) => self.submit_username(session, name),
            Message::LoginAuthenticate(password) => {
                self.authenticate(session, Zeroizing::new(password))
            }
            Message::LoginSetPassword(password) => {
                self.change_password(session, Zeroizing::new(password))
            }
            Message::Hello => self.protected(session, "Hello there.\n"),
            Message::Generic1 => self.protected(session, "So uncivilized\n"),
            Message::Generic2 => self.protected(
                session,
                "I don't like sand. It's coarse and rough and irritating... and it gets everywhere\n",
            ),
            Message::Generic3 => self.protected(session, "Now this is podracing\n"),
            Message::Generic4 => self.protected(session, "I AM the Senate.\n"),
            Message::Generic5 => self.protected(session, "*kills younglings*\n"),
            Message::Menu => self.protected(session, MENU),
            Message::Unknown { opcode } => {
                debug!(opcode, "Skipping unknown message");
                Reply::unknown()
            }
            other => {
                debug!(opcode = other.opcode_byte(), "Client sent a server-bound message");
                Reply::unknown()
            }
        }
    }

    fn lookup(&self, username: &str) -> Option<Credential> {
        match self.store.find(|row| row[0] == username) {
            Ok(row) => row.map(Credential::from),
            Err(e) => {
                warn!(error = %e, "Credential lookup failed");
                None
            }
        }
    }

    fn submit_username(&self, session: &mut Session, name: String) -> Reply {
        if session.username_verified {
            debug!(username = %session.username, "Username already verified");
            return Reply::send([Message::LoginSetUsernameResponse(false)]);
        }

        match self.lookup(&name) {
            Some(_) => {
                info!(username = %name, peer = ?session.peer, "Username verified");
                let prompt = Message::display(format!("Hello, {name}.\n"));
                session.username = name;
                session.username_verified = true;
                Reply::send([prompt, Message::LoginSetUsernameResponse(true)])
            }
            None => {
                info!(username = %name, peer = ?session.peer, "Unknown username");
                Reply::send_and_close([Message::LoginSetUsernameResponse(false)])
            }
        }
    }

    fn authenticate(&self, session: &mut Session, password: Zeroizing<String>) -> Reply {
        match session.state() {
            AuthState::Unauthenticated => return Reply::not_logged_in(),
            AuthState::Authenticated => {
                return Reply::send([
                    Message::display("You are already logged in.\n"),
                    Message::LoginAuthenticateResponse(true),
                ]);
            }
            AuthState::UsernameVerified => {}
        }

        let verified = self.lookup(&session.username).is_some_and(|credential| {
            self.security
                .verify(&password, &credential.salt, &credential.hash)
                .unwrap_or_else(|e| {
                    warn!(error = %e, "Password hashing failed");
                    false
                })
        });

        if verified {
            session.password_verified = true;
            info!(username = %session.username, "Authenticated");
            return Reply::send([
                Message::display(greeting()),
                Message::LoginAuthenticateResponse(true),
            ]);
        }

        session.failed_attempts = session.failed_attempts.saturating_add(1);
        let remaining = self.max_attempts.saturating_sub(session.failed_attempts);
        warn!(
            username = %session.username,
            attempts = session.failed_attempts,
            remaining,
            "Incorrect password"
        );

        let messages = [
            Message::display(format!(
                "Incorrect password. {remaining} attempt(s) remaining.\n"
            )),
            Message::LoginAuthenticateResponse(false),
        ];
        if remaining == 0 {
            Reply::send_and_close(messages)
        } else {
            Reply::send(messages)
        }
    }

    fn change_password(&self, session: &mut Session, password: Zeroizing<String>) -> Reply {
        if !session.is_authenticated() {
            return Reply::not_logged_in();
        }

        let Some(credential) = self.lookup(&session.username) else {
            return Reply::send([
                Message::LoginSetPasswordResponse(false),
                Message::display(PASSWORD_UNCHANGED),
            ]);
        };

        let hash = match self.security.hash(&password, &credential.salt) {
            Ok(hash) => hash,
            Err(e) => {
                warn!(error = %e, "Password hashing failed");
                return Reply::send([
                    Message::LoginSetPasswordResponse(false),
                    Message::display(PASSWORD_UNCHANGED),
                ]);
            }
        };

        let username = session.username.clone();
        let updated = self.store.update(|row| {
            if row[0] == username {
                [row[0].clone(), row[1].clone(), hash.clone()]
            } else {
                row.clone()
            }
        });

        match updated {
            Ok(true) => {
                info!(username = %session.username, "Password changed");
                Reply::send([
                    Message::LoginSetPasswordResponse(true),
                    Message::display(PASSWORD_CHANGED),
                ])
            }
            Ok(false) => {
                warn!(username = %session.username, "Password update changed no rows");
                Reply::send([
                    Message::LoginSetPasswordResponse(false),
                    Message::display(PASSWORD_UNCHANGED),
                ])
            }
            Err(e) => {
                warn!(username = %session.username, error = %e, "Password update failed");
                Reply::send([
                    Message::LoginSetPasswordResponse(false),
                    Message::display(PASSWORD_UNCHANGED),
                ])
            }
        }
    }

    fn protected(&self, session: &Session, text: &str) -> Reply {
        if session.is_authenticated() {
            Reply::send([Message::display(text)])
        } else {
            Reply::not_logged_in()
        }
    }
}
