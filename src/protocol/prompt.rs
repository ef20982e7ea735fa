//! # Prompt
//!
//! Client-side state for the interactive login and password-change flows.
//!
//! The prompt never performs I/O. Each input line or server message yields a
//! list of [`ClientAction`]s that the client applies in order.
//!
//! ```text
//! connect -> AwaitingUsername --ack(true)--> AwaitingPassword --ack(true)--> None
//!                                                  ^   |
//!                                                  +---+ ack(false)
//! None --passwd--> AwaitingNewPassword1 --> AwaitingNewPassword2 --> None
//! ```

use zeroize::Zeroizing;

use crate::error::constants;
use crate::protocol::message::Message;

pub const USERNAME_PROMPT: &str = "Username: ";
pub const PASSWORD_PROMPT: &str = "Password: ";
pub const NEW_PASSWORD_PROMPT: &str = "New password: ";
pub const REPEAT_PASSWORD_PROMPT: &str = "Repeat new password: ";

/// What the prompt expects the next input line to be
#[derive(Debug, Default)]
pub enum PromptState {
    /// Free commands
    #[default]
    None,
    AwaitingUsername,
    AwaitingPassword,
    AwaitingNewPassword1,
    /// Holds the first entry until the second arrives
    AwaitingNewPassword2 { first: Zeroizing<String> },
}

/// Effect requested by the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    Send(Message),
    Print(String),
    SetEcho(bool),
    Exit,
}

#[derive(Debug, Default)]
pub struct Prompt {
    state: PromptState,
}

impl Prompt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &PromptState {
        &self.state
    }

    /// Begin the login sequence right after connecting
    pub fn start(&mut self) -> Vec<ClientAction> {
        self.state = PromptState::AwaitingUsername;
        vec![ClientAction::Print(USERNAME_PROMPT.to_string())]
    }

    /// Handle one line typed by the user, without its line terminator
    pub fn on_input(&mut self, line: &str) -> Vec<ClientAction> {
        match std::mem::take(&mut self.state) {
            PromptState::None => self.command(line),
            PromptState::AwaitingUsername => {
                // Stay here until the server answers
                self.state = PromptState::AwaitingUsername;
                vec![ClientAction::Send(Message::LoginSetUsername(line.to_string()))]
            }
            PromptState::AwaitingPassword => {
                self.state = PromptState::AwaitingPassword;
                vec![
                    ClientAction::Print("\n".to_string()),
                    ClientAction::Send(Message::LoginAuthenticate(line.to_string())),
                ]
            }
            PromptState::AwaitingNewPassword1 => {
                self.state = PromptState::AwaitingNewPassword2 {
                    first: Zeroizing::new(line.to_string()),
                };
                vec![ClientAction::Print(format!("\n{REPEAT_PASSWORD_PROMPT}"))]
            }
            PromptState::AwaitingNewPassword2 { first } => {
                if first.as_str() == line {
                    vec![
                        ClientAction::Print("\n".to_string()),
                        ClientAction::SetEcho(true),
                        ClientAction::Send(Message::LoginSetPassword(line.to_string())),
                    ]
                } else {
                    vec![
                        ClientAction::Print("\nPasswords do not match.\n".to_string()),
                        ClientAction::SetEcho(true),
                    ]
                }
            }
        }
    }

    /// Handle one message decoded from the server
    pub fn on_message(&mut self, message: Message) -> Vec<ClientAction> {
        match message {
            Message::DisplayMessage(text) => vec![ClientAction::Print(text)],
            Message::LoginSetUsernameResponse(true) => {
                self.state = PromptState::AwaitingPassword;
                vec![
                    ClientAction::SetEcho(false),
                    ClientAction::Print(PASSWORD_PROMPT.to_string()),
                ]
            }
            Message::LoginSetUsernameResponse(false) => {
                self.state = PromptState::None;
                vec![ClientAction::Print("Username not accepted.\n".to_string())]
            }
            Message::LoginAuthenticateResponse(true) => {
                self.state = PromptState::None;
                vec![ClientAction::SetEcho(true)]
            }
            Message::LoginAuthenticateResponse(false) => {
                self.state = PromptState::AwaitingPassword;
                vec![
                    ClientAction::SetEcho(false),
                    ClientAction::Print(PASSWORD_PROMPT.to_string()),
                ]
            }
            // The server follows up with a display message
            Message::LoginSetPasswordResponse(_) => Vec::new(),
            _ => vec![ClientAction::Print(format!(
                "{}\n",
                constants::ERR_UNKNOWN_MESSAGE
            ))],
        }
    }

    fn command(&mut self, line: &str) -> Vec<ClientAction> {
        let send = |message| vec![ClientAction::Send(message)];
        match line {
            "hello" => send(Message::Hello),
            "1" => send(Message::Generic1),
            "2" => send(Message::Generic2),
            "3" => send(Message::Generic3),
            "4" => send(Message::Generic4),
            "5" => send(Message::Generic5),
            "menu" => send(Message::Menu),
            "passwd" => {
                self.state = PromptState::AwaitingNewPassword1;
                vec![
                    ClientAction::SetEcho(false),
                    ClientAction::Print(NEW_PASSWORD_PROMPT.to_string()),
                ]
            }
            "exit" => vec![ClientAction::Exit],
            "" => Vec::new(),
            other => vec![ClientAction::Print(format!("Unknown input: '{other}'\n"))],
        }
    }
}
