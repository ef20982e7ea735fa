//! # Messages
//!
//! The closed set of message kinds carried on the wire, keyed by a one-byte opcode.
//!
//! ```text
//! [Length(2, BE, header-inclusive)] [Opcode(1)] [Payload(Length - 3)]
//! ```
//!
//! Payload shapes:
//! - request kinds (`Hello`, `Generic1`..`Generic5`, `Menu`) carry nothing
//! - string kinds carry raw UTF-8, length implied by the header, no terminator
//! - response kinds carry exactly one byte, `0` or `1`

/// Size of the fixed frame header
pub const HEADER_LEN: usize = 3;

/// Largest frame the 16-bit length field can describe
pub const MAX_FRAME_LEN: usize = u16::MAX as usize;

/// Largest string payload that fits in one frame
pub const MAX_STRING_PAYLOAD: usize = MAX_FRAME_LEN - HEADER_LEN;

/// One-byte message discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Unknown = 0,
    Hello = 1,
    Generic1 = 2,
    Generic2 = 3,
    Generic3 = 4,
    Generic4 = 5,
    Generic5 = 6,
    Menu = 7,
    DisplayMessage = 8,
    LoginSetUsername = 9,
    LoginSetUsernameResponse = 10,
    LoginSetPassword = 11,
    LoginSetPasswordResponse = 12,
    LoginAuthenticate = 13,
    LoginAuthenticateResponse = 14,
}

impl From<u8> for Opcode {
    fn from(byte: u8) -> Self {
        match byte {
            1 => Opcode::Hello,
            2 => Opcode::Generic1,
            3 => Opcode::Generic2,
            4 => Opcode::Generic3,
            5 => Opcode::Generic4,
            6 => Opcode::Generic5,
            7 => Opcode::Menu,
            8 => Opcode::DisplayMessage,
            9 => Opcode::LoginSetUsername,
            10 => Opcode::LoginSetUsernameResponse,
            11 => Opcode::LoginSetPassword,
            12 => Opcode::LoginSetPasswordResponse,
            13 => Opcode::LoginAuthenticate,
            14 => Opcode::LoginAuthenticateResponse,
            _ => Opcode::Unknown,
        }
    }
}

/// Shape of the bytes following the header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    None,
    Text,
    Flag,
}

impl Opcode {
    pub fn payload_shape(self) -> PayloadShape {
        match self {
            Opcode::Hello
            | Opcode::Generic1
            | Opcode::Generic2
            | Opcode::Generic3
            | Opcode::Generic4
            | Opcode::Generic5
            | Opcode::Menu => PayloadShape::None,
            Opcode::DisplayMessage
            | Opcode::LoginSetUsername
            | Opcode::LoginSetPassword
            | Opcode::LoginAuthenticate => PayloadShape::Text,
            Opcode::LoginSetUsernameResponse
            | Opcode::LoginSetPasswordResponse
            | Opcode::LoginAuthenticateResponse => PayloadShape::Flag,
            // Skipped by declared length; contents never inspected
            Opcode::Unknown => PayloadShape::Text,
        }
    }
}

/// A decoded message.
///
/// `Unknown` keeps the raw opcode byte so the receiver can log it; its payload
/// is skipped by declared length and never inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Hello,
    Generic1,
    Generic2,
    Generic3,
    Generic4,
    Generic5,
    Menu,
    DisplayMessage(String),
    LoginSetUsername(String),
    LoginSetUsernameResponse(bool),
    LoginSetPassword(String),
    LoginSetPasswordResponse(bool),
    LoginAuthenticate(String),
    LoginAuthenticateResponse(bool),
    Unknown { opcode: u8 },
}

impl Message {
    pub fn opcode(&self) -> Opcode {
        match self {
            Message::Hello => Opcode::Hello,
            Message::Generic1 => Opcode::Generic1,
            Message::Generic2 => Opcode::Generic2,
            Message::Generic3 => Opcode::Generic3,
            Message::Generic4 => Opcode::Generic4,
            Message::Generic5 => Opcode::Generic5,
            Message::Menu => Opcode::Menu,
            Message::DisplayMessage(_) => Opcode::DisplayMessage,
            Message::LoginSetUsername(_) => Opcode::LoginSetUsername,
            Message::LoginSetUsernameResponse(_) => Opcode::LoginSetUsernameResponse,
            Message::LoginSetPassword(_) => Opcode::LoginSetPassword,
            Message::LoginSetPasswordResponse(_) => Opcode::LoginSetPasswordResponse,
            Message::LoginAuthenticate(_) => Opcode::LoginAuthenticate,
            Message::LoginAuthenticateResponse(_) => Opcode::LoginAuthenticateResponse,
            Message::Unknown { .. } => Opcode::Unknown,
        }
    }

    /// Raw opcode byte as it appears on the wire
    pub fn opcode_byte(&self) -> u8 {
        match self {
            Message::Unknown { opcode } => *opcode,
            other => other.opcode() as u8,
        }
    }

    /// Total encoded length, header included
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN
            + match self {
                Message::DisplayMessage(text)
                | Message::LoginSetUsername(text)
                | Message::LoginSetPassword(text)
                | Message::LoginAuthenticate(text) => text.len(),
                Message::LoginSetUsernameResponse(_)
                | Message::LoginSetPasswordResponse(_)
                | Message::LoginAuthenticateResponse(_) => 1,
                _ => 0,
            }
    }

    pub fn display(text: impl Into<String>) -> Self {
        Message::DisplayMessage(text.into())
    }

    /// Whether the message is a request a client may send to a server
    pub fn is_request(&self) -> bool {
        matches!(
            self,
            Message::Hello
                | Message::Generic1
                | Message::Generic2
                | Message::Generic3
                | Message::Generic4
                | Message::Generic5
                | Message::Menu
                | Message::LoginSetUsername(_)
                | Message::LoginSetPassword(_)
                | Message::LoginAuthenticate(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_byte_mapping_is_stable() {
        for byte in 0u8..=14 {
            let opcode = Opcode::from(byte);
            assert_eq!(opcode as u8, byte);
        }
        assert_eq!(Opcode::from(15), Opcode::Unknown);
        assert_eq!(Opcode::from(0xFF), Opcode::Unknown);
    }

    #[test]
    fn test_encoded_len() {
        assert_eq!(Message::Hello.encoded_len(), 3);
        assert_eq!(Message::display("hi").encoded_len(), 5);
        assert_eq!(Message::LoginAuthenticateResponse(true).encoded_len(), 4);
    }

    #[test]
    fn test_unknown_keeps_raw_opcode() {
        let msg = Message::Unknown { opcode: 200 };
        assert_eq!(msg.opcode(), Opcode::Unknown);
        assert_eq!(msg.opcode_byte(), 200);
    }

    #[test]
    fn test_request_classification() {
        assert!(Message::Menu.is_request());
        assert!(Message::LoginAuthenticate("pw".into()).is_request());
        assert!(!Message::display("text").is_request());
        assert!(!Message::LoginSetUsernameResponse(false).is_request());
    }
}
