use crate::error::{PeerError, PeerResult};

pub const HEADER_LEN: usize = 4 + 12 + 4 + 4;

/// The fixed 24-byte prefix of every wire message (§3).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageHeader {
    pub magic: u32,
    pub command: Command,
    pub length: u32,
    pub checksum: [u8; 4],
}

/// The command vocabulary the core distinguishes, plus an opaque catchall for
/// every well-formed command name it does not interpret (§3, §4.1).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Version,
    VerAck,
    Ping,
    Pong,
    Reject,
    MerkleBlock,
    Tx,
    Other([u8; 12]),
}

impl Command {
    pub fn as_bytes(&self) -> [u8; 12] {
        match self {
            Command::Version => *b"version\0\0\0\0\0",
            Command::VerAck => *b"verack\0\0\0\0\0\0",
            Command::Ping => *b"ping\0\0\0\0\0\0\0\0",
            Command::Pong => *b"pong\0\0\0\0\0\0\0\0",
            Command::Reject => *b"reject\0\0\0\0\0\0",
            Command::MerkleBlock => *b"merkleblock\0",
            Command::Tx => *b"tx\0\0\0\0\0\0\0\0\0\0",
            Command::Other(bytes) => *bytes,
        }
    }

    pub fn name(&self) -> String {
        let bytes = self.as_bytes();
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        String::from_utf8_lossy(&bytes[..end]).into_owned()
    }

    /// Validates the 12-byte command field: ASCII printable characters
    /// followed by zero-or-more NUL padding bytes, no non-NUL byte after the
    /// first NUL (§3 invariant, §4.1 decode_header).
    pub fn parse(bytes: [u8; 12]) -> PeerResult<Command> {
        let mut seen_nul = false;
        for &b in bytes.iter() {
            if seen_nul {
                if b != 0 {
                    return Err(PeerError::framing(format!(
                        "non-NUL byte after command padding: {:?}",
                        bytes
                    )));
                }
            } else if b == 0 {
                seen_nul = true;
            } else if !(0x20..=0x7E).contains(&b) {
                return Err(PeerError::framing(format!(
                    "non-ASCII-printable byte in command: {:?}",
                    bytes
                )));
            }
        }

        Ok(match &bytes {
            b"version\0\0\0\0\0" => Command::Version,
            b"verack\0\0\0\0\0\0" => Command::VerAck,
            b"ping\0\0\0\0\0\0\0\0" => Command::Ping,
            b"pong\0\0\0\0\0\0\0\0" => Command::Pong,
            b"reject\0\0\0\0\0\0" => Command::Reject,
            b"merkleblock\0" => Command::MerkleBlock,
            b"tx\0\0\0\0\0\0\0\0\0\0" => Command::Tx,
            other => Command::Other(*other),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn known_commands_round_trip() {
        for cmd in [
            Command::Version,
            Command::VerAck,
            Command::Ping,
            Command::Pong,
            Command::Reject,
            Command::MerkleBlock,
            Command::Tx,
        ] {
            assert_eq!(Command::parse(cmd.as_bytes()).unwrap(), cmd);
        }
    }

    #[test]
    fn unknown_well_formed_command_is_other() {
        let bytes = *b"filterload\0\0";
        let parsed = Command::parse(bytes).unwrap();
        assert_eq!(parsed, Command::Other(bytes));
        assert_eq!(parsed.name(), "filterload");
    }

    #[test]
    fn non_ascii_command_is_rejected() {
        let mut bytes = *b"version\0\0\0\0\0";
        bytes[0] = 0xFF;
        assert!(Command::parse(bytes).is_err());
    }

    #[test]
    fn non_nul_byte_after_padding_is_rejected() {
        let mut bytes = *b"ping\0\0\0\0\0\0\0\0";
        bytes[11] = b'x';
        assert!(Command::parse(bytes).is_err());
    }
}
