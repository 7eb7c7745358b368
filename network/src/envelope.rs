//! Message envelope: the `magic | command | length | checksum | payload`
//! frame every Bitcoin P2P message rides in.

use std::io::Read;

use btc_core::codec::hash256;
use btc_core::config::Network;

use crate::error::{Error, Result};

/// The 12-byte, null-padded ASCII command name identifying a message's
/// payload type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Version,
    Verack,
    Ping,
    Pong,
    GetHeaders,
    Headers,
    FilterLoad,
    GetData,
    MerkleBlock,
    Tx,
}

impl Command {
    pub fn as_bytes(&self) -> [u8; 12] {
        let name: &[u8] = match self {
            Command::Version => b"version",
            Command::Verack => b"verack",
            Command::Ping => b"ping",
            Command::Pong => b"pong",
            Command::GetHeaders => b"getheaders",
            Command::Headers => b"headers",
            Command::FilterLoad => b"filterload",
            Command::GetData => b"getdata",
            Command::MerkleBlock => b"merkleblock",
            Command::Tx => b"tx",
        };
        let mut out = [0u8; 12];
        out[..name.len()].copy_from_slice(name);
        out
    }

    fn from_bytes(raw: &[u8; 12]) -> Result<Self> {
        let trimmed = &raw[..raw.iter().position(|&b| b == 0).unwrap_or(12)];
        match trimmed {
            b"version" => Ok(Command::Version),
            b"verack" => Ok(Command::Verack),
            b"ping" => Ok(Command::Ping),
            b"pong" => Ok(Command::Pong),
            b"getheaders" => Ok(Command::GetHeaders),
            b"headers" => Ok(Command::Headers),
            b"filterload" => Ok(Command::FilterLoad),
            b"getdata" => Ok(Command::GetData),
            b"merkleblock" => Ok(Command::MerkleBlock),
            b"tx" => Ok(Command::Tx),
            other => Err(Error::UnknownCommand(String::from_utf8_lossy(other).into_owned())),
        }
    }
}

/// A framed P2P message: network magic, command, and raw payload bytes.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub magic: [u8; 4],
    pub command: Command,
    pub payload: Vec<u8>,
}

impl Envelope {
    pub fn new(network: Network, command: Command, payload: Vec<u8>) -> Self {
        Self {
            magic: network.magic(),
            command,
            payload,
        }
    }

    /// `magic | command(12) | len(4 LE) | checksum(4) | payload`.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(24 + self.payload.len());
        out.extend_from_slice(&self.magic);
        out.extend_from_slice(&self.command.as_bytes());
        out.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        let checksum = hash256(&self.payload);
        out.extend_from_slice(&checksum[..4]);
        out.extend_from_slice(&self.payload);
        out
    }

    /// Parses an envelope from a blocking reader, verifying the magic and
    /// checksum.
    pub fn parse(r: &mut impl Read, network: Network) -> Result<Self> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if magic != network.magic() {
            return Err(Error::WrongMagic(u32::from_be_bytes(magic)));
        }

        let mut command_raw = [0u8; 12];
        r.read_exact(&mut command_raw)?;
        let command = Command::from_bytes(&command_raw)?;

        let mut len_buf = [0u8; 4];
        r.read_exact(&mut len_buf)?;
        let payload_len = u32::from_le_bytes(len_buf) as usize;

        let mut checksum = [0u8; 4];
        r.read_exact(&mut checksum)?;

        let mut payload = vec![0u8; payload_len];
        r.read_exact(&mut payload)?;

        let expected = hash256(&payload);
        if checksum != expected[..4] {
            return Err(Error::BadChecksum);
        }

        Ok(Envelope { magic, command, payload })
    }

    pub fn reader(&self) -> std::io::Cursor<&[u8]> {
        std::io::Cursor::new(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_serialize_and_parse() {
        let envelope = Envelope::new(Network::Testnet3, Command::Ping, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        let bytes = envelope.serialize();
        let mut cursor = std::io::Cursor::new(bytes);
        let parsed = Envelope::parse(&mut cursor, Network::Testnet3).unwrap();
        assert_eq!(parsed.command, Command::Ping);
        assert_eq!(parsed.payload, envelope.payload);
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let envelope = Envelope::new(Network::Mainnet, Command::Verack, vec![]);
        let bytes = envelope.serialize();
        let mut cursor = std::io::Cursor::new(bytes);
        assert!(matches!(
            Envelope::parse(&mut cursor, Network::Testnet3),
            Err(Error::WrongMagic(_))
        ));
    }

    #[test]
    fn corrupted_payload_fails_checksum() {
        let envelope = Envelope::new(Network::Testnet3, Command::Verack, vec![0xaa]);
        let mut bytes = envelope.serialize();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        let mut cursor = std::io::Cursor::new(bytes);
        assert!(matches!(Envelope::parse(&mut cursor, Network::Testnet3), Err(Error::BadChecksum)));
    }
}
