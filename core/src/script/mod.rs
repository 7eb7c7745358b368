//! Bitcoin scripts: canonical push encoding/parsing, P2SH redeem-script
//! resolution, and standard-output templates.

mod ops;

pub use ops::{evaluate, SignatureVerifier};

use std::fmt;
use std::io::Read;

use crate::codec::{read_exact, read_varint, write_varint};
use crate::error::{Error, Result};

/// A single script command: either a raw opcode byte or a literal push of
/// bytes. Push commands are resolved by the parser, never by the VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cmd {
    Op(u8),
    Push(Vec<u8>),
}

/// An ordered sequence of script commands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Script {
    pub cmds: Vec<Cmd>,
}

impl Script {
    pub fn new(cmds: Vec<Cmd>) -> Self {
        Self { cmds }
    }

    /// Parses a length-prefixed script from `r`.
    pub fn parse(r: &mut impl Read) -> Result<Self> {
        let length = read_varint(r)?;
        let mut cmds = Vec::new();
        let mut consumed = 0u64;

        while consumed < length {
            let op_byte = read_exact(r, 1)?[0];
            consumed += 1;

            match op_byte {
                1..=75 => {
                    let data = read_exact(r, op_byte as usize)?;
                    consumed += op_byte as u64;
                    cmds.push(Cmd::Push(data));
                }
                76 => {
                    let len_byte = read_exact(r, 1)?[0] as usize;
                    let data = read_exact(r, len_byte)?;
                    consumed += 1 + len_byte as u64;
                    cmds.push(Cmd::Push(data));
                }
                77 => {
                    let len_bytes = read_exact(r, 2)?;
                    let len = u16::from_le_bytes([len_bytes[0], len_bytes[1]]) as usize;
                    let data = read_exact(r, len)?;
                    consumed += 2 + len as u64;
                    cmds.push(Cmd::Push(data));
                }
                op => cmds.push(Cmd::Op(op)),
            }
        }

        if consumed != length {
            return Err(Error::Parse("script length mismatch".into()));
        }

        Ok(Script { cmds })
    }

    /// Serializes with a varint length prefix, using the canonical push
    /// opcode for each command's payload length.
    pub fn serialize(&self) -> Vec<u8> {
        let raw = self.raw_cmds();
        let mut out = write_varint(raw.len() as u64);
        out.extend_from_slice(&raw);
        out
    }

    fn raw_cmds(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for cmd in &self.cmds {
            match cmd {
                Cmd::Op(op) => out.push(*op),
                Cmd::Push(data) => {
                    let len = data.len();
                    if len < 76 {
                        out.push(len as u8);
                    } else if len < 0x100 {
                        out.push(76);
                        out.push(len as u8);
                    } else if len <= 520 {
                        out.push(77);
                        out.extend_from_slice(&(len as u16).to_le_bytes());
                    } else {
                        panic!("push data too long for a script ({len} bytes)");
                    }
                    out.extend_from_slice(data);
                }
            }
        }
        out
    }

    /// `true` iff the commands are exactly the P2SH redemption pattern
    /// `OP_HASH160 <20-byte hash> OP_EQUAL`.
    pub fn is_p2sh(&self) -> bool {
        self.cmds.len() == 3
            && self.cmds[0] == Cmd::Op(0xa9)
            && matches!(&self.cmds[1], Cmd::Push(h) if h.len() == 20)
            && self.cmds[2] == Cmd::Op(0x87)
    }

    /// `true` iff the commands are the standard P2PKH template
    /// `OP_DUP OP_HASH160 <20-byte hash> OP_EQUALVERIFY OP_CHECKSIG`.
    pub fn is_p2pkh(&self) -> bool {
        self.cmds.len() == 5
            && self.cmds[0] == Cmd::Op(0x76)
            && self.cmds[1] == Cmd::Op(0xa9)
            && matches!(&self.cmds[2], Cmd::Push(h) if h.len() == 20)
            && self.cmds[3] == Cmd::Op(0x88)
            && self.cmds[4] == Cmd::Op(0xac)
    }

    /// The standard Pay-to-PubKey-Hash output template.
    pub fn p2pkh(h160: &[u8; 20]) -> Self {
        Script::new(vec![
            Cmd::Op(0x76),
            Cmd::Op(0xa9),
            Cmd::Push(h160.to_vec()),
            Cmd::Op(0x88),
            Cmd::Op(0xac),
        ])
    }

    /// The standard Pay-to-Script-Hash output template.
    pub fn p2sh(h160: &[u8; 20]) -> Self {
        Script::new(vec![Cmd::Op(0xa9), Cmd::Push(h160.to_vec()), Cmd::Op(0x87)])
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .cmds
            .iter()
            .map(|cmd| match cmd {
                Cmd::Op(op) => {
                    let name = ops::opcode_name(*op);
                    if name.is_empty() {
                        format!("OP_UNKNOWN({op})")
                    } else {
                        name.to_string()
                    }
                }
                Cmd::Push(data) => hex::encode(data),
            })
            .collect();
        write!(f, "{}", parts.join(" "))
    }
}
