//! A single TCP connection to a Bitcoin peer: handshake, command
//! dispatch, and the header-sync/merkle-block request flows built on top
//! of it.

use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use btc_core::block::BlockHeader;
use btc_core::bloom::BloomFilter;
use btc_core::config::Network;
use btc_core::merkle::MerkleBlock;
use btc_core::tx::Tx;

use crate::envelope::{Command, Envelope};
use crate::error::{Error, Result};
use crate::messages::{
    filter_load_payload, parse_merkle_block, parse_tx, GetDataMessage, GetHeadersMessage,
    HeadersMessage, InvType, PingPong, VersionMessage,
};

/// Where a [`Peer`] sits in its connection lifecycle. Any I/O error moves
/// the peer to `Closed`; there is no reconnect, callers dial a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Dialed,
    Handshaking,
    Ready,
    Closed,
}

/// A blocking, synchronous connection to one peer. Reads and writes are
/// not interleaved with anything else — callers own the socket for the
/// duration of each request.
pub struct Peer {
    stream: TcpStream,
    network: Network,
    state: PeerState,
}

impl Peer {
    /// Opens a TCP connection to `addr` and leaves the peer in `Dialed`
    /// state, handshake not yet performed.
    pub fn dial(addr: impl ToSocketAddrs, network: Network) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(Some(Duration::from_secs(30)))?;
        tracing::debug!(?network, "dialed peer");
        Ok(Peer {
            stream,
            network,
            state: PeerState::Dialed,
        })
    }

    pub fn state(&self) -> PeerState {
        self.state
    }

    fn fail(&mut self, err: Error) -> Error {
        self.state = PeerState::Closed;
        err
    }

    fn send(&mut self, command: Command, payload: Vec<u8>) -> Result<()> {
        let envelope = Envelope::new(self.network, command, payload);
        self.stream.write_all(&envelope.serialize()).map_err(|e| self.fail(e.into()))
    }

    fn recv(&mut self) -> Result<Envelope> {
        Envelope::parse(&mut self.stream, self.network).map_err(|e| self.fail(e))
    }

    /// Sends `version`, then loops reading envelopes until both a `version`
    /// and a `verack` have been seen, answering any `ping` received along
    /// the way, and finally sends our own `verack`. Mirrors the reference
    /// handshake: unrelated commands arriving early are silently dropped.
    pub fn handshake(&mut self, nonce: u64) -> Result<()> {
        self.state = PeerState::Handshaking;
        self.send(Command::Version, VersionMessage::minimal(nonce).serialize())?;

        let mut saw_version = false;
        let mut saw_verack = false;
        while !(saw_version && saw_verack) {
            let envelope = self.recv()?;
            match envelope.command {
                Command::Version => saw_version = true,
                Command::Verack => saw_verack = true,
                Command::Ping => self.answer_ping(&envelope)?,
                _ => {}
            }
        }

        self.send(Command::Verack, vec![])?;
        self.state = PeerState::Ready;
        tracing::debug!("handshake complete");
        Ok(())
    }

    fn answer_ping(&mut self, envelope: &Envelope) -> Result<()> {
        let ping = PingPong::parse(&mut envelope.reader())?;
        self.send(Command::Pong, ping.serialize())
    }

    /// Reads envelopes, answering any `ping` inline and discarding any
    /// command not in `wait_for`, until one of `wait_for` arrives.
    pub fn wait_for_command(&mut self, wait_for: &[Command]) -> Result<Envelope> {
        loop {
            let envelope = self.recv()?;
            if envelope.command == Command::Ping {
                self.answer_ping(&envelope)?;
                continue;
            }
            if wait_for.contains(&envelope.command) {
                return Ok(envelope);
            }
            tracing::trace!(command = ?envelope.command, "discarding unrequested command");
        }
    }

    /// Requests headers starting after `start_block`, validates proof of
    /// work and chain continuity on every header returned, and returns
    /// them in order.
    pub fn get_headers(&mut self, start_block: [u8; 32]) -> Result<Vec<BlockHeader>> {
        if self.state != PeerState::Ready {
            return Err(self.fail(Error::Closed));
        }

        self.send(Command::GetHeaders, GetHeadersMessage::new(start_block).serialize())?;
        let envelope = self.wait_for_command(&[Command::Headers])?;
        let headers = HeadersMessage::parse(&mut envelope.reader())
            .map_err(|e| self.fail(e))?
            .headers;

        let mut prev_hash = start_block;
        for header in &headers {
            if !header.check_pow() {
                return Err(self.fail(Error::BadProofOfWork(hex::encode(header.hash()))));
            }
            if header.prev_block != prev_hash {
                return Err(self.fail(Error::DiscontinuousChain(hex::encode(header.hash()))));
            }
            prev_hash = header.hash();
        }

        Ok(headers)
    }

    /// Sends `filterload`, installing a Bloom filter on the remote peer so
    /// subsequent `merkleblock`/`tx` relays are filtered to matching items.
    pub fn load_filter(&mut self, filter: &BloomFilter) -> Result<()> {
        self.send(Command::FilterLoad, filter_load_payload(filter, 1))
    }

    /// Requests a filtered block by hash and the transactions relayed
    /// alongside it (the peer sends `merkleblock` followed by zero or more
    /// `tx` messages matching the loaded filter).
    pub fn get_filtered_block(&mut self, block_hash: [u8; 32]) -> Result<(MerkleBlock, Vec<Tx>)> {
        if self.state != PeerState::Ready {
            return Err(self.fail(Error::Closed));
        }

        let request = GetDataMessage::new(vec![(InvType::FilteredBlock, block_hash)]);
        self.send(Command::GetData, request.serialize())?;

        let envelope = self.wait_for_command(&[Command::MerkleBlock])?;
        let merkle_block = parse_merkle_block(&mut envelope.reader()).map_err(|e| self.fail(e))?;

        let mut txs = Vec::new();
        while let Ok(envelope) = self.wait_for_command(&[Command::Tx, Command::GetHeaders]) {
            if envelope.command != Command::Tx {
                break;
            }
            let tx = parse_tx(&mut envelope.reader(), self.network.is_testnet()).map_err(|e| self.fail(e))?;
            txs.push(tx);
        }

        Ok((merkle_block, txs))
    }
}
