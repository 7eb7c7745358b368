//! Transactions: parsing, serialization, signature hashing, and per-input
//! verification/signing.
//!
//! `TxIn` needs the value and script_pubkey of the output it spends, which
//! live in a transaction it doesn't carry a copy of. [`TxFetcher`] is the
//! capability that retrieves that prior transaction; the fetched fields are
//! cached on the `TxIn` after the first lookup so repeated calls to
//! [`TxIn::value`] or [`TxIn::script_pubkey`] don't refetch.

use std::cell::RefCell;
use std::io::Read;
use std::sync::Arc;

use num_bigint::{BigInt, Sign};

use crate::codec::{self, read_exact, read_varint, write_varint};
use crate::error::{Error, Result};
use crate::keys::{self, PrivateKey, Signature};
use crate::script::{evaluate, Cmd, Script, SignatureVerifier};

const SIGHASH_ALL: u32 = 1;

/// Looks up a previously broadcast transaction by its (display-order, hex)
/// txid. Implemented by [`crate::fetch::HttpTxFetcher`] for real use and by
/// in-memory maps in tests.
pub trait TxFetcher {
    fn fetch(&self, txid: &str, testnet: bool) -> Result<Tx>;
}

struct EcdsaVerifier;

impl SignatureVerifier for EcdsaVerifier {
    fn verify(&self, z: &[u8], der_sig: &[u8], sec_pubkey: &[u8]) -> bool {
        let Ok(sig) = Signature::parse(der_sig) else {
            return false;
        };
        let Ok(point) = keys::parse_sec(sec_pubkey) else {
            return false;
        };
        keys::verify(z, &sig, &point)
    }
}

#[derive(Debug, Clone, Default)]
struct PrevTxCache {
    value: Option<u64>,
    script_pubkey: Option<Script>,
}

/// One transaction input: the outpoint it spends, its unlocking script, and
/// its sequence number.
#[derive(Debug, Clone)]
pub struct TxIn {
    pub prev_txid: String,
    pub prev_index: u32,
    pub script_sig: Script,
    pub sequence: u32,
    cache: RefCell<PrevTxCache>,
}

impl TxIn {
    pub fn new(prev_txid: String, prev_index: u32, script_sig: Script, sequence: u32) -> Self {
        Self {
            prev_txid,
            prev_index,
            script_sig,
            sequence,
            cache: RefCell::new(PrevTxCache::default()),
        }
    }

    fn fetch_prev(&self, fetcher: &dyn TxFetcher, testnet: bool) -> Result<Tx> {
        fetcher.fetch(&self.prev_txid, testnet)
    }

    /// The value, in satoshis, of the output this input spends. Fetched and
    /// cached on first call.
    pub fn value(&self, fetcher: &dyn TxFetcher, testnet: bool) -> Result<u64> {
        if let Some(v) = self.cache.borrow().value {
            return Ok(v);
        }
        let prev = self.fetch_prev(fetcher, testnet)?;
        let out = prev
            .tx_outs
            .get(self.prev_index as usize)
            .ok_or_else(|| Error::Parse("prev_index out of range".into()))?;
        self.cache.borrow_mut().value = Some(out.amount);
        Ok(out.amount)
    }

    /// The script_pubkey of the output this input spends. Fetched and
    /// cached on first call.
    pub fn script_pubkey(&self, fetcher: &dyn TxFetcher, testnet: bool) -> Result<Script> {
        if let Some(s) = self.cache.borrow().script_pubkey.clone() {
            return Ok(s);
        }
        let prev = self.fetch_prev(fetcher, testnet)?;
        let out = prev
            .tx_outs
            .get(self.prev_index as usize)
            .ok_or_else(|| Error::Parse("prev_index out of range".into()))?;
        self.cache.borrow_mut().script_pubkey = Some(out.script_pubkey.clone());
        Ok(out.script_pubkey.clone())
    }

    fn serialize_pretxid(&self) -> Vec<u8> {
        let mut raw = hex::decode(&self.prev_txid).unwrap_or_default();
        raw.reverse();
        raw
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = self.serialize_pretxid();
        out.extend_from_slice(&self.prev_index.to_le_bytes());
        out.extend_from_slice(&self.script_sig.serialize());
        out.extend_from_slice(&self.sequence.to_le_bytes());
        out
    }

    pub fn parse(r: &mut impl Read) -> Result<Self> {
        let mut prev_txid_bytes = read_exact(r, 32)?;
        prev_txid_bytes.reverse();
        let prev_txid = hex::encode(prev_txid_bytes);

        let prev_index = u32::from_le_bytes(read_exact(r, 4)?.try_into().unwrap());
        let script_sig = Script::parse(r)?;
        let sequence = u32::from_le_bytes(read_exact(r, 4)?.try_into().unwrap());

        Ok(TxIn::new(prev_txid, prev_index, script_sig, sequence))
    }
}

/// One transaction output: an amount in satoshis and the locking script.
#[derive(Debug, Clone)]
pub struct TxOut {
    pub amount: u64,
    pub script_pubkey: Script,
}

impl TxOut {
    pub fn new(amount: u64, script_pubkey: Script) -> Self {
        Self { amount, script_pubkey }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = self.amount.to_le_bytes().to_vec();
        out.extend_from_slice(&self.script_pubkey.serialize());
        out
    }

    pub fn parse(r: &mut impl Read) -> Result<Self> {
        let amount = u64::from_le_bytes(read_exact(r, 8)?.try_into().unwrap());
        let script_pubkey = Script::parse(r)?;
        Ok(TxOut::new(amount, script_pubkey))
    }
}

/// A full transaction: version, inputs, outputs, and locktime.
#[derive(Debug, Clone)]
pub struct Tx {
    pub version: u32,
    pub tx_ins: Vec<TxIn>,
    pub tx_outs: Vec<TxOut>,
    pub locktime: u32,
    pub testnet: bool,
}

impl Tx {
    pub fn new(version: u32, tx_ins: Vec<TxIn>, tx_outs: Vec<TxOut>, locktime: u32, testnet: bool) -> Self {
        Self {
            version,
            tx_ins,
            tx_outs,
            locktime,
            testnet,
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = self.version.to_le_bytes().to_vec();
        out.extend_from_slice(&write_varint(self.tx_ins.len() as u64));
        for txin in &self.tx_ins {
            out.extend_from_slice(&txin.serialize());
        }
        out.extend_from_slice(&write_varint(self.tx_outs.len() as u64));
        for txout in &self.tx_outs {
            out.extend_from_slice(&txout.serialize());
        }
        out.extend_from_slice(&self.locktime.to_le_bytes());
        out
    }

    pub fn parse(r: &mut impl Read, testnet: bool) -> Result<Self> {
        let version = u32::from_le_bytes(read_exact(r, 4)?.try_into().unwrap());

        let n_ins = read_varint(r)?;
        let mut tx_ins = Vec::with_capacity(n_ins as usize);
        for _ in 0..n_ins {
            tx_ins.push(TxIn::parse(r)?);
        }

        let n_outs = read_varint(r)?;
        let mut tx_outs = Vec::with_capacity(n_outs as usize);
        for _ in 0..n_outs {
            tx_outs.push(TxOut::parse(r)?);
        }

        let locktime = u32::from_le_bytes(read_exact(r, 4)?.try_into().unwrap());

        Ok(Tx::new(version, tx_ins, tx_outs, locktime, testnet))
    }

    /// Double-SHA256 of the serialization, reversed to display order.
    pub fn id(&self) -> String {
        let hash = codec::hash256(&self.serialize());
        hex::encode(codec::reversed(&hash))
    }

    /// `true` for a transaction whose single input spends the all-zero
    /// outpoint at index `0xffffffff` — a coinbase.
    pub fn is_coinbase(&self) -> bool {
        self.tx_ins.len() == 1
            && self.tx_ins[0].prev_txid == "0".repeat(64)
            && self.tx_ins[0].prev_index == 0xffffffff
    }

    /// The block height encoded in a coinbase's `script_sig` per BIP34: the
    /// first push, interpreted as a little-endian integer.
    pub fn coinbase_height(&self) -> Option<u32> {
        if !self.is_coinbase() {
            return None;
        }
        match self.tx_ins[0].script_sig.cmds.first() {
            Some(Cmd::Push(bytes)) if !bytes.is_empty() && bytes.len() <= 4 => {
                let mut buf = [0u8; 4];
                buf[..bytes.len()].copy_from_slice(bytes);
                Some(u32::from_le_bytes(buf))
            }
            _ => None,
        }
    }

    /// Total input value minus total output value.
    pub fn fee(&self, fetcher: &dyn TxFetcher) -> Result<i64> {
        let mut total_in: i64 = 0;
        for txin in &self.tx_ins {
            total_in += txin.value(fetcher, self.testnet)? as i64;
        }
        let total_out: i64 = self.tx_outs.iter().map(|o| o.amount as i64).sum();
        Ok(total_in - total_out)
    }

    /// Computes `z(i, redeem)`: the transaction reserialized with every
    /// script_sig blanked except input `i`'s, which is replaced by
    /// `redeem` if given or else the referenced script_pubkey; followed by
    /// a little-endian `SIGHASH_ALL`, then `HASH256`'d.
    pub fn sig_hash(&self, index: usize, redeem: Option<&Script>, fetcher: &dyn TxFetcher) -> Result<[u8; 32]> {
        let mut out = self.version.to_le_bytes().to_vec();
        out.extend_from_slice(&write_varint(self.tx_ins.len() as u64));

        for (i, txin) in self.tx_ins.iter().enumerate() {
            let script_sig = if i == index {
                match redeem {
                    Some(script) => script.clone(),
                    None => txin.script_pubkey(fetcher, self.testnet)?,
                }
            } else {
                Script::default()
            };

            out.extend_from_slice(&txin.serialize_pretxid());
            out.extend_from_slice(&txin.prev_index.to_le_bytes());
            if i == index {
                out.extend_from_slice(&script_sig.serialize());
            } else {
                out.push(0x00);
            }
            out.extend_from_slice(&txin.sequence.to_le_bytes());
        }

        out.extend_from_slice(&write_varint(self.tx_outs.len() as u64));
        for txout in &self.tx_outs {
            out.extend_from_slice(&txout.serialize());
        }

        out.extend_from_slice(&self.locktime.to_le_bytes());
        out.extend_from_slice(&SIGHASH_ALL.to_le_bytes());

        Ok(codec::hash256(&out))
    }

    /// Verifies input `i`: resolves P2SH redeem scripts, computes the
    /// sighash, and evaluates `script_sig ++ script_pubkey`.
    pub fn verify_input(&self, index: usize, fetcher: &dyn TxFetcher) -> Result<bool> {
        let txin = &self.tx_ins[index];
        let script_pubkey = txin.script_pubkey(fetcher, self.testnet)?;

        let redeem = if script_pubkey.is_p2sh() {
            match txin.script_sig.cmds.last() {
                Some(Cmd::Push(raw)) => {
                    let mut prefixed = write_varint(raw.len() as u64);
                    prefixed.extend_from_slice(raw);
                    Some(Script::parse(&mut std::io::Cursor::new(prefixed))?)
                }
                _ => None,
            }
        } else {
            None
        };

        let z = self.sig_hash(index, redeem.as_ref(), fetcher)?;
        let verifier = EcdsaVerifier;
        Ok(evaluate(&txin.script_sig, &script_pubkey, &z, &verifier))
    }

    /// Verifies every input; `true` only if all pass.
    pub fn verify(&self, fetcher: &dyn TxFetcher) -> Result<bool> {
        for i in 0..self.tx_ins.len() {
            if !self.verify_input(i, fetcher)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Signs input `i` with `key`, building `script_sig = [sig || SIGHASH_ALL,
    /// sec_compressed(pubkey)]`, then re-verifies the result.
    pub fn sign_input(&mut self, index: usize, key: &PrivateKey, fetcher: &dyn TxFetcher) -> Result<()> {
        let z = self.sig_hash(index, None, fetcher)?;
        let sig = key.sign(&z);

        let mut der = sig.der();
        der.push(SIGHASH_ALL as u8);

        let script_sig = Script::new(vec![Cmd::Push(der), Cmd::Push(key.sec_compressed())]);
        self.tx_ins[index].script_sig = script_sig;

        if !self.verify_input(index, fetcher)? {
            return Err(Error::WrongSignature);
        }
        Ok(())
    }
}

/// `BigInt` view of a sighash, used where callers want to reason about `z`
/// as an integer rather than raw bytes (matches the ECDSA module's `z`
/// convention).
pub fn sig_hash_int(hash: &[u8; 32]) -> BigInt {
    BigInt::from_bytes_be(Sign::Plus, hash)
}

/// An in-memory [`TxFetcher`] for tests: looks up previously inserted
/// transactions by txid, never performs I/O.
#[derive(Default)]
pub struct StaticTxFetcher {
    txs: std::collections::HashMap<String, Arc<Tx>>,
}

impl StaticTxFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tx: Tx) {
        self.txs.insert(tx.id(), Arc::new(tx));
    }
}

impl TxFetcher for StaticTxFetcher {
    fn fetch(&self, txid: &str, _testnet: bool) -> Result<Tx> {
        self.txs
            .get(txid)
            .map(|tx| (**tx).clone())
            .ok_or_else(|| Error::Parse(format!("unknown txid {txid}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt as BI;

    fn key_and_address() -> (PrivateKey, [u8; 20]) {
        let key = PrivateKey::new(BI::from(8675309u64));
        let h160 = codec::hash160(&key.sec_compressed());
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&h160);
        (key, arr)
    }

    #[test]
    fn sign_and_verify_p2pkh_round_trip() {
        let (key, h160) = key_and_address();

        let prev_tx_in = TxIn::new("0".repeat(64), 0xffffffff, Script::default(), 0xffffffff);
        let prev_tx = Tx::new(
            1,
            vec![prev_tx_in],
            vec![TxOut::new(5000, Script::p2pkh(&h160))],
            0,
            true,
        );

        let mut fetcher = StaticTxFetcher::new();
        let prev_txid = prev_tx.id();
        fetcher.insert(prev_tx);

        let spending_in = TxIn::new(prev_txid, 0, Script::default(), 0xffffffff);
        let mut tx = Tx::new(1, vec![spending_in], vec![TxOut::new(4000, Script::p2pkh(&h160))], 0, true);

        tx.sign_input(0, &key, &fetcher).unwrap();
        assert!(tx.verify(&fetcher).unwrap());
    }

    #[test]
    fn coinbase_height_decodes_bip34_push() {
        let script_sig = Script::new(vec![Cmd::Push(vec![0x64, 0x00, 0x03])]);
        let txin = TxIn::new("0".repeat(64), 0xffffffff, script_sig, 0xffffffff);
        let tx = Tx::new(1, vec![txin], vec![], 0, false);
        assert!(tx.is_coinbase());
        assert_eq!(tx.coinbase_height(), Some(0x030064));
    }

    #[test]
    fn fee_is_input_minus_output_value() {
        let (_, h160) = key_and_address();
        let prev_tx_in = TxIn::new("1".repeat(64), 0, Script::default(), 0xffffffff);
        let prev_tx = Tx::new(1, vec![prev_tx_in], vec![TxOut::new(10_000, Script::p2pkh(&h160))], 0, true);

        let mut fetcher = StaticTxFetcher::new();
        let prev_txid = prev_tx.id();
        fetcher.insert(prev_tx);

        let spending_in = TxIn::new(prev_txid, 0, Script::default(), 0xffffffff);
        let tx = Tx::new(1, vec![spending_in], vec![TxOut::new(9_000, Script::p2pkh(&h160))], 0, true);

        assert_eq!(tx.fee(&fetcher).unwrap(), 1_000);
    }
}
