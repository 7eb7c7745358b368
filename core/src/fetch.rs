//! HTTP transaction fetcher: the one collaborator in this crate that
//! performs real network I/O rather than pure consensus logic.

use crate::error::{Error, Result};
use crate::tx::{Tx, TxFetcher};

const TESTNET_URL: &str = "http://testnet.programmingbitcoin.com/tx";
const MAINNET_URL: &str = "https://blockchain.info/rawtx";

/// Fetches raw transactions over HTTP, in the hex encoding public block
/// explorers serve them in.
pub struct HttpTxFetcher {
    client: reqwest::blocking::Client,
}

impl HttpTxFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
        }
    }

    fn url(&self, txid: &str, testnet: bool) -> String {
        if testnet {
            format!("{TESTNET_URL}/{txid}.hex")
        } else {
            format!("{MAINNET_URL}/{txid}?format=hex")
        }
    }
}

impl Default for HttpTxFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl TxFetcher for HttpTxFetcher {
    fn fetch(&self, txid: &str, testnet: bool) -> Result<Tx> {
        let url = self.url(txid, testnet);
        tracing::debug!(txid, testnet, %url, "fetching prior transaction");

        let body = self.client.get(&url).send()?.text()?;
        let mut raw = hex::decode(body.trim())?;

        // Strip the BIP141 witness marker (0x00, 0x01) following the
        // version field, if present, so the non-witness payload parses.
        if raw.len() > 5 && raw[4] == 0x00 && raw[5] == 0x01 {
            raw = [&raw[0..4], &raw[6..]].concat();
        }

        let mut tx = Tx::parse(&mut std::io::Cursor::new(&raw), testnet)?;

        if raw.len() >= 4 {
            let locktime_bytes = &raw[raw.len() - 4..];
            tx.locktime = u32::from_le_bytes(locktime_bytes.try_into().unwrap());
        } else {
            return Err(Error::Parse("fetched transaction too short for locktime".into()));
        }

        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_differ_by_network() {
        let fetcher = HttpTxFetcher::new();
        let txid = "abc123";
        assert_ne!(fetcher.url(txid, true), fetcher.url(txid, false));
        assert!(fetcher.url(txid, true).contains("testnet"));
    }
}
