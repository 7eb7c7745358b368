//! The script virtual machine: stack, number encoding, opcode dispatch, and
//! P2SH splice-in.
//!
//! `encode_num`/`decode_num` use a fixed 8-byte big-endian representation.
//! Real Bitcoin Script uses a variable-length little-endian minimal encoding;
//! this module intentionally keeps the simpler fixed-width form the rest of
//! this crate was built against, so scripts that push numbers larger than
//! fit in 8 bytes will behave differently here than on mainnet.

use ripemd::Ripemd160;
use sha1::Sha1;
use sha2::{Digest, Sha256};

use super::{Cmd, Script};

/// Verifies an ECDSA signature against a sighash and a SEC-encoded public
/// key. Lets the script VM check signatures without depending on the `tx`
/// module, which itself depends on `Script` to compute its sighash.
pub trait SignatureVerifier {
    fn verify(&self, z: &[u8], der_sig: &[u8], sec_pubkey: &[u8]) -> bool;
}

/// The script data stack. Elements are owned byte vectors, independent of
/// the command list they were pushed from.
#[derive(Debug, Default)]
pub struct Stack {
    items: Vec<Vec<u8>>,
}

impl Stack {
    fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, item: Vec<u8>) {
        self.items.push(item);
    }

    fn pop(&mut self) -> Option<Vec<u8>> {
        self.items.pop()
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn last(&self) -> Option<&Vec<u8>> {
        self.items.last()
    }
}

/// Encodes an integer as 8 bytes, big-endian, two's complement.
pub fn encode_num(n: i64) -> Vec<u8> {
    n.to_be_bytes().to_vec()
}

/// Decodes 8 big-endian bytes back into an integer. Non-8-byte elements
/// decode to `0`, matching truthiness checks used by opcodes like
/// `OP_VERIFY` that only care whether a value is zero.
pub fn decode_num(bytes: &[u8]) -> i64 {
    if bytes.len() != 8 {
        return 0;
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    i64::from_be_bytes(buf)
}

fn is_truthy(item: &[u8]) -> bool {
    decode_num(item) != 0 || (item.len() != 8 && item.iter().any(|&b| b != 0))
}

/// Human-readable opcode name for display/disassembly, mirroring the
/// reference implementation's opcode-name table. Empty string for opcodes
/// outside the set this VM implements.
pub fn opcode_name(op: u8) -> &'static str {
    match op {
        0x00 => "OP_0",
        0x51..=0x60 => {
            const NAMES: [&str; 16] = [
                "OP_1", "OP_2", "OP_3", "OP_4", "OP_5", "OP_6", "OP_7", "OP_8", "OP_9", "OP_10",
                "OP_11", "OP_12", "OP_13", "OP_14", "OP_15", "OP_16",
            ];
            NAMES[(op - 0x51) as usize]
        }
        0x6d => "OP_2DROP",
        0x6e => "OP_2DUP",
        0x76 => "OP_DUP",
        0x77 => "OP_NIP",
        0x7c => "OP_SWAP",
        0x69 => "OP_VERIFY",
        0x87 => "OP_EQUAL",
        0x88 => "OP_EQUALVERIFY",
        0x91 => "OP_NOT",
        0xa7 => "OP_SHA1",
        0xa9 => "OP_HASH160",
        0xaa => "OP_HASH256",
        0xac => "OP_CHECKSIG",
        0xae => "OP_CHECKMULTISIG",
        _ => "",
    }
}

/// Evaluates `script_sig` followed by `script_pubkey`, splicing in the P2SH
/// redeem script when `script_pubkey` matches the P2SH pattern, per
/// BIP16. `z` is the transaction's sighash for this input; `verifier`
/// checks `OP_CHECKSIG`/`OP_CHECKMULTISIG` signatures against it.
pub fn evaluate(
    script_sig: &Script,
    script_pubkey: &Script,
    z: &[u8],
    verifier: &dyn SignatureVerifier,
) -> bool {
    let is_p2sh = script_pubkey.is_p2sh();

    let mut cmds: Vec<Cmd> = script_sig.cmds.clone();
    cmds.extend(script_pubkey.cmds.clone());

    let mut stack = Stack::new();

    let redeem_script = if is_p2sh {
        script_sig.cmds.last().and_then(|cmd| match cmd {
            Cmd::Push(data) => Some(data.clone()),
            Cmd::Op(_) => None,
        })
    } else {
        None
    };

    let mut i = 0;
    while i < cmds.len() {
        let cmd = cmds[i].clone();
        match cmd {
            Cmd::Push(data) => stack.push(data),
            Cmd::Op(op) => {
                if !run_op(op, &mut stack, z, verifier) {
                    return false;
                }
            }
        }
        i += 1;
    }

    if is_p2sh {
        // The main loop above just ran `OP_HASH160 <hash> OP_EQUAL`, leaving
        // its boolean result on top of the stack. Consume it here, the same
        // way `OP_VERIFY` would, before splicing in the redeem script so the
        // redeem script sees the stack it would see starting fresh.
        match stack.pop() {
            Some(top) if is_truthy(&top) => {}
            _ => return false,
        }

        let Some(redeem_bytes) = redeem_script else {
            return false;
        };
        let mut prefixed = crate::codec::write_varint(redeem_bytes.len() as u64);
        prefixed.extend_from_slice(&redeem_bytes);
        let redeem = match Script::parse(&mut std::io::Cursor::new(prefixed)) {
            Ok(s) => s,
            Err(_) => return false,
        };

        for cmd in redeem.cmds {
            match cmd {
                Cmd::Push(data) => stack.push(data),
                Cmd::Op(op) => {
                    if !run_op(op, &mut stack, z, verifier) {
                        return false;
                    }
                }
            }
        }
    }

    match stack.pop() {
        Some(top) => is_truthy(&top),
        None => false,
    }
}

fn run_op(op: u8, stack: &mut Stack, z: &[u8], verifier: &dyn SignatureVerifier) -> bool {
    match op {
        0x00 => {
            stack.push(Vec::new());
            true
        }
        0x51..=0x60 => {
            let n = (op - 0x50) as i64;
            stack.push(encode_num(n));
            true
        }
        0x6d => {
            if stack.len() < 2 {
                return false;
            }
            stack.pop();
            stack.pop();
            true
        }
        0x6e => {
            if stack.len() < 2 {
                return false;
            }
            let b = stack.items[stack.len() - 1].clone();
            let a = stack.items[stack.len() - 2].clone();
            stack.push(a);
            stack.push(b);
            true
        }
        0x76 => match stack.last().cloned() {
            Some(top) => {
                stack.push(top);
                true
            }
            None => false,
        },
        0x77 => {
            if stack.len() < 2 {
                return false;
            }
            let top = stack.pop().unwrap();
            stack.pop();
            stack.push(top);
            true
        }
        0x7c => {
            if stack.len() < 2 {
                return false;
            }
            let top = stack.pop().unwrap();
            let second = stack.pop().unwrap();
            stack.push(top);
            stack.push(second);
            true
        }
        0x69 => match stack.pop() {
            Some(top) => is_truthy(&top),
            None => false,
        },
        0x87 => {
            if stack.len() < 2 {
                return false;
            }
            let a = stack.pop().unwrap();
            let b = stack.pop().unwrap();
            stack.push(encode_num((a == b) as i64));
            true
        }
        0x88 => {
            if stack.len() < 2 {
                return false;
            }
            let a = stack.pop().unwrap();
            let b = stack.pop().unwrap();
            is_truthy(&encode_num((a == b) as i64))
        }
        0x91 => match stack.pop() {
            Some(top) => {
                stack.push(encode_num((!is_truthy(&top)) as i64));
                true
            }
            None => false,
        },
        0xa7 => match stack.pop() {
            Some(top) => {
                let digest = Sha1::digest(top);
                stack.push(digest.to_vec());
                true
            }
            None => false,
        },
        0xa9 => match stack.pop() {
            Some(top) => {
                let sha = Sha256::digest(top);
                let hash = Ripemd160::digest(sha);
                stack.push(hash.to_vec());
                true
            }
            None => false,
        },
        0xaa => match stack.pop() {
            Some(top) => {
                let first = Sha256::digest(top);
                let second = Sha256::digest(first);
                stack.push(second.to_vec());
                true
            }
            None => false,
        },
        0xac => checksig(stack, z, verifier),
        0xae => checkmultisig(stack, z, verifier),
        _ => false,
    }
}

/// Strips the trailing sighash-type byte every `script_sig` signature push
/// carries, leaving the bare DER encoding.
fn strip_sighash_type(signature: &[u8]) -> &[u8] {
    if signature.is_empty() {
        signature
    } else {
        &signature[..signature.len() - 1]
    }
}

fn checksig(stack: &mut Stack, z: &[u8], verifier: &dyn SignatureVerifier) -> bool {
    if stack.len() < 2 {
        return false;
    }
    let pubkey = stack.pop().unwrap();
    let signature = stack.pop().unwrap();
    let ok = verifier.verify(z, strip_sighash_type(&signature), &pubkey);
    stack.push(encode_num(ok as i64));
    true
}

fn checkmultisig(stack: &mut Stack, z: &[u8], verifier: &dyn SignatureVerifier) -> bool {
    if stack.len() < 1 {
        return false;
    }
    let n = decode_num(&stack.pop().unwrap());
    if n < 0 || stack.len() < n as usize {
        return false;
    }
    let mut pubkeys = Vec::new();
    for _ in 0..n {
        pubkeys.push(stack.pop().unwrap());
    }

    if stack.len() < 1 {
        return false;
    }
    let m = decode_num(&stack.pop().unwrap());
    if m < 0 || stack.len() < m as usize {
        return false;
    }
    let mut signatures = Vec::new();
    for _ in 0..m {
        signatures.push(stack.pop().unwrap());
    }

    // off-by-one bug in the original OP_CHECKMULTISIG consumes one extra
    // stack element; replicated here for wire compatibility.
    if stack.pop().is_none() {
        return false;
    }

    let mut pubkey_iter = pubkeys.iter();
    'sigs: for sig in &signatures {
        for pubkey in pubkey_iter.by_ref() {
            if verifier.verify(z, strip_sighash_type(sig), pubkey) {
                continue 'sigs;
            }
        }
        stack.push(encode_num(0));
        return true;
    }

    stack.push(encode_num(1));
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn num_round_trip() {
        assert_eq!(decode_num(&encode_num(12345)), 12345);
        assert_eq!(decode_num(&encode_num(-1)), -1);
    }

    #[test]
    fn truthy_matches_zero_num() {
        assert!(!is_truthy(&encode_num(0)));
        assert!(is_truthy(&encode_num(1)));
    }

    struct AlwaysTrue;
    impl SignatureVerifier for AlwaysTrue {
        fn verify(&self, _z: &[u8], _sig: &[u8], _pubkey: &[u8]) -> bool {
            true
        }
    }

    struct AlwaysFalse;
    impl SignatureVerifier for AlwaysFalse {
        fn verify(&self, _z: &[u8], _sig: &[u8], _pubkey: &[u8]) -> bool {
            false
        }
    }

    #[test]
    fn checksig_consults_verifier() {
        let script_sig = Script::new(vec![Cmd::Push(vec![0xde, 0xad]), Cmd::Push(vec![0xbe, 0xef])]);
        let script_pubkey = Script::new(vec![Cmd::Op(0xac)]);
        assert!(evaluate(&script_sig, &script_pubkey, b"z", &AlwaysTrue));
        assert!(!evaluate(&script_sig, &script_pubkey, b"z", &AlwaysFalse));
    }

    #[test]
    fn equal_opcode_compares_top_two() {
        let script_sig = Script::new(vec![Cmd::Push(vec![1, 2, 3]), Cmd::Push(vec![1, 2, 3])]);
        let script_pubkey = Script::new(vec![Cmd::Op(0x87)]);
        assert!(evaluate(&script_sig, &script_pubkey, b"z", &AlwaysTrue));
    }

    #[test]
    fn p2pkh_checks_pubkey_hash_before_signature() {
        let pubkey = vec![0x02; 33];
        let h160 = crate::codec::hash160(&pubkey);
        let mut h160_arr = [0u8; 20];
        h160_arr.copy_from_slice(&h160);

        let script_sig = Script::new(vec![Cmd::Push(vec![0x30, 0x01]), Cmd::Push(pubkey)]);
        let script_pubkey = Script::p2pkh(&h160_arr);
        assert!(evaluate(&script_sig, &script_pubkey, b"z", &AlwaysTrue));
        assert!(!evaluate(&script_sig, &script_pubkey, b"z", &AlwaysFalse));
    }

    fn two_of_two_multisig_redeem(pub1: &[u8], pub2: &[u8]) -> Script {
        Script::new(vec![
            Cmd::Op(0x52), // OP_2
            Cmd::Push(pub1.to_vec()),
            Cmd::Push(pub2.to_vec()),
            Cmd::Op(0x52), // OP_2
            Cmd::Op(0xae), // OP_CHECKMULTISIG
        ])
    }

    /// Raw (non-length-prefixed) command bytes of `script`, as pushed onto
    /// the stack by a `script_sig` that embeds it as a redeem script.
    fn raw_script_bytes(script: &Script) -> Vec<u8> {
        let prefixed = script.serialize();
        prefixed[1..].to_vec()
    }

    #[test]
    fn checkmultisig_requires_a_valid_signature_per_pubkey() {
        let pub1 = vec![0x02; 33];
        let pub2 = vec![0x03; 33];
        let script_sig = Script::new(vec![
            Cmd::Op(0x00), // OP_0 dummy for the off-by-one extra pop
            Cmd::Push(vec![0xaa]),
            Cmd::Push(vec![0xbb]),
        ]);
        let script_pubkey = two_of_two_multisig_redeem(&pub1, &pub2);
        assert!(evaluate(&script_sig, &script_pubkey, b"z", &AlwaysTrue));
        assert!(!evaluate(&script_sig, &script_pubkey, b"z", &AlwaysFalse));
    }

    #[test]
    fn p2sh_p2pkh_redeem_verifies() {
        let pubkey = vec![0x02; 33];
        let h160 = crate::codec::hash160(&pubkey);
        let mut pubkey_hash = [0u8; 20];
        pubkey_hash.copy_from_slice(&h160);
        let redeem = Script::p2pkh(&pubkey_hash);

        let mut redeem_hash = [0u8; 20];
        redeem_hash.copy_from_slice(&crate::codec::hash160(&raw_script_bytes(&redeem)));

        let script_sig = Script::new(vec![
            Cmd::Push(vec![0x30, 0x01]),
            Cmd::Push(pubkey),
            Cmd::Push(raw_script_bytes(&redeem)),
        ]);
        let script_pubkey = Script::p2sh(&redeem_hash);

        assert!(evaluate(&script_sig, &script_pubkey, b"z", &AlwaysTrue));
        assert!(!evaluate(&script_sig, &script_pubkey, b"z", &AlwaysFalse));
    }

    #[test]
    fn p2sh_multisig_redeem_verifies() {
        let pub1 = vec![0x02; 33];
        let pub2 = vec![0x03; 33];
        let redeem = two_of_two_multisig_redeem(&pub1, &pub2);

        let mut redeem_hash = [0u8; 20];
        redeem_hash.copy_from_slice(&crate::codec::hash160(&raw_script_bytes(&redeem)));

        // Before the P2SH-splice fix, the leftover OP_EQUAL result from the
        // main loop shifted every positional pop in OP_CHECKMULTISIG by one,
        // so this would fail even under a verifier that always succeeds.
        let script_sig = Script::new(vec![
            Cmd::Op(0x00), // OP_0 dummy
            Cmd::Push(vec![0xaa]),
            Cmd::Push(vec![0xbb]),
            Cmd::Push(raw_script_bytes(&redeem)),
        ]);
        let script_pubkey = Script::p2sh(&redeem_hash);

        assert!(evaluate(&script_sig, &script_pubkey, b"z", &AlwaysTrue));
        assert!(!evaluate(&script_sig, &script_pubkey, b"z", &AlwaysFalse));
    }
}
