//! Chain derivation properties every implementation must share.
//!
//! Each link hashes the lowercase hex text of the previous digest, so these
//! values can be reproduced with nothing more than `sha256sum`:
//!
//! ```text
//! printf 'secret123' | sha256sum                 -> chain[0]
//! printf '<chain[0] hex>' | sha256sum            -> chain[1]
//! ```

use tinypay_otp::core::{step, steps_to_commitment, verify_step, CHAIN_LENGTH};
use tinypay_otp::{generate, Chain, ChainState, Digest, INITIAL_CURSOR, TAIL_INDEX};

const ROOT: &str = "secret123";
const HEAD: &str = "fcf730b6d95236ecd3c9fc2d92d7b6b2bb061514961aec041d6c7a7192f592e4";
const SECOND: &str = "b2bb19ef0a8d0329f0813d359b7036ff3abd66a12c7ebba761d76b0c2bff2876";
const FIRST_CODE: &str = "b7b967a63a3a6d58e86387098af5fa6e51af1716e15096dce2bff808d58d2ebb";
const TAIL: &str = "32bcb7a7cb08c3ec9a35942d7b05c5aa1bdb811a35c530d4a826bfd0d8e71a41";

#[test]
fn test_golden_chain() {
    let chain = generate(ROOT);
    assert_eq!(chain.len(), CHAIN_LENGTH);
    assert_eq!(chain.get(0).unwrap().to_hex(), HEAD);
    assert_eq!(chain.get(1).unwrap().to_hex(), SECOND);
    assert_eq!(chain.get(INITIAL_CURSOR as usize).unwrap().to_hex(), FIRST_CODE);
    assert_eq!(chain.tail().to_hex(), TAIL);
}

#[test]
fn test_generation_is_deterministic() {
    assert_eq!(generate(ROOT), generate(ROOT));
    assert_ne!(generate(ROOT).tail(), generate("secret124").tail());
}

#[test]
fn test_every_link_holds() {
    let chain = generate(ROOT);
    for i in 0..TAIL_INDEX {
        assert_eq!(
            &step(chain.get(i).unwrap()),
            chain.get(i + 1).unwrap(),
            "link {i} -> {}",
            i + 1
        );
    }
}

#[test]
fn test_first_code_is_neither_head_nor_tail() {
    let mut state = ChainState::new();
    state.initialize(generate(ROOT), "0xpayer", 0.0);
    let code = state.current_code().unwrap();
    assert_eq!(code.index, 998);
    assert_ne!(code.digest.to_hex(), HEAD);
    assert_ne!(code.digest.to_hex(), TAIL);
}

#[test]
fn test_shown_codes_verify_against_tail() {
    let chain = generate(ROOT);
    let tail = chain.tail();

    let first = chain.get(998).unwrap();
    assert!(verify_step(first, tail));
    assert_eq!(steps_to_commitment(first, tail, 1), Some(1));

    // A verifier that missed codes can still walk forward to the tail.
    let later = chain.get(990).unwrap();
    assert!(!verify_step(later, tail));
    assert_eq!(steps_to_commitment(later, tail, 16), Some(9));
    assert_eq!(steps_to_commitment(later, tail, 8), None);
}

#[test]
fn test_rebuilt_chain_must_link() {
    let mut digests: Vec<Digest> = generate(ROOT).iter().copied().collect();
    assert!(Chain::from_digests(digests.clone()).is_ok());

    digests[500] = Digest::ZERO;
    assert!(Chain::from_digests(digests).is_err());
}
