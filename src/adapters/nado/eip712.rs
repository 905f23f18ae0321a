//! Nado EIP-712 structs
//!
//! Typed-data hashing for orders and cancellations. Hashes are built by hand
//! with `ethers::abi::encode` the same way the registration proof is signed
//! on Vest, so no derive macros are involved.

use std::str::FromStr;

use ethers::abi::{encode, Token};
use ethers::core::types::{Address, H256, I256, U256};
use ethers::core::utils::keccak256;
use ethers::signers::LocalWallet;

use crate::adapters::errors::{ExchangeError, ExchangeResult};

use super::constants::{EIP712_DOMAIN_NAME, VERSION};

pub const DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

// =============================================================================
// Payload trait
// =============================================================================

/// A struct that can be hashed under the Nado EIP-712 domain
pub trait TypedPayload {
    /// Canonical `Name(type field,...)` string
    const TYPE: &'static str;

    /// Field values in declaration order, already reduced to 32-byte words
    fn encode_fields(&self) -> Vec<Token>;

    fn type_hash() -> [u8; 32] {
        keccak256(Self::TYPE)
    }

    fn struct_hash(&self) -> [u8; 32] {
        let mut tokens = vec![Token::FixedBytes(Self::type_hash().to_vec())];
        tokens.extend(self.encode_fields());
        keccak256(encode(&tokens))
    }
}

/// Two's-complement word for a signed 128-bit field
fn int128(value: i128) -> Token {
    Token::Int(I256::from(value).into_raw())
}

/// Hash of a dynamic array: keccak of its concatenated 32-byte elements
fn array_hash(words: &[Token]) -> Token {
    Token::FixedBytes(keccak256(encode(words)).to_vec())
}

// =============================================================================
// Structs
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub sender: [u8; 32],
    pub price_x18: i128,
    /// Positive buys, negative sells
    pub amount: i128,
    pub expiration: u64,
    pub nonce: u64,
    pub appendix: u128,
}

impl TypedPayload for Order {
    const TYPE: &'static str = "Order(bytes32 sender,int128 priceX18,int128 amount,uint64 expiration,uint64 nonce,uint128 appendix)";

    fn encode_fields(&self) -> Vec<Token> {
        vec![
            Token::FixedBytes(self.sender.to_vec()),
            int128(self.price_x18),
            int128(self.amount),
            Token::Uint(U256::from(self.expiration)),
            Token::Uint(U256::from(self.nonce)),
            Token::Uint(U256::from(self.appendix)),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cancellation {
    pub sender: [u8; 32],
    pub product_ids: Vec<u32>,
    pub digests: Vec<[u8; 32]>,
    pub nonce: u64,
}

impl TypedPayload for Cancellation {
    const TYPE: &'static str =
        "Cancellation(bytes32 sender,uint32[] productIds,bytes32[] digests,uint64 nonce)";

    fn encode_fields(&self) -> Vec<Token> {
        let products: Vec<Token> = self.product_ids.iter().map(|p| Token::Uint(U256::from(*p))).collect();
        let digests: Vec<Token> = self.digests.iter().map(|d| Token::FixedBytes(d.to_vec())).collect();
        vec![
            Token::FixedBytes(self.sender.to_vec()),
            array_hash(&products),
            array_hash(&digests),
            Token::Uint(U256::from(self.nonce)),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancellationProducts {
    pub sender: [u8; 32],
    pub product_ids: Vec<u32>,
    pub nonce: u64,
}

impl TypedPayload for CancellationProducts {
    const TYPE: &'static str = "CancellationProducts(bytes32 sender,uint32[] productIds,uint64 nonce)";

    fn encode_fields(&self) -> Vec<Token> {
        let products: Vec<Token> = self.product_ids.iter().map(|p| Token::Uint(U256::from(*p))).collect();
        vec![
            Token::FixedBytes(self.sender.to_vec()),
            array_hash(&products),
            Token::Uint(U256::from(self.nonce)),
        ]
    }
}

// =============================================================================
// Domain, digest, signature
// =============================================================================

pub fn domain_separator(verifying_contract: &str, chain_id: u64) -> ExchangeResult<[u8; 32]> {
    let contract = Address::from_str(verifying_contract).map_err(|e| {
        ExchangeError::InvalidInput(format!("invalid verifying contract {:?}: {}", verifying_contract, e))
    })?;
    Ok(keccak256(encode(&[
        Token::FixedBytes(keccak256(DOMAIN_TYPE).to_vec()),
        Token::FixedBytes(keccak256(EIP712_DOMAIN_NAME).to_vec()),
        Token::FixedBytes(keccak256(VERSION).to_vec()),
        Token::Uint(U256::from(chain_id)),
        Token::Address(contract),
    ])))
}

/// `0x1901 || domainSeparator || structHash`
pub fn signable_bytes<P: TypedPayload>(
    payload: &P,
    verifying_contract: &str,
    chain_id: u64,
) -> ExchangeResult<Vec<u8>> {
    let mut data = Vec::with_capacity(66);
    data.push(0x19);
    data.push(0x01);
    data.extend_from_slice(&domain_separator(verifying_contract, chain_id)?);
    data.extend_from_slice(&payload.struct_hash());
    Ok(data)
}

/// `0x` + keccak256 of `signable` as hex
pub fn generate_digest(signable: &[u8]) -> String {
    format!("0x{}", hex::encode(keccak256(signable)))
}

/// Sign a payload; returns `(signature, digest)` as 0x-prefixed hex
///
/// The digest is the EIP-712 hash, which Nado also uses as the order id.
pub fn sign_payload<P: TypedPayload>(
    payload: &P,
    verifying_contract: &str,
    chain_id: u64,
    wallet: &LocalWallet,
) -> ExchangeResult<(String, String)> {
    let signable = signable_bytes(payload, verifying_contract, chain_id)?;
    let hash = keccak256(&signable);

    let signature = wallet
        .sign_hash(H256::from(hash))
        .map_err(|e| ExchangeError::AuthenticationFailed(format!("EIP-712 signing failed: {}", e)))?;

    let mut sig_bytes = signature.to_vec();
    if sig_bytes.len() != 65 {
        return Err(ExchangeError::AuthenticationFailed(format!(
            "Invalid signature length: {} (expected 65)",
            sig_bytes.len()
        )));
    }
    if sig_bytes[64] < 27 {
        sig_bytes[64] += 27;
    }

    Ok((format!("0x{}", hex::encode(sig_bytes)), format!("0x{}", hex::encode(hash))))
}
