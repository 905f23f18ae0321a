//! Vest Signing
//!
//! Private REST actions are authorized by a personal-sign signature over the
//! ABI-encoded action fields, made with the delegate signing key. The signing
//! key itself is registered once with an EIP-712 `SignerProof` from the
//! primary key.

use std::str::FromStr;
use std::sync::{Arc, RwLock};

use ethers::abi::{encode, Token};
use ethers::core::types::{Address, H256, U256};
use ethers::core::utils::{hash_message, keccak256};
use ethers::signers::{LocalWallet, Signer};
use rust_decimal::Decimal;
use serde_json::{json, Value};

use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::adapters::types::current_time_ms;

use super::config::VestConfig;
use super::constants;

/// Registration proofs stay valid for 7 days
const SIGNER_EXPIRY_MS: u64 = 7 * 24 * 3600 * 1000;

pub fn expiry_7_days_ms() -> u64 {
    current_time_ms().saturating_add(SIGNER_EXPIRY_MS)
}

// =============================================================================
// Action categories
// =============================================================================

/// Signed POST routes and the field tuple each one signs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignedAction {
    Order,
    Cancel,
    Liquidity,
    Withdraw,
}

impl SignedAction {
    pub fn for_path(path: &str) -> Option<Self> {
        match path {
            constants::ORDERS_PATH_URL => Some(Self::Order),
            constants::ORDERS_CANCEL_PATH_URL => Some(Self::Cancel),
            constants::LP_PATH_URL => Some(Self::Liquidity),
            constants::TRANSFER_WITHDRAW_PATH_URL => Some(Self::Withdraw),
            _ => None,
        }
    }

    /// ABI tokens in the order the server reconstructs them
    pub fn tokens(&self, order: &Value) -> ExchangeResult<Vec<Token>> {
        let mut tokens = vec![uint_field(order, "time")?, uint_field(order, "nonce")?];
        match self {
            Self::Order => tokens.extend([
                string_field(order, "orderType")?,
                string_field(order, "symbol")?,
                bool_field(order, "isBuy")?,
                string_field(order, "size")?,
                string_field(order, "limitPrice")?,
                bool_field(order, "reduceOnly")?,
            ]),
            Self::Cancel => tokens.push(string_field(order, "id")?),
            Self::Liquidity => tokens.extend([string_field(order, "orderType")?, string_field(order, "size")?]),
            Self::Withdraw => tokens.extend([
                Token::Bool(false),
                address_field(order, "account")?,
                address_field(order, "recipient")?,
                address_field(order, "token")?,
                uint_field(order, "size")?,
                uint_field(order, "chainId")?,
            ]),
        }
        Ok(tokens)
    }
}

fn field<'a>(order: &'a Value, name: &str) -> ExchangeResult<&'a Value> {
    order
        .get(name)
        .ok_or_else(|| ExchangeError::InvalidInput(format!("Missing '{}' in signed payload", name)))
}

fn uint_field(order: &Value, name: &str) -> ExchangeResult<Token> {
    let value = match field(order, name)? {
        Value::Number(n) => match n.as_u64() {
            Some(v) => Some(U256::from(v)),
            None => parse_uint(&n.to_string()),
        },
        Value::String(s) => parse_uint(s),
        other => {
            return Err(ExchangeError::InvalidInput(format!("'{}' has unexpected type: {}", name, other)));
        }
    };
    value
        .map(Token::Uint)
        .ok_or_else(|| ExchangeError::InvalidInput(format!("'{}' is not an unsigned integer", name)))
}

/// Unsigned integer from decimal text; numbers past u64 arrive as floats ("1e20")
fn parse_uint(text: &str) -> Option<U256> {
    let text = text.trim();
    if let Ok(value) = U256::from_dec_str(text) {
        return Some(value);
    }
    let value = Decimal::from_str(text).or_else(|_| Decimal::from_scientific(text)).ok()?;
    if value.is_sign_negative() || !value.fract().is_zero() {
        return None;
    }
    U256::from_dec_str(&value.trunc().normalize().to_string()).ok()
}

fn string_field(order: &Value, name: &str) -> ExchangeResult<Token> {
    match field(order, name)? {
        Value::String(s) => Ok(Token::String(s.clone())),
        Value::Number(n) => Ok(Token::String(n.to_string())),
        other => Err(ExchangeError::InvalidInput(format!("'{}' has unexpected type: {}", name, other))),
    }
}

fn bool_field(order: &Value, name: &str) -> ExchangeResult<Token> {
    field(order, name)?
        .as_bool()
        .map(Token::Bool)
        .ok_or_else(|| ExchangeError::InvalidInput(format!("'{}' is not a boolean", name)))
}

fn address_field(order: &Value, name: &str) -> ExchangeResult<Token> {
    let raw = field(order, name)?
        .as_str()
        .ok_or_else(|| ExchangeError::InvalidInput(format!("'{}' is not an address string", name)))?;
    Address::from_str(raw)
        .map(Token::Address)
        .map_err(|e| ExchangeError::InvalidInput(format!("Invalid address '{}': {}", raw, e)))
}

/// keccak256 of the ABI-encoded tuple; the value wrapped by personal-sign
pub fn action_hash(tokens: &[Token]) -> [u8; 32] {
    keccak256(encode(tokens))
}

/// 65-byte signature as 0x-hex with v in {27, 28}
fn signature_hex(signature: ethers::core::types::Signature) -> ExchangeResult<String> {
    let mut sig_bytes = signature.to_vec();
    if sig_bytes.len() != 65 {
        return Err(ExchangeError::AuthenticationFailed(format!(
            "Invalid signature length: {} (expected 65)",
            sig_bytes.len()
        )));
    }
    let v = sig_bytes[64];
    if v == 0 || v == 1 {
        sig_bytes[64] = v + 27;
    } else if !matches!(v, 27 | 28) {
        return Err(ExchangeError::AuthenticationFailed(format!(
            "Invalid signature v value: {} (expected 0, 1, 27, or 28)",
            v
        )));
    }
    Ok(format!("0x{}", hex::encode(sig_bytes)))
}

// =============================================================================
// Registration proof
// =============================================================================

/// `SignerProof(address approvedSigner,uint256 signerExpiry)`, signed by the primary key
#[derive(Debug, Clone)]
pub(crate) struct SignerProof {
    pub approved_signer: Address,
    pub signer_expiry: U256,
}

impl SignerProof {
    const TYPE: &'static str = "SignerProof(address approvedSigner,uint256 signerExpiry)";

    fn struct_hash(&self) -> [u8; 32] {
        keccak256(encode(&[
            Token::FixedBytes(keccak256(Self::TYPE).to_vec()),
            Token::Address(self.approved_signer),
            Token::Uint(self.signer_expiry),
        ]))
    }

    /// EIP-712 digest under `VestRouterV2`/`0.0.1` for `verifying_contract`
    pub fn digest(&self, verifying_contract: Address) -> [u8; 32] {
        let domain_separator = keccak256(encode(&[
            Token::FixedBytes(keccak256("EIP712Domain(string name,string version,address verifyingContract)").to_vec()),
            Token::FixedBytes(keccak256("VestRouterV2").to_vec()),
            Token::FixedBytes(keccak256("0.0.1").to_vec()),
            Token::Address(verifying_contract),
        ]));

        let mut data = Vec::with_capacity(66);
        data.extend_from_slice(&[0x19, 0x01]);
        data.extend_from_slice(&domain_separator);
        data.extend_from_slice(&self.struct_hash());
        keccak256(&data)
    }
}

/// Body for POST `/register`
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationProof {
    pub signature: String,
    pub signing_addr: String,
    pub primary_addr: String,
    pub expiry_ms: u64,
}

impl RegistrationProof {
    pub fn to_body(&self) -> Value {
        json!({
            "signingAddr": self.signing_addr,
            "primaryAddr": self.primary_addr,
            "signature": self.signature,
            "expiryTime": self.expiry_ms,
            "networkType": 0
        })
    }
}

// =============================================================================
// VestAuth
// =============================================================================

#[derive(Clone)]
pub struct VestAuth {
    signing_wallet: LocalWallet,
    api_key: Arc<RwLock<Option<String>>>,
    account_group: u8,
}

impl std::fmt::Debug for VestAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VestAuth")
            .field("signer", &self.signer_address())
            .field("account_group", &self.account_group)
            .field("api_key_set", &self.api_key().is_some())
            .finish()
    }
}

impl VestAuth {
    pub fn new(signing_key: &str, api_key: Option<String>, account_group: u8) -> ExchangeResult<Self> {
        let signing_wallet: LocalWallet = signing_key
            .parse()
            .map_err(|e| ExchangeError::AuthenticationFailed(format!("Invalid signing key: {}", e)))?;
        Ok(Self {
            signing_wallet,
            api_key: Arc::new(RwLock::new(api_key)),
            account_group,
        })
    }

    pub fn from_config(config: &VestConfig) -> ExchangeResult<Self> {
        Self::new(&config.signing_key, config.api_key.clone(), config.account_group)
    }

    pub fn api_key(&self) -> Option<String> {
        self.api_key.read().ok().and_then(|key| key.clone())
    }

    /// Install the key returned by `/register`; shared by every clone
    pub fn set_api_key(&self, api_key: String) {
        if let Ok(mut key) = self.api_key.write() {
            *key = Some(api_key);
        }
    }

    pub fn signer_address(&self) -> String {
        format!("{:?}", self.signing_wallet.address())
    }

    pub fn rest_server(&self) -> String {
        format!("restserver{}", self.account_group)
    }

    /// `X-API-KEY` (when known) and the `xrestservermm` routing header
    pub fn rest_headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![("xrestservermm", self.rest_server())];
        if let Some(key) = self.api_key() {
            headers.push(("X-API-KEY", key));
        }
        headers
    }

    /// Personal-sign the ABI-encoded tokens with the signing key
    pub fn sign_tokens(&self, tokens: &[Token]) -> ExchangeResult<String> {
        let digest = hash_message(action_hash(tokens));
        let signature = self
            .signing_wallet
            .sign_hash(digest)
            .map_err(|e| ExchangeError::AuthenticationFailed(format!("Message signing failed: {}", e)))?;
        signature_hex(signature)
    }

    /// Insert `signature` into the body of a signed POST; other paths pass through
    pub fn sign_request_body(&self, path: &str, body: &mut Value) -> ExchangeResult<()> {
        let Some(action) = SignedAction::for_path(path) else {
            return Ok(());
        };
        let order = body
            .get("order")
            .ok_or_else(|| ExchangeError::InvalidInput(format!("{} body has no 'order' object", path)))?;
        let signature = self.sign_tokens(&action.tokens(order)?)?;

        match body.as_object_mut() {
            Some(map) => {
                map.insert("signature".to_string(), Value::String(signature));
                Ok(())
            }
            None => Err(ExchangeError::InvalidInput(format!("{} body is not an object", path))),
        }
    }

    /// Websocket requests carry no signature
    pub fn ws_authenticate(&self, request: Value) -> Value {
        request
    }

    /// Sign a `SignerProof` for this signing key with the primary key
    pub fn registration_proof(
        &self,
        primary_addr: &str,
        primary_key: &str,
        verifying_contract: &str,
        expiry_ms: u64,
    ) -> ExchangeResult<RegistrationProof> {
        let primary_wallet: LocalWallet = primary_key
            .parse()
            .map_err(|e| ExchangeError::AuthenticationFailed(format!("Invalid primary key: {}", e)))?;
        let contract = Address::from_str(verifying_contract).map_err(|e| {
            ExchangeError::AuthenticationFailed(format!("Invalid verifying contract: {}", e))
        })?;

        let proof = SignerProof {
            approved_signer: self.signing_wallet.address(),
            signer_expiry: U256::from(expiry_ms),
        };
        let signature = primary_wallet
            .sign_hash(H256::from(proof.digest(contract)))
            .map_err(|e| ExchangeError::AuthenticationFailed(format!("EIP-712 signing failed: {}", e)))?;

        Ok(RegistrationProof {
            signature: signature_hex(signature)?,
            signing_addr: self.signer_address().to_lowercase(),
            primary_addr: primary_addr.to_lowercase(),
            expiry_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::vest::config::{TEST_PRIMARY_ADDR, TEST_PRIMARY_KEY, TEST_SIGNING_KEY};
    use ethers::core::types::Signature;

    fn auth() -> VestAuth {
        VestAuth::new(TEST_SIGNING_KEY, Some("jwt".into()), 3).unwrap()
    }

    fn recover(signature: &str, tokens: &[Token]) -> Address {
        let signature = Signature::from_str(signature.trim_start_matches("0x")).unwrap();
        assert!(signature.v == 27 || signature.v == 28);
        signature.recover(hash_message(action_hash(tokens))).unwrap()
    }

    fn signer() -> Address {
        TEST_SIGNING_KEY.parse::<LocalWallet>().unwrap().address()
    }

    #[test]
    fn test_expiry_7_days_ms() {
        let now = current_time_ms();
        let expiry = expiry_7_days_ms();
        assert!(expiry - now >= SIGNER_EXPIRY_MS - 1000);
    }

    #[test]
    fn test_headers() {
        let headers = auth().rest_headers();
        assert!(headers.contains(&("xrestservermm", "restserver3".to_string())));
        assert!(headers.contains(&("X-API-KEY", "jwt".to_string())));

        let unregistered = VestAuth::new(TEST_SIGNING_KEY, None, 0).unwrap();
        assert_eq!(unregistered.rest_headers().len(), 1);
        unregistered.set_api_key("later".into());
        assert_eq!(unregistered.clone().api_key().as_deref(), Some("later"));
    }

    #[test]
    fn test_order_signature_recovers_signer() {
        let mut body = json!({
            "order": {
                "time": 1_700_000_000_000u64,
                "nonce": 1_700_000_000_000u64,
                "orderType": "LIMIT",
                "symbol": "BTC-PERP",
                "isBuy": true,
                "size": "0.01",
                "limitPrice": "50000",
                "reduceOnly": false
            },
            "recvWindow": 60000
        });
        auth().sign_request_body(constants::ORDERS_PATH_URL, &mut body).unwrap();
        let signature = body["signature"].as_str().unwrap().to_string();
        assert_eq!(signature.len(), 132);

        let tokens = SignedAction::Order.tokens(&body["order"]).unwrap();
        assert_eq!(tokens.len(), 8);
        assert_eq!(recover(&signature, &tokens), signer());
    }

    /// Reference order vector and its sample signing key
    const REFERENCE_SIGNING_KEY: &str = "0xec4509d25bbb3ee0bdda08e3d23f82f94c3e0916bd4e1dd195e19d3a48de63fb";
    const REFERENCE_SIGNER: &str = "0x73c5ff70c640e43ce389467e827ea39f17cacf55";
    /// keccak256 of abi.encode(1683849600076, 0, "LIMIT", "BTC-PERP", true, "0.1000", "30000.00", false)
    const REFERENCE_ARGS_HASH: &str = "3ca5732cc539210117511371c1b87d49e00dad90972b4c5315f1c58a644105e3";
    /// keccak256("\x19Ethereum Signed Message:\n32" ++ args hash)
    const REFERENCE_MESSAGE_HASH: &str = "e894bd0d3034e8c3b0425326a1e6f5e5ec6be0860122883eaa34ec6cfd6b7285";

    #[test]
    fn test_reference_order_recovers_signer() {
        let auth = VestAuth::new(REFERENCE_SIGNING_KEY, Some("jwt".into()), 0).unwrap();
        let mut body = json!({
            "order": {
                "time": 1683849600076u64,
                "nonce": 0,
                "symbol": "BTC-PERP",
                "isBuy": true,
                "size": "0.1000",
                "orderType": "LIMIT",
                "limitPrice": "30000.00",
                "reduceOnly": false
            },
            "recvWindow": 60000
        });
        auth.sign_request_body(constants::ORDERS_PATH_URL, &mut body).unwrap();

        let tokens = SignedAction::Order.tokens(&body["order"]).unwrap();
        assert_eq!(hex::encode(action_hash(&tokens)), REFERENCE_ARGS_HASH);

        let args_hash = hex::decode(REFERENCE_ARGS_HASH).unwrap();
        let message = hash_message(&args_hash);
        assert_eq!(hex::encode(message.as_bytes()), REFERENCE_MESSAGE_HASH);

        let signature = Signature::from_str(body["signature"].as_str().unwrap().trim_start_matches("0x")).unwrap();
        assert_eq!(signature.recover(message).unwrap(), Address::from_str(REFERENCE_SIGNER).unwrap());
    }

    #[test]
    fn test_uint_field_beyond_u64() {
        let wei = U256::exp10(20);
        let float_number: Value = serde_json::from_str(r#"{"size": 100000000000000000000}"#).unwrap();
        assert_eq!(uint_field(&float_number, "size").unwrap(), Token::Uint(wei));
        assert_eq!(uint_field(&json!({"size": 1e20}), "size").unwrap(), Token::Uint(wei));
        assert_eq!(
            uint_field(&json!({"size": "340282366920938463463374607431768211456"}), "size").unwrap(),
            Token::Uint(U256::from(u128::MAX) + U256::one())
        );
        assert!(uint_field(&json!({"size": -5}), "size").is_err());
        assert!(uint_field(&json!({"size": 1.5}), "size").is_err());
        assert!(uint_field(&json!({"size": "abc"}), "size").is_err());
    }

    #[test]
    fn test_cancel_and_lp_signatures() {
        let mut cancel = json!({"order": {"time": 1u64, "nonce": 2u64, "id": "0xabc"}});
        auth().sign_request_body(constants::ORDERS_CANCEL_PATH_URL, &mut cancel).unwrap();
        let tokens = SignedAction::Cancel.tokens(&cancel["order"]).unwrap();
        assert_eq!(recover(cancel["signature"].as_str().unwrap(), &tokens), signer());

        let mut lp = json!({"order": {"time": 1u64, "nonce": 2u64, "orderType": "MINT", "size": "10"}});
        auth().sign_request_body(constants::LP_PATH_URL, &mut lp).unwrap();
        let tokens = SignedAction::Liquidity.tokens(&lp["order"]).unwrap();
        assert_eq!(tokens.len(), 4);
        assert_eq!(recover(lp["signature"].as_str().unwrap(), &tokens), signer());
    }

    #[test]
    fn test_withdraw_signature() {
        let mut body = json!({
            "order": {
                "time": 1u64,
                "nonce": 1u64,
                "account": TEST_PRIMARY_ADDR,
                "recipient": TEST_PRIMARY_ADDR,
                "token": "0x0000000000000000000000000000000000000001",
                "size": "1000000",
                "chainId": 324
            }
        });
        auth().sign_request_body(constants::TRANSFER_WITHDRAW_PATH_URL, &mut body).unwrap();
        let tokens = SignedAction::Withdraw.tokens(&body["order"]).unwrap();
        assert_eq!(tokens[2], Token::Bool(false));
        assert_eq!(recover(body["signature"].as_str().unwrap(), &tokens), signer());
    }

    #[test]
    fn test_field_order_changes_hash() {
        let order = json!({"time": 1u64, "nonce": 2u64, "id": "x"});
        let swapped = json!({"time": 2u64, "nonce": 1u64, "id": "x"});
        assert_ne!(
            action_hash(&SignedAction::Cancel.tokens(&order).unwrap()),
            action_hash(&SignedAction::Cancel.tokens(&swapped).unwrap())
        );
    }

    #[test]
    fn test_unsigned_paths_pass_through() {
        let mut body = json!({"order": {"time": 1u64}});
        auth().sign_request_body(constants::ACCOUNT_LEVERAGE_PATH_URL, &mut body).unwrap();
        assert!(body.get("signature").is_none());

        let request = json!({"method": "SUBSCRIBE", "params": ["tickers"], "id": 1});
        assert_eq!(auth().ws_authenticate(request.clone()), request);
    }

    #[test]
    fn test_missing_fields_are_rejected() {
        let mut body = json!({"order": {"time": 1u64, "nonce": 1u64}});
        let err = auth().sign_request_body(constants::ORDERS_PATH_URL, &mut body).unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidInput(_)));

        let mut no_order = json!({"id": "x"});
        assert!(auth().sign_request_body(constants::ORDERS_CANCEL_PATH_URL, &mut no_order).is_err());
    }

    #[test]
    fn test_registration_proof_recovers_primary() {
        let expiry = 1_800_000_000_000u64;
        let proof = auth()
            .registration_proof(TEST_PRIMARY_ADDR, TEST_PRIMARY_KEY, constants::VERIFYING_CONTRACT_DEV, expiry)
            .unwrap();
        assert_eq!(proof.signing_addr, auth().signer_address().to_lowercase());
        assert_eq!(proof.primary_addr, TEST_PRIMARY_ADDR.to_lowercase());

        let signed = SignerProof {
            approved_signer: signer(),
            signer_expiry: U256::from(expiry),
        };
        let digest = H256::from(signed.digest(Address::from_str(constants::VERIFYING_CONTRACT_DEV).unwrap()));
        let signature = Signature::from_str(proof.signature.trim_start_matches("0x")).unwrap();
        assert_eq!(signature.recover(digest).unwrap(), Address::from_str(TEST_PRIMARY_ADDR).unwrap());

        let body = proof.to_body();
        assert_eq!(body["expiryTime"], expiry);
        assert_eq!(body["networkType"], 0);
    }
}
