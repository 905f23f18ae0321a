//! Nado request authentication
//!
//! Nado authenticates executes by EIP-712 signature only; REST and websocket
//! requests carry no headers. `NadoAuth` owns the wallet and the derived
//! 32-byte sender (address plus "default" subaccount).

use ethers::signers::{LocalWallet, Signer};

use crate::adapters::errors::{ExchangeError, ExchangeResult};

use super::eip712::{self, TypedPayload};
use super::utils;

#[derive(Clone)]
pub struct NadoAuth {
    wallet: LocalWallet,
    address: String,
    sender: String,
}

impl std::fmt::Debug for NadoAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NadoAuth")
            .field("address", &self.address)
            .field("sender", &self.sender)
            .finish_non_exhaustive()
    }
}

impl NadoAuth {
    pub fn new(address: &str, private_key: &str) -> ExchangeResult<Self> {
        let wallet: LocalWallet = private_key
            .parse()
            .map_err(|e| ExchangeError::AuthenticationFailed(format!("Invalid private key: {}", e)))?;
        let sender = utils::convert_address_to_sender(address)?;
        if format!("{:?}", wallet.address()) != address.to_lowercase() {
            tracing::warn!(
                exchange = "nado",
                address = %address,
                "Private key does not belong to the configured address (linked signer?)"
            );
        }
        Ok(Self {
            wallet,
            address: address.to_string(),
            sender,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Subaccount identifier as 0x + 64 hex
    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn sender_bytes(&self) -> ExchangeResult<[u8; 32]> {
        utils::hex_to_bytes32(&self.sender)
    }

    /// Sign under the Nado domain for `verifying_contract`; returns `(signature, digest)`
    pub fn sign_payload<P: TypedPayload>(
        &self,
        payload: &P,
        verifying_contract: &str,
        chain_id: u64,
    ) -> ExchangeResult<(String, String)> {
        eip712::sign_payload(payload, verifying_contract, chain_id, &self.wallet)
    }
}

#[cfg(test)]
pub const TEST_PRIVATE_KEY: &str = "5500eb16bf3692840e04fb6a63547b9a80b75d9cbb36b43ca5662127d4c19c83";
#[cfg(test)]
pub const TEST_ADDRESS: &str = "0x2162Db26939B9EAF0C5404217774d166056d31B5";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::nado::eip712::Order;

    #[test]
    fn test_sender_derivation() {
        let auth = NadoAuth::new(TEST_ADDRESS, TEST_PRIVATE_KEY).unwrap();
        assert_eq!(
            auth.sender(),
            "0x2162Db26939B9EAF0C5404217774d166056d31B564656661756c740000000000"
        );
        let bytes = auth.sender_bytes().unwrap();
        assert_eq!(&bytes[20..27], b"default");
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(
            NadoAuth::new(TEST_ADDRESS, "nothex"),
            Err(ExchangeError::AuthenticationFailed(_))
        ));
        assert!(matches!(
            NadoAuth::new("0xnotanaddress", TEST_PRIVATE_KEY),
            Err(ExchangeError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_sign_payload_through_auth() {
        let auth = NadoAuth::new(TEST_ADDRESS, TEST_PRIVATE_KEY).unwrap();
        let order = Order {
            sender: auth.sender_bytes().unwrap(),
            price_x18: 26_383_000_000_000_000_000_000,
            amount: 2_292_000_000_000_000_000,
            expiration: 1_685_989_016,
            nonce: 1_767_924_162_661_187_978,
            appendix: 1,
        };
        let contract = "0x0000000000000000000000000000000000000002";
        let first = auth.sign_payload(&order, contract, 763373).unwrap();
        let second = auth.sign_payload(&order, contract, 763373).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.0.len(), 132);
        assert_eq!(first.1.len(), 66);
    }
}
