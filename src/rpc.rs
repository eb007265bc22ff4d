use crate::{
    transaction::Transaction,
    wallets::{
        Acknowledgment,
        KeystoreSigner,
        WalletConnector,
    },
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use reqwest::StatusCode;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    sync::atomic::{
        AtomicU64,
        Ordering,
    },
};

pub const EXECUTE_METHOD: &str = "coinflip_executeTransaction";

/// Error object returned by the wallet relay. Contract aborts surface here
/// with the abort details in `message`.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
pub struct RelayError {
    pub code: i64,
    pub message: String,
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "relay error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for RelayError {}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: (&'a Transaction, String, String),
}

#[derive(Deserialize)]
struct ExecuteResult {
    digest: String,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<ExecuteResult>,
    #[serde(default)]
    error: Option<RelayError>,
}

/// Keystore-backed wallet that signs locally and hands the signed call to a
/// JSON-RPC wallet relay for execution.
pub struct RpcWallet {
    signer: KeystoreSigner,
    endpoint: String,
    http: reqwest::Client,
    connected: bool,
    next_id: AtomicU64,
}

impl RpcWallet {
    pub fn new(signer: KeystoreSigner, endpoint: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .build()
            .wrap_err("failed to build HTTP client for wallet relay")?;
        Ok(Self {
            signer,
            endpoint,
            http,
            connected: true,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl WalletConnector for RpcWallet {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        tracing::info!(wallet = %self.signer.name(), endpoint = %self.endpoint, "wallet connected");
        Ok(())
    }

    fn disconnect(&mut self) {
        self.connected = false;
        tracing::info!(wallet = %self.signer.name(), "wallet disconnected");
    }

    fn label(&self) -> String {
        let key = self.signer.public_key_hex();
        format!("{} ({}…)", self.signer.name(), &key[..8])
    }

    async fn sign_and_execute(&self, transaction: &Transaction) -> Result<Acknowledgment> {
        if !self.connected {
            return Err(eyre!("Wallet is not connected"));
        }
        let signature = self.signer.sign(transaction)?;
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method: EXECUTE_METHOD,
            params: (transaction, signature, self.signer.public_key_hex()),
        };
        tracing::debug!(call = %transaction.target, id = request.id, "submitting transaction");
        let res = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .wrap_err("wallet relay request failed")?;
        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .wrap_err("failed to read wallet relay response body")?;
        parse_response(status, &bytes)
    }
}

pub(crate) fn parse_response(status: StatusCode, bytes: &[u8]) -> Result<Acknowledgment> {
    if !status.is_success() {
        let body = String::from_utf8_lossy(bytes);
        return Err(eyre!("wallet relay responded with {status}: {body}"));
    }
    let response: RpcResponse =
        serde_json::from_slice(bytes).wrap_err("invalid wallet relay payload")?;
    if let Some(error) = response.error {
        return Err(error.into());
    }
    let result = response
        .result
        .ok_or_else(|| eyre!("wallet relay returned neither result nor error"))?;
    Ok(Acknowledgment {
        digest: result.digest,
    })
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn parse_response__returns_digest_on_success() {
        // given
        let body = br#"{"jsonrpc":"2.0","id":1,"result":{"digest":"9xQe"}}"#;

        // when
        let ack = parse_response(StatusCode::OK, body).unwrap();

        // then
        assert_eq!(ack.digest, "9xQe");
    }

    #[test]
    fn parse_response__keeps_relay_error_downcastable() {
        // given
        let body = br#"{"jsonrpc":"2.0","id":1,"error":{"code":-32002,"message":"MoveAbort in claim, code 1"}}"#;

        // when
        let err = parse_response(StatusCode::OK, body).unwrap_err();

        // then
        let relay = err.downcast_ref::<RelayError>().unwrap();
        assert_eq!(relay.code, -32002);
        assert!(relay.message.contains("MoveAbort"));
    }

    #[test]
    fn parse_response__reports_http_failures() {
        let err = parse_response(StatusCode::BAD_GATEWAY, b"upstream down").unwrap_err();
        assert!(err.to_string().contains("502"));
        assert!(err.to_string().contains("upstream down"));
    }

    #[test]
    fn parse_response__rejects_empty_envelope() {
        let err = parse_response(StatusCode::OK, br#"{"jsonrpc":"2.0","id":1}"#).unwrap_err();
        assert!(err.to_string().contains("neither"));
    }
}
