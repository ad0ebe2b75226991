//! JSON-RPC implementations of the wallet and whitelist-contract seams,
//! targeting an Ethereum node whose accounts are wallet-managed
//! (`eth_accounts` / `eth_sendTransaction`).

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use dapp_core::{SigningHandle, TxHandle, WalletProvider, WalletSession, WhitelistContract};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use shared::domain::{Address, ChainId, TxHash};
use tokio::time::sleep;
use tracing::debug;

pub mod abi;

const NUM_ADDRESSES_WHITELISTED_SIG: &str = "numAddressesWhitelisted()";
const WHITELISTED_ADDRESSES_SIG: &str = "whitelistedAddresses(address)";
const ADD_ADDRESS_TO_WHITELIST_SIG: &str = "addAddressToWhitelist()";

const DEFAULT_RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const RECEIPT_POLL_ATTEMPTS: u32 = 60;

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcErrorBody>,
}

/// Thin JSON-RPC 2.0 transport shared by the wallet and contract bindings.
#[derive(Debug)]
pub struct RpcClient {
    http: Client,
    url: String,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            http: Client::new(),
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!("rpc request method={method} id={id}");

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("rpc transport failure for {method}"))?
            .error_for_status()
            .with_context(|| format!("rpc http error for {method}"))?;

        let parsed: RpcResponse = response
            .json()
            .await
            .with_context(|| format!("rpc response for {method} is not valid json"))?;

        if let Some(err) = parsed.error {
            bail!("rpc {method} failed: {} (code {})", err.message, err.code);
        }
        // A null result is legitimate (e.g. a receipt that is not mined yet);
        // callers decide whether null is acceptable.
        Ok(parsed.result.unwrap_or(Value::Null))
    }
}

fn parse_quantity(value: &Value) -> Result<u64> {
    let raw = value
        .as_str()
        .ok_or_else(|| anyhow!("expected hex quantity string, got {value}"))?;
    let digits = raw
        .strip_prefix("0x")
        .ok_or_else(|| anyhow!("hex quantity missing 0x prefix: {raw}"))?;
    u64::from_str_radix(digits, 16).with_context(|| format!("invalid hex quantity: {raw}"))
}

fn parse_data(value: &Value) -> Result<Vec<u8>> {
    let raw = value
        .as_str()
        .ok_or_else(|| anyhow!("expected hex data string, got {value}"))?;
    let digits = raw
        .strip_prefix("0x")
        .ok_or_else(|| anyhow!("hex data missing 0x prefix: {raw}"))?;
    hex::decode(digits).with_context(|| format!("invalid hex data: {raw}"))
}

fn to_hex(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

/// Wallet seam backed by the node's managed accounts.
pub struct RpcWalletProvider {
    rpc: Arc<RpcClient>,
}

impl RpcWalletProvider {
    pub fn new(rpc: Arc<RpcClient>) -> Self {
        Self { rpc }
    }
}

#[async_trait]
impl WalletProvider for RpcWalletProvider {
    async fn connect(&self) -> Result<Arc<dyn WalletSession>> {
        let accounts = self.rpc.call("eth_accounts", json!([])).await?;
        let accounts: Vec<String> =
            serde_json::from_value(accounts).context("eth_accounts returned malformed list")?;
        let first = accounts
            .first()
            .ok_or_else(|| anyhow!("wallet exposes no accounts"))?;
        let address: Address = first
            .parse()
            .with_context(|| format!("wallet returned malformed account address: {first}"))?;
        Ok(Arc::new(RpcWalletSession {
            rpc: Arc::clone(&self.rpc),
            address,
        }))
    }
}

#[derive(Debug)]
struct RpcWalletSession {
    rpc: Arc<RpcClient>,
    address: Address,
}

#[async_trait]
impl WalletSession for RpcWalletSession {
    async fn chain_id(&self) -> Result<ChainId> {
        let value = self.rpc.call("eth_chainId", json!([])).await?;
        Ok(ChainId(parse_quantity(&value)?))
    }

    async fn signer(&self) -> Result<Arc<dyn SigningHandle>> {
        Ok(Arc::new(RpcSigningHandle {
            address: self.address,
        }))
    }
}

struct RpcSigningHandle {
    address: Address,
}

#[async_trait]
impl SigningHandle for RpcSigningHandle {
    async fn address(&self) -> Result<Address> {
        Ok(self.address)
    }
}

/// Bindings for the fixed whitelist contract at a deployed address.
pub struct RpcWhitelistContract {
    rpc: Arc<RpcClient>,
    address: Address,
    receipt_poll_interval: Duration,
}

impl RpcWhitelistContract {
    pub fn new(rpc: Arc<RpcClient>, address: Address) -> Self {
        Self {
            rpc,
            address,
            receipt_poll_interval: DEFAULT_RECEIPT_POLL_INTERVAL,
        }
    }

    pub fn with_receipt_poll_interval(mut self, interval: Duration) -> Self {
        self.receipt_poll_interval = interval;
        self
    }

    async fn eth_call(&self, data: Vec<u8>) -> Result<Vec<u8>> {
        let result = self
            .rpc
            .call(
                "eth_call",
                json!([
                    { "to": self.address.to_string(), "data": to_hex(&data) },
                    "latest",
                ]),
            )
            .await?;
        parse_data(&result)
    }
}

#[async_trait]
impl WhitelistContract for RpcWhitelistContract {
    async fn num_addresses_whitelisted(&self) -> Result<u64> {
        let returned = self
            .eth_call(abi::call_no_args(NUM_ADDRESSES_WHITELISTED_SIG))
            .await?;
        abi::decode_u64(&returned).context("numAddressesWhitelisted returned malformed word")
    }

    async fn is_whitelisted(&self, address: Address) -> Result<bool> {
        let returned = self
            .eth_call(abi::call_with_address(WHITELISTED_ADDRESSES_SIG, address))
            .await?;
        abi::decode_bool(&returned).context("whitelistedAddresses returned malformed word")
    }

    async fn add_address_to_whitelist(
        &self,
        signer: Arc<dyn SigningHandle>,
    ) -> Result<Box<dyn TxHandle>> {
        let from = signer.address().await?;
        let data = abi::call_no_args(ADD_ADDRESS_TO_WHITELIST_SIG);
        let result = self
            .rpc
            .call(
                "eth_sendTransaction",
                json!([{
                    "from": from.to_string(),
                    "to": self.address.to_string(),
                    "data": to_hex(&data),
                }]),
            )
            .await?;
        let hash: TxHash = result
            .as_str()
            .ok_or_else(|| anyhow!("eth_sendTransaction returned non-string hash"))?
            .parse()
            .context("eth_sendTransaction returned malformed hash")?;
        Ok(Box::new(RpcTxHandle {
            rpc: Arc::clone(&self.rpc),
            hash,
            poll_interval: self.receipt_poll_interval,
        }))
    }
}

struct RpcTxHandle {
    rpc: Arc<RpcClient>,
    hash: TxHash,
    poll_interval: Duration,
}

#[async_trait]
impl TxHandle for RpcTxHandle {
    fn hash(&self) -> TxHash {
        self.hash
    }

    async fn wait(&self) -> Result<()> {
        for attempt in 1..=RECEIPT_POLL_ATTEMPTS {
            let receipt = self
                .rpc
                .call("eth_getTransactionReceipt", json!([self.hash.to_string()]))
                .await?;
            if receipt.is_null() {
                debug!(
                    "receipt not available yet tx={} attempt={attempt}",
                    self.hash
                );
                sleep(self.poll_interval).await;
                continue;
            }

            let status = receipt
                .get("status")
                .ok_or_else(|| anyhow!("transaction receipt missing status"))
                .and_then(parse_quantity)?;
            return match status {
                1 => Ok(()),
                0 => bail!("transaction reverted: {}", self.hash),
                other => bail!("unexpected receipt status {other} for {}", self.hash),
            };
        }
        bail!(
            "no receipt for {} after {RECEIPT_POLL_ATTEMPTS} polls",
            self.hash
        )
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
