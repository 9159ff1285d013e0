//! Plain JSON-RPC client over `reqwest`.

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use alloy_primitives::{Address, B256, Bytes, U256, hex};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::ChainState;
use crate::abi;
use crate::domain::trade::{Peer, TradeData};
use crate::error::IndexerError;
use crate::http::check_status;

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// Single-shot JSON-RPC client for the marketplace contract.
///
/// Performs exactly one HTTP request per call; wrap it in
/// [`super::RetryingChainState`] for retries.
#[derive(Debug)]
pub struct RpcChainClient {
    http: reqwest::Client,
    url: String,
    contract: Address,
    next_id: AtomicU64,
}

impl RpcChainClient {
    /// Creates a client for the node at `url`.
    #[must_use]
    pub const fn new(http: reqwest::Client, url: String, contract: Address) -> Self {
        Self {
            http,
            url,
            contract,
            next_id: AtomicU64::new(1),
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, IndexerError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        let response = self.http.post(&self.url).json(&request).send().await?;
        let body: RpcResponse = check_status(response).await?.json().await?;

        if let Some(err) = body.error {
            return Err(IndexerError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        Ok(body.result.unwrap_or(Value::Null))
    }
}

fn peer(side: &abi::TradeSide) -> Peer {
    Peer::from_chain(&side.user, side.tokenIds.clone(), &side.nftContracts)
}

#[async_trait]
impl ChainState for RpcChainClient {
    async fn trade_data(&self, trade_id: U256) -> Result<TradeData, IndexerError> {
        let calldata = abi::getTradeCall { tradeId: trade_id }.abi_encode();
        let params = json!([
            {
                "to": self.contract.to_string(),
                "data": hex::encode_prefixed(calldata),
            },
            "latest"
        ]);
        let result = self.call("eth_call", params).await?;
        let raw = result
            .as_str()
            .ok_or_else(|| IndexerError::InvalidResponse(format!("eth_call returned {result}")))?;
        let bytes = Bytes::from_str(raw)
            .map_err(|e| IndexerError::InvalidResponse(format!("eth_call hex: {e}")))?;
        let decoded = abi::getTradeCall::abi_decode_returns(&bytes, true)
            .map_err(|e| IndexerError::Decode(format!("getTrade({trade_id}): {e}")))?;

        Ok(TradeData {
            from: peer(&decoded.from),
            to: peer(&decoded.to),
            is_active: decoded.isActive,
        })
    }

    async fn transaction_initiator(&self, tx_hash: B256) -> Result<Address, IndexerError> {
        let result = self
            .call("eth_getTransactionByHash", json!([tx_hash.to_string()]))
            .await?;
        let from = result
            .get("from")
            .and_then(Value::as_str)
            .ok_or_else(|| IndexerError::InvalidResponse(format!("transaction {tx_hash} not found")))?;
        Address::from_str(from)
            .map_err(|e| IndexerError::InvalidResponse(format!("transaction sender {from:?}: {e}")))
    }
}
