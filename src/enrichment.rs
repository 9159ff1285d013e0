//! NFT metadata enrichment collaborator.
//!
//! [`MetadataSource`] answers `contract:tokenId` keyed lookups of display
//! metadata. [`HttpMetadataSource`] talks to a Magic-Eden-style token API;
//! [`NoMetadata`] is used when no endpoint is configured. Enrichment is
//! best-effort: callers log failures and carry on with empty metadata.

use std::collections::HashMap;
use std::str::FromStr;

use alloy_primitives::U256;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use serde::Deserialize;

use crate::domain::{NftMetadata, normalize_address};
use crate::error::IndexerError;
use crate::http::check_status;

/// Display metadata for one token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenMetadata {
    /// Token standard.
    pub kind: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// Image URL.
    pub image_url: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Floor price in ether.
    pub price: Option<BigDecimal>,
}

impl TokenMetadata {
    /// Embeds the fetched fields into a listing's metadata, stamped now.
    #[must_use]
    pub fn into_nft(self, contract_address: &str, token_id: U256) -> NftMetadata {
        NftMetadata {
            token_id,
            contract_address: normalize_address(contract_address),
            kind: self.kind,
            name: self.name,
            image_url: self.image_url,
            description: self.description,
            last_price: self.price,
            last_updated: Some(Utc::now()),
        }
    }
}

/// Lookup key: lower-cased contract, colon, decimal token id.
#[must_use]
pub fn metadata_key(contract: &str, token_id: U256) -> String {
    format!("{}:{token_id}", normalize_address(contract))
}

/// Source of token metadata.
#[async_trait]
pub trait MetadataSource: Send + Sync + std::fmt::Debug {
    /// Fetches metadata for each `(contract, token_id)` pair.
    ///
    /// Tokens the source does not know are simply absent from the map.
    ///
    /// # Errors
    ///
    /// [`IndexerError::Metadata`] or transport errors when the source fails.
    async fn listing_metadata(
        &self,
        tokens: &[(String, U256)],
    ) -> Result<HashMap<String, TokenMetadata>, IndexerError>;
}

/// Enrichment disabled: every lookup yields an empty map.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMetadata;

#[async_trait]
impl MetadataSource for NoMetadata {
    async fn listing_metadata(
        &self,
        _tokens: &[(String, U256)],
    ) -> Result<HashMap<String, TokenMetadata>, IndexerError> {
        Ok(HashMap::new())
    }
}

#[derive(Debug, Deserialize)]
struct TokensResponse {
    #[serde(default)]
    tokens: Vec<TokenEntry>,
}

#[derive(Debug, Deserialize)]
struct TokenEntry {
    token: TokenInfo,
    market: Option<MarketInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenInfo {
    contract: String,
    token_id: String,
    kind: Option<String>,
    name: Option<String>,
    image: Option<String>,
    description: Option<String>,
    metadata: Option<TokenMedia>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenMedia {
    image_original: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarketInfo {
    floor_ask: Option<FloorAsk>,
}

#[derive(Debug, Deserialize)]
struct FloorAsk {
    price: Option<Price>,
}

#[derive(Debug, Deserialize)]
struct Price {
    amount: Option<Amount>,
}

#[derive(Debug, Deserialize)]
struct Amount {
    decimal: Option<serde_json::Number>,
}

impl TokenEntry {
    fn into_keyed(self) -> Option<(String, TokenMetadata)> {
        let token_id = U256::from_str(&self.token.token_id).ok()?;
        let price = self
            .market
            .and_then(|m| m.floor_ask)
            .and_then(|f| f.price)
            .and_then(|p| p.amount)
            .and_then(|a| a.decimal)
            .and_then(|n| BigDecimal::from_str(&n.to_string()).ok());
        let image_url = self
            .token
            .metadata
            .and_then(|m| m.image_original)
            .or(self.token.image);
        Some((
            metadata_key(&self.token.contract, token_id),
            TokenMetadata {
                kind: self.token.kind,
                name: self.token.name,
                image_url,
                description: self.token.description,
                price,
            },
        ))
    }
}

/// HTTP client for a `/tokens/v7` style endpoint.
#[derive(Debug, Clone)]
pub struct HttpMetadataSource {
    http: reqwest::Client,
    base_url: String,
}

impl HttpMetadataSource {
    /// Creates a client for `base_url`.
    #[must_use]
    pub const fn new(http: reqwest::Client, base_url: String) -> Self {
        Self { http, base_url }
    }
}

#[async_trait]
impl MetadataSource for HttpMetadataSource {
    async fn listing_metadata(
        &self,
        tokens: &[(String, U256)],
    ) -> Result<HashMap<String, TokenMetadata>, IndexerError> {
        if tokens.is_empty() {
            return Ok(HashMap::new());
        }
        let query: Vec<(&str, String)> = tokens
            .iter()
            .map(|(contract, token_id)| ("tokens", metadata_key(contract, *token_id)))
            .collect();
        let url = format!("{}/tokens/v7", self.base_url.trim_end_matches('/'));

        let response = self
            .http
            .get(&url)
            .header("accept", "*/*")
            .query(&query)
            .send()
            .await
            .map_err(|e| IndexerError::Metadata(e.to_string()))?;
        let body: TokensResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| IndexerError::Metadata(e.to_string()))?;

        Ok(body
            .tokens
            .into_iter()
            .filter_map(TokenEntry::into_keyed)
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use axum::extract::RawQuery;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{Value, json};

    use super::*;

    #[test]
    fn key_is_case_insensitive_on_contract() {
        assert_eq!(metadata_key("0xABC", U256::from(7)), "0xabc:7");
        assert_eq!(
            metadata_key("0xabc", U256::from(7)),
            metadata_key(" 0xAbC ", U256::from(7))
        );
    }

    #[tokio::test]
    async fn disabled_source_returns_nothing() {
        let Ok(map) = NoMetadata
            .listing_metadata(&[("0xabc".into(), U256::from(1))])
            .await
        else {
            panic!("NoMetadata never fails");
        };
        assert!(map.is_empty());
    }

    async fn tokens(RawQuery(query): RawQuery) -> Json<Value> {
        assert_eq!(query.as_deref(), Some("tokens=0xabc%3A7"));
        Json(json!({
            "tokens": [{
                "token": {
                    "contract": "0xABC",
                    "tokenId": "7",
                    "kind": "erc721",
                    "name": "Ape #7",
                    "image": "https://img/small.png",
                    "description": "an ape",
                    "metadata": { "imageOriginal": "https://img/original.png" }
                },
                "market": { "floorAsk": { "price": { "amount": { "decimal": 1.5, "native": 1.5 } } } }
            }],
            "continuation": null
        }))
    }

    #[tokio::test]
    async fn http_source_maps_tokens_by_key() {
        let app = Router::new().route("/tokens/v7", get(tokens));
        let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
            panic!("bind failed");
        };
        let Ok(addr) = listener.local_addr() else {
            panic!("no local addr");
        };
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let Ok(http) = crate::http::build_client(Duration::from_secs(5)) else {
            panic!("client");
        };
        let source = HttpMetadataSource::new(http, format!("http://{addr}/"));
        let Ok(map) = source
            .listing_metadata(&[("0xAbc".into(), U256::from(7))])
            .await
        else {
            panic!("lookup failed");
        };

        let Some(meta) = map.get("0xabc:7") else {
            panic!("missing key");
        };
        assert_eq!(meta.name.as_deref(), Some("Ape #7"));
        assert_eq!(meta.image_url.as_deref(), Some("https://img/original.png"));
        let Ok(expected) = BigDecimal::from_str("1.5") else {
            panic!("literal");
        };
        assert_eq!(meta.price, Some(expected));
    }
}
