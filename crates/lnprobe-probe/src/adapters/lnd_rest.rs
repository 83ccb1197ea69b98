//! LND REST adapter.
//!
//! Talks to the REST gateway of an LND node: `GET /v1/getinfo`,
//! `POST /v1/graph/routes/{pubkey}/0` and `POST /v2/router/route/send`.
//! LND encodes 64-bit integers as decimal strings and bytes as base64; the
//! DTOs below keep those raw shapes and the mapping functions convert them.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use lnprobe_core::{
    AttemptResult, Capability, ChannelId, ChannelUpdate, Hop, HopFailure, Ignore, LightningRpc,
    Millitokens, NodeFeature, NodeInfo, PaymentHash, PublicKey, Route, RouteQuery, RpcError,
    MAX_CONFIDENCE,
};

const MACAROON_HEADER: &str = "Grpc-Metadata-macaroon";

/// LND's answer when no route satisfies the query.
const NO_PATH_MESSAGE: &str = "unable to find a path";

/// [`LightningRpc`] over LND's REST gateway.
pub struct LndRestClient {
    http: reqwest::Client,
    base_url: String,
}

impl LndRestClient {
    /// Create a client for the gateway at `base_url`, e.g.
    /// `https://127.0.0.1:8080`.
    ///
    /// `macaroon` is sent hex encoded with every request. `tls_cert_pem` is
    /// trusted as an extra root, which is what a self-signed LND
    /// certificate needs.
    pub fn new(
        base_url: impl Into<String>,
        macaroon: Option<&[u8]>,
        tls_cert_pem: Option<&[u8]>,
    ) -> Result<Self, RpcError> {
        let mut headers = HeaderMap::new();
        if let Some(macaroon) = macaroon {
            let value = HeaderValue::from_str(&hex::encode(macaroon))
                .map_err(|e| RpcError::Rejected(format!("invalid macaroon: {e}")))?;
            headers.insert(MACAROON_HEADER, value);
        }

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(pem) = tls_cert_pem {
            let cert = reqwest::Certificate::from_pem(pem)
                .map_err(|e| RpcError::Rejected(format!("invalid TLS certificate: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }
        let http = builder
            .build()
            .map_err(|e| RpcError::Unavailable(format!("building HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, RpcError> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .map_err(|e| RpcError::Unavailable(e.to_string()))?;
        decode(response).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, RpcError> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .map_err(|e| RpcError::Unavailable(e.to_string()))?;
        decode(response).await
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, RpcError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| RpcError::Unavailable(e.to_string()))?;

    if !status.is_success() {
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.message)
            .unwrap_or(text);
        return Err(RpcError::Rejected(format!("{status}: {message}")));
    }

    serde_json::from_str(&text).map_err(|e| RpcError::UnexpectedResponse(e.to_string()))
}

#[async_trait]
impl LightningRpc for LndRestClient {
    fn supports(&self, _capability: Capability) -> bool {
        true
    }

    async fn get_info(&self) -> Result<NodeInfo, RpcError> {
        let info: GetInfoResponse = self.get("/v1/getinfo").await?;
        node_info_from(info)
    }

    async fn query_routes(&self, query: &RouteQuery) -> Result<Vec<Route>, RpcError> {
        let path = format!("/v1/graph/routes/{}/0", query.destination.to_hex());
        let body = QueryRoutesRequest::from_query(query);
        match self.post::<_, QueryRoutesResponse>(&path, &body).await {
            Ok(response) => routes_from(response),
            Err(RpcError::Rejected(message)) if message.contains(NO_PATH_MESSAGE) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn send_to_route(
        &self,
        route: &Route,
        payment_hash: &PaymentHash,
    ) -> Result<AttemptResult, RpcError> {
        let body = SendToRouteRequest {
            payment_hash: BASE64.encode(payment_hash.0),
            route: RouteDto::from_route(route),
        };
        let attempt: HtlcAttemptDto = self.post("/v2/router/route/send", &body).await?;
        attempt_from(attempt)
    }
}

#[derive(Debug, Deserialize)]
struct GetInfoResponse {
    identity_pubkey: String,
    #[serde(default)]
    alias: String,
    #[serde(default)]
    block_height: u32,
    #[serde(default)]
    synced_to_chain: bool,
    #[serde(default)]
    features: BTreeMap<String, FeatureDto>,
}

#[derive(Debug, Deserialize)]
struct FeatureDto {
    #[serde(default)]
    name: String,
    #[serde(default)]
    is_required: bool,
    #[serde(default)]
    is_known: bool,
}

#[derive(Debug, Default, Serialize)]
struct QueryRoutesRequest {
    amt_msat: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    final_cltv_delta: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fee_limit: Option<FeeLimit>,
    ignored_nodes: Vec<String>,
    ignored_edges: Vec<EdgeLocator>,
    ignored_pairs: Vec<NodePair>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_hop_pubkey: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    outgoing_chan_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cltv_limit: Option<u32>,
    route_hints: Vec<RouteHintDto>,
    use_mission_control: bool,
}

#[derive(Debug, Serialize)]
struct FeeLimit {
    fixed_msat: String,
}

#[derive(Debug, PartialEq, Serialize)]
struct EdgeLocator {
    channel_id: String,
    direction_reverse: bool,
}

#[derive(Debug, PartialEq, Serialize)]
struct NodePair {
    from: String,
    to: String,
}

#[derive(Debug, Serialize)]
struct RouteHintDto {
    hop_hints: Vec<HopHintDto>,
}

#[derive(Debug, Serialize)]
struct HopHintDto {
    node_id: String,
    chan_id: String,
    fee_base_msat: u32,
    fee_proportional_millionths: u32,
    cltv_expiry_delta: u32,
}

impl QueryRoutesRequest {
    fn from_query(query: &RouteQuery) -> Self {
        let mut body = Self {
            amt_msat: query.mtokens.to_string(),
            final_cltv_delta: query.cltv_delta.map(u32::from),
            fee_limit: query.max_fee_mtokens.map(|max_fee| FeeLimit {
                fixed_msat: max_fee.to_string(),
            }),
            last_hop_pubkey: query.incoming_peer.map(|key| BASE64.encode(key.as_bytes())),
            outgoing_chan_id: query.outgoing_channel.map(|channel| channel.as_u64().to_string()),
            cltv_limit: query.max_timeout_height,
            use_mission_control: true,
            ..Self::default()
        };

        for entry in &query.ignore {
            match entry {
                Ignore::Node { public_key } => {
                    body.ignored_nodes.push(BASE64.encode(public_key.as_bytes()));
                }
                Ignore::Edge {
                    from_public_key,
                    to_public_key,
                    channel,
                } => {
                    body.ignored_pairs.push(NodePair {
                        from: BASE64.encode(from_public_key.as_bytes()),
                        to: BASE64.encode(to_public_key.as_bytes()),
                    });
                    if let Some(channel) = channel {
                        body.push_channel(*channel);
                    }
                }
                Ignore::Channel { channel } => body.push_channel(*channel),
            }
        }

        body.route_hints = query
            .routes
            .iter()
            .map(|hint| RouteHintDto {
                hop_hints: hint
                    .hops
                    .iter()
                    .map(|hop| HopHintDto {
                        node_id: hop.public_key.to_hex(),
                        chan_id: hop.channel.as_u64().to_string(),
                        fee_base_msat: u32::try_from(hop.base_fee_mtokens.0).unwrap_or(u32::MAX),
                        fee_proportional_millionths: hop.fee_rate,
                        cltv_expiry_delta: u32::from(hop.cltv_delta),
                    })
                    .collect(),
            })
            .collect();

        body
    }

    /// Ignore a channel in both directions.
    fn push_channel(&mut self, channel: ChannelId) {
        for direction_reverse in [false, true] {
            let edge = EdgeLocator {
                channel_id: channel.as_u64().to_string(),
                direction_reverse,
            };
            if !self.ignored_edges.contains(&edge) {
                self.ignored_edges.push(edge);
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct QueryRoutesResponse {
    #[serde(default)]
    routes: Vec<RouteDto>,
    #[serde(default)]
    success_prob: f64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RouteDto {
    #[serde(default)]
    total_time_lock: u32,
    #[serde(default)]
    total_fees_msat: String,
    #[serde(default)]
    total_amt_msat: String,
    #[serde(default)]
    hops: Vec<HopDto>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HopDto {
    #[serde(default)]
    chan_id: String,
    #[serde(default)]
    chan_capacity: String,
    #[serde(default)]
    amt_to_forward_msat: String,
    #[serde(default)]
    fee_msat: String,
    #[serde(default)]
    expiry: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub_key: String,
}

impl RouteDto {
    fn from_route(route: &Route) -> Self {
        Self {
            total_time_lock: route.timeout,
            total_fees_msat: route.fee_mtokens.to_string(),
            total_amt_msat: route.mtokens.to_string(),
            hops: route
                .hops
                .iter()
                .map(|hop| HopDto {
                    chan_id: hop.channel.as_u64().to_string(),
                    chan_capacity: hop.channel_capacity.to_string(),
                    amt_to_forward_msat: hop.forward_mtokens.to_string(),
                    fee_msat: hop.fee_mtokens.to_string(),
                    expiry: hop.timeout.unwrap_or(route.timeout),
                    pub_key: hop.public_key.map(|key| key.to_hex()).unwrap_or_default(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct SendToRouteRequest {
    payment_hash: String,
    route: RouteDto,
}

#[derive(Debug, Deserialize)]
struct HtlcAttemptDto {
    #[serde(default)]
    status: String,
    #[serde(default)]
    preimage: String,
    #[serde(default)]
    failure: Option<FailureDto>,
}

#[derive(Debug, Deserialize)]
struct FailureDto {
    #[serde(default)]
    code: String,
    #[serde(default)]
    channel_update: Option<ChannelUpdateDto>,
    #[serde(default)]
    htlc_msat: String,
    #[serde(default)]
    failure_source_index: usize,
}

#[derive(Debug, Deserialize)]
struct ChannelUpdateDto {
    #[serde(default)]
    signature: String,
    #[serde(default)]
    chain_hash: String,
    #[serde(default)]
    chan_id: String,
    #[serde(default)]
    timestamp: u32,
    #[serde(default)]
    message_flags: u32,
    #[serde(default)]
    channel_flags: u32,
    #[serde(default)]
    time_lock_delta: u32,
    #[serde(default)]
    htlc_minimum_msat: String,
    #[serde(default)]
    base_fee: u32,
    #[serde(default)]
    fee_rate: u32,
    #[serde(default)]
    htlc_maximum_msat: String,
    #[serde(default)]
    extra_opaque_data: String,
}

fn unexpected(field: &str, value: &str) -> RpcError {
    RpcError::UnexpectedResponse(format!("invalid {field}: {value:?}"))
}

/// LND omits zero values, so an empty string reads as zero.
fn parse_u64(field: &str, value: &str) -> Result<u64, RpcError> {
    if value.is_empty() {
        return Ok(0);
    }
    value.parse().map_err(|_| unexpected(field, value))
}

fn parse_mtokens(field: &str, value: &str) -> Result<Millitokens, RpcError> {
    if value.is_empty() {
        return Ok(Millitokens::ZERO);
    }
    value.parse().map_err(|_| unexpected(field, value))
}

fn parse_channel(field: &str, value: &str) -> Result<Option<ChannelId>, RpcError> {
    match parse_u64(field, value)? {
        0 => Ok(None),
        id => Ok(Some(ChannelId::from_u64(id))),
    }
}

/// Base64 bytes re-encoded as hex.
fn base64_to_hex(field: &str, value: &str) -> Result<String, RpcError> {
    BASE64
        .decode(value)
        .map(hex::encode)
        .map_err(|_| unexpected(field, value))
}

fn node_info_from(info: GetInfoResponse) -> Result<NodeInfo, RpcError> {
    let public_key: PublicKey = info
        .identity_pubkey
        .parse()
        .map_err(|_| unexpected("identity_pubkey", &info.identity_pubkey))?;

    let mut features = Vec::with_capacity(info.features.len());
    for (bit, feature) in info.features {
        let bit = bit.parse().map_err(|_| unexpected("feature bit", &bit))?;
        features.push(NodeFeature {
            bit,
            name: feature.name,
            is_known: feature.is_known,
            is_required: feature.is_required,
        });
    }
    features.sort_by_key(|feature| feature.bit);

    Ok(NodeInfo {
        public_key,
        alias: info.alias,
        block_height: info.block_height,
        features,
        is_synced_to_chain: info.synced_to_chain,
    })
}

fn routes_from(response: QueryRoutesResponse) -> Result<Vec<Route>, RpcError> {
    // LND scores only the route it returns first.
    let confidence = (response.success_prob > 0.0).then(|| {
        (response.success_prob * f64::from(MAX_CONFIDENCE))
            .round()
            .min(f64::from(MAX_CONFIDENCE)) as u32
    });

    response
        .routes
        .into_iter()
        .enumerate()
        .map(|(i, route)| route_from(route, if i == 0 { confidence } else { None }))
        .collect()
}

fn route_from(route: RouteDto, confidence: Option<u32>) -> Result<Route, RpcError> {
    let hops = route
        .hops
        .iter()
        .map(|hop| -> Result<Hop, RpcError> {
            let channel = parse_channel("chan_id", &hop.chan_id)?
                .ok_or_else(|| unexpected("chan_id", &hop.chan_id))?;
            let public_key = match hop.pub_key.as_str() {
                "" => None,
                key => Some(key.parse().map_err(|_| unexpected("pub_key", key))?),
            };
            Ok(Hop {
                channel,
                channel_capacity: parse_u64("chan_capacity", &hop.chan_capacity)?,
                fee_mtokens: parse_mtokens("fee_msat", &hop.fee_msat)?,
                forward_mtokens: parse_mtokens("amt_to_forward_msat", &hop.amt_to_forward_msat)?,
                public_key,
                timeout: Some(hop.expiry),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Route {
        confidence,
        fee_mtokens: parse_mtokens("total_fees_msat", &route.total_fees_msat)?,
        hops,
        mtokens: parse_mtokens("total_amt_msat", &route.total_amt_msat)?,
        timeout: route.total_time_lock,
    })
}

fn attempt_from(attempt: HtlcAttemptDto) -> Result<AttemptResult, RpcError> {
    let preimage = BASE64
        .decode(&attempt.preimage)
        .map_err(|_| unexpected("preimage", &attempt.preimage))?;

    let failure = match attempt.failure {
        Some(failure) => {
            let channel_update = failure.channel_update.map(channel_update_from).transpose()?;
            Some(HopFailure {
                channel: channel_update.as_ref().and_then(|update| update.channel),
                code: failure.code,
                failure_source_index: failure.failure_source_index,
                htlc_mtokens: match failure.htlc_msat.as_str() {
                    "" => None,
                    value => Some(parse_mtokens("htlc_msat", value)?),
                },
                channel_update,
            })
        }
        None => None,
    };

    tracing::trace!(status = %attempt.status, failed = failure.is_some(), "htlc attempt resolved");
    Ok(AttemptResult { failure, preimage })
}

fn channel_update_from(update: ChannelUpdateDto) -> Result<ChannelUpdate, RpcError> {
    Ok(ChannelUpdate {
        chain_hash: base64_to_hex("chain_hash", &update.chain_hash)?,
        channel: parse_channel("chan_id", &update.chan_id)?,
        timestamp: update.timestamp,
        message_flags: update.message_flags,
        channel_flags: update.channel_flags,
        time_lock_delta: update.time_lock_delta,
        htlc_minimum_mtokens: parse_mtokens("htlc_minimum_msat", &update.htlc_minimum_msat)?,
        base_fee_mtokens: Millitokens(u128::from(update.base_fee)),
        fee_rate: update.fee_rate,
        htlc_maximum_mtokens: parse_mtokens("htlc_maximum_msat", &update.htlc_maximum_msat)?,
        extra_opaque_data: base64_to_hex("extra_opaque_data", &update.extra_opaque_data)?,
        signature: base64_to_hex("signature", &update.signature)?,
    })
}
