use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Length of a compressed secp256k1 public key in bytes.
pub const PUBLIC_KEY_LEN: usize = 33;

/// Millitokens per token.
const MTOKENS_PER_TOKEN: u128 = 1_000;

/// A 33-byte compressed node public key, hex encoded on the wire.
///
/// Only the length and encoding are checked; curve membership is left to
/// the node.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PublicKey([u8; PUBLIC_KEY_LEN]);

impl PublicKey {
    /// Create from raw key bytes.
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Create from a byte slice, which must be exactly 33 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CoreError> {
        let key: [u8; PUBLIC_KEY_LEN] = bytes.try_into().map_err(|_| {
            CoreError::InvalidPublicKey(format!(
                "expected {} bytes, got {}",
                PUBLIC_KEY_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(key))
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for PublicKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(CoreError::MissingField("destination".into()));
        }
        let bytes = hex::decode(s).map_err(|e| CoreError::InvalidPublicKey(format!("{s}: {e}")))?;
        Self::from_slice(&bytes)
    }
}

impl TryFrom<String> for PublicKey {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PublicKey> for String {
    fn from(key: PublicKey) -> Self {
        key.to_hex()
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

/// Short channel id: block height, transaction index and output index packed
/// into 64 bits.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelId(u64);

impl ChannelId {
    /// Create from the packed numeric form used by the node RPC.
    pub fn from_u64(id: u64) -> Self {
        Self(id)
    }

    /// Create from its components.
    pub fn from_parts(block: u32, tx: u32, output: u16) -> Self {
        Self(((block as u64 & 0xff_ffff) << 40) | ((tx as u64 & 0xff_ffff) << 16) | output as u64)
    }

    /// Packed numeric form.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn block_height(&self) -> u32 {
        (self.0 >> 40) as u32
    }

    pub fn tx_index(&self) -> u32 {
        ((self.0 >> 16) & 0xff_ffff) as u32
    }

    pub fn output_index(&self) -> u16 {
        (self.0 & 0xffff) as u16
    }
}

impl FromStr for ChannelId {
    type Err = CoreError;

    /// Accepts the standard `<block>x<tx>x<output>` form or the packed number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidChannelId(s.to_string());
        let parts: Vec<&str> = s.split('x').collect();
        match parts.as_slice() {
            [block, tx, output] => {
                let block: u32 = block.parse().map_err(|_| invalid())?;
                let tx: u32 = tx.parse().map_err(|_| invalid())?;
                let output: u16 = output.parse().map_err(|_| invalid())?;
                if block > 0xff_ffff || tx > 0xff_ffff {
                    return Err(invalid());
                }
                Ok(Self::from_parts(block, tx, output))
            }
            [number] => number.parse().map(Self).map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for ChannelId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChannelId> for String {
    fn from(id: ChannelId) -> Self {
        id.to_string()
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.block_height(), self.tx_index(), self.output_index())
    }
}

impl fmt::Debug for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChannelId({self})")
    }
}

/// An amount in millitokens, serialized as a decimal string so that no
/// precision is lost in transit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Millitokens(pub u128);

impl Millitokens {
    pub const ZERO: Millitokens = Millitokens(0);

    /// Amount for a whole number of tokens.
    pub fn from_tokens(tokens: u64) -> Self {
        Self(tokens as u128 * MTOKENS_PER_TOKEN)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Whole tokens, rounded down. Saturates at `u64::MAX`.
    pub fn tokens(&self) -> u64 {
        u64::try_from(self.0 / MTOKENS_PER_TOKEN).unwrap_or(u64::MAX)
    }

    /// Whole tokens, rounded up. Saturates at `u64::MAX`.
    pub fn safe_tokens(&self) -> u64 {
        u64::try_from(self.0.div_ceil(MTOKENS_PER_TOKEN)).unwrap_or(u64::MAX)
    }

    pub fn saturating_add(self, other: Millitokens) -> Millitokens {
        Millitokens(self.0.saturating_add(other.0))
    }
}

impl FromStr for Millitokens {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CoreError::InvalidAmount(format!(
                "expected a decimal millitokens string, got {s:?}"
            )));
        }
        s.parse::<u128>()
            .map(Self)
            .map_err(|e| CoreError::InvalidAmount(format!("{s}: {e}")))
    }
}

impl TryFrom<String> for Millitokens {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Millitokens> for String {
    fn from(amount: Millitokens) -> Self {
        amount.0.to_string()
    }
}

impl fmt::Display for Millitokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Payment hash handed to send-to-route.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PaymentHash(pub [u8; 32]);

impl PaymentHash {
    /// A fresh hash from the OS RNG. No preimage is ever generated for it, so
    /// an HTLC locked to it cannot be settled by anyone.
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for PaymentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for PaymentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PaymentHash({})", self.to_hex())
    }
}

/// One hop of a private routing hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HintHop {
    /// Node that forwards over `channel`.
    pub public_key: PublicKey,
    pub channel: ChannelId,
    pub base_fee_mtokens: Millitokens,
    /// Proportional fee in millitokens per million.
    pub fee_rate: u32,
    pub cltv_delta: u16,
}

/// Routing hint: a path of hops leading to the destination that may not be
/// in the public graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteHint {
    pub hops: Vec<HintHop>,
}

/// An entry excluded from route searches.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Ignore {
    /// Never route through this node.
    Node { public_key: PublicKey },
    /// Never forward from `from_public_key` to `to_public_key`, and never use
    /// `channel` when given.
    Edge {
        from_public_key: PublicKey,
        to_public_key: PublicKey,
        channel: Option<ChannelId>,
    },
    /// Never use this channel in either direction.
    Channel { channel: ChannelId },
}

impl Ignore {
    /// Whether forwarding from `from` over `channel` to `to` hits this entry.
    pub fn matches(&self, from: &PublicKey, channel: ChannelId, to: Option<&PublicKey>) -> bool {
        match self {
            Ignore::Node { public_key } => from == public_key || to == Some(public_key),
            Ignore::Edge {
                from_public_key,
                to_public_key,
                channel: pinned,
            } => {
                (from == from_public_key && to == Some(to_public_key)) || *pinned == Some(channel)
            }
            Ignore::Channel { channel: ignored } => *ignored == channel,
        }
    }
}
