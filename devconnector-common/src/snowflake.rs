//! Time-ordered 64-bit identifiers.
//!
//! Bit layout, most significant first: 42 bits of milliseconds since the
//! epoch, 10 bits of node id, 12 bits of per-node sequence. Sorting
//! snowflakes numerically sorts them by creation time.
//!
//! See <https://discord.com/developers/docs/reference#snowflakes>

use derive_where::derive_where;
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    marker::PhantomData,
};
use thiserror::Error;
use time::{Duration, UtcDateTime};

pub const TIMESTAMP_BITS: u32 = 42;
pub const NODE_ID_BITS: u32 = 10;
pub const SEQUENCE_BITS: u32 = 12;

const NODE_ID_SHIFT: u32 = SEQUENCE_BITS;
const TIMESTAMP_SHIFT: u32 = SEQUENCE_BITS + NODE_ID_BITS;

const fn mask(bits: u32) -> u64 {
    (1 << bits) - 1
}

pub trait Epoch {
    const EPOCH_TIME: UtcDateTime;
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum TimestampError {
    #[error("Time lies before the snowflake epoch.")]
    BeforeEpoch,
    #[error("Time lies too far after the snowflake epoch.")]
    TooLarge,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Node id {0} does not fit into {NODE_ID_BITS} bits")]
pub struct NodeIdOutOfRangeError(pub u16);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct NodeId(u16);

impl NodeId {
    #[must_use]
    pub fn new(id: u16) -> Option<Self> {
        (u64::from(id) <= mask(NODE_ID_BITS)).then_some(Self(id))
    }

    #[must_use]
    pub fn get(self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for NodeId {
    type Error = NodeIdOutOfRangeError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(NodeIdOutOfRangeError(value))
    }
}

/// Milliseconds between the epoch and `time`, if representable in a snowflake.
pub fn millis_since_epoch<SnowflakeEpoch: Epoch>(
    time: UtcDateTime,
) -> Result<u64, TimestampError> {
    let millis = (time - SnowflakeEpoch::EPOCH_TIME).whole_milliseconds();
    let millis = u64::try_from(millis).map_err(|_| {
        if millis < 0 {
            TimestampError::BeforeEpoch
        } else {
            TimestampError::TooLarge
        }
    })?;

    if millis > mask(TIMESTAMP_BITS) {
        return Err(TimestampError::TooLarge);
    }
    Ok(millis)
}

#[derive_where(
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Debug,
    Default,
    Hash,
    Serialize,
    Deserialize
)]
#[serde(transparent)]
pub struct Snowflake<SnowflakeEpoch>(u64, #[serde(skip)] PhantomData<SnowflakeEpoch>);

impl<SnowflakeEpoch> Snowflake<SnowflakeEpoch> {
    #[must_use]
    pub fn new(inner: u64) -> Self {
        Self(inner, PhantomData)
    }

    /// Parts that do not fit their bit width are truncated.
    #[must_use]
    pub fn from_parts(millis: u64, node_id: NodeId, sequence: u16) -> Self {
        let snowflake = (millis & mask(TIMESTAMP_BITS)) << TIMESTAMP_SHIFT
            | u64::from(node_id.get()) << NODE_ID_SHIFT
            | u64::from(sequence) & mask(SEQUENCE_BITS);

        Self::new(snowflake)
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn millis(self) -> u64 {
        self.0 >> TIMESTAMP_SHIFT
    }

    #[must_use]
    pub fn node_id(self) -> NodeId {
        #[allow(clippy::cast_possible_truncation)]
        NodeId((self.0 >> NODE_ID_SHIFT & mask(NODE_ID_BITS)) as u16)
    }

    #[must_use]
    pub fn sequence(self) -> u16 {
        #[allow(clippy::cast_possible_truncation)]
        let sequence = (self.0 & mask(SEQUENCE_BITS)) as u16;
        sequence
    }

    #[must_use]
    pub fn created_at(self) -> UtcDateTime
    where
        SnowflakeEpoch: Epoch,
    {
        // 42 bits of milliseconds always fit into an i64.
        #[allow(clippy::cast_possible_wrap)]
        let millis = self.millis() as i64;
        SnowflakeEpoch::EPOCH_TIME + Duration::milliseconds(millis)
    }
}

impl<SnowflakeEpoch> Display for Snowflake<SnowflakeEpoch> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<SnowflakeEpoch> From<u64> for Snowflake<SnowflakeEpoch> {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl<SnowflakeEpoch> From<Snowflake<SnowflakeEpoch>> for u64 {
    fn from(value: Snowflake<SnowflakeEpoch>) -> Self {
        value.get()
    }
}

/// Generates strictly increasing snowflakes for one node.
///
/// When the clock stalls or steps backwards the generator keeps counting
/// from the last millisecond it used, borrowing the next millisecond once
/// the sequence is exhausted.
#[derive_where(Clone, Eq, PartialEq, Debug, Hash)]
pub struct SnowflakeGenerator<SnowflakeEpoch> {
    node_id: NodeId,
    last_millis: Option<u64>,
    sequence: u16,
    phantom_data: PhantomData<SnowflakeEpoch>,
}

impl<SnowflakeEpoch: Epoch> SnowflakeGenerator<SnowflakeEpoch> {
    #[must_use]
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            last_millis: None,
            sequence: 0,
            phantom_data: PhantomData,
        }
    }

    #[must_use]
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn generate_at(
        &mut self,
        time: UtcDateTime,
    ) -> Result<Snowflake<SnowflakeEpoch>, TimestampError> {
        let millis = millis_since_epoch::<SnowflakeEpoch>(time)?;

        let millis = match self.last_millis {
            Some(last) if millis <= last => {
                if u64::from(self.sequence) < mask(SEQUENCE_BITS) {
                    self.sequence += 1;
                    last
                } else {
                    let borrowed = last + 1;
                    if borrowed > mask(TIMESTAMP_BITS) {
                        return Err(TimestampError::TooLarge);
                    }
                    self.sequence = 0;
                    borrowed
                }
            }
            _ => {
                self.sequence = 0;
                millis
            }
        };
        self.last_millis = Some(millis);

        Ok(Snowflake::from_parts(millis, self.node_id, self.sequence))
    }

    pub fn generate(&mut self) -> Result<Snowflake<SnowflakeEpoch>, TimestampError> {
        self.generate_at(UtcDateTime::now())
    }
}
