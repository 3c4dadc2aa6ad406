pub mod auth;
pub mod post;
pub mod profile;
pub mod user;

use crate::{
    model::auth::InvalidAuthTokenHashError,
    snowflake::{Epoch, NodeId, Snowflake, SnowflakeGenerator, TimestampError},
    util::NonPositiveDurationError,
};
use serde::{Deserialize, Serialize};
use std::{
    fmt::Display,
    marker::PhantomData,
    num::ParseIntError,
    str::FromStr,
    sync::{Mutex, PoisonError},
};
use thiserror::Error;
use time::{UtcDateTime, macros::utc_datetime};

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    NonPositiveDuration(#[from] NonPositiveDurationError),
    #[error(transparent)]
    TokenHash(#[from] InvalidAuthTokenHashError),
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct DevConnectorEpoch;
impl Epoch for DevConnectorEpoch {
    const EPOCH_TIME: UtcDateTime = utc_datetime!(2025-01-01 00:00);
}

pub type DevConnectorSnowflake = Snowflake<DevConnectorEpoch>;
pub type DevConnectorSnowflakeGenerator = SnowflakeGenerator<DevConnectorEpoch>;

#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Id<Marker>(DevConnectorSnowflake, #[serde(skip)] PhantomData<Marker>);

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(snowflake: DevConnectorSnowflake) -> Self {
        Self(snowflake, PhantomData)
    }

    #[must_use]
    pub fn snowflake(self) -> DevConnectorSnowflake {
        self.0
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> From<DevConnectorSnowflake> for Id<Marker> {
    fn from(value: DevConnectorSnowflake) -> Self {
        Self::new(value)
    }
}

impl<Marker> From<u64> for Id<Marker> {
    fn from(value: u64) -> Self {
        Id::new(DevConnectorSnowflake::new(value))
    }
}

impl<Marker> FromStr for Id<Marker> {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u64::from_str(s).map(Self::from)
    }
}

impl<Marker> From<Id<Marker>> for u64 {
    fn from(value: Id<Marker>) -> Self {
        value.snowflake().get()
    }
}

/// Shared source of ids for every kind of model.
#[derive(Debug)]
pub struct IdGenerator(Mutex<DevConnectorSnowflakeGenerator>);

impl IdGenerator {
    #[must_use]
    pub fn new(node_id: NodeId) -> Self {
        Self(Mutex::new(DevConnectorSnowflakeGenerator::new(node_id)))
    }

    pub fn next_id<Marker>(&self) -> Result<Id<Marker>, TimestampError> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generate()
            .map(Id::new)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new(NodeId::default())
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{Id, IdGenerator, post::PostMarker, user::UserMarker};

    #[test]
    fn ids_serialize_as_numbers() {
        let id = Id::<PostMarker>::from(1_234_567_u64);

        assert_eq!(serde_json::to_string(&id).unwrap(), "1234567");
        assert_eq!(serde_json::from_str::<Id<PostMarker>>("1234567").unwrap(), id);
    }

    #[test]
    fn ids_parse_from_decimal_only() {
        assert_eq!("42".parse::<Id<PostMarker>>(), Ok(Id::from(42_u64)));
        assert!("abc".parse::<Id<PostMarker>>().is_err());
        assert!("-1".parse::<Id<PostMarker>>().is_err());
        assert!("".parse::<Id<PostMarker>>().is_err());
    }

    #[test]
    fn generator_is_shared_across_markers() {
        let ids = IdGenerator::default();

        let post: Id<PostMarker> = ids.next_id().unwrap();
        let user: Id<UserMarker> = ids.next_id().unwrap();

        assert!(u64::from(post) < u64::from(user));
    }
}
