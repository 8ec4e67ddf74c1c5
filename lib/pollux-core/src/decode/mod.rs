//! Discriminator-driven decoding of polymorphic JSON payloads.
//!
//! A polymorphic model is an enum with one case per concrete shape plus a base
//! shape. Its [`VariantRegistry`] tells which case a payload belongs to, by the
//! value of a discriminator field. The decoder is pure: no I/O, no shared
//! mutable state.
//!
//! Hook a model into `serde` with [`deserialize`], so nested polymorphic
//! fields (`Option<Box<BirdClassification>>`, `Vec<BirdClassification>`,
//! `HashMap<String, BirdClassification>`) and poller results decode through
//! the registry too. Encoding needs no help: `#[derive(Serialize)]` with
//! `#[serde(untagged)]` writes the concrete shape, discriminator included.

use std::collections::HashMap;

use serde::Deserializer;
use serde::de::{Deserialize, Error as _};
use serde_json::Value;

mod error;
pub use self::error::DecodeError;

mod registry;
pub use self::registry::{
    DEFAULT_MAX_DEPTH, DiscriminatorValue, VariantRegistry, VariantRegistryBuilder,
};

/// A type decoded through a [`VariantRegistry`].
pub trait Polymorphic: Sized + 'static {
    /// The registry of the type, built once.
    fn registry() -> &'static VariantRegistry<Self>;
}

/// Decodes one polymorphic value from raw JSON.
///
/// # Errors
///
/// See [`VariantRegistry::decode`].
pub fn decode<T: Polymorphic>(raw: &[u8]) -> Result<T, DecodeError> {
    T::registry().decode(raw)
}

/// Decodes one polymorphic value, `null` decodes to `None`.
///
/// # Errors
///
/// See [`VariantRegistry::decode_optional`].
pub fn decode_optional<T: Polymorphic>(raw: &[u8]) -> Result<Option<T>, DecodeError> {
    T::registry().decode_optional(raw)
}

/// Decodes an array of polymorphic values, all or nothing.
///
/// # Errors
///
/// See [`VariantRegistry::decode_many`].
pub fn decode_many<T: Polymorphic>(raw: &[u8]) -> Result<Vec<T>, DecodeError> {
    T::registry().decode_many(raw)
}

/// Decodes a map of polymorphic values, all or nothing.
///
/// # Errors
///
/// See [`VariantRegistry::decode_map`].
pub fn decode_map<T: Polymorphic>(raw: &[u8]) -> Result<HashMap<String, T>, DecodeError> {
    T::registry().decode_map(raw)
}

/// `serde` entry point for polymorphic types.
///
/// # Example
///
/// ```rust,ignore
/// impl<'de> Deserialize<'de> for BirdClassification {
///     fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
///         pollux_core::decode::deserialize(deserializer)
///     }
/// }
/// ```
///
/// # Errors
///
/// Reports any [`DecodeError`] as a custom deserializer error.
pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: Polymorphic,
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    T::registry().decode_value(value).map_err(D::Error::custom)
}
