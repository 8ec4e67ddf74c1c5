use std::borrow::Cow;
use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::{DecodeError, Polymorphic};

/// Default nesting limit of a registry, in JSON containers.
pub const DEFAULT_MAX_DEPTH: usize = 64;

const BASE_VARIANT: &str = "<base>";

thread_local! {
    /// Set while a registry dispatches a tree whose depth is already checked.
    static DEPTH_CHECKED: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as inside a depth-checked tree, restored on drop.
///
/// Nested polymorphic fields re-enter the registries through the `serde`
/// hook, and only the outermost entry point walks the tree.
struct DepthCheckedScope {
    previous: bool,
}

impl DepthCheckedScope {
    fn enter() -> Self {
        Self {
            previous: DEPTH_CHECKED.replace(true),
        }
    }
}

impl Drop for DepthCheckedScope {
    fn drop(&mut self) {
        DEPTH_CHECKED.set(self.previous);
    }
}

type VariantDecoder<T> = Box<dyn Fn(Value) -> Result<T, DecodeError> + Send + Sync>;

/// A discriminator value: services use strings (`"eagle"`) or integer enums (`2`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum DiscriminatorValue {
    /// A string discriminator.
    Str(Cow<'static, str>),
    /// An integer discriminator.
    Int(i64),
}

impl DiscriminatorValue {
    /// Reads a discriminator from a JSON node.
    ///
    /// Only strings and integers qualify; `null`, booleans, floats and
    /// containers read as "no discriminator".
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(text) => Some(Self::Str(Cow::Owned(text.clone()))),
            Value::Number(number) => number.as_i64().map(Self::Int),
            _ => None,
        }
    }
}

impl From<&'static str> for DiscriminatorValue {
    fn from(value: &'static str) -> Self {
        Self::Str(Cow::Borrowed(value))
    }
}

impl From<String> for DiscriminatorValue {
    fn from(value: String) -> Self {
        Self::Str(Cow::Owned(value))
    }
}

impl From<i64> for DiscriminatorValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for DiscriminatorValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

/// Maps discriminator values to the decoder of their concrete shape.
///
/// A registry is built once, usually in a `static` [`LazyLock`](std::sync::LazyLock),
/// and is immutable afterwards, so decoding is reentrant and lock-free.
///
/// Decoding reads the discriminator field, picks the matching variant (or the
/// base shape when the field is absent, `null`, or holds a value nobody
/// registered) and decodes the *whole* payload with that variant's fields.
/// Fields a variant does not define are ignored.
///
/// # Example
///
/// ```rust
/// use std::sync::LazyLock;
///
/// use pollux_core::decode::{Polymorphic, VariantRegistry};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Deserialize, Serialize)]
/// struct Snake { kind: Option<String>, length: i32 }
///
/// #[derive(Debug, Deserialize, Serialize)]
/// struct Cobra { kind: String, length: i32 }
///
/// #[derive(Debug)]
/// enum SnakeClassification { Snake(Snake), Cobra(Cobra) }
///
/// static SNAKES: LazyLock<VariantRegistry<SnakeClassification>> = LazyLock::new(|| {
///     VariantRegistry::builder("SnakeClassification", "kind", SnakeClassification::Snake)
///         .variant("cobra", SnakeClassification::Cobra)
///         .build()
/// });
///
/// impl Polymorphic for SnakeClassification {
///     fn registry() -> &'static VariantRegistry<Self> {
///         &SNAKES
///     }
/// }
///
/// let snake = SNAKES.decode(br#"{"kind": "cobra", "length": 10}"#)?;
/// assert!(matches!(snake, SnakeClassification::Cobra(Cobra { length: 10, .. })));
///
/// let snake = SNAKES.decode(br#"{"kind": "wrongKind", "length": 8}"#)?;
/// assert!(matches!(snake, SnakeClassification::Snake(Snake { kind: Some(_), length: 8 })));
/// # Ok::<(), pollux_core::decode::DecodeError>(())
/// ```
pub struct VariantRegistry<T> {
    name: &'static str,
    discriminator: &'static str,
    variants: IndexMap<DiscriminatorValue, VariantDecoder<T>>,
    fallback: VariantDecoder<T>,
    max_depth: Option<usize>,
}

/// Builder for [`VariantRegistry`].
pub struct VariantRegistryBuilder<T> {
    registry: VariantRegistry<T>,
}

impl<T: 'static> VariantRegistry<T> {
    /// Starts a registry for the polymorphic type `name`, dispatching on the
    /// `discriminator` field, with `fallback` as the base shape.
    pub fn builder<V>(
        name: &'static str,
        discriminator: &'static str,
        fallback: fn(V) -> T,
    ) -> VariantRegistryBuilder<T>
    where
        V: DeserializeOwned + 'static,
    {
        VariantRegistryBuilder {
            registry: Self {
                name,
                discriminator,
                variants: IndexMap::new(),
                fallback: variant_decoder(name, BASE_VARIANT.to_string(), fallback),
                max_depth: Some(DEFAULT_MAX_DEPTH),
            },
        }
    }
}

impl<T: 'static> VariantRegistryBuilder<T> {
    /// Registers the concrete shape `V` for a discriminator value.
    #[must_use]
    pub fn variant<V>(mut self, value: impl Into<DiscriminatorValue>, ctor: fn(V) -> T) -> Self
    where
        V: DeserializeOwned + 'static,
    {
        let value = value.into();
        let decoder = variant_decoder(self.registry.name, value.to_string(), ctor);
        self.registry.variants.insert(value, decoder);
        self
    }

    /// Registers a discriminator value whose shape is itself polymorphic.
    ///
    /// The payload is handed to `S`'s own registry, which picks the concrete
    /// shape of the sub-hierarchy (e.g. `Fish` → `Shark` → `Sawshark`).
    #[must_use]
    pub fn sub_hierarchy<S>(mut self, value: impl Into<DiscriminatorValue>, ctor: fn(S) -> T) -> Self
    where
        S: Polymorphic,
    {
        let decoder: VariantDecoder<T> =
            Box::new(move |payload| S::registry().dispatch(payload).map(ctor));
        self.registry.variants.insert(value.into(), decoder);
        self
    }

    /// Sets the nesting limit, `None` removes it. Defaults to [`DEFAULT_MAX_DEPTH`].
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.registry.max_depth = max_depth;
        self
    }

    /// Finishes the registry.
    pub fn build(self) -> VariantRegistry<T> {
        self.registry
    }
}

fn variant_decoder<V, T>(registry: &'static str, variant: String, ctor: fn(V) -> T) -> VariantDecoder<T>
where
    V: DeserializeOwned + 'static,
    T: 'static,
{
    Box::new(move |payload| {
        serde_path_to_error::deserialize(payload)
            .map(ctor)
            .map_err(|error| DecodeError::Variant {
                registry,
                variant: variant.clone(),
                path: error.path().to_string(),
                error: error.into_inner(),
            })
    })
}

impl<T> VariantRegistry<T> {
    /// Name of the polymorphic type.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Name of the discriminator field.
    pub fn discriminator(&self) -> &'static str {
        self.discriminator
    }

    /// Nesting limit, if any.
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Checks if a discriminator value selects a registered variant.
    pub fn is_registered(&self, value: &DiscriminatorValue) -> bool {
        self.variants.contains_key(value)
    }

    /// Decodes one value from raw JSON.
    ///
    /// # Errors
    ///
    /// Fails if the payload is not a JSON object, nests too deep, or does not
    /// fit the selected variant.
    pub fn decode(&self, raw: &[u8]) -> Result<T, DecodeError> {
        let value = serde_json::from_slice(raw)?;
        self.decode_value(value)
    }

    /// Decodes one value from raw JSON, a `null` document decodes to `None`.
    ///
    /// # Errors
    ///
    /// Same as [`decode`](Self::decode).
    pub fn decode_optional(&self, raw: &[u8]) -> Result<Option<T>, DecodeError> {
        match serde_json::from_slice(raw)? {
            Value::Null => Ok(None),
            value => self.decode_value(value).map(Some),
        }
    }

    /// Decodes one value from an already-parsed JSON tree.
    ///
    /// # Errors
    ///
    /// Same as [`decode`](Self::decode).
    pub fn decode_value(&self, value: Value) -> Result<T, DecodeError> {
        self.check_depth(&value)?;
        let _scope = DepthCheckedScope::enter();
        self.dispatch(value)
    }

    /// Decodes a JSON array, preserving element order.
    ///
    /// A `null` document decodes to an empty sequence. The first element that
    /// fails to decode fails the whole call.
    ///
    /// # Errors
    ///
    /// Fails if the payload is not an array, or if any element fails.
    pub fn decode_many(&self, raw: &[u8]) -> Result<Vec<T>, DecodeError> {
        let value = serde_json::from_slice(raw)?;
        self.decode_many_value(value)
    }

    /// Decodes an already-parsed JSON array, see [`decode_many`](Self::decode_many).
    ///
    /// # Errors
    ///
    /// Fails if the payload is not an array, or if any element fails.
    pub fn decode_many_value(&self, value: Value) -> Result<Vec<T>, DecodeError> {
        self.check_depth(&value)?;
        let _scope = DepthCheckedScope::enter();
        let items = match value {
            Value::Null => return Ok(Vec::new()),
            Value::Array(items) => items,
            other => return Err(self.unexpected_shape("array", &other)),
        };

        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                self.dispatch(item).map_err(|error| DecodeError::Element {
                    index,
                    source: Box::new(error),
                })
            })
            .collect()
    }

    /// Decodes a JSON object whose values are polymorphic, keeping each
    /// key associated with its decoded value.
    ///
    /// A `null` document decodes to an empty map.
    ///
    /// # Errors
    ///
    /// Fails if the payload is not an object, or if any entry fails.
    pub fn decode_map(&self, raw: &[u8]) -> Result<HashMap<String, T>, DecodeError> {
        let value = serde_json::from_slice(raw)?;
        self.decode_map_value(value)
    }

    /// Decodes an already-parsed JSON object, see [`decode_map`](Self::decode_map).
    ///
    /// # Errors
    ///
    /// Fails if the payload is not an object, or if any entry fails.
    pub fn decode_map_value(&self, value: Value) -> Result<HashMap<String, T>, DecodeError> {
        self.check_depth(&value)?;
        let _scope = DepthCheckedScope::enter();
        let entries = match value {
            Value::Null => return Ok(HashMap::new()),
            Value::Object(entries) => entries,
            other => return Err(self.unexpected_shape("object", &other)),
        };

        entries
            .into_iter()
            .map(|(key, item)| match self.dispatch(item) {
                Ok(decoded) => Ok((key, decoded)),
                Err(error) => Err(DecodeError::Entry {
                    key,
                    source: Box::new(error),
                }),
            })
            .collect()
    }

    /// Picks the variant decoder and runs it, without the depth check.
    fn dispatch(&self, value: Value) -> Result<T, DecodeError> {
        let Value::Object(fields) = &value else {
            return Err(self.unexpected_shape("object", &value));
        };
        let found = fields
            .get(self.discriminator)
            .and_then(DiscriminatorValue::from_json);

        let decoder = match &found {
            Some(found) => self.variants.get(found).unwrap_or_else(|| {
                debug!(registry = self.name, %found, "unknown discriminator, decoding base shape");
                &self.fallback
            }),
            None => {
                debug!(
                    registry = self.name,
                    field = self.discriminator,
                    "no discriminator, decoding base shape"
                );
                &self.fallback
            }
        };

        decoder(value)
    }

    /// Checks the nesting of a tree, unless an enclosing decode already did.
    fn check_depth(&self, value: &Value) -> Result<(), DecodeError> {
        let Some(max_depth) = self.max_depth else {
            return Ok(());
        };
        if DEPTH_CHECKED.get() {
            return Ok(());
        }
        match nesting_beyond(value, max_depth) {
            Some(depth) => Err(DecodeError::DepthExceeded {
                registry: self.name,
                max_depth,
                depth,
            }),
            None => Ok(()),
        }
    }

    fn unexpected_shape(&self, expected: &'static str, value: &Value) -> DecodeError {
        DecodeError::UnexpectedShape {
            registry: self.name,
            expected,
            found: json_kind(value),
        }
    }
}

impl<T> fmt::Debug for VariantRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariantRegistry")
            .field("name", &self.name)
            .field("discriminator", &self.discriminator)
            .field("variants", &self.variants.keys().collect::<Vec<_>>())
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}

/// Walks the tree without recursion and returns the first container depth
/// above `max_depth`, if any. Scalars do not count as a level.
fn nesting_beyond(value: &Value, max_depth: usize) -> Option<usize> {
    let mut stack = vec![(value, 1_usize)];
    while let Some((node, depth)) = stack.pop() {
        if !(node.is_array() || node.is_object()) {
            continue;
        }
        if depth > max_depth {
            return Some(depth);
        }
        let children = node
            .as_array()
            .into_iter()
            .flatten()
            .chain(node.as_object().into_iter().flat_map(|fields| fields.values()));
        stack.extend(
            children
                .filter(|child| child.is_array() || child.is_object())
                .map(|child| (child, depth + 1)),
        );
    }
    None
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
