/// Errors raised while decoding a discriminated payload.
///
/// An unknown discriminator value is not an error: the registry falls back to
/// its base shape.
#[derive(Debug, derive_more::Error, derive_more::Display, derive_more::From)]
pub enum DecodeError {
    /// The payload is not valid JSON.
    #[display("Invalid JSON payload: {_0}")]
    Json(serde_json::Error),

    /// The payload is valid JSON of the wrong kind (e.g. a number where an object is expected).
    #[display("Expected a JSON {expected} for {registry}, found {found}")]
    #[from(skip)]
    UnexpectedShape {
        /// Name of the polymorphic type being decoded.
        registry: &'static str,
        /// Expected JSON kind.
        expected: &'static str,
        /// Actual JSON kind.
        found: &'static str,
    },

    /// The selected variant's fields cannot be parsed from the payload.
    #[display("Failed to decode {registry} as variant '{variant}' at '{path}': {error}")]
    #[from(skip)]
    Variant {
        /// Name of the polymorphic type being decoded.
        registry: &'static str,
        /// Discriminator value of the selected variant, `<base>` for the fallback shape.
        variant: String,
        /// Path of the failing field inside the payload.
        path: String,
        /// The underlying JSON error.
        error: serde_json::Error,
    },

    /// A plain (non-polymorphic) body cannot be parsed as the expected type.
    #[display("Failed to decode {target} at '{path}': {error}\n{body}")]
    #[from(skip)]
    Body {
        /// Name of the expected type.
        target: &'static str,
        /// Path of the failing field inside the body.
        path: String,
        /// The underlying JSON error.
        error: serde_json::Error,
        /// The body, truncated to 1 KiB.
        body: String,
    },

    /// The payload nests deeper than the registry allows.
    #[display("{registry} payload nests {depth} levels deep, the limit is {max_depth}")]
    #[from(skip)]
    DepthExceeded {
        /// Name of the polymorphic type being decoded.
        registry: &'static str,
        /// Configured limit.
        max_depth: usize,
        /// Depth reached before giving up.
        depth: usize,
    },

    /// An element of an array payload failed to decode.
    #[display("Element {index}: {source}")]
    #[from(skip)]
    Element {
        /// Position of the element in the source array.
        index: usize,
        /// Why the element failed.
        source: Box<DecodeError>,
    },

    /// An entry of a map payload failed to decode.
    #[display("Entry '{key}': {source}")]
    #[from(skip)]
    Entry {
        /// Key of the failing entry.
        key: String,
        /// Why the entry failed.
        source: Box<DecodeError>,
    },
}
