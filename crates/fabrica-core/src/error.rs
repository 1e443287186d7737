use thiserror::Error;

/// Core error type shared across Fabrica crates.
///
/// Variants are shaped by origin: failures are never retried or wrapped with
/// extra context, they propagate to the calling test as-is.
#[derive(Debug, Error)]
pub enum Error {
    /// The default-attributes generator failed.
    #[error("attributes error: {0}")]
    Attributes(String),
    /// An adapter build/save failed.
    #[error("adapter error: {0}")]
    Adapter(String),
    /// An after-build or after-create hook failed.
    #[error("hook error: {0}")]
    Hook(String),
    /// A field lookup on a built or saved instance failed.
    #[error("missing field: {0}")]
    MissingField(String),
    /// An association placeholder survived resolution. Placeholders are only
    /// scanned at the top level of an attribute tree; one embedded deeper in a
    /// literal nested object surfaces here.
    #[error("unresolved association at '{0}'")]
    UnresolvedAssociation(String),
    /// Catch-all for unexpected failures.
    #[error("other error: {0}")]
    Other(String),
}

/// Convenience alias for results returned by Fabrica crates.
pub type Result<T> = std::result::Result<T, Error>;
