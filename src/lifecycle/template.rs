//! Deep-copy templates.
//!
//! A template holds the original worker function and produces independent copies of it,
//! one per worker. The manager never hands out the original itself.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

use super::error::CloneError;

/// Produces independent copies of an original worker function.
pub trait Template<F>: Send + Sync {
    fn replicate(&self) -> Result<F, CloneError>;
}

/// Copies by serializing the original once and deserializing a fresh value per copy.
///
/// Fields marked `#[serde(skip)]` come back as their `Default`, which is how runtime-only
/// state (connections, buffers) stays out of the template.
pub struct SerializedTemplate<F> {
    encoded: Vec<u8>,
    _marker: PhantomData<fn() -> F>,
}

impl<F> SerializedTemplate<F>
where
    F: Serialize + DeserializeOwned,
{
    /// Encodes `original` and decodes it once, so an original that cannot be
    /// reproduced is rejected here instead of on first use.
    pub fn new(original: &F) -> Result<Self, CloneError> {
        let encoded = serde_json::to_vec(original).map_err(CloneError::Encode)?;
        serde_json::from_slice::<F>(&encoded).map_err(CloneError::Decode)?;
        Ok(Self {
            encoded,
            _marker: PhantomData,
        })
    }

    /// Size of the encoded original in bytes.
    pub fn encoded_len(&self) -> usize {
        self.encoded.len()
    }
}

impl<F> Template<F> for SerializedTemplate<F>
where
    F: DeserializeOwned,
{
    fn replicate(&self) -> Result<F, CloneError> {
        serde_json::from_slice(&self.encoded).map_err(CloneError::Decode)
    }
}

/// Copies via `Clone`. The original must own all of its state.
pub struct CloneTemplate<F> {
    original: F,
}

impl<F> CloneTemplate<F> {
    pub fn new(original: F) -> Self {
        Self { original }
    }
}

impl<F> Template<F> for CloneTemplate<F>
where
    F: Clone + Send + Sync,
{
    fn replicate(&self) -> Result<F, CloneError> {
        Ok(self.original.clone())
    }
}

/// Copies via a user-supplied factory.
pub struct FnTemplate<C> {
    factory: C,
}

impl<C> FnTemplate<C> {
    pub fn new(factory: C) -> Self {
        Self { factory }
    }
}

impl<F, C> Template<F> for FnTemplate<C>
where
    C: Fn() -> Result<F, CloneError> + Send + Sync,
{
    fn replicate(&self) -> Result<F, CloneError> {
        (self.factory)()
    }
}
