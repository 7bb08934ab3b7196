//! The content-streaming contract resources are deployed through.

use std::io::Read;

/// Opens a fresh, independent read stream over a resource's content.
///
/// Implementations back this with whatever transport a production
/// deployment uses (an HTTP client, a local file, an in-memory buffer for
/// tests); the engine only ever calls [`Self::open`] and reads the result
/// to completion.
pub trait StreamProvider: Send + Sync {
    /// Opens a new stream over the resource's content.
    ///
    /// # Errors
    ///
    /// Returns an error if the content cannot be opened for reading.
    fn open(&self) -> std::io::Result<Box<dyn Read + Send>>;
}

/// A [`StreamProvider`] over an in-memory byte buffer, for tests and
/// resources whose content is already resident.
#[derive(Clone, Debug)]
pub struct StaticStreamProvider(Vec<u8>);

impl StaticStreamProvider {
    /// Creates a provider that always opens a fresh cursor over `content`.
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        Self(content.into())
    }
}

impl StreamProvider for StaticStreamProvider {
    fn open(&self) -> std::io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(std::io::Cursor::new(self.0.clone())))
    }
}
