pub mod crypto;
pub mod format;
pub mod protocol;
pub mod seeds;
pub mod transport;

#[cfg(feature = "emulated-tag")]
pub mod emulated;

pub use crypto::{DerivedKey, UID_LEN, Uid, derive_key};
pub use protocol::{BantReader, ReadError, ReadOutcome, State};
pub use seeds::{FileSeedSource, HmacKey, Seed, SeedStore, StoreError};
pub use transport::{AuthContext, MemoryImage, Page, Password, TransportError, UltralightTransport};

/// Where BANT seeds come from.
///
/// Each load returns a complete, freshly parsed [`SeedStore`]; a failed
/// load exposes no seeds at all.
pub trait SeedSource {
    fn load(&self) -> Result<SeedStore, StoreError>;
}

impl<T: SeedSource + ?Sized> SeedSource for &T {
    fn load(&self) -> Result<SeedStore, StoreError> {
        (**self).load()
    }
}
