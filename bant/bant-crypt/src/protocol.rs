use std::fmt;
use thiserror::Error;

use crate::SeedSource;
use crate::crypto::{DerivedKey, Uid};
use crate::seeds::{SeedStore, StoreError};
use crate::transport::{AuthContext, MemoryImage, Page, TransportError, UltralightTransport};

pub const MAGIC_PAGE: u8 = 4;
pub const PRODUCT_INFO_PAGE: u8 = 5;
pub const BANT_MAGIC: Page = [0x42, 0x41, 0x4e, 0x54];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Verifying,
    ReadingProductInfo,
    SelectingKey,
    Authenticating,
    BulkReading,
    Validated,
    Unverified,
    Unsupported,
    Aborted,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Idle => "idle",
            State::Verifying => "verifying",
            State::ReadingProductInfo => "reading product info",
            State::SelectingKey => "selecting key",
            State::Authenticating => "authenticating",
            State::BulkReading => "bulk reading",
            State::Validated => "validated",
            State::Unverified => "unverified",
            State::Unsupported => "unsupported",
            State::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("transport failed while {state}")]
    Transport {
        state: State,
        #[source]
        source: TransportError,
    },

    #[error("seed database unavailable")]
    Store(#[from] StoreError),
}

/// Normal results of a read; failures are [`ReadError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Magic page does not carry the BANT signature.
    Unverified,
    /// BANT tag, but no seed for its product.
    Unsupported { product_id: u16 },
    /// Transport succeeded and every page was read.
    Complete(MemoryImage),
    /// Transport succeeded but some pages are missing.
    Incomplete(MemoryImage),
}

/// Drives verify and read for one tag at a time.
///
/// Seeds are loaded from the source on the first read and kept for the
/// lifetime of the reader.
pub struct BantReader<S> {
    source: S,
    store: Option<SeedStore>,
    state: State,
}

impl<S: SeedSource> BantReader<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            store: None,
            state: State::Idle,
        }
    }

    /// Where the last verify or read stopped.
    pub fn state(&self) -> State {
        self.state
    }

    fn enter(&mut self, state: State) {
        log::debug!("BANT: {} -> {}", self.state, state);
        self.state = state;
    }

    /// Check the magic page. Read failures count as "not a BANT tag".
    pub fn verify<T: UltralightTransport + ?Sized>(&mut self, transport: &mut T) -> bool {
        self.state = State::Idle;
        self.enter(State::Verifying);

        let verified = match transport.read_page(MAGIC_PAGE) {
            Ok(page) => page == BANT_MAGIC,
            Err(e) => {
                log::debug!("BANT: magic page read failed: {e}");
                false
            }
        };

        if !verified {
            self.enter(State::Unverified);
        }
        verified
    }

    /// Read a tag that already passed [`verify`](Self::verify).
    pub fn read<T: UltralightTransport + ?Sized>(
        &mut self,
        transport: &mut T,
    ) -> Result<ReadOutcome, ReadError> {
        let result = self.read_verified(transport);
        if let Err(e) = &result {
            log::warn!("BANT read aborted: {e}");
            self.enter(State::Aborted);
        }
        result
    }

    /// Verify, then read.
    pub fn run<T: UltralightTransport + ?Sized>(
        &mut self,
        transport: &mut T,
    ) -> Result<ReadOutcome, ReadError> {
        if !self.verify(transport) {
            return Ok(ReadOutcome::Unverified);
        }
        self.read(transport)
    }

    fn read_verified<T: UltralightTransport + ?Sized>(
        &mut self,
        transport: &mut T,
    ) -> Result<ReadOutcome, ReadError> {
        self.enter(State::ReadingProductInfo);
        let info = transport
            .read_page(PRODUCT_INFO_PAGE)
            .map_err(|source| ReadError::Transport {
                state: self.state,
                source,
            })?;
        let product_id = u16::from_be_bytes([info[0], info[1]]);

        self.enter(State::SelectingKey);
        let uid = transport.uid();
        let Some(key) = self.select_key(&uid, product_id)? else {
            log::debug!("BANT: no seed for product {product_id:#06x}");
            self.enter(State::Unsupported);
            return Ok(ReadOutcome::Unsupported { product_id });
        };

        self.enter(State::Authenticating);
        let auth = AuthContext::required(key.pwd);
        drop(key);

        let image = transport.read_card(&auth).map_err(|source| {
            let state = if source == TransportError::Authentication {
                State::Authenticating
            } else {
                State::BulkReading
            };
            ReadError::Transport { state, source }
        })?;
        self.enter(State::BulkReading);

        let complete = transport.is_fully_populated(&image);
        self.enter(State::Validated);

        if complete {
            log::info!(
                "BANT: read {} pages of product {product_id:#06x}",
                image.pages_total()
            );
            Ok(ReadOutcome::Complete(image))
        } else {
            log::warn!(
                "BANT: only {} of {} pages read",
                image.pages_read(),
                image.pages_total()
            );
            Ok(ReadOutcome::Incomplete(image))
        }
    }

    fn select_key(&mut self, uid: &Uid, product_id: u16) -> Result<Option<DerivedKey>, StoreError> {
        if self.store.is_none() {
            let store = self.source.load()?;
            log::info!("BANT: loaded {} seeds", store.len());
            self.store = Some(store);
        }

        Ok(self
            .store
            .as_ref()
            .and_then(|store| store.select(uid, product_id))
            .map(|(seed, key)| {
                log::debug!("BANT: using seed {:?}", seed.name);
                key
            }))
    }
}
