//! Seam to the NFC layer that talks to a MIFARE Ultralight tag.

use std::fmt;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::Uid;

pub const PAGE_SIZE: usize = 4;

pub type Page = [u8; PAGE_SIZE];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("tag not present")]
    NotPresent,

    #[error("tag did not answer in time")]
    Timeout,

    #[error("password authentication rejected")]
    Authentication,

    #[error("protocol error: {0}")]
    Protocol(String),
}

/// 4-byte PWD_AUTH password.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Password(pub [u8; 4]);

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(..)")
    }
}

/// Credentials for a full card read.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub password: Password,
    pub skip_auth: bool,
}

impl AuthContext {
    /// Authentication with `password` that the reader must not skip.
    pub fn required(password: [u8; 4]) -> Self {
        Self {
            password: Password(password),
            skip_auth: false,
        }
    }
}

/// Pages dumped from a tag; unread pages are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryImage {
    uid: Uid,
    pages: Vec<Option<Page>>,
}

impl MemoryImage {
    pub fn new(uid: Uid, pages: Vec<Option<Page>>) -> Self {
        Self { uid, pages }
    }

    pub fn uid(&self) -> &Uid {
        &self.uid
    }

    pub fn page(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)?.as_ref()
    }

    pub fn pages(&self) -> &[Option<Page>] {
        &self.pages
    }

    pub fn pages_total(&self) -> usize {
        self.pages.len()
    }

    pub fn pages_read(&self) -> usize {
        self.pages.iter().filter(|p| p.is_some()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.pages_read() == self.pages_total()
    }
}

/// Synchronous access to one selected tag.
pub trait UltralightTransport {
    /// UID of the selected tag.
    fn uid(&self) -> Uid;

    /// Read one 4-byte page.
    fn read_page(&mut self, index: u8) -> Result<Page, TransportError>;

    /// Authenticate with `auth` and dump the whole tag.
    ///
    /// Pages the reader could not fetch are left out of the image rather than
    /// reported as an error.
    fn read_card(&mut self, auth: &AuthContext) -> Result<MemoryImage, TransportError>;

    /// Whether `image` holds every page of the tag.
    fn is_fully_populated(&self, image: &MemoryImage) -> bool {
        image.is_complete()
    }
}
