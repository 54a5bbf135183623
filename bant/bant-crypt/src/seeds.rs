use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::SeedSource;
use crate::crypto::{DerivedKey, Uid, derive_key};
use crate::format::{FormatError, KeyValueFile};

pub const SEEDS_HEADER: &str = "Bandai BANT seeds";
pub const SEEDS_VERSION: u32 = 2;
pub const DEFAULT_SEEDS_PATH: &str = "/ext/nfc/assets/bant_seeds.nfc";

/// SHA-256 block size; longer HMAC keys are rejected at load time.
pub const HMAC_KEY_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("seed database {} not found", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read seed database {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unexpected seed database header {filetype:?} version {version}")]
    Header { filetype: String, version: u32 },

    #[error("cannot allocate {0} seeds")]
    Allocation(u32),

    #[error("HMAC key {key:?} is {len} bytes, longer than the key buffer")]
    KeyTooLong { key: String, len: usize },

    #[error(transparent)]
    Format(#[from] FormatError),
}

/// HMAC key held in a fixed buffer with explicit length.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct HmacKey {
    buf: [u8; HMAC_KEY_CAPACITY],
    len: usize,
}

impl HmacKey {
    /// Build a key from its stored text; a single trailing `\n` is not part of the key.
    ///
    /// Returns `None` if the key does not fit in [`HMAC_KEY_CAPACITY`].
    pub fn new(raw: &[u8]) -> Option<Self> {
        let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
        if raw.len() > HMAC_KEY_CAPACITY {
            return None;
        }
        let mut buf = [0u8; HMAC_KEY_CAPACITY];
        buf[..raw.len()].copy_from_slice(raw);
        Some(Self {
            buf,
            len: raw.len(),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl fmt::Debug for HmacKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HmacKey({} bytes)", self.len)
    }
}

/// Per-product secrets.
#[derive(Debug, Clone)]
pub struct Seed {
    pub name: String,
    pub item_id: u16,
    pub hmac_key_a: HmacKey,
    pub hmac_key_b: HmacKey,
    pub scramble_map: [u8; 16],
}

/// All seeds of one database, in file order.
#[derive(Debug, Clone, Default)]
pub struct SeedStore {
    seeds: Vec<Seed>,
}

impl SeedStore {
    pub fn new(seeds: Vec<Seed>) -> Self {
        Self { seeds }
    }

    /// Read and parse the database at `path`.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let text = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                StoreError::NotFound(path.to_path_buf())
            } else {
                StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        Self::parse(&text)
    }

    /// Parse a database. Either every declared seed is read or none is returned.
    pub fn parse(text: &str) -> Result<Self, StoreError> {
        let file = KeyValueFile::parse(text)?;

        let (filetype, version) = file.header()?;
        if filetype != SEEDS_HEADER || version != SEEDS_VERSION {
            return Err(StoreError::Header {
                filetype: filetype.to_string(),
                version,
            });
        }

        let count = file.read_u32("Count")?;
        let mut seeds = Vec::new();
        usize::try_from(count)
            .ok()
            .and_then(|n| seeds.try_reserve_exact(n).ok())
            .ok_or(StoreError::Allocation(count))?;

        for i in 0..count {
            seeds.push(read_seed(&file, i)?);
        }

        log::debug!("loaded {} BANT seeds", seeds.len());
        Ok(Self { seeds })
    }

    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }

    pub fn seeds(&self) -> &[Seed] {
        &self.seeds
    }

    /// First seed for `item_id`, in store order.
    pub fn find(&self, item_id: u16) -> Option<&Seed> {
        self.seeds.iter().find(|seed| seed.item_id == item_id)
    }

    /// Pick the seed for `product_id` and derive the credentials of `uid`.
    ///
    /// `None` means the product is not supported.
    pub fn select(&self, uid: &Uid, product_id: u16) -> Option<(&Seed, DerivedKey)> {
        let seed = self.find(product_id)?;
        Some((seed, derive_key(uid, seed)))
    }
}

fn read_key(file: &KeyValueFile, key: &str) -> Result<HmacKey, StoreError> {
    let value = file.read_string(key)?;
    HmacKey::new(value.as_bytes()).ok_or_else(|| StoreError::KeyTooLong {
        key: key.to_string(),
        len: value.len(),
    })
}

fn read_seed(file: &KeyValueFile, i: u32) -> Result<Seed, StoreError> {
    let name = file.read_string(&format!("Name {i}"))?.to_string();
    // Only the low 16 bits identify the product.
    let item_id = file.read_u32(&format!("Item ID {i}"))? as u16;
    let hmac_key_a = read_key(file, &format!("HMAC key A {i}"))?;
    let hmac_key_b = read_key(file, &format!("HMAC key B {i}"))?;
    let scramble_map = file.read_hex::<16>(&format!("Scramble map {i}"))?;

    Ok(Seed {
        name,
        item_id,
        hmac_key_a,
        hmac_key_b,
        scramble_map,
    })
}

/// Seeds read from a database file on every load.
#[derive(Debug, Clone)]
pub struct FileSeedSource {
    path: PathBuf,
}

impl FileSeedSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileSeedSource {
    fn default() -> Self {
        Self::new(DEFAULT_SEEDS_PATH)
    }
}

impl SeedSource for SeedStore {
    fn load(&self) -> Result<SeedStore, StoreError> {
        Ok(self.clone())
    }
}

impl SeedSource for FileSeedSource {
    fn load(&self) -> Result<SeedStore, StoreError> {
        SeedStore::load(&self.path)
    }
}
