use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::Path;

use crate::crypto::Uid;
use crate::format::parse_hex_bytes;
use crate::transport::{
    AuthContext, MemoryImage, Page, Password, TransportError, UltralightTransport,
};

/// Captured tag as written to disk.
///
/// ```toml
/// uid = "04 11 22 33 44 55 66"
/// password = "DE AD BE EF"
/// protected_from = 16
/// unreadable = [20]
/// pages = ["04 11 22 BF", "33 44 55 66", ...]
/// ```
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Capture {
    uid: String,
    pages: Vec<String>,
    password: Option<String>,
    protected_from: Option<usize>,
    #[serde(default)]
    unreadable: Vec<usize>,
}

/// In-memory MIFARE Ultralight answering like a tag in the field.
///
/// Pages from `protected_from` on are only readable after a successful
/// password authentication. Pages listed as unreadable never answer, which
/// leaves holes in a full card dump.
#[derive(Debug, Clone)]
pub struct EmulatedTag {
    uid: Uid,
    pages: Vec<Page>,
    password: Option<Password>,
    protected_from: usize,
    unreadable: Vec<usize>,
    authenticated: bool,
}

impl EmulatedTag {
    pub fn new(uid: Uid, pages: Vec<Page>) -> Self {
        let protected_from = pages.len();
        Self {
            uid,
            pages,
            password: None,
            protected_from,
            unreadable: Vec::new(),
            authenticated: false,
        }
    }

    pub fn with_password(mut self, password: [u8; 4], protected_from: usize) -> Self {
        self.password = Some(Password(password));
        self.protected_from = protected_from;
        self
    }

    pub fn with_unreadable(mut self, page: usize) -> Self {
        self.unreadable.push(page);
        self
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let capture: Capture = toml::from_str(text).context("failed to parse tag capture")?;

        let uid = parse_hex_bytes(&capture.uid)
            .with_context(|| format!("invalid uid {:?}", capture.uid))?;

        let pages = capture
            .pages
            .iter()
            .enumerate()
            .map(|(i, page)| {
                parse_hex_bytes(page).with_context(|| format!("invalid page {i}: {page:?}"))
            })
            .collect::<Result<Vec<Page>>>()?;
        if pages.is_empty() {
            bail!("tag capture has no pages");
        }

        let mut tag = Self::new(uid, pages);
        if let Some(password) = &capture.password {
            let password = parse_hex_bytes(password).context("invalid password")?;
            let protected_from = capture.protected_from.unwrap_or(tag.pages.len());
            tag = tag.with_password(password, protected_from);
        }
        for page in capture.unreadable {
            tag = tag.with_unreadable(page);
        }

        Ok(tag)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read tag capture {}", path.display()))?;
        let tag = Self::from_toml(&text)?;
        log::info!(
            "loaded emulated tag from {} ({} pages)",
            path.display(),
            tag.pages.len()
        );
        Ok(tag)
    }

    fn readable(&self, index: usize) -> bool {
        !self.unreadable.contains(&index) && (self.authenticated || index < self.protected_from)
    }
}

impl UltralightTransport for EmulatedTag {
    fn uid(&self) -> Uid {
        self.uid
    }

    fn read_page(&mut self, index: u8) -> Result<Page, TransportError> {
        let index = usize::from(index);
        match self.pages.get(index) {
            Some(page) if self.readable(index) => Ok(*page),
            Some(_) => Err(TransportError::Protocol(format!("NAK reading page {index}"))),
            None => Err(TransportError::Protocol(format!("page {index} out of range"))),
        }
    }

    fn read_card(&mut self, auth: &AuthContext) -> Result<MemoryImage, TransportError> {
        if let Some(password) = &self.password {
            if !auth.skip_auth {
                if auth.password != *password {
                    return Err(TransportError::Authentication);
                }
                self.authenticated = true;
            }
        }

        let pages = self
            .pages
            .iter()
            .enumerate()
            .map(|(i, page)| self.readable(i).then_some(*page))
            .collect();
        Ok(MemoryImage::new(self.uid, pages))
    }
}
