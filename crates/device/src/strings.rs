//! String descriptor table
//!
//! Index 0 is reserved for the supported-language-id list; every other
//! index maps to one UTF-16LE string. Descriptors are wrapped with the
//! 2-byte (bLength, 0x03) header on the way out.

use std::collections::BTreeMap;

use crate::error::{DescriptorError, Result};

/// Descriptor type byte for strings.
const DT_STRING: u8 = 0x03;

/// US English, the default language id.
pub const LANG_EN_US: u16 = 0x0409;

/// Longest string body a descriptor can carry: (255 - header) / 2 units.
const MAX_UNITS: usize = 126;

#[derive(Debug, Clone)]
pub struct StringTable {
    languages: Vec<u16>,
    strings: BTreeMap<u8, String>,
}

impl Default for StringTable {
    fn default() -> Self {
        Self::new(vec![LANG_EN_US])
    }
}

impl StringTable {
    pub fn new(languages: Vec<u16>) -> Self {
        Self {
            languages,
            strings: BTreeMap::new(),
        }
    }

    /// Register a string at `index` (1..=255).
    pub fn insert(&mut self, index: u8, text: impl Into<String>) {
        self.strings.insert(index, text.into());
    }

    pub fn with(mut self, index: u8, text: impl Into<String>) -> Self {
        self.insert(index, text);
        self
    }

    pub fn languages(&self) -> &[u16] {
        &self.languages
    }

    /// Full string descriptor bytes for `index`; index 0 yields the
    /// language-id list.
    pub fn descriptor(&self, index: u8) -> Result<Vec<u8>> {
        if index == 0 {
            let mut out = Vec::with_capacity(2 + self.languages.len() * 2);
            out.push((2 + self.languages.len() * 2) as u8);
            out.push(DT_STRING);
            for lang in &self.languages {
                out.extend_from_slice(&lang.to_le_bytes());
            }
            return Ok(out);
        }

        let text = self
            .strings
            .get(&index)
            .ok_or(DescriptorError::StringIndex { index })?;
        let units: Vec<u16> = text.encode_utf16().take(MAX_UNITS).collect();
        let mut out = Vec::with_capacity(2 + units.len() * 2);
        out.push((2 + units.len() * 2) as u8);
        out.push(DT_STRING);
        for unit in units {
            out.extend_from_slice(&unit.to_le_bytes());
        }
        Ok(out)
    }
}
