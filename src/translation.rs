//! Static byte translation tables
//!
//! A table file is exactly 256 bytes: entry `i` is the byte that local
//! character `i` becomes on its way to the host. The first 32 entries must be
//! the identity so control characters keep their meaning.
//!
//! In [`TableMode::InboundDefinesOutbound`] the file defines the inbound
//! table, which must be a permutation, and the outbound table is its inverse.
//! In [`TableMode::Direct`] the file is used as the outbound table only and
//! input is sent untranslated.

use std::fs;
use std::path::Path;

use crate::error::TableLoadError;

/// How a table file is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableMode {
    InboundDefinesOutbound,
    Direct,
}

impl TableMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "inbound" | "1" => Some(TableMode::InboundDefinesOutbound),
            "direct" | "2" => Some(TableMode::Direct),
            _ => None,
        }
    }
}

/// Inbound (keyboard to host) and outbound (host to display) byte maps
#[derive(Clone, PartialEq, Eq)]
pub struct TranslationTable {
    inbound: [u8; 256],
    outbound: [u8; 256],
    mode: TableMode,
}

impl std::fmt::Debug for TranslationTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationTable").field("mode", &self.mode).finish()
    }
}

impl TranslationTable {
    pub fn from_bytes(bytes: &[u8], mode: TableMode) -> Result<Self, TableLoadError> {
        if bytes.len() != 256 {
            return Err(TableLoadError::WrongSize { size: bytes.len() });
        }
        let mut inbound = [0u8; 256];
        inbound.copy_from_slice(bytes);

        if let Some(index) = (0..32).find(|&i| inbound[i] as usize != i) {
            return Err(TableLoadError::ControlNotIdentity { index, value: inbound[index] });
        }

        let outbound = match mode {
            TableMode::InboundDefinesOutbound => {
                let mut outbound = [0u8; 256];
                let mut seen: [Option<usize>; 256] = [None; 256];
                for (i, &value) in inbound.iter().enumerate() {
                    if let Some(first) = seen[value as usize] {
                        return Err(TableLoadError::DuplicateMapping { value, first, second: i });
                    }
                    seen[value as usize] = Some(i);
                    outbound[value as usize] = i as u8;
                }
                outbound
            }
            TableMode::Direct => inbound,
        };

        Ok(Self { inbound, outbound, mode })
    }

    pub fn load(path: &Path, mode: TableMode) -> Result<Self, TableLoadError> {
        let bytes = fs::read(path).map_err(|e| TableLoadError::Io {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        let table = Self::from_bytes(&bytes, mode)?;
        log::info!("Loaded {:?} translation table from {}", mode, path.display());
        Ok(table)
    }

    pub fn mode(&self) -> TableMode {
        self.mode
    }

    pub fn inbound_byte(&self, byte: u8) -> u8 {
        match self.mode {
            TableMode::InboundDefinesOutbound => self.inbound[byte as usize],
            TableMode::Direct => byte,
        }
    }

    pub fn outbound_byte(&self, byte: u8) -> u8 {
        self.outbound[byte as usize]
    }

    /// Translate a completed input record before it goes to the host
    pub fn translate_inbound(&self, data: &mut [u8]) {
        if self.mode == TableMode::Direct {
            return;
        }
        for b in data.iter_mut() {
            *b = self.inbound[*b as usize];
        }
    }

    /// Translate host output before it reaches the display
    pub fn translate_outbound(&self, data: &mut [u8]) {
        for b in data.iter_mut() {
            *b = self.outbound[*b as usize];
        }
    }
}
