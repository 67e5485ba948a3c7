// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Endpoint identity (GUID) for the in-process transport.
//!
//! Layout follows RTPS: a 12-byte prefix shared by every endpoint created from
//! the same `Domain` handle, and a 4-byte entity id whose last byte encodes
//! the endpoint kind.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::{SystemTime, UNIX_EPOCH};

/// Entity kind byte for a writer on an unkeyed topic (RTPS 0x03).
pub const ENTITY_KIND_WRITER: u8 = 0x03;
/// Entity kind byte for a reader on an unkeyed topic (RTPS 0x04).
pub const ENTITY_KIND_READER: u8 = 0x04;

/// Globally unique endpoint identifier
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Guid {
    pub prefix: [u8; 12],
    pub entity_id: [u8; 4],
}

impl Guid {
    /// Create GUID from separate prefix and entity ID
    pub const fn new(prefix: [u8; 12], entity_id: [u8; 4]) -> Self {
        Self { prefix, entity_id }
    }

    /// Create GUID with all zeros (invalid/placeholder)
    pub const fn zero() -> Self {
        Self {
            prefix: [0; 12],
            entity_id: [0; 4],
        }
    }

    /// Build the GUID of the `index`-th entity under `prefix`.
    pub(crate) fn for_entity(prefix: [u8; 12], index: u32, kind: u8) -> Self {
        let key = index.to_be_bytes();
        // 24-bit entity key + kind byte
        Self {
            prefix,
            entity_id: [key[1], key[2], key[3], kind],
        }
    }

    /// Last byte of the entity id.
    pub fn entity_kind(&self) -> u8 {
        self.entity_id[3]
    }

    /// Convert GUID to 16-byte array
    pub fn as_bytes(&self) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        bytes[0..12].copy_from_slice(&self.prefix);
        bytes[12..16].copy_from_slice(&self.entity_id);
        bytes
    }
}

impl Default for Guid {
    fn default() -> Self {
        Self::zero()
    }
}

struct GuidPrefixDisplay<'a>(&'a [u8; 12]);

impl fmt::Display for GuidPrefixDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Format: "01.0f.ac.10.00.00.00.00.00.00.00.01.00.00.01.03"
        write!(f, "{}", GuidPrefixDisplay(&self.prefix))?;
        for byte in &self.entity_id {
            write!(f, ".{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({})", self)
    }
}

/// Generate a GUID prefix for a new `Domain` handle.
///
/// Process id + wall clock nanoseconds, mixed with the domain id so two
/// handles created in the same nanosecond on different domains still differ.
pub(crate) fn generate_prefix(domain_id: u32) -> [u8; 12] {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;

    let mixed = {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        nanos.hash(&mut hasher);
        domain_id.hash(&mut hasher);
        std::thread::current().id().hash(&mut hasher);
        hasher.finish()
    };

    let mut prefix = [0u8; 12];
    prefix[0..4].copy_from_slice(&std::process::id().to_le_bytes());
    prefix[4..12].copy_from_slice(&mixed.to_le_bytes());
    prefix
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_guid_layout() {
        let prefix = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];
        let guid = Guid::for_entity(prefix, 0x0001_0203, ENTITY_KIND_WRITER);

        assert_eq!(guid.prefix, prefix);
        assert_eq!(guid.entity_id, [0x01, 0x02, 0x03, ENTITY_KIND_WRITER]);
        assert_eq!(guid.entity_kind(), ENTITY_KIND_WRITER);
    }

    #[test]
    fn display_is_dotted_hex() {
        let guid = Guid::for_entity([0xab; 12], 1, ENTITY_KIND_READER);
        let text = guid.to_string();
        assert!(text.starts_with("ab.ab."));
        assert!(text.ends_with(".00.00.01.04"));
    }

    #[test]
    fn distinct_entities_distinct_guids() {
        let prefix = generate_prefix(0);
        let a = Guid::for_entity(prefix, 1, ENTITY_KIND_WRITER);
        let b = Guid::for_entity(prefix, 2, ENTITY_KIND_WRITER);
        assert_ne!(a, b);
        assert_ne!(a, Guid::zero());
    }
}
