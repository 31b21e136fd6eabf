//! # Security Identifier Syntax
//!
//! Structural parsing of textual SIDs (`S-1-5-21-...`). Only the shape is
//! checked here; whether a domain actually exists is the caller's concern.

use std::fmt;

/// Maximum number of sub-authorities a SID may carry.
pub const MAX_SUB_AUTHORITIES: usize = 15;

/// The identifier authority is a 48-bit value.
const MAX_ID_AUTHORITY: u64 = (1 << 48) - 1;

/// A parsed domain SID.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DomainSid {
    pub revision: u8,
    pub id_authority: u64,
    pub sub_authorities: Vec<u32>,
}

impl DomainSid {
    /// Parse `S-<rev>-<authority>(-<sub>){0,15}`.
    ///
    /// The authority may be decimal or `0x`-prefixed hex. Returns `None` for
    /// anything that does not have that exact shape.
    pub fn parse(text: &str) -> Option<Self> {
        let rest = text.strip_prefix("S-").or_else(|| text.strip_prefix("s-"))?;
        let mut parts = rest.split('-');

        let revision = u8::try_from(parse_decimal(parts.next()?)?).ok()?;
        let id_authority = parse_authority(parts.next()?)?;

        let mut sub_authorities = Vec::new();
        for part in parts {
            if sub_authorities.len() == MAX_SUB_AUTHORITIES {
                return None;
            }
            sub_authorities.push(u32::try_from(parse_decimal(part)?).ok()?);
        }

        Some(Self {
            revision,
            id_authority,
            sub_authorities,
        })
    }
}

impl fmt::Display for DomainSid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}-", self.revision)?;
        if self.id_authority > u64::from(u32::MAX) {
            write!(f, "0x{:012X}", self.id_authority)?;
        } else {
            write!(f, "{}", self.id_authority)?;
        }
        for sub in &self.sub_authorities {
            write!(f, "-{}", sub)?;
        }
        Ok(())
    }
}

fn parse_decimal(part: &str) -> Option<u64> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

fn parse_authority(part: &str) -> Option<u64> {
    let value = match part.strip_prefix("0x").or_else(|| part.strip_prefix("0X")) {
        Some(hex) if !hex.is_empty() && hex.bytes().all(|b| b.is_ascii_hexdigit()) => {
            u64::from_str_radix(hex, 16).ok()?
        }
        Some(_) => return None,
        None => parse_decimal(part)?,
    };
    (value <= MAX_ID_AUTHORITY).then_some(value)
}
