//! # Database Invariant Checker
//!
//! Reads every committed record of a `FileStore` and verifies the allocator
//! invariants as a whole:
//!
//! - forward and reverse mappings agree in both directions
//! - no range number is owned twice
//! - every range number is below `maxranges`
//! - the range HWM is one more than the highest range number (or 0)

use idmap_autorid::domain::keys::{ALLOC_HWM_GID, ALLOC_HWM_UID, CONFIG_KEY, HWM};
use idmap_autorid::ports::outbound::decode_u32;
use idmap_autorid::{FileStore, GlobalConfig};
use std::collections::BTreeMap;

/// Snapshot of the mapping state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbSummary {
    pub hwm: u32,
    pub config: GlobalConfig,
    /// range number -> owning domain key
    pub ranges: BTreeMap<u32, String>,
}

/// Keys that are neither forward nor reverse mappings.
const RESERVED: [&str; 5] = [HWM, ALLOC_HWM_UID, ALLOC_HWM_GID, CONFIG_KEY, "testkey"];

pub fn check_invariants(store: &FileStore) -> Result<DbSummary, String> {
    let records = store.records().map_err(|e| e.to_string())?;

    let mut hwm = None;
    let mut config = None;
    let mut forward: BTreeMap<String, u32> = BTreeMap::new();
    let mut reverse: BTreeMap<u32, String> = BTreeMap::new();

    for (key, value) in records {
        let key = String::from_utf8(key).map_err(|_| "non-utf8 key".to_string())?;
        if key == HWM {
            hwm = Some(decode_u32(key.as_bytes(), &value).map_err(|e| e.to_string())?);
        } else if key == CONFIG_KEY {
            config = Some(GlobalConfig::from_record(&value).map_err(|e| e.to_string())?);
        } else if RESERVED.contains(&key.as_str()) {
            continue;
        } else if !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit()) {
            let number: u32 = key.parse().map_err(|_| format!("bad reverse key {}", key))?;
            let owner =
                String::from_utf8(value).map_err(|_| format!("bad owner of range {}", number))?;
            reverse.insert(number, owner);
        } else {
            let number = decode_u32(key.as_bytes(), &value).map_err(|e| e.to_string())?;
            forward.insert(key, number);
        }
    }

    let hwm = hwm.ok_or("range HWM missing")?;
    let config = config.ok_or("configuration missing")?;

    for (key, number) in &forward {
        match reverse.get(number) {
            Some(owner) if owner == key => {}
            other => {
                return Err(format!(
                    "{} maps to range {} but the range is owned by {:?}",
                    key, number, other
                ))
            }
        }
    }
    for (number, owner) in &reverse {
        if forward.get(owner) != Some(number) {
            return Err(format!("range {} claims owner {} which maps elsewhere", number, owner));
        }
        if *number >= config.max_ranges {
            return Err(format!(
                "range {} exceeds maxranges {}",
                number, config.max_ranges
            ));
        }
    }

    let expected_hwm = reverse.keys().next_back().map_or(0, |max| max + 1);
    if hwm != expected_hwm {
        return Err(format!("HWM is {} but should be {}", hwm, expected_hwm));
    }

    Ok(DbSummary {
        hwm,
        config,
        ranges: reverse,
    })
}
