//! Slot → display position mapping.
//!
//! Positions are unique across slots. Conflicting writes are rejected here
//! rather than left to the UI, so callers that bypass the UI still cannot
//! produce duplicates.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{FormError, MissingParts};

use super::Slot;

/// Result of a `set_position` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionChange {
    Assigned(u32),
    Cleared,
    /// The value belongs to another slot; nothing changed.
    Rejected { held_by: usize },
}

pub fn set_position(
    slots: &mut [Slot],
    index: usize,
    value: Option<u32>,
) -> Result<PositionChange, FormError> {
    let len = slots.len();
    if index >= len {
        return Err(FormError::out_of_range(index, len));
    }

    let Some(value) = value else {
        slots[index].position = None;
        return Ok(PositionChange::Cleared);
    };

    let max = len as u32;
    if value == 0 || value > max {
        return Err(FormError::InvalidPosition { value, max });
    }

    if let Some(holder) = holder_of(slots, value, index) {
        log::warn!(
            "slot {}: position {} already held by slot {}, ignoring",
            index,
            value,
            holder
        );
        return Ok(PositionChange::Rejected { held_by: holder });
    }

    slots[index].position = Some(value);
    Ok(PositionChange::Assigned(value))
}

/// Exchange two slots' positions in one step.
pub fn swap_positions(slots: &mut [Slot], a: usize, b: usize) -> Result<(), FormError> {
    let len = slots.len();
    for index in [a, b] {
        if index >= len {
            return Err(FormError::out_of_range(index, len));
        }
    }
    let pa = slots[a].position;
    slots[a].position = slots[b].position;
    slots[b].position = pa;
    Ok(())
}

/// Values in 1..=N that slot `index` may take. Its own value is always included.
pub fn available_positions(slots: &[Slot], index: usize) -> Result<BTreeSet<u32>, FormError> {
    let len = slots.len();
    if index >= len {
        return Err(FormError::out_of_range(index, len));
    }

    let taken: BTreeSet<u32> = slots
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != index)
        .filter_map(|(_, s)| s.position)
        .collect();

    Ok((1..=len as u32).filter(|v| !taken.contains(v)).collect())
}

/// Slot indices whose position collides with another slot's.
pub fn conflicts(slots: &[Slot]) -> BTreeSet<usize> {
    let mut by_value: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (i, slot) in slots.iter().enumerate() {
        if let Some(value) = slot.position {
            by_value.entry(value).or_default().push(i);
        }
    }

    by_value
        .into_values()
        .filter(|holders| holders.len() > 1)
        .flatten()
        .collect()
}

pub fn missing(slots: &[Slot]) -> MissingParts {
    let max = slots.len() as u32;
    MissingParts {
        missing_assets: slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.asset.is_none())
            .map(|(i, _)| i)
            .collect(),
        missing_positions: slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.position.is_none())
            .map(|(i, _)| i)
            .collect(),
        invalid_positions: slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.position.is_some_and(|v| v == 0 || v > max))
            .map(|(i, _)| i)
            .collect(),
        conflicts: conflicts(slots).into_iter().collect(),
    }
}

/// Every slot has an asset and an in-range position, and no two positions collide.
pub fn is_complete(slots: &[Slot]) -> bool {
    missing(slots).is_empty()
}

fn holder_of(slots: &[Slot], value: u32, except: usize) -> Option<usize> {
    slots
        .iter()
        .enumerate()
        .find(|(i, s)| *i != except && s.position == Some(value))
        .map(|(i, _)| i)
}
