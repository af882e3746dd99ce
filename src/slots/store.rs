use std::collections::BTreeSet;

use crate::error::{FormError, MissingParts};

use super::asset::Asset;
use super::positions::{self, PositionChange};
use super::{Configuration, Slot, DEFAULT_SLOTS, MAX_SLOTS, MIN_SLOTS};

/// The whole form: slots plus delivery configuration.
///
/// Held behind an `Arc` by the build manager and replaced wholesale on each
/// edit, so a submission can keep reading the snapshot it started with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormState {
    slots: Vec<Slot>,
    config: Configuration,
    layout_epoch: u64,
}

impl Default for FormState {
    fn default() -> Self {
        Self::new(DEFAULT_SLOTS)
    }
}

impl FormState {
    pub fn new(count: usize) -> Self {
        Self::with_config(count, Configuration::default())
    }

    pub fn with_config(count: usize, config: Configuration) -> Self {
        Self {
            slots: seeded_slots(clamp_count(count)),
            config,
            layout_epoch: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Result<&Slot, FormError> {
        self.slots
            .get(index)
            .ok_or_else(|| FormError::out_of_range(index, self.slots.len()))
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Configuration {
        &mut self.config
    }

    /// Bumped by every `resize`; lets in-flight builds notice the form was rebuilt.
    pub fn layout_epoch(&self) -> u64 {
        self.layout_epoch
    }

    // ── Slot store ──────────────────────────────────────────────────────

    /// Replace the collection with `count` empty slots (clamped to 5..=50).
    /// Positions are seeded 1..=N. Returns the effective count.
    pub fn resize(&mut self, requested: usize) -> usize {
        let count = clamp_count(requested);
        if count != requested {
            log::debug!("resize: {} clamped to {}", requested, count);
        }
        self.slots = seeded_slots(count);
        self.layout_epoch += 1;
        log::info!("Form resized to {} slots", count);
        count
    }

    /// Attach `asset` to slot `index`, replacing any previous one, and reset
    /// the label to the asset's default label.
    pub fn set_asset(&mut self, index: usize, asset: Asset) -> Result<(), FormError> {
        let len = self.slots.len();
        let slot = self
            .slots
            .get_mut(index)
            .ok_or_else(|| FormError::out_of_range(index, len))?;
        slot.label = asset.default_label();
        log::debug!(
            "slot {}: attached {} ({} bytes)",
            index,
            asset.file_name,
            asset.len()
        );
        slot.asset = Some(asset);
        Ok(())
    }

    pub fn clear_asset(&mut self, index: usize) -> Result<(), FormError> {
        let len = self.slots.len();
        let slot = self
            .slots
            .get_mut(index)
            .ok_or_else(|| FormError::out_of_range(index, len))?;
        slot.asset = None;
        Ok(())
    }

    pub fn set_label(&mut self, index: usize, text: impl Into<String>) -> Result<(), FormError> {
        let len = self.slots.len();
        let slot = self
            .slots
            .get_mut(index)
            .ok_or_else(|| FormError::out_of_range(index, len))?;
        slot.label = text.into();
        Ok(())
    }

    /// Fill slots from 0 onward with `assets`. Assets past the last slot are
    /// ignored. Returns how many were attached.
    pub fn batch_assign(&mut self, assets: impl IntoIterator<Item = Asset>) -> usize {
        self.batch_assign_from(0, assets)
    }

    pub fn batch_assign_from(
        &mut self,
        start: usize,
        assets: impl IntoIterator<Item = Asset>,
    ) -> usize {
        let mut assigned = 0;
        let mut dropped = 0;
        for (index, asset) in (start..).zip(assets) {
            if index >= self.slots.len() {
                dropped += 1;
                continue;
            }
            if self.set_asset(index, asset).is_ok() {
                assigned += 1;
            }
        }
        if dropped > 0 {
            log::info!("batch_assign: ignored {} assets beyond slot {}", dropped, self.len());
        }
        assigned
    }

    // ── Index assigner ──────────────────────────────────────────────────

    pub fn set_position(
        &mut self,
        index: usize,
        value: Option<u32>,
    ) -> Result<PositionChange, FormError> {
        positions::set_position(&mut self.slots, index, value)
    }

    pub fn swap_positions(&mut self, a: usize, b: usize) -> Result<(), FormError> {
        positions::swap_positions(&mut self.slots, a, b)
    }

    pub fn available_positions(&self, index: usize) -> Result<BTreeSet<u32>, FormError> {
        positions::available_positions(&self.slots, index)
    }

    pub fn conflicts(&self) -> BTreeSet<usize> {
        positions::conflicts(&self.slots)
    }

    pub fn missing(&self) -> MissingParts {
        positions::missing(&self.slots)
    }

    pub fn is_complete(&self) -> bool {
        positions::is_complete(&self.slots)
    }
}

fn clamp_count(count: usize) -> usize {
    count.clamp(MIN_SLOTS, MAX_SLOTS)
}

fn seeded_slots(count: usize) -> Vec<Slot> {
    (0..count).map(Slot::seeded).collect()
}
