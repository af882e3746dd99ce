use url::Url;

use crate::error::FormError;
use crate::slots::positions;
use crate::slots::{Configuration, Slot};

use super::types::{ImagePart, SubmissionPayload};

/// Turn slots + configuration into the multipart payload. Pure; the slots are
/// only read.
pub fn encode(slots: &[Slot], config: &Configuration) -> Result<SubmissionPayload, FormError> {
    let missing = positions::missing(slots);
    if !missing.is_empty() {
        return Err(FormError::IncompleteForm(missing));
    }

    let target_url = config.target_url.trim();
    if !target_url.is_empty() {
        Url::parse(target_url)
            .map_err(|e| FormError::InvalidTargetUrl(format!("{}: {}", target_url, e)))?;
    }

    let mut images = Vec::with_capacity(slots.len());
    let mut filenames = Vec::with_capacity(slots.len());
    let mut indices = Vec::with_capacity(slots.len());

    // Part names follow slot order, whatever the slots' own ordinals say.
    for (i, slot) in slots.iter().enumerate() {
        // `missing` was empty, so every slot has both.
        let (Some(asset), Some(position)) = (slot.asset.as_ref(), slot.position) else {
            return Err(FormError::IncompleteForm(positions::missing(slots)));
        };
        images.push(ImagePart {
            field: format!("image{}", i),
            file_name: asset.file_name.clone(),
            content_type: asset.content_type.clone(),
            bytes: asset.bytes.clone(),
        });
        filenames.push(slot.label.clone());
        indices.push(position.to_string());
    }

    Ok(SubmissionPayload {
        images,
        filenames,
        indices,
        target_url: target_url.to_string(),
        delivery_mode: config.delivery_mode.as_str().to_string(),
        title: config.title.clone(),
        fail_message: config.failure_message.clone(),
    })
}
