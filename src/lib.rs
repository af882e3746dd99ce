#[macro_use]
pub mod logging;

pub mod config;
pub mod error;
pub mod slots;
pub mod storage;
pub mod submit;

pub use error::{BuildError, FormError, MissingParts, StorageError, SubmitFailure};
pub use slots::asset::Asset;
pub use slots::positions::PositionChange;
pub use slots::store::FormState;
pub use slots::{Configuration, DeliveryMode, Slot, MAX_SLOTS, MIN_SLOTS};
pub use submit::api_client::{ApiClient, Transport};
pub use submit::encoder::encode;
pub use submit::manager::BuildManager;
pub use submit::response::classify;
pub use submit::types::{
    Artifact, RawResponse, SubmissionOutcome, SubmissionPayload, SubmissionState,
};
