//! Content registry: characters, platforms, media and the scheduled-post workflow.
//!
//! Each submodule owns the SQL for one table family. Functions take a borrowed
//! connection so handlers decide how long a pooled connection is held.

pub mod characters;
pub mod domain;
pub mod media;
pub mod platforms;
pub mod posts;

use serde::{Deserialize, Deserializer};

pub use domain::{CharacterRole, DeliveryOutcome, FileType, PostState, PostStatus, TransitionError};

/// Deserialize a field that distinguishes "absent" from "explicitly null".
///
/// Use with `#[serde(default, deserialize_with = "nullable")]` on an
/// `Option<Option<T>>`: absent → `None`, `null` → `Some(None)`.
pub fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Trim optional free text, mapping blank strings to `None`.
pub fn clean_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
