//! Timestamps carried by every stored entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Creation and last-modification timestamps.
///
/// Stores fill both fields on insert and refresh `updated_at` on every update,
/// so DTOs embed this struct with `#[serde(flatten)]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct BaseEntity {
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl BaseEntity {
    /// Both timestamps set to `now`.
    pub fn stamped(now: DateTime<Utc>) -> Self {
        Self {
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    /// Refresh the modification timestamp.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamped_sets_both() {
        let now = Utc::now();
        let entity = BaseEntity::stamped(now);
        assert_eq!(entity.created_at, Some(now));
        assert_eq!(entity.updated_at, Some(now));
    }

    #[test]
    fn test_missing_fields_deserialize_as_none() {
        let entity: BaseEntity = serde_json::from_str("{}").unwrap();
        assert_eq!(entity, BaseEntity::default());
    }
}
