//! Authenticated principal shared by API and direct endpoints.

use serde::{Deserialize, Serialize};

use crate::constants::ADMIN_GROUP;

/// A caller resolved by an authentication backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AuthUser {
    pub user_id: String,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub account_groups: Vec<String>,
}

impl AuthUser {
    pub fn new(user_id: impl Into<String>, account_groups: Vec<String>) -> Self {
        Self {
            user_id: user_id.into(),
            device_id: None,
            account_groups,
        }
    }

    pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// A resolved principal is always authenticated.
    pub fn is_authenticated(&self) -> bool {
        true
    }

    pub fn identification(&self) -> &str {
        &self.user_id
    }

    pub fn device_identification(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    pub fn groups(&self) -> &[String] {
        &self.account_groups
    }

    pub fn has_group(&self, group: &str) -> bool {
        self.account_groups.iter().any(|g| g == group)
    }

    /// Check if user belongs to the admin group.
    pub fn is_admin(&self) -> bool {
        self.has_group(ADMIN_GROUP)
    }

    /// Add a group unless already present.
    pub fn grant(&mut self, group: &str) {
        if !self.has_group(group) {
            self.account_groups.push(group.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::USER_GROUP;

    #[test]
    fn test_is_admin() {
        let user = AuthUser::new("u1", vec![USER_GROUP.into()]);
        assert!(!user.is_admin());

        let admin = AuthUser::new("u2", vec![USER_GROUP.into(), ADMIN_GROUP.into()]);
        assert!(admin.is_admin());
    }

    #[test]
    fn test_grant_is_idempotent() {
        let mut user = AuthUser::new("u1", vec![]);
        user.grant(USER_GROUP);
        user.grant(USER_GROUP);
        assert_eq!(user.groups(), &[USER_GROUP.to_string()]);
    }
}
