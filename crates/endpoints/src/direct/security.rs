//! Caller identity for direct endpoints.

use domain::{AuthUser, ADMIN_GROUP, USER_GROUP};

use common::CallContext;

/// Direct endpoints are invoked by trusted infrastructure; the caller is the
/// configured admin identity.
#[derive(Debug, Clone)]
pub struct PassedAuthenticationBackend {
    admin_token: String,
}

impl PassedAuthenticationBackend {
    pub fn new(admin_token: impl Into<String>) -> Self {
        Self {
            admin_token: admin_token.into(),
        }
    }

    /// Store an admin user in the current call context and return it.
    pub fn force_admin(&self) -> AuthUser {
        let user = AuthUser::new(
            self.admin_token.clone(),
            vec![USER_GROUP.to_string(), ADMIN_GROUP.to_string()],
        )
        .with_device(self.admin_token.clone());
        CallContext::set_authenticated_user(Some(user.clone()));
        user
    }
}
