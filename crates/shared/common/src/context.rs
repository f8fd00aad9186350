//! Per-call context.
//!
//! Holds the correlation id, the flow correlation id and the authenticated
//! user for the duration of one HTTP request or one queue event. Values live
//! in a tokio task-local, so they are visible to everything awaited inside
//! [`CallContext::scope`] and nowhere else.

use std::cell::RefCell;
use std::future::Future;

use domain::AuthUser;
use uuid::Uuid;

#[derive(Debug, Default, Clone)]
struct ContextState {
    correlation_id: Option<String>,
    flow_correlation_id: Option<String>,
    authenticated_user: Option<AuthUser>,
}

tokio::task_local! {
    static CALL_CONTEXT: RefCell<ContextState>;
}

/// Static accessors for the current call context.
pub struct CallContext;

impl CallContext {
    /// Run `fut` inside a fresh, empty context.
    pub async fn scope<F: Future>(fut: F) -> F::Output {
        CALL_CONTEXT
            .scope(RefCell::new(ContextState::default()), fut)
            .await
    }

    /// True when called inside [`CallContext::scope`].
    pub fn is_active() -> bool {
        CALL_CONTEXT.try_with(|_| ()).is_ok()
    }

    pub fn generate_correlation_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Current correlation id, generated and stored on first access.
    pub fn get_correlation_id() -> String {
        Self::get_or_generate(|state| &mut state.correlation_id)
    }

    pub fn set_correlation_id(correlation_id: impl Into<String>) {
        let value = correlation_id.into();
        Self::update(|state| state.correlation_id = Some(value));
    }

    /// Current flow correlation id, generated and stored on first access.
    pub fn get_flow_correlation_id() -> String {
        Self::get_or_generate(|state| &mut state.flow_correlation_id)
    }

    pub fn set_flow_correlation_id(flow_correlation_id: impl Into<String>) {
        let value = flow_correlation_id.into();
        Self::update(|state| state.flow_correlation_id = Some(value));
    }

    pub fn get_authenticated_user() -> Option<AuthUser> {
        CALL_CONTEXT
            .try_with(|cell| cell.borrow().authenticated_user.clone())
            .ok()
            .flatten()
    }

    pub fn set_authenticated_user(user: Option<AuthUser>) {
        Self::update(|state| state.authenticated_user = user);
    }

    fn get_or_generate(field: impl FnOnce(&mut ContextState) -> &mut Option<String>) -> String {
        CALL_CONTEXT
            .try_with(|cell| {
                let mut state = cell.borrow_mut();
                field(&mut state)
                    .get_or_insert_with(Self::generate_correlation_id)
                    .clone()
            })
            .unwrap_or_else(|_| Self::generate_correlation_id())
    }

    fn update(f: impl FnOnce(&mut ContextState)) {
        if CALL_CONTEXT
            .try_with(|cell| f(&mut cell.borrow_mut()))
            .is_err()
        {
            tracing::warn!("call context accessed outside of a scope; value dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_flow_id_is_stable_within_scope() {
        CallContext::scope(async {
            let first = CallContext::get_flow_correlation_id();
            let second = CallContext::get_flow_correlation_id();
            assert_eq!(first, second);
            assert!(Uuid::parse_str(&first).is_ok());
        })
        .await;
    }

    #[tokio::test]
    async fn test_setters_are_scoped() {
        CallContext::scope(async {
            CallContext::set_flow_correlation_id("flow-1");
            CallContext::set_authenticated_user(Some(AuthUser::new("u1", vec![])));
            assert_eq!(CallContext::get_flow_correlation_id(), "flow-1");
            assert_eq!(
                CallContext::get_authenticated_user().map(|u| u.user_id),
                Some("u1".to_string())
            );
        })
        .await;

        CallContext::scope(async {
            assert_ne!(CallContext::get_flow_correlation_id(), "flow-1");
            assert!(CallContext::get_authenticated_user().is_none());
        })
        .await;
    }

    #[test]
    fn test_outside_scope_generates_fresh_ids() {
        assert!(!CallContext::is_active());
        assert_ne!(CallContext::get_correlation_id(), CallContext::get_correlation_id());
        assert!(CallContext::get_authenticated_user().is_none());
    }
}
