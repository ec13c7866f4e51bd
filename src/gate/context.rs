//! Scoped session context published by the session gate.
//!
//! Views, the board and the galleries receive a [`SessionContext`] value
//! instead of reading a shared admin flag, so each render works from one
//! consistent snapshot.

use serde::Serialize;
use utoipa::ToSchema;

use super::session::Session;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    session: Option<Session>,
    is_admin: bool,
    warning: Option<String>,
}

impl SessionContext {
    #[must_use]
    pub fn signed_out() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn signed_in(session: Session, is_admin: bool) -> Self {
        Self {
            session: Some(session),
            is_admin,
            warning: None,
        }
    }

    /// Attach a non-fatal problem met while resolving the context.
    #[must_use]
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.user_id.as_str())
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.session.is_some()
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.session.is_some() && self.is_admin
    }

    #[must_use]
    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }

    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            manage_gallery: self.is_admin(),
            write_post: self.is_signed_in(),
            delete_any_post: self.is_admin(),
        }
    }

    /// Whether the delete control is shown on a board post by `author_id`.
    #[must_use]
    pub fn can_delete_post(&self, author_id: &str) -> bool {
        self.is_admin() || self.user_id() == Some(author_id)
    }

    #[must_use]
    pub fn view(&self) -> ViewState {
        let email = self.session.as_ref().map(|s| s.email.clone());
        ViewState {
            signed_in: self.is_signed_in(),
            greeting: email.as_ref().map(|email| format!("Welcome, {email}")),
            email,
            is_admin: self.is_admin(),
            show_login: !self.is_signed_in(),
            show_logout: self.is_signed_in(),
            capabilities: self.capabilities(),
            warning: self.warning.clone(),
        }
    }
}

/// What the presentation layer may offer for the current context.
#[derive(ToSchema, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// Add, edit and delete artist and VTuber entries.
    pub manage_gallery: bool,
    pub write_post: bool,
    pub delete_any_post: bool,
}

#[derive(ToSchema, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewState {
    pub signed_in: bool,
    pub email: Option<String>,
    pub greeting: Option<String>,
    pub is_admin: bool,
    pub show_login: bool,
    pub show_logout: bool,
    pub capabilities: Capabilities,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(user_id: &str) -> Session {
        Session {
            user_id: user_id.to_string(),
            email: format!("{user_id}@example.com"),
            email_verified: true,
        }
    }

    #[test]
    fn signed_out_view_hides_admin_controls() {
        let view = SessionContext::signed_out().view();
        assert!(!view.signed_in);
        assert!(view.show_login);
        assert!(!view.show_logout);
        assert!(!view.is_admin);
        assert!(!view.capabilities.manage_gallery);
        assert!(!view.capabilities.write_post);
        assert_eq!(view.greeting, None);
    }

    #[test]
    fn member_view() {
        let view = SessionContext::signed_in(session("u1"), false).view();
        assert!(view.signed_in);
        assert!(view.show_logout);
        assert_eq!(view.greeting.as_deref(), Some("Welcome, u1@example.com"));
        assert!(view.capabilities.write_post);
        assert!(!view.capabilities.manage_gallery);
    }

    #[test]
    fn post_deletion_allowed_for_author_or_admin() {
        let member = SessionContext::signed_in(session("u1"), false);
        assert!(member.can_delete_post("u1"));
        assert!(!member.can_delete_post("u2"));

        let admin = SessionContext::signed_in(session("u3"), true);
        assert!(admin.can_delete_post("u2"));

        assert!(!SessionContext::signed_out().can_delete_post("u1"));
    }

    #[test]
    fn warning_does_not_change_visibility() {
        let context = SessionContext::signed_in(session("u1"), false).with_warning("store down");
        let view = context.view();
        assert!(view.signed_in);
        assert!(!view.is_admin);
        assert_eq!(view.warning.as_deref(), Some("store down"));
    }
}
