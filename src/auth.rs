//! Sign-in state and the guard in front of protected routes.

use crate::error::RemoteError;
use crate::route::Route;
use crate::store::Principal;

/// Remembers where an unauthenticated user was headed. Read once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectSlot(Option<String>);

impl RedirectSlot {
    pub fn store(&mut self, path: impl Into<String>) {
        self.0 = Some(path.into());
    }

    pub fn take(&mut self) -> Option<String> {
        self.0.take()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    Loading,
    Redirect(Route),
    Allow(Route),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    user: Option<Principal>,
    loading: bool,
    redirect: RedirectSlot,
}

impl Default for AuthState {
    fn default() -> Self {
        Self::restoring()
    }
}

impl AuthState {
    /// Session state is unknown until the auth service answers.
    pub fn restoring() -> Self {
        Self {
            user: None,
            loading: true,
            redirect: RedirectSlot::default(),
        }
    }

    pub fn user(&self) -> Option<&Principal> {
        self.user.as_ref()
    }

    pub fn resolve(&mut self, user: Option<Principal>) {
        self.user = user;
        self.loading = false;
    }

    /// Decides what to show for `route`.
    ///
    /// Without a user, a protected route is remembered and the login screen
    /// is shown instead.
    pub fn gate(&mut self, route: &Route) -> Gate {
        if self.loading {
            return Gate::Loading;
        }
        match (&self.user, route) {
            (None, route) if route.is_protected() => {
                self.redirect.store(route.path());
                Gate::Redirect(Route::Login)
            }
            (Some(_), Route::Login) => Gate::Redirect(Route::Home),
            _ => Gate::Allow(route.clone()),
        }
    }

    /// Records the principal and returns where to go next.
    pub fn after_login(&mut self, user: Principal) -> Route {
        self.resolve(Some(user));
        self.redirect
            .take()
            .map(|path| Route::parse(&path))
            .unwrap_or(Route::Home)
    }

    pub fn sign_out(&mut self) {
        self.user = None;
        self.loading = false;
    }
}

/// Email/password form with its own in-flight flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    submitting: bool,
    error: Option<String>,
}

impl LoginForm {
    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn begin_submit(&mut self) -> Option<(String, String)> {
        let email = self.email.trim();
        if self.submitting || email.is_empty() || self.password.is_empty() {
            return None;
        }
        self.submitting = true;
        self.error = None;
        Some((email.to_string(), self.password.clone()))
    }

    pub fn finish(&mut self, result: &Result<Principal, RemoteError>) {
        self.submitting = false;
        match result {
            Ok(_) => {
                self.password.clear();
                self.error = None;
            }
            Err(error) => self.error = Some(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal() -> Principal {
        Principal {
            id: "u1".to_string(),
            email: Some("ada@example.com".to_string()),
            access_token: String::new(),
        }
    }

    #[test]
    fn loading_blocks_every_route() {
        let mut auth = AuthState::restoring();
        assert_eq!(auth.gate(&Route::Home), Gate::Loading);
        assert_eq!(auth.gate(&Route::Login), Gate::Loading);
    }

    #[test]
    fn protected_route_redirects_and_is_replayed_once() {
        let mut auth = AuthState::restoring();
        auth.resolve(None);

        let route = Route::Chat("c1".to_string());
        assert_eq!(auth.gate(&route), Gate::Redirect(Route::Login));
        assert_eq!(auth.redirect.0.as_deref(), Some("/chat/c1"));
        assert_eq!(auth.gate(&Route::Login), Gate::Allow(Route::Login));

        assert_eq!(auth.after_login(principal()), route);
        assert_eq!(auth.redirect.0.as_deref(), None);

        auth.sign_out();
        assert_eq!(auth.after_login(principal()), Route::Home);
    }

    #[test]
    fn signed_in_user_skips_login_screen() {
        let mut auth = AuthState::restoring();
        auth.resolve(Some(principal()));
        assert_eq!(auth.gate(&Route::Login), Gate::Redirect(Route::Home));
        assert_eq!(auth.gate(&Route::Home), Gate::Allow(Route::Home));
    }

    #[test]
    fn login_form_guards_duplicate_submits_and_keeps_error() {
        let mut form = LoginForm {
            email: " ada@example.com ".to_string(),
            password: "secret".to_string(),
            ..LoginForm::default()
        };
        let credentials = form.begin_submit().expect("credentials");
        assert_eq!(credentials.0, "ada@example.com");
        assert_eq!(form.begin_submit(), None);

        form.finish(&Err(RemoteError::Rejected("Invalid login credentials".to_string())));
        assert!(!form.is_submitting());
        assert_eq!(form.error(), Some("Invalid login credentials"));

        form.begin_submit().expect("retry");
        form.finish(&Ok(principal()));
        assert!(form.password.is_empty());
        assert_eq!(form.error(), None);
    }
}
