use super::session::SessionState;

/// Views of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Register,
    Chat,
    Predict,
}

impl Route {
    /// Whether the view requires an authenticated session
    pub fn is_protected(&self) -> bool {
        matches!(self, Route::Chat | Route::Predict)
    }

    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/",
            Route::Register => "/register",
            Route::Chat => "/chat",
            Route::Predict => "/predict",
        }
    }
}

/// Decision for a navigation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allow,
    /// Send the user to this route instead
    Redirect(Route),
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allow)
    }
}

/// Admission to protected views: allowed only for an authenticated session.
///
/// Pure function of the state it is given. Evaluate it on every navigation
/// and after every state change; never cache the result.
pub fn can_enter(state: &SessionState) -> Admission {
    if state.is_authenticated() {
        Admission::Allow
    } else {
        Admission::Redirect(Route::Login)
    }
}

/// Admission to `route`: public routes always allow, protected ones defer
/// to [`can_enter`].
pub fn check(route: Route, state: &SessionState) -> Admission {
    if route.is_protected() {
        can_enter(state)
    } else {
        Admission::Allow
    }
}
