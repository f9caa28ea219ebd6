use nursegate_auth::{CurrentUser, SessionId};

/// Where the request carried its session token.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TokenSource {
    Bearer,
    Cookie,
}

/// Session token presented by the client (unverified).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentedToken {
    pub session_id: SessionId,
    pub source: TokenSource,
}

/// Per-request session context, inserted by the session middleware on every
/// request (authenticated or not).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    token: Option<PresentedToken>,
    user: Option<CurrentUser>,
}

impl SessionContext {
    pub fn new(token: Option<PresentedToken>, user: Option<CurrentUser>) -> Self {
        Self { token, user }
    }

    pub fn token(&self) -> Option<&PresentedToken> {
        self.token.as_ref()
    }

    /// The resolved user, if the token named a live session.
    pub fn current_user(&self) -> Option<&CurrentUser> {
        self.user.as_ref()
    }

    pub fn into_current_user(self) -> Option<CurrentUser> {
        self.user
    }
}
