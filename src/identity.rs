//! Who is making this request
//!
//! Both lookups here are best-effort: backend errors are logged and turned
//! into an empty or partial answer instead of being returned. Callers that
//! need strict behaviour use [`crate::auth::Auth::get_session`] and
//! [`crate::queries::ProfileQueries::get`] directly.

use async_trait::async_trait;
use log::error;
use serde::Serialize;

use crate::auth::{Auth, AuthError, Session, User};
use crate::models::UserProfile;
use crate::queries::ProfileQueries;

/// Anything that can resolve the current session
#[async_trait]
pub trait SessionSource: Send + Sync {
    async fn session(&self) -> Result<Option<Session>, AuthError>;
}

#[async_trait]
impl SessionSource for Auth {
    async fn session(&self) -> Result<Option<Session>, AuthError> {
        self.get_session().await
    }
}

/// The session user with their profile merged in, when it could be loaded
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentUser {
    #[serde(flatten)]
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<UserProfile>,
}

pub struct Identity<'a> {
    sessions: &'a dyn SessionSource,
    profiles: ProfileQueries<'a>,
}

impl<'a> Identity<'a> {
    pub fn new(sessions: &'a dyn SessionSource, profiles: ProfileQueries<'a>) -> Self {
        Self { sessions, profiles }
    }

    /// The current session, or `None` when there is none or it could not
    /// be resolved
    pub async fn check_session(&self) -> Option<Session> {
        match self.sessions.session().await {
            Ok(session) => session,
            Err(e) => {
                error!("session check failed: {}", e);
                None
            }
        }
    }

    /// The session user enriched with their profile.
    ///
    /// Without a session this is `None`. When the profile cannot be loaded
    /// the bare user is returned.
    pub async fn get_current_user(&self) -> Option<CurrentUser> {
        let session = self.check_session().await?;
        let user = session.user;

        match self.profiles.get(&user.id).await {
            Ok(profile) => Some(CurrentUser {
                user,
                profile: Some(profile),
            }),
            Err(e) => {
                error!("loading profile for {} failed: {}", user.id, e);
                Some(CurrentUser {
                    user,
                    profile: None,
                })
            }
        }
    }
}
