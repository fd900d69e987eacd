use keyportal_core::kv::{KvError, KvHandle};

use crate::models::User;

pub const AUTH_TOKEN_KEY: &str = "api_key_auth_token";
pub const USER_DATA_KEY: &str = "api_key_user_data";

/// Login state persisted in a [`KvHandle`].
///
/// The token is re-read from the store on every [`Session::token`] call; the user record is
/// cached by [`Session::hydrate`] and [`Session::login`].
#[derive(Clone, Debug)]
pub struct Session {
    store: KvHandle,
    user: Option<User>,
}

impl Session {
    pub fn new(store: KvHandle) -> Self {
        Self { store, user: None }
    }

    /// Load persisted state. Partial state (a token without a user or the reverse) is cleared.
    ///
    /// Returns whether a session is active.
    pub async fn hydrate(&mut self) -> Result<bool, KvError> {
        let token = match self.store.get::<String>(AUTH_TOKEN_KEY).await {
            Ok(token) => token.filter(|token| !token.is_empty()),
            Err(KvError::Serialization(err)) => {
                log::warn!("discarding unreadable auth token: {err}");
                None
            }
            Err(err) => return Err(err),
        };

        let user = match self.store.get::<User>(USER_DATA_KEY).await {
            Ok(user) => user,
            Err(KvError::Serialization(err)) => {
                log::warn!("discarding unreadable user record: {err}");
                self.store.delete(USER_DATA_KEY).await?;
                None
            }
            Err(err) => return Err(err),
        };

        match (token, user) {
            (Some(_), Some(user)) => {
                self.user = Some(user);
                Ok(true)
            }
            (None, None) => {
                self.user = None;
                Ok(false)
            }
            _ => {
                log::warn!("clearing partial session state");
                self.logout().await?;
                Ok(false)
            }
        }
    }

    pub async fn login(&mut self, token: &str, user: User) -> Result<(), KvError> {
        self.store.put(AUTH_TOKEN_KEY, token).await?;
        self.store.put(USER_DATA_KEY, &user).await?;
        self.user = Some(user);
        Ok(())
    }

    pub async fn logout(&mut self) -> Result<(), KvError> {
        self.store.delete(AUTH_TOKEN_KEY).await?;
        self.store.delete(USER_DATA_KEY).await?;
        self.user = None;
        Ok(())
    }

    /// The persisted bearer token, read fresh from the store.
    pub async fn token(&self) -> Result<Option<String>, KvError> {
        match self.store.get::<String>(AUTH_TOKEN_KEY).await {
            Ok(token) => Ok(token.filter(|token| !token.is_empty())),
            Err(KvError::Serialization(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}
