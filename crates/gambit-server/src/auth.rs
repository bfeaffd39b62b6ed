//! The auth collaborator seam.
//!
//! The coordination layer never inspects tokens itself; it hands the opaque
//! token from the connection parameters to an [`Authenticator`] and gets an
//! identity back (or refuses the connection). The default implementation
//! understands self-describing tokens, which is all a deployment without an
//! account system needs; a real identity provider plugs in behind the same
//! trait.

use async_trait::async_trait;
use thiserror::Error;

use gambit_core::{UserId, UserIdentity};

/// Authentication failures. The connection is refused before upgrade.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No token was supplied.
    #[error("missing auth token")]
    MissingToken,
    /// The token could not be resolved to a user.
    #[error("invalid auth token")]
    InvalidToken,
}

/// Resolves an opaque connection token into a user identity.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Resolve `token` or refuse the connection.
    async fn resolve_user(&self, token: &str) -> Result<UserIdentity, AuthError>;
}

/// Token-format authenticator.
///
/// Accepted formats:
/// - `guest` - a fresh guest identity with a generated name
/// - `guest:<name>` - a fresh guest identity with the given name
/// - `<uuid>:<name>` - a registered user with a stable id
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenAuthenticator;

#[async_trait]
impl Authenticator for TokenAuthenticator {
    async fn resolve_user(&self, token: &str) -> Result<UserIdentity, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        if token == "guest" {
            let id = UserId::new();
            let name = format!("guest-{}", &id.to_string()[..8]);
            return Ok(UserIdentity {
                id,
                display_name: name,
                is_guest: true,
            });
        }

        if let Some(name) = token.strip_prefix("guest:") {
            if name.is_empty() {
                return Err(AuthError::InvalidToken);
            }
            return Ok(UserIdentity::guest(name));
        }

        let (id_part, name) = token.split_once(':').ok_or(AuthError::InvalidToken)?;
        if name.is_empty() {
            return Err(AuthError::InvalidToken);
        }
        let id: UserId = id_part.parse().map_err(|_| AuthError::InvalidToken)?;
        Ok(UserIdentity::new(id, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_anonymous_guest() {
        let auth = TokenAuthenticator;
        let user = auth.resolve_user("guest").await.unwrap();
        assert!(user.is_guest);
        assert!(user.display_name.starts_with("guest-"));
    }

    #[tokio::test]
    async fn test_named_guest() {
        let auth = TokenAuthenticator;
        let user = auth.resolve_user("guest:magnus").await.unwrap();
        assert!(user.is_guest);
        assert_eq!(user.display_name, "magnus");
    }

    #[tokio::test]
    async fn test_registered_user() {
        let auth = TokenAuthenticator;
        let id = UserId::new();
        let user = auth
            .resolve_user(&format!("{id}:hikaru"))
            .await
            .unwrap();
        assert!(!user.is_guest);
        assert_eq!(user.id, id);
        assert_eq!(user.display_name, "hikaru");
    }

    #[tokio::test]
    async fn test_rejects_bad_tokens() {
        let auth = TokenAuthenticator;
        assert!(matches!(
            auth.resolve_user("").await,
            Err(AuthError::MissingToken)
        ));
        assert!(matches!(
            auth.resolve_user("no-separator").await,
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            auth.resolve_user("not-a-uuid:name").await,
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            auth.resolve_user("guest:").await,
            Err(AuthError::InvalidToken)
        ));
    }
}
