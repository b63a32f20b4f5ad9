use chrono::Duration;
use tracing::{error, info, instrument};
use url::Url;

use super::{Service, validate};
use crate::error::AppError;
use crate::extractors::auth::AuthUser;
use crate::mailer::{magic_link, magic_link_mail};
use crate::models::auth::{AuthOutput, SendMagicLinkRequest, VerifyMagicLinkRequest};
use crate::models::user::{User, check_email, check_username, normalize_email};
use crate::utils::now;

/// Whether `raw` is an absolute URL on the service's own host (or one of its
/// subdomains), or on one of the `allowed` origins.
pub fn check_redirect_uri(origin: &str, allowed: &[String], raw: &str) -> bool {
    let Ok(target) = Url::parse(raw) else {
        return false;
    };
    if !matches!(target.scheme(), "http" | "https") {
        return false;
    }
    let Some(host) = target.host_str() else {
        return false;
    };

    if let Some(own) = Url::parse(origin).ok().and_then(|o| o.host_str().map(str::to_owned)) {
        if host == own || host.ends_with(&format!(".{own}")) {
            return true;
        }
    }

    let target_origin = target.origin().ascii_serialization();
    allowed.iter().any(|a| {
        Url::parse(a)
            .map(|u| u.origin().ascii_serialization() == target_origin)
            .unwrap_or(false)
    })
}

impl Service {
    /// Email a single-use login link. With `update_email`, the link confirms
    /// a new address for the signed-in user instead.
    #[instrument(skip(self, auth, req), fields(update_email = req.update_email))]
    pub async fn send_magic_link(
        &self,
        auth: Option<&AuthUser>,
        req: SendMagicLinkRequest,
    ) -> Result<(), AppError> {
        let email = normalize_email(&req.email);
        let redirect_uri = req.redirect_uri.trim().to_string();
        validate(|v| {
            check_email(v, &email);
            v.check(
                check_redirect_uri(
                    &self.config.server.origin,
                    &self.config.auth.allowed_redirect_origins,
                    &redirect_uri,
                ),
                "redirect_uri",
                "redirect uri not allowed",
            );
        })?;

        let user_id = if req.update_email {
            Some(auth.ok_or(AppError::Unauthenticated)?.user_id.as_str())
        } else {
            None
        };

        let code = self.store.create_code(&email, user_id).await?;
        let link = magic_link(&self.config.server.origin, &email, &code, &redirect_uri)
            .map_err(|e| AppError::Internal(e.to_string()))?;

        if let Err(e) = self
            .sender
            .send(magic_link_mail(&email, &link, req.update_email))
            .await
        {
            error!(error = %e, "Failed to send magic link");
            let store = self.store.clone();
            self.background.spawn("delete_unsent_code", async move {
                store.delete_code(&email, &code).await
            });
            return Err(AppError::Internal(e.to_string()));
        }

        info!("Magic link sent");
        Ok(())
    }

    /// Consume a verification code and open a session.
    #[instrument(skip(self, req))]
    pub async fn verify_magic_link(&self, req: VerifyMagicLinkRequest) -> Result<AuthOutput, AppError> {
        let email = normalize_email(&req.email);
        let code = req.code.trim().to_string();
        let username = req
            .username
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_owned);
        validate(|v| {
            check_email(v, &email);
            v.check(!code.is_empty(), "code", "code cannot be empty");
            if let Some(username) = &username {
                check_username(v, username);
            }
        })?;

        let ttl = Duration::minutes(self.config.auth.code_ttl_minutes);
        let user = self
            .store
            .use_code(&email, &code, ttl, username.as_deref())
            .await?;
        self.session_for(user)
    }

    /// Log in as an existing user without an email round-trip.
    #[instrument(skip(self, email))]
    pub async fn dev_login(&self, email: &str) -> Result<AuthOutput, AppError> {
        if self.config.auth.disable_dev_login {
            return Err(AppError::not_found("dev login disabled"));
        }
        let email = normalize_email(email);
        validate(|v| check_email(v, &email))?;
        let user = self.store.user_by_email(&email).await?;
        self.session_for(user)
    }

    /// Resolve a bearer token to its user.
    pub fn authenticate(&self, token: &str) -> Result<AuthUser, AppError> {
        let user_id = self.tokens.verify(token)?;
        Ok(AuthUser { user_id })
    }

    fn session_for(&self, user: crate::entity::user::Model) -> Result<AuthOutput, AppError> {
        let token = self.tokens.sign(&user.id)?;
        let id = user.id.clone();
        Ok(AuthOutput {
            user: self.with_prefixes(User::from_model(user, Some(&id), false)),
            token,
            expires_at: now() + self.tokens.ttl(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "https://nakama.social";

    #[test]
    fn redirect_on_own_host_or_subdomain() {
        assert!(check_redirect_uri(ORIGIN, &[], "https://nakama.social/feed"));
        assert!(check_redirect_uri(ORIGIN, &[], "https://app.nakama.social/"));
        assert!(!check_redirect_uri(ORIGIN, &[], "https://evilnakama.social/"));
        assert!(!check_redirect_uri(ORIGIN, &[], "/relative/path"));
        assert!(!check_redirect_uri(ORIGIN, &[], "javascript:alert(1)"));
    }

    #[test]
    fn redirect_on_allowed_origin() {
        let allowed = vec!["http://localhost:5173".to_string()];
        assert!(check_redirect_uri(ORIGIN, &allowed, "http://localhost:5173/callback"));
        assert!(!check_redirect_uri(ORIGIN, &allowed, "http://localhost:3000/callback"));
    }
}
