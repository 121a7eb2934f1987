//! Single-use, time-limited sign-in links.
//!
//! The raw token only ever exists in the issued URL. Storage keeps its SHA-256
//! hash, one row per account, so issuing a new link overwrites the previous
//! one. Redemption removes the row in the same statement that reads it.

use chrono::{DateTime, Duration, Utc};
use kinnect_storage::{AccountId, Store, StoreError, UpsertMagicLinkParams};
use rand::Rng;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use url::Url;

use crate::error::{EngineError, NotFoundAs};

/// How long an issued link stays valid.
pub const MAGIC_LINK_TTL_MINUTES: i64 = 15;

/// Verification endpoint the link points at.
pub const VERIFY_PATH: &str = "/auth/verify";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuedLink {
    pub url: Url,
    pub expires_at: DateTime<Utc>,
}

/// Result of redeeming a token. Unknown, expired and already-used tokens are
/// indistinguishable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Redemption {
    Valid {
        account_id: AccountId,
        redirect_path: Option<String>,
    },
    Invalid,
}

/// 32 random bytes, hex encoded.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Keep a redirect only if it stays on this site.
pub fn sanitize_redirect(path: &str) -> Option<String> {
    let path = path.trim();
    if !path.starts_with('/') || path.starts_with("//") || path.contains('\\') {
        return None;
    }
    let base = Url::parse("http://kinnect.invalid/").ok()?;
    let joined = base.join(path).ok()?;
    (joined.origin() == base.origin()).then(|| path.to_string())
}

/// Build an absolute URL for a site path, keeping any path prefix the base
/// URL carries.
pub fn site_url(base: &Url, path: &str) -> Result<Url, EngineError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let prefixed = format!("{}/", base.path());
        base.set_path(&prefixed);
    }
    base.join(path.trim_start_matches('/'))
        .map_err(|e| EngineError::InvalidInput(format!("bad site path {path}: {e}")))
}

/// Issue a link for `account_id`, replacing any link issued before.
pub async fn issue(
    store: &dyn Store,
    base: &Url,
    account_id: &AccountId,
    redirect: Option<&str>,
) -> Result<IssuedLink, EngineError> {
    store.get_account(account_id).await.not_found_as("account")?;

    let redirect_path = redirect.and_then(sanitize_redirect);
    if redirect.is_some() && redirect_path.is_none() {
        debug!(account_id = %account_id, "Dropped off-site redirect");
    }

    let token = generate_token();
    let expires_at = Utc::now() + Duration::minutes(MAGIC_LINK_TTL_MINUTES);

    store
        .upsert_magic_link(&UpsertMagicLinkParams {
            account_id: account_id.clone(),
            token_hash: hash_token(&token),
            redirect_path: redirect_path.clone(),
            expires_at,
        })
        .await?;

    let mut url = site_url(base, VERIFY_PATH)?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("token", &token);
        if let Some(path) = &redirect_path {
            query.append_pair("redirect", path);
        }
    }

    info!(account_id = %account_id, %expires_at, "Magic link issued");
    Ok(IssuedLink { url, expires_at })
}

/// Consume a token.
pub async fn redeem(store: &dyn Store, token: &str) -> Result<Redemption, EngineError> {
    let token = token.trim();
    if token.is_empty() {
        return Ok(Redemption::Invalid);
    }

    let stored = match store.take_magic_link(&hash_token(token)).await {
        Ok(stored) => stored,
        Err(StoreError::NotFound) => {
            debug!("Magic link redemption failed");
            return Ok(Redemption::Invalid);
        }
        Err(e) => return Err(e.into()),
    };

    if stored.expires_at <= Utc::now() {
        debug!(account_id = %stored.account_id, "Magic link redemption failed");
        return Ok(Redemption::Invalid);
    }

    info!(account_id = %stored.account_id, "Magic link redeemed");
    Ok(Redemption::Valid {
        account_id: stored.account_id,
        redirect_path: stored.redirect_path,
    })
}
