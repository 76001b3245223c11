use chrono::{Duration, Utc};
use std::time::Duration as StdDuration;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::{
    auth::ClientInfo,
    error::AppError,
    models::{NewSession, TokenPair, User},
    repository::RepositoryState,
    tokens::{TokenService, hash_token},
};

fn token_pair(
    tokens: &TokenService,
    user: &User,
    session_id: Uuid,
    refresh_token: String,
) -> Result<TokenPair, AppError> {
    Ok(TokenPair {
        access_token: tokens.issue_access(user.id, session_id, user.role)?,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: tokens.access_ttl_secs(),
    })
}

/// start_session
///
/// Opens a new session for `user` and returns its first token pair. The
/// repository evicts the user's oldest active sessions beyond `max_sessions`.
pub async fn start_session(
    repo: &RepositoryState,
    tokens: &TokenService,
    max_sessions: u32,
    user: &User,
    client: &ClientInfo,
) -> Result<TokenPair, AppError> {
    let session_id = Uuid::new_v4();
    let refresh = tokens.issue_refresh(user.id, session_id)?;

    repo.create_session(
        NewSession {
            id: session_id,
            user_id: user.id,
            refresh_token_hash: refresh.hash,
            user_agent: client.user_agent.clone(),
            ip_address: client.ip_address.clone(),
            expires_at: refresh.expires_at,
        },
        max_sessions,
    )
    .await?;

    tracing::info!(user_id = %user.id, session_id = %session_id, "session started");
    token_pair(tokens, user, session_id, refresh.token)
}

/// refresh_session
///
/// Rotates a refresh token. Every refresh token is single-use: presenting one
/// that was already rotated means it leaked, so the whole session is revoked.
pub async fn refresh_session(
    repo: &RepositoryState,
    tokens: &TokenService,
    refresh_token: &str,
) -> Result<(User, TokenPair), AppError> {
    let claims = tokens.decode_refresh(refresh_token)?;
    let invalid = || AppError::unauthorized("invalid refresh token");

    let session = repo
        .get_session(claims.sid)
        .await?
        .filter(|s| s.user_id == claims.sub)
        .ok_or_else(invalid)?;

    if !session.is_active(Utc::now()) {
        return Err(AppError::unauthorized("session has been revoked or expired"));
    }

    let presented_hash = hash_token(refresh_token);
    if session.refresh_token_hash != presented_hash {
        repo.revoke_session(session.id, session.user_id).await?;
        tracing::warn!(
            user_id = %session.user_id,
            session_id = %session.id,
            "refresh token reuse detected, session revoked"
        );
        return Err(AppError::unauthorized("refresh token reuse detected"));
    }

    let Some(user) = repo.get_user(session.user_id).await?.filter(|u| !u.is_deleted) else {
        repo.revoke_session(session.id, session.user_id).await?;
        return Err(invalid());
    };

    let next = tokens.issue_refresh(user.id, session.id)?;
    let rotated = repo
        .rotate_session(session.id, &presented_hash, next.hash, next.expires_at)
        .await?;
    if !rotated {
        // A concurrent refresh with the same token won the swap.
        repo.revoke_session(session.id, session.user_id).await?;
        tracing::warn!(session_id = %session.id, "concurrent refresh detected, session revoked");
        return Err(AppError::unauthorized("refresh token reuse detected"));
    }

    tracing::debug!(user_id = %user.id, session_id = %session.id, "session rotated");
    let pair = token_pair(tokens, &user, session.id, next.token)?;
    Ok((user, pair))
}

/// Deletes sessions that expired or were revoked more than `retention` ago.
pub async fn purge_stale_sessions(repo: &RepositoryState, retention: Duration) -> Result<u64, AppError> {
    let purged = repo.purge_sessions(Utc::now() - retention).await?;
    if purged > 0 {
        tracing::info!(purged, "purged stale sessions");
    }
    Ok(purged)
}

/// spawn_session_reaper
///
/// Background task that periodically purges stale sessions. Failures are logged
/// and retried on the next tick.
pub fn spawn_session_reaper(
    repo: RepositoryState,
    interval: StdDuration,
    retention: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = purge_stale_sessions(&repo, retention).await {
                tracing::error!(error = %e, "session purge failed");
            }
        }
    })
}
