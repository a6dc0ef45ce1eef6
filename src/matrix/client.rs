use matrix_sdk::matrix_auth::{MatrixSession, MatrixSessionTokens};
use matrix_sdk::ruma::{OwnedDeviceId, OwnedUserId};
use matrix_sdk::Client;

use crate::config::{self, StoredSession};
use crate::error::{ApiError, ConfigError};
use crate::model::User;

pub async fn create_client(homeserver: &str) -> Result<Client, ApiError> {
    let db_path = config::data_dir().join("matrix-store");

    Client::builder()
        .server_name_or_homeserver_url(homeserver)
        .sqlite_store(&db_path, None)
        .build()
        .await
        .map_err(|e| ApiError::Request(format!("Failed to create client: {e}")))
}

pub async fn login(client: &Client, username: &str, password: &str) -> Result<(), ApiError> {
    client
        .matrix_auth()
        .login_username(username, password)
        .initial_device_display_name("chatroom")
        .await
        .map_err(|e| ApiError::Request(format!("Login failed: {e}")))?;
    Ok(())
}

pub fn save_session_from_client(client: &Client, homeserver: &str) -> Result<(), ConfigError> {
    let session = client.matrix_auth().session().ok_or(ConfigError::NoSession)?;

    let stored = StoredSession {
        homeserver: homeserver.to_string(),
        user_id: session.meta.user_id.to_string(),
        access_token: session.tokens.access_token.clone(),
        device_id: session.meta.device_id.to_string(),
    };

    config::save_session(&stored)
}

pub async fn restore_session(stored: &StoredSession) -> Result<Client, ApiError> {
    let client = create_client(&stored.homeserver).await?;

    let user_id: OwnedUserId = stored.user_id.parse().map_err(|e| ApiError::InvalidId {
        id: stored.user_id.clone(),
        reason: format!("{e}"),
    })?;
    let device_id: OwnedDeviceId = stored.device_id.as_str().into();

    let session = MatrixSession {
        meta: matrix_sdk::SessionMeta { user_id, device_id },
        tokens: MatrixSessionTokens {
            access_token: stored.access_token.clone(),
            refresh_token: None,
        },
    };

    client
        .restore_session(session)
        .await
        .map_err(|e| ApiError::Request(format!("Session restore failed: {e}")))?;

    tracing::info!("Restored session for {}", stored.user_id);
    Ok(client)
}

/// The logged-in user, named by their display name when the server has one.
pub async fn current_user(client: &Client) -> Result<User, ApiError> {
    let user_id = client
        .user_id()
        .ok_or_else(|| ApiError::Request("not logged in".into()))?;
    let username = match client.account().get_display_name().await {
        Ok(Some(name)) => name,
        Ok(None) => user_id.localpart().to_string(),
        Err(e) => {
            tracing::warn!("Failed to fetch display name: {e}");
            user_id.localpart().to_string()
        }
    };
    Ok(User {
        id: user_id.to_string(),
        username,
    })
}
