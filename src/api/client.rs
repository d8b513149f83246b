//! REST client for online-go.com.

use super::GameApi;
use super::types::{GameList, GameSummary, OauthResponse, Player, UiConfig};
use crate::board::BoardSnapshot;
use crate::error::{ErrorKind, GoError, GoResult};
use crate::identity::GameId;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const USER_AGENT: &str = concat!("goterm/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// HTTP client for the REST API.
///
/// Unauthenticated until one of the login calls succeeds; afterwards every
/// request carries the bearer token.
#[derive(Debug, Clone)]
pub struct OgsClient {
    base_url: String,
    client_id: String,
    http: reqwest::Client,
    tokens: Option<OauthResponse>,
    player: Option<Player>,
}

impl OgsClient {
    /// Creates a client for `base_url` (no trailing slash) using the OAuth `client_id`.
    #[instrument(skip(client_id))]
    pub fn new(base_url: String, client_id: String) -> GoResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id,
            http,
            tokens: None,
            player: None,
        })
    }

    /// The logged-in player, once authenticated.
    pub fn player(&self) -> Option<&Player> {
        self.player.as_ref()
    }

    /// Refresh token to cache for the next start, once authenticated.
    pub fn refresh_token(&self) -> Option<&str> {
        self.tokens
            .as_ref()
            .map(|t| t.refresh_token.as_str())
            .filter(|t| !t.is_empty())
    }

    /// Logs in with username and password.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::InvalidCredentials`] for empty input or rejected credentials.
    /// - [`ErrorKind::AuthProviderMisconfigured`] if the provider rejects the client.
    /// - Transport or HTTP errors.
    #[instrument(skip(self, password))]
    pub async fn login_password(&mut self, username: &str, password: &str) -> GoResult<Player> {
        if username.is_empty() || password.is_empty() {
            return Err(GoError::new(ErrorKind::InvalidCredentials(
                "username and password are required".to_string(),
            )));
        }
        info!("Logging in with password");
        let (status, response) = self
            .request_token(&[
                ("client_id", self.client_id.as_str()),
                ("grant_type", "password"),
                ("username", username),
                ("password", password),
            ])
            .await?;
        if let Some(kind) = response.error_kind() {
            warn!(error = %kind, "Password login rejected");
            return Err(GoError::new(kind));
        }
        if !status.is_success() {
            return Err(http_error(status, "oauth2/token/"));
        }
        self.adopt_tokens(response).await
    }

    /// Logs in with a cached refresh token.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::InvalidRefreshToken`] if the token was rejected; transport
    /// or HTTP errors otherwise.
    #[instrument(skip(self, refresh_token))]
    pub async fn login_refresh_token(&mut self, refresh_token: &str) -> GoResult<Player> {
        info!("Logging in with refresh token");
        let (status, response) = self
            .request_token(&[
                ("client_id", self.client_id.as_str()),
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .await?;
        if !status.is_success() {
            if response.error.is_empty() {
                return Err(http_error(status, "oauth2/token/"));
            }
            warn!(error = %response.error, "Refresh token rejected");
            return Err(GoError::new(ErrorKind::InvalidRefreshToken));
        }
        self.adopt_tokens(response).await
    }

    async fn adopt_tokens(&mut self, tokens: OauthResponse) -> GoResult<Player> {
        self.tokens = Some(tokens);
        let me = self.me().await?;
        info!(player_id = me.id(), username = %me.username(), "Authenticated");
        self.player = Some(me.clone());
        Ok(me)
    }

    /// The player the access token belongs to.
    #[instrument(skip(self))]
    pub async fn me(&self) -> GoResult<Player> {
        self.get_json("api/v1/me", &[]).await
    }

    /// Active games the logged-in player takes part in (first page only).
    #[instrument(skip(self))]
    pub async fn games_list(&self) -> GoResult<Vec<GameSummary>> {
        let list: GameList = self
            .get_json("api/v1/me/games", &[("ended__isnull", "true")])
            .await?;
        debug!(count = list.games.len(), "Fetched game list");
        Ok(list.games)
    }

    async fn request_token(
        &self,
        form: &[(&str, &str)],
    ) -> GoResult<(reqwest::StatusCode, OauthResponse)> {
        // The trailing slash is required by the endpoint.
        let url = format!("{}/oauth2/token/", self.base_url);
        let response = self.http.post(&url).form(form).send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(status = %status, "Token endpoint answered");
        let parsed = serde_json::from_str(&body).unwrap_or_default();
        Ok((status, parsed))
    }

    async fn get_text(&self, path: &str, query: &[(&str, &str)]) -> GoResult<String> {
        let url = format!("{}/{}", self.base_url, path);
        let mut request = self.http.get(&url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(tokens) = self.tokens.as_ref().filter(|t| !t.access_token.is_empty()) {
            request = request.bearer_auth(&tokens.access_token);
        }
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(status = %status, path, bytes = body.len(), "GET complete");
        if !status.is_success() {
            return Err(http_error(status, path));
        }
        Ok(body)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> GoResult<T> {
        let body = self.get_text(path, query).await?;
        serde_json::from_str(&body).map_err(|e| {
            GoError::new(ErrorKind::Transport(format!(
                "unexpected response body from {path}: {e}"
            )))
        })
    }
}

#[track_caller]
fn http_error(status: reqwest::StatusCode, path: &str) -> GoError {
    GoError::new(ErrorKind::Http {
        status: status.as_u16(),
        path: path.to_string(),
    })
}

#[async_trait::async_trait]
impl GameApi for OgsClient {
    #[instrument(skip(self))]
    async fn game_state(&self, game_id: GameId) -> GoResult<BoardSnapshot> {
        let body = self
            .get_text(&format!("termination-api/game/{game_id}/state"), &[])
            .await?;
        BoardSnapshot::from_json(&body)
    }

    #[instrument(skip(self))]
    async fn chat_token(&self) -> GoResult<String> {
        let config: UiConfig = self.get_json("api/v1/ui/config", &[]).await?;
        if config.chat_auth.is_empty() {
            warn!("Service returned no chat token");
            return Err(GoError::new(ErrorKind::Transport(
                "ui/config returned no chat token".to_string(),
            )));
        }
        Ok(config.chat_auth)
    }
}
