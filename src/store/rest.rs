use super::{AuthProvider, ChatStore, Principal};
use crate::error::RemoteError;
use crate::model::{BrowserEvent, Chat, CodeRunState, CoderunEvent, Message, NewChat, NewMessage};
use async_trait::async_trait;
use reqwest::{header, Client, Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::RwLock;

const REST_PREFIX: &str = "rest/v1";
const AUTH_TOKEN_PATH: &str = "auth/v1/token";
const AUTH_LOGOUT_PATH: &str = "auth/v1/logout";
const AUTH_USER_PATH: &str = "auth/v1/user";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestConfig {
    pub url: String,
    pub anon_key: String,
    pub timeout: Duration,
}

/// Hosted backend speaking the PostgREST dialect plus its password auth.
///
/// Requests carry the anon key as `apikey`. The bearer is the signed-in
/// user's access token when there is one, the anon key otherwise.
pub struct RestBackend {
    config: RestConfig,
    client: Client,
    access_token: RwLock<Option<String>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: Principal,
}

#[derive(Debug, Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

impl RestBackend {
    pub fn new(config: RestConfig) -> Result<Self, RemoteError> {
        let mut headers = header::HeaderMap::new();
        let key = header::HeaderValue::from_str(&config.anon_key)
            .map_err(|error| RemoteError::Transport(format!("anon key is invalid: {error}")))?;
        headers.insert("apikey", key);
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|error| RemoteError::Transport(format!("failed to build HTTP client: {error}")))?;

        Ok(Self {
            config,
            client,
            access_token: RwLock::new(None),
        })
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, RemoteError> {
        build_url(&self.config.url, path, params)
    }

    fn table(&self, table: &str, params: &[(&str, &str)]) -> Result<Url, RemoteError> {
        self.endpoint(&format!("{REST_PREFIX}/{table}"), params)
    }

    async fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let token = self.access_token.read().await;
        let bearer = token.as_deref().unwrap_or(&self.config.anon_key);
        self.client.request(method, url).bearer_auth(bearer)
    }

    async fn send(&self, request: RequestBuilder) -> Result<String, RemoteError> {
        let response = request.send().await.map_err(RemoteError::transport)?;
        let status = response.status();
        let body = response.text().await.map_err(RemoteError::transport)?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(error_from_response(status, &body))
        }
    }

    async fn request_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, RemoteError> {
        let body = self.send(request).await?;
        serde_json::from_str(&body).map_err(RemoteError::decode)
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &'static str,
        params: &[(&str, &str)],
    ) -> Result<Vec<T>, RemoteError> {
        let url = self.table(table, params)?;
        tracing::debug!(table, "select");
        let request = self.request(Method::GET, url).await;
        self.request_json(request).await
    }

    /// Insert or update that returns the written row.
    async fn write_one<T: DeserializeOwned>(
        &self,
        method: Method,
        table: &'static str,
        params: &[(&str, &str)],
        body: Value,
        id: &str,
    ) -> Result<T, RemoteError> {
        let url = self.table(table, params)?;
        let request = self
            .request(method, url)
            .await
            .header("Prefer", "return=representation")
            .json(&body);
        let rows: Vec<T> = self.request_json(request).await?;
        first_row(rows, table, id)
    }
}

fn build_url(base: &str, path: &str, params: &[(&str, &str)]) -> Result<Url, RemoteError> {
    let base = base.trim_end_matches('/');
    let suffix = path.trim_start_matches('/');
    let mut url = Url::parse(&format!("{base}/{suffix}"))
        .map_err(|error| RemoteError::Transport(format!("invalid backend url: {error}")))?;
    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params);
    }
    Ok(url)
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

fn first_row<T>(rows: Vec<T>, table: &'static str, id: &str) -> Result<T, RemoteError> {
    rows.into_iter().next().ok_or_else(|| RemoteError::NotFound {
        table,
        id: id.to_string(),
    })
}

/// Maps a non-success response, preferring the service's own message.
fn error_from_response(status: StatusCode, body: &str) -> RemoteError {
    if status == StatusCode::UNAUTHORIZED {
        return RemoteError::Unauthenticated;
    }
    let message = serde_json::from_str::<Value>(body).ok().and_then(|value| {
        ["message", "msg", "error_description"]
            .iter()
            .find_map(|key| value.get(key).and_then(Value::as_str).map(str::to_string))
    });
    match message {
        Some(message) if !message.trim().is_empty() => RemoteError::Rejected(message),
        _ => RemoteError::Status {
            status: status.as_u16(),
            body: body.to_string(),
        },
    }
}

#[async_trait]
impl ChatStore for RestBackend {
    async fn select_chats(&self, owner: &str) -> Result<Vec<Chat>, RemoteError> {
        let owner = eq(owner);
        self.select(
            "chats",
            &[("select", "*"), ("uid", &owner), ("order", "created_at.desc")],
        )
        .await
    }

    async fn insert_chat(&self, chat: NewChat) -> Result<Chat, RemoteError> {
        let body = serde_json::to_value(&chat).map_err(RemoteError::decode)?;
        self.write_one(Method::POST, "chats", &[], body, &chat.uid).await
    }

    async fn update_chat_title(&self, id: &str, title: &str) -> Result<Chat, RemoteError> {
        let filter = eq(id);
        self.write_one(
            Method::PATCH,
            "chats",
            &[("id", &filter)],
            json!({ "title": title }),
            id,
        )
        .await
    }

    async fn delete_chat(&self, id: &str) -> Result<(), RemoteError> {
        let filter = eq(id);
        let url = self.table("chats", &[("id", &filter)])?;
        let request = self.request(Method::DELETE, url).await;
        self.send(request).await.map(|_| ())
    }

    async fn select_messages(&self, chat_id: &str) -> Result<Vec<Message>, RemoteError> {
        let filter = eq(chat_id);
        self.select(
            "messages",
            &[("select", "*"), ("chat_id", &filter), ("order", "created_at.asc")],
        )
        .await
    }

    async fn select_coderun_events(
        &self,
        chat_id: &str,
    ) -> Result<Vec<CoderunEvent>, RemoteError> {
        let filter = eq(chat_id);
        self.select(
            "coderun_events",
            &[("select", "*"), ("chat_id", &filter), ("order", "created_at.asc")],
        )
        .await
    }

    async fn select_browser_events(
        &self,
        chat_id: &str,
    ) -> Result<Vec<BrowserEvent>, RemoteError> {
        let filter = eq(chat_id);
        self.select(
            "browser_events",
            &[("select", "*"), ("chat_id", &filter), ("order", "created_at.asc")],
        )
        .await
    }

    async fn insert_message(&self, message: NewMessage) -> Result<Message, RemoteError> {
        let body = serde_json::to_value(&message).map_err(RemoteError::decode)?;
        self.write_one(Method::POST, "messages", &[], body, &message.chat_id)
            .await
    }

    async fn update_code_run_state(
        &self,
        message_id: &str,
        state: CodeRunState,
    ) -> Result<Message, RemoteError> {
        let filter = eq(message_id);
        self.write_one(
            Method::PATCH,
            "messages",
            &[("id", &filter)],
            json!({ "code_run_state": state }),
            message_id,
        )
        .await
    }
}

#[async_trait]
impl AuthProvider for RestBackend {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, RemoteError> {
        let url = self.endpoint(AUTH_TOKEN_PATH, &[("grant_type", "password")])?;
        let request = self
            .client
            .post(url)
            .bearer_auth(&self.config.anon_key)
            .json(&PasswordGrant { email, password });
        let token: TokenResponse = self.request_json(request).await?;
        *self.access_token.write().await = Some(token.access_token.clone());
        tracing::info!(user = %token.user.id, "signed in");
        Ok(Principal {
            access_token: token.access_token,
            ..token.user
        })
    }

    async fn sign_out(&self) -> Result<(), RemoteError> {
        let url = self.endpoint(AUTH_LOGOUT_PATH, &[])?;
        let request = self.request(Method::POST, url).await;
        let result = self.send(request).await.map(|_| ());
        // The local session ends even when the server call fails.
        *self.access_token.write().await = None;
        result
    }

    async fn current(&self) -> Result<Option<Principal>, RemoteError> {
        let Some(token) = self.access_token.read().await.clone() else {
            return Ok(None);
        };
        let url = self.endpoint(AUTH_USER_PATH, &[])?;
        let request = self.client.get(url).bearer_auth(&token);
        match self.request_json::<Principal>(request).await {
            Ok(user) => Ok(Some(Principal {
                access_token: token,
                ..user
            })),
            Err(RemoteError::Unauthenticated) => {
                *self.access_token.write().await = None;
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_url_joins_and_encodes_filters() {
        let url = build_url(
            "https://project.example.co/",
            "rest/v1/chats",
            &[("uid", "eq.user 1"), ("order", "created_at.desc")],
        )
        .expect("valid url");
        assert_eq!(
            url.as_str(),
            "https://project.example.co/rest/v1/chats?uid=eq.user+1&order=created_at.desc"
        );
    }

    #[test]
    fn build_url_rejects_garbage_base() {
        assert!(matches!(
            build_url("not a url", "rest/v1/chats", &[]),
            Err(RemoteError::Transport(_))
        ));
    }

    #[test]
    fn unauthorized_maps_to_unauthenticated() {
        assert_eq!(
            error_from_response(StatusCode::UNAUTHORIZED, "{}"),
            RemoteError::Unauthenticated
        );
    }

    #[test]
    fn service_message_is_surfaced_raw() {
        let error = error_from_response(
            StatusCode::FORBIDDEN,
            r#"{"code":"42501","message":"new row violates row-level security policy"}"#,
        );
        assert_eq!(
            error.to_string(),
            "new row violates row-level security policy"
        );

        let error = error_from_response(StatusCode::BAD_REQUEST, r#"{"error_description":"Invalid login credentials"}"#);
        assert_eq!(error, RemoteError::Rejected("Invalid login credentials".to_string()));
    }

    #[test]
    fn opaque_body_keeps_status() {
        let error = error_from_response(StatusCode::BAD_GATEWAY, "upstream timeout");
        assert_eq!(
            error,
            RemoteError::Status {
                status: 502,
                body: "upstream timeout".to_string()
            }
        );
    }

    #[test]
    fn empty_representation_is_not_found() {
        let error = first_row(Vec::<Chat>::new(), "chats", "c1").expect_err("no rows");
        assert_eq!(error.to_string(), "chats row `c1` not found");
    }

    #[test]
    fn token_response_carries_user() {
        let token: TokenResponse = serde_json::from_value(json!({
            "access_token": "jwt",
            "token_type": "bearer",
            "user": {"id": "u1", "email": "ada@example.com", "role": "authenticated"}
        }))
        .expect("token response");
        assert_eq!(token.user.id, "u1");
        assert_eq!(token.user.email.as_deref(), Some("ada@example.com"));
        assert!(token.user.access_token.is_empty());
    }
}
