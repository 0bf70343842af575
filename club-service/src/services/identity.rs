//! Identity provider integration.
//!
//! Roles, their permissions and the exclusive role holder are mirrored into
//! the identity provider, which is what actually grants access. Every call is
//! synchronous from the caller's point of view and every failure propagates.

use crate::config::IdentityConfig;
use crate::services::metrics::record_identity_request;
use async_trait::async_trait;
use reqwest::{Client, Method, Response, Url};
use serde::{Deserialize, Serialize};
use service_core::observability::TraceContextExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::instrument;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("{operation} rejected with status {status}: {body}")]
    Rejected {
        operation: &'static str,
        status: u16,
        body: String,
    },
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn create_role(&self, role_name: &str) -> Result<(), IdentityError>;

    async fn delete_role(&self, role_name: &str) -> Result<(), IdentityError>;

    async fn add_permission(&self, role_name: &str, permission: &str)
        -> Result<(), IdentityError>;

    async fn remove_permission(
        &self,
        role_name: &str,
        permission: &str,
    ) -> Result<(), IdentityError>;

    /// Make `subject` the only user holding `role_name`.
    async fn assign_role_exclusively(
        &self,
        subject: &str,
        role_name: &str,
    ) -> Result<(), IdentityError>;

    /// Take `role_name` away from whoever holds it.
    async fn unassign_exclusive_role(&self, role_name: &str) -> Result<(), IdentityError>;
}

// ============================================================================
// Keycloak admin REST client
// ============================================================================

/// Tokens are refreshed this long before the provider says they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    refresh_at: Instant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RoleRepresentation {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
}

#[derive(Debug, Deserialize)]
struct UserRepresentation {
    id: String,
}

/// Client for an OpenID Connect provider exposing the Keycloak admin API.
/// Permissions are modelled as composite realm roles.
#[derive(Clone)]
pub struct KeycloakClient {
    client: Client,
    base_url: Url,
    realm: String,
    client_id: String,
    client_secret: String,
    token: Arc<RwLock<Option<CachedToken>>>,
}

impl KeycloakClient {
    pub fn new(config: &IdentityConfig) -> Result<Self, IdentityError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            IdentityError::Connection(format!("Invalid identity base url: {}", e))
        })?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| IdentityError::Connection(format!("Failed to build client: {}", e)))?;

        tracing::info!(
            base_url = %base_url,
            realm = %config.realm,
            "Identity provider client configured"
        );

        Ok(Self {
            client,
            base_url,
            realm: config.realm.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            token: Arc::new(RwLock::new(None)),
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, IdentityError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| IdentityError::Connection("Identity base url cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn admin_url(&self, segments: &[&str]) -> Result<Url, IdentityError> {
        let mut all = vec!["admin", "realms", self.realm.as_str()];
        all.extend_from_slice(segments);
        self.url(&all)
    }

    async fn access_token(&self) -> Result<String, IdentityError> {
        {
            let guard = self.token.read().await;
            if let Some(token) = guard.as_ref() {
                if Instant::now() < token.refresh_at {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let mut guard = self.token.write().await;
        if let Some(token) = guard.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.access_token.clone());
            }
        }

        let url = self.url(&["realms", self.realm.as_str(), "protocol", "openid-connect", "token"])?;
        let response = self
            .client
            .post(url)
            .with_trace_context()
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| IdentityError::Connection(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "Identity provider refused token");
            return Err(IdentityError::Authentication(format!(
                "Token endpoint returned {}",
                status
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            IdentityError::Authentication(format!("Failed to parse token response: {}", e))
        })?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *guard = Some(CachedToken {
            access_token: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        tracing::debug!(expires_in = token.expires_in, "Identity provider token refreshed");

        Ok(token.access_token)
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        operation: &'static str,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<Response, IdentityError> {
        let token = self.access_token().await?;
        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(token)
            .with_trace_context();
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            record_identity_request(operation, "error");
            IdentityError::Connection(format!("{} failed: {}", operation, e))
        })?;

        let status = response.status();
        record_identity_request(operation, status.as_str());

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::warn!(
            operation = operation,
            status = %status,
            body = %body,
            "Identity provider rejected request"
        );
        Err(IdentityError::Rejected {
            operation,
            status: status.as_u16(),
            body,
        })
    }

    /// Send a request whose response body is only logged.
    async fn execute<B: Serialize + ?Sized>(
        &self,
        operation: &'static str,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<(), IdentityError> {
        let response = self.send(operation, method, url, body).await?;
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(operation = operation, body = %body, "Identity provider response");
        Ok(())
    }

    async fn role(&self, role_name: &str) -> Result<RoleRepresentation, IdentityError> {
        let url = self.admin_url(&["roles", role_name])?;
        self.send::<()>("get_role", Method::GET, url, None)
            .await?
            .json()
            .await
            .map_err(|e| IdentityError::Connection(format!("Failed to parse role: {}", e)))
    }

    /// Look up a permission role, creating it on first use.
    async fn permission_role(&self, permission: &str) -> Result<RoleRepresentation, IdentityError> {
        match self.role(permission).await {
            Err(IdentityError::Rejected { status: 404, .. }) => {
                self.create_role(permission).await?;
                self.role(permission).await
            }
            other => other,
        }
    }

    async fn role_users(&self, role_name: &str) -> Result<Vec<UserRepresentation>, IdentityError> {
        let url = self.admin_url(&["roles", role_name, "users"])?;
        self.send::<()>("get_role_users", Method::GET, url, None)
            .await?
            .json()
            .await
            .map_err(|e| IdentityError::Connection(format!("Failed to parse role users: {}", e)))
    }

    async fn unmap_role(
        &self,
        user_id: &str,
        role: &RoleRepresentation,
    ) -> Result<(), IdentityError> {
        let url = self.admin_url(&["users", user_id, "role-mappings", "realm"])?;
        self.execute(
            "unmap_role",
            Method::DELETE,
            url,
            Some(std::slice::from_ref(role)),
        )
        .await
    }
}

#[async_trait]
impl IdentityProvider for KeycloakClient {
    #[instrument(skip(self))]
    async fn create_role(&self, role_name: &str) -> Result<(), IdentityError> {
        let url = self.admin_url(&["roles"])?;
        let body = RoleRepresentation {
            id: None,
            name: role_name.to_string(),
        };
        self.execute("create_role", Method::POST, url, Some(&body))
            .await
    }

    #[instrument(skip(self))]
    async fn delete_role(&self, role_name: &str) -> Result<(), IdentityError> {
        let url = self.admin_url(&["roles", role_name])?;
        self.execute::<()>("delete_role", Method::DELETE, url, None)
            .await
    }

    #[instrument(skip(self))]
    async fn add_permission(
        &self,
        role_name: &str,
        permission: &str,
    ) -> Result<(), IdentityError> {
        let composite = self.permission_role(permission).await?;
        let url = self.admin_url(&["roles", role_name, "composites"])?;
        self.execute(
            "add_permission",
            Method::POST,
            url,
            Some(std::slice::from_ref(&composite)),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn remove_permission(
        &self,
        role_name: &str,
        permission: &str,
    ) -> Result<(), IdentityError> {
        let composite = self.role(permission).await?;
        let url = self.admin_url(&["roles", role_name, "composites"])?;
        self.execute(
            "remove_permission",
            Method::DELETE,
            url,
            Some(std::slice::from_ref(&composite)),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn assign_role_exclusively(
        &self,
        subject: &str,
        role_name: &str,
    ) -> Result<(), IdentityError> {
        let role = self.role(role_name).await?;

        let mut already_held = false;
        for user in self.role_users(role_name).await? {
            if user.id == subject {
                already_held = true;
            } else {
                self.unmap_role(&user.id, &role).await?;
            }
        }

        if already_held {
            tracing::debug!(subject = %subject, role = %role_name, "Subject already holds role");
            return Ok(());
        }

        let url = self.admin_url(&["users", subject, "role-mappings", "realm"])?;
        self.execute(
            "assign_role",
            Method::POST,
            url,
            Some(std::slice::from_ref(&role)),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn unassign_exclusive_role(&self, role_name: &str) -> Result<(), IdentityError> {
        let role = self.role(role_name).await?;
        for user in self.role_users(role_name).await? {
            self.unmap_role(&user.id, &role).await?;
        }
        Ok(())
    }
}

// ============================================================================
// In-process provider
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityCall {
    CreateRole(String),
    DeleteRole(String),
    AddPermission { role: String, permission: String },
    RemovePermission { role: String, permission: String },
    AssignExclusive { subject: String, role: String },
    UnassignExclusive(String),
}

/// Provider that keeps role holders in memory and records every call.
/// Can be switched to fail every call, which leaves its state untouched.
#[derive(Debug, Default)]
pub struct MockIdentityProvider {
    calls: Mutex<Vec<IdentityCall>>,
    holders: Mutex<HashMap<String, String>>,
    failing: AtomicBool,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<IdentityCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn holder_of(&self, role_name: &str) -> Option<String> {
        self.holders
            .lock()
            .ok()
            .and_then(|h| h.get(role_name).cloned())
    }

    fn record(&self, operation: &'static str, call: IdentityCall) -> Result<(), IdentityError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(IdentityError::Rejected {
                operation,
                status: 503,
                body: "identity provider unavailable".to_string(),
            });
        }
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn create_role(&self, role_name: &str) -> Result<(), IdentityError> {
        self.record("create_role", IdentityCall::CreateRole(role_name.to_string()))
    }

    async fn delete_role(&self, role_name: &str) -> Result<(), IdentityError> {
        self.record("delete_role", IdentityCall::DeleteRole(role_name.to_string()))?;
        if let Ok(mut holders) = self.holders.lock() {
            holders.remove(role_name);
        }
        Ok(())
    }

    async fn add_permission(
        &self,
        role_name: &str,
        permission: &str,
    ) -> Result<(), IdentityError> {
        self.record(
            "add_permission",
            IdentityCall::AddPermission {
                role: role_name.to_string(),
                permission: permission.to_string(),
            },
        )
    }

    async fn remove_permission(
        &self,
        role_name: &str,
        permission: &str,
    ) -> Result<(), IdentityError> {
        self.record(
            "remove_permission",
            IdentityCall::RemovePermission {
                role: role_name.to_string(),
                permission: permission.to_string(),
            },
        )
    }

    async fn assign_role_exclusively(
        &self,
        subject: &str,
        role_name: &str,
    ) -> Result<(), IdentityError> {
        self.record(
            "assign_role",
            IdentityCall::AssignExclusive {
                subject: subject.to_string(),
                role: role_name.to_string(),
            },
        )?;
        if let Ok(mut holders) = self.holders.lock() {
            holders.insert(role_name.to_string(), subject.to_string());
        }
        Ok(())
    }

    async fn unassign_exclusive_role(&self, role_name: &str) -> Result<(), IdentityError> {
        self.record(
            "unassign_role",
            IdentityCall::UnassignExclusive(role_name.to_string()),
        )?;
        if let Ok(mut holders) = self.holders.lock() {
            holders.remove(role_name);
        }
        Ok(())
    }
}
