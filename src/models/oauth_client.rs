use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A grant a client is permitted to use. The core supports exactly these two
/// (§1 Non-goals excludes implicit/device/client_credentials/password grants).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grant {
    AuthorizationCode,
    RefreshToken,
}

impl Grant {
    fn as_str(&self) -> &'static str {
        match self {
            Grant::AuthorizationCode => "authorization_code",
            Grant::RefreshToken => "refresh_token",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "authorization_code" => Some(Grant::AuthorizationCode),
            "refresh_token" => Some(Grant::RefreshToken),
            _ => None,
        }
    }
}

/// A registered OAuth client (relying party).
///
/// Invariant: `redirect_uris` is non-empty; an incoming `redirect_uri` at
/// `authorize` must exact-string-equal some element (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthClient {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    /// bcrypt hash of the client secret (DESIGN.md Open Question d: hashed at rest).
    #[serde(skip_serializing)]
    pub secret_hash: String,
    pub redirect_uris: Vec<String>,
    pub grants: Vec<Grant>,
    pub scope: Option<String>,
    /// When true, the token endpoint may omit `client_secret` for a PKCE
    /// authorization_code exchange (DESIGN.md Open Question b).
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct OAuthClientRow {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub secret_hash: String,
    pub redirect_uris: serde_json::Value,
    pub grants: serde_json::Value,
    pub scope: Option<String>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OAuthClientRow> for OAuthClient {
    fn from(row: OAuthClientRow) -> Self {
        let redirect_uris: Vec<String> = serde_json::from_value(row.redirect_uris).unwrap_or_default();
        let grant_strs: Vec<String> = serde_json::from_value(row.grants).unwrap_or_default();
        let grants = grant_strs.iter().filter_map(|g| Grant::parse(g)).collect();

        Self {
            id: Uuid::parse_str(&row.id).unwrap_or_default(),
            user_id: Uuid::parse_str(&row.user_id).unwrap_or_default(),
            name: row.name,
            secret_hash: row.secret_hash,
            redirect_uris,
            grants,
            scope: row.scope,
            is_public: row.is_public,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl<'r> sqlx::FromRow<'r, sqlx::mysql::MySqlRow> for OAuthClient {
    fn from_row(row: &'r sqlx::mysql::MySqlRow) -> Result<Self, sqlx::Error> {
        let client_row = OAuthClientRow::from_row(row)?;
        Ok(OAuthClient::from(client_row))
    }
}

impl OAuthClient {
    /// Check if a redirect URI exact-matches one of the registered URIs (§3, §8 Property 4).
    pub fn has_redirect_uri(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|u| u == uri)
    }

    pub fn supports_grant(&self, grant: Grant) -> bool {
        self.grants.contains(&grant)
    }

    pub fn grants_json(grants: &[Grant]) -> serde_json::Value {
        serde_json::json!(grants.iter().map(|g| g.as_str()).collect::<Vec<_>>())
    }
}
