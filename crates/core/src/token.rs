//! API key types and authorization.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

/// Unique identifier for an API key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApiKeyId(Uuid);

impl ApiKeyId {
    /// Generate a new random key ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from a string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| crate::Error::InvalidToken(format!("invalid key ID: {e}")))
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ApiKeyId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ApiKeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKeyId({})", self.0)
    }
}

impl fmt::Display for ApiKeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// API key scopes for authorization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenScope {
    /// Read access (list and search skills).
    #[serde(rename = "skills:read")]
    SkillsRead,
    /// Write access (submit ratings, reviews, and votes).
    #[serde(rename = "reviews:write")]
    ReviewsWrite,
    /// Admin access (token management, sync control, moderation).
    #[serde(rename = "admin")]
    Admin,
}

impl TokenScope {
    /// Parse from string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s {
            "skills:read" => Ok(Self::SkillsRead),
            "reviews:write" => Ok(Self::ReviewsWrite),
            "admin" => Ok(Self::Admin),
            _ => Err(crate::Error::InvalidToken(format!("unknown scope: {s}"))),
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SkillsRead => "skills:read",
            Self::ReviewsWrite => "reviews:write",
            Self::Admin => "admin",
        }
    }

    /// Check if this scope implies another scope.
    pub fn implies(&self, other: &Self) -> bool {
        match self {
            Self::Admin => true, // Admin implies all
            Self::ReviewsWrite => matches!(other, Self::ReviewsWrite | Self::SkillsRead),
            Self::SkillsRead => matches!(other, Self::SkillsRead),
        }
    }
}

impl fmt::Display for TokenScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A validated API key with its metadata.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiToken {
    /// Key identifier.
    pub id: ApiKeyId,
    /// Agent this key belongs to (None for admin keys created from config).
    pub agent_id: Option<Uuid>,
    /// Granted scopes.
    pub scopes: HashSet<TokenScope>,
    /// When the key expires.
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    /// When the key was revoked (if revoked).
    #[serde(with = "time::serde::rfc3339::option")]
    pub revoked_at: Option<OffsetDateTime>,
    /// When the key was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Description for the key.
    pub description: Option<String>,
}

impl ApiToken {
    /// Check if the key is valid (not expired or revoked).
    pub fn is_valid(&self) -> bool {
        let now = OffsetDateTime::now_utc();

        if self.revoked_at.is_some() {
            return false;
        }

        if let Some(expires_at) = self.expires_at {
            if now > expires_at {
                return false;
            }
        }

        true
    }

    /// Check if the key has a specific scope.
    pub fn has_scope(&self, scope: TokenScope) -> bool {
        self.scopes.iter().any(|s| s.implies(&scope))
    }

    /// Check if the key can read the skill directory.
    pub fn can_read(&self) -> bool {
        self.is_valid() && self.has_scope(TokenScope::SkillsRead)
    }

    /// Check if the key can submit reviews and votes.
    pub fn can_review(&self) -> bool {
        self.is_valid() && self.has_scope(TokenScope::ReviewsWrite)
    }

    /// Check if the key has admin access.
    pub fn is_admin(&self) -> bool {
        self.is_valid() && self.has_scope(TokenScope::Admin)
    }
}
