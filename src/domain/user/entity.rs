//! User entity and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::validation::{
    validate_email, validate_normalized_username, validate_picture, validate_user_id,
    validate_username, UserValidationError,
};
use crate::domain::storage::{IndexEntry, StorageEntity, StorageKey};
use crate::domain::DomainError;

/// Index of normalized usernames and emails
pub const IDENTIFIER_INDEX: &str = "identifier";
/// Index of pending confirmation tokens
pub const CONFIRMATION_TOKEN_INDEX: &str = "confirmation_token";
/// Index of pending recovery tokens
pub const RECOVERY_TOKEN_INDEX: &str = "recovery_token";
/// Index of pending email-change tokens
pub const EMAIL_CHANGE_TOKEN_INDEX: &str = "email_change_token";

/// User identifier - ASCII alphanumeric, usually a ULID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Create a new UserId after validation
    pub fn new(id: impl Into<String>) -> Result<Self, UserValidationError> {
        let id = id.into();
        validate_user_id(&id)?;
        Ok(Self(id))
    }

    /// Allocate a fresh time-ordered identifier
    pub fn generate() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = UserValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl StorageKey for UserId {
    fn as_str(&self) -> &str {
        &self.0
    }
}

/// The three kinds of emailed verification tokens a user can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerificationKind {
    Confirmation,
    Recovery,
    EmailChange,
}

impl VerificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmation => "confirmation",
            Self::Recovery => "recovery",
            Self::EmailChange => "email_change",
        }
    }
}

impl std::fmt::Display for VerificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_false(value: &bool) -> bool {
    !value
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

/// Identity record
///
/// The serialized form is the stored representation used by both storage
/// backends. Empty strings, unset timestamps, empty maps and zero counters are
/// omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "user_id")]
    id: UserId,
    email: String,
    #[serde(default, skip_serializing_if = "is_false")]
    email_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    valid_since: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    password_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    password_updated_at: Option<DateTime<Utc>>,

    username: String,
    normalized_username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    given_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    family_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    nickname: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    picture: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    confirmation_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    confirmation_sent_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    recovery_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    recovery_sent_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    email_change_token: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    new_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email_change_sent_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    app_metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    user_metadata: Map<String, Value>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    last_ip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_login_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "is_zero")]
    logins_count: u64,

    #[serde(default, skip_serializing_if = "is_false")]
    blocked: bool,

    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user; email and username are case-folded
    pub fn new(id: UserId, email: impl Into<String>, username: impl Into<String>) -> Self {
        let now = Utc::now();
        let username = username.into();

        Self {
            id,
            email: email.into().to_lowercase(),
            email_verified: false,
            valid_since: None,
            password_hash: String::new(),
            password_updated_at: None,
            normalized_username: username.to_lowercase(),
            username,
            given_name: String::new(),
            family_name: String::new(),
            name: String::new(),
            nickname: String::new(),
            picture: String::new(),
            confirmation_token: String::new(),
            confirmation_sent_at: None,
            recovery_token: String::new(),
            recovery_sent_at: None,
            email_change_token: String::new(),
            new_email: String::new(),
            email_change_sent_at: None,
            app_metadata: Map::new(),
            user_metadata: Map::new(),
            last_ip: String::new(),
            last_login_at: None,
            logins_count: 0,
            blocked: false,
            created_at: now,
            updated_at: now,
        }
    }

    // Getters

    pub fn id(&self) -> &UserId {
        &self.id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn is_email_verified(&self) -> bool {
        self.email_verified
    }

    pub fn valid_since(&self) -> Option<DateTime<Utc>> {
        self.valid_since
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    pub fn has_password(&self) -> bool {
        !self.password_hash.is_empty()
    }

    pub fn password_updated_at(&self) -> Option<DateTime<Utc>> {
        self.password_updated_at
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn normalized_username(&self) -> &str {
        &self.normalized_username
    }

    pub fn given_name(&self) -> &str {
        &self.given_name
    }

    pub fn family_name(&self) -> &str {
        &self.family_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn picture(&self) -> &str {
        &self.picture
    }

    pub fn confirmation_token(&self) -> &str {
        &self.confirmation_token
    }

    pub fn recovery_token(&self) -> &str {
        &self.recovery_token
    }

    pub fn email_change_token(&self) -> &str {
        &self.email_change_token
    }

    /// Email staged by a pending email change
    pub fn new_email(&self) -> &str {
        &self.new_email
    }

    pub fn app_metadata(&self) -> &Map<String, Value> {
        &self.app_metadata
    }

    pub fn user_metadata(&self) -> &Map<String, Value> {
        &self.user_metadata
    }

    pub fn last_ip(&self) -> &str {
        &self.last_ip
    }

    pub fn last_login_at(&self) -> Option<DateTime<Utc>> {
        self.last_login_at
    }

    pub fn logins_count(&self) -> u64 {
        self.logins_count
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Current token value of the given kind, empty when none is pending
    pub fn verification_token(&self, kind: VerificationKind) -> &str {
        match kind {
            VerificationKind::Confirmation => &self.confirmation_token,
            VerificationKind::Recovery => &self.recovery_token,
            VerificationKind::EmailChange => &self.email_change_token,
        }
    }

    /// When the token of the given kind was last sent
    pub fn verification_sent_at(&self, kind: VerificationKind) -> Option<DateTime<Utc>> {
        match kind {
            VerificationKind::Confirmation => self.confirmation_sent_at,
            VerificationKind::Recovery => self.recovery_sent_at,
            VerificationKind::EmailChange => self.email_change_sent_at,
        }
    }

    // Mutators

    /// Assign an identifier; used when a new user is created
    pub fn set_id(&mut self, id: UserId) {
        self.id = id;
    }

    /// Update the email, case-folded
    pub fn set_email(&mut self, email: impl Into<String>) {
        self.email = email.into().to_lowercase();
    }

    /// Update the username and its normalized form
    pub fn set_username(&mut self, username: impl Into<String>) {
        self.username = username.into();
        self.normalized_username = self.username.to_lowercase();
    }

    /// Store a new password hash
    pub fn set_password_hash(&mut self, password_hash: impl Into<String>) {
        self.password_hash = password_hash.into();
        self.password_updated_at = Some(Utc::now());
    }

    pub fn set_given_name(&mut self, given_name: impl Into<String>) {
        self.given_name = given_name.into();
    }

    pub fn set_family_name(&mut self, family_name: impl Into<String>) {
        self.family_name = family_name.into();
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_nickname(&mut self, nickname: impl Into<String>) {
        self.nickname = nickname.into();
    }

    pub fn set_picture(&mut self, picture: impl Into<String>) {
        self.picture = picture.into();
    }

    pub fn set_blocked(&mut self, blocked: bool) {
        self.blocked = blocked;
    }

    /// Replace the token of the given kind, returning the previous value
    pub fn set_verification_token(
        &mut self,
        kind: VerificationKind,
        token: impl Into<String>,
    ) -> String {
        let slot = match kind {
            VerificationKind::Confirmation => &mut self.confirmation_token,
            VerificationKind::Recovery => &mut self.recovery_token,
            VerificationKind::EmailChange => &mut self.email_change_token,
        };
        std::mem::replace(slot, token.into())
    }

    /// Record when the token of the given kind was sent
    pub fn set_verification_sent_at(&mut self, kind: VerificationKind, at: DateTime<Utc>) {
        let slot = match kind {
            VerificationKind::Confirmation => &mut self.confirmation_sent_at,
            VerificationKind::Recovery => &mut self.recovery_sent_at,
            VerificationKind::EmailChange => &mut self.email_change_sent_at,
        };
        *slot = Some(at);
    }

    /// Stage an email for a pending change, returning the previously staged one
    pub fn stage_new_email(&mut self, email: impl Into<String>) -> String {
        std::mem::replace(&mut self.new_email, email.into().to_lowercase())
    }

    /// Mark the email as verified and drop the confirmation token
    pub fn confirm(&mut self) {
        self.email_verified = true;
        self.valid_since = Some(Utc::now());
        self.confirmation_token.clear();
        self.confirmation_sent_at = None;
    }

    /// Drop the recovery token after a successful recovery
    pub fn clear_recovery(&mut self) {
        self.recovery_token.clear();
        self.recovery_sent_at = None;
    }

    /// Promote the staged email and drop the email-change fields
    pub fn apply_email_change(&mut self) {
        if !self.new_email.is_empty() {
            self.email = std::mem::take(&mut self.new_email);
        }
        self.email_change_token.clear();
        self.email_change_sent_at = None;
    }

    /// Record a successful sign in
    pub fn record_sign_in(&mut self, ip: impl Into<String>) {
        self.last_ip = ip.into();
        self.last_login_at = Some(Utc::now());
        self.logins_count += 1;
    }

    /// Shallow-merge user metadata; a `null` value removes the key
    pub fn merge_user_metadata(&mut self, updates: Map<String, Value>) {
        merge_metadata(&mut self.user_metadata, updates);
    }

    /// Shallow-merge application metadata; a `null` value removes the key
    pub fn merge_app_metadata(&mut self, updates: Map<String, Value>) {
        merge_metadata(&mut self.app_metadata, updates);
    }

    fn identifier_projection(&self) -> Value {
        json!({
            "user_id": self.id.as_str(),
            "password_hash": self.password_hash,
        })
    }

    fn token_projection(&self, kind: VerificationKind) -> Value {
        let token = self.verification_token(kind);
        let sent_at = self.verification_sent_at(kind);

        match kind {
            VerificationKind::Confirmation => json!({
                "user_id": self.id.as_str(),
                "confirmation_token": token,
                "confirmation_sent_at": sent_at,
            }),
            VerificationKind::Recovery => json!({
                "user_id": self.id.as_str(),
                "recovery_token": token,
                "recovery_sent_at": sent_at,
            }),
            VerificationKind::EmailChange => json!({
                "user_id": self.id.as_str(),
                "email_change_token": token,
                "new_email": self.new_email,
                "email_change_sent_at": sent_at,
            }),
        }
    }
}

fn merge_metadata(target: &mut Map<String, Value>, updates: Map<String, Value>) {
    for (key, value) in updates {
        if value.is_null() {
            target.remove(&key);
        } else {
            target.insert(key, value);
        }
    }
}

/// Index holding the given verification kind
pub fn token_index(kind: VerificationKind) -> &'static str {
    match kind {
        VerificationKind::Confirmation => CONFIRMATION_TOKEN_INDEX,
        VerificationKind::Recovery => RECOVERY_TOKEN_INDEX,
        VerificationKind::EmailChange => EMAIL_CHANGE_TOKEN_INDEX,
    }
}

impl StorageEntity for User {
    type Key = UserId;

    const FAMILY: &'static str = "users";
    const KEY_FIELD: &'static str = "user_id";

    fn key(&self) -> Self::Key {
        self.id.clone()
    }

    fn validate(&self) -> Result<(), DomainError> {
        let check = || -> Result<(), UserValidationError> {
            validate_user_id(self.id.as_str())?;
            validate_email(&self.email)?;
            validate_username(&self.username)?;
            validate_normalized_username(&self.username, &self.normalized_username)?;
            validate_picture(&self.picture)?;
            if !self.new_email.is_empty() {
                validate_email(&self.new_email)?;
            }
            Ok(())
        };

        check().map_err(|e| DomainError::validation(e.to_string()))
    }

    fn index_entries(&self) -> Vec<IndexEntry> {
        let mut entries = vec![
            IndexEntry::unique(
                IDENTIFIER_INDEX,
                self.normalized_username.clone(),
                self.identifier_projection(),
            ),
            IndexEntry::unique(IDENTIFIER_INDEX, self.email.clone(), self.identifier_projection()),
        ];

        for kind in [
            VerificationKind::Confirmation,
            VerificationKind::Recovery,
            VerificationKind::EmailChange,
        ] {
            let token = self.verification_token(kind);
            if !token.is_empty() {
                entries.push(IndexEntry::unique(
                    token_index(kind),
                    token,
                    self.token_projection(kind),
                ));
            }
        }

        entries
    }

    fn prepare_save(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}
