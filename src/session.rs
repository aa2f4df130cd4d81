//! Login credentials and the authenticated session they produce.

use std::fmt;

/// Username and password used once for login.
///
/// Consumed by [`crate::Client::login`]; never stored by the client.
#[derive(Clone)]
pub struct Credentials {
    pub(crate) username: String,
    pub(crate) password: String,
}

impl Credentials {
    /// Creates credentials for a single login attempt.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// The login name.
    pub fn username(&self) -> &str {
        &self.username
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Authorization tier returned at login.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    /// A regular account: own files only.
    User,
    /// An administrator: user management and backups.
    Admin,
    /// Any role string the client does not recognise, kept verbatim.
    Unknown(String),
}

impl Role {
    /// Parses the role string sent by the server.
    ///
    /// ```
    /// use filexchange::Role;
    ///
    /// assert_eq!(Role::from_wire("admin"), Role::Admin);
    /// assert_eq!(Role::from_wire("auditor"), Role::Unknown("auditor".to_string()));
    /// ```
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "user" => Role::User,
            "admin" => Role::Admin,
            other => Role::Unknown(other.to_string()),
        }
    }

    /// The role string as the server spells it.
    pub fn as_str(&self) -> &str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Unknown(raw) => raw,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bearer token and role obtained from a successful login.
///
/// Immutable once created. Pass it by reference into every authenticated
/// operation; share it across tasks by cloning or wrapping in an `Arc`.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
    role: Role,
}

impl Session {
    /// Creates a session from a token and role.
    pub fn new(token: impl Into<String>, role: Role) -> Self {
        Self {
            token: token.into(),
            role,
        }
    }

    /// The opaque bearer token sent as `token_api`.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// The authorization tier.
    pub fn role(&self) -> &Role {
        &self.role
    }

    /// Returns `true` for administrator sessions.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"[REDACTED]")
            .field("role", &self.role)
            .finish()
    }
}
