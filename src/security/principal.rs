//! Authenticated identities.

use serde::{Deserialize, Serialize};

/// Who a request acts as, as resolved by the auth cache or key directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Owning account login.
    pub account: String,
    /// Sub-user login, when the caller is not the account itself.
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    /// Actions granted to a sub-user through its roles.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Operators may act on any account.
    #[serde(default)]
    pub operator: bool,
}

impl Principal {
    pub fn account(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            user: None,
            roles: Vec::new(),
            capabilities: Vec::new(),
            operator: false,
        }
    }

    pub fn caller(&self) -> String {
        match &self.user {
            Some(user) => format!("{}/{}", self.account, user),
            None => self.account.clone(),
        }
    }

    pub fn is_sub_user(&self) -> bool {
        self.user.is_some()
    }

    pub fn can(&self, action: &str) -> bool {
        self.capabilities.iter().any(|c| c == action || c == "*")
    }
}
