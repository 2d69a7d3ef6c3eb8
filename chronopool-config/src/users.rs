use serde::{Deserialize, Serialize};

use crate::access::Access;

/// User allowed to connect and issue queries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub name: String,
    pub password: String,
    #[serde(default)]
    pub access: Access,
}

/// `users.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Users {
    pub users: Vec<User>,
}

impl Users {
    pub fn find(&self, name: &str) -> Option<&User> {
        self.users.iter().find(|u| u.name == name)
    }
}
