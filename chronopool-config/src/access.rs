//! Access control bitset for the GRANT/REVOKE query language (spec §6).

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Permission bits a user can hold. Each statement declares the bit it
/// requires; a handler asserts `user.access & required == required`
/// (spec §4.3) before doing any work as master.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Access(u32);

impl Access {
    pub const NONE: Access = Access(0);
    pub const SELECT: Access = Access(1 << 0);
    pub const LIST: Access = Access(1 << 1);
    pub const COUNT: Access = Access(1 << 2);
    pub const DROP: Access = Access(1 << 3);
    pub const ALTER: Access = Access(1 << 4);
    pub const GRANT: Access = Access(1 << 5);
    pub const SHOW: Access = Access(1 << 6);
    /// Full access, granted to the bootstrap admin user.
    pub const ALL: Access = Access(0x7f);

    pub fn contains(&self, required: Access) -> bool {
        self.0 & required.0 == required.0
    }

    pub fn grant(&mut self, other: Access) {
        self.0 |= other.0;
    }

    pub fn revoke(&mut self, other: Access) {
        self.0 &= !other.0;
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Parse a space or comma separated list of permission names, as used
    /// by `GRANT <perms> TO USER <name>`.
    pub fn parse(s: &str) -> Result<Access, Error> {
        let mut access = Access::NONE;
        for token in s.split([',', ' ']).map(str::trim).filter(|t| !t.is_empty()) {
            let bit = match token.to_lowercase().as_str() {
                "select" => Access::SELECT,
                "list" => Access::LIST,
                "count" => Access::COUNT,
                "drop" => Access::DROP,
                "alter" => Access::ALTER,
                "grant" => Access::GRANT,
                "show" => Access::SHOW,
                "all" => Access::ALL,
                _ => return Err(Error::UnknownAccess(token.to_string())),
            };
            access.grant(bit);
        }
        Ok(access)
    }
}

impl BitOr for Access {
    type Output = Access;

    fn bitor(self, rhs: Self) -> Self::Output {
        Access(self.0 | rhs.0)
    }
}

impl BitOrAssign for Access {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Access::SELECT, "select"),
            (Access::LIST, "list"),
            (Access::COUNT, "count"),
            (Access::DROP, "drop"),
            (Access::ALTER, "alter"),
            (Access::GRANT, "grant"),
            (Access::SHOW, "show"),
        ];
        let held: Vec<&str> = names
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "{}", held.join(","))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_access_list() {
        let access = Access::parse("select, list").unwrap();
        assert!(access.contains(Access::SELECT));
        assert!(access.contains(Access::LIST));
        assert!(!access.contains(Access::DROP));
    }

    #[test]
    fn rejects_unknown_permission() {
        assert!(matches!(Access::parse("frobnicate"), Err(Error::UnknownAccess(_))));
    }

    #[test]
    fn contains_is_a_subset_check() {
        let access = Access::ALL;
        assert!(access.contains(Access::SELECT | Access::DROP));
    }
}
