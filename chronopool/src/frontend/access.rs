//! Shared, reference-counted user records, pinned by in-flight queries
//! the same way remote `Server` records are (spec §3: "remote records
//! are shared... because they may be pinned by in-flight promises" — the
//! same reasoning applies to a user resolved by `alter_user`/`grant`
//! while other connections may be looking it up concurrently).

use std::sync::Arc;

use chronopool_config::{Access, User};

#[derive(Debug)]
pub struct UserRecord {
    pub name: String,
    pub access: Access,
}

/// A pinned handle to a user record. Cloning increments the `Arc`
/// strong count — the Rust-idiomatic incref; dropping the last clone
/// decrements it, the decref. `enter alter_user`/`enter grant_stmt`
/// clone one of these into `query.data` and the query's free callback
/// drops it (spec §8 invariant 6: refcount balance on every path).
pub type UserHandle = Arc<UserRecord>;

pub fn handle_from_config(user: &User) -> UserHandle {
    Arc::new(UserRecord {
        name: user.name.clone(),
        access: user.access,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cloning_a_handle_increments_the_refcount() {
        let user = User {
            name: "alice".into(),
            password: "x".into(),
            access: Access::ALL,
        };
        let handle = handle_from_config(&user);
        assert_eq!(Arc::strong_count(&handle), 1);

        let pinned = handle.clone();
        assert_eq!(Arc::strong_count(&handle), 2);

        drop(pinned);
        assert_eq!(Arc::strong_count(&handle), 1);
    }
}
