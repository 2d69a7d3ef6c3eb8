//! `Query`: parsed statement plus execution state (spec §3).

use std::time::Instant;

use chronopool_config::Access;

use super::access::UserHandle;
use super::cexpr::CExpr;
use crate::backend::server::Server;
use crate::net::Packer;

/// Bits on `Query::flags` (spec §4.3: "`MASTER` flag on the Query").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryFlags(u32);

impl QueryFlags {
    pub const MASTER: QueryFlags = QueryFlags(1 << 0);

    pub fn contains(&self, other: QueryFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn set(&mut self, other: QueryFlags) {
        self.0 |= other.0;
    }

    pub fn clear(&mut self, other: QueryFlags) {
        self.0 &= !other.0;
    }
}

/// The entity kind a `list`/`count`/`drop` statement targets. `Shard`
/// only ever appears on a `Drop` statement (spec §6: `drop shard <id>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Series,
    Servers,
    Pools,
    Users,
    Shard,
}

impl Entity {
    /// The packer map key a response carries its rows/count under.
    pub fn key(self) -> &'static str {
        match self {
            Entity::Series => "series",
            Entity::Servers => "servers",
            Entity::Pools => "pools",
            Entity::Users => "users",
            Entity::Shard => "shard",
        }
    }
}

#[derive(Debug, Default)]
pub struct CountState {
    pub entity: Option<Entity>,
    pub where_expr: Option<CExpr>,
    pub count: i64,
}

#[derive(Debug, Default)]
pub struct ListState {
    pub entity: Option<Entity>,
    pub where_expr: Option<CExpr>,
    pub columns: Vec<String>,
    /// Mutable, decremented per emitted row (spec §4.3 "Limit
    /// propagation"). Initialized from the statement's `LIMIT` clause or
    /// `general.default_limit`.
    pub limit: i64,
}

#[derive(Debug, Default)]
pub struct SelectState {
    pub series_match: Option<String>,
    pub where_expr: Option<CExpr>,
    pub start_ts: Option<i64>,
    pub end_ts: Option<i64>,
}

#[derive(Debug, Default)]
pub struct DropState {
    pub entity: Option<Entity>,
    pub target: String,
}

#[derive(Debug, Default)]
pub struct AlterState {
    pub subject_name: String,
    /// Pinned while the statement executes; released by `Query::free`
    /// (spec §8 invariant 6).
    pub subject_user: Option<UserHandle>,
    pub subject_server: Option<Server>,
    pub new_password: Option<String>,
}

#[derive(Debug, Default)]
pub struct GrantState {
    pub user: String,
    pub access: Access,
    pub revoke: bool,
}

#[derive(Debug, Default)]
pub struct ShowState {
    pub props: Vec<String>,
}

#[derive(Debug)]
pub enum StatementState {
    None,
    Count(CountState),
    List(ListState),
    Select(SelectState),
    Drop(DropState),
    Alter(AlterState),
    Grant(GrantState),
    Show(ShowState),
}

impl Default for StatementState {
    fn default() -> Self {
        StatementState::None
    }
}

/// Parsed statement plus mutable execution state (spec §3).
///
/// Allocated on request receive and freed exactly once, via `free`, on
/// completion or error — `free` runs the statement's release step
/// (releasing any pinned `UserHandle`/`Server` held in `data`) before the
/// `Query` itself is dropped.
#[derive(Debug)]
pub struct Query {
    pub text: String,
    pub flags: QueryFlags,
    pub packer: Packer,
    pub timeit_packer: Option<Packer>,
    pub err_msg: Option<String>,
    pub data: StatementState,
    pub user_access: Access,
    pub started_at: Instant,
    freed: bool,
}

impl Query {
    pub fn new(text: impl Into<String>, flags: QueryFlags, user_access: Access) -> Self {
        Self {
            text: text.into(),
            flags,
            packer: Packer::new(),
            timeit_packer: None,
            err_msg: None,
            data: StatementState::None,
            user_access,
            started_at: Instant::now(),
            freed: false,
        }
    }

    pub fn is_master(&self) -> bool {
        self.flags.contains(QueryFlags::MASTER)
    }

    pub fn fail(&mut self, msg: impl Into<String>) {
        self.err_msg = Some(msg.into());
    }

    pub fn has_failed(&self) -> bool {
        self.err_msg.is_some()
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    /// Release resources pinned by this statement and mark the query
    /// freed. Idempotent: a second call is a no-op, since a client
    /// disconnect mid-query and a normal completion path can both race
    /// to free the same `Query` (spec §5: "client disconnects mid-query
    /// must free the Query exactly once").
    pub fn free(&mut self) {
        if self.freed {
            return;
        }
        self.freed = true;
        if let StatementState::Alter(alter) = &mut self.data {
            alter.subject_user = None;
            alter.subject_server = None;
        }
    }

    pub fn is_freed(&self) -> bool {
        self.freed
    }

    /// Rows remaining before a `list` statement's limit is exhausted.
    /// `i64::MAX` for any other statement kind, so merge code that calls
    /// this unconditionally never needs to match on `data` itself.
    pub fn remaining_limit(&self) -> i64 {
        match &self.data {
            StatementState::List(s) => s.limit,
            _ => i64::MAX,
        }
    }

    pub fn decrement_limit(&mut self) {
        if let StatementState::List(s) = &mut self.data {
            s.limit -= 1;
        }
    }
}

impl Drop for Query {
    fn drop(&mut self) {
        self.free();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::frontend::access::handle_from_config;
    use chronopool_config::User;
    use std::sync::Arc;

    #[test]
    fn free_releases_the_pinned_user_handle() {
        let user = User {
            name: "alice".into(),
            password: "x".into(),
            access: Access::ALL,
        };
        let handle = handle_from_config(&user);
        let mut query = Query::new("alter user alice", QueryFlags::MASTER, Access::ALL);
        query.data = StatementState::Alter(AlterState {
            subject_name: "alice".into(),
            subject_user: Some(handle.clone()),
            ..Default::default()
        });
        assert_eq!(Arc::strong_count(&handle), 2);

        query.free();
        assert_eq!(Arc::strong_count(&handle), 1);
    }

    #[test]
    fn free_is_idempotent() {
        let mut query = Query::new("show version", QueryFlags::default(), Access::ALL);
        query.free();
        query.free();
        assert!(query.is_freed());
    }

    #[test]
    fn dropping_a_query_frees_it() {
        let user = User {
            name: "bob".into(),
            password: "x".into(),
            access: Access::ALL,
        };
        let handle = handle_from_config(&user);
        {
            let mut query = Query::new("alter user bob", QueryFlags::MASTER, Access::ALL);
            query.data = StatementState::Alter(AlterState {
                subject_name: "bob".into(),
                subject_user: Some(handle.clone()),
                ..Default::default()
            });
        }
        assert_eq!(Arc::strong_count(&handle), 1);
    }
}
