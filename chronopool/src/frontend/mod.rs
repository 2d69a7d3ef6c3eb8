//! Query parse-tree dispatch: parsing itself is out of scope (spec §1),
//! this module only needs a `Node` tree shape to walk. `Query` carries
//! per-statement state; `dispatch::walk` drives the listener tables
//! `handlers::default_tables` builds; `merge` aggregates peer responses
//! once `state::Runtime` has fanned a forward request out.

pub mod access;
pub mod cexpr;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod gid;
pub mod handlers;
pub mod merge;
pub mod node;
pub mod query;

pub use access::{handle_from_config, UserHandle, UserRecord};
pub use cexpr::{CExpr, CValue, CmpOp, Properties};
pub use context::{LocalData, PoolSummary, SeriesIndex, SeriesRecord};
pub use dispatch::{walk, ExitAction, ForwardKind, ForwardRequest, ListenerTables};
pub use error::QueryError as Error;
pub use gid::Gid;
pub use handlers::default_tables;
pub use node::{flatten, Node, Phase, Step};
pub use query::{Entity, Query, QueryFlags, StatementState};
