//! Grammar-id: a small stable tag identifying a parse-tree node's
//! grammar rule (spec §4.3, glossary "GID"). The parser that assigns
//! these is out of scope (spec §1); this crate only needs a stable
//! enum to key the listener dispatch tables on. Keying the tables on a
//! typed enum rather than a raw integer index is a deliberate REDESIGN,
//! noted in `DESIGN.md`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gid {
    // Statements (spec §6 query language).
    ListStmt,
    CountStmt,
    SelectStmt,
    DropStmt,
    AlterStmt,
    GrantStmt,
    RevokeStmt,
    ShowStmt,
    TimeitStmt,

    // Statement sub-nodes.
    Columns,
    Column,
    Limit,
    SeriesMatch,
    DropTarget,
    AlterUserTarget,
    AlterServerTarget,
    NewPassword,
    GrantUserTarget,
    AccessExpr,
    AccessItem,
    ShowProp,

    // `WHERE` expression: `WhereExpr` wraps the compiled-subtree root
    // (one of the other `Where*` variants).
    WhereExpr,
    WhereAnd,
    WhereOr,
    WhereNot,
    WhereCmp,

    // The entity kind a `list`/`count`/`drop` targets.
    EntitySeries,
    EntityServers,
    EntityPools,
    EntityUsers,
    EntityShard,
}
