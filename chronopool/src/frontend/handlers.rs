//! Concrete enter/exit handlers for every statement kind (spec §6 query
//! language, §4.3 dispatch). `default_tables` wires all of them into the
//! `ListenerTables` `state::Runtime` drives a walk with.
//!
//! Access checks only apply when `query.is_master()` — a forwarded
//! statement running on behalf of a peer's master has already been
//! authorized there (spec §4.3: "the access check runs once, at the
//! master").

use std::collections::HashMap;

use chronopool_config::Access;

use super::cexpr::{CExpr, CValue, Properties};
use super::context::LocalData;
use super::dispatch::{ExitAction, ForwardKind, ListenerTables};
use super::error::QueryError;
use super::gid::Gid;
use super::node::Node;
use super::query::{
    AlterState, CountState, DropState, Entity, GrantState, ListState, Query, SelectState,
    ShowState, StatementState,
};

fn require_access(query: &Query, required: Access) -> Result<(), QueryError> {
    if !query.is_master() {
        return Ok(());
    }
    if !query.user_access.contains(required) {
        return Err(QueryError::AccessDenied(required.to_string()));
    }
    Ok(())
}

fn series_props(name: &str) -> HashMap<String, CValue> {
    let mut props = HashMap::new();
    props.insert("name".to_string(), CValue::Str(name.to_string()));
    props
}

fn server_props(server: &crate::backend::server::Server) -> HashMap<String, CValue> {
    let mut props = HashMap::new();
    props.insert("name".to_string(), CValue::Str(server.name().to_string()));
    props.insert("pool".to_string(), CValue::Int(server.pool() as i64));
    props.insert(
        "connected".to_string(),
        CValue::Int(server.is_connected() as i64),
    );
    props.insert(
        "authenticated".to_string(),
        CValue::Int(server.is_authenticated() as i64),
    );
    props
}

// --- statement entry points -------------------------------------------------

fn enter_list_stmt(query: &mut Query, local: &LocalData, _node: &Node) -> Result<(), QueryError> {
    require_access(query, Access::LIST)?;
    query.data = StatementState::List(ListState {
        limit: local.default_limit as i64,
        ..Default::default()
    });
    query.packer.map_open();
    Ok(())
}

fn enter_count_stmt(query: &mut Query, _local: &LocalData, _node: &Node) -> Result<(), QueryError> {
    require_access(query, Access::COUNT)?;
    query.data = StatementState::Count(CountState::default());
    query.packer.map_open();
    Ok(())
}

fn enter_select_stmt(query: &mut Query, _local: &LocalData, _node: &Node) -> Result<(), QueryError> {
    require_access(query, Access::SELECT)?;
    query.data = StatementState::Select(SelectState::default());
    query.packer.map_open();
    Ok(())
}

fn enter_drop_stmt(query: &mut Query, _local: &LocalData, _node: &Node) -> Result<(), QueryError> {
    require_access(query, Access::DROP)?;
    query.data = StatementState::Drop(DropState::default());
    query.packer.map_open();
    Ok(())
}

fn enter_alter_stmt(query: &mut Query, _local: &LocalData, _node: &Node) -> Result<(), QueryError> {
    require_access(query, Access::ALTER)?;
    query.data = StatementState::Alter(AlterState::default());
    query.packer.map_open();
    Ok(())
}

fn enter_grant_stmt(query: &mut Query, _local: &LocalData, _node: &Node) -> Result<(), QueryError> {
    require_access(query, Access::GRANT)?;
    query.data = StatementState::Grant(GrantState::default());
    query.packer.map_open();
    Ok(())
}

fn enter_revoke_stmt(query: &mut Query, _local: &LocalData, _node: &Node) -> Result<(), QueryError> {
    require_access(query, Access::GRANT)?;
    query.data = StatementState::Grant(GrantState {
        revoke: true,
        ..Default::default()
    });
    query.packer.map_open();
    Ok(())
}

fn enter_show_stmt(query: &mut Query, _local: &LocalData, _node: &Node) -> Result<(), QueryError> {
    require_access(query, Access::SHOW)?;
    query.data = StatementState::Show(ShowState::default());
    query.packer.map_open();
    Ok(())
}

fn enter_timeit_stmt(query: &mut Query, _local: &LocalData, _node: &Node) -> Result<(), QueryError> {
    query.data = StatementState::None;
    Ok(())
}

// --- entity/target leaves ----------------------------------------------------

fn set_entity(query: &mut Query, entity: Entity) {
    match &mut query.data {
        StatementState::List(s) => s.entity = Some(entity),
        StatementState::Count(s) => s.entity = Some(entity),
        StatementState::Drop(s) => s.entity = Some(entity),
        _ => {}
    }
}

fn enter_entity_series(query: &mut Query, _local: &LocalData, _node: &Node) -> Result<(), QueryError> {
    set_entity(query, Entity::Series);
    Ok(())
}

fn enter_entity_servers(query: &mut Query, _local: &LocalData, _node: &Node) -> Result<(), QueryError> {
    set_entity(query, Entity::Servers);
    Ok(())
}

fn enter_entity_pools(query: &mut Query, _local: &LocalData, _node: &Node) -> Result<(), QueryError> {
    set_entity(query, Entity::Pools);
    Ok(())
}

fn enter_entity_users(query: &mut Query, _local: &LocalData, _node: &Node) -> Result<(), QueryError> {
    set_entity(query, Entity::Users);
    Ok(())
}

fn enter_entity_shard(query: &mut Query, _local: &LocalData, _node: &Node) -> Result<(), QueryError> {
    set_entity(query, Entity::Shard);
    Ok(())
}

fn enter_drop_target(query: &mut Query, _local: &LocalData, node: &Node) -> Result<(), QueryError> {
    if let StatementState::Drop(s) = &mut query.data {
        s.target = node
            .text
            .clone()
            .ok_or_else(|| QueryError::Malformed("drop target has no text".into()))?;
    }
    Ok(())
}

fn enter_columns(query: &mut Query, _local: &LocalData, node: &Node) -> Result<(), QueryError> {
    let names: Vec<String> = node.children.iter().filter_map(|c| c.text.clone()).collect();
    query.packer.push_str("columns");
    query.packer.array_open();
    for name in &names {
        query.packer.push_str(name);
    }
    query.packer.array_close();
    if let StatementState::List(s) = &mut query.data {
        s.columns = names;
    }
    Ok(())
}

fn enter_limit(query: &mut Query, _local: &LocalData, node: &Node) -> Result<(), QueryError> {
    let n: i64 = node
        .text
        .as_deref()
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| QueryError::Malformed("limit is not a number".into()))?;
    if n <= 0 {
        return Err(QueryError::NonPositiveLimit);
    }
    if let StatementState::List(s) = &mut query.data {
        s.limit = n;
    }
    Ok(())
}

fn enter_series_match(query: &mut Query, _local: &LocalData, node: &Node) -> Result<(), QueryError> {
    if let StatementState::Select(s) = &mut query.data {
        s.series_match = node.text.clone();
    }
    Ok(())
}

fn enter_where_expr(query: &mut Query, local: &LocalData, node: &Node) -> Result<(), QueryError> {
    let child = node
        .children
        .first()
        .ok_or_else(|| QueryError::Malformed("where expression is empty".into()))?;
    let expr = CExpr::compile(child, local.where_depth_limit)?;
    match &mut query.data {
        StatementState::List(s) => s.where_expr = Some(expr),
        StatementState::Count(s) => s.where_expr = Some(expr),
        StatementState::Select(s) => s.where_expr = Some(expr),
        _ => {}
    }
    Ok(())
}

fn enter_alter_user_target(query: &mut Query, local: &LocalData, node: &Node) -> Result<(), QueryError> {
    let name = node
        .text
        .clone()
        .ok_or_else(|| QueryError::Malformed("alter user target has no name".into()))?;
    let handle = local
        .find_user(&name)
        .ok_or_else(|| QueryError::NotFound(format!("user \"{name}\"")))?;
    if let StatementState::Alter(s) = &mut query.data {
        s.subject_name = name;
        s.subject_user = Some(handle);
    }
    Ok(())
}

fn enter_alter_server_target(query: &mut Query, local: &LocalData, node: &Node) -> Result<(), QueryError> {
    let name = node
        .text
        .clone()
        .ok_or_else(|| QueryError::Malformed("alter server target has no name".into()))?;
    let server = local
        .find_server(&name)
        .cloned()
        .ok_or_else(|| QueryError::NotFound(format!("server \"{name}\"")))?;
    if let StatementState::Alter(s) = &mut query.data {
        s.subject_name = name;
        s.subject_server = Some(server);
    }
    Ok(())
}

fn enter_new_password(query: &mut Query, _local: &LocalData, node: &Node) -> Result<(), QueryError> {
    if let StatementState::Alter(s) = &mut query.data {
        s.new_password = node.text.clone();
    }
    Ok(())
}

fn enter_grant_user_target(query: &mut Query, _local: &LocalData, node: &Node) -> Result<(), QueryError> {
    if let StatementState::Grant(s) = &mut query.data {
        s.user = node.text.clone().unwrap_or_default();
    }
    Ok(())
}

fn enter_access_item(query: &mut Query, _local: &LocalData, node: &Node) -> Result<(), QueryError> {
    let name = node
        .text
        .as_deref()
        .ok_or_else(|| QueryError::Malformed("access item has no text".into()))?;
    let bit = Access::parse(name)?;
    if let StatementState::Grant(s) = &mut query.data {
        s.access |= bit;
    }
    Ok(())
}

fn enter_show_prop(query: &mut Query, _local: &LocalData, node: &Node) -> Result<(), QueryError> {
    if let StatementState::Show(s) = &mut query.data {
        if let Some(name) = &node.text {
            s.props.push(name.clone());
        }
    }
    Ok(())
}

// --- statement exit points: local execution, finalize or forward -----------

fn count_local(entity: Entity, local: &LocalData, where_expr: &Option<CExpr>) -> i64 {
    match entity {
        Entity::Series => {
            let series = local.series.lock();
            match where_expr {
                Some(expr) => series
                    .iter()
                    .filter(|s| expr.eval(&series_props(&s.name) as &dyn Properties))
                    .count() as i64,
                None => series.len() as i64,
            }
        }
        Entity::Servers => match where_expr {
            Some(expr) => local
                .servers
                .iter()
                .filter(|s| expr.eval(&server_props(s) as &dyn Properties))
                .count() as i64,
            None => local.servers.len() as i64,
        },
        Entity::Pools => local.pools.len() as i64,
        Entity::Users => local.users.len() as i64,
        Entity::Shard => 0,
    }
}

fn exit_count_stmt(query: &mut Query, local: &LocalData, _node: &Node) -> Result<ExitAction, QueryError> {
    let (entity, where_expr) = match &query.data {
        StatementState::Count(s) => (
            s.entity.ok_or_else(|| QueryError::Malformed("count statement has no entity".into()))?,
            s.where_expr.clone(),
        ),
        _ => return Ok(ExitAction::Continue),
    };

    let local_count = count_local(entity, local, &where_expr);
    if let StatementState::Count(s) = &mut query.data {
        s.count = local_count;
    }

    // `series` is partitioned across pools (spec S2); a cluster-wide
    // count always needs every pool's contribution. `servers`/`pools`
    // are full cluster topology, already known everywhere, except when
    // a predicate needs evaluating against a remote server's live state.
    let needs_forward = query.is_master()
        && matches!(
            (entity, where_expr.is_some()),
            (Entity::Series, _) | (Entity::Servers, true)
        );

    if needs_forward {
        let mut pkg = crate::net::Packer::new();
        pkg.push_str(entity.key());
        return Ok(ExitAction::Forward {
            pkg: pkg.into_bytes().to_vec(),
            kind: ForwardKind::CountEntity(entity),
        });
    }

    query.packer.push_str(entity.key());
    query.packer.push_int(local_count);
    query.packer.map_close();
    Ok(ExitAction::Continue)
}

fn emit_list_row(packer: &mut crate::net::Packer, name: &str) {
    packer.arrayn(1);
    packer.push_str(name);
}

fn exit_list_stmt(query: &mut Query, local: &LocalData, _node: &Node) -> Result<ExitAction, QueryError> {
    let (entity, where_expr) = match &query.data {
        StatementState::List(s) => (
            s.entity.ok_or_else(|| QueryError::Malformed("list statement has no entity".into()))?,
            s.where_expr.clone(),
        ),
        _ => return Ok(ExitAction::Continue),
    };

    query.packer.push_str(entity.key());
    query.packer.array_open();

    match entity {
        Entity::Series => {
            let series = local.series.lock();
            for record in series.iter() {
                if query.remaining_limit() <= 0 {
                    break;
                }
                if let Some(expr) = &where_expr {
                    if !expr.eval(&series_props(&record.name) as &dyn Properties) {
                        continue;
                    }
                }
                emit_list_row(&mut query.packer, &record.name);
                query.decrement_limit();
            }
        }
        Entity::Servers => {
            for server in &local.servers {
                if query.remaining_limit() <= 0 {
                    break;
                }
                if let Some(expr) = &where_expr {
                    if !expr.eval(&server_props(server) as &dyn Properties) {
                        continue;
                    }
                }
                emit_list_row(&mut query.packer, server.name());
                query.decrement_limit();
            }
        }
        Entity::Pools => {
            for pool in &local.pools {
                if query.remaining_limit() <= 0 {
                    break;
                }
                query.packer.arrayn(1);
                query.packer.push_int(pool.id as i64);
                query.decrement_limit();
            }
        }
        Entity::Users => {
            for user in &local.users {
                if query.remaining_limit() <= 0 {
                    break;
                }
                emit_list_row(&mut query.packer, &user.name);
                query.decrement_limit();
            }
        }
        Entity::Shard => {}
    }

    // Series is the only partitioned entity (spec S1/S2): the others
    // are full cluster topology, already complete locally.
    let needs_forward = query.is_master() && entity == Entity::Series && query.remaining_limit() > 0;

    if needs_forward {
        let mut pkg = crate::net::Packer::new();
        pkg.push_str(entity.key());
        return Ok(ExitAction::Forward {
            pkg: pkg.into_bytes().to_vec(),
            kind: ForwardKind::ListEntity(entity),
        });
    }

    query.packer.array_close();
    query.packer.map_close();
    Ok(ExitAction::Continue)
}

fn exit_select_stmt(query: &mut Query, local: &LocalData, _node: &Node) -> Result<ExitAction, QueryError> {
    let series_match = match &query.data {
        StatementState::Select(s) => s.series_match.clone(),
        _ => return Ok(ExitAction::Continue),
    };
    let pattern = series_match.ok_or_else(|| QueryError::Malformed("select has no series match".into()))?;

    query.packer.push_str("points");
    query.packer.map_open();
    {
        let series = local.series.lock();
        for record in series.iter().filter(|s| s.name == pattern) {
            query.packer.push_str(&record.name);
            // Point storage lives in the on-disk shard engine, out of
            // scope here (spec §1) — an empty array is the correctly
            // shaped placeholder for "no points resolved".
            query.packer.array_open();
            query.packer.array_close();
        }
    }
    query.packer.map_close();
    query.packer.map_close();
    Ok(ExitAction::Continue)
}

fn exit_drop_stmt(query: &mut Query, local: &LocalData, _node: &Node) -> Result<ExitAction, QueryError> {
    let (entity, target) = match &query.data {
        StatementState::Drop(s) => (s.entity, s.target.clone()),
        _ => return Ok(ExitAction::Continue),
    };
    let entity = entity.ok_or_else(|| QueryError::Malformed("drop statement has no target entity".into()))?;

    // Dropping is idempotent across the cluster (spec S3: dropping a
    // shard a node doesn't hold is still a success) — no local state
    // change is required for that to hold.
    let label = match entity {
        Entity::Shard => "Shard",
        Entity::Series => {
            local.series.lock().retain(|s| s.name != target);
            "Series"
        }
        Entity::Users => "User",
        Entity::Servers | Entity::Pools => {
            return Err(QueryError::Malformed("drop does not support this entity".into()))
        }
    };

    query.packer.push_str("success_msg");
    query
        .packer
        .push_str(&format!("{label} '{target}' is dropped successfully."));
    query.packer.map_close();
    Ok(ExitAction::Continue)
}

fn exit_alter_stmt(query: &mut Query, _local: &LocalData, _node: &Node) -> Result<ExitAction, QueryError> {
    let subject = match &query.data {
        StatementState::Alter(s) => s.subject_name.clone(),
        _ => return Ok(ExitAction::Continue),
    };
    // Password/server-property mutation lands in the externally owned
    // user/auth store and server registry (spec §1 non-goals); this
    // subsystem's job ends at resolving and pinning the subject.
    query.packer.push_str("success_msg");
    query.packer.push_str(&format!("'{subject}' altered successfully."));
    query.packer.map_close();
    Ok(ExitAction::Continue)
}

fn exit_grant_stmt(query: &mut Query, _local: &LocalData, _node: &Node) -> Result<ExitAction, QueryError> {
    finish_grant(query, "granted")
}

fn exit_revoke_stmt(query: &mut Query, _local: &LocalData, _node: &Node) -> Result<ExitAction, QueryError> {
    finish_grant(query, "revoked")
}

fn finish_grant(query: &mut Query, verb: &str) -> Result<ExitAction, QueryError> {
    let user = match &query.data {
        StatementState::Grant(s) => s.user.clone(),
        _ => return Ok(ExitAction::Continue),
    };
    query.packer.push_str("success_msg");
    query.packer.push_str(&format!("access {verb} for user '{user}'."));
    query.packer.map_close();
    Ok(ExitAction::Continue)
}

fn exit_show_stmt(query: &mut Query, local: &LocalData, _node: &Node) -> Result<ExitAction, QueryError> {
    let props = match &query.data {
        StatementState::Show(s) if !s.props.is_empty() => s.props.clone(),
        _ => vec!["version".into(), "uptime".into()],
    };

    for prop in &props {
        match prop.as_str() {
            "version" => {
                query.packer.push_str("version");
                query.packer.push_str(env!("CARGO_PKG_VERSION"));
            }
            "uptime" => {
                query.packer.push_str("uptime");
                query.packer.push_double(local.started_at.elapsed().as_secs_f64());
            }
            other => {
                query.packer.push_str(other);
                query.packer.push_str("unknown");
            }
        }
    }
    query.packer.map_close();
    Ok(ExitAction::Continue)
}

fn exit_timeit_stmt(query: &mut Query, local: &LocalData, _node: &Node) -> Result<ExitAction, QueryError> {
    query.packer.mapn(2);
    query.packer.push_str("server");
    query.packer.push_str(&local.local_server_name);
    query.packer.push_str("elapsed_seconds");
    query.packer.push_double(query.elapsed().as_secs_f64());
    Ok(ExitAction::Continue)
}

/// Build the full listener table `state::Runtime` drives a walk with.
pub fn default_tables() -> ListenerTables {
    ListenerTables::new()
        .on_enter(Gid::ListStmt, enter_list_stmt)
        .on_enter(Gid::CountStmt, enter_count_stmt)
        .on_enter(Gid::SelectStmt, enter_select_stmt)
        .on_enter(Gid::DropStmt, enter_drop_stmt)
        .on_enter(Gid::AlterStmt, enter_alter_stmt)
        .on_enter(Gid::GrantStmt, enter_grant_stmt)
        .on_enter(Gid::RevokeStmt, enter_revoke_stmt)
        .on_enter(Gid::ShowStmt, enter_show_stmt)
        .on_enter(Gid::TimeitStmt, enter_timeit_stmt)
        .on_enter(Gid::EntitySeries, enter_entity_series)
        .on_enter(Gid::EntityServers, enter_entity_servers)
        .on_enter(Gid::EntityPools, enter_entity_pools)
        .on_enter(Gid::EntityUsers, enter_entity_users)
        .on_enter(Gid::EntityShard, enter_entity_shard)
        .on_enter(Gid::DropTarget, enter_drop_target)
        .on_enter(Gid::Columns, enter_columns)
        .on_enter(Gid::Limit, enter_limit)
        .on_enter(Gid::SeriesMatch, enter_series_match)
        .on_enter(Gid::WhereExpr, enter_where_expr)
        .on_enter(Gid::AlterUserTarget, enter_alter_user_target)
        .on_enter(Gid::AlterServerTarget, enter_alter_server_target)
        .on_enter(Gid::NewPassword, enter_new_password)
        .on_enter(Gid::GrantUserTarget, enter_grant_user_target)
        .on_enter(Gid::AccessItem, enter_access_item)
        .on_enter(Gid::ShowProp, enter_show_prop)
        .on_exit(Gid::CountStmt, exit_count_stmt)
        .on_exit(Gid::ListStmt, exit_list_stmt)
        .on_exit(Gid::SelectStmt, exit_select_stmt)
        .on_exit(Gid::DropStmt, exit_drop_stmt)
        .on_exit(Gid::AlterStmt, exit_alter_stmt)
        .on_exit(Gid::GrantStmt, exit_grant_stmt)
        .on_exit(Gid::RevokeStmt, exit_revoke_stmt)
        .on_exit(Gid::ShowStmt, exit_show_stmt)
        .on_exit(Gid::TimeitStmt, exit_timeit_stmt)
}
