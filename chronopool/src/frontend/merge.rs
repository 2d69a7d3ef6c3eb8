//! Aggregate callbacks a `PromiseSet` invokes once every peer pool has
//! answered (spec §4.4). Each one knows the shape of exactly one kind of
//! response and nothing about promises, timeouts or transport — those
//! live in `backend::promise` and `state::Runtime`.

use crate::net::{Unpacker, Value};

use super::query::Query;

/// Extend `query.packer`'s already-open `<entity>` array with a peer's
/// rows, honoring the statement's remaining limit, and collect the
/// peer's `__timeit__` sub-object if it sent one.
///
/// `peer_body` is shaped `{map, columns: [...], <entity_key>: [[...],
/// ...], __timeit__?: {...}}`; `columns` is skipped here since it was
/// already emitted locally.
pub fn on_list_response(query: &mut Query, entity_key: &str, peer_body: &[u8]) -> Vec<Value> {
    let mut timeit = Vec::new();

    let mut unpacker = Unpacker::new(peer_body);
    let Ok(value) = unpacker.parse_value() else {
        // A malformed peer response contributes nothing; the statement
        // still succeeds with whatever other pools returned.
        return timeit;
    };
    let Some(map) = value.as_map() else {
        return timeit;
    };

    if let Some(rows) = map.get(entity_key).and_then(Value::as_array) {
        for row in rows {
            if query.remaining_limit() <= 0 {
                break;
            }
            query.packer.push_value(row);
            query.decrement_limit();
        }
    }

    if let Some(entry) = map.get("__timeit__") {
        timeit.push(entry.clone());
    }

    timeit
}

/// Sum one peer's `{<entity_key>: <int>}` response into a running total
/// (spec §4.4 `on_count_servers_response`, generalized to any counted
/// entity — see S2: `count series` merges the same way).
pub fn on_count_response(peer_body: &[u8], entity_key: &str) -> i64 {
    let mut unpacker = Unpacker::new(peer_body);
    let Ok(value) = unpacker.parse_value() else {
        return 0;
    };
    value.as_map().and_then(|m| m.get(entity_key)).and_then(Value::as_int).unwrap_or(0)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::frontend::query::{ListState, QueryFlags, StatementState};
    use crate::net::Packer;
    use chronopool_config::Access;

    fn peer_list_body(rows: &[&str]) -> Vec<u8> {
        let mut p = Packer::new();
        p.map_open();
        p.push_str("columns");
        p.array_open();
        p.push_str("name");
        p.array_close();
        p.push_str("series");
        p.array_open();
        for r in rows {
            p.arrayn(1);
            p.push_str(r);
        }
        p.array_close();
        p.map_close();
        p.into_bytes().to_vec()
    }

    #[test]
    fn merges_rows_until_the_limit_is_exhausted() {
        let mut query = Query::new("list series", QueryFlags::MASTER, Access::ALL);
        query.data = StatementState::List(ListState {
            limit: 1,
            ..Default::default()
        });
        query.packer.array_open();

        let body = peer_list_body(&["a", "b", "c"]);
        let timeit = on_list_response(&mut query, "series", &body);

        assert!(timeit.is_empty());
        assert_eq!(query.remaining_limit(), 0);
    }

    #[test]
    fn extracts_the_optional_timeit_entry() {
        let mut query = Query::new("list series", QueryFlags::MASTER, Access::ALL);
        query.data = StatementState::List(ListState {
            limit: 100,
            ..Default::default()
        });
        query.packer.array_open();

        let mut p = Packer::new();
        p.map_open();
        p.push_str("columns");
        p.array_open().array_close();
        p.push_str("series");
        p.array_open().array_close();
        p.push_str("__timeit__");
        p.mapn(2);
        p.push_str("server");
        p.push_str("s1");
        p.push_str("elapsed_seconds");
        p.push_double(0.01);
        p.map_close();
        let body = p.into_bytes();

        let timeit = on_list_response(&mut query, "series", &body);
        assert_eq!(timeit.len(), 1);
        assert_eq!(timeit[0].as_map().unwrap().get("server").unwrap().as_str(), Some("s1"));
    }

    #[test]
    fn sums_peer_counts() {
        let mut p = Packer::new();
        p.mapn(1);
        p.push_str("series");
        p.push_int(7);
        let body = p.into_bytes();

        assert_eq!(on_count_response(&body, "series"), 7);
    }

    #[test]
    fn malformed_peer_body_contributes_nothing() {
        assert_eq!(on_count_response(&[0xff], "series"), 0);
    }
}
