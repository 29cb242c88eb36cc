use meshwork::network::peer::PeerId;
use meshwork::network::relation::{RelationEdge, RelationTable};

fn id(s: &str) -> PeerId {
    PeerId::new(s)
}

#[test]
fn authoritative_writes_version_edges_and_the_table() {
    let mut table = RelationTable::new(id("alpha"), true);
    assert_eq!(table.state_id(), 0);

    let (edge, changed) = table.add_or_update(&id("beta"), true);
    assert!(changed);
    assert_eq!(edge.state_id, 1);
    assert!(edge.connected);
    assert_eq!(table.state_id(), 1);

    // Writing the same value again is a no-op on every counter
    let (edge, changed) = table.add_or_update(&id("beta"), true);
    assert!(!changed);
    assert_eq!(edge.state_id, 1);
    assert_eq!(table.state_id(), 1);

    // Flipping the flag bumps the edge and the aggregate
    let (edge, changed) = table.add_or_update(&id("beta"), false);
    assert!(changed);
    assert_eq!(edge.state_id, 2);
    assert!(!edge.connected);
    assert_eq!(table.state_id(), 2);
}

#[test]
fn foreign_tables_never_move_the_aggregate_version() {
    let mut table = RelationTable::new(id("beta"), false);
    let (edge, changed) = table.add_or_update(&id("gamma"), true);
    assert!(changed);
    assert_eq!(edge.state_id, 0);

    table.add_or_update(&id("gamma"), false);
    assert_eq!(table.get(&id("gamma")).unwrap().state_id, 1);
    assert_eq!(table.state_id(), 0);
}

#[test]
fn foreign_insert_yields_to_the_owners_first_declaration() {
    // A locally observed relation about a foreign owner must not outrank the
    // owner's own version-1 gossip for the same pair.
    let mut table = RelationTable::new(id("beta"), false);
    let (edge, _) = table.add_or_update(&id("gamma"), true);
    assert_eq!(edge.state_id, 0);

    assert!(table.merge_remote(&id("gamma"), false, 1));
    let merged = table.get(&id("gamma")).unwrap();
    assert!(!merged.connected);
    assert_eq!(merged.state_id, 1);
}

#[test]
fn merge_applies_only_strictly_newer_versions() {
    let mut table = RelationTable::new(id("beta"), false);

    // Absent pair inserts at the incoming version
    assert!(table.merge_remote(&id("gamma"), true, 5));
    assert_eq!(table.get(&id("gamma")).unwrap().state_id, 5);

    // Equal and stale versions are ignored idempotently
    assert!(!table.merge_remote(&id("gamma"), false, 5));
    assert!(!table.merge_remote(&id("gamma"), false, 4));
    assert!(table.get(&id("gamma")).unwrap().connected);

    // Strictly newer wins
    assert!(table.merge_remote(&id("gamma"), false, 6));
    let edge = table.get(&id("gamma")).unwrap();
    assert!(!edge.connected);
    assert_eq!(edge.state_id, 6);

    // Merges leave the aggregate alone
    assert_eq!(table.state_id(), 0);
}

#[test]
fn merge_edge_rejects_a_mismatched_owner() {
    let mut table = RelationTable::new(id("beta"), false);
    let stray = RelationEdge {
        owner: id("someone-else"),
        other: id("gamma"),
        connected: true,
        state_id: 9,
    };
    assert!(!table.merge_edge(&stray));
    assert!(table.is_empty());

    let fine = RelationEdge {
        owner: id("beta"),
        other: id("gamma"),
        connected: true,
        state_id: 9,
    };
    assert!(table.merge_edge(&fine));
    assert_eq!(table.len(), 1);
}

#[test]
fn set_offline_removes_the_edge_outright() {
    let mut table = RelationTable::new(id("alpha"), true);
    table.add_or_update(&id("beta"), true);
    table.add_or_update(&id("gamma"), true);

    assert!(table.set_offline(&id("beta")));
    assert!(table.get(&id("beta")).is_none());
    assert_eq!(table.len(), 1);

    // Removing an absent edge reports false
    assert!(!table.set_offline(&id("beta")));
}

#[test]
fn local_offline_tombstones_while_foreign_offline_clears() {
    let mut local = RelationTable::new(id("alpha"), true);
    local.add_or_update(&id("beta"), true);
    local.add_or_update(&id("gamma"), true);
    let aggregate_before = local.state_id();
    let beta_before = local.get(&id("beta")).unwrap().state_id;

    local.set_all_offline();

    // Edges survive as versioned disconnect markers
    assert_eq!(local.len(), 2);
    for edge in local.edges() {
        assert!(!edge.connected);
    }
    assert_eq!(local.get(&id("beta")).unwrap().state_id, beta_before + 1);
    // One aggregate bump for the whole sweep
    assert_eq!(local.state_id(), aggregate_before + 1);

    // A second sweep still re-stamps edges but the table already moved
    let aggregate_after = local.state_id();
    local.set_all_offline();
    assert_eq!(local.state_id(), aggregate_after + 1);

    // Foreign slice: the owner is unreachable, its beliefs are unknowable
    let mut foreign = RelationTable::new(id("beta"), false);
    foreign.merge_remote(&id("gamma"), true, 3);
    foreign.merge_remote(&id("delta"), true, 1);
    foreign.set_all_offline();
    assert!(foreign.is_empty());
    assert_eq!(foreign.state_id(), 0);
}

#[test]
fn empty_local_table_offline_sweep_leaves_the_aggregate_alone() {
    let mut table = RelationTable::new(id("alpha"), true);
    table.set_all_offline();
    assert_eq!(table.state_id(), 0);
}

#[test]
fn neighborhood_lists_connected_others_in_insertion_order() {
    let mut table = RelationTable::new(id("alpha"), true);
    table.add_or_update(&id("beta"), true);
    table.add_or_update(&id("gamma"), true);
    table.add_or_update(&id("delta"), true);
    table.add_or_update(&id("gamma"), false);

    assert_eq!(table.neighborhood(), vec![id("beta"), id("delta")]);
}
