use meshwork::config::{NodeConfig, OverlayConfig};
use meshwork::utils::to_kebab_ascii as kebab;

#[test]
fn kebab_basic_ascii() {
    assert_eq!(kebab("My Alpha Net"), "my-alpha-net");
    assert_eq!(kebab("hello_world"), "hello-world");
    assert_eq!(kebab("Foo-Bar"), "foo-bar");
}

#[test]
fn kebab_collapses_and_trims() {
    assert_eq!(kebab("--Hello__World--"), "hello-world");
    assert_eq!(kebab("  A   B  C  "), "a-b-c");
}

#[test]
fn kebab_transliterates_non_ascii() {
    assert_eq!(kebab("Déjà Vu!"), "deja-vu");
    assert_eq!(kebab("Smörgåsbord"), "smorgasbord");
    assert_eq!(kebab(""), "default");
}

#[test]
fn toml_parses_partial_tables() {
    let config = OverlayConfig::from_toml_str(
        r#"
        [node]
        id = "node-7"
        host = "node7.example"
        context = "Ops Net"

        [delivery]
        pool_workers = 4
        "#,
    )
    .unwrap();

    let node = config.node.as_ref().unwrap();
    assert_eq!(node.id.as_deref(), Some("node-7"));
    assert_eq!(node.host.as_deref(), Some("node7.example"));

    let delivery = config.delivery.as_ref().unwrap();
    assert_eq!(delivery.pool_workers, Some(4));
    assert_eq!(delivery.pool_capacity, None);
    assert!(config.logging.is_none());

    let descriptor = node.descriptor();
    assert_eq!(descriptor.id.as_str(), "node-7");
    assert_eq!(descriptor.context.canonical_code(), "ops-net");
}

#[test]
fn empty_toml_yields_all_optional_sections() {
    let config = OverlayConfig::from_toml_str("").unwrap();
    assert!(config.node.is_none());
    assert!(config.delivery.is_none());
    assert!(config.logging.is_none());
}

#[test]
fn invalid_toml_is_an_error() {
    assert!(OverlayConfig::from_toml_str("[node\nid = ").is_err());
}

#[test]
fn explicit_node_id_wins() {
    let config = NodeConfig {
        id: Some("configured-id".into()),
        ..NodeConfig::default()
    };
    assert_eq!(config.resolve_node_id(), "configured-id");
}

#[test]
fn invalid_explicit_id_falls_back_to_generation() {
    let dir = tempfile::tempdir().unwrap();
    let config = NodeConfig {
        id: Some("bad id with spaces".into()),
        state_dir: Some(dir.path().to_string_lossy().into_owned()),
        ..NodeConfig::default()
    };
    let resolved = config.resolve_node_id();
    assert_ne!(resolved, "bad id with spaces");
    assert!(!resolved.is_empty());
}

#[test]
fn persisted_id_survives_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let config = NodeConfig {
        state_dir: Some(dir.path().to_string_lossy().into_owned()),
        ..NodeConfig::default()
    };

    let first = config.resolve_node_id();
    // The generated id lands in the state dir and wins the next resolution.
    let on_disk = std::fs::read_to_string(dir.path().join("node_id")).unwrap();
    assert_eq!(on_disk.trim(), first);
    assert_eq!(config.resolve_node_id(), first);
}

#[test]
fn corrupt_id_file_regenerates() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("node_id"), "not\tvalid\nat all").unwrap();
    let config = NodeConfig {
        state_dir: Some(dir.path().to_string_lossy().into_owned()),
        ..NodeConfig::default()
    };
    let resolved = config.resolve_node_id();
    assert_ne!(resolved, "not\tvalid\nat all");
    let on_disk = std::fs::read_to_string(dir.path().join("node_id")).unwrap();
    assert_eq!(on_disk.trim(), resolved);
}

#[test]
fn default_descriptor_is_localhost_in_the_default_context() {
    let dir = tempfile::tempdir().unwrap();
    let config = NodeConfig {
        state_dir: Some(dir.path().to_string_lossy().into_owned()),
        ..NodeConfig::default()
    };
    let descriptor = config.descriptor();
    assert_eq!(descriptor.host, "localhost");
    assert_eq!(descriptor.context.canonical_code(), "default");
    assert_eq!(descriptor.distance, 1);
    assert!(!descriptor.black_hole);
    assert!(descriptor.servers.is_empty() && descriptor.gateways.is_empty());
}
