use std::collections::HashMap;

use keyv::{Keyv, KeyvError, Result};
use serde::{Deserialize, Serialize};

/// Opens `namespace` on the in-memory store `name`. Each test uses its
/// own store name so tests do not see each other's data.
fn open(name: &str, namespace: &str) -> Keyv {
    keyv::register_builtin_adapters();
    Keyv::new(&format!("mem://{}", name), namespace).expect("mem adapter is registered")
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Profile {
    name: String,
    age: u32,
    tags: Vec<String>,
}

#[test]
fn counter_scenario() -> Result<()> {
    let k1 = open("scenario", "");
    assert_eq!(k1.namespace(), "default");

    k1.set("count", &3)?;
    assert_eq!(k1.get_int("count")?, 3);

    let k2 = open("scenario", "other");
    assert!(!k2.has("count"));

    k1.clear()?;
    assert!(!k1.has("count"));
    Ok(())
}

#[test]
fn accessors_describe_connection() {
    let store = open("accessors", "settings");
    assert_eq!(store.adapter_name(), "mem");
    assert_eq!(store.uri(), "mem://accessors");
    assert_eq!(store.namespace(), "settings");
}

#[test]
fn structured_values_round_trip() -> Result<()> {
    let store = open("round-trip", "profiles");
    let profile = Profile {
        name: "Ada".to_owned(),
        age: 36,
        tags: vec!["math".to_owned(), "engines".to_owned()],
    };

    store.set("ada", &profile)?;
    assert_eq!(store.get::<Profile>("ada")?, profile);

    let mut dest = Profile {
        name: String::new(),
        age: 0,
        tags: Vec::new(),
    };
    store.get_into("ada", &mut dest)?;
    assert_eq!(dest, profile);
    Ok(())
}

#[test]
fn typed_getters() -> Result<()> {
    let store = open("typed", "");
    store.set("s", "hello")?;
    store.set("i", &-7)?;
    store.set("u", &u64::MAX)?;
    store.set("f", &1.5)?;
    store.set("b", &true)?;

    assert_eq!(store.get_string("s")?, "hello");
    assert_eq!(store.get_int("i")?, -7);
    assert_eq!(store.get_uint("u")?, u64::MAX);
    assert_eq!(store.get_float("f")?, 1.5);
    assert!(store.get_bool("b")?);
    Ok(())
}

#[test]
fn values_are_stored_as_json_under_qualified_key() -> Result<()> {
    let store = open("encoding", "cfg");
    store.set("greeting", "hi")?;

    let raw = store.adapter().get("keyv:cfg:greeting".to_owned())?;
    assert_eq!(raw.as_deref(), Some("\"hi\""));
    Ok(())
}

#[test]
fn set_overwrites() -> Result<()> {
    let store = open("overwrite", "");
    store.set("k", &vec![1, 2, 3])?;
    store.set("k", "replaced")?;
    assert_eq!(store.get_string("k")?, "replaced");
    Ok(())
}

#[test]
fn missing_key() {
    let store = open("missing", "");
    assert!(!store.has("nope"));
    assert!(matches!(store.get_int("nope"), Err(KeyvError::KeyNotFound)));

    let mut dest = 42i64;
    assert!(matches!(
        store.get_into("nope", &mut dest),
        Err(KeyvError::KeyNotFound)
    ));
    assert_eq!(dest, 42);
}

#[test]
fn removed_key_is_missing() -> Result<()> {
    let store = open("removed", "");
    store.set("k", &1)?;
    store.remove("k")?;

    assert!(!store.has("k"));
    assert!(matches!(store.get_int("k"), Err(KeyvError::KeyNotFound)));
    Ok(())
}

#[test]
fn remove_is_idempotent() -> Result<()> {
    let store = open("idempotent", "");
    store.set("k", &1)?;
    store.remove("k")?;
    store.remove("k")?;
    store.remove("never-set")?;
    Ok(())
}

#[test]
fn wrong_shape_is_a_deserialization_error() -> Result<()> {
    let store = open("wrong-shape", "");
    store.set("k", "not a number")?;

    assert!(matches!(
        store.get_int("k"),
        Err(KeyvError::Deserialization(_))
    ));

    let mut dest = 5i64;
    assert!(store.get_into("k", &mut dest).is_err());
    assert_eq!(dest, 5);
    Ok(())
}

#[test]
fn unencodable_value_is_a_serialization_error() {
    let store = open("unencodable", "");
    let mut value = HashMap::new();
    value.insert((1, 2), "tuple keys have no JSON form");

    assert!(matches!(
        store.set("k", &value),
        Err(KeyvError::Serialization(_))
    ));
    assert!(!store.has("k"));
}

#[test]
fn namespaces_are_isolated() -> Result<()> {
    let a = open("isolation", "a");
    let b = open("isolation", "b");

    a.set("shared-name", "from a")?;

    assert!(!b.has("shared-name"));
    assert!(matches!(
        b.get_string("shared-name"),
        Err(KeyvError::KeyNotFound)
    ));
    assert!(b.keys()?.is_empty());
    assert_eq!(a.keys()?, vec!["shared-name".to_owned()]);

    b.set("shared-name", "from b")?;
    assert_eq!(a.get_string("shared-name")?, "from a");
    assert_eq!(b.get_string("shared-name")?, "from b");
    Ok(())
}

#[test]
fn keys_match_the_full_namespace_prefix() -> Result<()> {
    let app = open("prefix-keys", "app");
    let app2 = open("prefix-keys", "app2");

    app.set("one", &1)?;
    app.set("two", &2)?;
    app2.set("three", &3)?;
    // Raw keys that merely mention the namespace.
    app.adapter().set("app".to_owned(), "0".to_owned())?;
    app.adapter().set("keyv:app".to_owned(), "0".to_owned())?;
    app.adapter().set("xkeyv:app:four".to_owned(), "0".to_owned())?;

    assert_eq!(app.keys()?, vec!["one".to_owned(), "two".to_owned()]);
    assert_eq!(app2.keys()?, vec!["three".to_owned()]);
    Ok(())
}

#[test]
fn clear_is_scoped_to_namespace() -> Result<()> {
    let a = open("clear-scope", "a");
    let a2 = open("clear-scope", "a2");
    let b = open("clear-scope", "b");

    a.set("x", &1)?;
    a.set("y", &2)?;
    a2.set("x", &3)?;
    b.set("x", &4)?;

    a.clear()?;

    assert!(a.keys()?.is_empty());
    assert_eq!(a2.get_int("x")?, 3);
    assert_eq!(b.get_int("x")?, 4);
    assert_eq!(b.keys()?, vec!["x".to_owned()]);
    Ok(())
}

#[test]
fn namespaced_shares_the_adapter() -> Result<()> {
    let store = open("namespaced", "first");
    let second = store.namespaced("second");
    let default = store.namespaced("");
    assert_eq!(second.uri(), store.uri());
    assert_eq!(default.namespace(), "default");

    store.set("k", &1)?;
    second.set("k", &2)?;
    assert_eq!(store.get_int("k")?, 1);
    assert_eq!(second.get_int("k")?, 2);
    assert!(!default.has("k"));

    let raw = store.adapter().keys()?;
    assert_eq!(raw, vec!["keyv:first:k".to_owned(), "keyv:second:k".to_owned()]);
    Ok(())
}

#[test]
fn clones_share_the_adapter() -> Result<()> {
    let store = open("clones", "");
    let clone = store.clone();
    store.set("k", &1)?;
    assert_eq!(clone.get_int("k")?, 1);
    Ok(())
}

#[test]
fn debug_omits_adapter() {
    let store = open("debug", "ns");
    let shown = format!("{:?}", store);
    assert!(shown.contains("mem://debug"));
    assert!(shown.contains("ns"));
}
