use super::EmitError;
use super::names::{Namer, is_plain, quote};

#[test]
fn plain_names() {
    assert!(is_plain("orders"));
    assert!(is_plain("read"));
    assert!(is_plain("a_1"));
    assert!(!is_plain("filter"));
    assert!(!is_plain("ROOT"));
    assert!(!is_plain("two words"));
    assert!(!is_plain("1st"));
    assert!(!is_plain(""));
}

#[test]
fn quoting() {
    assert_eq!(quote("orders"), Ok("orders".to_owned()));
    assert_eq!(quote("count"), Ok("`count`".to_owned()));
    assert_eq!(quote("total sum"), Ok("`total sum`".to_owned()));
    assert_eq!(
        quote("a`b"),
        Err(EmitError::UnrepresentableName("a`b".to_owned()))
    );
    assert_eq!(quote(""), Err(EmitError::UnrepresentableName(String::new())));
}

#[test]
fn collisions_get_suffixes() {
    let mut namer = Namer::new();
    assert_eq!(namer.claim("x"), "x");
    assert_eq!(namer.claim("x"), "x_1");
    assert_eq!(namer.claim("x"), "x_2");
}

#[test]
fn synthesized_names_count_per_kind() {
    let mut namer = Namer::new();
    assert_eq!(namer.fresh("read"), "read1");
    assert_eq!(namer.fresh("filter"), "filter1");
    assert_eq!(namer.fresh("read"), "read2");
}

#[test]
fn synthesized_names_skip_declared_ones() {
    let mut namer = Namer::new();
    namer.avoid("schema1");
    namer.reserve("root");

    assert_eq!(namer.name(None, "schema"), "schema2");
    assert_eq!(namer.name(Some("schema1"), "schema"), "schema1");
    assert_eq!(namer.name(Some("root"), "read"), "root_1");
    assert_eq!(namer.name(Some(""), "read"), "read1");
}
