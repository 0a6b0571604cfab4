use indoc::indoc;
use textplan_core::{DEFAULT_MAX_DEPTH, DepthError};
use textplan_wire::{MAGIC, decode, encode};

use crate::{
    BuildErrorKind, DiagnosticKind, Error, PlanBytes, TextFormat, Transcoder, load_from_json,
    load_from_text, save_to_json, save_to_text,
};

const SIMPLE: &str = indoc! {r#"
    schema simple_schema { id i32; name string; }
    source named_table simple_source { names = ["test_table"]; }
    read relation data { base_schema simple_schema; source simple_source; }
"#};

const PIPELINE: &str = indoc! {r#"
    extension_space "urn:functions" {
      function gt:i64_i64;
      function sum:i64;
    }
    schema orders { id i64; customer i64; amount i64; }
    source named_table orders_t { names = ["orders"]; }
    read relation scan { base_schema orders; source orders_t; }
    filter relation big { filter gt(amount, 100) -> boolean; }
    aggregate relation per_customer {
      grouping customer;
      measure { measure sum(amount) -> i64 named total; }
    }
    sort relation ranked { sort total by desc_nulls_last; }
    pipelines {
      scan -> big -> per_customer -> ranked -> root;
    }
"#};

#[test]
fn simple_schema_scenario() {
    let bytes = load_from_text(SIMPLE).unwrap();
    assert!(!bytes.is_empty());
    assert_eq!(&bytes.as_bytes()[..4], &MAGIC);

    let text = save_to_text(bytes.as_bytes()).unwrap();
    for needle in ["relation", "schema", "simple_schema", "data"] {
        assert!(text.contains(needle), "missing {needle:?} in\n{text}");
    }
}

#[test]
fn text_to_binary_to_text_to_binary() {
    let first = load_from_text(PIPELINE).unwrap();
    let text = save_to_text(first.as_bytes()).unwrap();
    let second = load_from_text(&text).unwrap();
    assert_eq!(first, second);
}

#[test]
fn binary_to_text_to_binary() {
    let plan = Transcoder::new().compile(PIPELINE).unwrap();
    let bytes = encode(&plan).unwrap();

    let text = save_to_text(&bytes).unwrap();
    let reloaded = load_from_text(&text).unwrap();
    assert_eq!(reloaded.as_bytes(), bytes.as_slice());
    assert_eq!(decode(reloaded.as_bytes()).unwrap(), plan);
}

#[test]
fn compact_text_loads_to_the_same_bytes() {
    let bytes = load_from_text(PIPELINE).unwrap();
    let compact = Transcoder::new()
        .with_format(TextFormat::Compact)
        .save_to_text(bytes.as_bytes())
        .unwrap();

    assert_eq!(compact.lines().count(), 8);
    assert_eq!(load_from_text(&compact).unwrap(), bytes);
}

#[test]
fn envelope_round_trip() {
    let bytes = load_from_text(SIMPLE).unwrap();
    let envelope = bytes.to_length_prefixed();
    assert_eq!(envelope.len(), size_of::<usize>() + bytes.len());
    assert_eq!(&envelope[..size_of::<usize>()], &bytes.len().to_ne_bytes());
    assert_eq!(PlanBytes::from_length_prefixed(&envelope).unwrap(), bytes);
}

#[test]
fn envelope_mismatch() {
    let bytes = load_from_text(SIMPLE).unwrap();
    let mut envelope = bytes.to_length_prefixed();
    envelope.pop();

    let Err(Error::Envelope { declared, actual }) = PlanBytes::from_length_prefixed(&envelope)
    else {
        panic!("expected an envelope error");
    };
    assert_eq!((declared, actual), (bytes.len(), bytes.len() - 1));

    assert!(matches!(
        PlanBytes::from_length_prefixed(&[1, 2]),
        Err(Error::Envelope { actual: 2, .. })
    ));
    assert!(matches!(
        PlanBytes::from_length_prefixed(&[]),
        Err(Error::EmptyInput)
    ));
}

#[test]
fn empty_buffer_is_rejected_before_decoding() {
    assert!(matches!(save_to_text(&[]), Err(Error::EmptyInput)));
}

#[test]
fn corrupted_buffer_is_a_decode_error() {
    let bytes = load_from_text(SIMPLE).unwrap();
    let mut corrupted = bytes.into_vec();
    let last = corrupted.len() - 1;
    corrupted[last] ^= 0xff;

    assert!(matches!(save_to_text(&corrupted), Err(Error::Decode(_))));
    assert!(matches!(save_to_text(b"nope"), Err(Error::Decode(_))));
}

#[test]
fn errors_name_their_stage() {
    let Err(Error::Parse(diagnostics)) = load_from_text("schema s { id i64 }") else {
        panic!("expected a parse error");
    };
    assert!(diagnostics.has_errors());

    let Err(Error::Resolve(diagnostics)) = load_from_text("filter relation f { input nope; filter true; }")
    else {
        panic!("expected a resolve error");
    };
    assert_eq!(diagnostics.iter().next().map(|d| d.kind()), Some(DiagnosticKind::UndefinedReference));

    let text = format!("{SIMPLE}fetch relation f {{ input data; offset -1; }}\n");
    let Err(Error::Build(err)) = load_from_text(&text) else {
        panic!("expected a build error");
    };
    assert_eq!(err.relation.as_deref(), Some("f"));
}

#[test]
fn check_collects_diagnostics() {
    let transcoder = Transcoder::new();
    assert!(transcoder.check(SIMPLE).unwrap().is_empty());

    let diagnostics = transcoder
        .check("filter relation f { input a; input b; filter true; }")
        .unwrap();
    assert_eq!(diagnostics.error_count(), 2);

    let text = format!("{SIMPLE}fetch relation f {{ input data; count -5; }}\n");
    let diagnostics = transcoder.check(&text).unwrap();
    assert_eq!(diagnostics.iter().next().map(|d| d.kind()), Some(DiagnosticKind::InvalidPlan));
}

#[test]
fn fuel_limits() {
    let transcoder = Transcoder::new().with_exec_fuel(Some(5));
    assert!(matches!(
        transcoder.compile(SIMPLE),
        Err(Error::ExecFuelExhausted)
    ));

    let nested = format!(
        "{SIMPLE}filter relation f {{ input data; filter {}true{}; }}\n",
        "(".repeat(20),
        ")".repeat(20)
    );
    let transcoder = Transcoder::new().with_recursion_fuel(Some(8));
    assert!(matches!(
        transcoder.compile(&nested),
        Err(Error::RecursionLimitExceeded)
    ));
    assert!(Transcoder::new().compile(&nested).is_ok());
}

#[test]
fn max_depth_is_configurable() {
    let bytes = load_from_text(PIPELINE).unwrap();
    let shallow = Transcoder::new().with_max_depth(2);
    assert!(matches!(
        shallow.save_to_text(bytes.as_bytes()),
        Err(Error::Decode(_))
    ));
}

#[test]
fn max_depth_applies_to_text_loading() {
    let shallow = Transcoder::new().with_max_depth(4);
    let Err(Error::Build(err)) = shallow.load_from_text(PIPELINE) else {
        panic!("expected a build error");
    };
    assert_eq!(err.kind, BuildErrorKind::TooDeep(DepthError { limit: 4 }));
}

const FEATURES: &str = indoc! {r#"
    extension_space "urn:functions" {
      function gt:i64_i64;
    }
    schema orders { id i64; customer i64; amount i64; }
    schema customers { id i64; vip boolean; }
    source named_table orders_t { names = ["orders"]; }
    source named_table customers_t { names = ["customers"]; }
    read relation vips {
      base_schema customers;
      source customers_t;
      filter vip;
      emit id;
    }
    read relation scan {
      base_schema orders;
      source orders_t;
      best effort filter gt(amount, 100_i64) -> boolean;
    }
    filter relation wanted {
      input scan;
      filter (customer) in subquery vips;
    }
    project relation shaped {
      input wanted;
      expression exists in subquery vips named any_vip;
      expression amount gt any subquery vips named above;
      expression {1_i32, "x"}_struct<i32, string> named pair;
      expression {"a": 1_i32}_map<string, i32> named lookup;
      expression null_i64 named nothing;
      expression 5_i8 named small;
      emit customer;
      emit pair;
    }
"#};

#[test]
fn subqueries_emit_and_typed_literals_round_trip() {
    let first = load_from_text(FEATURES).unwrap();
    let text = save_to_text(first.as_bytes()).unwrap();
    for needle in [
        "best_effort filter gt(amount, 100) -> boolean;",
        "filter (customer) in subquery vips;",
        "exists in subquery vips named any_vip",
        "amount gt any subquery vips named above",
        r#"{1, "x"}_struct<i32, string> named pair"#,
        r#"{"a": 1}_map<string, i32> named lookup"#,
        "null_i64? named nothing",
        "5_i8 named small",
        "emit id;",
        "emit customer;",
        "emit pair;",
    ] {
        assert!(text.contains(needle), "missing {needle:?} in\n{text}");
    }
    assert_eq!(load_from_text(&text).unwrap(), first);
}

#[test]
fn json_round_trip() {
    for source in [PIPELINE, FEATURES] {
        let bytes = load_from_text(source).unwrap();
        let json = save_to_json(bytes.as_bytes()).unwrap();
        assert_eq!(load_from_json(&json).unwrap(), bytes);
    }
}

#[test]
fn json_input_is_validated_like_bytes() {
    assert!(matches!(load_from_json(""), Err(Error::EmptyInput)));
    assert!(matches!(load_from_json("{"), Err(Error::Json(_))));
    assert!(matches!(load_from_json(r#"{"roots": 7}"#), Err(Error::Json(_))));
}

#[test]
fn json_too_deep_to_read_back_is_refused_on_save() {
    // serde_json stops reading at 128 levels; every filter adds three
    let bytes = load_from_text(&filter_chain(60)).unwrap();
    assert!(matches!(save_to_json(bytes.as_bytes()), Err(Error::Json(_))));
    assert!(save_to_text(bytes.as_bytes()).is_ok());
}

/// `SIMPLE` followed by `len` filters stacked on `data`.
fn filter_chain(len: usize) -> String {
    let mut text = String::from(SIMPLE);
    let mut input = "data".to_owned();
    for i in 0..len {
        text.push_str(&format!("filter relation f{i} {{ input {input}; filter true; }}\n"));
        input = format!("f{i}");
    }
    text
}

/// A filter whose condition is `true` cast `len` times.
fn cast_chain(len: usize) -> String {
    format!(
        "{SIMPLE}filter relation f {{ input data; filter true{}; }}\n",
        " as boolean".repeat(len)
    )
}

#[test]
fn chains_below_the_depth_limit_round_trip() {
    for text in [filter_chain(250), cast_chain(250)] {
        let first = load_from_text(&text).unwrap();
        let emitted = save_to_text(first.as_bytes()).unwrap();
        assert_eq!(load_from_text(&emitted).unwrap(), first);
    }
}

#[test]
fn chains_over_the_depth_limit_fail_to_load() {
    let too_deep = BuildErrorKind::TooDeep(DepthError {
        limit: DEFAULT_MAX_DEPTH,
    });

    // 255 filters over the read reach the limit exactly
    assert!(load_from_text(&filter_chain(255)).is_ok());
    let Err(Error::Build(err)) = load_from_text(&filter_chain(256)) else {
        panic!("expected a build error");
    };
    assert_eq!(err.kind, too_deep);
    assert_eq!(err.relation.as_deref(), Some("f255"));

    let Err(Error::Build(err)) = load_from_text(&filter_chain(300)) else {
        panic!("expected a build error");
    };
    assert_eq!(err.kind, too_deep);

    let Err(Error::Build(err)) = load_from_text(&cast_chain(300)) else {
        panic!("expected a build error");
    };
    assert_eq!(err.kind, too_deep);
}

#[test]
fn very_long_chains_fail_without_exhausting_the_stack() {
    assert!(matches!(
        load_from_text(&cast_chain(3000)),
        Err(Error::RecursionLimitExceeded)
    ));
    assert!(matches!(
        load_from_text(&filter_chain(5000)),
        Err(Error::Build(_))
    ));
}

#[test]
fn keywords_are_case_insensitive() {
    let upper = indoc! {r#"
        SCHEMA simple_schema { id I32; name String; }
        SOURCE NAMED_TABLE simple_source { NAMES = ["test_table"]; }
        READ RELATION data { BASE_SCHEMA simple_schema; Source simple_source; FILTER TRUE; }
    "#};
    let lower = indoc! {r#"
        schema simple_schema { id i32; name string; }
        source named_table simple_source { names = ["test_table"]; }
        read relation data { base_schema simple_schema; source simple_source; filter true; }
    "#};
    assert_eq!(load_from_text(upper).unwrap(), load_from_text(lower).unwrap());
}

#[test]
fn block_comments_ending_in_stars() {
    let commented = indoc! {r#"
        /* plan under test **/
        schema simple_schema { id i32; /***/ name string; }
        source named_table simple_source { names = ["test_table"]; }
        /** the only relation
         **/
        read relation data { base_schema simple_schema; source simple_source; }
    "#};
    assert_eq!(load_from_text(commented).unwrap(), load_from_text(SIMPLE).unwrap());
}
