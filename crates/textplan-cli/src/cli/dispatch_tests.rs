//! Tests for CLI dispatch logic.
//!
//! These tests verify:
//! 1. Each command accepts its flags and rejects conflicting ones
//! 2. Params extraction: correct fields are extracted from ArgMatches

use std::path::PathBuf;

use textplan_compiler::TextFormat;

use super::*;
use crate::cli::commands::{check_command, compile_command, decompile_command, dump_command};

#[test]
fn cli_lists_all_commands() {
    let cli = build_cli();
    let names: Vec<_> = cli.get_subcommands().map(|c| c.get_name()).collect();
    assert_eq!(names, ["compile", "decompile", "check", "dump"]);
}

#[test]
fn cli_requires_a_subcommand() {
    assert!(build_cli().try_get_matches_from(["textplan"]).is_err());
}

#[test]
fn compile_extracts_params() {
    let m = compile_command()
        .try_get_matches_from([
            "compile",
            "plan.tp",
            "-o",
            "plan.bin",
            "--length-prefixed",
            "--fuel",
            "500",
            "--color",
            "never",
        ])
        .unwrap();
    let params = CompileParams::from_matches(&m);

    assert_eq!(params.input, Some(PathBuf::from("plan.tp")));
    assert_eq!(params.output, Some(PathBuf::from("plan.bin")));
    assert!(params.length_prefixed);
    assert!(!params.json);
    assert!(!params.from_json);
    assert_eq!(params.fuel, Some(500));
    assert_eq!(params.max_depth, None);
    assert_eq!(params.color, ColorChoice::Never);
}

#[test]
fn compile_inline_text() {
    let m = compile_command()
        .try_get_matches_from(["compile", "-t", "schema s { id i64; }"])
        .unwrap();
    let params = CompileParams::from_matches(&m);

    assert_eq!(params.input, None);
    assert_eq!(params.text.as_deref(), Some("schema s { id i64; }"));
    assert_eq!(params.fuel, None);
    assert_eq!(params.color, ColorChoice::Auto);
}

#[test]
fn compile_rejects_text_with_input() {
    let result = compile_command().try_get_matches_from(["compile", "plan.tp", "-t", "x"]);
    assert!(result.is_err());
}

#[test]
fn compile_rejects_json_with_envelope() {
    let result =
        compile_command().try_get_matches_from(["compile", "plan.tp", "--json", "--length-prefixed"]);
    assert!(result.is_err());
}

#[test]
fn compile_reads_json_plans() {
    let m = compile_command()
        .try_get_matches_from(["compile", "plan.json", "--from-json", "--max-depth", "64"])
        .unwrap();
    let params = CompileParams::from_matches(&m);

    assert!(params.from_json);
    assert!(!params.json);
    assert_eq!(params.max_depth, Some(64));
}

#[test]
fn decompile_defaults() {
    let m = decompile_command().try_get_matches_from(["decompile"]).unwrap();
    let params = DecompileParams::from_matches(&m);

    assert_eq!(params.input, None);
    assert_eq!(params.format, TextFormat::Standard);
    assert_eq!(params.max_depth, None);
    assert!(!params.json);
    assert!(!params.length_prefixed);
}

#[test]
fn decompile_to_json_accepts_an_envelope() {
    let m = decompile_command()
        .try_get_matches_from(["decompile", "plan.bin", "--json", "--length-prefixed"])
        .unwrap();
    let params = DecompileParams::from_matches(&m);

    assert!(params.json);
    assert!(params.length_prefixed);
}

#[test]
fn decompile_extracts_params() {
    let m = decompile_command()
        .try_get_matches_from([
            "decompile",
            "plan.bin",
            "--format",
            "compact",
            "--max-depth",
            "16",
        ])
        .unwrap();
    let params = DecompileParams::from_matches(&m);

    assert_eq!(params.input, Some(PathBuf::from("plan.bin")));
    assert_eq!(params.format, TextFormat::Compact);
    assert_eq!(params.max_depth, Some(16));
}

#[test]
fn decompile_rejects_unknown_format() {
    let result = decompile_command().try_get_matches_from(["decompile", "--format", "pretty"]);
    assert!(result.is_err());
}

#[test]
fn check_extracts_params() {
    let m = check_command()
        .try_get_matches_from(["check", "plan.tp", "--color", "always"])
        .unwrap();
    let params = CheckParams::from_matches(&m);

    assert_eq!(params.input, Some(PathBuf::from("plan.tp")));
    assert_eq!(params.color, ColorChoice::Always);
}

#[test]
fn dump_accepts_text_or_input() {
    let m = dump_command().try_get_matches_from(["dump", "plan.bin"]).unwrap();
    assert_eq!(
        DumpParams::from_matches(&m).input,
        Some(PathBuf::from("plan.bin"))
    );

    let m = dump_command()
        .try_get_matches_from(["dump", "-t", "schema s { id i64; }"])
        .unwrap();
    assert!(DumpParams::from_matches(&m).text.is_some());
}

#[test]
fn verbosity_counts() {
    for (args, expected) in [
        (&["check", "plan.tp"][..], 0),
        (&["check", "plan.tp", "-v"][..], 1),
        (&["check", "plan.tp", "-vv"][..], 2),
    ] {
        let m = check_command().try_get_matches_from(args).unwrap();
        assert_eq!(m.get_count("verbose"), expected);
    }
}

#[test]
fn color_choice_resolution() {
    assert!(ColorChoice::Always.should_colorize());
    assert!(!ColorChoice::Never.should_colorize());
    assert!(!ColorChoice::Never.should_colorize_stdout());
}
