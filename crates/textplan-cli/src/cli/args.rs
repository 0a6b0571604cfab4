//! Shared argument builders for CLI commands.
//!
//! Each function returns a `clap::Arg` that can be composed into commands.

use std::path::PathBuf;

use clap::{Arg, ArgAction, value_parser};

/// Input file (positional). `-` reads stdin.
pub fn input_path_arg() -> Arg {
    Arg::new("input")
        .value_name("INPUT")
        .value_parser(value_parser!(PathBuf))
        .help("Input file (use \"-\" for stdin)")
}

/// Inline plan text (-t/--text).
pub fn text_arg() -> Arg {
    Arg::new("text")
        .short('t')
        .long("text")
        .value_name("TEXT")
        .conflicts_with("input")
        .help("Inline plan text")
}

/// Write output to file (-o/--output).
pub fn output_file_arg() -> Arg {
    Arg::new("output")
        .short('o')
        .long("output")
        .value_name("FILE")
        .value_parser(value_parser!(PathBuf))
        .help("Write output to file instead of stdout")
}

/// Color output control (--color).
pub fn color_arg() -> Arg {
    Arg::new("color")
        .long("color")
        .value_name("WHEN")
        .default_value("auto")
        .value_parser(["auto", "always", "never"])
        .help("Colorize output")
}

/// Text layout (--format).
pub fn format_arg() -> Arg {
    Arg::new("format")
        .long("format")
        .value_name("FORMAT")
        .default_value("standard")
        .value_parser(["standard", "compact"])
        .help("Text layout: standard (one declaration per block) or compact (one per line)")
}

/// Write the plan as JSON (--json).
pub fn json_arg() -> Arg {
    Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Write the plan as JSON")
}

/// Input is a JSON plan rather than text (--from-json).
pub fn from_json_arg() -> Arg {
    Arg::new("from_json")
        .long("from-json")
        .action(ArgAction::SetTrue)
        .help("Read the input as a JSON plan instead of text")
}

/// Length-prefixed envelope (--length-prefixed).
pub fn length_prefixed_arg() -> Arg {
    Arg::new("length_prefixed")
        .long("length-prefixed")
        .action(ArgAction::SetTrue)
        .help("Binary is wrapped in a native-endian length prefix")
}

/// Parser token budget (--fuel).
pub fn fuel_arg() -> Arg {
    Arg::new("fuel")
        .long("fuel")
        .value_name("N")
        .value_parser(value_parser!(u32))
        .help("Parser fuel limit")
}

/// Decoder nesting limit (--max-depth).
pub fn max_depth_arg() -> Arg {
    Arg::new("max_depth")
        .long("max-depth")
        .value_name("N")
        .value_parser(value_parser!(u32))
        .help("Maximum relation, expression and type nesting")
}

/// Verbosity level (-v, -vv).
pub fn verbose_arg() -> Arg {
    Arg::new("verbose")
        .short('v')
        .long("verbose")
        .action(ArgAction::Count)
        .help("Verbosity level (-v for debug, -vv for trace)")
}
