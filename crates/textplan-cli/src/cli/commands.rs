//! Command builders for the CLI.
//!
//! Each command is built from the shared arg builders in `args.rs`.

use clap::Command;

use super::args::*;

/// Flags every command accepts.
fn with_common_args(cmd: Command) -> Command {
    cmd.arg(color_arg()).arg(verbose_arg())
}

/// Build the complete CLI with all subcommands.
pub fn build_cli() -> Command {
    Command::new("textplan")
        .about("Convert query plans between text and binary form")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(compile_command())
        .subcommand(decompile_command())
        .subcommand(check_command())
        .subcommand(dump_command())
}

/// Text plan to binary.
pub fn compile_command() -> Command {
    let cmd = Command::new("compile")
        .about("Compile a text plan to binary")
        .override_usage(
            "\
  textplan compile <INPUT> [-o <FILE>]
  textplan compile -t <TEXT> [-o <FILE>]",
        )
        .after_help(
            r#"EXAMPLES:
  textplan compile plan.tp -o plan.bin      # binary to file
  textplan compile plan.tp --json           # plan IR as JSON
  textplan compile plan.json --from-json    # JSON plan to binary
  cat plan.tp | textplan compile - > plan.bin"#,
        )
        .arg(input_path_arg())
        .arg(text_arg())
        .arg(output_file_arg())
        .arg(json_arg().conflicts_with("length_prefixed"))
        .arg(from_json_arg())
        .arg(length_prefixed_arg())
        .arg(fuel_arg())
        .arg(max_depth_arg());

    with_common_args(cmd)
}

/// Binary plan to text.
pub fn decompile_command() -> Command {
    let cmd = Command::new("decompile")
        .about("Print a binary plan as text")
        .override_usage("  textplan decompile [INPUT] [-o <FILE>]")
        .after_help(
            r#"EXAMPLES:
  textplan decompile plan.bin               # standard layout
  textplan decompile plan.bin --format compact
  textplan decompile plan.bin --json        # plan IR as JSON
  textplan compile plan.tp | textplan decompile"#,
        )
        .arg(input_path_arg())
        .arg(output_file_arg())
        .arg(format_arg())
        .arg(json_arg())
        .arg(length_prefixed_arg())
        .arg(max_depth_arg());

    with_common_args(cmd)
}

/// Validate a text plan.
pub fn check_command() -> Command {
    let cmd = Command::new("check")
        .about("Validate a text plan")
        .override_usage(
            "\
  textplan check <INPUT>
  textplan check -t <TEXT>",
        )
        .after_help(
            r#"EXAMPLES:
  textplan check plan.tp
  textplan check -t 'schema s { id i64; }'"#,
        )
        .arg(input_path_arg())
        .arg(text_arg())
        .arg(fuel_arg());

    with_common_args(cmd)
}

/// Show the binary layout of a plan.
pub fn dump_command() -> Command {
    let cmd = Command::new("dump")
        .about("Show the binary layout of a plan")
        .override_usage(
            "\
  textplan dump <INPUT>
  textplan dump -t <TEXT>",
        )
        .after_help(
            r#"EXAMPLES:
  textplan dump plan.bin             # existing binary
  textplan dump plan.tp              # text is compiled first
  textplan dump -t 'schema s { id i64; }'"#,
        )
        .arg(input_path_arg())
        .arg(text_arg())
        .arg(fuel_arg());

    with_common_args(cmd)
}
