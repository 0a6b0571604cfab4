//! Dispatch logic: extract params from ArgMatches and convert to command args.
//!
//! `*Params` mirror the command `*Args` but hold the unresolved
//! [`ColorChoice`]; the `From` impls bridge dispatch to the handlers.

use std::path::PathBuf;

use clap::ArgMatches;
use textplan_compiler::TextFormat;

use super::ColorChoice;
use crate::commands::check::CheckArgs;
use crate::commands::compile::CompileArgs;
use crate::commands::decompile::DecompileArgs;
use crate::commands::dump::DumpArgs;

pub struct CompileParams {
    pub input: Option<PathBuf>,
    pub text: Option<String>,
    pub output: Option<PathBuf>,
    pub json: bool,
    pub from_json: bool,
    pub length_prefixed: bool,
    pub fuel: Option<u32>,
    pub max_depth: Option<u32>,
    pub color: ColorChoice,
}

impl CompileParams {
    pub fn from_matches(m: &ArgMatches) -> Self {
        Self {
            input: m.get_one::<PathBuf>("input").cloned(),
            text: m.get_one::<String>("text").cloned(),
            output: m.get_one::<PathBuf>("output").cloned(),
            json: m.get_flag("json"),
            from_json: m.get_flag("from_json"),
            length_prefixed: m.get_flag("length_prefixed"),
            fuel: m.get_one::<u32>("fuel").copied(),
            max_depth: m.get_one::<u32>("max_depth").copied(),
            color: parse_color(m),
        }
    }
}

impl From<CompileParams> for CompileArgs {
    fn from(p: CompileParams) -> Self {
        Self {
            input: p.input,
            text: p.text,
            output: p.output,
            json: p.json,
            from_json: p.from_json,
            length_prefixed: p.length_prefixed,
            fuel: p.fuel,
            max_depth: p.max_depth,
            color: p.color.should_colorize(),
        }
    }
}

pub struct DecompileParams {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub format: TextFormat,
    pub json: bool,
    pub length_prefixed: bool,
    pub max_depth: Option<u32>,
    // Note: color is parsed but unused; decoding errors have no source snippet
}

impl DecompileParams {
    pub fn from_matches(m: &ArgMatches) -> Self {
        Self {
            input: m.get_one::<PathBuf>("input").cloned(),
            output: m.get_one::<PathBuf>("output").cloned(),
            format: parse_format(m),
            json: m.get_flag("json"),
            length_prefixed: m.get_flag("length_prefixed"),
            max_depth: m.get_one::<u32>("max_depth").copied(),
        }
    }
}

impl From<DecompileParams> for DecompileArgs {
    fn from(p: DecompileParams) -> Self {
        Self {
            input: p.input,
            output: p.output,
            format: p.format,
            json: p.json,
            length_prefixed: p.length_prefixed,
            max_depth: p.max_depth,
        }
    }
}

pub struct CheckParams {
    pub input: Option<PathBuf>,
    pub text: Option<String>,
    pub fuel: Option<u32>,
    pub color: ColorChoice,
}

impl CheckParams {
    pub fn from_matches(m: &ArgMatches) -> Self {
        Self {
            input: m.get_one::<PathBuf>("input").cloned(),
            text: m.get_one::<String>("text").cloned(),
            fuel: m.get_one::<u32>("fuel").copied(),
            color: parse_color(m),
        }
    }
}

impl From<CheckParams> for CheckArgs {
    fn from(p: CheckParams) -> Self {
        Self {
            input: p.input,
            text: p.text,
            fuel: p.fuel,
            color: p.color.should_colorize(),
        }
    }
}

pub struct DumpParams {
    pub input: Option<PathBuf>,
    pub text: Option<String>,
    pub fuel: Option<u32>,
    pub color: ColorChoice,
}

impl DumpParams {
    pub fn from_matches(m: &ArgMatches) -> Self {
        Self {
            input: m.get_one::<PathBuf>("input").cloned(),
            text: m.get_one::<String>("text").cloned(),
            fuel: m.get_one::<u32>("fuel").copied(),
            color: parse_color(m),
        }
    }
}

impl From<DumpParams> for DumpArgs {
    fn from(p: DumpParams) -> Self {
        Self {
            input: p.input,
            text: p.text,
            fuel: p.fuel,
            diagnostics_color: p.color.should_colorize(),
            color: p.color.should_colorize_stdout(),
        }
    }
}

fn parse_color(m: &ArgMatches) -> ColorChoice {
    match m.get_one::<String>("color").map(|s| s.as_str()) {
        Some("always") => ColorChoice::Always,
        Some("never") => ColorChoice::Never,
        _ => ColorChoice::Auto,
    }
}

fn parse_format(m: &ArgMatches) -> TextFormat {
    match m.get_one::<String>("format").map(|s| s.as_str()) {
        Some("compact") => TextFormat::Compact,
        _ => TextFormat::Standard,
    }
}
