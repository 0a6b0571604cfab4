use std::path::PathBuf;

use textplan_compiler::PlanBytes;

use super::input::{load_text, write_output};
use super::run_common::{fail, report, transcoder};

pub struct CompileArgs {
    pub input: Option<PathBuf>,
    pub text: Option<String>,
    pub output: Option<PathBuf>,
    pub json: bool,
    pub from_json: bool,
    pub length_prefixed: bool,
    pub fuel: Option<u32>,
    pub max_depth: Option<u32>,
    pub color: bool,
}

pub fn run(args: CompileArgs) {
    let input = load_text(args.input.as_deref(), args.text.as_deref()).unwrap_or_else(|e| fail(e));
    let transcoder = transcoder(args.fuel, args.max_depth);

    let loaded = if args.from_json {
        transcoder.load_from_json(&input.content)
    } else {
        transcoder.load_from_text(&input.content)
    };
    let bytes: PlanBytes = loaded.unwrap_or_else(|e| report(&e, &input, args.color));
    tracing::debug!(input = %input.name, bytes = bytes.len(), json = args.from_json, "loaded plan");

    let out = if args.json {
        let mut json = transcoder
            .save_to_json(bytes.as_bytes())
            .unwrap_or_else(|e| fail(e));
        json.push('\n');
        json.into_bytes()
    } else if args.length_prefixed {
        bytes.to_length_prefixed()
    } else {
        bytes.into_vec()
    };

    if let Err(e) = write_output(args.output.as_deref(), &out) {
        fail(e);
    }
}
