use std::path::PathBuf;

use textplan_compiler::{PlanBytes, TextFormat, Transcoder};

use super::input::{load_bytes, write_output};
use super::run_common::fail;

pub struct DecompileArgs {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub format: TextFormat,
    pub json: bool,
    pub length_prefixed: bool,
    pub max_depth: Option<u32>,
}

pub fn run(args: DecompileArgs) {
    let bytes = load_bytes(args.input.as_deref()).unwrap_or_else(|e| fail(e));
    let bytes = if args.length_prefixed {
        PlanBytes::from_length_prefixed(&bytes).unwrap_or_else(|e| fail(e))
    } else {
        PlanBytes::from(bytes)
    };
    tracing::debug!(bytes = bytes.len(), json = args.json, "decoding plan");

    let mut transcoder = Transcoder::new().with_format(args.format);
    if let Some(depth) = args.max_depth {
        transcoder = transcoder.with_max_depth(depth);
    }

    let text = if args.json {
        transcoder.save_to_json(bytes.as_bytes()).map(|mut json| {
            json.push('\n');
            json
        })
    } else {
        transcoder.save_to_text(bytes.as_bytes())
    };
    let text = text.unwrap_or_else(|e| fail(e));
    if let Err(e) = write_output(args.output.as_deref(), text.as_bytes()) {
        fail(e);
    }
}
