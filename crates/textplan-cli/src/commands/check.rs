use std::path::PathBuf;

use super::input::load_text;
use super::run_common::{fail, report, transcoder};

pub struct CheckArgs {
    pub input: Option<PathBuf>,
    pub text: Option<String>,
    pub fuel: Option<u32>,
    pub color: bool,
}

pub fn run(args: CheckArgs) {
    let input = load_text(args.input.as_deref(), args.text.as_deref()).unwrap_or_else(|e| fail(e));

    let diagnostics = transcoder(args.fuel, None)
        .check(&input.content)
        .unwrap_or_else(|e| report(&e, &input, args.color));

    tracing::debug!(input = %input.name, count = diagnostics.len(), "checked plan");
    if !diagnostics.is_empty() {
        eprint!(
            "{}",
            diagnostics
                .printer()
                .source(&input.content)
                .path(&input.name)
                .colored(args.color)
                .render()
        );
    }
    if diagnostics.has_errors() {
        std::process::exit(1);
    }

    // Silent on success (like cargo check)
}
