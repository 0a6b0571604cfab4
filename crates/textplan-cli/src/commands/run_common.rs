//! Shared failure reporting for the command handlers.

use textplan_compiler::{Error, Transcoder};

use super::input::TextInput;

/// Transcoder with the parser fuel and nesting limit overridden when
/// `--fuel` or `--max-depth` is given.
pub fn transcoder(fuel: Option<u32>, max_depth: Option<u32>) -> Transcoder {
    let transcoder = match fuel {
        Some(fuel) => Transcoder::new().with_exec_fuel(Some(fuel)),
        None => Transcoder::new(),
    };
    match max_depth {
        Some(depth) => transcoder.with_max_depth(depth),
        None => transcoder,
    }
}

pub fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("error: {msg}");
    std::process::exit(1);
}

/// Renders `err` against the source it came from and exits.
pub fn report(err: &Error, input: &TextInput, color: bool) -> ! {
    match err {
        Error::Parse(diagnostics) | Error::Resolve(diagnostics) => {
            eprint!(
                "{}",
                diagnostics
                    .printer()
                    .source(&input.content)
                    .path(&input.name)
                    .colored(color)
                    .render()
            );
        }
        Error::Build(build) if build.range.is_some() => {
            let diagnostics = build.to_diagnostics();
            eprint!(
                "{}",
                diagnostics
                    .printer()
                    .source(&input.content)
                    .path(&input.name)
                    .colored(color)
                    .render()
            );
        }
        _ => eprintln!("error: {err}"),
    }
    std::process::exit(1);
}
