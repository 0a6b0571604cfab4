use std::path::PathBuf;

use textplan_core::Colors;
use textplan_wire::{MAGIC, dump};

use super::input::{TextInput, display_name, load_bytes, load_text};
use super::run_common::{fail, report, transcoder};

pub struct DumpArgs {
    pub input: Option<PathBuf>,
    pub text: Option<String>,
    pub fuel: Option<u32>,
    pub diagnostics_color: bool,
    pub color: bool,
}

pub fn run(args: DumpArgs) {
    let bytes = match (&args.text, &args.input) {
        (Some(_), _) | (None, None) => {
            let input = load_text(args.input.as_deref(), args.text.as_deref())
                .unwrap_or_else(|e| fail(e));
            compile(&input, &args)
        }
        (None, Some(path)) => {
            let raw = load_bytes(Some(path)).unwrap_or_else(|e| fail(e));
            if raw.starts_with(&MAGIC) {
                raw
            } else {
                let name = display_name(path);
                let Ok(content) = String::from_utf8(raw) else {
                    fail(format!("'{name}' is neither a plan binary nor plan text"));
                };
                compile(&TextInput { name, content }, &args)
            }
        }
    };

    let colors = Colors::new(args.color);
    match dump(&bytes, colors) {
        Ok(report) => print!("{report}"),
        Err(e) => fail(e),
    }
}

fn compile(input: &TextInput, args: &DumpArgs) -> Vec<u8> {
    transcoder(args.fuel, None)
        .load_from_text(&input.content)
        .unwrap_or_else(|e| report(&e, input, args.diagnostics_color))
        .into_vec()
}
