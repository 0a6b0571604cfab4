mod args;
mod commands;
mod dispatch;

#[cfg(test)]
mod dispatch_tests;

pub use commands::build_cli;
pub use dispatch::{CheckParams, CompileParams, DecompileParams, DumpParams};

/// Color output mode for CLI commands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    /// For diagnostics on stderr. Compiled plans on stdout are usually piped.
    pub fn should_colorize(self) -> bool {
        self.resolve(std::io::IsTerminal::is_terminal(&std::io::stderr()))
    }

    /// For reports printed to stdout.
    pub fn should_colorize_stdout(self) -> bool {
        self.resolve(std::io::IsTerminal::is_terminal(&std::io::stdout()))
    }

    fn resolve(self, is_terminal: bool) -> bool {
        match self {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => is_terminal,
        }
    }
}
