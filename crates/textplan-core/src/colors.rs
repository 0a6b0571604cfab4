//! ANSI color codes for plan dumps and emitted text previews.
//!
//! Three semantic colors plus a dim modifier:
//! - Blue: relation kinds, declaration keywords
//! - Green: names and string literals
//! - Yellow: types and enum values
//! - Dim: byte offsets, section headers, indices

/// ANSI color palette for CLI output.
///
/// Uses only the standard 16-color ANSI codes so both light and dark
/// terminal themes stay readable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Colors {
    pub blue: &'static str,
    pub green: &'static str,
    pub yellow: &'static str,
    pub dim: &'static str,
    pub reset: &'static str,
}

impl Default for Colors {
    fn default() -> Self {
        Self::OFF
    }
}

impl Colors {
    pub const ON: Self = Self {
        blue: "\x1b[34m",
        green: "\x1b[32m",
        yellow: "\x1b[33m",
        dim: "\x1b[2m",
        reset: "\x1b[0m",
    };

    pub const OFF: Self = Self {
        blue: "",
        green: "",
        yellow: "",
        dim: "",
        reset: "",
    };

    pub fn new(enabled: bool) -> Self {
        if enabled { Self::ON } else { Self::OFF }
    }

    pub fn is_enabled(&self) -> bool {
        !self.reset.is_empty()
    }
}
