//! Name allocation and quoting for emitted text.

use indexmap::{IndexMap, IndexSet};

use super::EmitError;
use crate::parser::SyntaxKind;
use crate::parser::lexer::lex;

/// Whether `name` survives the lexer as a single plain identifier.
pub(crate) fn is_plain(name: &str) -> bool {
    match lex(name).as_slice() {
        [token] => token.kind == SyntaxKind::Id && usize::from(token.span.len()) == name.len(),
        _ => false,
    }
}

/// Text for a name in any name position: bare when plain, backticked otherwise.
pub(crate) fn quote(name: &str) -> Result<String, EmitError> {
    if is_plain(name) {
        return Ok(name.to_owned());
    }
    quote_always(name)
}

/// Backticked name. Backticked names are never keywords or builtin types.
pub(crate) fn quote_always(name: &str) -> Result<String, EmitError> {
    if name.is_empty() || name.contains(['`', '\n', '\r']) {
        return Err(EmitError::UnrepresentableName(name.to_owned()));
    }
    Ok(format!("`{name}`"))
}

/// Unique names within one namespace.
///
/// Anonymous entities get `<kind><n>` names from per-kind counters; a taken
/// name gets a `_<n>` suffix. Names in `avoid` are left for the entities
/// that carry them.
#[derive(Debug, Default)]
pub(crate) struct Namer {
    taken: IndexSet<String>,
    avoid: IndexSet<String>,
    counters: IndexMap<&'static str, usize>,
}

impl Namer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reserve(&mut self, name: &str) {
        self.taken.insert(name.to_owned());
    }

    pub fn avoid(&mut self, name: &str) {
        self.avoid.insert(name.to_owned());
    }

    pub fn is_taken(&self, name: &str) -> bool {
        self.taken.contains(name)
    }

    /// Claims `wanted`, or the first free `wanted_<n>`.
    pub fn claim(&mut self, wanted: &str) -> String {
        if !self.taken.contains(wanted) {
            self.taken.insert(wanted.to_owned());
            return wanted.to_owned();
        }
        let mut n = 1;
        loop {
            let candidate = format!("{wanted}_{n}");
            if !self.taken.contains(&candidate) && !self.avoid.contains(&candidate) {
                self.taken.insert(candidate.clone());
                return candidate;
            }
            n += 1;
        }
    }

    /// Next synthesized name for `kind`.
    pub fn fresh(&mut self, kind: &'static str) -> String {
        let counter = self.counters.entry(kind).or_insert(0);
        loop {
            *counter += 1;
            let candidate = format!("{kind}{counter}");
            if !self.taken.contains(&candidate) && !self.avoid.contains(&candidate) {
                self.taken.insert(candidate.clone());
                return candidate;
            }
        }
    }

    /// Declared name when there is one, otherwise a synthesized one.
    pub fn name(&mut self, declared: Option<&str>, kind: &'static str) -> String {
        match declared {
            Some(name) if !name.is_empty() => self.claim(name),
            _ => self.fresh(kind),
        }
    }
}
