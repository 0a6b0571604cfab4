//! Renders diagnostics either as annotated source snippets or as one line each.

use std::fmt::Write;
use std::ops::Range;

use annotate_snippets::{AnnotationKind, Group, Level, Patch, Renderer, Snippet};
use rowan::TextRange;

use super::Diagnostics;
use super::message::{DiagnosticMessage, Severity};

/// Configures how [`Diagnostics`] are rendered.
///
/// Without a source the output is the plain `severity at start..end: message`
/// form used by tests and logs.
pub struct DiagnosticsPrinter<'d, 's> {
    diagnostics: &'d Diagnostics,
    source: Option<&'s str>,
    path: Option<&'s str>,
    colored: bool,
}

impl<'d, 's> DiagnosticsPrinter<'d, 's> {
    pub fn new(diagnostics: &'d Diagnostics) -> Self {
        Self {
            diagnostics,
            source: None,
            path: None,
            colored: false,
        }
    }

    pub fn source(self, source: &'s str) -> Self {
        Self {
            source: Some(source),
            ..self
        }
    }

    /// Name shown in the `-->` line of each snippet.
    pub fn path(self, path: &'s str) -> Self {
        Self {
            path: Some(path),
            ..self
        }
    }

    pub fn colored(self, colored: bool) -> Self {
        Self { colored, ..self }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.format(&mut out).expect("String write never fails");
        out
    }

    pub fn format(&self, w: &mut impl Write) -> std::fmt::Result {
        let renderer = match (self.source, self.colored) {
            (None, _) => None,
            (Some(_), true) => Some(Renderer::styled()),
            (Some(_), false) => Some(Renderer::plain()),
        };

        let mut first = true;
        for diag in self.diagnostics.iter() {
            if !first {
                w.write_char('\n')?;
            }
            first = false;

            match (self.source, &renderer) {
                (Some(source), Some(renderer)) => {
                    let groups = self.groups(diag, source);
                    write!(w, "{}", renderer.render(&groups))?;
                    for hint in &diag.hints {
                        write!(w, "\n  = hint: {hint}")?;
                    }
                }
                _ => write!(w, "{diag}")?,
            }
        }
        Ok(())
    }

    /// The primary snippet with related spans, plus a patch group for a fix.
    fn groups<'a>(&self, diag: &'a DiagnosticMessage, source: &'a str) -> Vec<Group<'a>>
    where
        's: 'a,
    {
        let primary = underline(diag.range, source);

        let mut snippet = Snippet::source(source)
            .line_start(1)
            .annotation(AnnotationKind::Primary.span(primary.clone()).label(&diag.message));
        if let Some(path) = self.path {
            snippet = snippet.path(path);
        }
        snippet = diag.related.iter().fold(snippet, |snippet, related| {
            snippet.annotation(
                AnnotationKind::Context
                    .span(underline(related.range, source))
                    .label(&related.message),
            )
        });

        let level = match diag.severity() {
            Severity::Error => Level::ERROR,
            Severity::Warning => Level::WARNING,
        };
        let mut groups = vec![level.primary_title(&diag.message).element(snippet)];

        if let Some(fix) = &diag.fix {
            let patched = Snippet::source(source)
                .line_start(1)
                .patch(Patch::new(primary, &fix.replacement));
            groups.push(Level::HELP.secondary_title(&fix.description).element(patched));
        }
        groups
    }
}

/// Byte range to underline; an empty range (missing token, end of input)
/// is widened to one column where the source allows it.
fn underline(range: TextRange, source: &str) -> Range<usize> {
    let range = Range::<usize>::from(range);
    if range.is_empty() {
        range.start..(range.start + 1).min(source.len())
    } else {
        range
    }
}

impl Diagnostics {
    pub fn printer(&self) -> DiagnosticsPrinter<'_, '_> {
        DiagnosticsPrinter::new(self)
    }
}
