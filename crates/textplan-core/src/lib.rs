#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Plan IR for the TextPlan transcoder.
//!
//! Two directions meet here:
//! - **Forward**: the compiler lowers resolved text into a [`Plan`]
//! - **Reverse**: the wire decoder reconstructs a [`Plan`] from bytes
//!
//! Output schemas are never stored. They are re-derived structurally from
//! the relation tree by [`derive`], which is why the wire format and the
//! text emitter can both rely on it.

/// Declares a `repr(u8)` keyword enum with its text spelling.
///
/// Generates `ALL`, `name`, `from_name` (ASCII case-insensitive) and
/// `from_u8`. Discriminants double as wire tags, so they start at 1 and
/// never change once released.
macro_rules! keyword_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $value:literal => $text:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[repr(u8)]
        pub enum $name {
            $($(#[$vmeta])* $variant = $value,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            pub fn from_name(text: &str) -> Option<Self> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.name().eq_ignore_ascii_case(text))
            }

            pub fn from_u8(v: u8) -> Option<Self> {
                match v {
                    $($value => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

mod colors;
pub mod depth;
pub mod derive;
mod expr;
mod extensions;
mod plan;
mod rel;
mod types;

#[cfg(test)]
mod depth_tests;
#[cfg(test)]
mod extensions_tests;
#[cfg(test)]
mod plan_tests;

pub use colors::Colors;
pub use depth::{DEFAULT_MAX_DEPTH, DepthError};
pub use derive::{Column, SchemaError};
pub use expr::{
    Cast, ComparisonOp, Expr, FieldRef, FunctionCall, Literal, LiteralValue, ReductionOp,
    SetPredicateOp, Subquery,
};
pub use extensions::{Anchor, AnchorError, ExtensionName, ExtensionRegistry};
pub use plan::{
    FileFormat, FileItem, PathKind, Plan, SchemaDecl, SchemaField, SourceDecl, SourceKind,
};
pub use rel::{
    AggregateRel, AggregationPhase, CrossRel, ExtensionLeafRel, ExtensionMultiRel,
    ExtensionSingleRel, FetchRel, FilterRel, Invocation, JoinRel, JoinType, Measure, NamedExpr,
    ProjectRel, ReadRel, Rel, RelKind, RelTag, SetOp, SetRel, SortDirection, SortField, SortRel,
};
pub use types::{Type, TypeDisplay, TypeError, TypeKind};
