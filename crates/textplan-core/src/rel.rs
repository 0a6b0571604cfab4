//! Relation operator tree.
//!
//! Every node owns its inputs. A relation consumed twice in text is copied,
//! so the tree never shares a node between parents.

use serde::{Deserialize, Serialize};

use crate::expr::Expr;
use crate::extensions::Anchor;
use crate::types::Type;

keyword_enum! {
    /// Relation kind, also the wire tag of a relation node.
    pub enum RelTag {
        Read = 1 => "read",
        Filter = 2 => "filter",
        Project = 3 => "project",
        Join = 4 => "join",
        Cross = 5 => "cross",
        Fetch = 6 => "fetch",
        Aggregate = 7 => "aggregate",
        Sort = 8 => "sort",
        Set = 9 => "set",
        ExtensionLeaf = 10 => "extension_leaf",
        ExtensionSingle = 11 => "extension_single",
        ExtensionMulti = 12 => "extension_multi",
    }
}

keyword_enum! {
    pub enum JoinType {
        Inner = 1 => "inner",
        Outer = 2 => "outer",
        Left = 3 => "left",
        Right = 4 => "right",
        LeftSemi = 5 => "left_semi",
        RightSemi = 6 => "right_semi",
        LeftAnti = 7 => "left_anti",
        RightAnti = 8 => "right_anti",
        LeftSingle = 9 => "left_single",
        RightSingle = 10 => "right_single",
        LeftMark = 11 => "left_mark",
        RightMark = 12 => "right_mark",
    }
}

keyword_enum! {
    pub enum SetOp {
        MinusPrimary = 1 => "minus_primary",
        MinusMultiset = 2 => "minus_multiset",
        IntersectionPrimary = 3 => "intersection_primary",
        IntersectionMultiset = 4 => "intersection_multiset",
        UnionDistinct = 5 => "union_distinct",
        UnionAll = 6 => "union_all",
    }
}

keyword_enum! {
    pub enum SortDirection {
        AscNullsFirst = 1 => "asc_nulls_first",
        AscNullsLast = 2 => "asc_nulls_last",
        DescNullsFirst = 3 => "desc_nulls_first",
        DescNullsLast = 4 => "desc_nulls_last",
        Clustered = 5 => "clustered",
    }
}

keyword_enum! {
    pub enum AggregationPhase {
        InitialToIntermediate = 1 => "initial_to_intermediate",
        IntermediateToIntermediate = 2 => "intermediate_to_intermediate",
        InitialToResult = 3 => "initial_to_result",
        IntermediateToResult = 4 => "intermediate_to_result",
    }
}

keyword_enum! {
    pub enum Invocation {
        All = 1 => "all",
        Distinct = 2 => "distinct",
    }
}

impl Default for SortDirection {
    fn default() -> Self {
        SortDirection::AscNullsLast
    }
}

impl Default for AggregationPhase {
    fn default() -> Self {
        AggregationPhase::InitialToResult
    }
}

impl Default for Invocation {
    fn default() -> Self {
        Invocation::All
    }
}

impl RelTag {
    /// Inclusive bounds on the number of inputs.
    pub fn input_arity(self) -> (usize, Option<usize>) {
        match self {
            RelTag::Read | RelTag::ExtensionLeaf => (0, Some(0)),
            RelTag::Filter
            | RelTag::Project
            | RelTag::Fetch
            | RelTag::Aggregate
            | RelTag::Sort
            | RelTag::ExtensionSingle => (1, Some(1)),
            RelTag::Join | RelTag::Cross => (2, Some(2)),
            RelTag::Set => (2, None),
            RelTag::ExtensionMulti => (1, None),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rel {
    /// Declared name, kept through the wire format. `None` for relations
    /// the emitter has to name itself.
    pub name: Option<String>,
    pub kind: RelKind,
    /// Output remap: positions into the node's direct output columns.
    /// `None` keeps them all in order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emit: Option<Vec<u32>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RelKind {
    Read(ReadRel),
    Filter(FilterRel),
    Project(ProjectRel),
    Join(JoinRel),
    Cross(CrossRel),
    Fetch(FetchRel),
    Aggregate(AggregateRel),
    Sort(SortRel),
    Set(SetRel),
    ExtensionLeaf(ExtensionLeafRel),
    ExtensionSingle(ExtensionSingleRel),
    ExtensionMulti(ExtensionMultiRel),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadRel {
    /// Index into `Plan::schemas`.
    pub schema: u32,
    /// Index into `Plan::sources`.
    pub source: u32,
    pub filter: Option<Expr>,
    /// Filter the source may apply partially; rows it lets through are
    /// still subject to `filter`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_effort_filter: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterRel {
    pub input: Box<Rel>,
    pub condition: Expr,
}

/// Expression with an optional output column name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedExpr {
    pub expr: Expr,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRel {
    pub input: Box<Rel>,
    pub expressions: Vec<NamedExpr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRel {
    pub left: Box<Rel>,
    pub right: Box<Rel>,
    pub join_type: JoinType,
    pub condition: Expr,
    pub post_filter: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossRel {
    pub left: Box<Rel>,
    pub right: Box<Rel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchRel {
    pub input: Box<Rel>,
    pub offset: i64,
    /// `-1` fetches everything after `offset`.
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    pub function: Anchor,
    pub args: Vec<Expr>,
    pub output: Type,
    pub phase: AggregationPhase,
    pub invocation: Invocation,
    pub filter: Option<Expr>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRel {
    pub input: Box<Rel>,
    pub groupings: Vec<NamedExpr>,
    pub measures: Vec<Measure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortField {
    pub expr: Expr,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortRel {
    pub input: Box<Rel>,
    pub fields: Vec<SortField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetRel {
    pub inputs: Vec<Rel>,
    pub op: SetOp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionLeafRel {
    /// Index into `Plan::schemas`, the declared output shape.
    pub schema: u32,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionSingleRel {
    pub input: Box<Rel>,
    pub schema: Option<u32>,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionMultiRel {
    pub inputs: Vec<Rel>,
    pub schema: Option<u32>,
    pub detail: Option<String>,
}

impl Rel {
    pub fn new(name: Option<String>, kind: RelKind) -> Self {
        Self {
            name,
            kind,
            emit: None,
        }
    }

    pub fn with_emit(self, emit: Vec<u32>) -> Self {
        Self {
            emit: Some(emit),
            ..self
        }
    }

    pub fn tag(&self) -> RelTag {
        match &self.kind {
            RelKind::Read(_) => RelTag::Read,
            RelKind::Filter(_) => RelTag::Filter,
            RelKind::Project(_) => RelTag::Project,
            RelKind::Join(_) => RelTag::Join,
            RelKind::Cross(_) => RelTag::Cross,
            RelKind::Fetch(_) => RelTag::Fetch,
            RelKind::Aggregate(_) => RelTag::Aggregate,
            RelKind::Sort(_) => RelTag::Sort,
            RelKind::Set(_) => RelTag::Set,
            RelKind::ExtensionLeaf(_) => RelTag::ExtensionLeaf,
            RelKind::ExtensionSingle(_) => RelTag::ExtensionSingle,
            RelKind::ExtensionMulti(_) => RelTag::ExtensionMulti,
        }
    }

    /// Direct inputs in order.
    pub fn inputs(&self) -> Vec<&Rel> {
        match &self.kind {
            RelKind::Read(_) | RelKind::ExtensionLeaf(_) => Vec::new(),
            RelKind::Filter(r) => vec![&*r.input],
            RelKind::Project(r) => vec![&*r.input],
            RelKind::Fetch(r) => vec![&*r.input],
            RelKind::Aggregate(r) => vec![&*r.input],
            RelKind::Sort(r) => vec![&*r.input],
            RelKind::ExtensionSingle(r) => vec![&*r.input],
            RelKind::Join(r) => vec![&*r.left, &*r.right],
            RelKind::Cross(r) => vec![&*r.left, &*r.right],
            RelKind::Set(r) => r.inputs.iter().collect(),
            RelKind::ExtensionMulti(r) => r.inputs.iter().collect(),
        }
    }

    /// The node's own top-level expressions in field order.
    ///
    /// Measure arguments and filters are included; sub-expressions and
    /// subquery relations are not expanded.
    pub fn expressions(&self) -> Vec<&Expr> {
        match &self.kind {
            RelKind::Read(r) => r.filter.iter().chain(r.best_effort_filter.as_ref()).collect(),
            RelKind::Filter(r) => vec![&r.condition],
            RelKind::Project(r) => r.expressions.iter().map(|e| &e.expr).collect(),
            RelKind::Join(r) => std::iter::once(&r.condition)
                .chain(r.post_filter.as_ref())
                .collect(),
            RelKind::Aggregate(r) => {
                let mut out: Vec<&Expr> = r.groupings.iter().map(|g| &g.expr).collect();
                for m in &r.measures {
                    out.extend(m.args.iter());
                    out.extend(m.filter.as_ref());
                }
                out
            }
            RelKind::Sort(r) => r.fields.iter().map(|f| &f.expr).collect(),
            RelKind::Cross(_)
            | RelKind::Fetch(_)
            | RelKind::Set(_)
            | RelKind::ExtensionLeaf(_)
            | RelKind::ExtensionSingle(_)
            | RelKind::ExtensionMulti(_) => Vec::new(),
        }
    }

    /// Relations referenced by subqueries anywhere in this node's
    /// expressions, in field order.
    pub fn subqueries(&self) -> Vec<&Rel> {
        let mut out = Vec::new();
        for expr in self.expressions() {
            expr.walk(&mut |e| {
                if let Expr::Subquery(subquery) = e {
                    out.push(subquery.rel());
                }
            });
        }
        out
    }

    /// Number of nodes in this subtree, subqueries included.
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut pending = vec![self];
        while let Some(rel) = pending.pop() {
            count += 1;
            pending.extend(rel.inputs());
            pending.extend(rel.subqueries());
        }
        count
    }
}
