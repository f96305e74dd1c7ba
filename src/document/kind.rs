//! Static table of document kinds.
//!
//! A kind fixes the title pattern, the header-to-field mapping, and the
//! default refinement policy for every document of that shape. The table is
//! compiled in; parsing and rendering are driven entirely by these entries,
//! so adding a kind is a data change, not a code change.

use crate::session::RefinementPolicy;

/// Where a field lives in the rendered markdown.
///
/// Depth one is a plain `##` section. Depth two nests a `###` under a
/// container `##` that is emitted once and shared by sibling fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderPath {
    pub h2: &'static str,
    pub h3: Option<&'static str>,
}

impl HeaderPath {
    pub const fn section(h2: &'static str) -> Self {
        Self { h2, h3: None }
    }

    pub const fn nested(h2: &'static str, h3: &'static str) -> Self {
        Self { h2, h3: Some(h3) }
    }
}

/// One typed field of a document kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub path: HeaderPath,
    /// Bullet list body rather than free text.
    pub list: bool,
    /// Updates may not change this field once the document exists.
    pub frozen: bool,
}

impl FieldSpec {
    const fn text(name: &'static str, path: HeaderPath) -> Self {
        Self {
            name,
            path,
            list: false,
            frozen: false,
        }
    }

    const fn list(name: &'static str, path: HeaderPath) -> Self {
        Self {
            name,
            path,
            list: true,
            frozen: false,
        }
    }

    const fn frozen(mut self) -> Self {
        self.frozen = true;
        self
    }
}

/// A document shape: title pattern, field mapping, default policy.
#[derive(Debug, Clone, Copy)]
pub struct DocumentKind {
    pub id: &'static str,
    /// Literal prefix of the H1 title line, e.g. `"# Phase: "`.
    pub title_prefix: &'static str,
    /// Whether the title itself must be lowercase-kebab-case.
    pub kebab_title: bool,
    pub fields: &'static [FieldSpec],
    pub policy: RefinementPolicy,
}

impl DocumentKind {
    /// Whether any declared field path uses this H2 title.
    pub fn maps_header(&self, h2: &str) -> bool {
        self.fields.iter().any(|f| f.path.h2 == h2)
    }

    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

const CHARTER_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("vision", HeaderPath::section("Vision")).frozen(),
    FieldSpec::list("goals", HeaderPath::section("Goals")),
    FieldSpec::list("constraints", HeaderPath::section("Constraints")),
    FieldSpec::list("success_criteria", HeaderPath::section("Success Criteria")),
];

const PHASE_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("objective", HeaderPath::section("Objective")).frozen(),
    FieldSpec::text("scope", HeaderPath::section("Scope")),
    FieldSpec::list("deliverables", HeaderPath::section("Deliverables")),
    FieldSpec::list("acceptance_criteria", HeaderPath::section("Acceptance Criteria")).frozen(),
    FieldSpec::list("risks", HeaderPath::section("Risks")),
    FieldSpec::list("dependencies", HeaderPath::section("Dependencies")),
];

const DESIGN_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("summary", HeaderPath::section("Summary")).frozen(),
    FieldSpec::text("context", HeaderPath::section("Context")),
    FieldSpec::text("decision", HeaderPath::nested("Approach", "Decision")),
    FieldSpec::text("rollout", HeaderPath::nested("Approach", "Rollout")),
    FieldSpec::list("alternatives", HeaderPath::section("Alternatives")),
    FieldSpec::list("open_questions", HeaderPath::section("Open Questions")),
];

/// Every kind the crate understands, in detection order.
pub const KINDS: &[DocumentKind] = &[
    DocumentKind {
        id: "charter",
        title_prefix: "# Charter: ",
        kebab_title: false,
        fields: CHARTER_FIELDS,
        policy: RefinementPolicy {
            score_threshold: 90,
            max_iterations: 5,
            improvement_threshold: 5,
        },
    },
    DocumentKind {
        id: "phase",
        title_prefix: "# Phase: ",
        kebab_title: true,
        fields: PHASE_FIELDS,
        policy: RefinementPolicy {
            score_threshold: 85,
            max_iterations: 8,
            improvement_threshold: 5,
        },
    },
    DocumentKind {
        id: "design",
        title_prefix: "# Design: ",
        kebab_title: true,
        fields: DESIGN_FIELDS,
        policy: RefinementPolicy {
            score_threshold: 80,
            max_iterations: 6,
            improvement_threshold: 3,
        },
    },
];

/// Look up a kind by its identifier.
pub fn lookup(id: &str) -> Option<&'static DocumentKind> {
    KINDS.iter().find(|k| k.id == id)
}
