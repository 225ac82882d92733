//! Core rule model.
//!
//! Rules live in an arena; identity is a small integer and every
//! cross-reference (tree parent, effective parent, portal target, boundary,
//! subgraph membership) is stored as an arena index. This keeps the graph
//! free of cyclic ownership and cheap to copy links across.

use crate::hash::fnv1a_32;
use crate::warnings::Warning;
use indexmap::IndexMap;

/// Arena index of a rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub u32);

impl RuleId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Binding tier of a rule or value.
///
/// The order is total and joins are numeric maximum: a rule's final class is
/// the join of its local class and any contamination received through the
/// effective-parent chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Classification {
    /// Absolute-resolvable at compile time.
    Static,
    /// Runtime-computable from enumerable environmental inputs.
    Deterministic,
    /// Structurally nondeterministic; only the textual fallback can carry it.
    Nondeterministic,
}

impl Classification {
    #[inline]
    pub fn join(self, other: Self) -> Self {
        self.max(other)
    }

    /// Dynamic means anything that cannot be resolved at compile time.
    #[inline]
    pub fn is_dynamic(self) -> bool {
        self != Self::Static
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Deterministic => "deterministic",
            Self::Nondeterministic => "nondeterministic",
        }
    }
}

/// Kind of environmental input a rule depends on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DepKind {
    ParentSize,
    Viewport,
    FontMetrics,
    Env,
    Theme,
    ContainerSize,
    UserPref,
    IntrinsicSize,
    Structure,
}

impl DepKind {
    /// Wire code used by the binary dependency entries.
    pub fn code(self) -> u8 {
        match self {
            Self::ParentSize => 1,
            Self::Viewport => 2,
            Self::FontMetrics => 3,
            Self::Env => 4,
            Self::Theme => 5,
            Self::ContainerSize => 6,
            Self::UserPref => 7,
            Self::IntrinsicSize => 8,
            Self::Structure => 9,
        }
    }

    /// Classification a dependency of this kind forces on its owner.
    /// Theme changes are invalidated separately by the runtime and never
    /// promote a rule out of the static tier.
    pub fn classification(self) -> Classification {
        match self {
            Self::Theme => Classification::Static,
            Self::Structure => Classification::Nondeterministic,
            _ => Classification::Deterministic,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::ParentSize => "PARENT_SIZE",
            Self::Viewport => "VIEWPORT",
            Self::FontMetrics => "FONT_METRICS",
            Self::Env => "ENV",
            Self::Theme => "THEME",
            Self::ContainerSize => "CONTAINER_SIZE",
            Self::UserPref => "USER_PREF",
            Self::IntrinsicSize => "INTRINSIC_SIZE",
            Self::Structure => "STRUCTURE",
        }
    }
}

/// Synthetic property name for media-derived viewport dependencies.
pub const MEDIA_PROPERTY: &str = "__media__";
/// Synthetic property name for structural selector dependencies.
pub const SELECTOR_PROPERTY: &str = "__selector__";

/// One dependency edge from a rule to an environmental input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DepEntry {
    /// Rule the dependency belongs to.
    pub owner: RuleId,
    /// Property name, or a synthetic sentinel for media/selector deps.
    pub property: String,
    pub kind: DepKind,
    /// Single invalidation bit. The low 31 bits are derived from the
    /// property name; bit 31 is reserved for structural invalidation.
    pub invalidation_mask: u32,
    /// Textual source of the dependency, for diagnostics.
    pub expression: String,
    /// Nearest registered container ancestor, for container-size deps.
    pub container: Option<RuleId>,
}

impl DepEntry {
    pub fn new(owner: RuleId, property: &str, kind: DepKind, expression: &str) -> Self {
        let invalidation_mask = if kind == DepKind::Structure {
            1 << 31
        } else {
            1 << (fnv1a_32(property.as_bytes()) % 31)
        };
        Self {
            owner,
            property: property.to_owned(),
            kind,
            invalidation_mask,
            expression: expression.to_owned(),
            container: None,
        }
    }
}

/// How a rule is represented in the compiled artifact.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmitType {
    /// Fully resolved static style block.
    ResolvedStyleBlock,
    /// Boundary marker plus rule set plus dependency manifest.
    DynamicBoundary,
    /// Contaminated non-boundary rule set.
    RuleSet,
    /// Structurally nondeterministic; emitted to the textual fallback and a
    /// fixed-size marker record.
    NondeterministicFallback,
}

/// A single selector's accumulated declarations and derived analysis state.
#[derive(Clone, Debug)]
pub struct ComponentNode {
    /// Stable identifier derived from the rightmost compound, uniquified by
    /// suffixing on collision.
    pub id: String,
    /// Canonical, whitespace-normalized selector text.
    pub selector: String,
    /// Parse-order integer of the first occurrence.
    pub source_order: u32,
    /// Raw declarations, unique keys, last write wins, insertion order kept.
    pub declarations: IndexMap<String, String>,
    /// Normalized declarations (colors expanded, whitespace collapsed).
    pub normalized_declarations: IndexMap<String, String>,
    /// Distinct media conditions wrapping occurrences of this rule.
    pub media_queries: Vec<String>,

    /// Nearest enclosing selector known to the rule set.
    pub tree_parent: Option<RuleId>,
    pub tree_children: Vec<RuleId>,

    /// Raw portal destination text, when declared.
    pub portal_target_raw: Option<String>,
    /// Resolved portal destination rule.
    pub portal_target: Option<RuleId>,
    /// Portal target when set, else tree parent. Severed (None) when a
    /// declared portal fails to resolve.
    pub effective_parent: Option<RuleId>,

    /// Declares `container-type: inline-size` or `size`.
    pub is_container_boundary: bool,

    /// Classification from this rule's own declarations alone.
    pub local_class: Classification,
    /// Local class joined with contamination from the effective-parent chain.
    pub final_class: Classification,
    /// Nearest ancestor that forced a stronger final class.
    pub contamination_source: Option<RuleId>,
    /// Nearest dynamic boundary in the effective-parent chain; self when this
    /// rule is itself a boundary. None for static rules.
    pub boundary: Option<RuleId>,

    pub deps: Vec<DepEntry>,
    pub warnings: Vec<Warning>,
    pub emit_type: EmitType,
}

impl ComponentNode {
    pub fn new(id: String, selector: String, source_order: u32) -> Self {
        Self {
            id,
            selector,
            source_order,
            declarations: IndexMap::new(),
            normalized_declarations: IndexMap::new(),
            media_queries: Vec::new(),
            tree_parent: None,
            tree_children: Vec::new(),
            portal_target_raw: None,
            portal_target: None,
            effective_parent: None,
            is_container_boundary: false,
            local_class: Classification::Static,
            final_class: Classification::Static,
            contamination_source: None,
            boundary: None,
            deps: Vec::new(),
            warnings: Vec::new(),
            emit_type: EmitType::ResolvedStyleBlock,
        }
    }

    /// Append a dependency unless an equal one (by property, kind, container
    /// and expression) is already present.
    pub fn add_dep(&mut self, dep: DepEntry) {
        let duplicate = self.deps.iter().any(|existing| {
            existing.property == dep.property
                && existing.kind == dep.kind
                && existing.container == dep.container
                && existing.expression == dep.expression
        });
        if !duplicate {
            self.deps.push(dep);
        }
    }

    /// Whether the rule declares a portal destination.
    #[inline]
    pub fn declares_portal(&self) -> bool {
        self.portal_target_raw.is_some()
    }
}

/// Flags attached to a boundary manifest.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ManifestFlags {
    /// Some subgraph member declares a portal.
    pub portal_dependency: bool,
    /// The entries list is empty; the boundary exists only through
    /// contamination.
    pub contamination_only: bool,
    /// A theme dependency was present before exclusion.
    pub theme_dep: bool,
}

/// Deduplicated dependency manifest emitted once per dynamic boundary.
#[derive(Clone, Debug)]
pub struct BoundaryManifest {
    pub boundary: RuleId,
    /// Contaminated members reachable through the effective-parent relation
    /// without crossing a portal, the boundary included, in source order.
    pub subgraph: Vec<RuleId>,
    /// Deduplicated non-theme dependencies across the subgraph.
    pub entries: Vec<DepEntry>,
    pub flags: ManifestFlags,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_join_is_numeric_max() {
        use Classification::*;
        assert_eq!(Static.join(Deterministic), Deterministic);
        assert_eq!(Deterministic.join(Static), Deterministic);
        assert_eq!(Deterministic.join(Nondeterministic), Nondeterministic);
        assert_eq!(Static.join(Static), Static);
    }

    #[test]
    fn theme_deps_never_promote() {
        assert_eq!(DepKind::Theme.classification(), Classification::Static);
        assert_eq!(
            DepKind::Structure.classification(),
            Classification::Nondeterministic
        );
        assert_eq!(
            DepKind::Viewport.classification(),
            Classification::Deterministic
        );
    }

    #[test]
    fn structure_deps_use_the_reserved_mask_bit() {
        let dep = DepEntry::new(RuleId(0), SELECTOR_PROPERTY, DepKind::Structure, ".x:has(a)");
        assert_eq!(dep.invalidation_mask, 1 << 31);
    }

    #[test]
    fn property_masks_stay_in_the_low_31_bits() {
        for property in ["width", "height", "font-size", "__media__"] {
            let dep = DepEntry::new(RuleId(0), property, DepKind::Viewport, "1vw");
            assert_eq!(dep.invalidation_mask.count_ones(), 1);
            assert!(dep.invalidation_mask & (1 << 31) == 0);
        }
    }

    #[test]
    fn dep_dedup_compares_all_fields() {
        let mut node = ComponentNode::new("a".into(), ".a".into(), 0);
        node.add_dep(DepEntry::new(RuleId(0), "width", DepKind::ParentSize, "50%"));
        node.add_dep(DepEntry::new(RuleId(0), "width", DepKind::ParentSize, "50%"));
        node.add_dep(DepEntry::new(RuleId(0), "width", DepKind::ParentSize, "60%"));
        node.add_dep(DepEntry::new(RuleId(0), "width", DepKind::Viewport, "50vw"));
        assert_eq!(node.deps.len(), 3);
    }
}
