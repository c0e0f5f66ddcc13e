//! Hierarchy navigator
//!
//! Fixed dimensional hierarchies (Time, Geography, Product), each an
//! ordered sequence of levels, coarse to fine. Drill-down and roll-up are
//! the same resolution with different default edges: both resolve a target
//! level to the column prefix `[level_0 .. target]`.
//!
//! Resolution is deliberately forgiving: an unknown level name falls back
//! to the hierarchy's default edge (finest for drill-down, coarsest for
//! roll-up) instead of failing. The deterministic planner relies on this
//! when it guesses a level that does not exist.

use crate::error::Result;
use crate::query::builder::{group_query_columns, BoundQuery};
use crate::types::FilterSet;

/// One level of a hierarchy.
#[derive(Debug, Clone, Copy)]
pub struct HierarchyLevel {
    /// Logical level name used in plans (e.g. "quarter")
    pub name: &'static str,
    /// Display label (e.g. "Quarter")
    pub label: &'static str,
    /// Physical column in the star-schema join
    pub column: &'static str,
}

/// An ordered dimensional hierarchy, coarse to fine.
#[derive(Debug, Clone, Copy)]
pub struct Hierarchy {
    /// Hierarchy name used in plans
    pub name: &'static str,
    /// Levels in coarse-to-fine order
    pub levels: &'static [HierarchyLevel],
}

/// Which edge of a hierarchy a missing or unknown level resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelEdge {
    /// Coarsest level (roll-up default)
    Coarsest,
    /// Finest level (drill-down default)
    Finest,
}

const TIME: Hierarchy = Hierarchy {
    name: "time",
    levels: &[
        HierarchyLevel {
            name: "year",
            label: "Year",
            column: "d.year",
        },
        HierarchyLevel {
            name: "quarter",
            label: "Quarter",
            column: "d.quarter",
        },
        HierarchyLevel {
            name: "month",
            label: "Month",
            column: "d.month_name",
        },
    ],
};

const GEOGRAPHY: Hierarchy = Hierarchy {
    name: "geography",
    levels: &[
        HierarchyLevel {
            name: "region",
            label: "Region",
            column: "g.region",
        },
        HierarchyLevel {
            name: "country",
            label: "Country",
            column: "g.country",
        },
    ],
};

const PRODUCT: Hierarchy = Hierarchy {
    name: "product",
    levels: &[
        HierarchyLevel {
            name: "category",
            label: "Category",
            column: "p.category",
        },
        HierarchyLevel {
            name: "subcategory",
            label: "Subcategory",
            column: "p.subcategory",
        },
    ],
};

/// Look up a hierarchy by name; unknown names resolve to Time, matching
/// the permissive handling of planner-supplied values.
pub fn hierarchy(name: &str) -> &'static Hierarchy {
    match name {
        "geography" => &GEOGRAPHY,
        "product" => &PRODUCT,
        _ => &TIME,
    }
}

impl Hierarchy {
    /// Resolve a requested level to an index into `levels`.
    ///
    /// A missing or unknown level name resolves to `default_edge`.
    pub fn resolve_level(&self, requested: Option<&str>, default_edge: LevelEdge) -> usize {
        requested
            .and_then(|name| self.levels.iter().position(|l| l.name == name))
            .unwrap_or(match default_edge {
                LevelEdge::Coarsest => 0,
                LevelEdge::Finest => self.levels.len() - 1,
            })
    }

    /// Grouping columns for the prefix up to and including `level_idx`.
    pub fn grouping_columns(&self, level_idx: usize) -> Vec<(&'static str, &'static str)> {
        self.levels[..=level_idx]
            .iter()
            .map(|l| (l.name, l.column))
            .collect()
    }

    /// Display path for the prefix, e.g. `Year → Quarter`.
    pub fn label_path(&self, level_idx: usize) -> String {
        self.levels[..=level_idx]
            .iter()
            .map(|l| l.label)
            .collect::<Vec<_>>()
            .join(" → ")
    }

    /// Name of the level at an index.
    pub fn level_name(&self, level_idx: usize) -> &'static str {
        self.levels[level_idx].name
    }

    /// Build the aggregate query grouped by the prefix up to `level_idx`.
    pub fn prefix_query(&self, level_idx: usize, filters: &FilterSet) -> Result<BoundQuery> {
        group_query_columns(&self.grouping_columns(level_idx), filters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_hierarchy_defaults_to_time() {
        assert_eq!(hierarchy("time").name, "time");
        assert_eq!(hierarchy("galaxy").name, "time");
        assert_eq!(hierarchy("geography").name, "geography");
    }

    #[test]
    fn test_resolve_known_level() {
        let time = hierarchy("time");
        assert_eq!(time.resolve_level(Some("quarter"), LevelEdge::Finest), 1);
        assert_eq!(time.resolve_level(Some("year"), LevelEdge::Finest), 0);
    }

    #[test]
    fn test_unknown_level_falls_back_to_edge() {
        let time = hierarchy("time");
        // drill-down default: finest
        assert_eq!(time.resolve_level(Some("decade"), LevelEdge::Finest), 2);
        assert_eq!(time.resolve_level(None, LevelEdge::Finest), 2);
        // roll-up default: coarsest
        assert_eq!(time.resolve_level(Some("decade"), LevelEdge::Coarsest), 0);
        assert_eq!(time.resolve_level(None, LevelEdge::Coarsest), 0);
    }

    #[test]
    fn test_grouping_columns_are_a_prefix() {
        let time = hierarchy("time");
        let cols = time.grouping_columns(1);
        assert_eq!(cols, vec![("year", "d.year"), ("quarter", "d.quarter")]);
        assert_eq!(time.label_path(1), "Year → Quarter");
    }

    #[test]
    fn test_prefix_query_groups_by_levels() {
        let product = hierarchy("product");
        let idx = product.resolve_level(Some("subcategory"), LevelEdge::Finest);
        let q = product.prefix_query(idx, &FilterSet::new()).unwrap();
        assert!(q.sql.contains("GROUP BY p.category, p.subcategory"));
    }
}
