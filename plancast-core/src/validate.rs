//! Structural validation for build plan documents.
//!
//! Every agent-supplied plan MUST pass validation before any canvas
//! mutation. Validation is pure: no I/O, no mutation of the input, safe to
//! call repeatedly. It short-circuits on the first violation and names the
//! offending field by path (`tree.children[0].headingLevel`).
//!
//! Grammar-level shape errors (wrong JSON types, unknown element kinds)
//! surface from the serde layer at parse time; this module owns all
//! value-level rules.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::plan::{
    BuildPlan, ElementKind, ElementNode, PropertyMap, StyleDef, BREAKPOINTS, MAX_TREE_DEPTH,
    PLAN_VERSION, PSEUDO_STATES, SHORTHAND_PROPERTIES,
};

/// A structural violation that blocks the entire plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The document version is absent or not the supported literal.
    #[error("unsupported plan version {found:?}, expected {PLAN_VERSION:?}")]
    UnsupportedVersion {
        /// The version string found (empty when absent).
        found: String,
    },

    /// A required field is absent or empty.
    #[error("{path}: required field is missing")]
    MissingField {
        /// Path of the missing field.
        path: String,
    },

    /// A slug field is not kebab-case.
    #[error("{path}: {value:?} is not a kebab-case slug")]
    NotKebabCase {
        /// Path of the offending field.
        path: String,
        /// The value found.
        value: String,
    },

    /// `order` is absent or not a positive integer.
    #[error("order must be a positive integer")]
    InvalidOrder,

    /// Two styles in the plan share a name.
    #[error("{path}: duplicate style name {name:?}")]
    DuplicateStyleName {
        /// Path of the second occurrence.
        path: String,
        /// The duplicated name.
        name: String,
    },

    /// A property map uses a forbidden shorthand key.
    #[error("{path}: {property:?} is a shorthand; declare longhand properties instead")]
    ShorthandProperty {
        /// Path of the property map.
        path: String,
        /// The shorthand key found.
        property: String,
    },

    /// A breakpoints map uses an identifier outside the known set.
    #[error("{path}: unknown breakpoint {id:?}")]
    UnknownBreakpoint {
        /// Path of the breakpoints entry.
        path: String,
        /// The identifier found.
        id: String,
    },

    /// A pseudo map uses an identifier outside the known set.
    #[error("{path}: unknown pseudo state {id:?}")]
    UnknownPseudoState {
        /// Path of the pseudo entry.
        path: String,
        /// The identifier found.
        id: String,
    },

    /// The tree root is not a `Section` element.
    #[error("tree: root element must be a Section (got {found})")]
    RootNotSection {
        /// The kind found at the root.
        found: ElementKind,
    },

    /// The tree nests deeper than [`MAX_TREE_DEPTH`].
    #[error("{path}: nesting exceeds the maximum depth of {MAX_TREE_DEPTH}")]
    DepthExceeded {
        /// Path of the too-deep node.
        path: String,
    },

    /// A heading level is outside 1-6.
    #[error("{path}: headingLevel must be between 1 and 6 (got {found})")]
    InvalidHeadingLevel {
        /// Path of the heading node.
        path: String,
        /// The level found.
        found: u8,
    },

    /// A field required by the node's kind is absent.
    #[error("{path}: {field} is required for {kind} elements")]
    MissingKindField {
        /// Path of the node.
        path: String,
        /// The missing field name.
        field: &'static str,
        /// The node's kind.
        kind: ElementKind,
    },
}

/// A plan that has passed structural validation.
///
/// Fields are private so an instance can only be obtained through
/// [`validate`], which is what lets the materialization stages assume the
/// invariants hold (root is a `Section`, conditionally required fields are
/// present, depth is bounded).
#[derive(Debug, Clone)]
pub struct ValidatedPlan {
    site_id: String,
    section_name: String,
    order: u32,
    styles: Vec<StyleDef>,
    tree: ElementNode,
}

impl ValidatedPlan {
    /// The site this plan targets.
    #[must_use]
    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    /// The section slug.
    #[must_use]
    pub fn section_name(&self) -> &str {
        &self.section_name
    }

    /// The build sequence number.
    #[must_use]
    pub const fn order(&self) -> u32 {
        self.order
    }

    /// Styles in application order.
    #[must_use]
    pub fn styles(&self) -> &[StyleDef] {
        &self.styles
    }

    /// The element tree. The root is guaranteed to be a `Section`.
    #[must_use]
    pub const fn tree(&self) -> &ElementNode {
        &self.tree
    }
}

/// Validate a parsed plan document, returning the normalized plan.
///
/// Rules are checked in order: version literal, `siteId`, `sectionName`,
/// `order`, each style (name, shorthand denylist, breakpoint and pseudo
/// identifiers, duplicates), then the tree (root kind, per-node class and
/// kind rules, depth limit).
///
/// # Errors
///
/// Returns the first [`ValidationError`] encountered, naming the offending
/// field by path.
pub fn validate(plan: &BuildPlan) -> Result<ValidatedPlan, ValidationError> {
    let version = plan.version.clone().unwrap_or_default();
    if version != PLAN_VERSION {
        return Err(ValidationError::UnsupportedVersion { found: version });
    }

    if plan.site_id.is_empty() {
        return Err(ValidationError::MissingField {
            path: "siteId".to_string(),
        });
    }

    if plan.section_name.is_empty() {
        return Err(ValidationError::MissingField {
            path: "sectionName".to_string(),
        });
    }
    if !is_kebab_case(&plan.section_name) {
        return Err(ValidationError::NotKebabCase {
            path: "sectionName".to_string(),
            value: plan.section_name.clone(),
        });
    }

    let order = match plan.order {
        Some(order) if order > 0 => order,
        _ => return Err(ValidationError::InvalidOrder),
    };

    let mut seen = BTreeSet::new();
    for (index, style) in plan.styles.iter().enumerate() {
        let path = format!("styles[{index}]");
        validate_style(style, &path)?;
        if !seen.insert(style.name.as_str()) {
            return Err(ValidationError::DuplicateStyleName {
                path,
                name: style.name.clone(),
            });
        }
    }

    let tree = plan.tree.as_ref().ok_or_else(|| ValidationError::MissingField {
        path: "tree".to_string(),
    })?;
    if tree.kind != ElementKind::Section {
        return Err(ValidationError::RootNotSection { found: tree.kind });
    }
    validate_node(tree, "tree", 1)?;

    Ok(ValidatedPlan {
        site_id: plan.site_id.clone(),
        section_name: plan.section_name.clone(),
        order,
        styles: plan.styles.clone(),
        tree: tree.clone(),
    })
}

/// Check one style definition.
fn validate_style(style: &StyleDef, path: &str) -> Result<(), ValidationError> {
    if style.name.is_empty() {
        return Err(ValidationError::MissingField {
            path: format!("{path}.name"),
        });
    }
    if !is_kebab_case(&style.name) {
        return Err(ValidationError::NotKebabCase {
            path: format!("{path}.name"),
            value: style.name.clone(),
        });
    }

    check_properties(&style.properties, &format!("{path}.properties"))?;

    for (id, properties) in &style.breakpoints {
        let entry_path = format!("{path}.breakpoints.{id}");
        if !BREAKPOINTS.contains(&id.as_str()) {
            return Err(ValidationError::UnknownBreakpoint {
                path: entry_path,
                id: id.clone(),
            });
        }
        check_properties(properties, &entry_path)?;
    }

    for (id, properties) in &style.pseudo {
        let entry_path = format!("{path}.pseudo.{id}");
        if !PSEUDO_STATES.contains(&id.as_str()) {
            return Err(ValidationError::UnknownPseudoState {
                path: entry_path,
                id: id.clone(),
            });
        }
        check_properties(properties, &entry_path)?;
    }

    Ok(())
}

/// Reject shorthand keys in a property map.
fn check_properties(properties: &PropertyMap, path: &str) -> Result<(), ValidationError> {
    for key in properties.keys() {
        if SHORTHAND_PROPERTIES.contains(&key.as_str()) {
            return Err(ValidationError::ShorthandProperty {
                path: path.to_string(),
                property: key.clone(),
            });
        }
    }
    Ok(())
}

/// Recursively check one node. `depth` counts the root as 1.
fn validate_node(node: &ElementNode, path: &str, depth: usize) -> Result<(), ValidationError> {
    if depth > MAX_TREE_DEPTH {
        return Err(ValidationError::DepthExceeded {
            path: path.to_string(),
        });
    }

    if node.class_name.is_empty() {
        return Err(ValidationError::MissingField {
            path: format!("{path}.className"),
        });
    }
    if !is_kebab_case(&node.class_name) {
        return Err(ValidationError::NotKebabCase {
            path: format!("{path}.className"),
            value: node.class_name.clone(),
        });
    }

    match node.kind {
        ElementKind::Heading => match node.heading_level {
            None => {
                return Err(ValidationError::MissingKindField {
                    path: path.to_string(),
                    field: "headingLevel",
                    kind: node.kind,
                });
            }
            Some(level) if !(1..=6).contains(&level) => {
                return Err(ValidationError::InvalidHeadingLevel {
                    path: format!("{path}.headingLevel"),
                    found: level,
                });
            }
            Some(_) => {}
        },
        ElementKind::Button | ElementKind::TextLink | ElementKind::LinkBlock => {
            if node.href.is_none() {
                return Err(ValidationError::MissingKindField {
                    path: path.to_string(),
                    field: "href",
                    kind: node.kind,
                });
            }
        }
        ElementKind::Image => {
            if node.src.is_none() {
                return Err(ValidationError::MissingKindField {
                    path: path.to_string(),
                    field: "src",
                    kind: node.kind,
                });
            }
            if node.alt.is_none() {
                return Err(ValidationError::MissingKindField {
                    path: path.to_string(),
                    field: "alt",
                    kind: node.kind,
                });
            }
        }
        ElementKind::Dom => {
            if node.dom_tag.is_none() {
                return Err(ValidationError::MissingKindField {
                    path: path.to_string(),
                    field: "domTag",
                    kind: node.kind,
                });
            }
        }
        _ => {}
    }

    for (index, child) in node.children.iter().enumerate() {
        validate_node(child, &format!("{path}.children[{index}]"), depth + 1)?;
    }

    Ok(())
}

/// `^[a-z0-9]+(-[a-z0-9]+)*$` without pulling in a regex engine.
fn is_kebab_case(value: &str) -> bool {
    !value.is_empty()
        && !value.starts_with('-')
        && !value.ends_with('-')
        && !value.contains("--")
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}
