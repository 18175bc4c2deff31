//! Build plan documents - the declarative description of one page section.
//!
//! A [`BuildPlan`] is authored by an agent, serialized as JSON, and queued
//! for a canvas-holding process to materialize. The document is constructed
//! once from parsed input and consumed read-only; nothing here mutates it.
//!
//! ## Example plan JSON
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "siteId": "s1",
//!   "sectionName": "hero",
//!   "order": 1,
//!   "styles": [
//!     { "name": "hero-section", "properties": { "padding-top": "80px" } }
//!   ],
//!   "tree": {
//!     "type": "Section",
//!     "className": "hero-section",
//!     "children": [
//!       { "type": "Heading", "className": "hero-h1", "headingLevel": 1, "text": "Welcome" }
//!     ]
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The only plan document version this crate understands.
pub const PLAN_VERSION: &str = "1.0";

/// Maximum element nesting depth, counting the root as depth 1.
pub const MAX_TREE_DEPTH: usize = 6;

/// CSS shorthand properties forbidden in style property maps.
///
/// Plans must declare longhand properties so that later plans can override
/// a single side or axis without clobbering the rest of the shorthand.
pub const SHORTHAND_PROPERTIES: [&str; 15] = [
    "padding",
    "margin",
    "border-radius",
    "gap",
    "row-gap",
    "column-gap",
    "background",
    "font",
    "border",
    "outline",
    "list-style",
    "animation",
    "transition",
    "flex",
    "grid-template",
];

/// Responsive breakpoint identifiers. Base properties are unprefixed.
pub const BREAKPOINTS: [&str; 6] = ["xxl", "xl", "large", "medium", "small", "tiny"];

/// Pseudo-state identifiers accepted in style overrides.
pub const PSEUDO_STATES: [&str; 14] = [
    "hover",
    "active",
    "focus",
    "visited",
    "before",
    "after",
    "first-child",
    "last-child",
    "nth-child(odd)",
    "nth-child(even)",
    "placeholder",
    "focus-visible",
    "focus-within",
    "empty",
];

/// The kind of element a node materializes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementKind {
    /// Top-level page section. The only legal tree root.
    Section,
    /// Generic block-level division.
    DivBlock,
    /// Width-constrained layout wrapper.
    Container,
    /// Heading; the level (1-6) is carried on the node.
    Heading,
    /// Paragraph of flowing text.
    Paragraph,
    /// Inline text block.
    TextBlock,
    /// Clickable button. Link-bearing.
    Button,
    /// Inline text link. Link-bearing.
    TextLink,
    /// Block-level link wrapper. Link-bearing.
    LinkBlock,
    /// Image with source and alt text.
    Image,
    /// Arbitrary element with a tag declared on the node.
    #[serde(rename = "DOM")]
    Dom,
}

impl ElementKind {
    /// Whether nodes of this kind require an `href`.
    #[must_use]
    pub const fn takes_href(self) -> bool {
        matches!(self, Self::Button | Self::TextLink | Self::LinkBlock)
    }

    /// The name this kind carries on the wire.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Section => "Section",
            Self::DivBlock => "DivBlock",
            Self::Container => "Container",
            Self::Heading => "Heading",
            Self::Paragraph => "Paragraph",
            Self::TextBlock => "TextBlock",
            Self::Button => "Button",
            Self::TextLink => "TextLink",
            Self::LinkBlock => "LinkBlock",
            Self::Image => "Image",
            Self::Dom => "DOM",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// A custom attribute applied to a materialized element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute name.
    pub name: String,
    /// Attribute value.
    pub value: String,
}

/// One node of a plan's element tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementNode {
    /// Element kind.
    #[serde(rename = "type")]
    pub kind: ElementKind,
    /// Kebab-case class the element is styled by. Required.
    #[serde(default)]
    pub class_name: String,
    /// Text content, for kinds that render text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Heading level (1-6). Required for `Heading` nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_level: Option<u8>,
    /// Link target. Required for link-bearing kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    /// Image source. Required for `Image` nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    /// Image alt text. Required for `Image` nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    /// Declared tag. Required for `DOM` nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dom_tag: Option<String>,
    /// Custom attributes, applied in declared order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<Attribute>,
    /// Child nodes, materialized left to right.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ElementNode>,
}

impl ElementNode {
    /// Create a node of the given kind and class.
    #[must_use]
    pub fn new(kind: ElementKind, class_name: impl Into<String>) -> Self {
        Self {
            kind,
            class_name: class_name.into(),
            text: None,
            heading_level: None,
            href: None,
            src: None,
            alt: None,
            dom_tag: None,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Set the text content.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Set the heading level.
    #[must_use]
    pub fn with_heading_level(mut self, level: u8) -> Self {
        self.heading_level = Some(level);
        self
    }

    /// Set the link target.
    #[must_use]
    pub fn with_href(mut self, href: impl Into<String>) -> Self {
        self.href = Some(href.into());
        self
    }

    /// Set the image source and alt text.
    #[must_use]
    pub fn with_image(mut self, src: impl Into<String>, alt: impl Into<String>) -> Self {
        self.src = Some(src.into());
        self.alt = Some(alt.into());
        self
    }

    /// Set the declared tag for a `DOM` node.
    #[must_use]
    pub fn with_dom_tag(mut self, tag: impl Into<String>) -> Self {
        self.dom_tag = Some(tag.into());
        self
    }

    /// Append a custom attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(Attribute {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Append a child node.
    #[must_use]
    pub fn with_child(mut self, child: ElementNode) -> Self {
        self.children.push(child);
        self
    }

    /// The tag this node materializes with.
    ///
    /// Derivation is table-driven: headings become `h{level}`, link-bearing
    /// kinds become `a`, `DOM` nodes use their declared tag, and kinds with
    /// no mapping fall through to their wire name.
    #[must_use]
    pub fn tag(&self) -> String {
        match self.kind {
            ElementKind::Heading => format!("h{}", self.heading_level.unwrap_or(1)),
            ElementKind::Section => "section".to_string(),
            ElementKind::Container => "div".to_string(),
            ElementKind::Paragraph => "p".to_string(),
            ElementKind::Button | ElementKind::TextLink | ElementKind::LinkBlock => {
                "a".to_string()
            }
            ElementKind::Image => "img".to_string(),
            ElementKind::Dom => self
                .dom_tag
                .clone()
                .unwrap_or_else(|| "div".to_string()),
            other => other.wire_name().to_string(),
        }
    }
}

/// Map of CSS longhand property name to value.
pub type PropertyMap = BTreeMap<String, String>;

/// A named, reusable collection of CSS longhand values with optional
/// responsive and pseudo-state overrides.
///
/// A plan exclusively owns its style list; styles are looked up by name
/// against the canvas's global style namespace, which outlives any plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleDef {
    /// Style (class) name. Kebab-case, unique within a plan.
    pub name: String,
    /// Base property map.
    #[serde(default)]
    pub properties: PropertyMap,
    /// Per-breakpoint property overrides, keyed by breakpoint id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub breakpoints: BTreeMap<String, PropertyMap>,
    /// Per-pseudo-state property overrides, keyed by pseudo-state id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pseudo: BTreeMap<String, PropertyMap>,
}

impl StyleDef {
    /// Create an empty style with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set a base property.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Set a property under a breakpoint.
    #[must_use]
    pub fn with_breakpoint_property(
        mut self,
        breakpoint: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.breakpoints
            .entry(breakpoint.into())
            .or_default()
            .insert(name.into(), value.into());
        self
    }

    /// Set a property under a pseudo state.
    #[must_use]
    pub fn with_pseudo_property(
        mut self,
        pseudo: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.pseudo
            .entry(pseudo.into())
            .or_default()
            .insert(name.into(), value.into());
        self
    }
}

/// The declarative document describing one page section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildPlan {
    /// Document version. Must equal [`PLAN_VERSION`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Opaque site identifier.
    #[serde(default)]
    pub site_id: String,
    /// Kebab-case section slug.
    #[serde(default)]
    pub section_name: String,
    /// Build sequence. Must be a positive integer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
    /// Styles the section depends on, in application order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub styles: Vec<StyleDef>,
    /// The element tree. The root must be a `Section`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree: Option<ElementNode>,
}

impl BuildPlan {
    /// Create a plan with the current document version.
    #[must_use]
    pub fn new(
        site_id: impl Into<String>,
        section_name: impl Into<String>,
        order: u32,
        tree: ElementNode,
    ) -> Self {
        Self {
            version: Some(PLAN_VERSION.to_string()),
            site_id: site_id.into(),
            section_name: section_name.into(),
            order: Some(order),
            styles: Vec::new(),
            tree: Some(tree),
        }
    }

    /// Append a style definition.
    #[must_use]
    pub fn with_style(mut self, style: StyleDef) -> Self {
        self.styles.push(style);
        self
    }

    /// Parse a plan from JSON.
    ///
    /// This checks only the document grammar; call
    /// [`validate`](crate::validate::validate) before materializing.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or does not match the
    /// plan grammar.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the plan to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
