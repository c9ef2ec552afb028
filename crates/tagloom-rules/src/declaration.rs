//! Uncompiled rule declarations.
//!
//! These types are what users write, either in code through the builder
//! methods or as JSON through [`RulesDocument`]. They refer to tags by name;
//! [`RuleTableBuilder`](crate::RuleTableBuilder) resolves the names and folds
//! the permissions into bitsets.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::RuleFlags;

/// Whether a permission set starts out with every known tag or none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultRule {
    /// Seed the set with every known tag.
    #[default]
    Allow,
    /// Seed the set empty.
    Deny,
}

/// Allow and deny lists of a tag or of the document root.
///
/// Denials always win over allowances, whatever the order they were added in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PermissionDeclaration {
    /// Seed of both sets; overrides the table-wide default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_rule: Option<DefaultRule>,
    /// Seed of the child set; overrides `default_rule`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_child_rule: Option<DefaultRule>,
    /// Seed of the descendant set; overrides `default_rule`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_descendant_rule: Option<DefaultRule>,
    /// Tags allowed as direct children.
    pub allow_child: Vec<String>,
    /// Tags denied as direct children.
    pub deny_child: Vec<String>,
    /// Tags allowed anywhere below.
    pub allow_descendant: Vec<String>,
    /// Tags denied anywhere below, children included.
    pub deny_descendant: Vec<String>,
}

/// A filter as written in a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FilterDeclaration {
    /// See [`AttributeFilter::Url`](crate::AttributeFilter::Url).
    Url {
        /// Accepted schemes; `http` and `https` when absent.
        #[serde(default, rename = "allowedSchemes", skip_serializing_if = "Option::is_none")]
        allowed_schemes: Option<Vec<String>>,
        /// Rejected hosts.
        #[serde(default, rename = "disallowedHosts")]
        disallowed_hosts: Vec<String>,
    },
    /// Any value.
    Text,
    /// ASCII digits.
    Number,
    /// Signed integer.
    Int,
    /// Unsigned integer.
    Uint,
    /// Floating point number.
    Float,
    /// Email address.
    Email,
    /// CSS-like color.
    Color,
    /// Values matching `pattern`.
    Regexp {
        /// Regular expression the value must match.
        pattern: String,
    },
    /// Several filters in sequence.
    Compound {
        /// The filters, in application order.
        filters: Vec<FilterDeclaration>,
    },
    /// Integer clamped into a range.
    Range {
        /// Lower bound.
        min: i64,
        /// Upper bound.
        max: i64,
    },
    /// Restricted text.
    #[serde(rename = "simpletext")]
    SimpleText,
    /// Identifier characters.
    Identifier,
    /// A filter registered on the builder under `name`.
    Custom {
        /// Registration name.
        name: String,
    },
}

/// Validation rules of one attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttributeDeclaration {
    /// Filters applied in order.
    pub filters: Vec<FilterDeclaration>,
    /// Whether the tag is rejected when the attribute is missing or invalid.
    pub required: bool,
    /// Value used when the attribute is missing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

impl Default for AttributeDeclaration {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            required: true,
            default_value: None,
        }
    }
}

impl AttributeDeclaration {
    /// A required attribute with the given filters.
    #[must_use]
    pub fn new(filters: Vec<FilterDeclaration>) -> Self {
        Self {
            filters,
            ..Self::default()
        }
    }

    /// Make the attribute optional.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Use `value` when the attribute is missing.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

/// Extracts attributes from another attribute's value with a regex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprocessorDeclaration {
    /// Attribute whose value is matched.
    pub source: String,
    /// Regex with named groups; each group that matched becomes an attribute.
    pub regex: String,
}

/// Rules of one tag name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TagDeclaration {
    /// Tag name, matched exactly against candidate names.
    pub name: String,
    /// Allowed children and descendants.
    #[serde(flatten)]
    pub permissions: PermissionDeclaration,
    /// Behavior switches.
    pub flags: RuleFlags,
    /// The tag is only valid directly inside this tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_parent: Option<String>,
    /// The tag is only valid somewhere inside all of these tags.
    pub require_ancestor: Vec<String>,
    /// Opening this tag first closes a parent with one of these names.
    pub close_parent: Vec<String>,
    /// Opening this tag first closes an ancestor with one of these names.
    pub close_ancestor: Vec<String>,
    /// Like `close_parent`, but the parent continues inside this tag.
    pub foster_parent: Vec<String>,
    /// Tags opened automatically right after this one.
    pub create_child: Vec<String>,
    /// How deep the tag may nest in itself; 10 when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nesting_limit: Option<usize>,
    /// How many times the tag may be used per document; 5000 when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_limit: Option<usize>,
    /// Declared attributes; any other attribute is removed.
    pub attributes: BTreeMap<String, AttributeDeclaration>,
    /// Attribute preprocessors, run before filtering.
    pub preprocessors: Vec<PreprocessorDeclaration>,
}

fn names<I, S>(names: I) -> impl Iterator<Item = String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    names.into_iter().map(Into::into)
}

impl TagDeclaration {
    /// A tag with default rules.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add behavior flags.
    #[must_use]
    pub fn flags(mut self, flags: RuleFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Set the seed of both permission sets.
    #[must_use]
    pub fn default_rule(mut self, rule: DefaultRule) -> Self {
        self.permissions.default_rule = Some(rule);
        self
    }

    /// Set the seed of the child set only.
    #[must_use]
    pub fn default_child_rule(mut self, rule: DefaultRule) -> Self {
        self.permissions.default_child_rule = Some(rule);
        self
    }

    /// Set the seed of the descendant set only.
    #[must_use]
    pub fn default_descendant_rule(mut self, rule: DefaultRule) -> Self {
        self.permissions.default_descendant_rule = Some(rule);
        self
    }

    /// Allow tags as direct children.
    #[must_use]
    pub fn allow_child<I: IntoIterator<Item = S>, S: Into<String>>(mut self, tags: I) -> Self {
        self.permissions.allow_child.extend(names(tags));
        self
    }

    /// Deny tags as direct children.
    #[must_use]
    pub fn deny_child<I: IntoIterator<Item = S>, S: Into<String>>(mut self, tags: I) -> Self {
        self.permissions.deny_child.extend(names(tags));
        self
    }

    /// Allow tags anywhere below.
    #[must_use]
    pub fn allow_descendant<I: IntoIterator<Item = S>, S: Into<String>>(mut self, tags: I) -> Self {
        self.permissions.allow_descendant.extend(names(tags));
        self
    }

    /// Deny tags anywhere below.
    #[must_use]
    pub fn deny_descendant<I: IntoIterator<Item = S>, S: Into<String>>(mut self, tags: I) -> Self {
        self.permissions.deny_descendant.extend(names(tags));
        self
    }

    /// Require a direct parent.
    #[must_use]
    pub fn require_parent(mut self, tag: impl Into<String>) -> Self {
        self.require_parent = Some(tag.into());
        self
    }

    /// Require ancestors.
    #[must_use]
    pub fn require_ancestor<I: IntoIterator<Item = S>, S: Into<String>>(mut self, tags: I) -> Self {
        self.require_ancestor.extend(names(tags));
        self
    }

    /// Close these tags when they are the parent.
    #[must_use]
    pub fn close_parent<I: IntoIterator<Item = S>, S: Into<String>>(mut self, tags: I) -> Self {
        self.close_parent.extend(names(tags));
        self
    }

    /// Close these tags when they are an ancestor.
    #[must_use]
    pub fn close_ancestor<I: IntoIterator<Item = S>, S: Into<String>>(mut self, tags: I) -> Self {
        self.close_ancestor.extend(names(tags));
        self
    }

    /// Close these parents and continue them inside this tag.
    #[must_use]
    pub fn foster_parent<I: IntoIterator<Item = S>, S: Into<String>>(mut self, tags: I) -> Self {
        self.foster_parent.extend(names(tags));
        self
    }

    /// Open these tags automatically inside this one.
    #[must_use]
    pub fn create_child<I: IntoIterator<Item = S>, S: Into<String>>(mut self, tags: I) -> Self {
        self.create_child.extend(names(tags));
        self
    }

    /// Set the nesting limit.
    #[must_use]
    pub fn nesting_limit(mut self, limit: usize) -> Self {
        self.nesting_limit = Some(limit);
        self
    }

    /// Set the per-document limit.
    #[must_use]
    pub fn tag_limit(mut self, limit: usize) -> Self {
        self.tag_limit = Some(limit);
        self
    }

    /// Declare an attribute.
    #[must_use]
    pub fn attribute(mut self, name: impl Into<String>, attribute: AttributeDeclaration) -> Self {
        let _ = self.attributes.insert(name.into(), attribute);
        self
    }

    /// Add an attribute preprocessor.
    #[must_use]
    pub fn preprocessor(mut self, source: impl Into<String>, regex: impl Into<String>) -> Self {
        self.preprocessors.push(PreprocessorDeclaration {
            source: source.into(),
            regex: regex.into(),
        });
        self
    }
}

/// Rules of the document root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RootDeclaration {
    /// Tags allowed at the top level and below.
    #[serde(flatten)]
    pub permissions: PermissionDeclaration,
    /// Flags of the root context.
    pub flags: RuleFlags,
}

impl RootDeclaration {
    /// Root rules with default permissions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add flags to the root context.
    #[must_use]
    pub fn flags(mut self, flags: RuleFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Set the seed of both permission sets.
    #[must_use]
    pub fn default_rule(mut self, rule: DefaultRule) -> Self {
        self.permissions.default_rule = Some(rule);
        self
    }

    /// Allow tags at the top level.
    #[must_use]
    pub fn allow_child<I: IntoIterator<Item = S>, S: Into<String>>(mut self, tags: I) -> Self {
        self.permissions.allow_child.extend(names(tags));
        self
    }

    /// Deny tags at the top level.
    #[must_use]
    pub fn deny_child<I: IntoIterator<Item = S>, S: Into<String>>(mut self, tags: I) -> Self {
        self.permissions.deny_child.extend(names(tags));
        self
    }

    /// Deny tags anywhere in the document.
    #[must_use]
    pub fn deny_descendant<I: IntoIterator<Item = S>, S: Into<String>>(mut self, tags: I) -> Self {
        self.permissions.deny_descendant.extend(names(tags));
        self
    }
}

/// The JSON form of a complete rule table.
///
/// ```json
/// {
///   "defaultRule": "allow",
///   "root": { "flags": "ENABLE_AUTO_BR" },
///   "tags": [
///     { "name": "B", "flags": "AUTO_REOPEN" },
///     { "name": "URL", "attributes": { "url": { "filters": [{ "type": "url" }] } } }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RulesDocument {
    /// Seed of every permission set not overriding it.
    pub default_rule: DefaultRule,
    /// Budget of corrective actions per resolution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_fixing_cost: Option<u32>,
    /// Root rules.
    pub root: RootDeclaration,
    /// Tag rules.
    pub tags: Vec<TagDeclaration>,
}

impl RulesDocument {
    /// Parse the JSON form.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when the document is malformed.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_document() {
        let doc = RulesDocument::from_json(
            r#"{
                "defaultRule": "deny",
                "maxFixingCost": 50,
                "root": { "allowChild": ["B"], "flags": "CREATE_PARAGRAPHS" },
                "tags": [{
                    "name": "B",
                    "defaultChildRule": "allow",
                    "denyChild": ["B"],
                    "flags": "AUTO_REOPEN | BREAK_PARAGRAPH",
                    "closeParent": ["I"],
                    "nestingLimit": 2,
                    "attributes": {
                        "size": {
                            "filters": [{ "type": "range", "min": 1, "max": 7 }],
                            "required": false,
                            "defaultValue": "3"
                        }
                    },
                    "preprocessors": [{ "source": "size", "regex": "^(?P<size>\\d+)" }]
                }]
            }"#,
        )
        .unwrap();

        assert_eq!(doc.default_rule, DefaultRule::Deny);
        assert_eq!(doc.max_fixing_cost, Some(50));
        assert_eq!(doc.root.permissions.allow_child, vec!["B"]);
        assert_eq!(doc.root.flags, RuleFlags::CREATE_PARAGRAPHS);

        let b = &doc.tags[0];
        assert_eq!(b.permissions.default_child_rule, Some(DefaultRule::Allow));
        assert_eq!(b.flags, RuleFlags::AUTO_REOPEN | RuleFlags::BREAK_PARAGRAPH);
        assert_eq!(b.close_parent, vec!["I"]);
        assert_eq!(b.nesting_limit, Some(2));
        assert_eq!(b.tag_limit, None);
        let size = &b.attributes["size"];
        assert!(!size.required);
        assert_eq!(size.default_value.as_deref(), Some("3"));
        assert_eq!(size.filters, vec![FilterDeclaration::Range { min: 1, max: 7 }]);
        assert_eq!(b.preprocessors[0].source, "size");
    }

    #[test]
    fn attributes_are_required_by_default() {
        let attr: AttributeDeclaration = serde_json::from_str("{}").unwrap();
        assert!(attr.required);
        assert!(!AttributeDeclaration::default().optional().required);
    }

    #[test]
    fn builder_methods_accumulate() {
        let tag = TagDeclaration::new("LI")
            .require_parent("LIST")
            .close_parent(["LI"])
            .close_parent(["P"])
            .flags(RuleFlags::TRIM_AFTER)
            .flags(RuleFlags::TRIM_BEFORE);
        assert_eq!(tag.close_parent, vec!["LI", "P"]);
        assert_eq!(tag.flags, RuleFlags::TRIM_AFTER | RuleFlags::TRIM_BEFORE);
        assert_eq!(tag.require_parent.as_deref(), Some("LIST"));
    }

    #[test]
    fn filter_declarations_are_tagged() {
        let filters: Vec<FilterDeclaration> = serde_json::from_str(
            r#"[{"type":"url","disallowedHosts":["evil.com"]},{"type":"simpletext"},
                {"type":"custom","name":"upper"},
                {"type":"compound","filters":[{"type":"int"}]}]"#,
        )
        .unwrap();
        assert_eq!(
            filters[0],
            FilterDeclaration::Url {
                allowed_schemes: None,
                disallowed_hosts: vec!["evil.com".to_string()],
            }
        );
        assert_eq!(filters[1], FilterDeclaration::SimpleText);
        assert_eq!(filters[2], FilterDeclaration::Custom { name: "upper".to_string() });
        assert_eq!(
            filters[3],
            FilterDeclaration::Compound { filters: vec![FilterDeclaration::Int] }
        );
    }
}
