//! The compiled, read-only rule table.

use std::collections::{BTreeMap, HashMap};

use regex::Regex;

use crate::{
    AllowedSet, AttributeFilter, ConfigError, FilterError, NameSet, RuleFlags, RuleTableBuilder,
    RulesDocument, TagIndex,
};

/// Nesting limit of tags that do not declare one.
pub const DEFAULT_NESTING_LIMIT: usize = 10;
/// Per-document limit of tags that do not declare one.
pub const DEFAULT_TAG_LIMIT: usize = 5000;
/// Budget of corrective actions per resolution when none is configured.
pub const DEFAULT_MAX_FIXING_COST: u32 = 10_000;

/// Compiled validation rules of one attribute.
#[derive(Debug, Clone)]
pub struct AttributeRule {
    /// Filters applied in order, each to the previous output.
    pub filters: Vec<AttributeFilter>,
    /// Whether a missing or invalid value rejects the whole tag.
    pub required: bool,
    /// Value used when the attribute is missing.
    pub default_value: Option<String>,
}

impl AttributeRule {
    /// Run the filter chain over `value`.
    ///
    /// # Errors
    ///
    /// Returns the error of the first filter rejecting the value.
    pub fn filter(&self, value: &str) -> Result<String, FilterError> {
        self.filters
            .iter()
            .try_fold(value.to_string(), |current, filter| filter.apply(&current))
    }
}

/// Compiled attribute preprocessor.
#[derive(Debug, Clone)]
pub struct AttributePreprocessor {
    /// Attribute whose value is matched.
    pub source: String,
    /// Regex whose named groups become attributes.
    pub regex: Regex,
}

impl AttributePreprocessor {
    /// Named groups that took part in a match of `value`, as
    /// `(attribute, value)` pairs in group order.
    #[must_use]
    pub fn extract(&self, value: &str) -> Vec<(String, String)> {
        let Some(captures) = self.regex.captures(value) else {
            return Vec::new();
        };
        self.regex
            .capture_names()
            .flatten()
            .filter_map(|name| {
                captures
                    .name(name)
                    .map(|m| (name.to_string(), m.as_str().to_string()))
            })
            .collect()
    }
}

/// Compiled rules of one tag name.
#[derive(Debug, Clone)]
pub struct TagRule {
    /// Tag name.
    pub name: String,
    /// Position of the name in the table.
    pub index: TagIndex,
    /// Behavior switches.
    pub flags: RuleFlags,
    /// Tags permitted inside.
    pub allowed: AllowedSet,
    /// Required direct parent.
    pub require_parent: Option<TagIndex>,
    /// Required ancestors.
    pub require_ancestor: Vec<TagIndex>,
    /// Parents closed by this tag.
    pub close_parent: NameSet,
    /// Ancestors closed by this tag.
    pub close_ancestor: NameSet,
    /// Parents closed by this tag and continued inside it.
    pub foster_parent: NameSet,
    /// Tags created right after this one opens.
    pub create_child: Vec<TagIndex>,
    /// Maximum number of open elements with this name.
    pub nesting_limit: usize,
    /// Maximum number of elements with this name per document.
    pub tag_limit: usize,
    /// Declared attributes.
    pub attributes: BTreeMap<String, AttributeRule>,
    /// Preprocessors, in declaration order.
    pub preprocessors: Vec<AttributePreprocessor>,
}

/// Rules of the document root.
#[derive(Debug, Clone, Default)]
pub struct RootRule {
    /// Tags permitted in the document.
    pub allowed: AllowedSet,
    /// Flags of the root context.
    pub flags: RuleFlags,
}

/// Immutable set of tag rules, shared by every resolution.
#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: Vec<TagRule>,
    by_name: HashMap<String, TagIndex>,
    root: RootRule,
    max_fixing_cost: u32,
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::from_parts(Vec::new(), RootRule::default(), DEFAULT_MAX_FIXING_COST)
    }
}

impl RuleTable {
    pub(crate) fn from_parts(rules: Vec<TagRule>, root: RootRule, max_fixing_cost: u32) -> Self {
        let by_name = rules
            .iter()
            .map(|rule| (rule.name.clone(), rule.index))
            .collect();
        Self {
            rules,
            by_name,
            root,
            max_fixing_cost,
        }
    }

    /// Start declaring a table.
    #[must_use]
    pub fn builder() -> RuleTableBuilder {
        RuleTableBuilder::new()
    }

    /// Build a table from its JSON form.
    ///
    /// Custom filters cannot be registered this way; use
    /// [`RuleTableBuilder::from_document`] for that.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the JSON is malformed or the declarations
    /// are inconsistent.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let document = RulesDocument::from_json(json)?;
        RuleTableBuilder::from_document(document).build()
    }

    /// Index of a tag name.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<TagIndex> {
        self.by_name.get(name).copied()
    }

    /// Rules of a tag name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&TagRule> {
        self.index_of(name).and_then(|index| self.get(index))
    }

    /// Rules at an index.
    #[must_use]
    pub fn get(&self, index: TagIndex) -> Option<&TagRule> {
        self.rules.get(index.0)
    }

    /// Name at an index.
    #[must_use]
    pub fn name(&self, index: TagIndex) -> Option<&str> {
        self.get(index).map(|rule| rule.name.as_str())
    }

    /// Rules of the document root.
    #[must_use]
    pub const fn root(&self) -> &RootRule {
        &self.root
    }

    /// Budget of corrective actions per resolution.
    #[must_use]
    pub const fn max_fixing_cost(&self) -> u32 {
        self.max_fixing_cost
    }

    /// Number of declared tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no tag is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// All tag rules, in index order.
    pub fn iter(&self) -> impl Iterator<Item = &TagRule> {
        self.rules.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn table_is_shareable() {
        assert_send_sync::<RuleTable>();
    }

    #[test]
    fn preprocessor_extracts_named_groups() {
        let pre = AttributePreprocessor {
            source: "size".to_string(),
            regex: Regex::new(r"^(?P<width>\d+)(?:x(?P<height>\d+))?$").unwrap(),
        };
        assert_eq!(
            pre.extract("10x20"),
            vec![
                ("width".to_string(), "10".to_string()),
                ("height".to_string(), "20".to_string())
            ]
        );
        assert_eq!(pre.extract("10"), vec![("width".to_string(), "10".to_string())]);
        assert!(pre.extract("big").is_empty());
    }

    #[test]
    fn empty_table() {
        let table = RuleTable::default();
        assert!(table.is_empty());
        assert!(table.lookup("B").is_none());
        assert_eq!(table.max_fixing_cost(), DEFAULT_MAX_FIXING_COST);
    }
}
