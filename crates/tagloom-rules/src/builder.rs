//! Compiles declarations into a [`RuleTable`].

use std::collections::{BTreeMap, HashMap};

use regex::Regex;
use tagloom_common::warning::warn_once;

use crate::{
    AllowedSet, AttributeDeclaration, AttributeFilter, AttributePreprocessor, AttributeRule,
    ConfigError, CustomFilter, DEFAULT_MAX_FIXING_COST, DEFAULT_NESTING_LIMIT, DEFAULT_TAG_LIMIT,
    DefaultRule, FilterDeclaration, FilterError, NameSet, PermissionDeclaration, RootDeclaration,
    RootRule, RuleTable, RulesDocument, TagDeclaration, TagIndex, TagRule, UrlConfig,
};

/// Collects declarations and custom filters, then builds a [`RuleTable`].
///
/// ```
/// use tagloom_rules::{RuleFlags, RuleTableBuilder, TagDeclaration};
///
/// let table = RuleTableBuilder::new()
///     .tag(TagDeclaration::new("B").flags(RuleFlags::AUTO_REOPEN))
///     .tag(TagDeclaration::new("I"))
///     .build()
///     .unwrap();
/// assert_eq!(table.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RuleTableBuilder {
    default_rule: DefaultRule,
    max_fixing_cost: Option<u32>,
    root: RootDeclaration,
    tags: Vec<TagDeclaration>,
    custom_filters: HashMap<String, CustomFilter>,
}

impl RuleTableBuilder {
    /// An empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A builder holding the declarations of a rules document.
    #[must_use]
    pub fn from_document(document: RulesDocument) -> Self {
        Self {
            default_rule: document.default_rule,
            max_fixing_cost: document.max_fixing_cost,
            root: document.root,
            tags: document.tags,
            custom_filters: HashMap::new(),
        }
    }

    /// Seed of every permission set that does not override it.
    #[must_use]
    pub fn default_rule(mut self, rule: DefaultRule) -> Self {
        self.default_rule = rule;
        self
    }

    /// Budget of corrective actions per resolution.
    #[must_use]
    pub fn max_fixing_cost(mut self, cost: u32) -> Self {
        self.max_fixing_cost = Some(cost);
        self
    }

    /// Rules of the document root.
    #[must_use]
    pub fn root(mut self, root: RootDeclaration) -> Self {
        self.root = root;
        self
    }

    /// Declare a tag.
    #[must_use]
    pub fn tag(mut self, tag: TagDeclaration) -> Self {
        self.tags.push(tag);
        self
    }

    /// Register a filter that declarations can refer to as
    /// `{"type": "custom", "name": ...}`.
    #[must_use]
    pub fn custom_filter<F>(mut self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&str) -> Result<String, FilterError> + Send + Sync + 'static,
    {
        let filter = CustomFilter::new(name, func);
        let _ = self.custom_filters.insert(filter.name().to_string(), filter);
        self
    }

    /// Compile the declarations.
    ///
    /// References to undeclared tags are dropped with a console warning.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for duplicate or empty names, zero limits,
    /// invalid regexes or ranges, and unregistered custom filters.
    pub fn build(self) -> Result<RuleTable, ConfigError> {
        let mut by_name = HashMap::with_capacity(self.tags.len());
        for (i, tag) in self.tags.iter().enumerate() {
            if tag.name.is_empty() {
                return Err(ConfigError::EmptyName);
            }
            if by_name.insert(tag.name.as_str(), TagIndex(i)).is_some() {
                return Err(ConfigError::DuplicateTag(tag.name.clone()));
            }
        }

        let names = Names {
            by_name: &by_name,
            len: self.tags.len(),
        };

        let rules = self
            .tags
            .iter()
            .enumerate()
            .map(|(i, tag)| self.compile_tag(&names, TagIndex(i), tag))
            .collect::<Result<Vec<_>, _>>()?;

        let root = RootRule {
            allowed: names.fold(&self.root.permissions, self.default_rule, "the root"),
            flags: self.root.flags,
        };

        Ok(RuleTable::from_parts(
            rules,
            root,
            self.max_fixing_cost.unwrap_or(DEFAULT_MAX_FIXING_COST),
        ))
    }

    fn compile_tag(
        &self,
        names: &Names<'_>,
        index: TagIndex,
        tag: &TagDeclaration,
    ) -> Result<TagRule, ConfigError> {
        let owner = format!("tag {}", tag.name);
        let nesting_limit = tag.nesting_limit.unwrap_or(DEFAULT_NESTING_LIMIT);
        let tag_limit = tag.tag_limit.unwrap_or(DEFAULT_TAG_LIMIT);
        if nesting_limit == 0 {
            return Err(ConfigError::InvalidLimit {
                tag: tag.name.clone(),
                limit: "nestingLimit",
            });
        }
        if tag_limit == 0 {
            return Err(ConfigError::InvalidLimit {
                tag: tag.name.clone(),
                limit: "tagLimit",
            });
        }

        let attributes = tag
            .attributes
            .iter()
            .map(|(name, decl)| Ok((name.clone(), self.compile_attribute(decl)?)))
            .collect::<Result<BTreeMap<_, _>, ConfigError>>()?;

        let preprocessors = tag
            .preprocessors
            .iter()
            .map(|decl| {
                Ok(AttributePreprocessor {
                    source: decl.source.clone(),
                    regex: compile_regex(&decl.regex)?,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(TagRule {
            name: tag.name.clone(),
            index,
            flags: tag.flags,
            allowed: names.fold(&tag.permissions, self.default_rule, &owner),
            require_parent: tag
                .require_parent
                .as_deref()
                .and_then(|name| names.resolve(name, &owner, "requireParent")),
            require_ancestor: names.resolve_all(&tag.require_ancestor, &owner, "requireAncestor"),
            close_parent: names.set(&tag.close_parent, &owner, "closeParent"),
            close_ancestor: names.set(&tag.close_ancestor, &owner, "closeAncestor"),
            foster_parent: names.set(&tag.foster_parent, &owner, "fosterParent"),
            create_child: names.resolve_all(&tag.create_child, &owner, "createChild"),
            nesting_limit,
            tag_limit,
            attributes,
            preprocessors,
        })
    }

    fn compile_attribute(&self, decl: &AttributeDeclaration) -> Result<AttributeRule, ConfigError> {
        Ok(AttributeRule {
            filters: decl
                .filters
                .iter()
                .map(|filter| self.compile_filter(filter))
                .collect::<Result<_, _>>()?,
            required: decl.required,
            default_value: decl.default_value.clone(),
        })
    }

    fn compile_filter(&self, decl: &FilterDeclaration) -> Result<AttributeFilter, ConfigError> {
        Ok(match decl {
            FilterDeclaration::Url {
                allowed_schemes,
                disallowed_hosts,
            } => {
                let defaults = UrlConfig::default();
                AttributeFilter::Url(UrlConfig {
                    allowed_schemes: allowed_schemes.clone().unwrap_or(defaults.allowed_schemes),
                    disallowed_hosts: disallowed_hosts.clone(),
                })
            }
            FilterDeclaration::Text => AttributeFilter::Text,
            FilterDeclaration::Number => AttributeFilter::Number,
            FilterDeclaration::Int => AttributeFilter::Int,
            FilterDeclaration::Uint => AttributeFilter::Uint,
            FilterDeclaration::Float => AttributeFilter::Float,
            FilterDeclaration::Email => AttributeFilter::Email,
            FilterDeclaration::Color => AttributeFilter::Color,
            FilterDeclaration::Regexp { pattern } => AttributeFilter::Regexp(compile_regex(pattern)?),
            FilterDeclaration::Compound { filters } => AttributeFilter::Compound(
                filters
                    .iter()
                    .map(|filter| self.compile_filter(filter))
                    .collect::<Result<_, _>>()?,
            ),
            FilterDeclaration::Range { min, max } => {
                if min > max {
                    return Err(ConfigError::InvalidRange {
                        min: *min,
                        max: *max,
                    });
                }
                AttributeFilter::Range {
                    min: *min,
                    max: *max,
                }
            }
            FilterDeclaration::SimpleText => AttributeFilter::SimpleText,
            FilterDeclaration::Identifier => AttributeFilter::Identifier,
            FilterDeclaration::Custom { name } => AttributeFilter::Custom(
                self.custom_filters
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ConfigError::UnknownFilter(name.clone()))?,
            ),
        })
    }
}

fn compile_regex(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::InvalidRegex {
        pattern: pattern.to_string(),
        source,
    })
}

/// Name resolution against the declared tags.
struct Names<'a> {
    by_name: &'a HashMap<&'a str, TagIndex>,
    len: usize,
}

impl Names<'_> {
    fn resolve(&self, name: &str, owner: &str, field: &str) -> Option<TagIndex> {
        let index = self.by_name.get(name).copied();
        if index.is_none() {
            let _ = warn_once("Rules", &format!("{owner} refers to unknown tag {name} in {field}"));
        }
        index
    }

    fn resolve_all(&self, names: &[String], owner: &str, field: &str) -> Vec<TagIndex> {
        names
            .iter()
            .filter_map(|name| self.resolve(name, owner, field))
            .collect()
    }

    fn set(&self, names: &[String], owner: &str, field: &str) -> NameSet {
        let mut set = NameSet::empty(self.len);
        for index in self.resolve_all(names, owner, field) {
            set.insert(index);
        }
        set
    }

    fn seed(&self, rule: DefaultRule) -> NameSet {
        match rule {
            DefaultRule::Allow => NameSet::full(self.len),
            DefaultRule::Deny => NameSet::empty(self.len),
        }
    }

    /// Fold allow and deny lists: seed, add allowances, remove denials.
    /// Descendant denials remove the child permission as well.
    fn fold(&self, decl: &PermissionDeclaration, global: DefaultRule, owner: &str) -> AllowedSet {
        let base = decl.default_rule.unwrap_or(global);
        let mut children = self.seed(decl.default_child_rule.unwrap_or(base));
        let mut descendants = self.seed(decl.default_descendant_rule.unwrap_or(base));

        for index in self.resolve_all(&decl.allow_child, owner, "allowChild") {
            children.insert(index);
        }
        for index in self.resolve_all(&decl.allow_descendant, owner, "allowDescendant") {
            descendants.insert(index);
        }
        for index in self.resolve_all(&decl.deny_child, owner, "denyChild") {
            children.remove(index);
        }
        for index in self.resolve_all(&decl.deny_descendant, owner, "denyDescendant") {
            descendants.remove(index);
            children.remove(index);
        }

        AllowedSet {
            children,
            descendants,
        }
    }
}
