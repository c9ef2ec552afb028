//! Rule table for the tagloom resolver.
//!
//! Tag rules are declared per tag name ([`TagDeclaration`], or the JSON form
//! [`RulesDocument`]) and compiled by [`RuleTableBuilder`] into an immutable
//! [`RuleTable`]:
//!
//! - allow/deny declarations are folded into [`AllowedSet`] bitsets
//! - boolean options become [`RuleFlags`]
//! - attribute filters are resolved into [`AttributeFilter`] values
//!
//! The resolver only ever reads the table, so one table can be shared across
//! threads and resolutions.

#[macro_use]
mod macros;

mod builder;
mod declaration;
mod error;
mod filter;
mod flags;
mod name_set;
mod table;

pub use builder::RuleTableBuilder;
pub use declaration::{
    AttributeDeclaration, DefaultRule, FilterDeclaration, PermissionDeclaration,
    PreprocessorDeclaration, RootDeclaration, RulesDocument, TagDeclaration,
};
pub use error::{ConfigError, FilterError};
pub use filter::{AttributeFilter, CustomFilter, UrlConfig};
pub use flags::RuleFlags;
pub use name_set::{AllowedSet, NameSet, TagIndex};
pub use table::{
    AttributePreprocessor, AttributeRule, DEFAULT_MAX_FIXING_COST, DEFAULT_NESTING_LIMIT,
    DEFAULT_TAG_LIMIT, RootRule, RuleTable, TagRule,
};
