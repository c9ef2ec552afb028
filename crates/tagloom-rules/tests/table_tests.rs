//! Integration tests for building rule tables.

use tagloom_rules::{
    AttributeDeclaration, ConfigError, DEFAULT_NESTING_LIMIT, DEFAULT_TAG_LIMIT, DefaultRule,
    FilterDeclaration, FilterError, RootDeclaration, RuleFlags, RuleTable, RuleTableBuilder,
    TagDeclaration,
};

fn allows(table: &RuleTable, parent: &str, child: &str) -> bool {
    let child = table.index_of(child).unwrap();
    table.lookup(parent).unwrap().allowed.allows(child)
}

#[test]
fn test_default_rule_allows_everything() {
    let table = RuleTableBuilder::new()
        .tag(TagDeclaration::new("B"))
        .tag(TagDeclaration::new("I"))
        .build()
        .unwrap();

    assert!(allows(&table, "B", "I"));
    assert!(allows(&table, "B", "B"));
    assert!(table.root().allowed.allows(table.index_of("B").unwrap()));

    let b = table.lookup("B").unwrap();
    assert_eq!(b.nesting_limit, DEFAULT_NESTING_LIMIT);
    assert_eq!(b.tag_limit, DEFAULT_TAG_LIMIT);
}

#[test]
fn test_deny_wins_regardless_of_order() {
    let table = RuleTableBuilder::new()
        .tag(TagDeclaration::new("B").deny_child(["I"]).allow_child(["I"]))
        .tag(TagDeclaration::new("I"))
        .build()
        .unwrap();
    assert!(!allows(&table, "B", "I"));
}

#[test]
fn test_per_tag_default_rule_overrides_global() {
    let table = RuleTableBuilder::new()
        .default_rule(DefaultRule::Deny)
        .tag(TagDeclaration::new("X").default_rule(DefaultRule::Allow).deny_child(["Y"]))
        .tag(TagDeclaration::new("Y").allow_child(["X"]))
        .build()
        .unwrap();

    assert!(allows(&table, "X", "X"));
    assert!(!allows(&table, "X", "Y"));
    assert!(allows(&table, "Y", "X"));
    assert!(!allows(&table, "Y", "Y"));
    assert!(table.root().allowed.children.is_empty());
}

#[test]
fn test_deny_descendant_also_denies_child() {
    let table = RuleTableBuilder::new()
        .tag(TagDeclaration::new("CODE").deny_descendant(["B"]))
        .tag(TagDeclaration::new("B"))
        .build()
        .unwrap();
    let code = table.lookup("CODE").unwrap();
    let b = table.index_of("B").unwrap();
    assert!(!code.allowed.allows(b));
    assert!(!code.allowed.descendants.contains(b));
}

#[test]
fn test_unknown_names_are_ignored() {
    let table = RuleTableBuilder::new()
        .tag(
            TagDeclaration::new("LI")
                .require_parent("NOPE")
                .close_parent(["LI", "ALSO_NOPE"]),
        )
        .build()
        .unwrap();
    let li = table.lookup("LI").unwrap();
    assert_eq!(li.require_parent, None);
    assert_eq!(li.close_parent.len(), 1);
}

#[test]
fn test_duplicate_and_invalid_declarations() {
    let duplicate = RuleTableBuilder::new()
        .tag(TagDeclaration::new("B"))
        .tag(TagDeclaration::new("B"))
        .build();
    assert!(matches!(duplicate, Err(ConfigError::DuplicateTag(name)) if name == "B"));

    let zero = RuleTableBuilder::new()
        .tag(TagDeclaration::new("B").nesting_limit(0))
        .build();
    assert!(matches!(zero, Err(ConfigError::InvalidLimit { limit: "nestingLimit", .. })));

    let regex = RuleTableBuilder::new()
        .tag(TagDeclaration::new("B").preprocessor("x", "(unclosed"))
        .build();
    assert!(matches!(regex, Err(ConfigError::InvalidRegex { .. })));

    let custom = RuleTableBuilder::new()
        .tag(TagDeclaration::new("B").attribute(
            "x",
            AttributeDeclaration::new(vec![FilterDeclaration::Custom {
                name: "missing".to_string(),
            }]),
        ))
        .build();
    assert!(matches!(custom, Err(ConfigError::UnknownFilter(name)) if name == "missing"));

    let range = RuleTableBuilder::new()
        .tag(TagDeclaration::new("B").attribute(
            "x",
            AttributeDeclaration::new(vec![FilterDeclaration::Range { min: 5, max: 1 }]),
        ))
        .build();
    assert!(matches!(range, Err(ConfigError::InvalidRange { min: 5, max: 1 })));
}

#[test]
fn test_custom_filters_resolve_by_name() {
    let table = RuleTableBuilder::new()
        .custom_filter("even", |value| match value.parse::<u32>() {
            Ok(n) if n % 2 == 0 => Ok(value.to_string()),
            _ => Err(FilterError::rejected("even", value)),
        })
        .tag(TagDeclaration::new("N").attribute(
            "n",
            AttributeDeclaration::new(vec![FilterDeclaration::Custom {
                name: "even".to_string(),
            }]),
        ))
        .build()
        .unwrap();

    let rule = &table.lookup("N").unwrap().attributes["n"];
    assert_eq!(rule.filter("4").unwrap(), "4");
    assert!(rule.filter("5").is_err());
}

#[test]
fn test_from_json() {
    let table = RuleTable::from_json(
        r#"{
            "maxFixingCost": 3,
            "root": { "flags": "ENABLE_AUTO_BR", "denyChild": ["LI"] },
            "tags": [
                { "name": "LIST", "flags": "BREAK_PARAGRAPH", "createChild": ["LI"] },
                { "name": "LI", "requireParent": "LIST", "closeParent": ["LI"],
                  "flags": "IGNORE_SURROUNDING_WHITESPACE" },
                { "name": "URL", "attributes": {
                    "url": { "filters": [{ "type": "url", "allowedSchemes": ["https"] }] }
                } }
            ]
        }"#,
    )
    .unwrap();

    assert_eq!(table.max_fixing_cost(), 3);
    assert_eq!(table.root().flags, RuleFlags::ENABLE_AUTO_BR);
    assert!(!table.root().allowed.allows(table.index_of("LI").unwrap()));

    let li = table.lookup("LI").unwrap();
    assert_eq!(li.require_parent, table.index_of("LIST"));
    assert!(li.close_parent.contains(li.index));
    assert!(li.flags.contains(RuleFlags::TRIM_BEFORE | RuleFlags::RTRIM_CONTENT));
    assert_eq!(table.lookup("LIST").unwrap().create_child, vec![li.index]);

    let url = &table.lookup("URL").unwrap().attributes["url"];
    assert!(url.required);
    assert!(url.filter("https://example.org").is_ok());
    assert!(url.filter("http://example.org").is_err());
}

#[test]
fn test_from_json_reports_syntax_errors() {
    assert!(matches!(RuleTable::from_json("{ nope"), Err(ConfigError::Json(_))));
}

#[test]
fn test_root_declaration() {
    let table = RuleTableBuilder::new()
        .root(
            RootDeclaration::new()
                .flags(RuleFlags::CREATE_PARAGRAPHS)
                .deny_descendant(["B"]),
        )
        .tag(TagDeclaration::new("B"))
        .tag(TagDeclaration::new("I"))
        .max_fixing_cost(7)
        .build()
        .unwrap();

    let root = table.root();
    assert!(root.flags.contains(RuleFlags::CREATE_PARAGRAPHS));
    assert!(!root.allowed.allows(table.index_of("B").unwrap()));
    assert!(root.allowed.allows(table.index_of("I").unwrap()));
    assert_eq!(table.max_fixing_cost(), 7);
}
