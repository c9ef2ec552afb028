//! Attribute preprocessing and validation.

use tagloom_rules::TagRule;
use tagloom_tree::AttributesMap;

use super::Resolver;
use crate::TagId;

impl Resolver<'_> {
    /// Preprocess and filter the attributes of a start or self-closing tag.
    ///
    /// Returns `false` if the tag must be discarded: a required attribute is
    /// missing or invalid and has no default value. Invalid optional
    /// attributes are dropped. Undeclared attributes are removed.
    pub(super) fn filter_attributes(&mut self, id: TagId, rule: &TagRule) -> bool {
        let Some(tag) = self.tags.get_mut(id) else {
            return false;
        };
        let (pos, name) = (tag.pos(), tag.name().to_string());

        // STEP 1: named captures of the preprocessors fill in attributes that
        // were not given.
        for preprocessor in &rule.preprocessors {
            let Some(value) = tag.attribute(&preprocessor.source).map(str::to_string) else {
                continue;
            };
            for (attribute, captured) in preprocessor.extract(&value) {
                if !tag.has_attribute(&attribute) {
                    tag.set_attribute(attribute, captured);
                }
            }
        }

        // STEP 2: filter each declared attribute. Anything else is dropped.
        let mut given = tag.attributes().clone();
        let mut valid = true;
        let mut filtered = AttributesMap::new();
        for (attribute, attribute_rule) in &rule.attributes {
            match given.remove(attribute) {
                Some(value) => match attribute_rule.filter(&value) {
                    Ok(value) => {
                        let _ = filtered.insert(attribute.clone(), value);
                    }
                    Err(error) => {
                        self.log.error(
                            pos,
                            "Attribute {0} of tag {1} is invalid: {2}",
                            &[attribute, &name, &error],
                        );
                        if let Some(default) = &attribute_rule.default_value {
                            let _ = filtered.insert(attribute.clone(), default.clone());
                        } else if attribute_rule.required {
                            valid = false;
                        }
                    }
                },
                None => {
                    if let Some(default) = &attribute_rule.default_value {
                        let _ = filtered.insert(attribute.clone(), default.clone());
                    } else if attribute_rule.required {
                        self.log.error(
                            pos,
                            "Tag {0} is missing required attribute {1}",
                            &[&name, attribute],
                        );
                        valid = false;
                    }
                }
            }
        }

        if let Some(tag) = self.tags.get_mut(id) {
            tag.set_attributes(filtered);
        }
        valid
    }
}
