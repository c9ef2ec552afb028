//! Bitsets over the tag names of a rule table.

/// Index of a tag name in its [`RuleTable`](crate::RuleTable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TagIndex(pub usize);

/// A set of tag names, stored as a bitset indexed by [`TagIndex`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NameSet {
    words: Vec<u64>,
}

impl NameSet {
    /// An empty set able to hold `len` names.
    #[must_use]
    pub fn empty(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
        }
    }

    /// A set holding every index below `len`.
    #[must_use]
    pub fn full(len: usize) -> Self {
        let mut set = Self::empty(len);
        for index in 0..len {
            set.insert(TagIndex(index));
        }
        set
    }

    /// Add a name, growing the set if needed.
    pub fn insert(&mut self, index: TagIndex) {
        let (word, bit) = (index.0 / 64, index.0 % 64);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1 << bit;
    }

    /// Remove a name.
    pub fn remove(&mut self, index: TagIndex) {
        if let Some(word) = self.words.get_mut(index.0 / 64) {
            *word &= !(1 << (index.0 % 64));
        }
    }

    /// Whether the name is in the set.
    #[must_use]
    pub fn contains(&self, index: TagIndex) -> bool {
        self.words
            .get(index.0 / 64)
            .is_some_and(|word| word & (1 << (index.0 % 64)) != 0)
    }

    /// Keep only the names also in `other`.
    pub fn intersect_with(&mut self, other: &Self) {
        for (i, word) in self.words.iter_mut().enumerate() {
            *word &= other.words.get(i).copied().unwrap_or(0);
        }
    }

    /// The intersection of two sets.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        let mut set = self.clone();
        set.intersect_with(other);
        set
    }

    /// Number of names in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.iter().map(|word| word.count_ones() as usize).sum()
    }

    /// Whether the set holds no name.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&word| word == 0)
    }

    /// Iterate over the indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = TagIndex> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &word)| {
            (0..64)
                .filter(move |bit| word & (1 << bit) != 0)
                .map(move |bit| TagIndex(i * 64 + bit))
        })
    }
}

impl FromIterator<TagIndex> for NameSet {
    fn from_iter<I: IntoIterator<Item = TagIndex>>(iter: I) -> Self {
        let mut set = Self::default();
        for index in iter {
            set.insert(index);
        }
        set
    }
}

/// The tags permitted inside an element.
///
/// `children` governs direct children. `descendants` governs everything
/// deeper: the children of a nested element are restricted to the
/// descendants permitted by its ancestors.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AllowedSet {
    /// Tags allowed as direct children.
    pub children: NameSet,
    /// Tags allowed anywhere below.
    pub descendants: NameSet,
}

impl AllowedSet {
    /// Whether `index` may be opened directly in this context.
    #[must_use]
    pub fn allows(&self, index: TagIndex) -> bool {
        self.children.contains(index)
    }

    /// The set in effect inside an element with `rule` opened in this context.
    ///
    /// A transparent element's children are checked against this context's
    /// children rather than its descendants.
    #[must_use]
    pub fn narrow(&self, rule: &Self, transparent: bool) -> Self {
        let inherited = if transparent {
            &self.children
        } else {
            &self.descendants
        };
        Self {
            children: rule.children.intersection(inherited),
            descendants: rule.descendants.intersection(&self.descendants),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn insert_remove_contains() {
        let mut set = NameSet::empty(3);
        set.insert(TagIndex(1));
        set.insert(TagIndex(130));
        assert!(set.contains(TagIndex(1)));
        assert!(set.contains(TagIndex(130)));
        assert!(!set.contains(TagIndex(2)));
        set.remove(TagIndex(1));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![TagIndex(130)]);
    }

    #[test]
    fn full_set_has_every_index() {
        let set = NameSet::full(70);
        assert_eq!(set.len(), 70);
        assert!(set.contains(TagIndex(69)));
        assert!(!set.contains(TagIndex(70)));
    }

    #[test]
    fn narrow_uses_descendants_unless_transparent() {
        let outer = AllowedSet {
            children: [TagIndex(0), TagIndex(1)].into_iter().collect(),
            descendants: [TagIndex(0)].into_iter().collect(),
        };
        let rule = AllowedSet {
            children: NameSet::full(2),
            descendants: NameSet::full(2),
        };

        let opaque = outer.narrow(&rule, false);
        assert!(opaque.allows(TagIndex(0)));
        assert!(!opaque.allows(TagIndex(1)));

        let transparent = outer.narrow(&rule, true);
        assert!(transparent.allows(TagIndex(1)));
        assert!(!transparent.descendants.contains(TagIndex(1)));
    }

    #[quickcheck]
    fn intersection_is_subset(a: Vec<u8>, b: Vec<u8>) -> bool {
        let left: NameSet = a.iter().map(|&i| TagIndex(i.into())).collect();
        let right: NameSet = b.iter().map(|&i| TagIndex(i.into())).collect();
        let both = left.intersection(&right);
        both.iter().all(|i| left.contains(i) && right.contains(i))
            && both.len() <= left.len().min(right.len())
    }
}
