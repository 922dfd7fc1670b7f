use std::collections::BTreeSet;

use crate::{prelude::*, svm::Dialect};

use super::name_collector::NameCollector;

/// Hands out names that are not used anywhere yet.
///
/// The suffix counter is shared across requests, so a dispenser never
/// proposes the same candidate twice.
pub struct NameDispenser<'d> {
    dialect: &'d dyn Dialect,
    used_names: BTreeSet<YulString>,
    counter: usize,
}

impl<'d> NameDispenser<'d> {
    pub fn new(dialect: &'d dyn Dialect, used_names: BTreeSet<YulString>) -> Self {
        Self {
            dialect,
            used_names,
            counter: 0,
        }
    }

    /// A dispenser that avoids every name declared in `ast`.
    pub fn for_ast(dialect: &'d dyn Dialect, ast: &Block) -> Self {
        Self::new(dialect, NameCollector::collect(ast))
    }

    /// Returns `hint` if it is free, otherwise `hint_<n>` for the next free
    /// `n`. The returned name is marked as used.
    pub fn new_name(&mut self, hint: &YulString) -> YulString {
        let mut name = hint.clone();
        while self.illegal_name(&name) {
            self.counter += 1;
            name = format!("{hint}_{}", self.counter).into();
        }
        self.used_names.insert(name.clone());
        name
    }

    pub fn mark_used(&mut self, name: YulString) {
        self.used_names.insert(name);
    }

    fn illegal_name(&self, name: &YulString) -> bool {
        name.is_empty() || self.used_names.contains(name) || self.dialect.is_reserved(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::svm::{SvmDialect, YulDialect};

    #[test]
    fn skips_used_names() {
        let dialect = SvmDialect::strict_assembly();
        let mut dispenser =
            NameDispenser::new(&dialect, ["foo".into(), "foo_1".into()].into_iter().collect());
        assert_eq!(dispenser.new_name(&"foo".into()), "foo_2");
        assert_eq!(dispenser.new_name(&"foo".into()), "foo_3");
        assert_eq!(dispenser.new_name(&"bar".into()), "bar");
        assert_eq!(dispenser.new_name(&"bar".into()), "bar_4");
    }

    #[test]
    fn avoids_builtins_and_mnemonics() {
        let dialect = SvmDialect::strict_assembly();
        let mut dispenser = NameDispenser::new(&dialect, BTreeSet::new());
        assert_eq!(dispenser.new_name(&"add".into()), "add_1");
        assert_eq!(dispenser.new_name(&"dup1".into()), "dup1_2");
        assert_eq!(dispenser.new_name(&"".into()), "_3");
    }

    #[test]
    fn typed_dialect_has_no_reserved_names() {
        let mut dispenser = NameDispenser::new(&YulDialect, BTreeSet::new());
        assert_eq!(dispenser.new_name(&"add".into()), "add");
    }
}
