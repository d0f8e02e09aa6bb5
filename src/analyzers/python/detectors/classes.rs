// Detectors over class facts

use super::Finding;
use crate::analyzers::python::semantic::SemanticTree;

pub fn detect_metaclasses(tree: &dyn SemanticTree) -> Vec<Finding> {
    tree.classes()
        .iter()
        .filter(|class| class.metaclass.is_some())
        .map(|class| {
            (
                class.line,
                format!(
                    "Class '{}' uses a metaclass, which may not be fully supported in Cython",
                    class.name
                ),
            )
        })
        .collect()
}

pub fn detect_multiple_inheritance(tree: &dyn SemanticTree) -> Vec<Finding> {
    tree.classes()
        .iter()
        .filter(|class| class.bases.len() > 1)
        .map(|class| {
            (
                class.line,
                format!(
                    "Class '{}' uses multiple inheritance, which may cause issues in Cython",
                    class.name
                ),
            )
        })
        .collect()
}

pub fn detect_dynamic_attribute_bag(tree: &dyn SemanticTree) -> Vec<Finding> {
    tree.classes()
        .iter()
        .filter(|class| class.locals.contains("__dict__"))
        .map(|class| {
            (
                class.line,
                format!(
                    "Class '{}' uses dynamic attributes (__dict__), which may not be supported in Cython",
                    class.name
                ),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::python::semantic::ClassFacts;
    use std::collections::BTreeSet;

    struct Fixed(Vec<ClassFacts>);

    impl SemanticTree for Fixed {
        fn classes(&self) -> &[ClassFacts] {
            &self.0
        }
    }

    fn class(name: &str, line: usize, bases: &[&str]) -> ClassFacts {
        ClassFacts {
            name: name.to_string(),
            line,
            bases: bases.iter().map(|b| b.to_string()).collect(),
            metaclass: None,
            locals: BTreeSet::new(),
        }
    }

    #[test]
    fn test_two_bases_report_once_one_base_not_at_all() {
        let tree = Fixed(vec![class("Mixed", 4, &["A", "B"]), class("Single", 9, &["A"])]);
        let findings = detect_multiple_inheritance(&tree);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].0, 4);
        assert!(findings[0].1.contains("Mixed"));
    }

    #[test]
    fn test_metaclass_reported_per_class() {
        let mut meta = class("Registered", 2, &["Base"]);
        meta.metaclass = Some("Registry".to_string());
        let tree = Fixed(vec![meta, class("Plain", 5, &[])]);
        let lines: Vec<_> = detect_metaclasses(&tree).into_iter().map(|f| f.0).collect();
        assert_eq!(lines, vec![2]);
    }

    #[test]
    fn test_dict_binding_is_a_dynamic_attribute_bag() {
        let mut bag = class("Bag", 1, &[]);
        bag.locals.insert("__dict__".to_string());
        let mut slots = class("Slotted", 7, &[]);
        slots.locals.insert("__slots__".to_string());
        let findings = detect_dynamic_attribute_bag(&Fixed(vec![bag, slots]));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].0, 1);
    }
}
