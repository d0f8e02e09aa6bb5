// Cython compatibility detectors
// Each detector is independent and reports (line, message) pairs; the analyzer
// tags them with the detector's feature kind and the unit path.

pub mod classes;
pub mod syntax;

use super::parser::SyntaxTree;
use super::semantic::SemanticTree;
use crate::core::FeatureKind;

/// A single raw finding: 1-based line and message.
pub type Finding = (usize, String);

/// Which representation a detector needs.
#[derive(Clone, Copy)]
pub enum DetectorInput {
    Syntax(fn(&SyntaxTree) -> Vec<Finding>),
    Semantic(fn(&dyn SemanticTree) -> Vec<Finding>),
}

#[derive(Clone, Copy)]
pub struct Detector {
    pub kind: FeatureKind,
    pub input: DetectorInput,
}

impl Detector {
    pub fn run(&self, syntax: &SyntaxTree, semantic: &dyn SemanticTree) -> Vec<Finding> {
        match self.input {
            DetectorInput::Syntax(detect) => detect(syntax),
            DetectorInput::Semantic(detect) => detect(semantic),
        }
    }
}

/// The closed detector battery. Order does not matter.
pub static DETECTORS: &[Detector] = &[
    Detector {
        kind: FeatureKind::GeneratorDelegation,
        input: DetectorInput::Syntax(syntax::detect_generator_delegation),
    },
    Detector {
        kind: FeatureKind::AsyncControlFlow,
        input: DetectorInput::Syntax(syntax::detect_async_control_flow),
    },
    Detector {
        kind: FeatureKind::InlineTypeAnnotationStatement,
        input: DetectorInput::Syntax(syntax::detect_annotation_statements),
    },
    Detector {
        kind: FeatureKind::Metaclass,
        input: DetectorInput::Semantic(classes::detect_metaclasses),
    },
    Detector {
        kind: FeatureKind::MultipleInheritance,
        input: DetectorInput::Semantic(classes::detect_multiple_inheritance),
    },
    Detector {
        kind: FeatureKind::DynamicAttributeBag,
        input: DetectorInput::Semantic(classes::detect_dynamic_attribute_bag),
    },
    Detector {
        kind: FeatureKind::RuntimeIntrospection,
        input: DetectorInput::Syntax(syntax::detect_runtime_introspection),
    },
    Detector {
        kind: FeatureKind::DynamicCodeExecution,
        input: DetectorInput::Syntax(syntax::detect_dynamic_code_execution),
    },
    Detector {
        kind: FeatureKind::BareExceptionHandler,
        input: DetectorInput::Syntax(syntax::detect_bare_except),
    },
];
