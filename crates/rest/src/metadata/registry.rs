//! Name to constructor registry for checkers and transformers.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use docgate_persistence::types::Document;
use serde_json::Value;
use tracing::warn;

use super::checkers::{
    Checker, ContentSizeChecker, ImmutableFieldsChecker, JsonSchemaChecker, RequiredFieldsChecker,
};
use super::directives::{
    AggregationDirective, CheckerDirective, Phase, Relationship, TransformerDirective,
};
use super::transformers::{AddRequestProperties, FilterProperties, StringsToDates, Transformer};
use super::{MetadataError, MetadataResult};

/// Builds a checker from its directive args.
pub type CheckerFactory = fn(&Value) -> MetadataResult<Arc<dyn Checker>>;

/// Builds a transformer from its directive args.
pub type TransformerFactory = fn(&Value) -> MetadataResult<Arc<dyn Transformer>>;

/// A checker resolved from its directive.
#[derive(Debug, Clone)]
pub struct ActiveChecker {
    /// The declaration.
    pub directive: CheckerDirective,
    /// The instance built from its args.
    pub checker: Arc<dyn Checker>,
}

/// A transformer resolved from its directive.
#[derive(Debug, Clone)]
pub struct ActiveTransformer {
    /// The declaration.
    pub directive: TransformerDirective,
    /// The instance built from its args.
    pub transformer: Arc<dyn Transformer>,
}

/// Resolves directive names to checker and transformer instances.
///
/// # Example
///
/// ```
/// use docgate_rest::metadata::{MetadataRegistry, Phase};
/// use serde_json::json;
///
/// let registry = MetadataRegistry::with_defaults();
/// let props = json!({
///     "checkers": [{"name": "requiredFields", "args": ["name"]}],
///     "transformers": [{"name": "filterProperties", "phase": "RESPONSE", "args": ["secret"]}]
/// });
/// let props = props.as_object().unwrap();
///
/// assert_eq!(registry.checkers(props).unwrap().len(), 1);
/// assert!(registry.transformers(props, Phase::Request).unwrap().is_empty());
/// assert_eq!(registry.transformers(props, Phase::Response).unwrap().len(), 1);
/// ```
#[derive(Clone, Default)]
pub struct MetadataRegistry {
    checkers: HashMap<String, CheckerFactory>,
    transformers: HashMap<String, TransformerFactory>,
}

impl fmt::Debug for MetadataRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataRegistry")
            .field("checkers", &self.checkers.keys().collect::<Vec<_>>())
            .field("transformers", &self.transformers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl MetadataRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in checkers and transformers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_checker(JsonSchemaChecker::NAME, JsonSchemaChecker::from_args);
        registry.register_checker(ContentSizeChecker::NAME, ContentSizeChecker::from_args);
        registry.register_checker(RequiredFieldsChecker::NAME, RequiredFieldsChecker::from_args);
        registry.register_checker(ImmutableFieldsChecker::NAME, ImmutableFieldsChecker::from_args);
        registry.register_transformer(AddRequestProperties::NAME, AddRequestProperties::from_args);
        registry.register_transformer(FilterProperties::NAME, FilterProperties::from_args);
        registry.register_transformer(StringsToDates::NAME, StringsToDates::from_args);
        registry
    }

    /// Registers a checker constructor, replacing one of the same name.
    pub fn register_checker(&mut self, name: impl Into<String>, factory: CheckerFactory) {
        self.checkers.insert(name.into(), factory);
    }

    /// Registers a transformer constructor, replacing one of the same name.
    pub fn register_transformer(&mut self, name: impl Into<String>, factory: TransformerFactory) {
        self.transformers.insert(name.into(), factory);
    }

    /// Resolves the checkers declared in collection properties, in order.
    ///
    /// Unknown names fail only for mandatory directives; the others are
    /// skipped.
    pub fn checkers(&self, props: &Document) -> MetadataResult<Vec<ActiveChecker>> {
        let mut active = Vec::new();
        for directive in CheckerDirective::parse_all(props)? {
            let Some(factory) = self.checkers.get(&directive.name) else {
                if directive.mandatory {
                    return Err(MetadataError::UnknownChecker(directive.name));
                }
                warn!(checker = %directive.name, "Skipping unknown checker");
                continue;
            };
            let checker = factory(&directive.args)?;
            active.push(ActiveChecker { directive, checker });
        }
        Ok(active)
    }

    /// Resolves the transformers of one phase declared in collection
    /// properties, in order.
    pub fn transformers(
        &self,
        props: &Document,
        phase: Phase,
    ) -> MetadataResult<Vec<ActiveTransformer>> {
        let mut active = Vec::new();
        for directive in TransformerDirective::parse_all(props)? {
            if directive.phase != phase {
                continue;
            }
            let Some(factory) = self.transformers.get(&directive.name) else {
                if directive.mandatory {
                    return Err(MetadataError::UnknownTransformer(directive.name));
                }
                warn!(transformer = %directive.name, "Skipping unknown transformer");
                continue;
            };
            let transformer = factory(&directive.args)?;
            active.push(ActiveTransformer {
                directive,
                transformer,
            });
        }
        Ok(active)
    }

    /// Validates every declarative block of collection properties.
    pub fn validate(&self, props: &Document) -> MetadataResult<()> {
        self.checkers(props)?;
        self.transformers(props, Phase::Request)?;
        self.transformers(props, Phase::Response)?;
        Relationship::parse_all(props)?;
        AggregationDirective::parse_all(props)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_unknown_optional_checker_is_skipped() {
        let registry = MetadataRegistry::with_defaults();
        let p = props(json!({"checkers": [
            {"name": "nope"},
            {"name": "requiredFields", "args": ["a"]}
        ]}));
        let active = registry.checkers(&p).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].checker.name(), "requiredFields");
    }

    #[test]
    fn test_unknown_mandatory_checker_fails() {
        let registry = MetadataRegistry::with_defaults();
        let p = props(json!({"checkers": [{"name": "nope", "mandatory": true}]}));
        assert_eq!(
            registry.checkers(&p).unwrap_err(),
            MetadataError::UnknownChecker("nope".to_string())
        );
        assert_eq!(registry.checkers(&p).unwrap_err().to_string(), "unknown checker nope");
    }

    #[test]
    fn test_unknown_mandatory_transformer_fails() {
        let registry = MetadataRegistry::with_defaults();
        let p = props(json!({"transformers": [{"name": "nope", "phase": "REQUEST", "mandatory": true}]}));
        assert_eq!(
            registry.transformers(&p, Phase::Request).unwrap_err(),
            MetadataError::UnknownTransformer("nope".to_string())
        );
        // other phases do not resolve it
        assert!(registry.transformers(&p, Phase::Response).unwrap().is_empty());
    }

    #[test]
    fn test_bad_args_fail_validation() {
        let registry = MetadataRegistry::with_defaults();
        let p = props(json!({"checkers": [{"name": "checkContentSize", "args": {}}]}));
        assert!(matches!(registry.validate(&p), Err(MetadataError::Checker(_))));
    }

    #[test]
    fn test_validate_covers_every_block() {
        let registry = MetadataRegistry::with_defaults();
        assert!(registry.validate(&props(json!({"descr": "plain"}))).is_ok());
        assert!(matches!(
            registry.validate(&props(json!({"relationships": 1}))),
            Err(MetadataError::Relationship(_))
        ));
        assert!(matches!(
            registry.validate(&props(json!({"aggregations": [{"uri": "x"}]}))),
            Err(MetadataError::Aggregation(_))
        ));
    }

    #[test]
    fn test_custom_registration() {
        let mut registry = MetadataRegistry::new();
        let p = props(json!({"checkers": [{"name": "sizeLimit", "args": {"max": 1}, "mandatory": true}]}));
        assert!(registry.checkers(&p).is_err());
        registry.register_checker("sizeLimit", ContentSizeChecker::from_args);
        assert_eq!(registry.checkers(&p).unwrap().len(), 1);
    }
}
