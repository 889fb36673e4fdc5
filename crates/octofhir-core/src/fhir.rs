use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use crate::error::CoreError;

/// FHIR resource kinds the migration tooling knows by name.
///
/// The named variants are the definitional kinds (definitions, templates and
/// code-system artifacts) that are safe to move between projects. Every other
/// resource type, including person-specific data such as `Patient`, is carried
/// as `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Questionnaire,
    ActivityDefinition,
    PlanDefinition,
    StructureMap,
    Library,
    ValueSet,
    CodeSystem,
    ConceptMap,
    #[serde(untagged)]
    Custom(String),
}

impl ResourceKind {
    /// The definitional kinds, in their canonical registry order.
    pub const DEFINITIONAL: [ResourceKind; 8] = [
        ResourceKind::Questionnaire,
        ResourceKind::ActivityDefinition,
        ResourceKind::PlanDefinition,
        ResourceKind::StructureMap,
        ResourceKind::Library,
        ResourceKind::ValueSet,
        ResourceKind::CodeSystem,
        ResourceKind::ConceptMap,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            ResourceKind::Questionnaire => "Questionnaire",
            ResourceKind::ActivityDefinition => "ActivityDefinition",
            ResourceKind::PlanDefinition => "PlanDefinition",
            ResourceKind::StructureMap => "StructureMap",
            ResourceKind::Library => "Library",
            ResourceKind::ValueSet => "ValueSet",
            ResourceKind::CodeSystem => "CodeSystem",
            ResourceKind::ConceptMap => "ConceptMap",
            ResourceKind::Custom(name) => name,
        }
    }

    /// Returns true for the named definitional kinds.
    pub fn is_definitional(&self) -> bool {
        !matches!(self, ResourceKind::Custom(_))
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Questionnaire" => Ok(ResourceKind::Questionnaire),
            "ActivityDefinition" => Ok(ResourceKind::ActivityDefinition),
            "PlanDefinition" => Ok(ResourceKind::PlanDefinition),
            "StructureMap" => Ok(ResourceKind::StructureMap),
            "Library" => Ok(ResourceKind::Library),
            "ValueSet" => Ok(ResourceKind::ValueSet),
            "CodeSystem" => Ok(ResourceKind::CodeSystem),
            "ConceptMap" => Ok(ResourceKind::ConceptMap),
            name => {
                if is_valid_resource_type_name(name) {
                    Ok(ResourceKind::Custom(name.to_string()))
                } else {
                    Err(CoreError::invalid_resource_type(name.to_string()))
                }
            }
        }
    }
}

/// Validate if a string is a valid FHIR resource type name
pub fn is_valid_resource_type_name(name: &str) -> bool {
    // FHIR resource type names must start with uppercase letter and contain only letters
    !name.is_empty()
        && name.chars().next().map(|c| c.is_ascii_uppercase()).unwrap_or(false)
        && name.chars().all(|c| c.is_ascii_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for kind in ResourceKind::DEFINITIONAL {
            let parsed = ResourceKind::from_str(&kind.to_string()).unwrap();
            assert_eq!(parsed, kind);
            assert!(parsed.is_definitional());
        }
    }

    #[test]
    fn test_custom_kind() {
        let kind = ResourceKind::from_str("Patient").unwrap();
        assert_eq!(kind, ResourceKind::Custom("Patient".to_string()));
        assert!(!kind.is_definitional());
        assert_eq!(kind.to_string(), "Patient");
    }

    #[test]
    fn test_invalid_kind_names() {
        assert!(ResourceKind::from_str("patient").is_err());
        assert!(ResourceKind::from_str("Plan-Definition").is_err());
        assert!(ResourceKind::from_str("").is_err());
        assert!(ResourceKind::from_str("_history").is_err());
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&ResourceKind::StructureMap).unwrap();
        assert_eq!(json, "\"StructureMap\"");

        let json = serde_json::to_string(&ResourceKind::Custom("Encounter".into())).unwrap();
        assert_eq!(json, "\"Encounter\"");

        let kind: ResourceKind = serde_json::from_str("\"Library\"").unwrap();
        assert_eq!(kind, ResourceKind::Library);

        let kind: ResourceKind = serde_json::from_str("\"Encounter\"").unwrap();
        assert_eq!(kind, ResourceKind::Custom("Encounter".into()));
    }

    #[test]
    fn test_resource_type_name_validation() {
        assert!(is_valid_resource_type_name("Questionnaire"));
        assert!(is_valid_resource_type_name("MyCustomResource"));
        assert!(!is_valid_resource_type_name("questionnaire"));
        assert!(!is_valid_resource_type_name("Questionnaire1"));
        assert!(!is_valid_resource_type_name("x"));
    }
}
