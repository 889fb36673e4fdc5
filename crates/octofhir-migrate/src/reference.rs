//! Classification of raw reference strings.

use std::str::FromStr;

use octofhir_core::ResourceKind;
use octofhir_core::fhir_reference::{
    FhirReference, UnresolvableReference, decode_path_segment, encode_path_segment,
    is_absolute_url, parse_reference, split_canonical_version, trailing_reference,
};

/// A canonical URL with its optional `|version` suffix split off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canonical {
    pub url: String,
    pub version: Option<String>,
}

/// What a reference string points at, and therefore how to resolve it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceClass {
    /// `Kind/id`, or an absolute URL ending in `Kind/id`. The absolute form
    /// keeps its URL so resolution can fall back to a canonical search.
    Instance {
        reference: FhirReference,
        canonical: Option<Canonical>,
    },
    /// A canonical minted by an earlier export: `{base}/{Kind}/{stableValue}`.
    GeneratedCanonical {
        kind: ResourceKind,
        stable_value: String,
        url: String,
    },
    /// Any other well-formed URL.
    ExternalCanonical(Canonical),
    Unparseable(UnresolvableReference),
}

impl ReferenceClass {
    /// The resource kind the reference names, when the string itself names one.
    pub fn kind(&self) -> Option<ResourceKind> {
        match self {
            Self::Instance { reference, .. } => ResourceKind::from_str(&reference.resource_type).ok(),
            Self::GeneratedCanonical { kind, .. } => Some(kind.clone()),
            Self::ExternalCanonical(_) | Self::Unparseable(_) => None,
        }
    }
}

/// Deterministic, side-effect free classifier bound to one generated base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceClassifier {
    generated_base: String,
}

impl ReferenceClassifier {
    pub fn new(generated_base: &str) -> Self {
        Self {
            generated_base: generated_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn generated_base(&self) -> &str {
        &self.generated_base
    }

    /// `{base}/{Kind}/{stableValue}`
    pub fn generated_canonical(&self, kind: &ResourceKind, stable_value: &str) -> String {
        format!(
            "{}/{kind}/{}",
            self.generated_base,
            encode_path_segment(stable_value)
        )
    }

    /// `{base}/export/{Kind}`
    pub fn identifier_system(&self, kind: &ResourceKind) -> String {
        format!("{}/export/{kind}", self.generated_base)
    }

    pub fn classify(&self, raw: &str) -> ReferenceClass {
        let raw = raw.trim();
        // Contained, URN and empty values never name a store address.
        if raw.is_empty() || raw.starts_with('#') || raw.starts_with("urn:") {
            if let Err(reason) = parse_reference(raw) {
                return ReferenceClass::Unparseable(reason);
            }
        }

        let (url, version) = split_canonical_version(raw);

        if let Some(class) = self.classify_generated(url) {
            return class;
        }

        if is_absolute_url(url) {
            let canonical = Canonical {
                url: url.to_string(),
                version: version.map(str::to_string),
            };
            return match trailing_reference(url) {
                Some(reference) => {
                    tracing::debug!(
                        reference = %raw,
                        instance = %reference,
                        "absolute URL ends in Kind/id; treating as instance reference"
                    );
                    ReferenceClass::Instance {
                        reference,
                        canonical: Some(canonical),
                    }
                }
                None => ReferenceClass::ExternalCanonical(canonical),
            };
        }

        match parse_reference(url) {
            Ok(reference) => ReferenceClass::Instance {
                reference,
                canonical: None,
            },
            Err(reason) => ReferenceClass::Unparseable(reason),
        }
    }

    fn classify_generated(&self, url: &str) -> Option<ReferenceClass> {
        let rest = url
            .strip_prefix(self.generated_base.as_str())?
            .strip_prefix('/')?;
        let (kind, value) = rest.split_once('/')?;
        if value.is_empty() || value.contains('/') {
            return None;
        }
        let kind = ResourceKind::from_str(kind).ok()?;
        Some(ReferenceClass::GeneratedCanonical {
            kind,
            stable_value: decode_path_segment(value),
            url: url.to_string(),
        })
    }

    /// The Closure key of a reference: `Kind/id` for relative instance
    /// references, the version-stripped string for everything else.
    pub fn key(&self, raw: &str, class: &ReferenceClass) -> String {
        match class {
            ReferenceClass::Instance {
                reference,
                canonical: None,
            } => reference.to_relative(),
            ReferenceClass::Instance {
                canonical: Some(canonical),
                ..
            }
            | ReferenceClass::ExternalCanonical(canonical) => canonical.url.clone(),
            ReferenceClass::GeneratedCanonical { url, .. } => url.clone(),
            ReferenceClass::Unparseable(_) => raw.trim().to_string(),
        }
    }

    /// Classifies and keys in one step.
    pub fn classify_keyed(&self, raw: &str) -> (ReferenceClass, String) {
        let class = self.classify(raw);
        let key = self.key(raw, &class);
        (class, key)
    }
}
