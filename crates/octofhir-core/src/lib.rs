pub mod error;
pub mod fhir;
pub mod fhir_reference;
pub mod id;

pub use error::CoreError;
pub use fhir::{ResourceKind, is_valid_resource_type_name};
pub use fhir_reference::{FhirReference, UnresolvableReference, parse_reference};
pub use id::{IdError, MARKER_PREFIX, generate_id, is_marker, marker_id, to_marker, validate_id};
