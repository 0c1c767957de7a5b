//! DTOs for medication endpoints

use medication_domain::{Form, Medication, MedicationData};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request body for creating a medication
#[derive(Debug, Deserialize, ToSchema)]
pub struct MedicationInput {
    #[schema(example = "paracetamol")]
    pub name: String,
    #[schema(example = "500mg")]
    pub dosage: String,
    /// One of `tablet`, `capsule`, `liquid` (case-insensitive)
    #[schema(example = "tablet")]
    pub form: String,
}

impl MedicationInput {
    /// Validate the input into domain data
    pub fn into_data(self) -> Result<MedicationData, String> {
        let form: Form = self.form.parse()?;
        let data = MedicationData::new(self.name, self.dosage, form);
        data.validate()?;
        Ok(data)
    }
}

/// Response body describing a stored medication
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MedicationResponse {
    #[schema(example = "42")]
    pub id: String,
    /// Opaque version token, changes on every write
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub version: String,
    #[schema(example = "paracetamol")]
    pub name: String,
    #[schema(example = "500mg")]
    pub dosage: String,
    #[schema(example = "tablet")]
    pub form: String,
}

impl From<Medication> for MedicationResponse {
    fn from(medication: Medication) -> Self {
        Self {
            id: medication.identity.id,
            version: medication.version.to_string(),
            name: medication.data.name,
            dosage: medication.data.dosage,
            form: medication.data.form.as_str().to_string(),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error description
    #[schema(example = "name must not be empty")]
    pub error: String,
}
