use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;

pub type DonorId = i64;
pub type PatientId = i64;

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Donor {
	pub donor_id: DonorId,
	pub name: String,
	pub blood_group: String,
	pub contact_number: Option<String>,
	pub is_organ_donor: i16,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Patient {
	pub patient_id: PatientId,
	pub name: String,
	pub blood_group: String,
	pub hospital: String,
	pub contact_number: Option<String>,
	pub resource_needed: String,
	pub is_urgent: i16,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct BloodStock {
	pub blood_group: String,
	pub component: String,
	pub units_available: i32,
	pub last_updated: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct OrganStock {
	pub organ_name: String,
	pub units_available: i32,
	pub last_updated: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StockReport {
	pub blood_stock: Vec<BloodStock>,
	pub organ_stock: Vec<OrganStock>,
}

#[derive(Debug, Serialize)]
pub struct Message {
	pub message: String,
}

impl Message {
	pub fn new(message: impl Into<String>) -> Self {
		Message { message: message.into() }
	}
}

// Request bodies. Every field is kept as raw JSON so that "present and truthy"
// can be judged before anything is converted.

#[derive(Debug, Default, Deserialize)]
pub struct DonorForm {
	pub name: Option<Value>,
	pub blood_group: Option<Value>,
	pub contact_number: Option<Value>,
	pub is_organ_donor: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PatientForm {
	pub name: Option<Value>,
	pub blood_group: Option<Value>,
	pub hospital: Option<Value>,
	pub contact_number: Option<Value>,
	pub resource_needed: Option<Value>,
	pub is_urgent: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BloodDonationForm {
	pub donor_id: Option<Value>,
	pub blood_group: Option<Value>,
	pub component: Option<Value>,
	pub units: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BloodUsageForm {
	pub patient_id: Option<Value>,
	pub blood_group: Option<Value>,
	pub component: Option<Value>,
	pub units: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrganDonationForm {
	pub donor_id: Option<Value>,
	pub organ_name: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrganUsageForm {
	pub patient_id: Option<Value>,
	pub organ_name: Option<Value>,
}

// Validated commands handed to the store.

#[derive(Debug, Clone, PartialEq)]
pub struct NewDonor {
	pub name: String,
	pub blood_group: String,
	pub contact_number: String,
	pub is_organ_donor: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPatient {
	pub name: String,
	pub blood_group: String,
	pub hospital: String,
	pub contact_number: Option<String>,
	pub resource_needed: String,
	pub is_urgent: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BloodDonation {
	pub donor_id: DonorId,
	pub blood_group: String,
	pub component: String,
	pub units: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BloodUsage {
	pub patient_id: PatientId,
	pub blood_group: String,
	pub component: String,
	pub units: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrganDonation {
	pub donor_id: DonorId,
	pub organ_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrganUsage {
	pub patient_id: PatientId,
	pub organ_name: String,
}

/// What happened to an organ donation attempt once the donor row was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrganDonationOutcome {
	Recorded,
	DonorNotFound,
	NotOptedIn,
}

/// JSON truthiness: null, false, 0, "", [] and {} are falsy.
pub fn is_truthy(value: &Value) -> bool {
	match value {
		Value::Null => false,
		Value::Bool(b) => *b,
		Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
		Value::String(s) => !s.is_empty(),
		Value::Array(a) => !a.is_empty(),
		Value::Object(o) => !o.is_empty(),
	}
}

fn truthy(value: &Option<Value>) -> bool {
	value.as_ref().is_some_and(is_truthy)
}

fn require(fields: &[&Option<Value>], operation: &str) -> Result<(), ApiError> {
	if fields.iter().all(|f| truthy(f)) {
		Ok(())
	} else {
		Err(ApiError::Validation(format!("Missing required fields for {operation}.")))
	}
}

fn text(value: Option<Value>, field: &str) -> Result<String, ApiError> {
	match value {
		Some(Value::String(s)) => Ok(s),
		Some(Value::Number(n)) => Ok(n.to_string()),
		_ => Err(ApiError::Validation(format!("Field '{field}' must be a string."))),
	}
}

fn optional_text(value: Option<Value>, field: &str) -> Result<Option<String>, ApiError> {
	if truthy(&value) {
		text(value, field).map(Some)
	} else {
		Ok(None)
	}
}

fn integer(value: Option<Value>, field: &str) -> Result<i64, ApiError> {
	let parsed = match &value {
		Some(Value::Number(n)) => n.as_i64(),
		Some(Value::String(s)) => s.trim().parse().ok(),
		_ => None,
	};
	parsed.ok_or_else(|| ApiError::Validation(format!("Field '{field}' must be an integer.")))
}

fn units(value: Option<Value>) -> Result<i32, ApiError> {
	let units = integer(value, "units")?;
	match i32::try_from(units) {
		Ok(units) if units > 0 => Ok(units),
		_ => Err(ApiError::Validation("Field 'units' must be a positive integer.".to_string())),
	}
}

impl TryFrom<DonorForm> for NewDonor {
	type Error = ApiError;
	fn try_from(form: DonorForm) -> Result<Self, Self::Error> {
		require(&[&form.name, &form.blood_group, &form.contact_number], "donor registration")?;
		Ok(NewDonor {
			is_organ_donor: truthy(&form.is_organ_donor),
			name: text(form.name, "name")?,
			blood_group: text(form.blood_group, "blood_group")?,
			contact_number: text(form.contact_number, "contact_number")?,
		})
	}
}

impl TryFrom<PatientForm> for NewPatient {
	type Error = ApiError;
	fn try_from(form: PatientForm) -> Result<Self, Self::Error> {
		require(
			&[&form.name, &form.blood_group, &form.hospital, &form.resource_needed],
			"patient registration",
		)?;
		Ok(NewPatient {
			is_urgent: truthy(&form.is_urgent),
			name: text(form.name, "name")?,
			blood_group: text(form.blood_group, "blood_group")?,
			hospital: text(form.hospital, "hospital")?,
			contact_number: optional_text(form.contact_number, "contact_number")?,
			resource_needed: text(form.resource_needed, "resource_needed")?,
		})
	}
}

impl TryFrom<BloodDonationForm> for BloodDonation {
	type Error = ApiError;
	fn try_from(form: BloodDonationForm) -> Result<Self, Self::Error> {
		require(&[&form.donor_id, &form.blood_group, &form.component, &form.units], "blood donation")?;
		Ok(BloodDonation {
			donor_id: integer(form.donor_id, "donor_id")?,
			blood_group: text(form.blood_group, "blood_group")?,
			component: text(form.component, "component")?,
			units: units(form.units)?,
		})
	}
}

impl TryFrom<BloodUsageForm> for BloodUsage {
	type Error = ApiError;
	fn try_from(form: BloodUsageForm) -> Result<Self, Self::Error> {
		require(&[&form.patient_id, &form.blood_group, &form.component, &form.units], "blood usage")?;
		Ok(BloodUsage {
			patient_id: integer(form.patient_id, "patient_id")?,
			blood_group: text(form.blood_group, "blood_group")?,
			component: text(form.component, "component")?,
			units: units(form.units)?,
		})
	}
}

impl TryFrom<OrganDonationForm> for OrganDonation {
	type Error = ApiError;
	fn try_from(form: OrganDonationForm) -> Result<Self, Self::Error> {
		require(&[&form.donor_id, &form.organ_name], "organ donation")?;
		Ok(OrganDonation {
			donor_id: integer(form.donor_id, "donor_id")?,
			organ_name: text(form.organ_name, "organ_name")?,
		})
	}
}

impl TryFrom<OrganUsageForm> for OrganUsage {
	type Error = ApiError;
	fn try_from(form: OrganUsageForm) -> Result<Self, Self::Error> {
		require(&[&form.patient_id, &form.organ_name], "organ usage")?;
		Ok(OrganUsage {
			patient_id: integer(form.patient_id, "patient_id")?,
			organ_name: text(form.organ_name, "organ_name")?,
		})
	}
}
