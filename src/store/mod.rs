//! Persistence seam. Each write method is one transaction: it commits at its
//! end or leaves nothing behind.

mod memory;
mod postgres;

pub use memory::{MemoryStore, Table};
pub use postgres::PgStore;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::error::StoreError;
use crate::types::{
	BloodDonation, BloodUsage, Donor, DonorId, NewDonor, NewPatient, OrganDonation,
	OrganDonationOutcome, OrganUsage, Patient, PatientId, StockReport,
};

pub type SharedStore = Arc<dyn Store>;

#[async_trait]
pub trait Store: Send + Sync {
	async fn stock(&self) -> Result<StockReport, StoreError>;
	async fn donors(&self) -> Result<Vec<Donor>, StoreError>;
	async fn patients(&self) -> Result<Vec<Patient>, StoreError>;

	async fn insert_donor(&self, donor: &NewDonor) -> Result<(), StoreError>;
	async fn insert_patient(&self, patient: &NewPatient) -> Result<(), StoreError>;

	/// `false` when no donor row matched; nothing is committed then.
	async fn delete_donor(&self, id: DonorId) -> Result<bool, StoreError>;

	/// Drops the patient's blood and organ usage logs, then the patient row.
	/// All three go together or not at all: `false` rolls back the log deletes.
	async fn delete_patient(&self, id: PatientId) -> Result<bool, StoreError>;

	async fn last_blood_donation(&self, donor_id: DonorId) -> Result<Option<NaiveDateTime>, StoreError>;
	async fn record_blood_donation(&self, donation: &BloodDonation) -> Result<(), StoreError>;
	async fn record_blood_usage(&self, usage: &BloodUsage) -> Result<(), StoreError>;

	async fn record_organ_donation(&self, donation: &OrganDonation) -> Result<OrganDonationOutcome, StoreError>;

	/// Locks the organ's stock row, takes one unit and logs the usage.
	async fn record_organ_usage(&self, usage: &OrganUsage) -> Result<(), StoreError>;
}
