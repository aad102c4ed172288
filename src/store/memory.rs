//! In-process stand-in for the blood bank database.
//!
//! It mirrors what the real schema does on its side: identity columns, the
//! foreign keys the handlers run into, the organ stock trigger and the two
//! blood procedures. Writes run on a copy of the tables that replaces the
//! live copy only on commit, so a failed step leaves nothing behind.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::sync::Mutex;

use super::Store;
use crate::error::StoreError;
use crate::rules;
use crate::types::{
	BloodDonation, BloodStock, BloodUsage, Donor, DonorId, NewDonor, NewPatient, OrganDonation,
	OrganDonationOutcome, OrganStock, OrganUsage, Patient, PatientId, StockReport,
};

pub const BLOOD_GROUPS: [&str; 8] = ["A+", "A-", "B+", "B-", "AB+", "AB-", "O+", "O-"];
pub const COMPONENTS: [&str; 4] = ["Plasma", "Platelets", "Red Blood Cells", "Whole Blood"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
	Donor,
	Patient,
	BloodStock,
	OrganStock,
	BloodDonationLog,
	BloodUsageLog,
	OrganDonationLog,
	OrganUsageLog,
}

#[derive(Debug, Clone)]
struct BloodDonationEntry {
	donor_id: DonorId,
	donation_date: NaiveDateTime,
}

#[derive(Debug, Clone)]
struct BloodUsageEntry {
	patient_id: PatientId,
}

#[derive(Debug, Clone)]
struct OrganDonationEntry {
	donor_id: DonorId,
}

#[derive(Debug, Clone)]
struct OrganUsageEntry {
	patient_id: PatientId,
}

#[derive(Debug, Clone, Default)]
struct Tables {
	donors: BTreeMap<DonorId, Donor>,
	patients: BTreeMap<PatientId, Patient>,
	blood_stock: BTreeMap<(String, String), BloodStock>,
	organ_stock: BTreeMap<String, OrganStock>,
	blood_donations: Vec<BloodDonationEntry>,
	blood_usage: Vec<BloodUsageEntry>,
	organ_donations: Vec<OrganDonationEntry>,
	organ_usage: Vec<OrganUsageEntry>,
	last_donor_id: DonorId,
	last_patient_id: PatientId,
}

impl Tables {
	fn donor_exists(&self, id: DonorId) -> Result<(), StoreError> {
		if self.donors.contains_key(&id) {
			Ok(())
		} else {
			Err(StoreError::Database(format!("Donor ID {id} does not exist.")))
		}
	}

	fn patient_exists(&self, id: PatientId) -> Result<(), StoreError> {
		if self.patients.contains_key(&id) {
			Ok(())
		} else {
			Err(StoreError::Database(format!("Patient ID {id} does not exist.")))
		}
	}

	#[cfg(any(test, feature = "test-util"))]
	fn count(&self, table: Table) -> usize {
		match table {
			Table::Donor => self.donors.len(),
			Table::Patient => self.patients.len(),
			Table::BloodStock => self.blood_stock.len(),
			Table::OrganStock => self.organ_stock.len(),
			Table::BloodDonationLog => self.blood_donations.len(),
			Table::BloodUsageLog => self.blood_usage.len(),
			Table::OrganDonationLog => self.organ_donations.len(),
			Table::OrganUsageLog => self.organ_usage.len(),
		}
	}
}

#[derive(Debug, Default)]
struct Faults {
	offline: bool,
	failing: HashSet<Table>,
}

impl Faults {
	fn connect(&self) -> Result<(), StoreError> {
		if self.offline {
			Err(StoreError::Connection("database is offline".to_string()))
		} else {
			Ok(())
		}
	}

	fn write(&self, table: Table) -> Result<(), StoreError> {
		if self.failing.contains(&table) {
			Err(StoreError::Database(format!("simulated failure writing {table:?}")))
		} else {
			Ok(())
		}
	}
}

#[derive(Debug, Default)]
struct Inner {
	tables: Tables,
	faults: Faults,
}

enum Finish<T> {
	Commit(T),
	Rollback(T),
}

#[derive(Debug, Default)]
pub struct MemoryStore {
	inner: Mutex<Inner>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Every blood group and component at zero units, no organs.
	pub fn with_standard_stock() -> Self {
		let mut tables = Tables::default();
		for group in BLOOD_GROUPS {
			for component in COMPONENTS {
				tables.blood_stock.insert(
					(group.to_string(), component.to_string()),
					BloodStock {
						blood_group: group.to_string(),
						component: component.to_string(),
						units_available: 0,
						last_updated: None,
					},
				);
			}
		}
		MemoryStore { inner: Mutex::new(Inner { tables, faults: Faults::default() }) }
	}

	async fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> Result<T, StoreError> {
		let inner = self.inner.lock().await;
		inner.faults.connect()?;
		Ok(f(&inner.tables))
	}

	// The lock is held for the whole transaction, which also stands in for
	// the row locks the real database takes.
	async fn transaction<T>(
		&self,
		f: impl FnOnce(&mut Tables, &Faults) -> Result<Finish<T>, StoreError>,
	) -> Result<T, StoreError> {
		let mut inner = self.inner.lock().await;
		inner.faults.connect()?;
		let mut working = inner.tables.clone();
		match f(&mut working, &inner.faults)? {
			Finish::Commit(value) => {
				inner.tables = working;
				Ok(value)
			}
			Finish::Rollback(value) => Ok(value),
		}
	}
}

// Seeding, inspection and fault injection for tests.
#[cfg(any(test, feature = "test-util"))]
impl MemoryStore {
	pub async fn set_offline(&self, offline: bool) {
		self.inner.lock().await.faults.offline = offline;
	}

	/// Makes every later write to `table` fail with a database error.
	pub async fn fail_writes_to(&self, table: Table) {
		self.inner.lock().await.faults.failing.insert(table);
	}

	pub async fn clear_failures(&self) {
		self.inner.lock().await.faults.failing.clear();
	}

	pub async fn count(&self, table: Table) -> usize {
		self.inner.lock().await.tables.count(table)
	}

	pub async fn set_blood_stock(&self, blood_group: &str, component: &str, units: i32) {
		let mut inner = self.inner.lock().await;
		inner.tables.blood_stock.insert(
			(blood_group.to_string(), component.to_string()),
			BloodStock {
				blood_group: blood_group.to_string(),
				component: component.to_string(),
				units_available: units,
				last_updated: Some(rules::now()),
			},
		);
	}

	pub async fn set_organ_stock(&self, organ: &str, units: i32) {
		let mut inner = self.inner.lock().await;
		inner.tables.organ_stock.insert(
			organ.to_string(),
			OrganStock { organ_name: organ.to_string(), units_available: units, last_updated: Some(rules::now()) },
		);
	}

	pub async fn blood_units(&self, blood_group: &str, component: &str) -> Option<i32> {
		let inner = self.inner.lock().await;
		let key = (blood_group.to_string(), component.to_string());
		inner.tables.blood_stock.get(&key).map(|row| row.units_available)
	}

	pub async fn organ_units(&self, organ: &str) -> Option<i32> {
		let inner = self.inner.lock().await;
		inner.tables.organ_stock.get(organ).map(|row| row.units_available)
	}

	/// Logs a past blood donation without touching stock.
	pub async fn backdate_blood_donation(&self, donor_id: DonorId, donation_date: NaiveDateTime) {
		let mut inner = self.inner.lock().await;
		inner.tables.blood_donations.push(BloodDonationEntry { donor_id, donation_date });
	}

	pub async fn log_blood_usage(&self, patient_id: PatientId) {
		self.inner.lock().await.tables.blood_usage.push(BloodUsageEntry { patient_id });
	}

	pub async fn log_organ_usage(&self, patient_id: PatientId) {
		self.inner.lock().await.tables.organ_usage.push(OrganUsageEntry { patient_id });
	}

	pub async fn usage_logs_of(&self, patient_id: PatientId) -> usize {
		let inner = self.inner.lock().await;
		let blood = inner.tables.blood_usage.iter().filter(|e| e.patient_id == patient_id).count();
		let organ = inner.tables.organ_usage.iter().filter(|e| e.patient_id == patient_id).count();
		blood + organ
	}
}

// Stock columns are INTEGER; a sum past i32::MAX is an out-of-range error
// there too, never a wrap.
fn add_units(available: i32, units: i32, item: &str) -> Result<i32, StoreError> {
	available.checked_add(units).ok_or_else(|| {
		StoreError::Database(format!(
			"stock overflow for {item}: {available} + {units} exceeds the storable maximum"
		))
	})
}

fn bump_organ(tables: &mut Tables, organ: &str) -> Result<(), StoreError> {
	let row = tables.organ_stock.entry(organ.to_string()).or_insert_with(|| OrganStock {
		organ_name: organ.to_string(),
		units_available: 0,
		last_updated: None,
	});
	row.units_available = add_units(row.units_available, 1, organ)?;
	row.last_updated = Some(rules::now());
	Ok(())
}

#[async_trait]
impl Store for MemoryStore {
	async fn stock(&self) -> Result<StockReport, StoreError> {
		self.read(|t| StockReport {
			blood_stock: t.blood_stock.values().cloned().collect(),
			organ_stock: t.organ_stock.values().cloned().collect(),
		})
		.await
	}

	async fn donors(&self) -> Result<Vec<Donor>, StoreError> {
		self.read(|t| t.donors.values().cloned().collect()).await
	}

	async fn patients(&self) -> Result<Vec<Patient>, StoreError> {
		self.read(|t| t.patients.values().cloned().collect()).await
	}

	async fn insert_donor(&self, donor: &NewDonor) -> Result<(), StoreError> {
		self.transaction(|t, faults| {
			faults.write(Table::Donor)?;
			t.last_donor_id += 1;
			let donor_id = t.last_donor_id;
			t.donors.insert(
				donor_id,
				Donor {
					donor_id,
					name: donor.name.clone(),
					blood_group: donor.blood_group.clone(),
					contact_number: Some(donor.contact_number.clone()),
					is_organ_donor: i16::from(donor.is_organ_donor),
				},
			);
			Ok(Finish::Commit(()))
		})
		.await
	}

	async fn insert_patient(&self, patient: &NewPatient) -> Result<(), StoreError> {
		self.transaction(|t, faults| {
			faults.write(Table::Patient)?;
			t.last_patient_id += 1;
			let patient_id = t.last_patient_id;
			t.patients.insert(
				patient_id,
				Patient {
					patient_id,
					name: patient.name.clone(),
					blood_group: patient.blood_group.clone(),
					hospital: patient.hospital.clone(),
					contact_number: patient.contact_number.clone(),
					resource_needed: patient.resource_needed.clone(),
					is_urgent: i16::from(patient.is_urgent),
				},
			);
			Ok(Finish::Commit(()))
		})
		.await
	}

	async fn delete_donor(&self, id: DonorId) -> Result<bool, StoreError> {
		self.transaction(|t, faults| {
			faults.write(Table::Donor)?;
			if !t.donors.contains_key(&id) {
				return Ok(Finish::Rollback(false));
			}
			let referenced = t.blood_donations.iter().any(|e| e.donor_id == id)
				|| t.organ_donations.iter().any(|e| e.donor_id == id);
			if referenced {
				return Err(StoreError::Database(format!(
					"Donor ID {id} is still referenced by donation logs."
				)));
			}
			t.donors.remove(&id);
			Ok(Finish::Commit(true))
		})
		.await
	}

	async fn delete_patient(&self, id: PatientId) -> Result<bool, StoreError> {
		self.transaction(|t, faults| {
			faults.write(Table::BloodUsageLog)?;
			t.blood_usage.retain(|e| e.patient_id != id);
			faults.write(Table::OrganUsageLog)?;
			t.organ_usage.retain(|e| e.patient_id != id);
			faults.write(Table::Patient)?;
			match t.patients.remove(&id) {
				Some(_) => Ok(Finish::Commit(true)),
				None => Ok(Finish::Rollback(false)),
			}
		})
		.await
	}

	async fn last_blood_donation(&self, donor_id: DonorId) -> Result<Option<NaiveDateTime>, StoreError> {
		self.read(|t| {
			t.blood_donations
				.iter()
				.filter(|e| e.donor_id == donor_id)
				.map(|e| e.donation_date)
				.max()
		})
		.await
	}

	// SP_RECORD_BLOOD_DONATION
	async fn record_blood_donation(&self, donation: &BloodDonation) -> Result<(), StoreError> {
		self.transaction(|t, faults| {
			t.donor_exists(donation.donor_id)?;
			faults.write(Table::BloodDonationLog)?;
			t.blood_donations.push(BloodDonationEntry {
				donor_id: donation.donor_id,
				donation_date: rules::now(),
			});
			faults.write(Table::BloodStock)?;
			let key = (donation.blood_group.clone(), donation.component.clone());
			let row = t.blood_stock.entry(key).or_insert_with(|| BloodStock {
				blood_group: donation.blood_group.clone(),
				component: donation.component.clone(),
				units_available: 0,
				last_updated: None,
			});
			let item = format!("{} {}", donation.blood_group, donation.component);
			row.units_available = add_units(row.units_available, donation.units, &item)?;
			row.last_updated = Some(rules::now());
			Ok(Finish::Commit(()))
		})
		.await
	}

	// SP_RECORD_BLOOD_USAGE
	async fn record_blood_usage(&self, usage: &BloodUsage) -> Result<(), StoreError> {
		self.transaction(|t, faults| {
			t.patient_exists(usage.patient_id)?;
			let key = (usage.blood_group.clone(), usage.component.clone());
			let available = t.blood_stock.get(&key).map_or(0, |row| row.units_available);
			if available < usage.units {
				return Err(StoreError::Database(format!(
					"Insufficient stock for {} {}. Available: {available}, requested: {}.",
					usage.blood_group, usage.component, usage.units
				)));
			}
			faults.write(Table::BloodStock)?;
			if let Some(row) = t.blood_stock.get_mut(&key) {
				row.units_available -= usage.units;
				row.last_updated = Some(rules::now());
			}
			faults.write(Table::BloodUsageLog)?;
			t.blood_usage.push(BloodUsageEntry { patient_id: usage.patient_id });
			Ok(Finish::Commit(()))
		})
		.await
	}

	async fn record_organ_donation(&self, donation: &OrganDonation) -> Result<OrganDonationOutcome, StoreError> {
		self.transaction(|t, faults| {
			match t.donors.get(&donation.donor_id) {
				None => return Ok(Finish::Rollback(OrganDonationOutcome::DonorNotFound)),
				Some(donor) if donor.is_organ_donor != 1 => {
					return Ok(Finish::Rollback(OrganDonationOutcome::NotOptedIn))
				}
				Some(_) => {}
			}
			faults.write(Table::OrganDonationLog)?;
			t.organ_donations.push(OrganDonationEntry { donor_id: donation.donor_id });
			faults.write(Table::OrganStock)?;
			bump_organ(t, &donation.organ_name)?;
			Ok(Finish::Commit(OrganDonationOutcome::Recorded))
		})
		.await
	}

	async fn record_organ_usage(&self, usage: &OrganUsage) -> Result<(), StoreError> {
		self.transaction(|t, faults| {
			let available = t.organ_stock.get(&usage.organ_name).map(|row| row.units_available);
			let remaining = rules::take_organ(&usage.organ_name, available)?;
			faults.write(Table::OrganStock)?;
			if let Some(row) = t.organ_stock.get_mut(&usage.organ_name) {
				row.units_available = remaining;
				row.last_updated = Some(rules::now());
			}
			t.patient_exists(usage.patient_id)?;
			faults.write(Table::OrganUsageLog)?;
			t.organ_usage.push(OrganUsageEntry { patient_id: usage.patient_id });
			Ok(Finish::Commit(()))
		})
		.await
	}
}
