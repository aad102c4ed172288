use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::debug;

use super::Store;
use crate::error::StoreError;
use crate::rules;
use crate::sql;
use crate::types::{
	BloodDonation, BloodStock, BloodUsage, Donor, DonorId, NewDonor, NewPatient, OrganDonation,
	OrganDonationOutcome, OrganStock, OrganUsage, Patient, PatientId, StockReport,
};

pub struct PgStore {
	pool: PgPool,
}

impl PgStore {
	/// Builds a bounded pool without touching the database; connections are
	/// opened on first use so an unreachable server shows up per request.
	pub fn connect_lazy(url: &str, max_connections: u32, acquire_timeout: Duration) -> Result<Self, sqlx::Error> {
		let pool = PgPoolOptions::new()
			.max_connections(max_connections)
			.acquire_timeout(acquire_timeout)
			.connect_lazy(url)?;
		Ok(PgStore { pool })
	}

	pub fn from_pool(pool: PgPool) -> Self {
		PgStore { pool }
	}
}

fn flag(value: bool) -> i16 {
	i16::from(value)
}

#[async_trait]
impl Store for PgStore {
	async fn stock(&self) -> Result<StockReport, StoreError> {
		let mut conn = self.pool.acquire().await?;
		let blood_stock = sqlx::query_as::<_, BloodStock>(sql::SELECT_BLOOD_STOCK)
			.fetch_all(&mut *conn)
			.await?;
		let organ_stock = sqlx::query_as::<_, OrganStock>(sql::SELECT_ORGAN_STOCK)
			.fetch_all(&mut *conn)
			.await?;
		Ok(StockReport { blood_stock, organ_stock })
	}

	async fn donors(&self) -> Result<Vec<Donor>, StoreError> {
		Ok(sqlx::query_as::<_, Donor>(sql::SELECT_DONORS).fetch_all(&self.pool).await?)
	}

	async fn patients(&self) -> Result<Vec<Patient>, StoreError> {
		Ok(sqlx::query_as::<_, Patient>(sql::SELECT_PATIENTS).fetch_all(&self.pool).await?)
	}

	async fn insert_donor(&self, donor: &NewDonor) -> Result<(), StoreError> {
		let mut tx = self.pool.begin().await?;
		sqlx::query(sql::INSERT_DONOR)
			.bind(&donor.name)
			.bind(&donor.blood_group)
			.bind(&donor.contact_number)
			.bind(flag(donor.is_organ_donor))
			.execute(&mut *tx)
			.await?;
		tx.commit().await?;
		Ok(())
	}

	async fn insert_patient(&self, patient: &NewPatient) -> Result<(), StoreError> {
		let mut tx = self.pool.begin().await?;
		sqlx::query(sql::INSERT_PATIENT)
			.bind(&patient.name)
			.bind(&patient.blood_group)
			.bind(&patient.hospital)
			.bind(&patient.contact_number)
			.bind(&patient.resource_needed)
			.bind(flag(patient.is_urgent))
			.execute(&mut *tx)
			.await?;
		tx.commit().await?;
		Ok(())
	}

	async fn delete_donor(&self, id: DonorId) -> Result<bool, StoreError> {
		let mut tx = self.pool.begin().await?;
		let removed = sqlx::query(sql::DELETE_DONOR).bind(id).execute(&mut *tx).await?.rows_affected();
		if removed == 0 {
			tx.rollback().await?;
			return Ok(false);
		}
		tx.commit().await?;
		Ok(true)
	}

	async fn delete_patient(&self, id: PatientId) -> Result<bool, StoreError> {
		let mut tx = self.pool.begin().await?;
		let blood = sqlx::query(sql::DELETE_PATIENT_BLOOD_USAGE).bind(id).execute(&mut *tx).await?;
		let organ = sqlx::query(sql::DELETE_PATIENT_ORGAN_USAGE).bind(id).execute(&mut *tx).await?;
		let removed = sqlx::query(sql::DELETE_PATIENT).bind(id).execute(&mut *tx).await?.rows_affected();
		if removed == 0 {
			tx.rollback().await?;
			return Ok(false);
		}
		tx.commit().await?;
		debug!(
			patient_id = id,
			blood_logs = blood.rows_affected(),
			organ_logs = organ.rows_affected(),
			"patient removed"
		);
		Ok(true)
	}

	async fn last_blood_donation(&self, donor_id: DonorId) -> Result<Option<NaiveDateTime>, StoreError> {
		let last: Option<NaiveDateTime> = sqlx::query_scalar(sql::LAST_BLOOD_DONATION)
			.bind(donor_id)
			.fetch_one(&self.pool)
			.await?;
		Ok(last)
	}

	async fn record_blood_donation(&self, donation: &BloodDonation) -> Result<(), StoreError> {
		let mut tx = self.pool.begin().await?;
		sqlx::query(sql::CALL_RECORD_BLOOD_DONATION)
			.bind(donation.donor_id)
			.bind(&donation.blood_group)
			.bind(donation.units)
			.bind(&donation.component)
			.execute(&mut *tx)
			.await?;
		tx.commit().await?;
		Ok(())
	}

	async fn record_blood_usage(&self, usage: &BloodUsage) -> Result<(), StoreError> {
		let mut tx = self.pool.begin().await?;
		sqlx::query(sql::CALL_RECORD_BLOOD_USAGE)
			.bind(usage.patient_id)
			.bind(&usage.blood_group)
			.bind(&usage.component)
			.bind(usage.units)
			.execute(&mut *tx)
			.await?;
		tx.commit().await?;
		Ok(())
	}

	async fn record_organ_donation(&self, donation: &OrganDonation) -> Result<OrganDonationOutcome, StoreError> {
		let mut tx = self.pool.begin().await?;
		let donor_flag: Option<i16> = sqlx::query_scalar(sql::SELECT_ORGAN_DONOR_FLAG)
			.bind(donation.donor_id)
			.fetch_optional(&mut *tx)
			.await?;
		match donor_flag {
			None => return Ok(OrganDonationOutcome::DonorNotFound),
			Some(value) if value != 1 => return Ok(OrganDonationOutcome::NotOptedIn),
			Some(_) => {}
		}
		sqlx::query(sql::INSERT_ORGAN_DONATION)
			.bind(donation.donor_id)
			.bind(&donation.organ_name)
			.execute(&mut *tx)
			.await?;
		tx.commit().await?;
		Ok(OrganDonationOutcome::Recorded)
	}

	async fn record_organ_usage(&self, usage: &OrganUsage) -> Result<(), StoreError> {
		let mut tx = self.pool.begin().await?;
		let available: Option<i32> = sqlx::query_scalar(sql::LOCK_ORGAN_STOCK)
			.bind(&usage.organ_name)
			.fetch_optional(&mut *tx)
			.await?;
		let remaining = rules::take_organ(&usage.organ_name, available)?;
		sqlx::query(sql::UPDATE_ORGAN_STOCK)
			.bind(remaining)
			.bind(&usage.organ_name)
			.execute(&mut *tx)
			.await?;
		sqlx::query(sql::INSERT_ORGAN_USAGE)
			.bind(&usage.organ_name)
			.bind(usage.patient_id)
			.execute(&mut *tx)
			.await?;
		tx.commit().await?;
		Ok(())
	}
}
