//! PgStore against a real Postgres. Each test loads `fixtures/schema.sql` into
//! a scratch schema of its own and drops it afterwards.
//!
//! Run with `DATABASE_URL=postgres://.. cargo test --test postgres -- --ignored`.

use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::NaiveDate;
use sqlx::{
	postgres::{PgPool, PgPoolOptions},
	Executor,
};

use bloodbank::{
	error::{StockError, StoreError},
	store::{PgStore, Store},
	types::{BloodDonation, BloodUsage, NewDonor, NewPatient, OrganDonation, OrganDonationOutcome, OrganUsage},
};

const SCHEMA: &str = include_str!("fixtures/schema.sql");

static NEXT: AtomicUsize = AtomicUsize::new(0);

struct Scratch {
	admin: PgPool,
	pool: PgPool,
	schema: String,
	store: PgStore,
}

impl Scratch {
	async fn new() -> Scratch {
		dotenvy::dotenv().ok();
		let url = std::env::var("DATABASE_URL").expect("DATABASE_URL");
		let schema = format!("bloodbank_test_{}_{}", std::process::id(), NEXT.fetch_add(1, Ordering::SeqCst));

		let admin = PgPool::connect(&url).await.unwrap();
		admin.execute(format!("CREATE SCHEMA {schema}").as_str()).await.unwrap();

		let search_path = format!("SET search_path TO {schema}");
		let pool = PgPoolOptions::new()
			.max_connections(2)
			.after_connect(move |conn, _meta| {
				let search_path = search_path.clone();
				Box::pin(async move {
					conn.execute(search_path.as_str()).await?;
					Ok(())
				})
			})
			.connect(&url)
			.await
			.unwrap();
		pool.execute(SCHEMA).await.unwrap();

		let store = PgStore::from_pool(pool.clone());
		Scratch { admin, pool, schema, store }
	}

	async fn count(&self, table: &str) -> i64 {
		let query = format!("SELECT COUNT(*) FROM {table}");
		sqlx::query_scalar(&query).fetch_one(&self.pool).await.unwrap()
	}

	async fn exec(&self, statements: &str) {
		self.pool.execute(statements).await.unwrap();
	}

	async fn organ_units(&self, organ: &str) -> Option<i32> {
		sqlx::query_scalar("SELECT units_available FROM OrganStock WHERE organ_name = $1")
			.bind(organ)
			.fetch_optional(&self.pool)
			.await
			.unwrap()
	}

	async fn blood_units(&self, group: &str, component: &str) -> Option<i32> {
		sqlx::query_scalar("SELECT units_available FROM BloodStock WHERE blood_group = $1 AND component = $2")
			.bind(group)
			.bind(component)
			.fetch_optional(&self.pool)
			.await
			.unwrap()
	}

	async fn finish(self) {
		self.pool.close().await;
		self.admin
			.execute(format!("DROP SCHEMA {} CASCADE", self.schema).as_str())
			.await
			.unwrap();
	}
}

fn donor(name: &str, organ: bool) -> NewDonor {
	NewDonor {
		name: name.into(),
		blood_group: "O+".into(),
		contact_number: "555".into(),
		is_organ_donor: organ,
	}
}

fn patient(name: &str) -> NewPatient {
	NewPatient {
		name: name.into(),
		blood_group: "A+".into(),
		hospital: "City".into(),
		contact_number: None,
		resource_needed: "Kidney".into(),
		is_urgent: false,
	}
}

const PATIENT_LOGS: &str = r#"
INSERT INTO BloodUsageLog (patient_id, blood_group, component, units, usage_date)
	VALUES (1, 'A+', 'Plasma', 1, LOCALTIMESTAMP);
INSERT INTO OrganUsageLog (organ_name, patient_id, usage_date)
	VALUES ('Kidney', 1, LOCALTIMESTAMP);
"#;

// Logs left behind for patient 9, whose row does not exist.
const ORPHAN_LOGS: &str = r#"
ALTER TABLE BloodUsageLog DROP CONSTRAINT bloodusagelog_patient_id_fkey;
ALTER TABLE OrganUsageLog DROP CONSTRAINT organusagelog_patient_id_fkey;
INSERT INTO BloodUsageLog (patient_id, blood_group, component, units, usage_date)
	VALUES (9, 'A+', 'Plasma', 1, LOCALTIMESTAMP);
INSERT INTO OrganUsageLog (organ_name, patient_id, usage_date)
	VALUES ('Kidney', 9, LOCALTIMESTAMP);
"#;

#[tokio::test]
#[ignore = "needs DATABASE_URL pointing at a scratch Postgres"]
async fn deleting_missing_patient_rolls_back_log_deletes() {
	let db = Scratch::new().await;
	db.store.insert_patient(&patient("P")).await.unwrap();
	db.exec(PATIENT_LOGS).await;
	db.exec(ORPHAN_LOGS).await;
	let before = (db.count("Patient").await, db.count("BloodUsageLog").await, db.count("OrganUsageLog").await);
	assert_eq!(before, (1, 2, 2));

	assert!(!db.store.delete_patient(9).await.unwrap());
	let after = (db.count("Patient").await, db.count("BloodUsageLog").await, db.count("OrganUsageLog").await);
	assert_eq!(after, before);
	db.finish().await;
}

#[tokio::test]
#[ignore = "needs DATABASE_URL pointing at a scratch Postgres"]
async fn deleting_patient_cascades_to_usage_logs() {
	let db = Scratch::new().await;
	db.store.insert_patient(&patient("P")).await.unwrap();
	db.store.insert_patient(&patient("Q")).await.unwrap();
	db.exec(PATIENT_LOGS).await;
	db.exec("INSERT INTO OrganUsageLog (organ_name, patient_id, usage_date) VALUES ('Liver', 2, LOCALTIMESTAMP)")
		.await;
	assert_eq!(db.count("OrganUsageLog").await, 2);

	assert!(db.store.delete_patient(1).await.unwrap());
	assert_eq!(db.count("Patient").await, 1);
	assert_eq!(db.count("BloodUsageLog").await, 0);
	assert_eq!(db.count("OrganUsageLog").await, 1);
	db.finish().await;
}

#[tokio::test]
#[ignore = "needs DATABASE_URL pointing at a scratch Postgres"]
async fn failing_patient_delete_keeps_every_log() {
	let db = Scratch::new().await;
	db.store.insert_patient(&patient("P")).await.unwrap();
	db.exec(PATIENT_LOGS).await;
	db.exec(
		r#"
CREATE FUNCTION refuse_delete() RETURNS TRIGGER LANGUAGE plpgsql AS $$
BEGIN
	RAISE EXCEPTION 'patient rows are locked';
END;
$$;
CREATE TRIGGER refuse_delete BEFORE DELETE ON Patient FOR EACH ROW EXECUTE FUNCTION refuse_delete();
"#,
	)
	.await;

	let err = db.store.delete_patient(1).await.unwrap_err();
	assert!(matches!(err, StoreError::Database(ref msg) if msg.contains("patient rows are locked")));
	assert_eq!(db.count("Patient").await, 1);
	assert_eq!(db.count("BloodUsageLog").await, 1);
	assert_eq!(db.count("OrganUsageLog").await, 1);
	db.finish().await;
}

#[tokio::test]
#[ignore = "needs DATABASE_URL pointing at a scratch Postgres"]
async fn deleting_missing_donor_changes_nothing() {
	let db = Scratch::new().await;
	db.store.insert_donor(&donor("A", false)).await.unwrap();
	assert!(!db.store.delete_donor(7).await.unwrap());
	assert_eq!(db.count("Donor").await, 1);
	assert!(db.store.delete_donor(1).await.unwrap());
	assert_eq!(db.count("Donor").await, 0);
	db.finish().await;
}

#[tokio::test]
#[ignore = "needs DATABASE_URL pointing at a scratch Postgres"]
async fn organ_usage_locks_then_writes_back_stock() {
	let db = Scratch::new().await;
	db.store.insert_patient(&patient("P")).await.unwrap();
	db.exec("INSERT INTO OrganStock (organ_name, units_available, last_updated) VALUES ('Kidney', 1, LOCALTIMESTAMP)")
		.await;
	let usage = OrganUsage { patient_id: 1, organ_name: "Kidney".into() };

	db.store.record_organ_usage(&usage).await.unwrap();
	assert_eq!(db.organ_units("Kidney").await, Some(0));
	assert_eq!(db.count("OrganUsageLog").await, 1);

	let err = db.store.record_organ_usage(&usage).await.unwrap_err();
	assert!(matches!(
		err,
		StoreError::Stock(StockError::InsufficientOrgan { available: 0, .. })
	));
	assert_eq!(db.organ_units("Kidney").await, Some(0));
	assert_eq!(db.count("OrganUsageLog").await, 1);
	db.finish().await;
}

#[tokio::test]
#[ignore = "needs DATABASE_URL pointing at a scratch Postgres"]
async fn organ_usage_of_unknown_organ_logs_nothing() {
	let db = Scratch::new().await;
	db.store.insert_patient(&patient("P")).await.unwrap();
	let usage = OrganUsage { patient_id: 1, organ_name: "Heart".into() };
	let err = db.store.record_organ_usage(&usage).await.unwrap_err();
	assert!(matches!(
		err,
		StoreError::Stock(StockError::InsufficientOrgan { available: 0, .. })
	));
	assert_eq!(db.count("OrganStock").await, 0);
	assert_eq!(db.count("OrganUsageLog").await, 0);
	db.finish().await;
}

#[tokio::test]
#[ignore = "needs DATABASE_URL pointing at a scratch Postgres"]
async fn blood_procedures_receive_arguments_in_declared_order() {
	let db = Scratch::new().await;
	db.store.insert_donor(&donor("A", false)).await.unwrap();
	db.store.insert_patient(&patient("P")).await.unwrap();
	assert_eq!(db.count("BloodDonationLog").await, 0);

	let donation = BloodDonation {
		donor_id: 1,
		blood_group: "O+".into(),
		component: "Plasma".into(),
		units: 3,
	};
	db.store.record_blood_donation(&donation).await.unwrap();
	assert_eq!(db.blood_units("O+", "Plasma").await, Some(3));
	assert_eq!(db.count("BloodDonationLog").await, 1);

	let usage = |units| BloodUsage {
		patient_id: 1,
		blood_group: "O+".into(),
		component: "Plasma".into(),
		units,
	};
	db.store.record_blood_usage(&usage(2)).await.unwrap();
	assert_eq!(db.blood_units("O+", "Plasma").await, Some(1));
	assert_eq!(db.count("BloodUsageLog").await, 1);

	let err = db.store.record_blood_usage(&usage(5)).await.unwrap_err();
	assert!(matches!(err, StoreError::Database(ref msg) if msg.contains("Insufficient stock")));
	assert_eq!(db.blood_units("O+", "Plasma").await, Some(1));
	assert_eq!(db.count("BloodUsageLog").await, 1);
	db.finish().await;
}

#[tokio::test]
#[ignore = "needs DATABASE_URL pointing at a scratch Postgres"]
async fn organ_donation_needs_opt_in_and_bumps_stock() {
	let db = Scratch::new().await;
	db.store.insert_donor(&donor("A", false)).await.unwrap();
	db.store.insert_donor(&donor("B", true)).await.unwrap();
	let donation = |donor_id| OrganDonation { donor_id, organ_name: "Kidney".into() };

	assert_eq!(db.store.record_organ_donation(&donation(9)).await.unwrap(), OrganDonationOutcome::DonorNotFound);
	assert_eq!(db.store.record_organ_donation(&donation(1)).await.unwrap(), OrganDonationOutcome::NotOptedIn);
	assert_eq!(db.count("OrganDonationLog").await, 0);

	assert_eq!(db.store.record_organ_donation(&donation(2)).await.unwrap(), OrganDonationOutcome::Recorded);
	assert_eq!(db.store.record_organ_donation(&donation(2)).await.unwrap(), OrganDonationOutcome::Recorded);
	assert_eq!(db.count("OrganDonationLog").await, 2);
	assert_eq!(db.organ_units("Kidney").await, Some(2));
	db.finish().await;
}

#[tokio::test]
#[ignore = "needs DATABASE_URL pointing at a scratch Postgres"]
async fn last_donation_reads_timestamp_and_date_columns() {
	let db = Scratch::new().await;
	db.store.insert_donor(&donor("A", false)).await.unwrap();
	assert_eq!(db.store.last_blood_donation(1).await.unwrap(), None);

	db.exec(
		"INSERT INTO BloodDonationLog (donor_id, blood_group, component, units, donation_date)
		VALUES (1, 'O+', 'Plasma', 1, TIMESTAMP '2026-01-15 10:30:00')",
	)
	.await;
	let at = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
	assert_eq!(db.store.last_blood_donation(1).await.unwrap(), Some(at.and_hms_opt(10, 30, 0).unwrap()));

	db.exec("ALTER TABLE BloodDonationLog ALTER COLUMN donation_date TYPE DATE").await;
	assert_eq!(db.store.last_blood_donation(1).await.unwrap(), Some(at.and_hms_opt(0, 0, 0).unwrap()));
	db.finish().await;
}
