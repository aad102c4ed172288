use axum::{
	extract::{
		rejection::{JsonRejection, PathRejection},
		Path, State,
	},
	http::HeaderValue,
	routing::{delete, get, post},
	Json, Router,
};
use tower_http::{
	cors::{AllowOrigin, Any, CorsLayer},
	trace::TraceLayer,
};
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::pages;
use crate::rules::{self, Eligibility};
use crate::store::{SharedStore, Store};
use crate::types::{
	BloodDonation, BloodDonationForm, BloodUsage, BloodUsageForm, Donor, DonorForm, DonorId, Message,
	NewDonor, NewPatient, OrganDonation, OrganDonationForm, OrganDonationOutcome, OrganUsage,
	OrganUsageForm, Patient, PatientForm, PatientId, StockReport,
};

#[derive(Clone)]
pub struct ServerState {
	pub store: SharedStore,
}

pub fn router(store: SharedStore, cors: CorsLayer) -> Router {
	Router::new()
		.route("/", get(pages::landing))
		.route("/api/stock", get(stock))
		.route("/api/donors", get(list_donors))
		.route("/api/donors/register", post(register_donor))
		.route("/api/donors/donate", post(record_blood_donation))
		.route("/api/donors/:id", delete(delete_donor))
		.route("/api/patients", get(list_patients).post(register_patient))
		.route("/api/patients/:id", delete(delete_patient))
		.route("/api/blood/use", post(record_blood_usage))
		.route("/api/organ/donate", post(record_organ_donation))
		.route("/api/organ/use", post(record_organ_usage))
		.layer(TraceLayer::new_for_http())
		.layer(cors)
		.with_state(ServerState { store })
}

/// Any origin when `origins` is empty, otherwise exactly the listed ones.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
	let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
	if origins.is_empty() {
		return layer.allow_origin(Any);
	}
	let origins: Vec<HeaderValue> = origins
		.iter()
		.filter_map(|origin| match origin.parse() {
			Ok(value) => Some(value),
			Err(_) => {
				warn!(%origin, "ignoring unparsable CORS origin");
				None
			}
		})
		.collect();
	layer.allow_origin(AllowOrigin::list(origins))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
	payload
		.map(|Json(form)| form)
		.map_err(|rejection| ApiError::Validation(format!("Invalid request body: {}", rejection.body_text())))
}

fn path_id(id: Result<Path<i64>, PathRejection>) -> ApiResult<i64> {
	id.map(|Path(id)| id)
		.map_err(|rejection| ApiError::Validation(format!("Invalid id: {}", rejection.body_text())))
}

async fn stock(State(state): State<ServerState>) -> ApiResult<Json<StockReport>> {
	let report = state.store.stock().await.map_err(|e| e.failed("Failed to fetch stock data"))?;
	Ok(Json(report))
}

async fn list_donors(State(state): State<ServerState>) -> ApiResult<Json<Vec<Donor>>> {
	let donors = state.store.donors().await.map_err(|e| e.failed("Failed to fetch donors"))?;
	Ok(Json(donors))
}

async fn list_patients(State(state): State<ServerState>) -> ApiResult<Json<Vec<Patient>>> {
	let patients = state.store.patients().await.map_err(|e| e.failed("Failed to fetch patients"))?;
	Ok(Json(patients))
}

async fn delete_donor(
	State(state): State<ServerState>,
	id: Result<Path<DonorId>, PathRejection>,
) -> ApiResult<Json<Message>> {
	let id = path_id(id)?;
	let removed = state.store.delete_donor(id).await.map_err(|e| e.rejected("Failed to delete donor"))?;
	if !removed {
		return Err(ApiError::NotFound(format!("Donor ID {id} not found.")));
	}
	info!(donor_id = id, "donor deleted");
	Ok(Json(Message::new(format!("Donor ID {id} deleted successfully."))))
}

async fn delete_patient(
	State(state): State<ServerState>,
	id: Result<Path<PatientId>, PathRejection>,
) -> ApiResult<Json<Message>> {
	let id = path_id(id)?;
	let removed = state.store.delete_patient(id).await.map_err(|e| e.rejected("Failed to delete patient"))?;
	if !removed {
		return Err(ApiError::NotFound(format!("Patient ID {id} not found.")));
	}
	info!(patient_id = id, "patient deleted");
	Ok(Json(Message::new(format!("Patient ID {id} and related usage logs deleted successfully."))))
}

async fn register_donor(
	State(state): State<ServerState>,
	payload: Result<Json<DonorForm>, JsonRejection>,
) -> ApiResult<Json<Message>> {
	let donor = NewDonor::try_from(body(payload)?)?;
	state.store.insert_donor(&donor).await.map_err(|e| e.rejected("Donor Registration Failed"))?;
	info!(name = %donor.name, blood_group = %donor.blood_group, "donor registered");
	Ok(Json(Message::new(format!("Donor {} registered successfully.", donor.name))))
}

async fn register_patient(
	State(state): State<ServerState>,
	payload: Result<Json<PatientForm>, JsonRejection>,
) -> ApiResult<Json<Message>> {
	let patient = NewPatient::try_from(body(payload)?)?;
	state.store.insert_patient(&patient).await.map_err(|e| e.rejected("Patient Registration Failed"))?;
	info!(name = %patient.name, urgent = patient.is_urgent, "patient registered");
	Ok(Json(Message::new(format!("Patient {} registered successfully.", patient.name))))
}

/// Best effort: a donor inside the 90 day window is turned away, but if the
/// history cannot be read the donation goes ahead.
async fn check_donation_interval(store: &dyn Store, donor_id: DonorId) -> ApiResult<()> {
	let last = match store.last_blood_donation(donor_id).await {
		Ok(last) => last,
		Err(err) => {
			warn!(donor_id, error = %err, "skipping donation interval check");
			return Ok(());
		}
	};
	match rules::donation_eligibility(last, rules::now()) {
		Eligibility::TooSoon { last, next } => Err(ApiError::Validation(format!(
			"Donor ID {donor_id} last donated on {}. Next eligible on {} ({} day interval).",
			last.format("%Y-%m-%d"),
			next.format("%Y-%m-%d"),
			rules::DONATION_INTERVAL_DAYS,
		))),
		Eligibility::FirstDonation | Eligibility::Eligible => Ok(()),
	}
}

/// Strict: stock and log are written by the database procedure in one
/// transaction, and any failure there is the caller's answer.
async fn commit_blood_donation(store: &dyn Store, donation: &BloodDonation) -> ApiResult<()> {
	store
		.record_blood_donation(donation)
		.await
		.map_err(|e| e.rejected("Blood Donation Transaction Failed"))
}

async fn record_blood_donation(
	State(state): State<ServerState>,
	payload: Result<Json<BloodDonationForm>, JsonRejection>,
) -> ApiResult<Json<Message>> {
	let donation = BloodDonation::try_from(body(payload)?)?;
	check_donation_interval(state.store.as_ref(), donation.donor_id).await?;
	commit_blood_donation(state.store.as_ref(), &donation).await?;
	info!(donor_id = donation.donor_id, units = donation.units, "blood donation recorded");
	Ok(Json(Message::new(format!(
		"Blood donation recorded successfully for Donor ID {}.",
		donation.donor_id
	))))
}

async fn record_blood_usage(
	State(state): State<ServerState>,
	payload: Result<Json<BloodUsageForm>, JsonRejection>,
) -> ApiResult<Json<Message>> {
	let usage = BloodUsage::try_from(body(payload)?)?;
	state
		.store
		.record_blood_usage(&usage)
		.await
		.map_err(|e| e.rejected("Blood Usage Transaction Failed"))?;
	info!(patient_id = usage.patient_id, units = usage.units, "blood usage recorded");
	Ok(Json(Message::new(format!(
		"Blood usage recorded successfully for Patient ID {}.",
		usage.patient_id
	))))
}

async fn record_organ_donation(
	State(state): State<ServerState>,
	payload: Result<Json<OrganDonationForm>, JsonRejection>,
) -> ApiResult<Json<Message>> {
	let donation = OrganDonation::try_from(body(payload)?)?;
	let outcome = state
		.store
		.record_organ_donation(&donation)
		.await
		.map_err(|e| e.rejected("Organ Donation Transaction Failed"))?;
	match outcome {
		OrganDonationOutcome::DonorNotFound => {
			Err(ApiError::NotFound(format!("Donor ID {} not found.", donation.donor_id)))
		}
		OrganDonationOutcome::NotOptedIn => Err(ApiError::Forbidden(format!(
			"Donor ID {} has not opted for organ donation.",
			donation.donor_id
		))),
		OrganDonationOutcome::Recorded => {
			info!(donor_id = donation.donor_id, organ = %donation.organ_name, "organ donation recorded");
			Ok(Json(Message::new(format!(
				"Organ donation of '{}' recorded successfully.",
				donation.organ_name
			))))
		}
	}
}

async fn record_organ_usage(
	State(state): State<ServerState>,
	payload: Result<Json<OrganUsageForm>, JsonRejection>,
) -> ApiResult<Json<Message>> {
	let usage = OrganUsage::try_from(body(payload)?)?;
	state
		.store
		.record_organ_usage(&usage)
		.await
		.map_err(|e| e.rejected("Organ Usage Transaction Failed"))?;
	info!(patient_id = usage.patient_id, organ = %usage.organ_name, "organ usage recorded");
	Ok(Json(Message::new(format!(
		"Organ '{}' successfully used for Patient ID {}. Stock decremented and usage logged.",
		usage.organ_name, usage.patient_id
	))))
}
