// Statements issued against the blood bank schema. Tables, triggers and the
// two SP_RECORD_* procedures are owned by the database, not by this service.

pub const SELECT_BLOOD_STOCK: &str = r#"
SELECT blood_group, component, units_available, last_updated
FROM BloodStock
ORDER BY blood_group, component
"#;

pub const SELECT_ORGAN_STOCK: &str = r#"
SELECT organ_name, units_available, last_updated
FROM OrganStock
ORDER BY organ_name
"#;

pub const SELECT_DONORS: &str = r#"
SELECT donor_id, name, blood_group, contact_number, is_organ_donor
FROM Donor
ORDER BY donor_id
"#;

pub const SELECT_PATIENTS: &str = r#"
SELECT patient_id, name, blood_group, hospital, contact_number, resource_needed, is_urgent
FROM Patient
ORDER BY patient_id
"#;

pub const INSERT_DONOR: &str = r#"
INSERT INTO Donor
	(name, blood_group, contact_number, is_organ_donor)
VALUES
	($1, $2, $3, $4)
"#;

pub const INSERT_PATIENT: &str = r#"
INSERT INTO Patient
	(name, blood_group, hospital, contact_number, resource_needed, is_urgent)
VALUES
	($1, $2, $3, $4, $5, $6)
"#;

pub const DELETE_DONOR: &str = "DELETE FROM Donor WHERE donor_id = $1";

pub const DELETE_PATIENT_BLOOD_USAGE: &str = "DELETE FROM BloodUsageLog WHERE patient_id = $1";
pub const DELETE_PATIENT_ORGAN_USAGE: &str = "DELETE FROM OrganUsageLog WHERE patient_id = $1";
pub const DELETE_PATIENT: &str = "DELETE FROM Patient WHERE patient_id = $1";

// The cast lets a DATE column decode the same as a TIMESTAMP one (midnight).
pub const LAST_BLOOD_DONATION: &str =
	"SELECT MAX(donation_date)::timestamp FROM BloodDonationLog WHERE donor_id = $1";

// (donor_id, blood_group, units, component)
pub const CALL_RECORD_BLOOD_DONATION: &str = "CALL SP_RECORD_BLOOD_DONATION($1, $2, $3, $4)";

// (patient_id, blood_group, component, units)
pub const CALL_RECORD_BLOOD_USAGE: &str = "CALL SP_RECORD_BLOOD_USAGE($1, $2, $3, $4)";

pub const SELECT_ORGAN_DONOR_FLAG: &str = "SELECT is_organ_donor FROM Donor WHERE donor_id = $1";

// OrganStock is bumped by a trigger on this insert.
pub const INSERT_ORGAN_DONATION: &str = r#"
INSERT INTO OrganDonationLog
	(donor_id, organ_name, donation_date, status)
VALUES
	($1, $2, LOCALTIMESTAMP, 'Available')
"#;

pub const LOCK_ORGAN_STOCK: &str = r#"
SELECT units_available
FROM OrganStock
WHERE organ_name = $1
FOR UPDATE
"#;

pub const UPDATE_ORGAN_STOCK: &str = r#"
UPDATE OrganStock SET
	units_available = $1,
	last_updated = LOCALTIMESTAMP
WHERE organ_name = $2
"#;

pub const INSERT_ORGAN_USAGE: &str = r#"
INSERT INTO OrganUsageLog
	(organ_name, patient_id, usage_date)
VALUES
	($1, $2, LOCALTIMESTAMP)
"#;
