//! Business rules that live on the application side of the database.
//!
//! Stock arithmetic for blood belongs to the stored procedures; what is left
//! here is the repeat-donation interval and the organ sufficiency check.

use chrono::{Duration, Local, NaiveDateTime};

use crate::error::StockError;

pub const DONATION_INTERVAL_DAYS: i64 = 90;

/// Local wall-clock time, the same reference the database stamps logs with.
pub fn now() -> NaiveDateTime {
	Local::now().naive_local()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
	FirstDonation,
	Eligible,
	TooSoon {
		last: NaiveDateTime,
		next: NaiveDateTime,
	},
}

impl Eligibility {
	pub fn is_eligible(self) -> bool {
		!matches!(self, Eligibility::TooSoon { .. })
	}
}

/// Whole days elapsed since `last` decide; 89 days and change is still too soon.
pub fn donation_eligibility(last: Option<NaiveDateTime>, now: NaiveDateTime) -> Eligibility {
	let Some(last) = last else {
		return Eligibility::FirstDonation;
	};
	if (now - last).num_days() < DONATION_INTERVAL_DAYS {
		Eligibility::TooSoon { last, next: last + Duration::days(DONATION_INTERVAL_DAYS) }
	} else {
		Eligibility::Eligible
	}
}

/// Takes one unit out of an organ stock row read under lock, returning the
/// count to write back.
pub fn take_organ(organ: &str, available: Option<i32>) -> Result<i32, StockError> {
	match available {
		Some(units) if units >= 1 => Ok(units - 1),
		other => Err(StockError::InsufficientOrgan {
			organ: organ.to_string(),
			available: other.unwrap_or(0),
		}),
	}
}
