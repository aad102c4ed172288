use maud::{html, Markup, DOCTYPE};

const ENDPOINTS: [(&str, &str, &str); 11] = [
	("GET", "/api/stock", "Blood and organ stock levels"),
	("GET", "/api/donors", "Registered donors"),
	("POST", "/api/donors/register", "Register a donor"),
	("DELETE", "/api/donors/{id}", "Remove a donor"),
	("POST", "/api/donors/donate", "Record a blood donation"),
	("GET", "/api/patients", "Registered patients"),
	("POST", "/api/patients", "Register a patient"),
	("DELETE", "/api/patients/{id}", "Remove a patient and their usage logs"),
	("POST", "/api/blood/use", "Record blood usage"),
	("POST", "/api/organ/donate", "Record an organ donation"),
	("POST", "/api/organ/use", "Record organ usage"),
];

pub async fn landing() -> Markup {
	html! {
		(DOCTYPE)
		html {
			head {
				meta charset="utf-8";
				title { "Blood & Organ Bank" }
			}
			body {
				h1 { "Blood & Organ Bank" }
				p { "Inventory tracking for donors, patients, blood and organ stock." }
				table {
					thead { tr {
						th { "Method" }
						th { "Path" }
						th { "Description" }
					} }
					tbody {
						@for (method, path, description) in ENDPOINTS {
							tr {
								td { (method) }
								td { code { (path) } }
								td { (description) }
							}
						}
					}
				}
			}
		}
	}
}
