use serde::{Deserialize, Serialize};

use stockledger_core::DomainError;
use stockledger_infra::Notice;
use stockledger_stock::{Movement, Warehouse};

// -------------------------
// Request DTOs
// -------------------------

/// Product edit form submission (`application/x-www-form-urlencoded`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionForm {
    #[serde(default)]
    pub action: String,
    pub code: Option<String>,
    #[serde(rename = "mov-description")]
    pub description: Option<String>,
    #[serde(rename = "mov-quantity")]
    pub quantity: Option<String>,
    pub multireqtoken: Option<String>,
}

impl ActionForm {
    /// Record code, if a non-blank one was sent.
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }

    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or_default()
    }

    /// Requested quantity; a blank field means zero.
    pub fn quantity(&self) -> Result<f64, DomainError> {
        match self.quantity.as_deref().map(str::trim) {
            None | Some("") => Ok(0.0),
            Some(raw) => raw
                .parse::<f64>()
                .map_err(|_| DomainError::validation(format!("'{raw}' is not a number"))),
        }
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ActionResponse {
    pub action: String,
    /// `false` when the action is not one of the stock actions.
    pub handled: bool,
    pub notices: Vec<Notice>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MovementResponse {
    pub id: String,
    pub warehouse_id: String,
    pub reference: String,
    pub date: String,
    pub time: String,
    pub document: String,
    pub quantity: f64,
}

impl From<&Movement> for MovementResponse {
    fn from(m: &Movement) -> Self {
        Self {
            id: m.id.to_string(),
            warehouse_id: m.warehouse_id.to_string(),
            reference: m.reference.clone(),
            date: m.date().format("%Y-%m-%d").to_string(),
            time: m.time().format("%H:%M:%S").to_string(),
            document: m.document.clone(),
            quantity: m.quantity.value(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MovementListResponse {
    pub has_movements: bool,
    pub movements: Vec<MovementResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WarehouseResponse {
    pub id: String,
    pub name: String,
}

impl From<Warehouse> for WarehouseResponse {
    fn from(w: Warehouse) -> Self {
        Self {
            id: w.id.to_string(),
            name: w.name,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FormTokenResponse {
    pub multireqtoken: String,
}
