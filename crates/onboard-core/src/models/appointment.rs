//! Appointment scheduling details.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentInfo {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub notes: String,
}

impl AppointmentInfo {
    /// Notes alone do not make an appointment.
    pub fn is_empty(&self) -> bool {
        self.date.trim().is_empty() && self.time.trim().is_empty() && self.address.trim().is_empty()
    }
}
