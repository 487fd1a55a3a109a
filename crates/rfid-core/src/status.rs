//! Machine-readable status records
//!
//! Every listener event maps to one record. Records serialize to the compact
//! JSON lines consumed by monitoring scripts:
//!
//! ```text
//! {"code":20,"message":"Successfully connected on /dev/ttyUSB0"}
//! {"code":30,"data":6699}
//! ```

use serde::{Serialize, Serializer};

use crate::decode::ScanCode;

/// Notification category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StatusCode {
    /// Informational or transient (searching, retrying, port closed)
    Info = 10,
    /// Connected to a reader
    Connected = 20,
    /// A scan code was decoded
    Data = 30,
    /// A line could not be decoded
    Warning = 40,
    /// Unclassified fault; the loop keeps retrying
    Unexpected = 60,
}

impl StatusCode {
    /// Numeric wire value
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl Serialize for StatusCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

/// Status record sent to external monitoring
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusRecord {
    pub code: StatusCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ScanCode>,
}

impl StatusRecord {
    /// Record carrying a human-readable message
    pub fn with_message(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
            data: None,
        }
    }

    /// Record carrying a decoded scan code
    pub fn with_data(code: ScanCode) -> Self {
        Self {
            code: StatusCode::Data,
            message: None,
            data: Some(code),
        }
    }

    /// Render as a single JSON line
    ///
    /// Falls back to an `Unexpected` record describing the failure if the
    /// record cannot be serialized.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            serde_json::json!({
                "code": StatusCode::Unexpected.as_u8(),
                "message": format!("Error formatting JSON: {}", e),
            })
            .to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_wire_values() {
        let codes: Vec<u8> = [
            StatusCode::Info,
            StatusCode::Connected,
            StatusCode::Data,
            StatusCode::Warning,
            StatusCode::Unexpected,
        ]
        .iter()
        .map(|c| c.as_u8())
        .collect();
        assert_eq!(codes, vec![10, 20, 30, 40, 60]);
    }

    #[test]
    fn test_message_record_json() {
        let record = StatusRecord::with_message(StatusCode::Connected, "Successfully connected on /dev/ttyUSB0");
        assert_eq!(
            record.to_json(),
            r#"{"code":20,"message":"Successfully connected on /dev/ttyUSB0"}"#
        );
    }

    #[test]
    fn test_data_record_json() {
        let record = StatusRecord::with_data(ScanCode::from(6699));
        assert_eq!(record.to_json(), r#"{"code":30,"data":6699}"#);
    }
}
