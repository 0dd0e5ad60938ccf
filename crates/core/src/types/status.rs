//! Order status as reported by the backend.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a placed order.
///
/// The backend sends lowercase Spanish labels on the wire. Labels this
/// client does not know are kept verbatim in [`OrderStatus::Other`] so a
/// new backend state never breaks order history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    Received,
    Preparing,
    Ready,
    Delivered,
    Cancelled,
    Other(String),
}

impl OrderStatus {
    /// The label used by the backend for this status.
    #[must_use]
    pub fn wire_label(&self) -> &str {
        match self {
            Self::Received => "recibido",
            Self::Preparing => "preparando",
            Self::Ready => "listo",
            Self::Delivered => "entregado",
            Self::Cancelled => "cancelado",
            Self::Other(raw) => raw,
        }
    }

    /// Human-readable label for display.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Received => "Received",
            Self::Preparing => "Preparing",
            Self::Ready => "Ready for pickup",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
            Self::Other(raw) => raw,
        }
    }

    /// Whether the order can still change state.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Received | Self::Preparing | Self::Ready)
    }
}

impl From<String> for OrderStatus {
    fn from(raw: String) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "recibido" => Self::Received,
            "preparando" => Self::Preparing,
            "listo" => Self::Ready,
            "entregado" => Self::Delivered,
            "cancelado" => Self::Cancelled,
            _ => Self::Other(raw),
        }
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        status.wire_label().to_owned()
    }
}

impl FromStr for OrderStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s.to_owned()))
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("LISTO".parse::<OrderStatus>().unwrap(), OrderStatus::Ready);
        assert_eq!(
            " Entregado ".parse::<OrderStatus>().unwrap(),
            OrderStatus::Delivered
        );
    }

    #[test]
    fn test_unknown_label_is_preserved() {
        let status: OrderStatus = serde_json::from_str("\"en_camino\"").unwrap();
        assert_eq!(status, OrderStatus::Other("en_camino".to_string()));
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"en_camino\"");
    }

    #[test]
    fn test_wire_round_trip_uses_backend_labels() {
        let json = serde_json::to_string(&OrderStatus::Cancelled).unwrap();
        assert_eq!(json, "\"cancelado\"");
    }

    #[test]
    fn test_open_states() {
        assert!(OrderStatus::Preparing.is_open());
        assert!(!OrderStatus::Delivered.is_open());
        assert!(!OrderStatus::Other("x".into()).is_open());
    }
}
