//! Shipping address captured at checkout.

use serde::{Deserialize, Serialize};

/// Country used when the checkout form leaves it empty.
pub const DEFAULT_COUNTRY: &str = "United States";

fn default_country() -> String {
    DEFAULT_COUNTRY.to_owned()
}

/// A shipping address as entered on the checkout form.
///
/// Stored as a JSON document on the order row, so optional fields may be
/// absent or empty strings depending on the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub address_line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_line2: Option<String>,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub postal_code: String,
    #[serde(default = "default_country")]
    pub country: String,
}

impl ShippingAddress {
    /// Names of required fields that are blank, in form order.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("full_name", &self.full_name),
            ("address_line1", &self.address_line1),
            ("city", &self.city),
            ("postal_code", &self.postal_code),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    /// Fill in the default country when the client sent a blank one.
    #[must_use]
    pub fn with_default_country(mut self) -> Self {
        if self.country.trim().is_empty() {
            self.country = default_country();
        }
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_country_defaults_when_absent() {
        let address: ShippingAddress = serde_json::from_value(serde_json::json!({
            "full_name": "Ada Lovelace",
            "address_line1": "12 St James's Sq",
            "city": "London",
            "postal_code": "SW1Y 4JH"
        }))
        .unwrap();
        assert_eq!(address.country, DEFAULT_COUNTRY);
        assert!(address.missing_fields().is_empty());
    }

    #[test]
    fn test_blank_country_is_replaced() {
        let address: ShippingAddress = serde_json::from_value(serde_json::json!({
            "full_name": "Ada",
            "address_line1": "1 Main St",
            "city": "Springfield",
            "postal_code": "12345",
            "country": " "
        }))
        .unwrap();
        assert_eq!(address.with_default_country().country, DEFAULT_COUNTRY);
    }

    #[test]
    fn test_missing_fields_reports_blanks() {
        let address = ShippingAddress {
            full_name: "  ".into(),
            phone: None,
            address_line1: "1 Main St".into(),
            address_line2: None,
            city: String::new(),
            state: None,
            postal_code: "12345".into(),
            country: DEFAULT_COUNTRY.into(),
        };
        assert_eq!(address.missing_fields(), vec!["full_name", "city"]);
    }
}
