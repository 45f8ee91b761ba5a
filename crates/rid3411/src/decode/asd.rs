//! ASD-STAN prEN 4709-002 operator-ID helpers.
//!
//! The EU standard reuses the ASTM message schema wholesale; what differs is
//! the service UUID on the air and the format of the operator registration
//! number. These helpers validate the latter without rejecting anything at
//! decode time: a drone flying ASTM-formatted IDs in EU airspace is still a
//! drone.

/// ISO 3166-1 alpha-3 codes of EU member states, plus EEA/EFTA and the UK
const EU_COUNTRY_CODES: &[&str] = &[
    "AUT", "BEL", "BGR", "HRV", "CYP", "CZE", "DNK", "EST", "FIN", "FRA",
    "DEU", "GRC", "HUN", "IRL", "ITA", "LVA", "LTU", "LUX", "MLT", "NLD",
    "POL", "PRT", "ROU", "SVK", "SVN", "ESP", "SWE", "ISL", "LIE", "NOR",
    "CHE", "GBR",
];

/// Extract the leading 3-letter country code, if it is one of the EU/EEA
/// allocations. `"FRA-OP-12345678"` and `"FIN87astrdge12k8"` both yield
/// their country; anything else yields `None`.
pub fn extract_country_code(operator_id: &str) -> Option<&str> {
    let code = operator_id.get(..3)?;
    if !code.chars().all(|c| c.is_ascii_uppercase()) {
        return None;
    }
    EU_COUNTRY_CODES.contains(&code).then_some(code)
}

/// Check whether an operator ID matches one of the EU registration formats:
/// either `XXX-CAA-NUMBER` with separators, or the compact
/// `XXX` + alphanumeric registration. Advisory only.
pub fn validate_eu_operator_id(operator_id: &str) -> bool {
    if operator_id.len() < 5 {
        return false;
    }
    if extract_country_code(operator_id).is_none() {
        return false;
    }
    let rest = &operator_id[3..];
    if let Some(stripped) = rest.strip_prefix('-') {
        // Separator format: at least XXX-X-X, with a registration number
        // after the second separator
        match stripped.split_once('-') {
            Some((caa, number)) => !caa.is_empty() && !number.is_empty(),
            None => false,
        }
    } else {
        rest.chars().all(|c| c.is_ascii_alphanumeric())
    }
}
