/// Parse a boolean flag from a string value, or return the given default value otherwise.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    let value = match value {
        Some(v) => v,
        None => return default,
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

/// Normalises a Kenyan phone number to international `2547XXXXXXXX` / `2541XXXXXXXX` form.
///
/// Accepts `07XX...`, `01XX...`, `+254...`, `254...` and strips spaces and dashes.
/// Returns `None` if the result is not a plausible Kenyan mobile number.
pub fn normalize_msisdn(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    let msisdn = if let Some(rest) = digits.strip_prefix("254") {
        format!("254{rest}")
    } else if let Some(rest) = digits.strip_prefix('0') {
        format!("254{rest}")
    } else {
        return None;
    };
    let valid = msisdn.len() == 12 && (msisdn.starts_with("2547") || msisdn.starts_with("2541"));
    valid.then_some(msisdn)
}
