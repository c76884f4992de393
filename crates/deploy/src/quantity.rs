//! Resource quantity parsing, enough to compare requests against limits.

use crate::error::DeployError;

/// Parse a resource quantity into base units.
///
/// Supports plain decimals plus the decimal (`m`, `k`, `M`, `G`, `T`) and
/// binary (`Ki`, `Mi`, `Gi`, `Ti`) suffixes.
///
/// # Errors
/// Returns a validation error for an empty, negative, or unparseable
/// quantity.
pub fn parse_quantity(quantity: &str) -> Result<f64, DeployError> {
    let quantity = quantity.trim();
    if quantity.is_empty() {
        return Err(DeployError::Validation(
            "resource quantity must not be empty".to_string(),
        ));
    }

    // Longest suffixes first so "Gi" is not read as "G".
    const SUFFIXES: [(&str, f64); 9] = [
        ("Ki", 1024.0),
        ("Mi", 1024.0 * 1024.0),
        ("Gi", 1024.0 * 1024.0 * 1024.0),
        ("Ti", 1024.0 * 1024.0 * 1024.0 * 1024.0),
        ("m", 1e-3),
        ("k", 1e3),
        ("M", 1e6),
        ("G", 1e9),
        ("T", 1e12),
    ];

    let (number, multiplier) = SUFFIXES
        .iter()
        .find_map(|(suffix, multiplier)| {
            quantity
                .strip_suffix(suffix)
                .map(|number| (number, *multiplier))
        })
        .unwrap_or((quantity, 1.0));

    let value: f64 = number
        .parse()
        .map_err(|_| DeployError::Validation(format!("invalid resource quantity: {quantity}")))?;
    if !value.is_finite() || value < 0.0 {
        return Err(DeployError::Validation(format!(
            "invalid resource quantity: {quantity}"
        )));
    }

    Ok(value * multiplier)
}
