//! Float validation for configuration values.

use crate::CoreError;

pub fn ensure_finite(v: f64, what: &'static str) -> Result<f64, CoreError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::NonFinite { what, value: v })
    }
}

/// Finite and strictly greater than zero (periods, sample times).
pub fn ensure_positive(v: f64, what: &'static str) -> Result<f64, CoreError> {
    let v = ensure_finite(v, what)?;
    if v > 0.0 {
        Ok(v)
    } else {
        Err(CoreError::InvalidArg { what })
    }
}

/// Finite and not below zero (gain magnitudes).
pub fn ensure_non_negative(v: f64, what: &'static str) -> Result<f64, CoreError> {
    let v = ensure_finite(v, what)?;
    if v >= 0.0 {
        Ok(v)
    } else {
        Err(CoreError::InvalidArg { what })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_finite_detects_nan() {
        let err = ensure_finite(f64::NAN, "gain").unwrap_err();
        assert!(err.to_string().contains("Non-finite"));
    }

    #[test]
    fn positive_and_non_negative_bounds() {
        assert!(ensure_positive(0.0, "period").is_err());
        assert!(ensure_positive(0.5, "period").is_ok());
        assert!(ensure_non_negative(0.0, "kp").is_ok());
        assert_eq!(
            ensure_non_negative(-1.0, "kp"),
            Err(CoreError::InvalidArg { what: "kp" })
        );
        assert!(ensure_non_negative(f64::INFINITY, "kp").is_err());
    }
}
