//! Rate normalization: events per second to whole events per minute.

use crate::error::Error;

/// Convert a rate in events/second to events/minute, rounded down.
///
/// Negative, NaN and infinite rates are upstream contract violations and
/// come back as `InvalidSample` instead of a bogus reading. Products past
/// `u64::MAX` saturate.
pub fn to_per_minute(rate_per_second: f64) -> Result<u64, Error> {
    check_rate(rate_per_second)?;
    Ok((rate_per_second * 60.0).floor() as u64)
}

/// Round a rate already in events/minute down to a whole reading.
///
/// Same checks as [`to_per_minute`]. Samples declared per minute go through
/// here untouched so `62 bpm` stays 62.
pub fn floor_per_minute(per_minute: f64) -> Result<u64, Error> {
    check_rate(per_minute)?;
    Ok(per_minute.floor() as u64)
}

fn check_rate(rate: f64) -> Result<(), Error> {
    if !rate.is_finite() {
        return Err(Error::InvalidSample(format!("rate {} is not finite", rate)));
    }
    if rate < 0.0 {
        return Err(Error::InvalidSample(format!("rate {} is negative", rate)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values() {
        assert_eq!(to_per_minute(0.0).unwrap(), 0);
        assert_eq!(to_per_minute(1.0).unwrap(), 60);
        assert_eq!(to_per_minute(1.5).unwrap(), 90);
    }

    #[test]
    fn test_rounds_down() {
        // 1.2 * 60 is 71.99999999999999 in f64
        assert_eq!(to_per_minute(1.2).unwrap(), (1.2f64 * 60.0).floor() as u64);
        assert_eq!(to_per_minute(1.999).unwrap(), 119);
        assert_eq!(to_per_minute(0.016).unwrap(), 0);
    }

    #[test]
    fn test_matches_floor_over_a_sweep() {
        for i in 0..5_000u32 {
            let r = f64::from(i) * 0.0137;
            assert_eq!(to_per_minute(r).unwrap(), (r * 60.0).floor() as u64, "r = {}", r);
        }
    }

    #[test]
    fn test_negative_zero_is_zero() {
        assert_eq!(to_per_minute(-0.0).unwrap(), 0);
    }

    #[test]
    fn test_rejects_invalid_input() {
        assert!(matches!(to_per_minute(-0.5), Err(Error::InvalidSample(_))));
        assert!(matches!(to_per_minute(f64::NAN), Err(Error::InvalidSample(_))));
        assert!(matches!(to_per_minute(f64::INFINITY), Err(Error::InvalidSample(_))));
        assert!(matches!(to_per_minute(f64::NEG_INFINITY), Err(Error::InvalidSample(_))));
    }

    #[test]
    fn test_saturates() {
        assert_eq!(to_per_minute(f64::MAX).unwrap(), u64::MAX);
        assert_eq!(floor_per_minute(f64::MAX).unwrap(), u64::MAX);
    }

    #[test]
    fn test_floor_per_minute_keeps_whole_values() {
        for bpm in 0..=300u32 {
            assert_eq!(floor_per_minute(f64::from(bpm)).unwrap(), u64::from(bpm));
        }
        assert_eq!(floor_per_minute(71.9).unwrap(), 71);
    }

    #[test]
    fn test_floor_per_minute_rejects_invalid_input() {
        assert!(matches!(floor_per_minute(-1.0), Err(Error::InvalidSample(_))));
        assert!(matches!(floor_per_minute(f64::NAN), Err(Error::InvalidSample(_))));
        assert!(matches!(floor_per_minute(f64::INFINITY), Err(Error::InvalidSample(_))));
    }
}
