//! US EPA (2012) PM2.5 AQI derivation.

/// Returned when a concentration falls outside every breakpoint band.
/// Callers omit the AQI field for that cycle instead of publishing it.
pub const AQI_NOT_COMPUTABLE: i32 = -1;

/// One contiguous concentration band of the EPA piecewise-linear scale.
struct Breakpoint {
    c_low: f64,
    c_high: f64,
    i_low: i32,
    i_high: i32,
}

/// PM2.5 breakpoints, Good through Hazardous.
const PM25_BREAKPOINTS: &[Breakpoint] = &[
    Breakpoint { c_low: 0.0, c_high: 12.0, i_low: 0, i_high: 50 },
    Breakpoint { c_low: 12.1, c_high: 35.4, i_low: 51, i_high: 100 },
    Breakpoint { c_low: 35.5, c_high: 55.4, i_low: 101, i_high: 150 },
    Breakpoint { c_low: 55.5, c_high: 150.4, i_low: 151, i_high: 200 },
    Breakpoint { c_low: 150.5, c_high: 250.4, i_low: 201, i_high: 300 },
    Breakpoint { c_low: 250.5, c_high: 500.4, i_low: 301, i_high: 500 },
];

/// Map a PM2.5 concentration (µg/m³) to its AQI.
///
/// The first band whose closed interval contains the concentration is
/// interpolated linearly; rounding is half-away-from-zero. Negative
/// concentrations and anything above 500.4 return [`AQI_NOT_COMPUTABLE`].
pub fn compute_aqi(concentration: f64) -> i32 {
    for bp in PM25_BREAKPOINTS {
        if concentration >= bp.c_low && concentration <= bp.c_high {
            let index = f64::from(bp.i_high - bp.i_low) / (bp.c_high - bp.c_low)
                * (concentration - bp.c_low)
                + f64::from(bp.i_low);
            return index.round() as i32;
        }
    }
    AQI_NOT_COMPUTABLE
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // -- band boundaries -----------------------------------------------------

    #[test]
    fn zero_concentration_is_zero() {
        assert_eq!(compute_aqi(0.0), 0);
    }

    #[test]
    fn top_of_good_band_is_fifty() {
        assert_eq!(compute_aqi(12.0), 50);
    }

    #[test]
    fn top_of_moderate_band_is_one_hundred() {
        assert_eq!(compute_aqi(35.4), 100);
    }

    #[test]
    fn band_edges_hit_their_index_bounds() {
        assert_eq!(compute_aqi(35.5), 101);
        assert_eq!(compute_aqi(55.4), 150);
        assert_eq!(compute_aqi(150.5), 201);
        assert_eq!(compute_aqi(250.4), 300);
        assert_eq!(compute_aqi(250.5), 301);
        assert_eq!(compute_aqi(500.4), 500);
    }

    // -- interpolation + rounding -------------------------------------------

    #[test]
    fn interpolates_inside_bands() {
        // Cross-checked against the EPA AQI calculator.
        assert_eq!(compute_aqi(8.0), 33);
        assert_eq!(compute_aqi(35.0), 99);
        assert_eq!(compute_aqi(54.0), 147);
        assert_eq!(compute_aqi(150.0), 200);
    }

    // -- out of range --------------------------------------------------------

    #[test]
    fn above_top_band_is_not_computable() {
        assert_eq!(compute_aqi(500.5), AQI_NOT_COMPUTABLE);
        assert_eq!(compute_aqi(1000.0), AQI_NOT_COMPUTABLE);
    }

    #[test]
    fn negative_concentration_is_not_computable() {
        assert_eq!(compute_aqi(-0.1), AQI_NOT_COMPUTABLE);
    }

    #[test]
    fn inter_band_gap_is_not_computable() {
        // Bands are not contiguous: (12.0, 12.1) lies between Good and
        // Moderate. Device concentrations are integers, so the gaps are
        // unreachable in practice.
        assert_eq!(compute_aqi(12.05), AQI_NOT_COMPUTABLE);
    }

    // -- whole-range property ------------------------------------------------

    #[test]
    fn integer_concentrations_stay_in_index_range() {
        for c in 0..=500 {
            let aqi = compute_aqi(f64::from(c));
            assert!((0..=500).contains(&aqi), "aqi {aqi} out of range for c={c}");
        }
    }
}
