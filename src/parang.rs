// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Parallactic-angle coverage of a calibrator field.
//!
//! Polarisation calibration needs the feed to rotate against the sky; the
//! swing of the parallactic angle between a field's first and last
//! integration is the go/no-go measure for it.

use hifitime::Duration;
use marlu::{precession::get_lmst, XyzGeocentric};

use crate::constants::MIN_PARANG_COVERAGE_DEG;
use crate::ms::{MsMeta, MsMetaError};

/// The parallactic angle [radians] at hour angle `ha_rad` for a source at
/// declination `dec_rad` seen from geodetic latitude `lat_rad`.
pub(crate) fn parallactic_angle(lat_rad: f64, ha_rad: f64, dec_rad: f64) -> f64 {
    let (s_ha, c_ha) = ha_rad.sin_cos();
    let (s_lat, c_lat) = lat_rad.sin_cos();
    let (s_dec, c_dec) = dec_rad.sin_cos();
    (c_lat * s_ha).atan2(s_lat * c_dec - c_lat * s_dec * c_ha)
}

/// Geodetic longitude and latitude [radians] of a geocentric (ITRF) position,
/// on the WGS84 ellipsoid. Bowring's closed-form approximation; good to well
/// under an arcsecond, which is far more than parallactic angles need.
pub(crate) fn wgs84_long_lat(pos: XyzGeocentric) -> (f64, f64) {
    const A: f64 = 6378137.0;
    const F: f64 = 1.0 / 298.257223563;
    const B: f64 = A * (1.0 - F);
    const E2: f64 = 1.0 - (B / A) * (B / A);
    const EP2: f64 = (A / B) * (A / B) - 1.0;

    let longitude = pos.y.atan2(pos.x);
    let p = pos.x.hypot(pos.y);
    let theta = (pos.z * A).atan2(p * B);
    let (s_t, c_t) = theta.sin_cos();
    let latitude = (pos.z + EP2 * B * s_t.powi(3)).atan2(p - E2 * A * c_t.powi(3));
    (longitude, latitude)
}

/// The absolute parallactic-angle swing [degrees] of the named field between
/// its first and last integration.
pub(crate) fn coverage_deg(ms: &MsMeta, field: &str) -> Result<f64, MsMetaError> {
    let field_meta = ms.field(field)?;
    let (t0, t1) = match field_meta.time_range {
        Some(range) => range,
        // A field with no data has no coverage.
        None => return Ok(0.0),
    };

    let (longitude, latitude) = wgs84_long_lat(ms.mean_antenna_position);
    // Assume DUT1 of 0; a fraction of a second of hour angle is irrelevant
    // here.
    let dut1 = Duration::from_seconds(0.0);

    let dir = field_meta.delay_dir;
    let chi = |t| {
        let lst = get_lmst(longitude, t, dut1);
        parallactic_angle(latitude, lst - dir.ra, dir.dec)
    };
    Ok((chi(t1) - chi(t0)).to_degrees().abs())
}

/// Is the swing big enough for polarisation calibration?
pub(crate) fn coverage_permits_polcal(coverage_deg: f64) -> bool {
    coverage_deg >= MIN_PARANG_COVERAGE_DEG
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn parallactic_angle_is_zero_on_the_meridian() {
        // A source transiting north of a southern site: no feed rotation at
        // the meridian.
        let lat = (-30.7_f64).to_radians();
        let dec = (-60.0_f64).to_radians();
        assert_abs_diff_eq!(parallactic_angle(lat, 0.0, dec), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn parallactic_angle_is_antisymmetric_in_hour_angle() {
        let lat = (-30.7_f64).to_radians();
        let dec = (-44.0_f64).to_radians();
        let ha = (15.0_f64).to_radians();
        assert_abs_diff_eq!(
            parallactic_angle(lat, ha, dec),
            -parallactic_angle(lat, -ha, dec),
            epsilon = 1e-12
        );
    }

    #[test]
    fn parallactic_angle_swings_through_a_tracked_scan() {
        // Two hour angles an hour apart give a clearly nonzero swing for a
        // source away from the pole.
        let lat = (-30.7_f64).to_radians();
        let dec = (-20.0_f64).to_radians();
        let chi0 = parallactic_angle(lat, (-7.5_f64).to_radians(), dec);
        let chi1 = parallactic_angle(lat, (7.5_f64).to_radians(), dec);
        assert!((chi1 - chi0).to_degrees().abs() > 10.0);
    }

    #[test]
    fn wgs84_latitude_matches_a_known_site() {
        // The MeerKAT core, ITRF.
        let pos = XyzGeocentric {
            x: 5109360.0,
            y: 2006852.0,
            z: -3238948.0,
        };
        let (longitude, latitude) = wgs84_long_lat(pos);
        assert_abs_diff_eq!(longitude.to_degrees(), 21.44, epsilon = 0.05);
        assert_abs_diff_eq!(latitude.to_degrees(), -30.71, epsilon = 0.05);
    }

    #[test]
    fn equatorial_positions_have_zero_latitude() {
        let pos = XyzGeocentric {
            x: 6378137.0,
            y: 0.0,
            z: 0.0,
        };
        let (longitude, latitude) = wgs84_long_lat(pos);
        assert_abs_diff_eq!(longitude, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(latitude, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn the_coverage_gate_is_thirty_degrees() {
        assert!(!coverage_permits_polcal(0.1));
        assert!(!coverage_permits_polcal(29.9));
        assert!(coverage_permits_polcal(30.0));
        assert!(coverage_permits_polcal(175.0));
    }
}
