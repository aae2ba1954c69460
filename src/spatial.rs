//! Geodesic distance between coordinates.
//!
//! Distances are computed on the WGS-84 ellipsoid with Vincenty's inverse
//! formula. Nearly antipodal points, where the iteration does not converge,
//! fall back to the spherical great-circle distance.

const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;
const MEAN_EARTH_RADIUS_KM: f64 = 6_371.008_8;
const MAX_ITERATIONS: usize = 200;

/// A `(latitude, longitude)` pair in decimal degrees.
pub type LatLon = (f64, f64);

/// Distance in kilometres, or `None` when either point is not a valid
/// coordinate (non-finite, or outside ±90° / ±180°).
pub fn distance_km(p1: LatLon, p2: LatLon) -> Option<f64> {
    if !valid(p1) || !valid(p2) {
        return None;
    }
    Some(vincenty_km(p1, p2).unwrap_or_else(|| great_circle_km(p1, p2)))
}

/// [`distance_km`] over raw CSV cells. Blank or non-numeric cells give `None`.
pub fn distance_km_from_text(lat1: &str, lon1: &str, lat2: &str, lon2: &str) -> Option<f64> {
    let parse = |s: &str| s.trim().parse::<f64>().ok();
    distance_km((parse(lat1)?, parse(lon1)?), (parse(lat2)?, parse(lon2)?))
}

fn valid((lat, lon): LatLon) -> bool {
    lat.is_finite() && lon.is_finite() && lat.abs() <= 90.0 && lon.abs() <= 180.0
}

fn vincenty_km((lat1, lon1): LatLon, (lat2, lon2): LatLon) -> Option<f64> {
    let a = WGS84_A;
    let f = WGS84_F;
    let b = (1.0 - f) * a;

    let l = (lon2 - lon1).to_radians();
    let u1 = ((1.0 - f) * lat1.to_radians().tan()).atan();
    let u2 = ((1.0 - f) * lat2.to_radians().tan()).atan();
    let (sin_u1, cos_u1) = u1.sin_cos();
    let (sin_u2, cos_u2) = u2.sin_cos();

    let mut lambda = l;
    for _ in 0..MAX_ITERATIONS {
        let (sin_lambda, cos_lambda) = lambda.sin_cos();
        let sin_sigma = ((cos_u2 * sin_lambda).powi(2)
            + (cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda).powi(2))
        .sqrt();
        if sin_sigma == 0.0 {
            return Some(0.0);
        }
        let cos_sigma = sin_u1 * sin_u2 + cos_u1 * cos_u2 * cos_lambda;
        let sigma = sin_sigma.atan2(cos_sigma);
        let sin_alpha = cos_u1 * cos_u2 * sin_lambda / sin_sigma;
        let cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
        let cos_2sigma_m = if cos_sq_alpha != 0.0 {
            cos_sigma - 2.0 * sin_u1 * sin_u2 / cos_sq_alpha
        } else {
            0.0
        };
        let c = f / 16.0 * cos_sq_alpha * (4.0 + f * (4.0 - 3.0 * cos_sq_alpha));
        let previous = lambda;
        lambda = l
            + (1.0 - c)
                * f
                * sin_alpha
                * (sigma
                    + c * sin_sigma
                        * (cos_2sigma_m + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m.powi(2))));

        if (lambda - previous).abs() < 1e-12 {
            let u_sq = cos_sq_alpha * (a * a - b * b) / (b * b);
            let big_a =
                1.0 + u_sq / 16384.0 * (4096.0 + u_sq * (-768.0 + u_sq * (320.0 - 175.0 * u_sq)));
            let big_b = u_sq / 1024.0 * (256.0 + u_sq * (-128.0 + u_sq * (74.0 - 47.0 * u_sq)));
            let delta_sigma = big_b
                * sin_sigma
                * (cos_2sigma_m
                    + big_b / 4.0
                        * (cos_sigma * (-1.0 + 2.0 * cos_2sigma_m.powi(2))
                            - big_b / 6.0
                                * cos_2sigma_m
                                * (-3.0 + 4.0 * sin_sigma.powi(2))
                                * (-3.0 + 4.0 * cos_2sigma_m.powi(2))));
            return Some(b * big_a * (sigma - delta_sigma) / 1000.0);
        }
    }
    None
}

fn great_circle_km((lat1, lon1): LatLon, (lat2, lon2): LatLon) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let dphi = phi2 - phi1;
    let dlambda = (lon2 - lon1).to_radians();
    let h = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * MEAN_EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_points_are_zero() {
        assert_eq!(distance_km((29.7174, -95.4018), (29.7174, -95.4018)), Some(0.0));
    }

    #[test]
    fn test_one_degree_on_equator() {
        let d = distance_km((0.0, 0.0), (0.0, 1.0)).unwrap();
        assert!((d - 111.319_49).abs() < 0.01, "got {d}");
    }

    #[test]
    fn test_new_york_to_london() {
        let d = distance_km((40.7128, -74.0060), (51.5074, -0.1278)).unwrap();
        assert!((d - 5585.2).abs() < 10.0, "got {d}");
    }

    #[test]
    fn test_antipodal_falls_back() {
        let d = distance_km((0.0, 0.0), (0.5, 179.7)).unwrap();
        assert!(d > 19_000.0 && d < 20_100.0, "got {d}");
    }

    #[test]
    fn test_invalid_input_is_none() {
        assert_eq!(distance_km((f64::NAN, 0.0), (0.0, 0.0)), None);
        assert_eq!(distance_km((91.0, 0.0), (0.0, 0.0)), None);
        assert_eq!(distance_km_from_text("", "1", "2", "3"), None);
        assert_eq!(distance_km_from_text("abc", "1", "2", "3"), None);
    }

    #[test]
    fn test_from_text_parses_cells() {
        let d = distance_km_from_text(" 0 ", "0", "0", "1").unwrap();
        assert!((d - 111.319).abs() < 0.01);
    }
}
