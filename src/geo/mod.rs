//! Great-circle helpers used by the movement classifier.

pub const EARTH_MEAN_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance in meters between two WGS-84 positions given in degrees.
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).max(0.0).sqrt());

    (EARTH_MEAN_RADIUS_M * c).max(0.0)
}

/// Initial bearing from the first position towards the second, in [0, 360).
///
/// Coincident points yield 0.
pub fn bearing_degrees(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    if lat1 == lat2 && lon1 == lon2 {
        return 0.0;
    }

    let lat1 = lat1.to_radians();
    let lat2 = lat2.to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let y = d_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lon.cos();

    normalize_degrees(y.atan2(x).to_degrees())
}

/// Wraps any finite angle into [0, 360).
pub fn normalize_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid rounds tiny negatives up to exactly 360.0
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_to_self_is_zero() {
        for (lat, lon) in [(0.0, 0.0), (-1.2921, 36.8219), (89.9, -179.9), (-45.0, 170.0)] {
            assert_eq!(distance_meters(lat, lon, lat, lon), 0.0);
        }
    }

    #[test]
    fn test_distance_small_longitude_step_on_equator() {
        let d = distance_meters(0.0, 0.0, 0.0, 0.0001);
        assert!((d - 11.12).abs() < 0.05, "got {d}");
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = distance_meters(-1.28, 36.82, -1.30, 36.79);
        let b = distance_meters(-1.30, 36.79, -1.28, 36.82);
        assert!((a - b).abs() < 1e-9);
    }

    #[test]
    fn test_distance_one_degree_latitude() {
        let d = distance_meters(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111_195.0).abs() < 1.0, "got {d}");
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        assert!((bearing_degrees(0.0, 0.0, 1.0, 0.0) - 0.0).abs() < 1e-9);
        assert!((bearing_degrees(0.0, 0.0, 0.0, 1.0) - 90.0).abs() < 1e-9);
        assert!((bearing_degrees(0.0, 0.0, -1.0, 0.0) - 180.0).abs() < 1e-9);
        assert!((bearing_degrees(0.0, 0.0, 0.0, -1.0) - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_bearing_coincident_points() {
        assert_eq!(bearing_degrees(-1.29, 36.82, -1.29, 36.82), 0.0);
    }

    #[test]
    fn test_bearing_always_in_range() {
        let points = [
            (0.0, 0.0),
            (10.0, 10.0),
            (-33.9, 18.4),
            (51.5, -0.12),
            (-1.29, 36.82),
            (89.0, 179.0),
            (-89.0, -179.0),
        ];
        for &(lat1, lon1) in &points {
            for &(lat2, lon2) in &points {
                let b = bearing_degrees(lat1, lon1, lat2, lon2);
                assert!((0.0..360.0).contains(&b), "bearing {b} out of range");
            }
        }
    }

    #[test]
    fn test_normalize_degrees() {
        assert_eq!(normalize_degrees(0.0), 0.0);
        assert_eq!(normalize_degrees(360.0), 0.0);
        assert_eq!(normalize_degrees(-90.0), 270.0);
        assert_eq!(normalize_degrees(725.0), 5.0);
        assert_eq!(normalize_degrees(-1e-15), 0.0);
    }
}
