use super::GeoPoint;
use crate::model::work_schedule::Geofence;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters.
pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

pub fn distance_km(a: GeoPoint, b: GeoPoint) -> f64 {
    haversine_m(a, b) / 1000.0
}

impl Geofence {
    pub fn contains(&self, point: GeoPoint) -> bool {
        distance_km(self.center, point) <= self.radius_km
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(latitude: f64, longitude: f64) -> GeoPoint {
        GeoPoint { latitude, longitude }
    }

    #[test]
    fn same_point_is_zero() {
        assert_eq!(haversine_m(p(23.0225, 72.5714), p(23.0225, 72.5714)), 0.0);
    }

    #[test]
    fn one_degree_of_latitude() {
        let d = haversine_m(p(0.0, 0.0), p(1.0, 0.0));
        assert!((d - 111_195.0).abs() < 1.0, "got {d}");
    }

    #[test]
    fn ahmedabad_to_mumbai() {
        let d = distance_km(p(23.0225, 72.5714), p(19.0760, 72.8777));
        assert!((d - 440.0).abs() < 5.0, "got {d}");
    }

    #[test]
    fn geofence_radius_is_in_km() {
        let fence = Geofence {
            center: p(23.0225, 72.5714),
            radius_km: 0.2,
        };
        // ~111 m north
        assert!(fence.contains(p(23.0235, 72.5714)));
        // ~330 m north
        assert!(!fence.contains(p(23.0255, 72.5714)));
    }
}
