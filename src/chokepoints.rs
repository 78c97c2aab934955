//! Static reference data for the monitored maritime chokepoints.

/// A named strait, canal or constrained sea lane. Radius is in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Chokepoint {
    pub id: &'static str,
    pub name: &'static str,
    pub region: &'static str,
    pub lat: f64,
    pub lon: f64,
    pub radius: f64,
}

impl Chokepoint {
    /// Flat Euclidean distance in degree space, uncorrected for latitude.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        let d_lat = lat - self.lat;
        let d_lon = lon - self.lon;
        (d_lat * d_lat + d_lon * d_lon).sqrt() <= self.radius
    }

    /// Expected vessel count under normal traffic.
    pub fn baseline(&self) -> f64 {
        self.radius * 10.0
    }
}

pub const CHOKEPOINTS: [Chokepoint; 8] = [
    Chokepoint {
        id: "hormuz",
        name: "Strait of Hormuz",
        region: "Persian Gulf",
        lat: 26.5,
        lon: 56.5,
        radius: 2.0,
    },
    Chokepoint {
        id: "suez",
        name: "Suez Canal",
        region: "Egypt",
        lat: 30.5,
        lon: 32.3,
        radius: 1.0,
    },
    Chokepoint {
        id: "malacca",
        name: "Strait of Malacca",
        region: "Southeast Asia",
        lat: 2.5,
        lon: 101.5,
        radius: 2.0,
    },
    Chokepoint {
        id: "bab_el_mandeb",
        name: "Bab el-Mandeb",
        region: "Red Sea",
        lat: 12.5,
        lon: 43.5,
        radius: 1.5,
    },
    Chokepoint {
        id: "panama",
        name: "Panama Canal",
        region: "Central America",
        lat: 9.1,
        lon: -79.7,
        radius: 1.0,
    },
    Chokepoint {
        id: "taiwan",
        name: "Taiwan Strait",
        region: "East Asia",
        lat: 24.0,
        lon: 119.5,
        radius: 2.0,
    },
    Chokepoint {
        id: "south_china_sea",
        name: "South China Sea",
        region: "Southeast Asia",
        lat: 15.0,
        lon: 115.0,
        radius: 5.0,
    },
    Chokepoint {
        id: "black_sea",
        name: "Black Sea",
        region: "Eastern Europe",
        lat: 43.5,
        lon: 34.0,
        radius: 3.0,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_uses_flat_degree_distance() {
        let hormuz = CHOKEPOINTS[0];
        assert!(hormuz.contains(26.5, 56.5));
        assert!(hormuz.contains(28.5, 56.5));
        assert!(!hormuz.contains(28.0, 58.0)); // sqrt(1.5^2 + 1.5^2) > 2
        assert_eq!(hormuz.baseline(), 20.0);
    }

    #[test]
    fn test_chokepoint_ids_unique() {
        let mut ids: Vec<_> = CHOKEPOINTS.iter().map(|c| c.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), CHOKEPOINTS.len());
    }
}
