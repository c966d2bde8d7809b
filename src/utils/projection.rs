use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

use crate::resources::constants::{world_size, EQUATOR_HALFLENGTH};

/// WGS84 semi-major axis, also the sphere radius used by EPSG:3857
const SEMI_MAJOR_AXIS: f64 = 6378137.0;
/// WGS84 first eccentricity
const ECCENTRICITY: f64 = 0.0818191908426215;

/// Forward maps blow up at the poles; keep latitudes just short of them
const MAX_LATITUDE: f64 = 89.9 * std::f64::consts::PI / 180.0;

const INVERSE_TOLERANCE: f64 = 1e-12;
const INVERSE_MAX_ITERATIONS: usize = 16;

/// The projections a map source can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Projection {
    /// EPSG:3857, the usual web map projection
    SphericalMercator,
    /// EPSG:3395, Mercator on the WGS84 ellipsoid
    EllipsoidalMercator,
}

impl Projection {
    pub fn from_epsg(code: u32) -> Option<Self> {
        match code {
            3857 => Some(Self::SphericalMercator),
            3395 => Some(Self::EllipsoidalMercator),
            _ => None,
        }
    }

    pub fn epsg(self) -> u32 {
        match self {
            Self::SphericalMercator => 3857,
            Self::EllipsoidalMercator => 3395,
        }
    }

    /// Geographic (radians) to planar metres
    pub fn forward(self, lon: f64, lat: f64) -> (f64, f64) {
        let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
        let x = SEMI_MAJOR_AXIS * lon;
        let y = match self {
            Self::SphericalMercator => SEMI_MAJOR_AXIS * (FRAC_PI_4 + lat / 2.0).tan().ln(),
            Self::EllipsoidalMercator => {
                let e_sin = ECCENTRICITY * lat.sin();
                let correction = ((1.0 - e_sin) / (1.0 + e_sin)).powf(ECCENTRICITY / 2.0);
                SEMI_MAJOR_AXIS * ((FRAC_PI_4 + lat / 2.0).tan() * correction).ln()
            }
        };
        (x, y)
    }

    /// Planar metres to geographic (radians)
    pub fn inverse(self, x: f64, y: f64) -> (f64, f64) {
        let lon = x / SEMI_MAJOR_AXIS;
        let t = (-y / SEMI_MAJOR_AXIS).exp();
        let lat = match self {
            Self::SphericalMercator => FRAC_PI_2 - 2.0 * t.atan(),
            Self::EllipsoidalMercator => {
                // Fixed-point iteration on the conformal latitude
                let mut lat = FRAC_PI_2 - 2.0 * t.atan();
                for _ in 0..INVERSE_MAX_ITERATIONS {
                    let e_sin = ECCENTRICITY * lat.sin();
                    let next = FRAC_PI_2
                        - 2.0 * (t * ((1.0 - e_sin) / (1.0 + e_sin)).powf(ECCENTRICITY / 2.0)).atan();
                    let done = (next - lat).abs() < INVERSE_TOLERANCE;
                    lat = next;
                    if done {
                        break;
                    }
                }
                lat
            }
        };
        (lon, lat)
    }

    /// Planar coordinates in `self` to planar coordinates in `to`
    pub fn transform(self, to: Projection, x: f64, y: f64) -> (f64, f64) {
        if self == to {
            return (x, y);
        }
        let (lon, lat) = self.inverse(x, y);
        to.forward(lon, lat)
    }
}

/// Pixel position in the full-map space of `zoom` to planar metres
pub fn pixel_to_planar(zoom: u8, px: f64, py: f64) -> (f64, f64) {
    let half = world_size(zoom) as f64 / 2.0;
    (
        (px - half) * EQUATOR_HALFLENGTH / half,
        (half - py) * EQUATOR_HALFLENGTH / half,
    )
}

/// Planar metres to a pixel position in the full-map space of `zoom`
pub fn planar_to_pixel(zoom: u8, x: f64, y: f64) -> (f64, f64) {
    let half = world_size(zoom) as f64 / 2.0;
    (
        x * half / EQUATOR_HALFLENGTH + half,
        half - y * half / EQUATOR_HALFLENGTH,
    )
}

/// Move a pixel center from one projection's map to another's at the same
/// zoom, rounding to whole pixels. A center panned past the top or bottom
/// edge has no latitude and is moved onto that edge first.
pub fn reproject_pixel(from: Projection, to: Projection, zoom: u8, px: i64, py: i64) -> (i64, i64) {
    if from == to {
        return (px, py);
    }
    let py = py.clamp(0, world_size(zoom));
    let (x, y) = pixel_to_planar(zoom, px as f64, py as f64);
    let (x, y) = from.transform(to, x, y);
    let (px, py) = planar_to_pixel(zoom, x, y);
    (px.round() as i64, py.round() as i64)
}

/// Degrees of longitude/latitude to a pixel position
pub fn lonlat_to_pixel(projection: Projection, zoom: u8, lon_deg: f64, lat_deg: f64) -> (i64, i64) {
    let (x, y) = projection.forward(lon_deg.to_radians(), lat_deg.to_radians());
    let (px, py) = planar_to_pixel(zoom, x, y);
    (px.round() as i64, py.round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epsg_codes_round_trip() {
        for projection in [Projection::SphericalMercator, Projection::EllipsoidalMercator] {
            assert_eq!(Projection::from_epsg(projection.epsg()), Some(projection));
        }
        assert_eq!(Projection::from_epsg(4326), None);
    }

    #[test]
    fn spherical_edge_is_equator_halflength() {
        let (x, _) = Projection::SphericalMercator.forward(std::f64::consts::PI, 0.0);
        assert!((x - EQUATOR_HALFLENGTH).abs() < 0.01);
    }

    #[test]
    fn inverse_undoes_forward() {
        let lon = 6.566f64.to_radians();
        let lat = 53.219f64.to_radians();
        for projection in [Projection::SphericalMercator, Projection::EllipsoidalMercator] {
            let (x, y) = projection.forward(lon, lat);
            let (lon2, lat2) = projection.inverse(x, y);
            assert!((lon - lon2).abs() < 1e-10);
            assert!((lat - lat2).abs() < 1e-10, "{projection:?}");
        }
    }

    #[test]
    fn ellipsoidal_northing_is_smaller_at_same_latitude() {
        let lat = 55f64.to_radians();
        let (_, y_sphere) = Projection::SphericalMercator.forward(0.0, lat);
        let (_, y_ellipse) = Projection::EllipsoidalMercator.forward(0.0, lat);
        assert!(y_ellipse < y_sphere);
        // Roughly 30-40 km apart at mid-latitudes
        assert!((y_sphere - y_ellipse) > 20_000.0 && (y_sphere - y_ellipse) < 50_000.0);
    }

    #[test]
    fn equator_and_meridian_are_fixed_points() {
        let (px, py) = reproject_pixel(
            Projection::SphericalMercator,
            Projection::EllipsoidalMercator,
            10,
            world_size(10) / 2,
            world_size(10) / 2,
        );
        assert_eq!((px, py), (world_size(10) / 2, world_size(10) / 2));
    }

    #[test]
    fn reprojection_round_trip_stays_within_a_pixel() {
        let zoom = 14;
        let start = (2_200_000, 1_340_000);
        let there = reproject_pixel(
            Projection::SphericalMercator,
            Projection::EllipsoidalMercator,
            zoom,
            start.0,
            start.1,
        );
        assert_ne!(there.1, start.1);
        let back = reproject_pixel(
            Projection::EllipsoidalMercator,
            Projection::SphericalMercator,
            zoom,
            there.0,
            there.1,
        );
        assert!((back.0 - start.0).abs() <= 1);
        assert!((back.1 - start.1).abs() <= 1);
    }

    #[test]
    fn lonlat_origin_is_map_center() {
        let (px, py) = lonlat_to_pixel(Projection::SphericalMercator, 8, 0.0, 0.0);
        assert_eq!((px, py), (world_size(8) / 2, world_size(8) / 2));
        let (px, _) = lonlat_to_pixel(Projection::EllipsoidalMercator, 8, -180.0, 0.0);
        assert_eq!(px, 0);
    }

    #[test]
    fn center_beyond_the_poles_lands_on_the_edge() {
        let there = |py| {
            reproject_pixel(
                Projection::SphericalMercator,
                Projection::EllipsoidalMercator,
                0,
                128,
                py,
            )
        };
        assert_eq!(there(-256), there(0));
        assert_eq!(there(512), there(256));

        let zoom = 24;
        let edge = reproject_pixel(
            Projection::EllipsoidalMercator,
            Projection::SphericalMercator,
            zoom,
            1 << 31,
            0,
        );
        let beyond = reproject_pixel(
            Projection::EllipsoidalMercator,
            Projection::SphericalMercator,
            zoom,
            1 << 31,
            -(1 << 32),
        );
        assert_eq!(beyond, edge);
        assert_eq!(edge.0, 1 << 31);
    }
}
