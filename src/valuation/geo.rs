//! Radius to bounding-box conversion for map-based sales queries

use crate::valuation::types::BoundingBox;

/// One degree of latitude is roughly 69 miles
pub const MILES_TO_DEGREES: f64 = 1.0 / 69.0;

/// Square box around a point, `radius_miles` from center to each edge.
/// Longitude offset shrinks with `cos(latitude)`.
pub fn bounding_box(latitude: f64, longitude: f64, radius_miles: f64) -> BoundingBox {
    let offset = radius_miles * MILES_TO_DEGREES;
    let lng_offset = offset * (latitude * std::f64::consts::PI / 180.0).cos();

    BoundingBox {
        north: latitude + offset,
        south: latitude - offset,
        east: longitude + lng_offset,
        west: longitude - lng_offset,
    }
}
