//! Conversions between the azimuth/elevation sky frame and the X/Y frame of
//! cross-boom mounts.
//!
//! X tilts the lower boom from the southern horizon (0°) through zenith (90°)
//! to the northern horizon (180°). Y tilts the upper boom from east (0°) to
//! west (180°). Both are in degrees.

pub type Degrees = f64;

/// Pointing accuracy of the rotors, in degrees. Elevations closer than this to
/// the horizon or to zenith are treated as exactly there.
pub const ACCURACY: Degrees = 0.01;

/// Converts an azimuth/elevation pair into X/Y boom angles.
///
/// Near the horizon the X axis is pinned to 90° and near zenith to 0°, which
/// keeps the tangent in the denominator away from zero.
pub fn az_el_to_xy(az: Degrees, el: Degrees) -> (Degrees, Degrees) {
    let (az_r, el_r) = (az.to_radians(), el.to_radians());

    let x = if el <= ACCURACY {
        90.0
    } else if el >= 90.0 - ACCURACY {
        0.0
    } else {
        90.0 - (-az_r.cos() / el_r.tan()).atan().to_degrees()
    };

    let y = 90.0 - (az_r.sin() * el_r.cos()).asin().to_degrees();

    (x, y)
}

/// Converts X/Y boom angles back into azimuth/elevation.
///
/// Inverse of [`az_el_to_xy`] away from the pinned horizon and zenith bands.
/// The returned azimuth lies in `[0, 360)`.
pub fn xy_to_az_el(x: Degrees, y: Degrees) -> (Degrees, Degrees) {
    let (x_r, y_r) = (x.to_radians(), y.to_radians());

    // Unit pointing vector in east/north/up components.
    let east = y_r.cos();
    let north = -y_r.sin() * x_r.cos();
    let up = (x_r.sin() * y_r.sin()).clamp(-1.0, 1.0);

    let el = up.asin().to_degrees();
    let az = normalize_azimuth(east.atan2(north).to_degrees());

    (az, el)
}

/// Wraps an azimuth into `[0, 360)`.
pub fn normalize_azimuth(az: Degrees) -> Degrees {
    let wrapped = az.rem_euclid(360.0);
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}
