//! Physical unit conversions shared by the metrics and decompression code.
//!
//! Dive data is stored in integer units (mm, mbar, permille, seconds, grams,
//! ml); these helpers turn them into the floating point quantities the
//! calculations need.

/// Oxygen content of air, in permille.
pub const O2_IN_AIR: u32 = 209;

/// Standard surface pressure at sea level (mbar).
pub const SURFACE_PRESSURE_MBAR: u32 = 1013;

/// Sea water salinity in grams per 10 litres.
pub const SEAWATER_SALINITY: u32 = 10300;

/// One standard atmosphere in mbar.
const MBAR_PER_ATM: f64 = 1013.25;

/// Ambient pressure (mbar) at `depth_mm` below a surface at `surface_mbar`.
///
/// Negative depths are clamped to the surface.
pub fn depth_to_mbar(depth_mm: i32, surface_mbar: u32, salinity: u32) -> f64 {
    // g/10L * g(0.981 daN/kg) gives mbar per mm once scaled
    let specific_weight = salinity as f64 * 0.981 / 100_000.0;
    surface_mbar as f64 + depth_mm.max(0) as f64 * specific_weight
}

/// Convert a pressure in mbar to standard atmospheres.
pub fn mbar_to_atm(mbar: u32) -> f64 {
    mbar as f64 / MBAR_PER_ATM
}

/// Linear interpolation of an integer quantity, rounded to nearest.
///
/// Returns `a` when `whole` is zero.
pub fn interpolate(a: i32, b: i32, part: u32, whole: u32) -> i32 {
    if whole == 0 {
        return a;
    }
    let (a, b, part, whole) = (a as i64, b as i64, part as i64, whole as i64);
    let x = a * (whole - part) + b * part;
    // round half away from zero
    let rounded = if x >= 0 {
        (x + whole / 2) / whole
    } else {
        (x - whole / 2) / whole
    };
    rounded as i32
}

/// Litres to cubic feet.
pub fn litres_to_cuft(litres: f64) -> f64 {
    litres / 28.316_846_6
}
