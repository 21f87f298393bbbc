//! Bühlmann ZHL-16C tissue simulation.
//!
//! [`TissueModel`] is the capability the decompression preload drives: reset
//! the compartments to surface saturation, then feed constant-pressure
//! segments and read back the tolerated ambient pressure. [`Zhl16c`] is the
//! bundled 16-compartment implementation using the Schreiner equation with
//! Workman-weighted a/b coefficients for mixed N2/He loading.

use crate::models::{Dive, GasMix};

// ============================================================================
// Physical Constants
// ============================================================================

/// Water vapour pressure in the lungs (bar), at 37°C.
const P_WATER_VAPOR: f64 = 0.0627;

/// Fraction of N2 in air, used for surface saturation.
const AIR_FN2: f64 = 0.7902;

/// Standard sea level pressure (bar), used before the first reset.
const DEFAULT_SURFACE_PRESSURE: f64 = 1.01325;

// ============================================================================
// ZHL-16C Compartment Constants (Bühlmann / Baker)
// ============================================================================

/// Number of tissue compartments.
pub const NUM_COMPARTMENTS: usize = 16;

/// N2 half-times in minutes for compartments 1–16 (ZHL-16C).
const N2_HALF_TIMES: [f64; NUM_COMPARTMENTS] = [
    5.0, 8.0, 12.5, 18.5, 27.0, 38.3, 54.3, 77.0, 109.0, 146.0, 187.0, 239.0, 305.0, 390.0, 498.0,
    635.0,
];

/// He half-times in minutes for compartments 1–16 (ZHL-16C).
const HE_HALF_TIMES: [f64; NUM_COMPARTMENTS] = [
    1.88, 3.02, 4.72, 6.99, 10.21, 14.48, 20.53, 29.11, 41.20, 55.19, 70.69, 90.34, 115.29, 147.42,
    188.24, 240.03,
];

/// N2 'a' coefficients (bar) for ZHL-16C.
const A_N2: [f64; NUM_COMPARTMENTS] = [
    1.1696, 1.0000, 0.8618, 0.7562, 0.6200, 0.5043, 0.4410, 0.4000, 0.3750, 0.3500, 0.3295, 0.3065,
    0.2835, 0.2610, 0.2480, 0.2327,
];

/// N2 'b' coefficients (dimensionless) for ZHL-16C.
const B_N2: [f64; NUM_COMPARTMENTS] = [
    0.5578, 0.6514, 0.7222, 0.7825, 0.8126, 0.8434, 0.8693, 0.8910, 0.9092, 0.9222, 0.9319, 0.9403,
    0.9477, 0.9544, 0.9602, 0.9653,
];

/// He 'a' coefficients (bar) for ZHL-16C.
const A_HE: [f64; NUM_COMPARTMENTS] = [
    1.6189, 1.3830, 1.1919, 1.0458, 0.9220, 0.8205, 0.7305, 0.6502, 0.5950, 0.5545, 0.5333, 0.5189,
    0.5181, 0.5176, 0.5172, 0.5119,
];

/// He 'b' coefficients (dimensionless) for ZHL-16C.
const B_HE: [f64; NUM_COMPARTMENTS] = [
    0.4770, 0.5747, 0.6527, 0.7223, 0.7582, 0.7957, 0.8279, 0.8553, 0.8757, 0.8903, 0.8997, 0.9073,
    0.9122, 0.9171, 0.9217, 0.9267,
];

// ============================================================================
// Capability
// ============================================================================

/// Decompression compartment state driven by the preload replay.
pub trait TissueModel {
    /// Saturate every compartment with air at the given surface pressure.
    fn reset_surface(&mut self, surface_pressure_bar: f64);

    /// Breathe `mix` at `pressure_bar` for `seconds`.
    ///
    /// A logged oxygen partial pressure replaces the open-circuit oxygen
    /// fraction. Returns the tolerated ambient pressure (bar) afterwards.
    fn add_segment(
        &mut self,
        pressure_bar: f64,
        mix: GasMix,
        seconds: u32,
        po2_override_mbar: Option<u32>,
        dive: &Dive,
    ) -> f64;
}

// ============================================================================
// ZHL-16C
// ============================================================================

/// ZHL-16C compartment state.
#[derive(Debug, Clone)]
pub struct Zhl16c {
    /// N2 partial pressure in each compartment (bar).
    p_n2: [f64; NUM_COMPARTMENTS],
    /// He partial pressure in each compartment (bar).
    p_he: [f64; NUM_COMPARTMENTS],
}

impl Default for Zhl16c {
    fn default() -> Self {
        let mut model = Self {
            p_n2: [0.0; NUM_COMPARTMENTS],
            p_he: [0.0; NUM_COMPARTMENTS],
        };
        model.reset_surface(DEFAULT_SURFACE_PRESSURE);
        model
    }
}

impl Zhl16c {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compartment pressures as `(n2, he)` in bar.
    pub fn compartment(&self, i: usize) -> (f64, f64) {
        (self.p_n2[i], self.p_he[i])
    }

    /// Update all compartments for a time interval using the Schreiner equation.
    fn update(&mut self, dt_sec: f64, p_inspired_n2: f64, p_inspired_he: f64) {
        if dt_sec <= 0.0 {
            return;
        }
        for i in 0..NUM_COMPARTMENTS {
            let k_n2 = (2.0_f64.ln()) / (N2_HALF_TIMES[i] * 60.0);
            self.p_n2[i] = p_inspired_n2 + (self.p_n2[i] - p_inspired_n2) * (-k_n2 * dt_sec).exp();

            let k_he = (2.0_f64.ln()) / (HE_HALF_TIMES[i] * 60.0);
            self.p_he[i] = p_inspired_he + (self.p_he[i] - p_inspired_he) * (-k_he * dt_sec).exp();
        }
    }

    /// Workman-weighted a, b for a compartment.
    fn coefficients(&self, i: usize) -> (f64, f64) {
        let p_total = self.p_n2[i] + self.p_he[i];
        if p_total > 1e-10 {
            let a = (A_N2[i] * self.p_n2[i] + A_HE[i] * self.p_he[i]) / p_total;
            let b = (B_N2[i] * self.p_n2[i] + B_HE[i] * self.p_he[i]) / p_total;
            (a, b)
        } else {
            (A_N2[i], B_N2[i])
        }
    }

    /// Lowest ambient pressure (bar) the compartments tolerate.
    pub fn tolerance(&self) -> f64 {
        (0..NUM_COMPARTMENTS)
            .map(|i| {
                let (a, b) = self.coefficients(i);
                (self.p_n2[i] + self.p_he[i] - a) * b
            })
            .fold(0.0, f64::max)
    }
}

impl TissueModel for Zhl16c {
    fn reset_surface(&mut self, surface_pressure_bar: f64) {
        let p_n2_surface = (surface_pressure_bar - P_WATER_VAPOR) * AIR_FN2;
        self.p_n2 = [p_n2_surface; NUM_COMPARTMENTS];
        self.p_he = [0.0; NUM_COMPARTMENTS];
    }

    fn add_segment(
        &mut self,
        pressure_bar: f64,
        mix: GasMix,
        seconds: u32,
        po2_override_mbar: Option<u32>,
        _dive: &Dive,
    ) -> f64 {
        let alveolar = (pressure_bar - P_WATER_VAPOR).max(0.0);
        let (p_n2, p_he) = match po2_override_mbar.filter(|p| *p > 0) {
            Some(po2) => {
                let inert = (alveolar - po2 as f64 / 1000.0).max(0.0);
                let (fn2, fhe) = (mix.n2_fraction(), mix.he_fraction());
                let f_inert = fn2 + fhe;
                if f_inert > 0.0 {
                    (inert * fn2 / f_inert, inert * fhe / f_inert)
                } else {
                    (0.0, 0.0)
                }
            }
            None => (alveolar * mix.n2_fraction(), alveolar * mix.he_fraction()),
        };
        self.update(seconds as f64, p_n2, p_he);
        self.tolerance()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Bar at `depth_m` of sea water below a sea-level surface.
    fn bar_at(depth_m: f64) -> f64 {
        DEFAULT_SURFACE_PRESSURE + depth_m * 0.101325
    }

    fn dive() -> Dive {
        Dive::new(0, 3_600)
    }

    /// Breathe `mix` at `depth_m` for `minutes`, one segment per minute.
    fn stay(model: &mut Zhl16c, depth_m: f64, mix: GasMix, minutes: u32) -> f64 {
        let d = dive();
        let mut tolerance = model.tolerance();
        for _ in 0..minutes {
            tolerance = model.add_segment(bar_at(depth_m), mix, 60, None, &d);
        }
        tolerance
    }

    #[test]
    fn test_surface_equilibrium() {
        let model = Zhl16c::new();
        let saturated = (DEFAULT_SURFACE_PRESSURE - P_WATER_VAPOR) * AIR_FN2;
        for i in 0..NUM_COMPARTMENTS {
            let (n2, he) = model.compartment(i);
            assert!((n2 - saturated).abs() < 1e-12, "compartment {i}: {n2}");
            assert_eq!(he, 0.0);
        }
        assert!(
            model.tolerance() < DEFAULT_SURFACE_PRESSURE,
            "saturated tissues must tolerate the surface, got {}",
            model.tolerance()
        );
    }

    #[test]
    fn test_surface_segments_keep_equilibrium() {
        let mut model = Zhl16c::new();
        let before = model.tolerance();
        let after = stay(&mut model, 0.0, GasMix::AIR, 10);
        assert!(
            (after - before).abs() < 0.01,
            "Air at the surface should not load tissues: {before} -> {after}"
        );
    }

    #[test]
    fn test_square_profile_30m_30min_air() {
        let mut model = Zhl16c::new();
        let start = model.tolerance();
        let early = stay(&mut model, 30.0, GasMix::AIR, 1);
        let end = stay(&mut model, 30.0, GasMix::AIR, 29);

        assert!(early >= start, "tolerance should not drop: {start} -> {early}");
        assert!(end > early, "tolerance should rise during bottom: {early} -> {end}");
        // above surface pressure means a deco obligation
        assert!(
            end > DEFAULT_SURFACE_PRESSURE,
            "30m/30min air should carry a deco obligation, got {end}"
        );
    }

    #[test]
    fn test_trimix_loads_helium() {
        let mut model = Zhl16c::new();
        stay(&mut model, 60.0, GasMix::new(210, 350), 20);

        let (n2, he) = model.compartment(0);
        assert!(he > 1.0, "fast compartment should carry helium, got {he}");
        assert!(n2 > 0.0);
        let tolerance = model.tolerance();
        assert!(
            tolerance > DEFAULT_SURFACE_PRESSURE,
            "60m/20min trimix 21/35 should carry a deco obligation, got {tolerance}"
        );
    }

    #[test]
    fn test_oxygen_offgasses() {
        let mut model = Zhl16c::new();
        stay(&mut model, 45.0, GasMix::AIR, 20);
        let loaded = model.tolerance();

        let mut on_o2 = model.clone();
        let mut on_air = model;
        let oxygen = stay(&mut on_o2, 6.0, GasMix::new(1000, 0), 10);
        let air = stay(&mut on_air, 6.0, GasMix::AIR, 10);

        assert!(oxygen < loaded);
        assert!(oxygen < air, "oxygen stop should clear faster: {oxygen} vs {air}");
    }

    #[test]
    fn test_po2_override_reduces_inert_load() {
        let d = dive();
        let mut open = Zhl16c::new();
        let mut closed = Zhl16c::new();
        let open_tol = open.add_segment(bar_at(30.0), GasMix::AIR, 1_800, None, &d);
        let closed_tol = closed.add_segment(bar_at(30.0), GasMix::AIR, 1_800, Some(1_300), &d);
        assert!(
            closed_tol < open_tol,
            "1.3 bar setpoint at 30 m breathes less nitrogen than air: {closed_tol} vs {open_tol}"
        );
    }

    #[test]
    fn test_zero_seconds_is_noop() {
        let d = dive();
        let mut model = Zhl16c::new();
        let before = model.compartment(5);
        model.add_segment(bar_at(40.0), GasMix::AIR, 0, None, &d);
        assert_eq!(model.compartment(5), before);
    }

    #[test]
    fn test_altitude_reset() {
        let mut sea = Zhl16c::new();
        let mut alt = Zhl16c::new();
        alt.reset_surface(0.82);
        assert!(alt.compartment(0).0 < sea.compartment(0).0);

        let d = dive();
        for (model, surface) in [(&mut sea, DEFAULT_SURFACE_PRESSURE), (&mut alt, 0.82)] {
            for _ in 0..20 {
                model.add_segment(surface + 3.0, GasMix::AIR, 60, None, &d);
            }
        }

        let sea_margin = sea.tolerance() - DEFAULT_SURFACE_PRESSURE;
        let alt_margin = alt.tolerance() - 0.82;
        assert!(
            alt_margin > sea_margin,
            "the same dive at altitude should leave less margin: altitude={alt_margin}, sea={sea_margin}"
        );
    }

    #[test]
    fn test_numerical_precision_long_exposure() {
        let mut model = Zhl16c::new();
        let mut history = Vec::new();
        let d = dive();
        for _ in 0..1000 {
            let tolerance = model.add_segment(bar_at(10.0), GasMix::AIR, 60, None, &d);
            assert!(tolerance.is_finite(), "tolerance must be finite");
            assert!((0..NUM_COMPARTMENTS).all(|i| model.compartment(i).0.is_finite()));
            history.push(tolerance);
        }

        let early_delta = (history[100] - history[50]).abs();
        let late_delta = (history[999] - history[949]).abs();
        assert!(
            late_delta < early_delta,
            "Late delta ({late_delta}) should be less than early delta ({early_delta})"
        );
    }
}
