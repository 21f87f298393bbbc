//! Metrics computation for dive data.
//!
//! Pure functions deriving per-dive scalars from the dive record: total
//! weight, dominant gas, surface air consumption and oxygen toxicity units.
//! None of them touch the dive table or the trip graph.

use std::cmp::Ordering;

use crate::config::UnitSystem;
use crate::models::Dive;
use crate::units::{litres_to_cuft, mbar_to_atm, O2_IN_AIR};

/// Depth below which a sample counts as being at the surface (10 cm).
const SURFACE_DEPTH_MM: i32 = 100;

/// Oxygen partial pressure (mbar) above which OTUs accumulate.
const OTU_PO2_THRESHOLD_MBAR: f64 = 500.0;

/// Total mass of all weight systems in grams, 0 for no dive.
pub fn total_weight(dive: Option<&Dive>) -> u32 {
    dive.map_or(0, |d| d.weight_systems.iter().map(|w| w.weight_g).sum())
}

/// Dominant breathing gas of a dive, used for the gas column and its sort.
///
/// All values are permille. An all-air dive reports zeros everywhere.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GasSummary {
    /// Oxygen of the winning mix.
    pub o2_permille: u32,
    /// Helium of the winning mix.
    pub he_permille: u32,
    /// Lowest oxygen among cylinders with the winning helium content.
    pub o2_low_permille: u32,
}

impl GasSummary {
    pub fn is_air(&self) -> bool {
        self.o2_permille == 0 && self.he_permille == 0
    }

    /// Short label: `air`, `32`, `21…32` or `18/35`.
    pub fn label(&self) -> String {
        let percent = |permille: u32| (permille + 5) / 10;
        let (o2, he, o2_low) = (
            percent(self.o2_permille),
            percent(self.he_permille),
            percent(self.o2_low_permille),
        );
        if he > 0 {
            format!("{o2}/{he}")
        } else if o2 == 0 {
            "air".to_string()
        } else if o2 == o2_low {
            o2.to_string()
        } else {
            format!("{o2_low}\u{2026}{o2}")
        }
    }
}

impl Ord for GasSummary {
    fn cmp(&self, other: &Self) -> Ordering {
        self.he_permille
            .cmp(&other.he_permille)
            .then(self.o2_permille.cmp(&other.o2_permille))
            .then(self.o2_low_permille.cmp(&other.o2_low_permille))
    }
}

impl PartialOrd for GasSummary {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Classify a dive's gas: trimix beats nitrox (most helium wins, oxygen
/// breaks ties) and nitrox beats air.
pub fn dive_gas(dive: &Dive) -> GasSummary {
    let mixes: Vec<(u32, u32)> = dive
        .cylinders
        .iter()
        .filter(|c| !c.is_unused())
        .map(|c| (c.gas_mix.effective_o2_permille(), c.gas_mix.he_permille))
        .collect();

    let Some(&(o2, he)) = mixes.iter().max_by_key(|(o2, he)| (*he, *o2)) else {
        return GasSummary::default();
    };
    let o2_low = mixes
        .iter()
        .filter(|(_, h)| *h == he)
        .map(|(o, _)| *o)
        .min()
        .unwrap_or(o2);

    if he == 0 && o2 == O2_IN_AIR && o2_low == o2 {
        return GasSummary::default();
    }
    GasSummary {
        o2_permille: o2,
        he_permille: he,
        o2_low_permille: o2_low,
    }
}

/// Gas consumed across all cylinders, in litres at one atmosphere.
pub fn air_use_litres(dive: &Dive) -> f64 {
    dive.cylinders
        .iter()
        .filter(|c| c.size_ml > 0)
        .map(|c| {
            let atm = mbar_to_atm(c.effective_start_mbar()) - mbar_to_atm(c.effective_end_mbar());
            atm * c.size_ml as f64 / 1000.0
        })
        .sum()
}

/// Dive duration minus surface stretches that happen during the dive.
///
/// A run of shallow samples that lasts until the end of the profile is part
/// of the dive proper and stays counted.
fn underwater_seconds(dive: &Dive) -> i64 {
    let samples = &dive.samples;
    let mut duration = dive.duration_sec as i64;
    let mut i = 0;
    while i < samples.len() {
        if samples[i].depth_mm >= SURFACE_DEPTH_MM {
            i += 1;
            continue;
        }
        let mut end = i + 1;
        while end < samples.len() && samples[end].depth_mm < SURFACE_DEPTH_MM {
            end += 1;
        }
        if end == samples.len() {
            break;
        }
        let last_shallow = end - 1;
        duration -= samples[last_shallow].t_sec as i64 - samples[i].t_sec as i64;
        i = end + 1;
    }
    duration
}

/// Surface air consumption in ml/min, 0 when it cannot be computed.
pub fn sac_ml_per_min(dive: &Dive) -> u32 {
    if dive.samples.is_empty() {
        return 0;
    }
    let air_use = air_use_litres(dive);
    if air_use == 0.0 {
        return 0;
    }
    let duration = underwater_seconds(dive);
    if duration <= 0 {
        return 0;
    }

    let mean_depth = dive.mean_depth_mm().unwrap_or(0.0).round() as i32;
    let pressure_bar = dive.depth_to_mbar(mean_depth) / 1000.0;
    let sac = air_use / pressure_bar * 60.0 / duration as f64;
    (sac * 1000.0).max(0.0) as u32
}

/// Convert a SAC rate to the display unit: l/min or cuft/min.
pub fn sac_in_units(sac_ml_per_min: u32, units: UnitSystem) -> f64 {
    let litres = sac_ml_per_min as f64 / 1000.0;
    match units {
        UnitSystem::Metric => litres,
        UnitSystem::Imperial => litres_to_cuft(litres),
    }
}

/// Oxygen toxicity units accumulated over the logged profile.
pub fn otu(dive: &Dive) -> u32 {
    let mut total = 0.0;
    for pair in dive.samples.windows(2) {
        let (prev, sample) = (&pair[0], &pair[1]);
        let dt = sample.t_sec.saturating_sub(prev.t_sec) as f64;
        let po2 = match sample.po2_mbar {
            Some(po2) if po2 > 0 => po2 as f64,
            _ => {
                let depth = (prev.depth_mm + sample.depth_mm) / 2;
                dive.mix_at(sample.t_sec).o2_fraction() * dive.depth_to_mbar(depth)
            }
        };
        if po2 > OTU_PO2_THRESHOLD_MBAR {
            total += ((po2 - OTU_PO2_THRESHOLD_MBAR) / 1000.0).powf(0.83) * dt / 30.0;
        }
    }
    (total + 0.5) as u32
}

/// Computed per-dive metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct DiveMetrics {
    pub total_weight_g: u32,
    pub gas: GasSummary,
    /// Surface air consumption (ml/min)
    pub sac_ml_per_min: u32,
    pub otu: u32,
}

impl DiveMetrics {
    pub fn compute(dive: &Dive) -> Self {
        Self {
            total_weight_g: total_weight(Some(dive)),
            gas: dive_gas(dive),
            sac_ml_per_min: sac_ml_per_min(dive),
            otu: otu(dive),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Cylinder, GasChange, GasMix, Sample, WeightSystem};

    fn cylinder(o2: u32, he: u32) -> Cylinder {
        Cylinder {
            size_ml: 11_100,
            working_pressure_mbar: 207_000,
            ..Cylinder::with_mix(GasMix::new(o2, he))
        }
    }

    fn dive_with(cylinders: Vec<Cylinder>) -> Dive {
        Dive {
            cylinders,
            ..Dive::new(0, 3_600)
        }
    }

    fn sample(t_sec: u32, depth_m: i32) -> Sample {
        Sample {
            t_sec,
            depth_mm: depth_m * 1000,
            po2_mbar: None,
        }
    }

    fn flat_profile(depth_m: i32, minutes: u32) -> Vec<Sample> {
        (0..=minutes).map(|m| sample(m * 60, depth_m)).collect()
    }

    #[test]
    fn test_total_weight() {
        let dive = Dive {
            weight_systems: vec![
                WeightSystem {
                    weight_g: 4_000,
                    description: Some("belt".to_string()),
                },
                WeightSystem {
                    weight_g: 2_000,
                    description: None,
                },
            ],
            ..Dive::new(0, 60)
        };
        assert_eq!(total_weight(Some(&dive)), 6_000);
        assert_eq!(total_weight(None), 0);
    }

    #[test]
    fn test_trimix_wins_on_helium() {
        let gas = dive_gas(&dive_with(vec![cylinder(210, 0), cylinder(180, 350)]));
        assert_eq!(gas.he_permille, 350);
        assert_eq!(gas.o2_permille, 180);
        assert_eq!(gas.label(), "18/35");
    }

    #[test]
    fn test_nitrox_wins_on_oxygen() {
        let gas = dive_gas(&dive_with(vec![cylinder(210, 0), cylinder(320, 0)]));
        assert_eq!(gas.o2_permille, 320);
        assert_eq!(gas.he_permille, 0);
        assert_eq!(gas.o2_low_permille, 210);
        assert_eq!(gas.label(), "21\u{2026}32");
    }

    #[test]
    fn test_all_air_reports_air() {
        let gas = dive_gas(&dive_with(vec![cylinder(209, 0), cylinder(0, 0)]));
        assert!(gas.is_air(), "unset oxygen means air: {gas:?}");
        assert_eq!(gas.label(), "air");

        let no_cylinders = dive_gas(&Dive::new(0, 60));
        assert!(no_cylinders.is_air());
    }

    #[test]
    fn test_single_nitrox_label() {
        let gas = dive_gas(&dive_with(vec![cylinder(320, 0)]));
        assert_eq!(gas.label(), "32");
    }

    #[test]
    fn test_unused_cylinder_ignored() {
        let gas = dive_gas(&dive_with(vec![cylinder(320, 0), Cylinder::default()]));
        assert_eq!(gas.o2_low_permille, 320);
    }

    #[test]
    fn test_gas_ordering() {
        let air = GasSummary::default();
        let ean32 = dive_gas(&dive_with(vec![cylinder(320, 0)]));
        let tx = dive_gas(&dive_with(vec![cylinder(180, 350)]));
        let mut sorted = vec![tx, air, ean32];
        sorted.sort();
        assert_eq!(sorted, vec![air, ean32, tx]);
    }

    #[test]
    fn test_air_use() {
        let mut cyl = cylinder(210, 0);
        cyl.start_mbar = Some(200_000);
        cyl.end_mbar = Some(50_000);
        cyl.sample_start_mbar = Some(190_000);
        let litres = air_use_litres(&dive_with(vec![cyl]));
        let expected = (200_000.0 - 50_000.0) / 1013.25 * 11.1;
        assert!((litres - expected).abs() < 1e-6, "got {litres}");
    }

    #[test]
    fn test_sac_flat_dive() {
        let mut cyl = cylinder(210, 0);
        cyl.start_mbar = Some(200_000);
        cyl.end_mbar = Some(100_000);
        let dive = Dive {
            samples: flat_profile(10, 60),
            ..dive_with(vec![cyl])
        };

        let sac = sac_ml_per_min(&dive);

        let litres = air_use_litres(&dive);
        let bar = dive.depth_to_mbar(10_000) / 1000.0;
        let expected = (litres / bar * 60.0 / 3_600.0 * 1000.0) as u32;
        assert_eq!(sac, expected);
        // about 9 litres/min at the surface
        assert!((8_500..9_500).contains(&sac), "got {sac}");
    }

    #[test]
    fn test_sac_skips_mid_dive_surface_time() {
        let mut cyl = cylinder(210, 0);
        cyl.start_mbar = Some(200_000);
        cyl.end_mbar = Some(100_000);
        let samples = vec![
            sample(0, 10),
            sample(600, 10),
            sample(660, 0),
            sample(1_260, 0),
            sample(1_320, 10),
            sample(1_920, 10),
            sample(1_980, 0),
        ];
        let mut dive = Dive {
            samples,
            ..dive_with(vec![cyl])
        };
        dive.duration_sec = 1_980;
        assert_eq!(underwater_seconds(&dive), 1_980 - 600);
        assert!(sac_ml_per_min(&dive) > 0);
    }

    #[test]
    fn test_sac_zero_cases() {
        let mut cyl = cylinder(210, 0);
        cyl.start_mbar = Some(200_000);
        cyl.end_mbar = Some(100_000);

        let no_samples = dive_with(vec![cyl.clone()]);
        assert_eq!(sac_ml_per_min(&no_samples), 0);

        let mut zero_size = cyl.clone();
        zero_size.size_ml = 0;
        let dive = Dive {
            samples: flat_profile(10, 10),
            ..dive_with(vec![zero_size])
        };
        assert_eq!(sac_ml_per_min(&dive), 0);

        let mut zero_duration = Dive {
            samples: flat_profile(10, 10),
            ..dive_with(vec![cyl])
        };
        zero_duration.duration_sec = 0;
        assert_eq!(sac_ml_per_min(&zero_duration), 0);
    }

    #[test]
    fn test_sac_imperial() {
        let cuft = sac_in_units(28_317, UnitSystem::Imperial);
        assert!((cuft - 1.0).abs() < 1e-3);
        assert_eq!(sac_in_units(15_000, UnitSystem::Metric), 15.0);
    }

    #[test]
    fn test_otu_zero_without_samples() {
        assert_eq!(otu(&dive_with(vec![cylinder(320, 0)])), 0);
    }

    #[test]
    fn test_otu_air_shallow_is_zero() {
        // air at 10 m is about 0.42 bar of oxygen
        let dive = Dive {
            samples: flat_profile(10, 60),
            ..dive_with(vec![cylinder(210, 0)])
        };
        assert_eq!(otu(&dive), 0);
    }

    #[test]
    fn test_otu_logged_po2() {
        // 1.3 bar for an hour: 2 * 0.8^0.83 per minute, about 99.7
        let samples = (0..=60)
            .map(|m| Sample {
                po2_mbar: Some(1_300),
                ..sample(m * 60, 20)
            })
            .collect();
        let dive = Dive {
            samples,
            ..Dive::new(0, 3_600)
        };
        let expected = (0.8f64.powf(0.83) * 120.0 + 0.5) as u32;
        assert_eq!(otu(&dive), expected);
    }

    #[test]
    fn test_otu_follows_gas_change() {
        let mut dive = Dive {
            samples: flat_profile(6, 30),
            gas_changes: vec![GasChange {
                t_sec: 600,
                o2_permille: 1000,
            }],
            ..dive_with(vec![cylinder(210, 0), cylinder(1000, 0)])
        };
        let with_oxygen = otu(&dive);
        dive.gas_changes.clear();
        assert_eq!(otu(&dive), 0);
        assert!(with_oxygen > 0);
    }

    #[test]
    fn test_compute_bundle() {
        let dive = Dive {
            samples: flat_profile(10, 30),
            weight_systems: vec![WeightSystem {
                weight_g: 3_000,
                description: None,
            }],
            ..dive_with(vec![cylinder(320, 0)])
        };
        let metrics = DiveMetrics::compute(&dive);
        assert_eq!(metrics.total_weight_g, 3_000);
        assert_eq!(metrics.gas.o2_permille, 320);
        assert_eq!(metrics.sac_ml_per_min, 0, "no pressures logged");
    }
}
