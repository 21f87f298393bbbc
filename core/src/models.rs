use crate::units::{depth_to_mbar, O2_IN_AIR, SEAWATER_SALINITY, SURFACE_PRESSURE_MBAR};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DiveId(pub u64);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TripId(pub u64);

/// Breathing gas composition. An `o2_permille` of zero means "unset" and is
/// treated as air.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct GasMix {
    pub o2_permille: u32,
    pub he_permille: u32,
}

impl GasMix {
    pub const AIR: GasMix = GasMix {
        o2_permille: O2_IN_AIR,
        he_permille: 0,
    };

    pub fn new(o2_permille: u32, he_permille: u32) -> Self {
        Self {
            o2_permille,
            he_permille,
        }
    }

    /// Oxygen permille with the "unset means air" rule applied.
    pub fn effective_o2_permille(&self) -> u32 {
        if self.o2_permille == 0 {
            O2_IN_AIR
        } else {
            self.o2_permille
        }
    }

    pub fn o2_fraction(&self) -> f64 {
        self.effective_o2_permille() as f64 / 1000.0
    }

    pub fn he_fraction(&self) -> f64 {
        self.he_permille as f64 / 1000.0
    }

    pub fn n2_fraction(&self) -> f64 {
        (1.0 - self.o2_fraction() - self.he_fraction()).max(0.0)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Cylinder {
    pub size_ml: u32,
    pub working_pressure_mbar: u32,
    pub gas_mix: GasMix,
    /// Pressures entered by the diver.
    pub start_mbar: Option<u32>,
    pub end_mbar: Option<u32>,
    /// Pressures derived from the logged profile.
    pub sample_start_mbar: Option<u32>,
    pub sample_end_mbar: Option<u32>,
}

impl Cylinder {
    pub fn with_mix(gas_mix: GasMix) -> Self {
        Self {
            gas_mix,
            ..Self::default()
        }
    }

    /// An empty cylinder slot carries no information at all.
    pub fn is_unused(&self) -> bool {
        self.size_ml == 0
            && self.working_pressure_mbar == 0
            && self.gas_mix == GasMix::default()
            && self.start_mbar.is_none()
            && self.end_mbar.is_none()
            && self.sample_start_mbar.is_none()
            && self.sample_end_mbar.is_none()
    }

    pub fn effective_start_mbar(&self) -> u32 {
        self.start_mbar.or(self.sample_start_mbar).unwrap_or(0)
    }

    pub fn effective_end_mbar(&self) -> u32 {
        self.end_mbar.or(self.sample_end_mbar).unwrap_or(0)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct WeightSystem {
    pub weight_g: u32,
    pub description: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Sample {
    /// Time offset from dive start in seconds
    pub t_sec: u32,
    pub depth_mm: i32,
    /// Logged oxygen partial pressure (CCR sensor / setpoint)
    pub po2_mbar: Option<u32>,
}

/// A gas switch recorded by the dive computer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GasChange {
    pub t_sec: u32,
    pub o2_permille: u32,
}

/// How a dive came to be (or not be) in a trip.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TripFlag {
    /// Never assigned; eligible for automatic grouping.
    #[default]
    Unassigned,
    /// Explicitly taken out of a trip; automatic grouping leaves it alone.
    Detached,
    /// Member of a trip by deliberate assignment.
    Assigned,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TripOrigin {
    #[default]
    Manual,
    Autogen,
}

#[derive(Clone, Debug, Default)]
pub struct Dive {
    pub id: DiveId,
    pub number: u32,
    pub start_time_unix: i64,
    pub duration_sec: u32,
    pub location: Option<String>,
    pub surface_pressure_mbar: Option<u32>,
    /// Water density in grams per 10 litres.
    pub salinity: Option<u32>,
    pub samples: Vec<Sample>,
    pub cylinders: Vec<Cylinder>,
    pub weight_systems: Vec<WeightSystem>,
    pub gas_changes: Vec<GasChange>,
    pub trip: Option<TripId>,
    pub trip_flag: TripFlag,
    pub selected: bool,
    pub sac_ml_per_min: u32,
    pub otu: u32,
}

impl Dive {
    pub fn new(start_time_unix: i64, duration_sec: u32) -> Self {
        Self {
            start_time_unix,
            duration_sec,
            ..Self::default()
        }
    }

    /// Saturates at `i64::MAX` for start times at the end of the range.
    pub fn end_time_unix(&self) -> i64 {
        self.start_time_unix.saturating_add(i64::from(self.duration_sec))
    }

    pub fn surface_mbar(&self) -> u32 {
        self.surface_pressure_mbar
            .filter(|p| *p > 0)
            .unwrap_or(SURFACE_PRESSURE_MBAR)
    }

    pub fn surface_bar(&self) -> f64 {
        self.surface_mbar() as f64 / 1000.0
    }

    /// Ambient pressure (mbar) at the given depth for this dive's water and altitude.
    pub fn depth_to_mbar(&self, depth_mm: i32) -> f64 {
        let salinity = self.salinity.filter(|s| *s > 0).unwrap_or(SEAWATER_SALINITY);
        depth_to_mbar(depth_mm, self.surface_mbar(), salinity)
    }

    /// The mix of the first cylinder, air if none is configured.
    pub fn first_mix(&self) -> GasMix {
        let mix = self.cylinders.first().map(|c| c.gas_mix).unwrap_or_default();
        GasMix::new(mix.effective_o2_permille(), mix.he_permille)
    }

    /// Gas breathed at `t_sec`: the most recent gas switch at or before that
    /// instant, else the first cylinder.
    ///
    /// A switch only carries oxygen; helium comes from the first cylinder
    /// with the same oxygen content.
    pub fn mix_at(&self, t_sec: u32) -> GasMix {
        let switched = self
            .gas_changes
            .iter()
            .take_while(|event| event.t_sec <= t_sec)
            .last();
        let Some(event) = switched else {
            return self.first_mix();
        };
        let o2 = if event.o2_permille == 0 {
            O2_IN_AIR
        } else {
            event.o2_permille
        };
        let he = self
            .cylinders
            .iter()
            .find(|c| c.gas_mix.effective_o2_permille() == o2)
            .map(|c| c.gas_mix.he_permille)
            .unwrap_or(0);
        GasMix::new(o2, he)
    }

    /// Time-weighted mean depth of the logged profile, `None` without samples.
    pub fn mean_depth_mm(&self) -> Option<f64> {
        match self.samples.as_slice() {
            [] => None,
            [only] => Some(only.depth_mm as f64),
            samples => {
                let mut area = 0.0;
                let mut time = 0.0;
                for pair in samples.windows(2) {
                    let dt = pair[1].t_sec.saturating_sub(pair[0].t_sec) as f64;
                    area += (pair[0].depth_mm as f64 + pair[1].depth_mm as f64) / 2.0 * dt;
                    time += dt;
                }
                if time > 0.0 {
                    Some(area / time)
                } else {
                    Some(samples[0].depth_mm as f64)
                }
            }
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Trip {
    pub id: TripId,
    /// Start of the earliest member dive.
    pub when: i64,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub dives: Vec<DiveId>,
    pub origin: TripOrigin,
    /// Negative per-pass display id, see `DiveLog::assign_trip_indexes`.
    pub display_index: Option<i32>,
    pub expanded: bool,
    pub selected: bool,
}

impl Trip {
    pub fn member_count(&self) -> usize {
        self.dives.len()
    }

    pub fn is_autogen(&self) -> bool {
        self.origin == TripOrigin::Autogen
    }

    pub fn contains(&self, dive: DiveId) -> bool {
        self.dives.contains(&dive)
    }
}
