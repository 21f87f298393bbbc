//! Foreign-language surface declared in `divelog.udl`.
//!
//! Records are flat copies of the core types. [`DiveLogSession`] owns one
//! [`DiveLog`] behind a mutex and checks every precondition the core treats
//! as fatal, so no call can panic across the boundary.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::buhlmann::Zhl16c;
use crate::config::DiveLogConfig;
use crate::error::SessionError;
use crate::metrics::DiveMetrics;
use crate::models::{Cylinder, Dive, DiveId, GasChange, GasMix, Sample, Trip, TripId, WeightSystem};
use crate::trip::DiveLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasMixRecord {
    pub o2_permille: u32,
    pub he_permille: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CylinderRecord {
    pub size_ml: u32,
    pub working_pressure_mbar: u32,
    pub gas_mix: GasMixRecord,
    pub start_mbar: Option<u32>,
    pub end_mbar: Option<u32>,
    pub sample_start_mbar: Option<u32>,
    pub sample_end_mbar: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleRecord {
    pub t_sec: u32,
    pub depth_mm: i32,
    pub po2_mbar: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasChangeRecord {
    pub t_sec: u32,
    pub o2_permille: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiveRecord {
    pub number: u32,
    pub start_time_unix: i64,
    pub duration_sec: u32,
    pub location: Option<String>,
    pub surface_pressure_mbar: Option<u32>,
    pub salinity: Option<u32>,
    pub samples: Vec<SampleRecord>,
    pub cylinders: Vec<CylinderRecord>,
    pub weights_g: Vec<u32>,
    pub gas_changes: Vec<GasChangeRecord>,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiveMetricsRecord {
    pub total_weight_g: u32,
    pub o2_permille: u32,
    pub he_permille: u32,
    pub o2_low_permille: u32,
    pub gas_label: String,
    pub sac_ml_per_min: u32,
    pub otu: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripSummary {
    pub id: u64,
    pub when: i64,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub dive_ids: Vec<u64>,
    pub autogen: bool,
    pub display_index: Option<i32>,
}

impl From<DiveRecord> for Dive {
    fn from(record: DiveRecord) -> Self {
        Dive {
            number: record.number,
            location: record.location,
            surface_pressure_mbar: record.surface_pressure_mbar,
            salinity: record.salinity,
            samples: record
                .samples
                .into_iter()
                .map(|s| Sample {
                    t_sec: s.t_sec,
                    depth_mm: s.depth_mm,
                    po2_mbar: s.po2_mbar,
                })
                .collect(),
            cylinders: record
                .cylinders
                .into_iter()
                .map(|c| Cylinder {
                    size_ml: c.size_ml,
                    working_pressure_mbar: c.working_pressure_mbar,
                    gas_mix: GasMix::new(c.gas_mix.o2_permille, c.gas_mix.he_permille),
                    start_mbar: c.start_mbar,
                    end_mbar: c.end_mbar,
                    sample_start_mbar: c.sample_start_mbar,
                    sample_end_mbar: c.sample_end_mbar,
                })
                .collect(),
            weight_systems: record
                .weights_g
                .into_iter()
                .map(|weight_g| WeightSystem {
                    weight_g,
                    description: None,
                })
                .collect(),
            gas_changes: record
                .gas_changes
                .into_iter()
                .map(|g| GasChange {
                    t_sec: g.t_sec,
                    o2_permille: g.o2_permille,
                })
                .collect(),
            selected: record.selected,
            ..Dive::new(record.start_time_unix, record.duration_sec)
        }
    }
}

impl From<DiveMetrics> for DiveMetricsRecord {
    fn from(metrics: DiveMetrics) -> Self {
        Self {
            total_weight_g: metrics.total_weight_g,
            o2_permille: metrics.gas.o2_permille,
            he_permille: metrics.gas.he_permille,
            o2_low_permille: metrics.gas.o2_low_permille,
            gas_label: metrics.gas.label(),
            sac_ml_per_min: metrics.sac_ml_per_min,
            otu: metrics.otu,
        }
    }
}

impl From<&Trip> for TripSummary {
    fn from(trip: &Trip) -> Self {
        Self {
            id: trip.id.0,
            when: trip.when,
            location: trip.location.clone(),
            notes: trip.notes.clone(),
            dive_ids: trip.dives.iter().map(|d| d.0).collect(),
            autogen: trip.is_autogen(),
            display_index: trip.display_index,
        }
    }
}

pub fn compute_dive_metrics(dive: DiveRecord) -> DiveMetricsRecord {
    DiveMetrics::compute(&Dive::from(dive)).into()
}

pub fn dive_gas_label(dive: DiveRecord) -> String {
    crate::metrics::dive_gas(&Dive::from(dive)).label()
}

/// A dive log owned by a foreign caller.
pub struct DiveLogSession {
    log: Mutex<DiveLog>,
}

impl Default for DiveLogSession {
    fn default() -> Self {
        Self::new()
    }
}

impl DiveLogSession {
    pub fn new() -> Self {
        Self {
            log: Mutex::new(DiveLog::default()),
        }
    }

    pub fn with_config(config: String) -> Result<Self, SessionError> {
        let config = DiveLogConfig::parse(&config)?;
        debug!(?config, "opened dive log session");
        Ok(Self {
            log: Mutex::new(DiveLog::new(config)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, DiveLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_dive(&self, dive: DiveRecord) -> u64 {
        self.lock().add_dive(dive.into()).0
    }

    pub fn delete_dive(&self, dive_id: u64) -> Result<(), SessionError> {
        self.lock()
            .delete_dive(DiveId(dive_id))
            .map(|_| ())
            .ok_or(SessionError::UnknownDive(dive_id))
    }

    pub fn set_dive_time(&self, dive_id: u64, when: i64) -> Result<(), SessionError> {
        let mut log = self.lock();
        let dive = known_dive(&log, dive_id)?;
        log.set_dive_time(dive, when);
        Ok(())
    }

    pub fn set_selected(&self, dive_id: u64, selected: bool) -> Result<(), SessionError> {
        let mut log = self.lock();
        let dive = known_dive(&log, dive_id)?;
        log.set_selected(dive, selected);
        Ok(())
    }

    pub fn create_trip_from_dive(&self, dive_id: u64) -> Result<u64, SessionError> {
        let mut log = self.lock();
        let dive = known_dive(&log, dive_id)?;
        Ok(log.create_trip_from_dive(dive).0)
    }

    pub fn add_dive_to_trip(&self, dive_id: u64, trip_id: u64) -> Result<(), SessionError> {
        let mut log = self.lock();
        let dive = known_dive(&log, dive_id)?;
        let trip = known_trip(&log, trip_id)?;
        log.add_dive_to_trip(dive, trip);
        Ok(())
    }

    pub fn remove_dive_from_trip(&self, dive_id: u64) -> Result<(), SessionError> {
        let mut log = self.lock();
        let dive = known_dive(&log, dive_id)?;
        log.remove_dive_from_trip(dive);
        Ok(())
    }

    pub fn remove_trip(&self, trip_id: u64) -> Result<(), SessionError> {
        let mut log = self.lock();
        let trip = known_trip(&log, trip_id)?;
        log.remove_trip(trip);
        Ok(())
    }

    pub fn merge_trips(&self, source: u64, destination: u64) -> Result<(), SessionError> {
        let mut log = self.lock();
        let from = known_trip(&log, source)?;
        let to = known_trip(&log, destination)?;
        if from == to {
            return Err(SessionError::InvalidOperation(
                "cannot merge a trip into itself".to_string(),
            ));
        }
        log.merge_trips(from, to);
        Ok(())
    }

    pub fn split_trip(&self, dive_id: u64) -> Result<u64, SessionError> {
        let mut log = self.lock();
        let dive = known_dive(&log, dive_id)?;
        let Some(trip) = log.trip_of(dive) else {
            return Err(SessionError::InvalidOperation(format!(
                "dive {dive_id} is not in a trip"
            )));
        };
        let starts = log.dive(dive).map(|d| d.start_time_unix);
        if starts.is_some_and(|when| when <= trip.when) {
            return Err(SessionError::InvalidOperation(format!(
                "dive {dive_id} is the first dive of trip {}",
                trip.id.0
            )));
        }
        Ok(log.split_trip(dive).0)
    }

    pub fn merge_dive_into_previous_trip(
        &self,
        dive_id: u64,
        include_selected_run: bool,
    ) -> Result<Option<u64>, SessionError> {
        let mut log = self.lock();
        let dive = known_dive(&log, dive_id)?;
        Ok(log
            .merge_dive_into_previous_trip(dive, include_selected_run)
            .map(|t| t.0))
    }

    pub fn autogroup(&self) -> u32 {
        let grouped = self.lock().autogroup();
        u32::try_from(grouped).unwrap_or(u32::MAX)
    }

    pub fn remove_autogen_trips(&self) {
        self.lock().remove_autogen_trips();
    }

    pub fn refresh(&self) {
        self.lock().refresh();
    }

    pub fn trips(&self) -> Vec<TripSummary> {
        self.lock().trips().iter().map(TripSummary::from).collect()
    }

    pub fn dive_metrics(&self, dive_id: u64) -> Result<DiveMetricsRecord, SessionError> {
        let log = self.lock();
        let dive = log
            .dive(DiveId(dive_id))
            .ok_or(SessionError::UnknownDive(dive_id))?;
        Ok(DiveMetrics::compute(dive).into())
    }

    /// Tissue tolerance (bar) at the start of the dive, from a fresh ZHL-16C model.
    pub fn deco_preload(&self, dive_id: u64) -> Result<f64, SessionError> {
        let log = self.lock();
        let dive = known_dive(&log, dive_id)?;
        let mut model = Zhl16c::new();
        Ok(log.deco_preload(Some(dive), &mut model))
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.lock().has_unsaved_changes()
    }

    pub fn mark_saved(&self) {
        self.lock().mark_saved();
    }
}

fn known_dive(log: &DiveLog, dive_id: u64) -> Result<DiveId, SessionError> {
    let id = DiveId(dive_id);
    log.dive(id)
        .map(|_| id)
        .ok_or(SessionError::UnknownDive(dive_id))
}

fn known_trip(log: &DiveLog, trip_id: u64) -> Result<TripId, SessionError> {
    let id = TripId(trip_id);
    log.trip(id)
        .map(|_| id)
        .ok_or(SessionError::UnknownTrip(trip_id))
}
