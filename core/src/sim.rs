//! Landmark world simulation for exercising the filter end to end.
//!
//! A [Scenario] is a ground truth trajectory together with what a robot driving it would sense: a
//! drifting odometry stream and noisy ranges to the landmarks within sensor range. The odometry is
//! produced by pushing the true relative motion of every step through an [OdometryMotionModel], so
//! it drifts exactly the way the filter's motion model assumes. [run_localization] feeds a scenario
//! through a [ParticleFilter] and records one [EstimateRecord] per step.
use crate::config::{SimulationConfig, WorldConfig};
use crate::error::{FilterError, FilterResult};
use crate::filter::ParticleFilter;
use crate::measurement::{LandmarkRangeModel, RangeObservation};
use crate::motion::{OdometryMotionModel, OdometryReading};
use crate::random::RandomSource;
use crate::{HEADING, Pose2, angle_difference, wrap_to_pi};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

/// Turn rates below this are integrated as straight lines
const STRAIGHT_LINE_YAW_RATE: f64 = 1e-9;

/// What the robot experiences during one time step
#[derive(Clone, Debug, PartialEq)]
pub struct ScenarioStep {
    /// True pose at the end of the step
    pub truth: Pose2,
    /// Raw odometry pose at the end of the step
    pub odometry: Pose2,
    /// Ranges measured at the end of the step
    pub observations: Vec<RangeObservation>,
}

/// Ground truth and simulated sensor data for a whole run
#[derive(Clone, Debug, PartialEq)]
pub struct Scenario {
    /// True pose at time zero; odometry starts here as well
    pub start: Pose2,
    pub dt: f64,
    pub steps: Vec<ScenarioStep>,
}

impl Scenario {
    /// Generate a scenario from the trajectory, world and odometry noise in `config`
    ///
    /// The result only depends on the configuration, including `config.scenario.seed`.
    pub fn generate(config: &SimulationConfig) -> FilterResult<Scenario> {
        config.validate()?;
        let scenario = &config.scenario;
        let odometry_model = OdometryMotionModel::new(scenario.odometry_noise)?;
        let mut rng = RandomSource::from_seed(scenario.seed);

        let start = Pose2::from(config.prior.mean);
        let mut truth = start;
        let mut odometry = start;
        let mut steps = Vec::with_capacity(scenario.steps);
        for _ in 0..scenario.steps {
            let next = unicycle_step(&truth, scenario.speed, scenario.yaw_rate, scenario.dt);
            let true_motion = OdometryReading::new(truth, next)?;
            odometry = odometry_model.apply(&odometry, &true_motion, &mut rng);
            let observations = observe(&config.world, &next, &mut rng);
            steps.push(ScenarioStep {
                truth: next,
                odometry,
                observations,
            });
            truth = next;
        }
        debug!(
            "generated {} steps, {} range readings",
            steps.len(),
            steps.iter().map(|s| s.observations.len()).sum::<usize>()
        );
        Ok(Scenario {
            start,
            dt: scenario.dt,
            steps,
        })
    }
    pub fn len(&self) -> usize {
        self.steps.len()
    }
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Exact constant speed, constant turn rate motion over `dt`
pub fn unicycle_step(pose: &Pose2, speed: f64, yaw_rate: f64, dt: f64) -> Pose2 {
    let heading = pose[HEADING];
    let next_heading = heading + yaw_rate * dt;
    if yaw_rate.abs() < STRAIGHT_LINE_YAW_RATE {
        Pose2::new(
            pose[0] + speed * dt * heading.cos(),
            pose[1] + speed * dt * heading.sin(),
            wrap_to_pi(next_heading),
        )
    } else {
        let radius = speed / yaw_rate;
        Pose2::new(
            pose[0] + radius * (next_heading.sin() - heading.sin()),
            pose[1] + radius * (heading.cos() - next_heading.cos()),
            wrap_to_pi(next_heading),
        )
    }
}

/// Noisy ranges to every landmark within `world.max_range` of `truth`
///
/// With probability `world.outlier_weight` a reading is replaced by a uniform draw over
/// `[0, max_range)`.
pub fn observe(world: &WorldConfig, truth: &Pose2, rng: &mut RandomSource) -> Vec<RangeObservation> {
    world
        .landmarks
        .iter()
        .enumerate()
        .filter_map(|(landmark, [x, y])| {
            let distance = (x - truth[0]).hypot(y - truth[1]);
            if distance > world.max_range {
                return None;
            }
            let range = if rng.uniform(0.0, 1.0) < world.outlier_weight {
                rng.uniform(0.0, world.max_range)
            } else {
                rng.gaussian(distance, world.range_noise_std).max(0.0)
            };
            Some(RangeObservation { landmark, range })
        })
        .collect()
}

/// Filter output and errors for one simulation step
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EstimateRecord {
    pub step: usize,
    pub time: f64,
    pub true_x: f64,
    pub true_y: f64,
    pub true_heading: f64,
    pub estimate_x: f64,
    pub estimate_y: f64,
    pub estimate_heading: f64,
    pub odometry_x: f64,
    pub odometry_y: f64,
    /// Distance between the estimate and the true position (m)
    pub position_error: f64,
    /// Absolute wrapped heading error (rad)
    pub heading_error: f64,
    /// Distance between raw odometry and the true position (m)
    pub dead_reckoning_error: f64,
    pub observations: usize,
    pub effective_sample_size: f64,
    pub resampled: bool,
    /// The filter lost track and was re-initialized at this step
    pub recovered: bool,
}

impl EstimateRecord {
    fn new(step: usize, time: f64, truth: &Pose2, estimate: &Pose2, odometry: &Pose2) -> Self {
        EstimateRecord {
            step,
            time,
            true_x: truth[0],
            true_y: truth[1],
            true_heading: truth[HEADING],
            estimate_x: estimate[0],
            estimate_y: estimate[1],
            estimate_heading: estimate[HEADING],
            odometry_x: odometry[0],
            odometry_y: odometry[1],
            position_error: (estimate[0] - truth[0]).hypot(estimate[1] - truth[1]),
            heading_error: angle_difference(estimate[HEADING], truth[HEADING]).abs(),
            dead_reckoning_error: (odometry[0] - truth[0]).hypot(odometry[1] - truth[1]),
            observations: 0,
            effective_sample_size: 0.0,
            resampled: false,
            recovered: false,
        }
    }
    /// Read records from a CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Self>, Box<dyn std::error::Error>> {
        let mut rdr = csv::Reader::from_path(path)?;
        let mut records = Vec::new();
        for result in rdr.deserialize() {
            records.push(result?);
        }
        Ok(records)
    }
    /// Write records to a CSV file
    pub fn to_csv<P: AsRef<Path>>(records: &[Self], path: P) -> io::Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Aggregate accuracy of a run
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RunSummary {
    pub steps: usize,
    pub mean_position_error: f64,
    pub final_position_error: f64,
    pub mean_heading_error: f64,
    pub mean_dead_reckoning_error: f64,
    pub resample_count: usize,
    pub recovery_count: usize,
}

impl RunSummary {
    pub fn from_records(records: &[EstimateRecord]) -> Self {
        if records.is_empty() {
            return RunSummary::default();
        }
        let n = records.len() as f64;
        RunSummary {
            steps: records.len(),
            mean_position_error: records.iter().map(|r| r.position_error).sum::<f64>() / n,
            final_position_error: records.last().map_or(0.0, |r| r.position_error),
            mean_heading_error: records.iter().map(|r| r.heading_error).sum::<f64>() / n,
            mean_dead_reckoning_error: records.iter().map(|r| r.dead_reckoning_error).sum::<f64>()
                / n,
            resample_count: records.iter().filter(|r| r.resampled).count(),
            recovery_count: records.iter().filter(|r| r.recovered).count(),
        }
    }
}

/// Build the filter described by `config`
pub fn build_filter(
    config: &SimulationConfig,
) -> FilterResult<ParticleFilter<OdometryMotionModel, LandmarkRangeModel, 3>> {
    let motion = OdometryMotionModel::new(config.motion_noise)?;
    let mut measurement =
        LandmarkRangeModel::new(config.world.landmarks.clone(), config.world.range_noise_std)?;
    if config.world.outlier_weight > 0.0 {
        measurement = measurement.with_outliers(config.world.outlier_weight, config.world.max_range)?;
    }
    ParticleFilter::new(motion, measurement, config.filter.clone())
}

/// Run the particle filter over a scenario
///
/// The filter starts from the configured prior. Each step predicts with the pair of consecutive
/// odometry poses and updates with that step's ranges; steps without any reading are prediction
/// only. If an update leaves every particle with zero weight the filter is re-initialized around
/// its last estimate with the prior spread and the run continues.
pub fn run_localization(
    config: &SimulationConfig,
    scenario: &Scenario,
) -> FilterResult<Vec<EstimateRecord>> {
    let mut pf = build_filter(config)?;
    let prior_mean = Pose2::from(config.prior.mean);
    pf.initialize(&prior_mean, config.prior.sigma)?;

    let mut previous_odometry = scenario.start;
    let mut last_estimate = pf.estimate()?;
    let mut records = Vec::with_capacity(scenario.len());
    for (index, step) in scenario.steps.iter().enumerate() {
        let control = OdometryReading::new(previous_odometry, step.odometry)?;
        pf.predict(&control)?;
        previous_odometry = step.odometry;

        let mut effective_sample_size = pf.effective_sample_size()?;
        let mut resampled = false;
        let mut recovered = false;
        if !step.observations.is_empty() {
            match pf.update(&step.observations) {
                Ok(summary) => {
                    effective_sample_size = summary.effective_sample_size;
                    resampled = summary.resampled;
                }
                Err(FilterError::DegenerateDistribution { weight_sum }) => {
                    warn!(
                        "step {index}: weight sum {weight_sum}, re-initializing around {:?}",
                        last_estimate.as_slice()
                    );
                    pf.initialize(&last_estimate, config.prior.sigma)?;
                    effective_sample_size = pf.effective_sample_size()?;
                    recovered = true;
                }
                Err(e) => return Err(e),
            }
        }
        last_estimate = pf.estimate()?;

        let mut record = EstimateRecord::new(
            index + 1,
            (index + 1) as f64 * scenario.dt,
            &step.truth,
            &last_estimate,
            &step.odometry,
        );
        record.observations = step.observations.len();
        record.effective_sample_size = effective_sample_size;
        record.resampled = resampled;
        record.recovered = recovered;
        records.push(record);
    }
    let summary = RunSummary::from_records(&records);
    info!(
        "localized {} steps: mean position error {:.3} m, dead reckoning {:.3} m",
        summary.steps, summary.mean_position_error, summary.mean_dead_reckoning_error
    );
    Ok(records)
}
