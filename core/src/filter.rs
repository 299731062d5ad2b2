//! Particle filter engine.
//!
//! [ParticleFilter] owns the particle set, the two injected models and the seeded random source,
//! and drives the predict, update, resample and estimate cycle. The engine starts out
//! [FilterState::Uninitialized]; [ParticleFilter::initialize] draws the particle set from a Gaussian
//! prior and moves it to [FilterState::Ready]. Every other operation called before that fails with
//! [FilterError::NotInitialized]. Initializing again simply replaces the particle set, so there is
//! no terminal state.
//!
//! ## Data parallelism
//!
//! With [FilterConfig::parallel] set, prediction and likelihood evaluation run on the rayon thread
//! pool. Each phase finishes for every particle before weights are normalized or the set is
//! resampled. Prediction never shares a generator between threads: the particles are split into
//! fixed-size chunks and each chunk gets its own generator forked from the filter's random source.
//! The same forking is done for sequential runs, so a given seed produces identical particles with
//! or without parallelism.
use crate::config::FilterConfig;
use crate::error::{FilterError, FilterResult};
use crate::measurement::MeasurementModel;
use crate::motion::MotionModel;
use crate::particle::{Particle, ParticleSet};
use crate::random::RandomSource;
use crate::{StateVector, wrap_to_pi};

use log::{debug, trace, warn};
use nalgebra::SMatrix;
use rayon::prelude::*;
use std::fmt::{self, Debug};

/// Number of particles propagated with one forked generator
const CHUNK_SIZE: usize = 256;

/// Lifecycle of the filter engine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterState {
    Uninitialized,
    Ready,
}

/// Outcome of one [ParticleFilter::update]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UpdateSummary {
    /// Effective sample size after normalization and before resampling
    pub effective_sample_size: f64,
    /// Whether the update triggered a resampling step
    pub resampled: bool,
}

/// Monte Carlo Localization particle filter
///
/// Generic over the motion model `M`, the measurement model `S` and the state dimension `D`. Both
/// models are supplied at construction and must be `Sync` so the per-particle phases can be
/// evaluated in parallel.
pub struct ParticleFilter<M, S, const D: usize>
where
    M: MotionModel<D>,
    S: MeasurementModel<D>,
{
    motion: M,
    measurement: S,
    config: FilterConfig,
    particles: ParticleSet<D>,
    state: FilterState,
    rng: RandomSource,
}

impl<M, S, const D: usize> Debug for ParticleFilter<M, S, D>
where
    M: MotionModel<D>,
    S: MeasurementModel<D>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParticleFilter")
            .field("state", &self.state)
            .field("num_particles", &self.particles.len())
            .field("effective_particles", &self.particles.effective_sample_size())
            .field("resampling", &self.config.resampling)
            .field("estimate", &self.config.estimate)
            .field("seed", &self.rng.seed())
            .field("parallel", &self.config.parallel)
            .finish()
    }
}

impl<M, S, const D: usize> ParticleFilter<M, S, D>
where
    M: MotionModel<D> + Sync,
    M::Control: Sync,
    S: MeasurementModel<D> + Sync,
    S::Observation: Sync,
{
    /// Create an uninitialized filter
    ///
    /// # Arguments
    /// * `motion` - Motion model used by [ParticleFilter::predict]; also declares which state
    ///   components are angular.
    /// * `measurement` - Measurement model used by [ParticleFilter::update].
    /// * `config` - Particle count, resampling policy and seed.
    ///
    /// # Errors
    /// `InvalidArgument` if the configuration is invalid or the motion model declares an angular
    /// dimension outside the state.
    pub fn new(motion: M, measurement: S, config: FilterConfig) -> FilterResult<Self> {
        config.validate()?;
        let particles = ParticleSet::new(motion.angular_dimensions())?;
        let rng = RandomSource::from_seed(config.seed);
        Ok(ParticleFilter {
            motion,
            measurement,
            config,
            particles,
            state: FilterState::Uninitialized,
            rng,
        })
    }
    /// Draw `config.num_particles` particles around `prior_mean` and enter the `Ready` state
    pub fn initialize(&mut self, prior_mean: &StateVector<D>, prior_sigma: f64) -> FilterResult<()> {
        self.initialize_with_count(prior_mean, prior_sigma, self.config.num_particles)
    }
    /// Draw `count` particles around `prior_mean` and enter the `Ready` state
    ///
    /// The particle count becomes the filter's `N` until the next initialization. On error the
    /// filter is left exactly as it was.
    pub fn initialize_with_count(
        &mut self,
        prior_mean: &StateVector<D>,
        prior_sigma: f64,
        count: usize,
    ) -> FilterResult<()> {
        self.particles
            .initialize(prior_mean, prior_sigma, count, &mut self.rng)?;
        self.config.num_particles = count;
        self.state = FilterState::Ready;
        debug!(
            "initialized {} particles around {:?} (sigma {})",
            count,
            prior_mean.as_slice(),
            prior_sigma
        );
        Ok(())
    }
    /// Enter the `Ready` state with an explicit particle set, e.g. one restored from disk
    ///
    /// The weights are normalized on the way in.
    pub fn initialize_from_particles(&mut self, particles: Vec<Particle<D>>) -> FilterResult<()> {
        let mut set = ParticleSet::from_particles(particles, self.motion.angular_dimensions())?;
        set.normalize_weights()?;
        self.config.num_particles = set.len();
        self.particles = set;
        self.state = FilterState::Ready;
        debug!("restored {} particles", self.particles.len());
        Ok(())
    }
    /// Propagate every particle through the motion model
    ///
    /// Weights are not touched. The control is validated once before any particle moves.
    pub fn predict(&mut self, control: &M::Control) -> FilterResult<()> {
        self.ensure_ready()?;
        self.motion.validate_control(control)?;

        let chunks = self.particles.len().div_ceil(CHUNK_SIZE);
        let mut rngs = self.rng.fork(chunks);
        let motion = &self.motion;
        let angular = self.particles.angular_dimensions().to_vec();
        let propagate = |(chunk, rng): (&mut [Particle<D>], &mut RandomSource)| {
            for particle in chunk.iter_mut() {
                let mut next = motion.sample(&particle.state, control, rng);
                for &k in &angular {
                    next[k] = wrap_to_pi(next[k]);
                }
                particle.state = next;
            }
        };
        let particles = self.particles.particles_mut();
        if self.config.parallel {
            particles
                .par_chunks_mut(CHUNK_SIZE)
                .zip(rngs.par_iter_mut())
                .for_each(propagate);
        } else {
            particles
                .chunks_mut(CHUNK_SIZE)
                .zip(rngs.iter_mut())
                .for_each(propagate);
        }
        trace!("predicted {} particles in {} chunks", self.particles.len(), chunks);
        Ok(())
    }
    /// Multiply every weight by the likelihood of `observation` without normalizing
    ///
    /// Several observations can be folded in one after another before a single
    /// [ParticleFilter::normalize].
    ///
    /// # Errors
    /// `InvalidArgument` if the measurement model returns a negative or non-finite likelihood for
    /// any particle; no weight is changed in that case.
    pub fn reweight(&mut self, observation: &S::Observation) -> FilterResult<()> {
        self.ensure_ready()?;
        let measurement = &self.measurement;
        let likelihoods: Vec<f64> = if self.config.parallel {
            self.particles
                .particles()
                .par_iter()
                .map(|p| measurement.likelihood(&p.state, observation))
                .collect()
        } else {
            self.particles
                .iter()
                .map(|p| measurement.likelihood(&p.state, observation))
                .collect()
        };
        if let Some((index, likelihood)) = likelihoods
            .iter()
            .enumerate()
            .find(|(_, l)| !(**l >= 0.0) || !l.is_finite())
        {
            return Err(FilterError::invalid(format!(
                "measurement likelihood must be finite and non-negative, got {likelihood} for particle {index}"
            )));
        }
        for (particle, likelihood) in self.particles.particles_mut().iter_mut().zip(&likelihoods) {
            particle.weight *= likelihood;
        }
        Ok(())
    }
    /// Normalize the weights to sum to one
    ///
    /// # Errors
    /// `DegenerateDistribution` if every weight is zero; the weights are left as they are so the
    /// caller can re-initialize or call [ParticleFilter::reset_uniform_weights].
    pub fn normalize(&mut self) -> FilterResult<()> {
        self.ensure_ready()?;
        self.particles.normalize_weights()
    }
    /// Full measurement update: reweight, normalize and resample if the effective sample size
    /// dropped below `resample_threshold * N`
    pub fn update(&mut self, observation: &S::Observation) -> FilterResult<UpdateSummary> {
        self.reweight(observation)?;
        self.normalize()?;
        let effective_sample_size = self.particles.effective_sample_size();
        let resampled = self.resample_if_needed()?;
        debug!(
            "update: effective sample size {:.1} of {}{}",
            effective_sample_size,
            self.particles.len(),
            if resampled { ", resampled" } else { "" }
        );
        Ok(UpdateSummary {
            effective_sample_size,
            resampled,
        })
    }
    /// Resample when the effective sample size is below `resample_threshold * N`
    ///
    /// Returns whether a resampling step was performed.
    pub fn resample_if_needed(&mut self) -> FilterResult<bool> {
        self.ensure_ready()?;
        let threshold = self.config.resample_threshold * self.particles.len() as f64;
        if self.particles.effective_sample_size() < threshold {
            self.resample()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
    /// Resample unconditionally with the configured strategy
    pub fn resample(&mut self) -> FilterResult<()> {
        self.ensure_ready()?;
        let resampled = self
            .config
            .resampling
            .resample(&self.particles, &mut self.rng)
            .inspect_err(|e| warn!("resampling failed: {e}"))?;
        self.particles = resampled;
        Ok(())
    }
    /// Point estimate of the state using the configured [crate::particle::EstimateStrategy]
    pub fn estimate(&self) -> FilterResult<StateVector<D>> {
        self.ensure_ready()?;
        self.particles.estimate(self.config.estimate)
    }
    /// Weighted covariance of the particle set
    pub fn covariance(&self) -> FilterResult<SMatrix<f64, D, D>> {
        self.ensure_ready()?;
        self.particles.weighted_covariance()
    }
    pub fn effective_sample_size(&self) -> FilterResult<f64> {
        self.ensure_ready()?;
        Ok(self.particles.effective_sample_size())
    }
    /// Discard the weights and give every particle `1 / N`
    pub fn reset_uniform_weights(&mut self) -> FilterResult<()> {
        self.ensure_ready()?;
        self.particles.reset_uniform_weights();
        Ok(())
    }
    pub fn particles(&self) -> &ParticleSet<D> {
        &self.particles
    }
    pub fn state(&self) -> FilterState {
        self.state
    }
    /// `N`: the configured count before initialization, the set size afterwards
    pub fn num_particles(&self) -> usize {
        match self.state {
            FilterState::Uninitialized => self.config.num_particles,
            FilterState::Ready => self.particles.len(),
        }
    }
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }
    pub fn motion_model(&self) -> &M {
        &self.motion
    }
    pub fn measurement_model(&self) -> &S {
        &self.measurement
    }
    fn ensure_ready(&self) -> FilterResult<()> {
        match self.state {
            FilterState::Ready => Ok(()),
            FilterState::Uninitialized => Err(FilterError::NotInitialized),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::{LandmarkRangeModel, RangeObservation};
    use crate::motion::{OdometryMotionModel, OdometryNoise, OdometryReading};
    use crate::particle::EstimateStrategy;
    use crate::{HEADING, Pose2};
    use assert_approx_eq::assert_approx_eq;

    /// Same likelihood for every state
    struct ConstantLikelihood(f64);
    impl MeasurementModel<3> for ConstantLikelihood {
        type Observation = ();
        fn likelihood(&self, _state: &Pose2, _observation: &()) -> f64 {
            self.0
        }
    }

    /// Likelihood one at a single state, zero elsewhere
    struct Indicator(Pose2);
    impl MeasurementModel<3> for Indicator {
        type Observation = ();
        fn likelihood(&self, state: &Pose2, _observation: &()) -> f64 {
            if *state == self.0 { 1.0 } else { 0.0 }
        }
    }

    /// One-dimensional random walk without angular components
    struct RandomWalk(f64);
    impl MotionModel<1> for RandomWalk {
        type Control = f64;
        fn sample(&self, state: &StateVector<1>, step: &f64, rng: &mut RandomSource) -> StateVector<1> {
            StateVector::<1>::new(state[0] + rng.gaussian(*step, self.0))
        }
    }
    struct Flat;
    impl MeasurementModel<1> for Flat {
        type Observation = ();
        fn likelihood(&self, _state: &StateVector<1>, _observation: &()) -> f64 {
            1.0
        }
    }

    fn config(num_particles: usize) -> FilterConfig {
        FilterConfig {
            num_particles,
            ..FilterConfig::default()
        }
    }
    fn noiseless() -> OdometryMotionModel {
        OdometryMotionModel::new(OdometryNoise::zero()).unwrap()
    }
    fn reading(previous: (f64, f64, f64), current: (f64, f64, f64)) -> OdometryReading {
        OdometryReading::new(
            Pose2::new(previous.0, previous.1, previous.2),
            Pose2::new(current.0, current.1, current.2),
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let result = ParticleFilter::new(noiseless(), ConstantLikelihood(1.0), config(0));
        assert!(matches!(result, Err(FilterError::InvalidArgument(_))));
    }
    #[test]
    fn test_operations_before_initialize() {
        let mut pf = ParticleFilter::new(noiseless(), ConstantLikelihood(1.0), config(10)).unwrap();
        assert_eq!(pf.state(), FilterState::Uninitialized);
        assert_eq!(pf.num_particles(), 10);
        let control = reading((0.0, 0.0, 0.0), (1.0, 0.0, 0.0));
        assert_eq!(pf.predict(&control), Err(FilterError::NotInitialized));
        assert_eq!(pf.update(&()), Err(FilterError::NotInitialized));
        assert_eq!(pf.reweight(&()), Err(FilterError::NotInitialized));
        assert_eq!(pf.normalize(), Err(FilterError::NotInitialized));
        assert_eq!(pf.resample(), Err(FilterError::NotInitialized));
        assert_eq!(pf.estimate(), Err(FilterError::NotInitialized));
        assert_eq!(pf.effective_sample_size(), Err(FilterError::NotInitialized));
        assert!(pf.covariance().is_err());
    }
    #[test]
    fn test_initialize_enters_ready() {
        let mut pf = ParticleFilter::new(noiseless(), ConstantLikelihood(1.0), config(100)).unwrap();
        pf.initialize(&Pose2::new(1.0, 2.0, 0.3), 0.1).unwrap();
        assert_eq!(pf.state(), FilterState::Ready);
        assert_eq!(pf.num_particles(), 100);
        assert_approx_eq!(pf.particles().weight_sum(), 1.0, 1e-9);
        assert_approx_eq!(pf.effective_sample_size().unwrap(), 100.0, 1e-6);
        let estimate = pf.estimate().unwrap();
        assert!((estimate[0] - 1.0).abs() < 0.05);
        assert!((estimate[1] - 2.0).abs() < 0.05);
    }
    #[test]
    fn test_failed_initialize_keeps_state() {
        let mut pf = ParticleFilter::new(noiseless(), ConstantLikelihood(1.0), config(10)).unwrap();
        assert!(pf.initialize(&Pose2::zeros(), -1.0).is_err());
        assert_eq!(pf.state(), FilterState::Uninitialized);
        pf.initialize(&Pose2::zeros(), 0.1).unwrap();
        assert!(pf.initialize_with_count(&Pose2::zeros(), 0.1, 0).is_err());
        assert_eq!(pf.state(), FilterState::Ready);
        assert_eq!(pf.num_particles(), 10);
    }
    #[test]
    fn test_reinitialize_resets_particles() {
        let mut pf = ParticleFilter::new(noiseless(), Indicator(Pose2::zeros()), config(50)).unwrap();
        pf.initialize(&Pose2::zeros(), 0.1).unwrap();
        assert!(pf.update(&()).is_err());
        pf.initialize_with_count(&Pose2::new(5.0, 5.0, 0.0), 0.1, 80).unwrap();
        assert_eq!(pf.num_particles(), 80);
        assert_approx_eq!(pf.particles().weight_sum(), 1.0, 1e-9);
        assert!((pf.estimate().unwrap()[0] - 5.0).abs() < 0.1);
    }
    #[test]
    fn test_forward_motion_scenario() {
        let mut pf = ParticleFilter::new(noiseless(), ConstantLikelihood(1.0), config(1000)).unwrap();
        pf.initialize(&Pose2::zeros(), 0.1).unwrap();
        let before: Vec<Pose2> = pf.particles().iter().map(|p| p.state).collect();
        pf.predict(&reading((0.0, 0.0, 0.0), (1.0, 0.0, 0.0))).unwrap();
        let mut mean_dx = 0.0;
        for (old, new) in before.iter().zip(pf.particles().iter()) {
            let dx = new.state[0] - old[0];
            let dy = new.state[1] - old[1];
            assert_approx_eq!(dx, old[HEADING].cos(), 1e-12);
            assert_approx_eq!(dy, old[HEADING].sin(), 1e-12);
            assert_approx_eq!(new.state[HEADING], old[HEADING], 1e-12);
            assert!((dx - 1.0).abs() < 0.1);
            mean_dx += dx / 1000.0;
        }
        assert!((mean_dx - 1.0).abs() < 0.01, "mean shift {mean_dx}");
        // Prediction leaves the weights alone
        assert!(pf.particles().iter().all(|p| p.weight == 1.0 / 1000.0));
    }
    #[test]
    fn test_uniform_likelihood_keeps_weights_uniform() {
        let mut pf = ParticleFilter::new(noiseless(), ConstantLikelihood(2.0), config(200)).unwrap();
        pf.initialize(&Pose2::zeros(), 0.5).unwrap();
        let before: Vec<Pose2> = pf.particles().iter().map(|p| p.state).collect();
        let summary = pf.update(&()).unwrap();
        assert!(!summary.resampled);
        assert_approx_eq!(summary.effective_sample_size, 200.0, 1e-6);
        for (p, old) in pf.particles().iter().zip(&before) {
            assert_approx_eq!(p.weight, 1.0 / 200.0, 1e-12);
            assert_eq!(p.state, *old);
        }
    }
    #[test]
    fn test_single_supported_particle_collapses_set() {
        let mut reference = ParticleFilter::new(noiseless(), ConstantLikelihood(1.0), config(300)).unwrap();
        reference.initialize(&Pose2::zeros(), 1.0).unwrap();
        let target = reference.particles().particles()[17].state;

        let mut pf = ParticleFilter::new(noiseless(), Indicator(target), config(300)).unwrap();
        pf.initialize(&Pose2::zeros(), 1.0).unwrap();
        assert_eq!(pf.particles().particles()[17].state, target);
        let summary = pf.update(&()).unwrap();
        assert_approx_eq!(summary.effective_sample_size, 1.0, 1e-9);
        assert!(summary.resampled);
        assert_eq!(pf.num_particles(), 300);
        for p in pf.particles().iter() {
            assert_eq!(p.state, target);
            assert_approx_eq!(p.weight, 1.0 / 300.0, 1e-12);
        }
        let estimate = pf.estimate().unwrap();
        for k in 0..3 {
            assert_approx_eq!(estimate[k], target[k], 1e-9);
        }
    }
    #[test]
    fn test_all_zero_likelihood_is_degenerate() {
        let mut pf = ParticleFilter::new(noiseless(), ConstantLikelihood(0.0), config(20)).unwrap();
        pf.initialize(&Pose2::zeros(), 0.1).unwrap();
        let result = pf.update(&());
        assert_eq!(
            result,
            Err(FilterError::DegenerateDistribution { weight_sum: 0.0 })
        );
        assert!(pf.particles().iter().all(|p| p.weight == 0.0));
        assert!(pf.estimate().is_err());

        pf.reset_uniform_weights().unwrap();
        assert_approx_eq!(pf.particles().weight_sum(), 1.0, 1e-9);
        assert!(pf.estimate().is_ok());
    }
    #[test]
    fn test_unweighted_estimate_of_zero_weights_is_degenerate() {
        let mut cfg = config(20);
        cfg.estimate = EstimateStrategy::UnweightedMean;
        let mut pf = ParticleFilter::new(noiseless(), ConstantLikelihood(0.0), cfg).unwrap();
        pf.initialize(&Pose2::zeros(), 0.1).unwrap();
        assert!(pf.update(&()).is_err());
        assert_eq!(
            pf.estimate(),
            Err(FilterError::DegenerateDistribution { weight_sum: 0.0 })
        );
    }
    #[test]
    fn test_invalid_likelihood_is_rejected() {
        for bad in [-1.0, f64::NAN, f64::INFINITY] {
            let mut pf = ParticleFilter::new(noiseless(), ConstantLikelihood(bad), config(10)).unwrap();
            pf.initialize(&Pose2::zeros(), 0.1).unwrap();
            assert!(matches!(pf.update(&()), Err(FilterError::InvalidArgument(_))));
            assert!(pf.particles().iter().all(|p| p.weight == 0.1));
        }
    }
    #[test]
    fn test_reweight_accumulates_before_normalize() {
        let mut pf = ParticleFilter::new(noiseless(), ConstantLikelihood(0.5), config(4)).unwrap();
        pf.initialize(&Pose2::zeros(), 0.1).unwrap();
        pf.reweight(&()).unwrap();
        pf.reweight(&()).unwrap();
        assert_approx_eq!(pf.particles().weight_sum(), 0.25, 1e-12);
        pf.normalize().unwrap();
        assert_approx_eq!(pf.particles().weight_sum(), 1.0, 1e-12);
    }
    #[test]
    fn test_resample_threshold() {
        let mut cfg = config(100);
        cfg.resample_threshold = 0.0;
        let mut pf = ParticleFilter::new(noiseless(), Indicator(Pose2::zeros()), cfg).unwrap();
        pf.initialize(&Pose2::zeros(), 0.0).unwrap();
        // Every particle sits at the indicator state, so weights stay uniform
        let summary = pf.update(&()).unwrap();
        assert!(!summary.resampled);
        assert!(!pf.resample_if_needed().unwrap());
        pf.resample().unwrap();
        assert_eq!(pf.num_particles(), 100);
    }
    #[test]
    fn test_parallel_matches_sequential() {
        let landmarks = vec![[10.0, 0.0], [0.0, 10.0], [-5.0, -5.0]];
        let run = |parallel: bool| {
            let motion = OdometryMotionModel::new(OdometryNoise::default()).unwrap();
            let measurement = LandmarkRangeModel::new(landmarks.clone(), 0.5).unwrap();
            let cfg = FilterConfig {
                num_particles: 1000,
                parallel,
                seed: 5,
                ..FilterConfig::default()
            };
            let mut pf = ParticleFilter::new(motion, measurement, cfg).unwrap();
            pf.initialize(&Pose2::zeros(), 0.5).unwrap();
            for step in 0..5 {
                let x = step as f64;
                pf.predict(&reading((x, 0.0, 0.0), (x + 1.0, 0.0, 0.0))).unwrap();
                let observation = vec![
                    RangeObservation { landmark: 0, range: 9.0 - x },
                    RangeObservation { landmark: 1, range: (x + 1.0).hypot(10.0) },
                ];
                pf.update(&observation).unwrap();
            }
            pf.particles().clone()
        };
        assert_eq!(run(false), run(true));
    }
    #[test]
    fn test_same_seed_same_particles() {
        let run = || {
            let motion = OdometryMotionModel::new(OdometryNoise::default()).unwrap();
            let mut pf = ParticleFilter::new(motion, ConstantLikelihood(1.0), config(64)).unwrap();
            pf.initialize(&Pose2::zeros(), 0.3).unwrap();
            pf.predict(&reading((0.0, 0.0, 0.0), (0.5, 0.2, 0.4))).unwrap();
            pf.resample().unwrap();
            pf.particles().clone()
        };
        assert_eq!(run(), run());
    }
    #[test]
    fn test_headings_stay_wrapped() {
        let mut pf = ParticleFilter::new(noiseless(), ConstantLikelihood(1.0), config(100)).unwrap();
        pf.initialize(&Pose2::new(0.0, 0.0, 3.0), 0.3).unwrap();
        for _ in 0..10 {
            pf.predict(&reading((0.0, 0.0, 0.0), (0.0, 0.0, 1.0))).unwrap();
            for p in pf.particles().iter() {
                assert!(p.state[HEADING] > -std::f64::consts::PI);
                assert!(p.state[HEADING] <= std::f64::consts::PI);
            }
        }
    }
    #[test]
    fn test_restore_from_particles() {
        let mut pf = ParticleFilter::new(noiseless(), ConstantLikelihood(1.0), config(10)).unwrap();
        let particles = vec![
            Particle::new(Pose2::new(1.0, 0.0, 0.0), 3.0),
            Particle::new(Pose2::new(3.0, 0.0, 0.0), 1.0),
        ];
        pf.initialize_from_particles(particles).unwrap();
        assert_eq!(pf.state(), FilterState::Ready);
        assert_eq!(pf.num_particles(), 2);
        assert_approx_eq!(pf.estimate().unwrap()[0], 1.5, 1e-12);
        let zero = vec![Particle::new(Pose2::zeros(), 0.0)];
        assert!(pf.initialize_from_particles(zero).is_err());
        assert_eq!(pf.num_particles(), 2);
    }
    #[test]
    fn test_generic_state_dimension() {
        let mut pf = ParticleFilter::new(RandomWalk(0.1), Flat, config(500)).unwrap();
        pf.initialize(&StateVector::<1>::new(0.0), 0.0).unwrap();
        for _ in 0..10 {
            pf.predict(&1.0).unwrap();
            pf.update(&()).unwrap();
        }
        assert!((pf.estimate().unwrap()[0] - 10.0).abs() < 0.1);
        assert!(pf.particles().angular_dimensions().is_empty());
        assert!(pf.covariance().unwrap()[(0, 0)] > 0.0);
    }
}
