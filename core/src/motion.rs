//! Motion models for the prediction step.
//!
//! The filter consumes motion models through the [MotionModel] trait: given one particle's state and
//! a control input, draw a successor state. This module provides the standard odometry motion model
//! (Probabilistic Robotics, Table 5.6). The model decomposes the relative motion between two raw
//! odometry poses into a rotation, a translation and a second rotation, perturbs each of the three
//! with noise proportional to the motion, and composes the result onto the particle's own state.
//!
//! The control input is always a *pair* of consecutive odometry readings rather than a single delta,
//! because the decomposition is taken relative to the heading of the earlier reading.
use crate::error::{FilterError, FilterResult};
use crate::random::RandomSource;
use crate::{HEADING, Pose2, StateVector, wrap_to_pi};

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// Generic motion model trait used by the particle filter prediction step
///
/// Implementations must be pure with respect to everything except the random source: two calls
/// with the same state, control and generator state must produce the same successor.
pub trait MotionModel<const D: usize> {
    /// Control input consumed by one prediction step
    type Control;
    /// Indices of the state components that are angles in radians
    fn angular_dimensions(&self) -> &[usize] {
        &[]
    }
    /// Check a control input before it is applied to any particle
    fn validate_control(&self, _control: &Self::Control) -> FilterResult<()> {
        Ok(())
    }
    /// Draw a successor state for one particle
    fn sample(
        &self,
        state: &StateVector<D>,
        control: &Self::Control,
        rng: &mut RandomSource,
    ) -> StateVector<D>;
}

/// Odometry motion model calibration constants
///
/// - `alpha1`: rotation noise from rotation (rad/rad)
/// - `alpha2`: rotation noise from translation (rad/m)
/// - `alpha3`: translation noise from translation (m/m)
/// - `alpha4`: translation noise from rotation (m/rad)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OdometryNoise {
    pub alpha1: f64,
    pub alpha2: f64,
    pub alpha3: f64,
    pub alpha4: f64,
}
impl Default for OdometryNoise {
    fn default() -> Self {
        OdometryNoise {
            alpha1: 0.025,
            alpha2: 0.025,
            alpha3: 0.4,
            alpha4: 0.4,
        }
    }
}
impl Display for OdometryNoise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OdometryNoise(alpha1: {}, alpha2: {}, alpha3: {}, alpha4: {})",
            self.alpha1, self.alpha2, self.alpha3, self.alpha4
        )
    }
}
impl OdometryNoise {
    pub fn new(alpha1: f64, alpha2: f64, alpha3: f64, alpha4: f64) -> FilterResult<Self> {
        let noise = OdometryNoise {
            alpha1,
            alpha2,
            alpha3,
            alpha4,
        };
        noise.validate()?;
        Ok(noise)
    }
    /// Noiseless calibration, for deterministic dead reckoning
    pub fn zero() -> Self {
        OdometryNoise {
            alpha1: 0.0,
            alpha2: 0.0,
            alpha3: 0.0,
            alpha4: 0.0,
        }
    }
    /// Every constant must be finite and non-negative
    pub fn validate(&self) -> FilterResult<()> {
        for (name, value) in [
            ("alpha1", self.alpha1),
            ("alpha2", self.alpha2),
            ("alpha3", self.alpha3),
            ("alpha4", self.alpha4),
        ] {
            if !(value >= 0.0) || !value.is_finite() {
                return Err(FilterError::invalid(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Two consecutive raw odometry poses `[x, y, heading]`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OdometryReading {
    previous: Pose2,
    current: Pose2,
}
impl OdometryReading {
    /// Pair two odometry poses; fails with `InvalidArgument` on a non-finite component
    pub fn new(previous: Pose2, current: Pose2) -> FilterResult<Self> {
        if previous.iter().chain(current.iter()).any(|v| !v.is_finite()) {
            return Err(FilterError::invalid(
                "odometry readings must have finite components",
            ));
        }
        Ok(OdometryReading { previous, current })
    }
    pub fn previous(&self) -> &Pose2 {
        &self.previous
    }
    pub fn current(&self) -> &Pose2 {
        &self.current
    }
    /// Decompose the relative motion into rotation, translation, rotation
    pub fn decompose(&self) -> OdometryDelta {
        let dx = self.current[0] - self.previous[0];
        let dy = self.current[1] - self.previous[1];
        let translation = dx.hypot(dy);
        // atan2(0, 0) is undefined for a pure rotation in place
        let first_rotation = if dx == 0.0 && dy == 0.0 {
            0.0
        } else {
            wrap_to_pi(dy.atan2(dx) - self.previous[HEADING])
        };
        let second_rotation =
            wrap_to_pi(self.current[HEADING] - self.previous[HEADING] - first_rotation);
        OdometryDelta {
            first_rotation,
            translation,
            second_rotation,
        }
    }
}

/// Rotation-translation-rotation decomposition of a relative motion
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OdometryDelta {
    /// Rotation toward the direction of travel (rad)
    pub first_rotation: f64,
    /// Straight line distance travelled (m)
    pub translation: f64,
    /// Rotation onto the final heading (rad)
    pub second_rotation: f64,
}

/// Odometry motion model for sampling particle poses
#[derive(Clone, Debug)]
pub struct OdometryMotionModel {
    noise: OdometryNoise,
}
impl OdometryMotionModel {
    /// Create a model with validated calibration constants
    pub fn new(noise: OdometryNoise) -> FilterResult<Self> {
        noise.validate()?;
        Ok(OdometryMotionModel { noise })
    }
    pub fn noise(&self) -> &OdometryNoise {
        &self.noise
    }
    /// Draw a noisy version of the decomposed motion
    pub fn perturb(&self, delta: &OdometryDelta, rng: &mut RandomSource) -> OdometryDelta {
        let OdometryNoise {
            alpha1,
            alpha2,
            alpha3,
            alpha4,
        } = self.noise;
        let rot1 = delta.first_rotation;
        let trans = delta.translation;
        let rot2 = delta.second_rotation;
        OdometryDelta {
            first_rotation: rot1 - rng.gaussian(0.0, alpha1 * rot1.abs() + alpha2 * trans),
            translation: trans
                - rng.gaussian(0.0, alpha3 * trans + alpha4 * (rot1.abs() + rot2.abs())),
            second_rotation: rot2 - rng.gaussian(0.0, alpha1 * rot2.abs() + alpha2 * trans),
        }
    }
    /// Apply one odometry step to a pose
    ///
    /// The noisy motion is composed onto `state`, the particle's belief, not onto the raw odometry
    /// pose; the readings only provide the relative motion.
    pub fn apply(&self, state: &Pose2, reading: &OdometryReading, rng: &mut RandomSource) -> Pose2 {
        let noisy = self.perturb(&reading.decompose(), rng);
        let heading = state[HEADING];
        let direction = heading + noisy.first_rotation;
        Pose2::new(
            state[0] + noisy.translation * direction.cos(),
            state[1] + noisy.translation * direction.sin(),
            wrap_to_pi(heading + noisy.first_rotation + noisy.second_rotation),
        )
    }
}
impl MotionModel<3> for OdometryMotionModel {
    type Control = OdometryReading;

    fn angular_dimensions(&self) -> &[usize] {
        &[HEADING]
    }
    fn sample(&self, state: &Pose2, control: &OdometryReading, rng: &mut RandomSource) -> Pose2 {
        self.apply(state, control, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn reading(previous: (f64, f64, f64), current: (f64, f64, f64)) -> OdometryReading {
        OdometryReading::new(
            Pose2::new(previous.0, previous.1, previous.2),
            Pose2::new(current.0, current.1, current.2),
        )
        .unwrap()
    }

    #[test]
    fn test_decompose_straight_line() {
        let delta = reading((0.0, 0.0, 0.0), (1.0, 0.0, 0.0)).decompose();
        assert_approx_eq!(delta.first_rotation, 0.0, 1e-12);
        assert_approx_eq!(delta.translation, 1.0, 1e-12);
        assert_approx_eq!(delta.second_rotation, 0.0, 1e-12);
    }
    #[test]
    fn test_decompose_turn_then_drive() {
        let delta = reading((1.0, 1.0, 0.0), (1.0, 3.0, PI)).decompose();
        assert_approx_eq!(delta.first_rotation, FRAC_PI_2, 1e-12);
        assert_approx_eq!(delta.translation, 2.0, 1e-12);
        assert_approx_eq!(delta.second_rotation, FRAC_PI_2, 1e-12);
    }
    #[test]
    fn test_decompose_rotation_in_place() {
        let delta = reading((2.0, -1.0, 0.3), (2.0, -1.0, 0.8)).decompose();
        assert_eq!(delta.first_rotation, 0.0);
        assert_eq!(delta.translation, 0.0);
        assert_approx_eq!(delta.second_rotation, 0.5, 1e-12);
        assert!(delta.second_rotation.is_finite());
    }
    #[test]
    fn test_reading_rejects_non_finite() {
        let err = OdometryReading::new(Pose2::new(f64::NAN, 0.0, 0.0), Pose2::zeros());
        assert!(matches!(err, Err(FilterError::InvalidArgument(_))));
    }
    #[test]
    fn test_noise_validation() {
        assert!(OdometryNoise::new(0.1, 0.1, 0.1, 0.1).is_ok());
        assert!(matches!(
            OdometryNoise::new(0.1, -0.1, 0.1, 0.1),
            Err(FilterError::InvalidArgument(_))
        ));
        assert!(OdometryNoise::new(0.1, 0.1, f64::NAN, 0.1).is_err());
        let bad = OdometryNoise {
            alpha4: -1.0,
            ..OdometryNoise::default()
        };
        assert!(OdometryMotionModel::new(bad).is_err());
    }
    #[test]
    fn test_identity_motion_without_noise() {
        let model = OdometryMotionModel::new(OdometryNoise::zero()).unwrap();
        let mut rng = RandomSource::from_seed(42);
        let state = Pose2::new(3.0, -1.5, 2.0);
        let still = reading((5.0, 5.0, 1.0), (5.0, 5.0, 1.0));
        let next = model.apply(&state, &still, &mut rng);
        assert_eq!(next, state);
    }
    #[test]
    fn test_motion_composes_onto_particle_heading() {
        let model = OdometryMotionModel::new(OdometryNoise::zero()).unwrap();
        let mut rng = RandomSource::from_seed(42);
        // Odometry says "drive 1 m forward"; the particle faces +y, so it moves along +y
        let state = Pose2::new(0.0, 0.0, FRAC_PI_2);
        let next = model.apply(&state, &reading((10.0, 10.0, 0.0), (11.0, 10.0, 0.0)), &mut rng);
        assert_approx_eq!(next[0], 0.0, 1e-12);
        assert_approx_eq!(next[1], 1.0, 1e-12);
        assert_approx_eq!(next[2], FRAC_PI_2, 1e-12);
    }
    #[test]
    fn test_heading_stays_normalized() {
        let model = OdometryMotionModel::new(OdometryNoise::zero()).unwrap();
        let mut rng = RandomSource::from_seed(42);
        let state = Pose2::new(0.0, 0.0, PI - 0.1);
        let next = model.apply(&state, &reading((0.0, 0.0, 0.0), (0.0, 0.0, 0.3)), &mut rng);
        assert!(next[2] > -PI && next[2] <= PI);
        assert_approx_eq!(next[2], -PI + 0.2, 1e-12);
    }
    #[test]
    fn test_noise_scales_with_motion() {
        let model = OdometryMotionModel::new(OdometryNoise::new(0.0, 0.0, 0.1, 0.0).unwrap()).unwrap();
        let mut rng = RandomSource::from_seed(7);
        let control = reading((0.0, 0.0, 0.0), (10.0, 0.0, 0.0));
        let n = 5000;
        let xs: Vec<f64> = (0..n)
            .map(|_| model.apply(&Pose2::zeros(), &control, &mut rng)[0])
            .collect();
        let mean = xs.iter().sum::<f64>() / n as f64;
        let std = (xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64).sqrt();
        assert!((mean - 10.0).abs() < 0.05, "mean {mean}");
        // alpha3 * trans = 1.0 m standard deviation along the direction of travel
        assert!((std - 1.0).abs() < 0.05, "std {std}");
    }
    #[test]
    fn test_same_seed_same_trajectory() {
        let model = OdometryMotionModel::new(OdometryNoise::default()).unwrap();
        let control = reading((0.0, 0.0, 0.0), (1.0, 0.5, 0.2));
        let mut a = RandomSource::from_seed(123);
        let mut b = RandomSource::from_seed(123);
        let mut pa = Pose2::zeros();
        let mut pb = Pose2::zeros();
        for _ in 0..10 {
            pa = model.sample(&pa, &control, &mut a);
            pb = model.sample(&pb, &control, &mut b);
        }
        assert_eq!(pa, pb);
    }
}
