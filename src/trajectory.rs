use std::fmt;
use std::fmt::Formatter;

use nalgebra::{DMatrix, DVector};

use crate::basis::Basis;
use crate::polynomial::Polynomial;

/// A value of the trajectory (or one of its derivatives) at time `t`
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub t: f64,
    pub value: DVector<f64>,
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Sample(t: {}, value: [", self.t)?;
        for (i, v) in self.value.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, "])")
    }
}

/// Piecewise polynomial over the breakpoints `0, T, 2T, ...`
///
/// Each piece holds one polynomial per dimension in the local time of its interval, i.e. piece
/// `i` is evaluated at `t - breakpoints[i]`.
#[derive(Debug, Clone)]
pub struct Trajectory {
    breakpoints: Vec<f64>,
    pieces: Vec<Vec<Polynomial>>,
    control_points: Vec<DMatrix<f64>>,
}

impl Trajectory {
    /// Builds the trajectory from per-piece control points, each an `order × dims` matrix with
    /// one point per row
    pub fn from_control_points(basis: &Basis, control_points: Vec<DMatrix<f64>>) -> Trajectory {
        let timescale = basis.timescale();
        let breakpoints = (0..=control_points.len())
            .map(|i| i as f64 * timescale)
            .collect();

        let pieces = control_points
            .iter()
            .map(|points| {
                points
                    .column_iter()
                    .map(|column| {
                        let coeffs = basis.coefficients(&column.into_owned());
                        Polynomial::new(coeffs.as_slice())
                    })
                    .collect()
            })
            .collect();

        Trajectory {
            breakpoints,
            pieces,
            control_points,
        }
    }

    /// `0, T, ..., steps * T`
    pub fn breakpoints(&self) -> &[f64] {
        &self.breakpoints
    }

    pub fn num_pieces(&self) -> usize {
        self.pieces.len()
    }

    pub fn dims(&self) -> usize {
        self.pieces.first().map_or(0, |p| p.len())
    }

    /// Total duration, the last breakpoint
    pub fn duration(&self) -> f64 {
        self.breakpoints.last().copied().unwrap_or(0.0)
    }

    /// Monomial polynomials of piece `step`, one per dimension
    pub fn piece(&self, step: usize) -> &[Polynomial] {
        &self.pieces[step]
    }

    /// Control points of piece `step`, one point per row
    pub fn control_points(&self, step: usize) -> &DMatrix<f64> {
        &self.control_points[step]
    }

    /// Index of the piece that covers time t, times outside the trajectory map to the first
    /// or last piece
    pub fn piece_index(&self, t: f64) -> Option<usize> {
        if self.pieces.is_empty() {
            return None;
        }
        if t <= self.breakpoints[0] {
            return Some(0);
        }
        let last = self.pieces.len() - 1;
        Some(
            (0..last)
                .find(|&i| t <= self.breakpoints[i + 1])
                .unwrap_or(last),
        )
    }

    /// Returns the `derivative`-th derivative of the trajectory at time t, clamped to the
    /// trajectory's time range
    ///
    /// # Arguments
    ///
    /// `t` - time
    /// `derivative` - derivative order, 0 for position, 1 for velocity, etc.
    pub fn value(&self, t: f64, derivative: usize) -> Option<Sample> {
        let idx = self.piece_index(t)?;
        let t = t.clamp(0.0, self.duration());
        let local = t - self.breakpoints[idx];

        let value = DVector::from_iterator(
            self.pieces[idx].len(),
            self.pieces[idx]
                .iter()
                .map(|poly| poly.nth_derivative(derivative).eval(local)),
        );
        Some(Sample { t, value })
    }

    /// Convenience function to return the position on the trajectory
    pub fn position(&self, t: f64) -> Option<Sample> {
        self.value(t, 0)
    }

    /// Convenience function to return the velocity on the trajectory
    pub fn velocity(&self, t: f64) -> Option<Sample> {
        self.value(t, 1)
    }

    /// Convenience function to return the acceleration on the trajectory
    pub fn acceleration(&self, t: f64) -> Option<Sample> {
        self.value(t, 2)
    }

    /// Convenience function to return the jerk on the trajectory
    pub fn jerk(&self, t: f64) -> Option<Sample> {
        self.value(t, 3)
    }

    /// Samples `start, start + step, ...` up to and including `end`
    ///
    /// # Panics
    ///
    /// When `end <= start` or `step <= 0`.
    ///
    /// # Examples
    ///
    /// ```
    /// use corridor_trajgen::{Basis, Trajectory};
    /// use nalgebra::DMatrix;
    /// // a single straight piece from 0 to 3
    /// let basis = Basis::new(1, 0, 1.0);
    /// let traj = Trajectory::from_control_points(
    ///     &basis,
    ///     vec![DMatrix::from_row_slice(2, 1, &[0.0, 3.0])],
    /// );
    /// let positions = traj.values(0.0, 1.0, 0.25, 0);
    /// assert_eq!(5, positions.len());
    /// ```
    pub fn values(&self, start: f64, end: f64, step: f64, derivative: usize) -> Vec<Sample> {
        if end <= start {
            panic!("End must not be before start");
        }

        if step <= 0. {
            panic!("Step must be positive");
        }

        // count from the range rather than accumulating, so `end` is hit despite roundoff
        let count = ((end - start) / step + 1e-9).floor() as usize + 1;
        (0..count)
            .filter_map(|i| self.value(start + i as f64 * step, derivative))
            .collect()
    }

    /// Convenience function to sample positions on the trajectory
    pub fn positions(&self, start: f64, end: f64, step: f64) -> Vec<Sample> {
        self.values(start, end, step, 0)
    }

    /// Convenience function to sample velocities on the trajectory
    pub fn velocities(&self, start: f64, end: f64, step: f64) -> Vec<Sample> {
        self.values(start, end, step, 1)
    }

    /// Convenience function to sample accelerations on the trajectory
    pub fn accelerations(&self, start: f64, end: f64, step: f64) -> Vec<Sample> {
        self.values(start, end, step, 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert::close;

    /// Two cubic pieces, 2D, each lasting 0.5: x goes 0 -> 1 -> 3 linearly-ish, y is constant
    fn two_pieces() -> Trajectory {
        let basis = Basis::new(3, 2, 0.5);
        Trajectory::from_control_points(
            &basis,
            vec![
                DMatrix::from_row_slice(4, 2, &[0.0, 2.0, 0.0, 2.0, 0.5, 2.0, 1.0, 2.0]),
                DMatrix::from_row_slice(4, 2, &[1.0, 2.0, 1.5, 2.0, 2.0, 2.0, 3.0, 2.0]),
            ],
        )
    }

    #[test]
    fn breakpoints_and_shape() {
        let traj = two_pieces();
        assert_eq!(vec![0.0, 0.5, 1.0], traj.breakpoints().to_vec());
        assert_eq!(2, traj.num_pieces());
        assert_eq!(2, traj.dims());
        close(1.0, traj.duration(), 1e-12);
        assert_eq!(4, traj.piece(1)[0].order());
        assert_eq!(3.0, traj.control_points(1)[(3, 0)]);
    }

    #[test]
    fn piece_index_empty() {
        let traj = Trajectory::from_control_points(&Basis::new(3, 2, 1.0), vec![]);
        assert_eq!(None, traj.piece_index(0.3));
        assert_eq!(None, traj.position(0.3));
    }

    #[test]
    fn piece_index() {
        let traj = two_pieces();

        // before start time
        assert_eq!(Some(0), traj.piece_index(-1.23));

        // after end time
        assert_eq!(Some(1), traj.piece_index(5.23));

        // inside each piece
        assert_eq!(Some(0), traj.piece_index(0.25));
        assert_eq!(Some(1), traj.piece_index(0.75));

        // on the breakpoints
        assert_eq!(Some(0), traj.piece_index(0.));
        assert_eq!(Some(0), traj.piece_index(0.5));
        assert_eq!(Some(1), traj.piece_index(1.));
    }

    #[test]
    fn interpolates_end_control_points() {
        let traj = two_pieces();
        let delta = 1e-9;

        close(0., traj.position(0.).unwrap().value[0], delta);
        close(1., traj.position(0.5).unwrap().value[0], delta);
        close(3., traj.position(1.).unwrap().value[0], delta);
        close(2., traj.position(0.8).unwrap().value[1], delta);

        // start velocity is degree / T times the first control point difference
        close(0., traj.velocity(0.).unwrap().value[0], delta);
        close(6. * 1., traj.velocity(1.).unwrap().value[0], delta);
        close(0., traj.acceleration(0.3).unwrap().value[1], delta);
        close(0., traj.jerk(0.9).unwrap().value[1], delta);
    }

    #[test]
    fn clamps_outside_range() {
        let traj = two_pieces();
        let before = traj.position(-2.).unwrap();
        assert_eq!(0., before.t);
        close(0., before.value[0], 1e-9);

        let after = traj.position(4.).unwrap();
        assert_eq!(1., after.t);
        close(3., after.value[0], 1e-9);
    }

    #[test]
    fn sampled_values() {
        let traj = two_pieces();

        let points = traj.values(0., 1., 0.1, 0);
        assert_eq!(11, points.len());
        close(1., points[10].t, 1e-12);

        // should also be able to sample outside of the range with no issues
        let points = traj.values(-1., 2., 0.25, 0);
        assert_eq!(13, points.len());
        assert_eq!(1., points[12].t);

        assert_eq!(11, traj.positions(0., 1., 0.1).len());
        assert_eq!(11, traj.velocities(0., 1., 0.1).len());
        assert_eq!(11, traj.accelerations(0., 1., 0.1).len());
    }

    #[test]
    #[should_panic]
    fn values_bad_range() {
        two_pieces().values(2., 1., 0.2, 0);
    }

    #[test]
    #[should_panic]
    fn values_bad_step() {
        two_pieces().values(1., 2., -0.2, 0);
    }

    #[test]
    fn sample_print() {
        let sample = Sample {
            t: 0.5,
            value: DVector::from_vec(vec![1.0, -2.5]),
        };
        assert_eq!("Sample(t: 0.5, value: [1, -2.5])", format!("{}", sample));
    }
}
