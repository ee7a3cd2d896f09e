//!
//! Transition matrix and the expected transition counts used to
//! re-estimate it.
//!
use super::params::HmmParams;
use super::state::N_STATES;
use crate::prob::{safe_log, LogProb};
use log::info;
use serde::{Deserialize, Serialize};

/// `log A[k1][k2]`
pub type LogTransMatrix = [[LogProb; N_STATES]; N_STATES];

///
/// 4x4 transition matrix `A[from][to]`. Every row sums to 1.
///
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransMatrix(pub [[f64; N_STATES]; N_STATES]);

impl TransMatrix {
    pub fn uniform() -> Self {
        TransMatrix([[1.0 / N_STATES as f64; N_STATES]; N_STATES])
    }
    pub fn p(&self, from: usize, to: usize) -> f64 {
        self.0[from][to]
    }
    pub fn row_sum(&self, from: usize) -> f64 {
        self.0[from].iter().sum()
    }
    pub fn to_log(&self) -> LogTransMatrix {
        let mut lt = [[LogProb::Zero; N_STATES]; N_STATES];
        for k1 in 0..N_STATES {
            for k2 in 0..N_STATES {
                lt[k1][k2] = safe_log(self.0[k1][k2]);
            }
        }
        lt
    }
    ///
    /// New transition matrix from the expected transition counts.
    ///
    /// 1. `A[k1][k2] = p[k1][k2] / sum_k p[k1][k]`, entries `<= 0` are
    ///    floored to the minimum positive value. Rows without any counts keep
    ///    their current values.
    /// 2. if the restricted counts are in use, `A[2][2]` and `A[2][3]` are
    ///    split by `p_2_2 : p_2_3` keeping `A[2][2] + A[2][3]`.
    /// 3. `A[2][3] >= min_trans_prob_cs`, and then also
    ///    `A[3][3] >= min_trans_prob_cs`. Raising an entry rescales the rest
    ///    of its row.
    ///
    pub fn reestimate(&self, freqs: &TransFreqs, params: &HmmParams) -> TransMatrix {
        let min = params.precision.min_positive();
        let mut a = self.0;

        for k1 in 0..N_STATES {
            let denominator: f64 = freqs.p[k1].iter().sum();
            if !(denominator > 0.0) {
                continue;
            }
            for k2 in 0..N_STATES {
                a[k1][k2] = freqs.p[k1][k2] / denominator;
                if !(a[k1][k2] > 0.0) {
                    a[k1][k2] = min;
                }
            }
        }

        if params.use_restricted_trans() && freqs.p_2_2 + freqs.p_2_3 > 0.0 {
            let sum_2_23 = a[2][2] + a[2][3];
            let total = freqs.p_2_2 + freqs.p_2_3;
            a[2][2] = (sum_2_23 * freqs.p_2_2 / total).max(min);
            a[2][3] = (sum_2_23 * freqs.p_2_3 / total).max(min);
        }

        let floor = params.min_trans_prob_cs;
        if a[2][3] < floor {
            raise_entry(&mut a[2], 3, floor);
            if a[3][3] < floor {
                raise_entry(&mut a[3], 3, floor);
            }
            info!(
                "Prevented transition probability '2' -> '3' from dropping below min. value of {}",
                floor
            );
        }
        TransMatrix(a)
    }
}

///
/// set `row[j] = value` and scale the other entries so that the row sums to 1
///
fn raise_entry(row: &mut [f64; N_STATES], j: usize, value: f64) {
    let rest: f64 = (0..N_STATES).filter(|&k| k != j).map(|k| row[k]).sum();
    let scale = (1.0 - value) / rest;
    for k in 0..N_STATES {
        if k == j {
            row[k] = value;
        } else if rest > 0.0 {
            row[k] *= scale;
        }
    }
}

impl Default for TransMatrix {
    fn default() -> Self {
        TransMatrix::uniform()
    }
}

impl std::fmt::Display for TransMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        for k1 in 0..N_STATES {
            write!(f, "{}:", k1)?;
            for k2 in 0..N_STATES {
                write!(f, "\t{:.6e}", self.0[k1][k2])?;
            }
            if k1 + 1 < N_STATES {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

///
/// Expected transition counts of a set of intervals
///
/// * `p[k1][k2]`: all positions
/// * `p_2_2`, `p_2_3`: positions whose estimated trials exceed the
///   threshold only
///
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TransFreqs {
    pub p: [[f64; N_STATES]; N_STATES],
    pub p_2_2: f64,
    pub p_2_3: f64,
}

impl TransFreqs {
    pub fn zero() -> Self {
        TransFreqs::default()
    }
}

impl std::ops::AddAssign<&TransFreqs> for TransFreqs {
    fn add_assign(&mut self, other: &TransFreqs) {
        for k1 in 0..N_STATES {
            for k2 in 0..N_STATES {
                self.p[k1][k2] += other.p[k1][k2];
            }
        }
        self.p_2_2 += other.p_2_2;
        self.p_2_3 += other.p_2_3;
    }
}

impl std::ops::Add for TransFreqs {
    type Output = TransFreqs;
    fn add(mut self, other: TransFreqs) -> TransFreqs {
        self += &other;
        self
    }
}

impl std::iter::Sum for TransFreqs {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(TransFreqs::zero(), |a, b| a + b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_rows_sum_to_one(a: &TransMatrix) {
        for k in 0..N_STATES {
            assert_abs_diff_eq!(a.row_sum(k), 1.0, epsilon = 1e-12);
            for l in 0..N_STATES {
                assert!(a.p(k, l) > 0.0);
            }
        }
    }

    #[test]
    fn reestimate_normalizes_and_floors() {
        let mut freqs = TransFreqs::zero();
        freqs.p = [
            [8.0, 1.0, 1.0, 0.0],
            [1.0, 1.0, 1.0, 1.0],
            [0.0, 0.0, 9.0, 1.0],
            [0.0, 0.0, 1.0, 3.0],
        ];
        let params = HmmParams::default();
        let a = TransMatrix::uniform().reestimate(&freqs, &params);
        assert_rows_sum_to_one(&a);
        assert_abs_diff_eq!(a.p(0, 0), 0.8, epsilon = 1e-12);
        assert_eq!(a.p(0, 3), f64::MIN_POSITIVE);
        assert_abs_diff_eq!(a.p(2, 3), 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(a.p(3, 3), 0.75, epsilon = 1e-12);
    }
    #[test]
    fn reestimate_keeps_rows_without_counts() {
        let mut freqs = TransFreqs::zero();
        freqs.p[0] = [1.0, 1.0, 0.0, 0.0];
        let a = TransMatrix::uniform().reestimate(&freqs, &HmmParams::default());
        assert_eq!(a.0[1], [0.25; 4]);
        assert_abs_diff_eq!(a.p(0, 1), 0.5, epsilon = 1e-12);
    }
    #[test]
    fn reestimate_enforces_crosslink_floor() {
        let mut freqs = TransFreqs::zero();
        freqs.p = [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
        ];
        let mut params = HmmParams::default();
        params.min_trans_prob_cs = 0.01;
        let a = TransMatrix::uniform().reestimate(&freqs, &params);
        assert_rows_sum_to_one(&a);
        assert!(a.p(2, 3) >= params.min_trans_prob_cs);
        assert!(a.p(3, 3) >= params.min_trans_prob_cs);
        assert_abs_diff_eq!(a.p(2, 3), 0.01, epsilon = 1e-15);
    }
    #[test]
    fn reestimate_restricted_split() {
        let mut freqs = TransFreqs::zero();
        freqs.p = [
            [1.0, 1.0, 1.0, 1.0],
            [1.0, 1.0, 1.0, 1.0],
            [2.0, 0.0, 6.0, 2.0],
            [1.0, 1.0, 1.0, 1.0],
        ];
        freqs.p_2_2 = 1.0;
        freqs.p_2_3 = 3.0;
        let mut params = HmmParams::default();
        params.n_threshold_for_trans_p = 5.0;
        let a = TransMatrix::uniform().reestimate(&freqs, &params);
        assert_rows_sum_to_one(&a);
        // A[2][2] + A[2][3] = 0.8 split as 1:3
        assert_abs_diff_eq!(a.p(2, 2), 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(a.p(2, 3), 0.6, epsilon = 1e-12);
    }
    #[test]
    fn freqs_sum() {
        let mut x = TransFreqs::zero();
        x.p[1][2] = 0.5;
        x.p_2_3 = 1.0;
        let s: TransFreqs = vec![x, x, x].into_iter().sum();
        assert_abs_diff_eq!(s.p[1][2], 1.5);
        assert_abs_diff_eq!(s.p_2_3, 3.0);
    }
}
