// src/kraepelin.rs
//
// Kraepelin (Pauli-style) addition test: columns of single digits, each answer
// is the last digit of the sum of two adjacent digits.
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const COLUMNS: usize = 10;
pub const DIGITS_PER_COLUMN: usize = 21;

pub fn generate(rng: &mut impl Rng) -> (Vec<Vec<u8>>, Vec<Vec<u8>>) {
    let columns: Vec<Vec<u8>> = (0..COLUMNS)
        .map(|_| (0..DIGITS_PER_COLUMN).map(|_| rng.gen_range(0..10)).collect())
        .collect();
    let key = columns.iter().map(|c| answers_for(c)).collect();
    (columns, key)
}

pub fn answers_for(column: &[u8]) -> Vec<u8> {
    column.windows(2).map(|pair| (pair[0] + pair[1]) % 10).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KraepelinReport {
    pub answered: Vec<u32>,
    pub correct: Vec<u32>,
    /// Mean answered per column.
    pub speed: Decimal,
    /// Answered but wrong, over all columns.
    pub errors: u32,
    /// Highest minus lowest answered count.
    pub range: u32,
    /// Mean answered in the second half minus the first half.
    pub endurance: Decimal,
}

fn mean(values: &[u32]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    let sum: u32 = values.iter().sum();
    (Decimal::from(sum) / Decimal::from(values.len() as u32)).round_dp(2)
}

/// Each submitted column holds the answers written so far, top to bottom;
/// a shorter column means the employee ran out of time.
pub fn score(key: &[Vec<u8>], submitted: &[Vec<u8>]) -> Result<(Decimal, KraepelinReport), AppError> {
    if submitted.len() != key.len() {
        return Err(AppError::invalid(
            "columns",
            format!("Expected {} columns of answers.", key.len()),
        ));
    }
    let mut answered = Vec::with_capacity(key.len());
    let mut correct = Vec::with_capacity(key.len());
    for (expected, given) in key.iter().zip(submitted) {
        if given.len() > expected.len() {
            return Err(AppError::invalid(
                "columns",
                format!("A column has at most {} answers.", expected.len()),
            ));
        }
        answered.push(given.len() as u32);
        correct.push(expected.iter().zip(given).filter(|(e, g)| e == g).count() as u32);
    }

    let total_answered: u32 = answered.iter().sum();
    let total_correct: u32 = correct.iter().sum();
    let possible: usize = key.iter().map(Vec::len).sum();
    let half = answered.len() / 2;
    let report = KraepelinReport {
        speed: mean(&answered),
        errors: total_answered - total_correct,
        range: answered.iter().max().copied().unwrap_or(0) - answered.iter().min().copied().unwrap_or(0),
        endurance: mean(&answered[half..]) - mean(&answered[..half]),
        answered,
        correct,
    };
    Ok((crate::quiz::percentage(total_correct as usize, possible), report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rust_decimal_macros::dec;

    #[test]
    fn answers_are_last_digit_of_adjacent_sums() {
        assert_eq!(answers_for(&[7, 8, 2, 0, 9]), vec![5, 0, 2, 9]);
    }

    #[test]
    fn same_seed_same_sheet() {
        let a = generate(&mut StdRng::seed_from_u64(42));
        let b = generate(&mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
        assert_eq!(a.0.len(), COLUMNS);
        assert_eq!(a.1[0].len(), DIGITS_PER_COLUMN - 1);
    }

    #[test]
    fn report_tracks_speed_errors_range_and_endurance() {
        let key = vec![vec![1, 2, 3, 4], vec![5, 6, 7, 8], vec![9, 0, 1, 2], vec![3, 4, 5, 6]];
        let submitted = vec![
            vec![1, 2, 3, 4],
            vec![5, 6, 0],
            vec![9, 0],
            vec![3],
        ];
        let (score, report) = score(&key, &submitted).unwrap();
        assert_eq!(report.answered, vec![4, 3, 2, 1]);
        assert_eq!(report.correct, vec![4, 2, 2, 1]);
        assert_eq!(report.errors, 1);
        assert_eq!(report.range, 3);
        assert_eq!(report.speed, dec!(2.5));
        assert_eq!(report.endurance, dec!(-2));
        // 9 of 16 cells right
        assert_eq!(score, dec!(56.25));
    }

    #[test]
    fn wrong_shape_is_rejected() {
        let key = vec![vec![1, 2], vec![3, 4]];
        assert!(score(&key, &[vec![1]]).is_err());
        assert!(score(&key, &[vec![1, 2, 3], vec![]]).is_err());
    }
}
