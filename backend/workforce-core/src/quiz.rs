// src/quiz.rs
//
// Key-based aptitude sections: ketelitian, hitungan, deret, analogy, numeric.
use rand::seq::SliceRandom;
use rand::Rng;
use rust_decimal::Decimal;

use crate::error::AppError;
use crate::psychotest::{AnswerKey, Question};
use crate::question_bank::ANALOGIES;

pub const KETELITIAN_ITEMS: usize = 20;
pub const HITUNGAN_ITEMS: usize = 20;
pub const DERET_ITEMS: usize = 10;
pub const ANALOGY_ITEMS: usize = 10;
pub const NUMERIC_ITEMS: usize = 15;

const SAME: &str = "Same";
const DIFFERENT: &str = "Different";
// no 0/O or 1/I
const CODE_CHARS: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Correct answers as a percentage of `total`, two decimals.
pub fn percentage(correct: usize, total: usize) -> Decimal {
    if total == 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(correct as u64) * Decimal::ONE_HUNDRED / Decimal::from(total as u64)).round_dp(2)
}

/// Counts answers equal to the key. Unanswered items count as wrong.
pub fn count_correct<T: PartialEq>(key: &[T], answers: &[Option<T>]) -> Result<usize, AppError> {
    if key.len() != answers.len() {
        return Err(AppError::invalid(
            "answers",
            format!("Expected {} answers, got {}.", key.len(), answers.len()),
        ));
    }
    Ok(key
        .iter()
        .zip(answers)
        .filter(|(k, a)| a.as_ref() == Some(*k))
        .count())
}

fn random_code(rng: &mut impl Rng) -> Vec<u8> {
    let len = rng.gen_range(6..=9);
    (0..len)
        .map(|_| CODE_CHARS[rng.gen_range(0..CODE_CHARS.len())])
        .collect()
}

/// Pairs of codes that are either identical or differ in exactly one character.
pub fn ketelitian(rng: &mut impl Rng) -> (Vec<Question>, AnswerKey) {
    let mut questions = Vec::with_capacity(KETELITIAN_ITEMS);
    let mut correct = Vec::with_capacity(KETELITIAN_ITEMS);
    for _ in 0..KETELITIAN_ITEMS {
        let left = random_code(rng);
        let mut right = left.clone();
        let differs = rng.gen_bool(0.5);
        if differs {
            let pos = rng.gen_range(0..right.len());
            let original = right[pos];
            while right[pos] == original {
                right[pos] = CODE_CHARS[rng.gen_range(0..CODE_CHARS.len())];
            }
        }
        questions.push(Question::Choice {
            prompt: format!(
                "{}  |  {}",
                String::from_utf8_lossy(&left),
                String::from_utf8_lossy(&right)
            ),
            options: vec![SAME.to_string(), DIFFERENT.to_string()],
        });
        correct.push(usize::from(differs));
    }
    (questions, AnswerKey::Options { correct })
}

/// `a op b` over the four operators; division is always exact.
pub fn hitungan(rng: &mut impl Rng) -> (Vec<Question>, AnswerKey) {
    let mut questions = Vec::with_capacity(HITUNGAN_ITEMS);
    let mut correct = Vec::with_capacity(HITUNGAN_ITEMS);
    for _ in 0..HITUNGAN_ITEMS {
        let (prompt, answer) = match rng.gen_range(0..4) {
            0 => {
                let (a, b) = (rng.gen_range(10..100), rng.gen_range(10..100));
                (format!("{} + {}", a, b), a + b)
            }
            1 => {
                let (x, y): (i64, i64) = (rng.gen_range(10..100), rng.gen_range(10..100));
                let (a, b) = (x.max(y), x.min(y));
                (format!("{} - {}", a, b), a - b)
            }
            2 => {
                let (a, b) = (rng.gen_range(2..20), rng.gen_range(2..20));
                (format!("{} × {}", a, b), a * b)
            }
            _ => {
                let (b, q): (i64, i64) = (rng.gen_range(2..13), rng.gen_range(2..20));
                (format!("{} ÷ {}", b * q, b), q)
            }
        };
        questions.push(Question::Entry {
            prompt: format!("{} = ?", prompt),
        });
        correct.push(answer);
    }
    (questions, AnswerKey::Values { correct })
}

/// Five shown terms; the answer is the sixth.
pub fn series_terms(rng: &mut impl Rng) -> Vec<i64> {
    match rng.gen_range(0..4) {
        // arithmetic
        0 => {
            let (start, step): (i64, i64) = (rng.gen_range(1..20), rng.gen_range(2..10));
            (0..6).map(|i| start + i * step).collect()
        }
        // geometric
        1 => {
            let (start, ratio): (i64, i64) = (rng.gen_range(1..6), rng.gen_range(2..4));
            (0..6u32).map(|i| start * ratio.pow(i)).collect()
        }
        // two interleaved arithmetic series
        2 => {
            let (a, da): (i64, i64) = (rng.gen_range(1..10), rng.gen_range(1..6));
            let (b, db): (i64, i64) = (rng.gen_range(10..30), rng.gen_range(1..6));
            (0..6)
                .map(|i| if i % 2 == 0 { a + (i / 2) * da } else { b + (i / 2) * db })
                .collect()
        }
        // fibonacci-like
        _ => {
            let mut terms: Vec<i64> = vec![rng.gen_range(1..10), rng.gen_range(1..10)];
            while terms.len() < 6 {
                let next = terms[terms.len() - 1] + terms[terms.len() - 2];
                terms.push(next);
            }
            terms
        }
    }
}

pub fn deret(rng: &mut impl Rng) -> (Vec<Question>, AnswerKey) {
    let mut questions = Vec::with_capacity(DERET_ITEMS);
    let mut correct = Vec::with_capacity(DERET_ITEMS);
    for _ in 0..DERET_ITEMS {
        let terms = series_terms(rng);
        let shown: Vec<String> = terms[..5].iter().map(i64::to_string).collect();
        questions.push(Question::Entry {
            prompt: format!("{}, ?", shown.join(", ")),
        });
        correct.push(terms[5]);
    }
    (questions, AnswerKey::Values { correct })
}

/// Puts the right option among the distractors and returns its index.
fn shuffle_options(rng: &mut impl Rng, right: String, distractors: Vec<String>) -> (Vec<String>, usize) {
    let mut options = distractors;
    options.push(right.clone());
    options.shuffle(rng);
    let index = options.iter().position(|o| *o == right).unwrap_or(0);
    (options, index)
}

pub fn analogy(rng: &mut impl Rng) -> (Vec<Question>, AnswerKey) {
    let count = ANALOGY_ITEMS.min(ANALOGIES.len());
    let picked: Vec<usize> = rand::seq::index::sample(rng, ANALOGIES.len(), count).into_vec();
    let mut questions = Vec::with_capacity(count);
    let mut correct = Vec::with_capacity(count);
    for index in picked {
        let item = &ANALOGIES[index];
        let others: Vec<&str> = ANALOGIES
            .iter()
            .enumerate()
            .filter(|(i, other)| *i != index && other.d != item.d)
            .map(|(_, other)| other.d)
            .collect();
        let distractors = others
            .choose_multiple(rng, 3)
            .map(|d| d.to_string())
            .collect();
        let (options, right) = shuffle_options(rng, item.d.to_string(), distractors);
        questions.push(Question::Choice {
            prompt: format!("{} : {} = {} : ?", item.a, item.b, item.c),
            options,
        });
        correct.push(right);
    }
    (questions, AnswerKey::Options { correct })
}

/// Three distinct values within ±10 of the answer, never the answer itself.
fn near_values(rng: &mut impl Rng, answer: i64) -> Vec<String> {
    let mut values: Vec<i64> = Vec::with_capacity(3);
    while values.len() < 3 {
        let offset = rng.gen_range(1..=10) * if rng.gen_bool(0.5) { 1 } else { -1 };
        let candidate = answer + offset;
        if candidate >= 0 && !values.contains(&candidate) {
            values.push(candidate);
        }
    }
    values.iter().map(i64::to_string).collect()
}

pub fn numeric(rng: &mut impl Rng) -> (Vec<Question>, AnswerKey) {
    const PERCENTS: [i64; 5] = [10, 20, 25, 50, 75];
    let mut questions = Vec::with_capacity(NUMERIC_ITEMS);
    let mut correct = Vec::with_capacity(NUMERIC_ITEMS);
    for _ in 0..NUMERIC_ITEMS {
        let (prompt, answer) = if rng.gen_bool(0.5) {
            let percent = PERCENTS[rng.gen_range(0..PERCENTS.len())];
            let base: i64 = rng.gen_range(1..21) * 20;
            (format!("{}% of {} = ?", percent, base), base * percent / 100)
        } else {
            let (a, b, c): (i64, i64, i64) =
                (rng.gen_range(2..13), rng.gen_range(2..13), rng.gen_range(1..50));
            (format!("{} × {} + {} = ?", a, b, c), a * b + c)
        };
        let distractors = near_values(rng, answer);
        let (options, right) = shuffle_options(rng, answer.to_string(), distractors);
        questions.push(Question::Choice { prompt, options });
        correct.push(right);
    }
    (questions, AnswerKey::Options { correct })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rust_decimal_macros::dec;

    #[test]
    fn percentage_rounds_to_two_decimals() {
        assert_eq!(percentage(2, 3), dec!(66.67));
        assert_eq!(percentage(20, 20), dec!(100));
        assert_eq!(percentage(0, 0), Decimal::ZERO);
    }

    #[test]
    fn unanswered_items_are_wrong() {
        let key = [1, 0, 1];
        assert_eq!(count_correct(&key, &[Some(1), None, Some(0)]).unwrap(), 1);
        assert!(count_correct(&key, &[Some(1)]).is_err());
    }

    #[test]
    fn ketelitian_key_matches_pairs() {
        let (questions, key) = ketelitian(&mut StdRng::seed_from_u64(3));
        let AnswerKey::Options { correct } = key else {
            panic!("expected option key");
        };
        for (question, answer) in questions.iter().zip(correct) {
            let Question::Choice { prompt, .. } = question else {
                panic!("expected choice question");
            };
            let (left, right) = prompt.split_once("  |  ").unwrap();
            assert_eq!(left != right, answer == 1, "{}", prompt);
        }
    }

    #[test]
    fn hitungan_division_is_exact() {
        let (questions, key) = hitungan(&mut StdRng::seed_from_u64(11));
        let AnswerKey::Values { correct } = key else {
            panic!("expected value key");
        };
        for (question, answer) in questions.iter().zip(correct) {
            let Question::Entry { prompt } = question else {
                panic!("expected entry question");
            };
            if let Some((a, rest)) = prompt.split_once(" ÷ ") {
                let b: i64 = rest.trim_end_matches(" = ?").parse().unwrap();
                assert_eq!(a.parse::<i64>().unwrap(), b * answer);
            }
        }
    }

    #[test]
    fn every_series_kind_continues_its_rule() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..50 {
            let t = series_terms(&mut rng);
            let arithmetic = t.windows(2).all(|w| w[1] - w[0] == t[1] - t[0]);
            let geometric = t.windows(2).all(|w| w[1] == w[0] * (t[1] / t[0]));
            let interleaved = t[2] - t[0] == t[4] - t[2] && t[3] - t[1] == t[5] - t[3];
            let fibonacci = t.windows(3).all(|w| w[2] == w[0] + w[1]);
            assert!(arithmetic || geometric || interleaved || fibonacci, "{:?}", t);
        }
    }

    #[test]
    fn multiple_choice_options_hold_exactly_one_answer() {
        let mut rng = StdRng::seed_from_u64(9);
        let sections = vec![analogy(&mut rng), numeric(&mut rng)];
        for (questions, key) in sections {
            let AnswerKey::Options { correct } = key else {
                panic!("expected option key");
            };
            for (question, right) in questions.iter().zip(correct) {
                let Question::Choice { options, .. } = question else {
                    panic!("expected choice question");
                };
                assert_eq!(options.len(), 4);
                assert!(right < 4);
                let mut unique = options.clone();
                unique.sort();
                unique.dedup();
                assert_eq!(unique.len(), 4, "{:?}", options);
            }
        }
    }
}
