// src/profiles.rs
//
// Sections without a right answer: DISC, personality (Likert) and Wartegg.
use rand::seq::SliceRandom;
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::psychotest::{AnswerKey, Question};
use crate::question_bank::{DISC_GROUPS, PERSONALITY_ITEMS, WARTEGG_BOXES};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DiscLetter {
    D,
    I,
    S,
    C,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscCounts {
    pub d: i32,
    pub i: i32,
    pub s: i32,
    pub c: i32,
}

impl DiscCounts {
    fn slot(&mut self, letter: DiscLetter) -> &mut i32 {
        match letter {
            DiscLetter::D => &mut self.d,
            DiscLetter::I => &mut self.i,
            DiscLetter::S => &mut self.s,
            DiscLetter::C => &mut self.c,
        }
    }

    pub fn get(&self, letter: DiscLetter) -> i32 {
        match letter {
            DiscLetter::D => self.d,
            DiscLetter::I => self.i,
            DiscLetter::S => self.s,
            DiscLetter::C => self.c,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscProfile {
    pub most: DiscCounts,
    pub least: DiscCounts,
    /// most − least
    pub net: DiscCounts,
    /// Highest net score; ties go to the earlier letter in D, I, S, C.
    pub dominant: DiscLetter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscPick {
    pub most: usize,
    pub least: usize,
}

/// Statements of every group in a shuffled order; the key remembers the letters.
pub fn disc(rng: &mut impl Rng) -> (Vec<Question>, AnswerKey) {
    let mut questions = Vec::with_capacity(DISC_GROUPS.len());
    let mut letters: Vec<Vec<DiscLetter>> = Vec::with_capacity(DISC_GROUPS.len());
    for group in DISC_GROUPS {
        let mut group = group.to_vec();
        group.shuffle(rng);
        questions.push(Question::Disc {
            statements: group.iter().map(|(text, _)| text.to_string()).collect(),
        });
        letters.push(group.iter().map(|(_, letter)| *letter).collect());
    }
    (questions, AnswerKey::Disc { letters })
}

pub fn score_disc(letters: &[Vec<DiscLetter>], picks: &[DiscPick]) -> Result<DiscProfile, AppError> {
    if letters.len() != picks.len() {
        return Err(AppError::invalid(
            "picks",
            format!("Expected {} picks, got {}.", letters.len(), picks.len()),
        ));
    }
    let mut most = DiscCounts::default();
    let mut least = DiscCounts::default();
    for (group, pick) in letters.iter().zip(picks) {
        if pick.most == pick.least || pick.most >= group.len() || pick.least >= group.len() {
            return Err(AppError::invalid(
                "picks",
                "Most and least must be two different statements of the group.",
            ));
        }
        *most.slot(group[pick.most]) += 1;
        *least.slot(group[pick.least]) += 1;
    }
    let mut net = DiscCounts::default();
    for letter in [DiscLetter::D, DiscLetter::I, DiscLetter::S, DiscLetter::C] {
        *net.slot(letter) = most.get(letter) - least.get(letter);
    }
    let dominant = [DiscLetter::D, DiscLetter::I, DiscLetter::S, DiscLetter::C]
        .into_iter()
        .fold(DiscLetter::D, |best, letter| {
            if net.get(letter) > net.get(best) {
                letter
            } else {
                best
            }
        });
    Ok(DiscProfile {
        most,
        least,
        net,
        dominant,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trait {
    Openness,
    Conscientiousness,
    Extraversion,
    Agreeableness,
    Stability,
}

impl Trait {
    pub const ALL: [Trait; 5] = [
        Trait::Openness,
        Trait::Conscientiousness,
        Trait::Extraversion,
        Trait::Agreeableness,
        Trait::Stability,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitScore {
    pub name: Trait,
    /// Mean rating on the 1–5 scale after reverse keying.
    pub mean: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalityItem {
    pub name: Trait,
    pub reversed: bool,
}

pub fn personality(rng: &mut impl Rng) -> (Vec<Question>, AnswerKey) {
    let mut items = PERSONALITY_ITEMS.to_vec();
    items.shuffle(rng);
    let questions = items
        .iter()
        .map(|(statement, _, _)| Question::Likert {
            statement: statement.to_string(),
        })
        .collect();
    let items = items
        .iter()
        .map(|(_, name, reversed)| PersonalityItem {
            name: *name,
            reversed: *reversed,
        })
        .collect();
    (questions, AnswerKey::Personality { items })
}

pub fn score_personality(items: &[PersonalityItem], ratings: &[u8]) -> Result<Vec<TraitScore>, AppError> {
    if items.len() != ratings.len() {
        return Err(AppError::invalid(
            "ratings",
            format!("Expected {} ratings, got {}.", items.len(), ratings.len()),
        ));
    }
    if ratings.iter().any(|r| !(1..=5).contains(r)) {
        return Err(AppError::invalid("ratings", "Each rating must be between 1 and 5."));
    }
    let scores = Trait::ALL
        .into_iter()
        .filter_map(|name| {
            let keyed: Vec<u32> = items
                .iter()
                .zip(ratings)
                .filter(|(item, _)| item.name == name)
                .map(|(item, r)| if item.reversed { 6 - *r as u32 } else { *r as u32 })
                .collect();
            if keyed.is_empty() {
                return None;
            }
            let sum: u32 = keyed.iter().sum();
            Some(TraitScore {
                name,
                mean: (Decimal::from(sum) / Decimal::from(keyed.len() as u32)).round_dp(2),
            })
        })
        .collect();
    Ok(scores)
}

pub fn wartegg() -> (Vec<Question>, AnswerKey) {
    let questions = WARTEGG_BOXES
        .iter()
        .enumerate()
        .map(|(i, stimulus)| Question::Drawing {
            box_number: i as u8 + 1,
            stimulus: stimulus.to_string(),
        })
        .collect();
    (questions, AnswerKey::Wartegg)
}

pub fn check_wartegg_boxes(boxes: &[String]) -> Result<(), AppError> {
    if boxes.len() != WARTEGG_BOXES.len() || boxes.iter().any(|b| b.trim().is_empty()) {
        return Err(AppError::invalid(
            "boxes",
            format!("All {} boxes must be described.", WARTEGG_BOXES.len()),
        ));
    }
    Ok(())
}

/// Mean of the staff's per-box scores (1–5).
pub fn score_wartegg(box_scores: &[u8]) -> Result<Decimal, AppError> {
    if box_scores.len() != WARTEGG_BOXES.len() || box_scores.iter().any(|s| !(1..=5).contains(s)) {
        return Err(AppError::invalid(
            "box_scores",
            format!("Score each of the {} boxes from 1 to 5.", WARTEGG_BOXES.len()),
        ));
    }
    let sum: u32 = box_scores.iter().map(|s| *s as u32).sum();
    Ok((Decimal::from(sum) / Decimal::from(box_scores.len() as u32)).round_dp(2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn disc_profile_is_most_minus_least() {
        use DiscLetter::*;
        let letters = vec![vec![D, I, S, C], vec![C, S, I, D], vec![I, D, C, S]];
        let picks = [
            DiscPick { most: 0, least: 3 }, // D / C
            DiscPick { most: 3, least: 0 }, // D / C
            DiscPick { most: 0, least: 1 }, // I / D
        ];
        let profile = score_disc(&letters, &picks).unwrap();
        assert_eq!(profile.most, DiscCounts { d: 2, i: 1, s: 0, c: 0 });
        assert_eq!(profile.net, DiscCounts { d: 1, i: 1, s: 0, c: -2 });
        assert_eq!(profile.dominant, D);

        let same = [DiscPick { most: 1, least: 1 }; 3];
        assert!(score_disc(&letters, &same).is_err());
    }

    #[test]
    fn reverse_keyed_items_flip_the_rating() {
        let items = [
            PersonalityItem { name: Trait::Stability, reversed: false },
            PersonalityItem { name: Trait::Stability, reversed: true },
            PersonalityItem { name: Trait::Openness, reversed: false },
        ];
        let scores = score_personality(&items, &[4, 1, 3]).unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0], TraitScore { name: Trait::Openness, mean: dec!(3) });
        // 4 and (6 - 1)
        assert_eq!(scores[1], TraitScore { name: Trait::Stability, mean: dec!(4.5) });
        assert!(score_personality(&items, &[4, 0, 3]).is_err());
    }

    #[test]
    fn wartegg_needs_all_eight_boxes() {
        let boxes: Vec<String> = (1..=8).map(|i| format!("drawing {}", i)).collect();
        assert!(check_wartegg_boxes(&boxes).is_ok());
        assert!(check_wartegg_boxes(&boxes[..7]).is_err());
        assert_eq!(score_wartegg(&[3, 4, 5, 2, 3, 4, 5, 4]).unwrap(), dec!(3.75));
        assert!(score_wartegg(&[6, 4, 5, 2, 3, 4, 5, 4]).is_err());
    }
}
