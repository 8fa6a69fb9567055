// src/psychotest.rs
//
// Test assignments: staff assigns a kind with a deadline, the employee starts it
// (questions are generated from the assignment seed, the key stays here) and
// submits answers once.
use chrono::NaiveDateTime;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::AppError;
use crate::kraepelin::{self, KraepelinReport};
use crate::models::{AssignmentStatus, EmployeeTestAssignment, Id, TestKind, TestResult};
use crate::notifications::notify;
use crate::profiles::{self, DiscLetter, DiscPick, DiscProfile, PersonalityItem, TraitScore};
use crate::quiz::{self, count_correct, percentage};
use crate::store::{Database, Tables};

/// A question as shown to the employee. Never carries the answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Question {
    Choice { prompt: String, options: Vec<String> },
    Entry { prompt: String },
    Digits { column: Vec<u8> },
    Disc { statements: Vec<String> },
    Likert { statement: String },
    Drawing { box_number: u8, stimulus: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnswerKey {
    /// Index of the right option per question.
    Options { correct: Vec<usize> },
    Values { correct: Vec<i64> },
    Kraepelin { columns: Vec<Vec<u8>> },
    Disc { letters: Vec<Vec<DiscLetter>> },
    Personality { items: Vec<PersonalityItem> },
    Wartegg,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Submission {
    Options { answers: Vec<Option<usize>> },
    Values { answers: Vec<Option<i64>> },
    Kraepelin { columns: Vec<Vec<u8>> },
    Disc { picks: Vec<DiscPick> },
    Personality { ratings: Vec<u8> },
    Wartegg { boxes: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestOutcome {
    Score { correct: u32, total: u32 },
    Kraepelin(KraepelinReport),
    Disc(DiscProfile),
    Personality { traits: Vec<TraitScore> },
    Wartegg {
        boxes: Vec<String>,
        box_scores: Option<Vec<u8>>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct TestPaper {
    pub assignment_id: Id,
    pub kind: TestKind,
    pub deadline: NaiveDateTime,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAssignment {
    pub employee_id: Id,
    pub kind: TestKind,
    pub deadline: NaiveDateTime,
}

/// Same kind and seed always yield the same questions and key.
pub fn generate(kind: TestKind, seed: u64) -> (Vec<Question>, AnswerKey) {
    let mut rng = StdRng::seed_from_u64(seed);
    match kind {
        TestKind::Kraepelin => {
            let (columns, key) = kraepelin::generate(&mut rng);
            let questions = columns
                .into_iter()
                .map(|column| Question::Digits { column })
                .collect();
            (questions, AnswerKey::Kraepelin { columns: key })
        }
        TestKind::Ketelitian => quiz::ketelitian(&mut rng),
        TestKind::Hitungan => quiz::hitungan(&mut rng),
        TestKind::Deret => quiz::deret(&mut rng),
        TestKind::Analogy => quiz::analogy(&mut rng),
        TestKind::Numeric => quiz::numeric(&mut rng),
        TestKind::Disc => profiles::disc(&mut rng),
        TestKind::Personality => profiles::personality(&mut rng),
        TestKind::Wartegg => profiles::wartegg(),
    }
}

fn shape_mismatch() -> AppError {
    AppError::invalid("type", "The answers do not match the kind of test.")
}

/// Scores a submission against its key. Profile sections have no score.
pub fn evaluate(
    key: &AnswerKey,
    submission: &Submission,
) -> Result<(Option<Decimal>, TestOutcome), AppError> {
    match (key, submission) {
        (AnswerKey::Options { correct }, Submission::Options { answers }) => {
            let right = count_correct(correct, answers)?;
            Ok((
                Some(percentage(right, correct.len())),
                TestOutcome::Score {
                    correct: right as u32,
                    total: correct.len() as u32,
                },
            ))
        }
        (AnswerKey::Values { correct }, Submission::Values { answers }) => {
            let right = count_correct(correct, answers)?;
            Ok((
                Some(percentage(right, correct.len())),
                TestOutcome::Score {
                    correct: right as u32,
                    total: correct.len() as u32,
                },
            ))
        }
        (AnswerKey::Kraepelin { columns: key }, Submission::Kraepelin { columns }) => {
            let (score, report) = kraepelin::score(key, columns)?;
            Ok((Some(score), TestOutcome::Kraepelin(report)))
        }
        (AnswerKey::Disc { letters }, Submission::Disc { picks }) => {
            Ok((None, TestOutcome::Disc(profiles::score_disc(letters, picks)?)))
        }
        (AnswerKey::Personality { items }, Submission::Personality { ratings }) => Ok((
            None,
            TestOutcome::Personality {
                traits: profiles::score_personality(items, ratings)?,
            },
        )),
        (AnswerKey::Wartegg, Submission::Wartegg { boxes }) => {
            profiles::check_wartegg_boxes(boxes)?;
            Ok((
                None,
                TestOutcome::Wartegg {
                    boxes: boxes.iter().map(|b| b.trim().to_string()).collect(),
                    box_scores: None,
                },
            ))
        }
        _ => Err(shape_mismatch()),
    }
}

fn is_open(status: AssignmentStatus) -> bool {
    matches!(
        status,
        AssignmentStatus::Assigned | AssignmentStatus::InProgress | AssignmentStatus::AwaitingReview
    )
}

/// Blocks a new assignment of the same kind. An unstarted or unfinished test
/// past its deadline no longer counts, even before the expiry job runs.
fn blocks_new_assignment(assignment: &EmployeeTestAssignment, now: NaiveDateTime) -> bool {
    match assignment.status {
        AssignmentStatus::Assigned | AssignmentStatus::InProgress => assignment.deadline >= now,
        status => is_open(status),
    }
}

fn ensure_not_expired(assignment: &EmployeeTestAssignment, now: NaiveDateTime) -> Result<(), AppError> {
    if assignment.status == AssignmentStatus::Expired || now > assignment.deadline {
        warn!(
            "Assignment {} used after its deadline {}",
            assignment.id, assignment.deadline
        );
        return Err(AppError::Conflict(format!(
            "test assignment expired at {}",
            assignment.deadline
        )));
    }
    Ok(())
}

fn transition_error(from: AssignmentStatus, to: AssignmentStatus) -> AppError {
    AppError::InvalidTransition {
        entity: "test assignment",
        from: from.to_string(),
        to: to.to_string(),
    }
}

pub fn assign(
    db: &Database,
    staff_id: Id,
    input: NewAssignment,
    now: NaiveDateTime,
) -> Result<EmployeeTestAssignment, AppError> {
    if input.deadline <= now {
        return Err(AppError::invalid(
            "deadline",
            "The deadline must be a date after now.",
        ));
    }
    let seed: u64 = rand::random();
    let assignment = db.transaction(|t| {
        let employee = t.employee(input.employee_id)?;
        if !employee.can_log_in() {
            return Err(AppError::invalid(
                "employee_id",
                "The selected employee is not active.",
            ));
        }
        let duplicate = t.test_assignments.iter().any(|a| {
            a.employee_id == input.employee_id
                && a.kind == input.kind
                && blocks_new_assignment(a, now)
        });
        if duplicate {
            return Err(AppError::Conflict(format!(
                "employee {} already has an open {} test",
                input.employee_id,
                input.kind.as_str()
            )));
        }
        let assignment = t
            .test_assignments
            .insert_with(|id| EmployeeTestAssignment {
                id,
                employee_id: input.employee_id,
                kind: input.kind,
                assigned_by: staff_id,
                deadline: input.deadline,
                status: AssignmentStatus::Assigned,
                seed,
                answer_key: None,
                started_at: None,
                completed_at: None,
            })
            .clone();
        notify(
            t,
            assignment.employee_id,
            format!(
                "A {} test was assigned to you, due {}.",
                assignment.kind.as_str(),
                assignment.deadline
            ),
            now,
        );
        Ok(assignment)
    })?;
    info!(
        "Staff {} assigned {} test {} to employee {}",
        staff_id,
        assignment.kind.as_str(),
        assignment.id,
        assignment.employee_id
    );
    Ok(assignment)
}

fn own_assignment<'a>(
    tables: &'a mut Tables,
    employee_id: Id,
    assignment_id: Id,
) -> Result<&'a mut EmployeeTestAssignment, AppError> {
    tables
        .test_assignments
        .get_mut(assignment_id)
        .filter(|a| a.employee_id == employee_id)
        .ok_or_else(|| AppError::not_found("Test assignment", assignment_id))
}

/// Starts (or resumes) a test and returns its questions.
pub fn start(
    db: &Database,
    employee_id: Id,
    assignment_id: Id,
    now: NaiveDateTime,
) -> Result<TestPaper, AppError> {
    db.transaction(|t| {
        let assignment = own_assignment(t, employee_id, assignment_id)?;
        ensure_not_expired(assignment, now)?;
        match assignment.status {
            AssignmentStatus::Assigned | AssignmentStatus::InProgress => {}
            other => return Err(transition_error(other, AssignmentStatus::InProgress)),
        }
        let (questions, key) = generate(assignment.kind, assignment.seed);
        if assignment.status == AssignmentStatus::Assigned {
            assignment.status = AssignmentStatus::InProgress;
            assignment.started_at = Some(now);
            assignment.answer_key = Some(key);
            info!("Employee {} started test {}", employee_id, assignment_id);
        }
        Ok(TestPaper {
            assignment_id,
            kind: assignment.kind,
            deadline: assignment.deadline,
            questions,
        })
    })
}

pub fn submit(
    db: &Database,
    employee_id: Id,
    assignment_id: Id,
    submission: Submission,
    now: NaiveDateTime,
) -> Result<TestResult, AppError> {
    let result = db.transaction(|t| {
        let assignment = own_assignment(t, employee_id, assignment_id)?;
        ensure_not_expired(assignment, now)?;
        if assignment.status != AssignmentStatus::InProgress {
            return Err(transition_error(assignment.status, AssignmentStatus::Completed));
        }
        let key = assignment
            .answer_key
            .as_ref()
            .ok_or_else(|| AppError::Conflict("test has not been started".to_string()))?;
        let (score, outcome) = evaluate(key, &submission)?;
        let needs_review = matches!(outcome, TestOutcome::Wartegg { .. });

        assignment.status = if needs_review {
            AssignmentStatus::AwaitingReview
        } else {
            AssignmentStatus::Completed
        };
        assignment.completed_at = Some(now);
        let kind = assignment.kind;

        let result = t.test_results.insert_with(|id| TestResult {
            id,
            assignment_id,
            employee_id,
            kind,
            score,
            outcome,
            submitted_at: now,
            reviewed_by: None,
        });
        Ok(result.clone())
    })?;
    info!(
        "Employee {} submitted {} test {} (score {:?})",
        employee_id,
        result.kind.as_str(),
        assignment_id,
        result.score
    );
    Ok(result)
}

/// Staff scores each Wartegg box; the result and assignment complete.
pub fn review_wartegg(
    db: &Database,
    staff_id: Id,
    assignment_id: Id,
    box_scores: Vec<u8>,
    now: NaiveDateTime,
) -> Result<TestResult, AppError> {
    let mean = profiles::score_wartegg(&box_scores)?;
    let result = db.transaction(|t| {
        let assignment = t
            .test_assignments
            .find_mut(assignment_id, "Test assignment")?;
        if assignment.status != AssignmentStatus::AwaitingReview {
            return Err(transition_error(assignment.status, AssignmentStatus::Completed));
        }
        assignment.status = AssignmentStatus::Completed;
        let employee_id = assignment.employee_id;

        let result = t
            .test_results
            .iter_mut()
            .find(|r| r.assignment_id == assignment_id)
            .ok_or_else(|| AppError::not_found("Test result", assignment_id))?;
        let TestOutcome::Wartegg { box_scores: scores, .. } = &mut result.outcome else {
            return Err(shape_mismatch());
        };
        *scores = Some(box_scores.clone());
        result.score = Some(mean);
        result.reviewed_by = Some(staff_id);
        let result = result.clone();

        notify(t, employee_id, "Your Wartegg test has been reviewed.".to_string(), now);
        Ok(result)
    })?;
    info!(
        "Staff {} reviewed Wartegg assignment {} (mean {})",
        staff_id, assignment_id, mean
    );
    Ok(result)
}

pub fn list_assignments(
    db: &Database,
    employee_id: Option<Id>,
) -> Result<Vec<EmployeeTestAssignment>, AppError> {
    db.read(|t| {
        t.test_assignments
            .iter()
            .filter(|a| employee_id.map_or(true, |id| a.employee_id == id))
            .cloned()
            .map(|mut a| {
                // the key never leaves the server
                a.answer_key = None;
                a
            })
            .collect()
    })
}

pub fn list_results(
    db: &Database,
    employee_id: Option<Id>,
    kind: Option<TestKind>,
) -> Result<Vec<TestResult>, AppError> {
    db.read(|t| {
        t.test_results
            .iter()
            .filter(|r| employee_id.map_or(true, |id| r.employee_id == id))
            .filter(|r| kind.map_or(true, |k| r.kind == k))
            .cloned()
            .collect()
    })
}

/// Open assignments past their deadline become expired.
pub fn expire_overdue(tables: &mut Tables, now: NaiveDateTime) -> usize {
    let mut expired = 0;
    for assignment in tables.test_assignments.iter_mut() {
        let open = matches!(
            assignment.status,
            AssignmentStatus::Assigned | AssignmentStatus::InProgress
        );
        if open && assignment.deadline < now {
            assignment.status = AssignmentStatus::Expired;
            expired += 1;
        }
    }
    expired
}

const WARTEGG_PERCENT_PER_POINT: u32 = 20;

/// Wartegg reviews are a 1-5 box mean; every other score is already 0-100.
fn as_percentage(result: &TestResult) -> Option<Decimal> {
    let score = result.score?;
    Some(match result.kind {
        TestKind::Wartegg => score * Decimal::from(WARTEGG_PERCENT_PER_POINT),
        _ => score,
    })
}

/// Mean of every scored result of the employee, on the percentage scale.
pub fn mean_score(tables: &Tables, employee_id: Id) -> Option<Decimal> {
    let scores: Vec<Decimal> = tables
        .test_results
        .iter()
        .filter(|r| r.employee_id == employee_id)
        .filter_map(as_percentage)
        .collect();
    if scores.is_empty() {
        return None;
    }
    let total: Decimal = scores.iter().sum();
    Some((total / Decimal::from(scores.len() as u64)).round_dp(2))
}
