// src/question_bank.rs
//
// Static item banks for the generated psychotests.
use crate::profiles::{DiscLetter, Trait};

/// `a : b = c : ?`, answer `d`.
pub struct AnalogyItem {
    pub a: &'static str,
    pub b: &'static str,
    pub c: &'static str,
    pub d: &'static str,
}

const fn analogy(
    a: &'static str,
    b: &'static str,
    c: &'static str,
    d: &'static str,
) -> AnalogyItem {
    AnalogyItem { a, b, c, d }
}

pub const ANALOGIES: &[AnalogyItem] = &[
    analogy("Doctor", "Hospital", "Teacher", "School"),
    analogy("Bird", "Nest", "Bee", "Hive"),
    analogy("Pen", "Write", "Knife", "Cut"),
    analogy("Hot", "Cold", "Tall", "Short"),
    analogy("Water", "Thirst", "Food", "Hunger"),
    analogy("Eye", "See", "Ear", "Hear"),
    analogy("Rice", "Field", "Fish", "Pond"),
    analogy("Author", "Book", "Composer", "Song"),
    analogy("Day", "Sun", "Night", "Moon"),
    analogy("Wheel", "Car", "Wing", "Airplane"),
    analogy("Kitten", "Cat", "Puppy", "Dog"),
    analogy("Thermometer", "Temperature", "Scale", "Weight"),
    analogy("Pilot", "Cockpit", "Driver", "Cabin"),
    analogy("Seed", "Tree", "Egg", "Chicken"),
    analogy("Lock", "Key", "Question", "Answer"),
];

/// One forced-choice group; each statement maps to one DISC letter.
pub const DISC_GROUPS: &[[(&str, DiscLetter); 4]] = &[
    [
        ("I take charge when a decision is needed", DiscLetter::D),
        ("I enjoy meeting new people", DiscLetter::I),
        ("I keep a steady pace at work", DiscLetter::S),
        ("I check details before I finish", DiscLetter::C),
    ],
    [
        ("I like to win", DiscLetter::D),
        ("I can cheer up a team", DiscLetter::I),
        ("I am patient with others", DiscLetter::S),
        ("I follow the procedure exactly", DiscLetter::C),
    ],
    [
        ("I speak my mind directly", DiscLetter::D),
        ("I am talkative", DiscLetter::I),
        ("I avoid conflict", DiscLetter::S),
        ("I plan before acting", DiscLetter::C),
    ],
    [
        ("I push for results", DiscLetter::D),
        ("I persuade people easily", DiscLetter::I),
        ("I am loyal to my team", DiscLetter::S),
        ("I prefer accuracy over speed", DiscLetter::C),
    ],
    [
        ("I act quickly", DiscLetter::D),
        ("I am optimistic", DiscLetter::I),
        ("I am a good listener", DiscLetter::S),
        ("I am systematic", DiscLetter::C),
    ],
    [
        ("I accept challenges", DiscLetter::D),
        ("I like being the centre of attention", DiscLetter::I),
        ("I like a predictable routine", DiscLetter::S),
        ("I like clear rules", DiscLetter::C),
    ],
    [
        ("I am competitive", DiscLetter::D),
        ("I am spontaneous", DiscLetter::I),
        ("I am calm under pressure", DiscLetter::S),
        ("I am careful", DiscLetter::C),
    ],
    [
        ("I am decisive", DiscLetter::D),
        ("I am enthusiastic", DiscLetter::I),
        ("I am cooperative", DiscLetter::S),
        ("I am precise", DiscLetter::C),
    ],
    [
        ("I set my own goals", DiscLetter::D),
        ("I make friends quickly", DiscLetter::I),
        ("I help others finish their work", DiscLetter::S),
        ("I double-check numbers", DiscLetter::C),
    ],
    [
        ("I am bold", DiscLetter::D),
        ("I am expressive", DiscLetter::I),
        ("I am dependable", DiscLetter::S),
        ("I am analytical", DiscLetter::C),
    ],
    [
        ("I dislike waiting", DiscLetter::D),
        ("I enjoy group work", DiscLetter::I),
        ("I dislike sudden change", DiscLetter::S),
        ("I dislike mistakes", DiscLetter::C),
    ],
    [
        ("I lead the discussion", DiscLetter::D),
        ("I tell stories", DiscLetter::I),
        ("I keep the peace", DiscLetter::S),
        ("I ask for the facts", DiscLetter::C),
    ],
];

/// Likert statement, its trait and whether agreement counts against the trait.
pub const PERSONALITY_ITEMS: &[(&str, Trait, bool)] = &[
    ("I enjoy trying new ways of doing my work", Trait::Openness, false),
    ("I prefer to stick with what I already know", Trait::Openness, true),
    ("I am curious about how things work", Trait::Openness, false),
    ("I finish tasks before the deadline", Trait::Conscientiousness, false),
    ("I often leave my workplace untidy", Trait::Conscientiousness, true),
    ("I make a plan and follow it", Trait::Conscientiousness, false),
    ("I start conversations with colleagues", Trait::Extraversion, false),
    ("I prefer to work alone and keep quiet", Trait::Extraversion, true),
    ("I feel energised in a busy team", Trait::Extraversion, false),
    ("I help colleagues without being asked", Trait::Agreeableness, false),
    ("I find it hard to trust others", Trait::Agreeableness, true),
    ("I consider other people's feelings", Trait::Agreeableness, false),
    ("I stay calm when plans change", Trait::Stability, false),
    ("I worry a lot about small mistakes", Trait::Stability, true),
    ("I get irritated easily under pressure", Trait::Stability, true),
];

/// The eight Wartegg stimulus boxes.
pub const WARTEGG_BOXES: [&str; 8] = [
    "A small dot in the centre",
    "A short wavy line in the upper left",
    "Three vertical lines of increasing height",
    "A small black square in the upper right",
    "Two diagonal lines meeting at an angle",
    "A horizontal and a vertical line, not touching",
    "A semicircle of dots in the lower right",
    "A large curved arc across the top",
];
