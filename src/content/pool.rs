//! Question Pool
//!
//! Holds the canonical question dataset and produces randomized orderings
//! on demand. The canonical dataset is never mutated; `draw` returns a
//! uniformly shuffled (Fisher-Yates) copy.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Number of answer choices per question.
pub const CHOICE_COUNT: usize = 4;

/// A single quiz question. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionItem {
    /// Question text shown to the player.
    pub prompt: String,
    /// The four answer choices, in display order.
    pub choices: [String; CHOICE_COUNT],
    /// The correct choice. Always an exact copy of one of `choices`.
    pub correct: String,
}

impl QuestionItem {
    /// Create a question. `correct` must be one of `choices`.
    pub fn new(prompt: impl Into<String>, choices: [&str; CHOICE_COUNT], correct: &str) -> Self {
        debug_assert!(choices.contains(&correct));
        Self {
            prompt: prompt.into(),
            choices: choices.map(String::from),
            correct: correct.to_string(),
        }
    }
}

/// The question content source.
///
/// Rooms call [`draw`](ContentPool::draw) whenever their question sequence
/// is exhausted, including at room creation.
#[derive(Debug, Clone)]
pub struct ContentPool {
    items: Vec<QuestionItem>,
}

impl ContentPool {
    /// Create a pool over a custom dataset.
    pub fn new(items: Vec<QuestionItem>) -> Self {
        Self { items }
    }

    /// Number of questions in the canonical dataset.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Return a uniformly shuffled copy of the full dataset.
    pub fn draw(&self) -> Vec<QuestionItem> {
        let mut batch = self.items.clone();
        batch.shuffle(&mut rand::thread_rng());
        batch
    }
}

impl Default for ContentPool {
    fn default() -> Self {
        Self::new(vec![
            QuestionItem::new("What is 7 x 8?", ["54", "56", "63", "58"], "56"),
            QuestionItem::new("Square root of 81?", ["7", "8", "9", "10"], "9"),
            QuestionItem::new("120 / 3 = ?", ["40", "30", "20", "60"], "40"),
            QuestionItem::new("What is 15% of 200?", ["20", "25", "30", "35"], "30"),
            QuestionItem::new("2^3 + 4 = ?", ["12", "10", "11", "8"], "12"),
            QuestionItem::new("What is 11 x 11?", ["111", "121", "101", "131"], "121"),
            QuestionItem::new(
                "Approximate value of pi?",
                ["2.14", "3.14", "3.41", "4.13"],
                "3.14",
            ),
            QuestionItem::new("What is 9 x 6?", ["54", "56", "49", "52"], "54"),
            QuestionItem::new("If x = 5, 2x + 3 = ?", ["13", "12", "11", "10"], "13"),
            QuestionItem::new("What is 100 - 37?", ["63", "73", "67", "53"], "63"),
            QuestionItem::new("What is 14 x 3?", ["42", "36", "48", "39"], "42"),
            QuestionItem::new("Square root of 144?", ["10", "11", "12", "13"], "12"),
            QuestionItem::new("250 / 5 = ?", ["40", "45", "50", "55"], "50"),
            QuestionItem::new("What is 20% of 150?", ["20", "25", "30", "35"], "30"),
            QuestionItem::new("3^2 + 5 = ?", ["11", "12", "14", "15"], "14"),
            QuestionItem::new("What is 8 x 7?", ["54", "56", "58", "60"], "56"),
            QuestionItem::new("What is 90 - 28?", ["52", "62", "72", "58"], "62"),
            QuestionItem::new("If x = 4, 3x + 2 = ?", ["12", "13", "14", "15"], "14"),
            QuestionItem::new("What is 18 / 2?", ["8", "9", "10", "12"], "9"),
            QuestionItem::new("Square root of 25?", ["4", "5", "6", "7"], "5"),
            QuestionItem::new("5! (factorial of 5) is?", ["60", "120", "24", "20"], "120"),
            QuestionItem::new("What is 7 x 9?", ["56", "63", "72", "81"], "63"),
            QuestionItem::new("What is 12 squared?", ["124", "144", "154", "164"], "144"),
            QuestionItem::new("30% of 90 is?", ["27", "21", "33", "18"], "27"),
            QuestionItem::new("2^4 = ?", ["8", "12", "16", "18"], "16"),
        ])
    }
}
