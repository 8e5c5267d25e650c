//! Term/definition flashcards generated from a document.

use std::str::FromStr;

use chrono::NaiveDateTime;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{Result, ToolError};
use crate::{labelled, require_words, StudyTools};

/// Shorter documents rarely yield useful cards.
pub const MIN_WORDS: usize = 150;
const CARD_MARKER: &str = "FLASHCARD_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CardDifficulty {
    Basic,
    #[default]
    Intermediate,
    Advanced,
}

impl CardDifficulty {
    pub fn label(self) -> &'static str {
        match self {
            CardDifficulty::Basic => "Basic",
            CardDifficulty::Intermediate => "Intermediate",
            CardDifficulty::Advanced => "Advanced",
        }
    }

    fn instruction(self) -> &'static str {
        match self {
            CardDifficulty::Basic => {
                "Focus on simple, fundamental concepts and basic definitions. Use clear, straightforward language."
            }
            CardDifficulty::Intermediate => {
                "Include more detailed concepts and relationships. Use moderate academic vocabulary."
            }
            CardDifficulty::Advanced => {
                "Focus on complex ideas, nuanced concepts and advanced terminology. Use sophisticated academic language."
            }
        }
    }
}

impl FromStr for CardDifficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(CardDifficulty::Basic),
            "intermediate" => Ok(CardDifficulty::Intermediate),
            "advanced" => Ok(CardDifficulty::Advanced),
            other => Err(format!("unknown difficulty '{other}' (basic, intermediate, advanced)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flashcard {
    pub term: String,
    pub definition: String,
}

pub fn flashcard_prompt(text: &str, num_cards: usize, difficulty: CardDifficulty) -> String {
    format!(
        "You are an expert educational content creator who writes effective flashcards for students.\n\n\
         Analyze the following document and create {num_cards} high-quality flashcards in Term/Definition format.\n\n\
         Requirements:\n\
         - Difficulty Level: {} - {}\n\
         - Terms are key concepts, important vocabulary or significant ideas.\n\
         - Definitions are clear, concise and educational (2-4 sentences).\n\
         - Cover different sections of the document.\n\
         - Definitions stand alone (never say \"the document\" or \"as mentioned\").\n\n\
         Output format (follow exactly):\n\
         {CARD_MARKER}1:\n\
         TERM: [Key term or concept]\n\
         DEFINITION: [Clear, educational definition]\n\n\
         {CARD_MARKER}2:\n\
         TERM: [Key term or concept]\n\
         DEFINITION: [Clear, educational definition]\n\n\
         [Continue for all {num_cards} flashcards...]\n\n\
         Document Content:\n{}\n\n\
         Generate exactly {num_cards} flashcards now:",
        difficulty.label(),
        difficulty.instruction(),
        text.trim()
    )
}

/// Cards in reply order. Definitions may wrap over several lines; blocks
/// missing a term or a definition are skipped.
pub fn parse_flashcards(reply: &str) -> Vec<Flashcard> {
    let mut cards = Vec::new();
    for block in reply.split(CARD_MARKER).skip(1) {
        let mut term = String::new();
        let mut definition = String::new();
        for raw in block.lines() {
            let line = raw.trim();
            if let Some(t) = labelled(line, "TERM:") {
                term = t.to_string();
            } else if let Some(d) = labelled(line, "DEFINITION:") {
                definition = d.to_string();
            } else if !definition.is_empty() && !line.is_empty() {
                definition.push(' ');
                definition.push_str(line);
            }
        }
        if term.is_empty() || definition.is_empty() {
            tracing::debug!(block = block.trim(), "skipping incomplete flashcard");
            continue;
        }
        cards.push(Flashcard { term, definition });
    }
    cards
}

pub fn shuffle_flashcards<R: Rng + ?Sized>(cards: &mut [Flashcard], rng: &mut R) {
    cards.shuffle(rng);
}

/// Print-friendly deck.
pub fn format_deck(cards: &[Flashcard], source: &str, generated: NaiveDateTime) -> String {
    if cards.is_empty() {
        return "No flashcards to export.".to_string();
    }
    let mut out = format!(
        "STUDYMATE FLASHCARDS\n====================\n\nSource Document: {source}\nTotal Cards: {}\nGenerated: {}\n\n",
        cards.len(),
        generated.format("%Y-%m-%d %H:%M:%S")
    );
    for (i, card) in cards.iter().enumerate() {
        out.push_str(&format!("CARD {}\n--------\nTERM: {}\n\nDEFINITION: {}\n\n\n", i + 1, card.term, card.definition));
    }
    out.push_str("Study tip: cover the definitions and test your knowledge!");
    out
}

impl StudyTools {
    pub async fn generate_flashcards(&self, text: &str, num_cards: usize, difficulty: CardDifficulty) -> Result<Vec<Flashcard>> {
        if num_cards == 0 {
            return Err(ToolError::InvalidInput("ask for at least one flashcard".into()));
        }
        require_words(text, MIN_WORDS, "flashcards")?;
        let prompt = flashcard_prompt(text, num_cards, difficulty);
        let reply = self.generate("flashcards", prompt, self.settings.flashcards).await?;
        let cards = parse_flashcards(&reply);
        if cards.is_empty() {
            return Err(ToolError::Unparsable("flashcards"));
        }
        if cards.len() * 2 < num_cards {
            tracing::warn!(parsed = cards.len(), requested = num_cards, "model returned fewer flashcards than asked");
        }
        Ok(cards)
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn parses_cards_with_wrapped_definitions() {
        let reply = "Sure! Here are your cards.\n\n\
            FLASHCARD_1:\n\
            TERM: Entropy\n\
            DEFINITION: A measure of disorder\n\
            in a thermodynamic system.\n\n\
            **FLASHCARD_2:**\n\
            **TERM:** Enthalpy\n\
            **DEFINITION:** Total heat content of a system.\n\n\
            FLASHCARD_3:\n\
            TERM: Orphan term\n";
        let cards = parse_flashcards(reply);
        assert_eq!(
            cards,
            vec![
                Flashcard { term: "Entropy".into(), definition: "A measure of disorder in a thermodynamic system.".into() },
                Flashcard { term: "Enthalpy".into(), definition: "Total heat content of a system.".into() },
            ]
        );
    }

    #[test]
    fn reply_without_markers_has_no_cards() {
        assert!(parse_flashcards("TERM: x\nDEFINITION: y").is_empty());
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut cards: Vec<Flashcard> = (0..20)
            .map(|i| Flashcard { term: format!("t{i}"), definition: format!("d{i}") })
            .collect();
        let original = cards.clone();
        shuffle_flashcards(&mut cards, &mut StdRng::seed_from_u64(7));
        assert_ne!(cards, original);
        let mut sorted = cards.clone();
        sorted.sort_by(|a, b| a.term.cmp(&b.term));
        let mut expected = original;
        expected.sort_by(|a, b| a.term.cmp(&b.term));
        assert_eq!(sorted, expected);
    }

    #[test]
    fn deck_lists_every_card() {
        let cards = vec![Flashcard { term: "Entropy".into(), definition: "Disorder.".into() }];
        let generated = NaiveDateTime::parse_from_str("2025-03-10 09:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let deck = format_deck(&cards, "notes.txt", generated);
        assert!(deck.contains("Source Document: notes.txt"));
        assert!(deck.contains("CARD 1\n--------\nTERM: Entropy"));
        assert_eq!(format_deck(&[], "notes.txt", generated), "No flashcards to export.");
    }

    #[test]
    fn prompt_carries_difficulty_instruction() {
        let prompt = flashcard_prompt("Cells divide.", 5, CardDifficulty::Basic);
        assert!(prompt.contains("Difficulty Level: Basic - Focus on simple"));
        assert!(prompt.contains("create 5 high-quality flashcards"));
        assert!(prompt.contains("Document Content:\nCells divide."));
    }
}
