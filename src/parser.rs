//! Extracts a story segment from raw model output.
//!
//! The generation service is asked for a strict `Story:` / `Choices:` layout
//! but is not trusted to honor it. Parsing is a total function: whatever the
//! model returns, the player always gets a narrative and exactly three
//! distinct, concrete choices.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// How many choices a segment always carries.
pub const CHOICE_COUNT: usize = 3;

/// Narrative used when the model returns nothing usable at all.
const DEFAULT_NARRATIVE: &str =
    "The aliens look at you expectantly, their device flickering with an otherworldly glow.";

/// Topic-keyed stock actions, matched against the extracted narrative before
/// falling back to the generic pool.
const TOPIC_FALLBACKS: &[(&[&str], &[&str])] = &[
    (
        &["alien", "creature"],
        &[
            "Try to communicate with the aliens",
            "Observe the aliens from a safe distance",
        ],
    ),
    (
        &["device", "gadget", "machine"],
        &[
            "Examine the strange device more closely",
            "Ask the aliens about the purpose of their device",
        ],
    ),
    (
        &["door", "exit", "window"],
        &["Make a run for the nearest exit"],
    ),
];

const GENERIC_FALLBACKS: &[&str] = &[
    "Look around for something useful in the room",
    "Try to distract them with a random object",
    "Ask them about their home planet",
    "Pretend to be an alien yourself",
    "Offer them something to eat or drink",
    "Slowly back away while maintaining eye contact",
];

static STORY_SECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)Story:(.*?)(?:Choices:|\n\s*\d+\.|$)").unwrap());
static LEADING_NARRATIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^(.*?)(?:\nChoices:|\n\s*\d+\.)").unwrap());
static CHOICES_SECTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)Choices:(.*)").unwrap());
static NUMBERED_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*\d+\.\s+(.+)$").unwrap());
static LOOSE_NUMBERED_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*\d+\s*[.:)]\s*(.+)$").unwrap());
static OPTION_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?mi)^(?:Option|Choice|You can)[^:\n]*:\s*(.+)$").unwrap());

/// The narrative state shown to the player. Replaced wholesale every turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StorySegment {
    pub narrative: String,
    pub choices: Vec<String>,
}

impl StorySegment {
    /// Canonical `Story:` / `Choices:` rendering, used when committing a
    /// narrator turn so the provider keeps seeing its own format respected.
    pub fn to_formatted(&self) -> String {
        let mut out = format!("Story: {}\n\nChoices:\n", self.narrative);
        for (i, choice) in self.choices.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, choice));
        }
        out.trim_end().to_string()
    }
}

/// Parse outcome plus whether the raw text honored the required layout before
/// any fallback ran. The engine uses `well_formed` to decide on a retry.
#[derive(Clone, Debug)]
pub struct ParsedResponse {
    pub segment: StorySegment,
    pub well_formed: bool,
}

/// True when the raw text carries both section labels and at least three
/// numbered choice lines, i.e. no repair is needed.
pub fn is_well_formed(raw: &str) -> bool {
    raw.contains("Story:")
        && raw.contains("Choices:")
        && NUMBERED_LINE.find_iter(raw).count() >= CHOICE_COUNT
}

/// Total parse: never fails, always yields exactly three valid choices.
pub fn parse(raw: &str) -> ParsedResponse {
    let narrative = extract_narrative(raw);
    let mut choices = extract_choices(raw);
    synthesize_fallbacks(&narrative, &mut choices);
    choices.truncate(CHOICE_COUNT);

    ParsedResponse {
        segment: StorySegment {
            narrative,
            choices,
        },
        well_formed: is_well_formed(raw),
    }
}

fn extract_narrative(raw: &str) -> String {
    let narrative = if let Some(cap) = STORY_SECTION.captures(raw) {
        cap[1].trim().to_string()
    } else if let Some(cap) = LEADING_NARRATIVE.captures(raw) {
        cap[1].trim().to_string()
    } else {
        // No structure at all: the whole response is narrative.
        raw.trim().to_string()
    };

    if narrative.is_empty() {
        DEFAULT_NARRATIVE.to_string()
    } else {
        narrative
    }
}

/// A candidate is dropped if empty, already collected, or wrapped entirely in
/// brackets (an unfilled template placeholder).
fn push_candidate(choices: &mut Vec<String>, text: &str) {
    let text = text.trim();
    if text.is_empty() || (text.starts_with('[') && text.ends_with(']')) {
        return;
    }
    if choices.iter().any(|c| c == text) {
        return;
    }
    choices.push(text.to_string());
}

fn extract_choices(raw: &str) -> Vec<String> {
    let mut choices = Vec::new();

    // Strategy 1: numbered lines inside a labeled "Choices:" section.
    if let Some(cap) = CHOICES_SECTION.captures(raw) {
        for m in NUMBERED_LINE.captures_iter(&cap[1]) {
            push_candidate(&mut choices, &m[1]);
        }
    }

    // Strategy 2: numbered lines anywhere (handles a missing section label).
    if choices.len() < CHOICE_COUNT {
        for m in NUMBERED_LINE.captures_iter(raw) {
            push_candidate(&mut choices, &m[1]);
        }
    }

    // Strategy 3: looser numbered variants, "1)" and "1:".
    if choices.len() < CHOICE_COUNT {
        for m in LOOSE_NUMBERED_LINE.captures_iter(raw) {
            push_candidate(&mut choices, &m[1]);
        }
    }

    // Strategy 4: lines introduced by "Option"/"Choice"/"You can".
    if choices.len() < CHOICE_COUNT {
        for m in OPTION_LINE.captures_iter(raw) {
            push_candidate(&mut choices, &m[1]);
        }
    }

    choices
}

/// Tops the list up to three entries: topic-matched stock actions first, then
/// the generic pool, skipping anything already present.
fn synthesize_fallbacks(narrative: &str, choices: &mut Vec<String>) {
    if choices.len() >= CHOICE_COUNT {
        return;
    }
    let lower = narrative.to_lowercase();

    let topical = TOPIC_FALLBACKS
        .iter()
        .filter(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .flat_map(|(_, actions)| actions.iter());

    for fallback in topical.chain(GENERIC_FALLBACKS.iter()) {
        if choices.len() >= CHOICE_COUNT {
            break;
        }
        push_candidate(choices, fallback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_valid_choices(choices: &[String]) {
        assert_eq!(choices.len(), CHOICE_COUNT);
        for (i, choice) in choices.iter().enumerate() {
            assert!(!choice.is_empty());
            assert!(!(choice.starts_with('[') && choice.ends_with(']')));
            assert!(!choices[..i].contains(choice), "duplicate: {choice}");
        }
    }

    #[test]
    fn labeled_sections_parse_cleanly() {
        let raw = "Story: A shimmer appears.\n\nChoices:\n1. Run\n2. Hide\n3. Wait";
        let parsed = parse(raw);
        assert!(parsed.well_formed);
        assert_eq!(parsed.segment.narrative, "A shimmer appears.");
        assert_eq!(parsed.segment.choices, vec!["Run", "Hide", "Wait"]);
    }

    #[test]
    fn loose_numbering_without_labels_still_yields_three() {
        let raw = "1) Run away\n2: Hide now\n3. Just wait";
        let parsed = parse(raw);
        assert!(!parsed.well_formed);
        assert_valid_choices(&parsed.segment.choices);
        assert!(parsed.segment.choices.contains(&"Run away".to_string()));
        assert!(parsed.segment.choices.contains(&"Hide now".to_string()));
        assert!(parsed.segment.choices.contains(&"Just wait".to_string()));
    }

    #[test]
    fn no_numbered_lines_synthesizes_fallbacks() {
        let parsed = parse("Story: Nothing happens.");
        assert!(!parsed.well_formed);
        assert_eq!(parsed.segment.narrative, "Nothing happens.");
        assert_valid_choices(&parsed.segment.choices);
    }

    #[test]
    fn empty_input_still_yields_a_segment() {
        let parsed = parse("");
        assert!(!parsed.segment.narrative.is_empty());
        assert_valid_choices(&parsed.segment.choices);
    }

    #[test]
    fn placeholder_choices_are_rejected() {
        let raw = "Story: The device hums.\n\nChoices:\n1. [choice one]\n2. [choice two]\n3. Poke it";
        let parsed = parse(raw);
        assert_valid_choices(&parsed.segment.choices);
        assert!(parsed.segment.choices.contains(&"Poke it".to_string()));
    }

    #[test]
    fn extra_choices_are_truncated_to_three() {
        let raw = "Story: Options abound.\n\nChoices:\n1. A\n2. B\n3. C\n4. D\n5. E";
        let parsed = parse(raw);
        assert!(parsed.well_formed);
        assert_eq!(parsed.segment.choices, vec!["A", "B", "C"]);
    }

    #[test]
    fn duplicate_choices_are_dropped() {
        let raw = "Story: Deja vu.\n\nChoices:\n1. Run\n2. Run\n3. Hide";
        let parsed = parse(raw);
        assert_valid_choices(&parsed.segment.choices);
        assert_eq!(parsed.segment.choices[0], "Run");
        assert_eq!(parsed.segment.choices[1], "Hide");
    }

    #[test]
    fn topic_fallbacks_follow_the_narrative() {
        let parsed = parse("Story: A creature guards the only door.");
        assert!(
            parsed
                .segment
                .choices
                .iter()
                .any(|c| c.contains("communicate") || c.contains("exit"))
        );
        assert_valid_choices(&parsed.segment.choices);
    }

    #[test]
    fn option_lines_are_a_last_resort_before_synthesis() {
        let raw = "The hum deepens.\nOption A: Touch the glow\nChoice B: Shout at it\nYou can also: Sit very still";
        let parsed = parse(raw);
        assert_valid_choices(&parsed.segment.choices);
        assert!(parsed.segment.choices.contains(&"Touch the glow".to_string()));
    }

    #[test]
    fn formatted_rendering_round_trips() {
        let segment = StorySegment {
            narrative: "A shimmer appears.".to_string(),
            choices: vec!["Run".into(), "Hide".into(), "Wait".into()],
        };
        let parsed = parse(&segment.to_formatted());
        assert!(parsed.well_formed);
        assert_eq!(parsed.segment, segment);
    }
}
