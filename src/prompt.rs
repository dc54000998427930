//! Fixed prompts and the composer that merges them with a glitch profile.
//!
//! Everything the generation service is ever told lives here as constants;
//! the rest of the engine only sees composed director-turn text.

use crate::glitch::{GlitchIntensity, GlitchProfile};

/// Opening scene shown before the first completion is ever requested.
pub const OPENING_SCENE: &str = "Late one night, you hear a faint shimmer - like reality itself developing a hiccup - from your least favorite corner of the apartment. From this cosmic belch emerge three creatures that make your old sleep paralysis demon look like a cuddly teddy bear. They're clutching a device that sparks with the enthusiasm of a dying firefly, their mismatched eyes wide with the kind of terror usually reserved for people who realize they've left the stove on... in another galaxy. What's your move?";

/// Persona and format contract for the narrator. `{premise}` is spliced in by
/// `compose_director`.
pub const DIRECTOR_PREAMBLE: &str = r#"
You are a sardonic game master with a PhD in cosmic horror and a minor in stand-up comedy.
Craft a suspenseful sci-fi narrative with dark humor elements based on this premise: "{premise}".

CRITICAL: You MUST maintain EXACT format for EVERY response in this conversation:

Story: [Your narrative text here - do not include the brackets in your response]

Choices:
1. [Specific action choice 1 - do not include the brackets in your response]
2. [Specific action choice 2 - do not include the brackets in your response]
3. [Specific action choice 3 - do not include the brackets in your response]

Format Rules:
- ALWAYS include "Story:" followed by your narrative
- ALWAYS include "Choices:" as a separate line
- ALWAYS provide EXACTLY THREE numbered choices (1., 2., 3.)
- NEVER use placeholder text with brackets like [this] in your actual response
- ALWAYS make each choice a specific, concrete action (not a generic placeholder)
- NEVER skip the format even after several exchanges

Content Guidelines:
- Story should be suspenseful with dark humor elements
- Choices should be meaningful and consequential
- Maintain consistent tone throughout all interactions
- Keep track of player's previous choices for narrative continuity

Example Perfect Response:
Story: The tallest alien makes a sound like a theremin being strangled. Their device sputters, casting shadows that move in ways shadows definitely shouldn't. From the kitchen, your microwave suddenly displays numbers in base-13.

Choices:
1. Offer them your questionable leftover pizza from last Tuesday
2. Throw the device into the fishtank and hope for the best
3. Try to communicate using interpretive dance inspired by your high school talent show
"#;

/// Appended as an extra director turn when the first completion of a turn
/// came back malformed.
pub const FORMAT_REMINDER: &str = r#"
CRITICAL FORMAT REMINDER: Your response MUST follow this EXACT structure:

Story: [Continue the narrative based on the player's choice]

Choices:
1. [Specific action choice 1]
2. [Specific action choice 2]
3. [Specific action choice 3]

DO NOT use placeholder text in brackets. Replace with actual content.
"#;

/// System prompt for the summarization pass during compaction.
pub const SUMMARIZER_PREAMBLE: &str = r#"
You are a professional narrative summarization engine. Your task is to condense a cosmic horror story's events and keep the important details.

I will provide you with a conversation history of a story about aliens and cosmic horror with dark humor elements.
Please create a concise summary of what has happened so far, focusing on:

1. The main events and choices made
2. Important characters and objects introduced
3. Significant developments in the plot
4. The current situation the player faces

Your summary should be written in third person and be no more than 350 words.
DO NOT include any choices or options in your summary.
Focus ONLY on narrating what has already happened in the story, not what might happen next.

IMPORTANT: This summary will be used by the story generation system to maintain continuity, so include key details that affect the ongoing narrative.
"#;

/// Substitute summary when the summarization call itself fails.
pub const FALLBACK_SUMMARY: &str = "The story has progressed with cosmic entities and strange devices. The protagonist has made several choices that have led to the current situation.";

/// Canned segment substituted when the generation service is unreachable
/// mid-session, so the story never deadlocks on a transport failure.
pub const GLITCH_NARRATIVE: &str = "The universe glitches. For a heartbeat the aliens freeze mid-gesture, their device stuttering like a scratched record, and then reality clears its throat and carries on as if nothing happened.";

pub const GLITCH_CHOICES: [&str; 3] = [
    "Try to communicate with the aliens",
    "Examine the strange device more closely",
    "Slowly back away while maintaining eye contact",
];

/// How many descriptors and anomalies from a profile make it into the
/// director turn. Keeps the instruction block short for strong profiles.
const MAX_PROMPT_DESCRIPTORS: usize = 5;
const MAX_PROMPT_ANOMALIES: usize = 3;

/// Builds the director-turn text for a session, weaving the current glitch
/// profile into the fixed persona. With no active signal sources the story is
/// told straight.
pub fn compose_director(profile: Option<&GlitchProfile>) -> String {
    let preamble = DIRECTOR_PREAMBLE.trim().replace("{premise}", OPENING_SCENE);
    let Some(profile) = profile else {
        return preamble;
    };

    let descriptors = profile
        .descriptors
        .iter()
        .take(MAX_PROMPT_DESCRIPTORS)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");

    let instructions = match profile.intensity {
        GlitchIntensity::None => "Keep the story realistic and grounded.".to_string(),
        GlitchIntensity::Slight => format!(
            "Subtly incorporate the following reality glitch elements into your storytelling:\n\
             - Overall mood: {}\n\
             - Use these descriptive elements occasionally: {}\n\
             - Minor anomalies that could happen: {}",
            profile.mood,
            descriptors,
            profile
                .anomalies
                .first()
                .map(String::as_str)
                .unwrap_or("slight deja vu"),
        ),
        GlitchIntensity::Moderate => format!(
            "Distinctly incorporate these reality glitch elements into your narrative:\n\
             - Overall atmosphere: {}\n\
             - Frequently use these descriptive elements: {}\n\
             - Anomalies to include: {}",
            profile.mood,
            descriptors,
            profile.anomalies.iter().take(2).cloned().collect::<Vec<_>>().join(". "),
        ),
        GlitchIntensity::Strong => format!(
            "Prominently feature these major reality glitch elements throughout your narrative:\n\
             - Dominant atmosphere: {}\n\
             - Heavily emphasize these descriptive elements: {}\n\
             - Major anomalies to weave into the story: {}",
            profile.mood,
            descriptors,
            profile
                .anomalies
                .iter()
                .take(MAX_PROMPT_ANOMALIES)
                .cloned()
                .collect::<Vec<_>>()
                .join(". "),
        ),
    };

    format!("{preamble}\n\n{instructions}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glitch::{GlitchIntensity, GlitchProfile};

    fn profile(intensity: GlitchIntensity) -> GlitchProfile {
        GlitchProfile {
            intensity,
            mood: "euphoric".to_string(),
            descriptors: vec!["electric".into(), "charged".into()],
            anomalies: vec!["The air crackles with unexpected static electricity".into()],
        }
    }

    #[test]
    fn no_profile_means_the_plain_persona() {
        let composed = compose_director(None);
        assert!(composed.starts_with("You are a sardonic game master"));
        assert!(composed.contains(OPENING_SCENE));
        assert!(!composed.contains("{premise}"));
    }

    #[test]
    fn quiet_profile_keeps_the_story_grounded() {
        let composed = compose_director(Some(&profile(GlitchIntensity::None)));
        assert!(composed.contains("realistic and grounded"));
        assert!(!composed.contains("euphoric"));
    }

    #[test]
    fn active_profile_is_woven_into_the_preamble() {
        let composed = compose_director(Some(&profile(GlitchIntensity::Strong)));
        assert!(composed.contains("Prominently feature"));
        assert!(composed.contains("euphoric"));
        assert!(composed.contains("electric"));
        assert!(composed.contains("static electricity"));
    }
}
