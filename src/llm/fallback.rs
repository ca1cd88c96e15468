//! Keyword-based local responder used when the remote model is unavailable.
//!
//! Rules are checked in order against the lowercased input; the first rule
//! whose keyword is a substring wins. Only the joke rule draws from the
//! random source, which can be seeded for reproducible output.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const GREETING: &str = "Hello! I'm your AI assistant. How can I help you today?";
const WELLBEING: &str = "I'm functioning well, thank you for asking! How can I assist you?";
const WEATHER: &str = "I don't have access to real-time weather data, but I can help you find a \
weather service or app that provides accurate forecasts for your location.";
const IDENTITY: &str = "I'm an AI assistant powered by Google's Gemini model. You can call me \
Gemini Assistant!";
const UNAVAILABLE: &str =
    "I'm having trouble connecting to my AI services right now. Please try again later.";

/// Canned jokes for the joke rule.
pub const JOKES: [&str; 5] = [
    "Why don't scientists trust atoms? Because they make up everything!",
    "Why did the scarecrow win an award? Because he was outstanding in his field!",
    "What do you call a fake noodle? An impasta!",
    "How does a penguin build its house? Igloos it together!",
    "Why don't eggs tell jokes? They'd crack each other up!",
];

const RULES: [(&[&str], FallbackClass); 5] = [
    (&["hello", "hi"], FallbackClass::Greeting),
    (&["how are you"], FallbackClass::Wellbeing),
    (&["weather"], FallbackClass::Weather),
    (&["name"], FallbackClass::Identity),
    (&["joke"], FallbackClass::Joke),
];

/// Category of a fallback reply.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackClass {
    /// Greeting.
    Greeting,
    /// Answer to "how are you".
    Wellbeing,
    /// Weather disclaimer.
    Weather,
    /// Identity statement.
    Identity,
    /// One of the canned jokes.
    Joke,
    /// Generic "service unavailable" message.
    Unavailable,
}

impl FallbackClass {
    /// Classify an input message.
    #[must_use]
    pub fn classify(message: &str) -> Self {
        let lowered = message.to_lowercase();
        RULES
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|k| lowered.contains(k)))
            .map_or(Self::Unavailable, |(_, class)| *class)
    }

    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::Wellbeing => "wellbeing",
            Self::Weather => "weather",
            Self::Identity => "identity",
            Self::Joke => "joke",
            Self::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for FallbackClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A reply produced by the fallback responder.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FallbackReply {
    /// Matched rule.
    pub class: FallbackClass,
    /// Reply text.
    pub text: &'static str,
}

/// Local responder. Never fails.
pub struct FallbackResponder {
    rng: Mutex<StdRng>,
}

impl FallbackResponder {
    /// Responder with an entropy-seeded random source.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Responder with a fixed seed, for reproducible joke selection.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Answer `message` from the rule table.
    pub fn respond(&self, message: &str) -> FallbackReply {
        let class = FallbackClass::classify(message);
        let text = match class {
            FallbackClass::Greeting => GREETING,
            FallbackClass::Wellbeing => WELLBEING,
            FallbackClass::Weather => WEATHER,
            FallbackClass::Identity => IDENTITY,
            FallbackClass::Joke => {
                let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
                JOKES[rng.gen_range(0..JOKES.len())]
            }
            FallbackClass::Unavailable => UNAVAILABLE,
        };
        FallbackReply { class, text }
    }
}

impl Default for FallbackResponder {
    fn default() -> Self {
        Self::new()
    }
}
