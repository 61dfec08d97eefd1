//! Air quality jokes, one per minute.

use chrono::{DateTime, Utc};

/// Shown when no joke could be fetched.
pub const FALLBACK_JOKE: &str =
    "Why did the air purifier break up with the fan? It needed some space to breathe.";

const JOKES: [&str; 8] = [
    "I tried to write a joke about PM2.5, but it was too small to see.",
    "My sensor and I have a lot in common: we both get cranky when it's humid.",
    "What did one particle say to the other? Let's stick together.",
    "The air quality today is like my code review: mostly fine, some sensitive groups affected.",
    "Why don't smoke particles ever win arguments? They always get filtered out.",
    "I'd tell you a joke about ozone, but it's over your head.",
    "My AQI and my credit score finally agree: lower is better. Wait, no.",
    "Weather forecast: cloudy with a chance of particulates.",
];

/// The joke for the minute containing `now`.
pub fn joke_at(now: DateTime<Utc>) -> &'static str {
    let minute = now.timestamp().div_euclid(60);
    JOKES[minute.rem_euclid(JOKES.len() as i64) as usize]
}
