use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{Message, MessageDates};

/// Sampling parameters for a compare round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareConfig {
    /// Newest messages always sent.
    pub mandatory: usize,
    /// Upper bound of older messages drawn at random.
    pub sample: usize,
    /// Chance that a round carries the random sample.
    pub sample_probability: f64,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            mandatory: 20,
            sample: 20,
            sample_probability: 0.25,
        }
    }
}

/// Pick the message identities to send to the server for comparison.
///
/// The newest `mandatory` messages are always included. When more than that
/// are cached, a round carries up to `sample` extra identities drawn without
/// replacement from the older remainder with `sample_probability`.
pub fn compare_generator<R: Rng + ?Sized>(
    messages: &[Message],
    config: &CompareConfig,
    rng: &mut R,
) -> Vec<MessageDates> {
    let split = messages.len().saturating_sub(config.mandatory);
    let (older, newest) = messages.split_at(split);

    let mut to_compare: Vec<MessageDates> = newest.iter().map(Message::dates).collect();

    let probability = if config.sample_probability.is_nan() {
        0.0
    } else {
        config.sample_probability.clamp(0.0, 1.0)
    };
    if !older.is_empty() && config.sample > 0 && rng.gen_bool(probability) {
        let amount = config.sample.min(older.len());
        let mut picked = index::sample(rng, older.len(), amount).into_vec();
        picked.sort_unstable();
        to_compare.extend(picked.into_iter().map(|idx| older[idx].dates()));
    }

    to_compare
}
