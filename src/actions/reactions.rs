use std::fmt::Display;

pub const DEFAULT_REACTIONS: [&str; 6] = [
    "clap",
    "+1",
    "heart_eyes",
    "grinning",
    "thinking_face",
    "smiley",
];

pub const MAX_REACTIONS: usize = 6;

/// Header shortcuts: stored favourites first, then the defaults, capped at six.
/// A failed lookup just means no favourites.
pub fn frequent_reactions<E: Display>(fetched: Result<Vec<String>, E>) -> Vec<String> {
    let fetched = fetched.unwrap_or_else(|e| {
        tracing::debug!("Frequently used emojis unavailable: {e}");
        Vec::new()
    });
    fetched
        .into_iter()
        .chain(DEFAULT_REACTIONS.iter().map(|s| (*s).to_owned()))
        .take(MAX_REACTIONS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    #[test]
    fn failure_falls_back_to_defaults() {
        let got = frequent_reactions::<StoreError>(Err(StoreError::Poisoned));
        assert_eq!(got, DEFAULT_REACTIONS.to_vec());
    }

    #[test]
    fn empty_store_gives_defaults() {
        let got = frequent_reactions::<StoreError>(Ok(Vec::new()));
        assert_eq!(got.len(), MAX_REACTIONS);
        assert_eq!(got[0], "clap");
    }

    #[test]
    fn stored_entries_come_first() {
        let got = frequent_reactions::<StoreError>(Ok(vec!["tada".into(), "rocket".into()]));
        assert_eq!(got, vec!["tada", "rocket", "clap", "+1", "heart_eyes", "grinning"]);
    }

    #[test]
    fn never_more_than_six() {
        let many: Vec<String> = (0..20).map(|i| format!("e{i}")).collect();
        let got = frequent_reactions::<StoreError>(Ok(many));
        assert_eq!(got.len(), MAX_REACTIONS);
        assert_eq!(got[5], "e5");
    }
}
