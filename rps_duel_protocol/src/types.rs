// Core types for the duel protocol.
//
// `PlayerSlot` is the fixed identity of one of the exactly two participants
// in a session. It is a closed two-variant enum rather than a bare integer,
// so an invalid slot is unrepresentable: there is no runtime "slot 3".
//
// On the wire a slot appears in two positions with two JSON spellings:
// as a value (`"player_id": 1`, `"ready_players": [1, 2]`) it is a number,
// and as an object key (`"scores": {"1": {...}}`) it is a string, because
// JSON object keys are always strings. The hand-written serde impls accept
// both spellings and always serialize values as numbers (serde_json
// stringifies numeric map keys itself).

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One of the two participant slots in a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PlayerSlot {
    One,
    Two,
}

impl PlayerSlot {
    /// Both slots, in assignment order.
    pub const BOTH: [PlayerSlot; 2] = [PlayerSlot::One, PlayerSlot::Two];

    /// The opposing slot.
    pub fn other(self) -> Self {
        match self {
            PlayerSlot::One => PlayerSlot::Two,
            PlayerSlot::Two => PlayerSlot::One,
        }
    }

    /// Wire representation (1 or 2).
    pub fn as_u8(self) -> u8 {
        match self {
            PlayerSlot::One => 1,
            PlayerSlot::Two => 2,
        }
    }

    /// Parse a wire value. Anything outside {1, 2} is not a slot.
    pub fn from_u8(n: u8) -> Option<Self> {
        match n {
            1 => Some(PlayerSlot::One),
            2 => Some(PlayerSlot::Two),
            _ => None,
        }
    }
}

impl fmt::Display for PlayerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

impl Serialize for PlayerSlot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

struct SlotVisitor;

impl Visitor<'_> for SlotVisitor {
    type Value = PlayerSlot;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a player slot (1 or 2)")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<PlayerSlot, E> {
        u8::try_from(v)
            .ok()
            .and_then(PlayerSlot::from_u8)
            .ok_or_else(|| E::invalid_value(de::Unexpected::Unsigned(v), &self))
    }

    // JSON object keys arrive as strings ("1", "2").
    fn visit_str<E: de::Error>(self, v: &str) -> Result<PlayerSlot, E> {
        v.parse::<u8>()
            .ok()
            .and_then(PlayerSlot::from_u8)
            .ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self))
    }
}

impl<'de> Deserialize<'de> for PlayerSlot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(SlotVisitor)
    }
}

/// A round choice. Wire form is the lowercase name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Choice {
    Rock,
    Paper,
    Scissors,
}

impl Choice {
    /// All three choices.
    pub const ALL: [Choice; 3] = [Choice::Rock, Choice::Paper, Choice::Scissors];

    /// Fixed dominance: rock beats scissors, scissors beats paper, paper
    /// beats rock. Equal choices beat nothing.
    pub fn beats(self, other: Choice) -> bool {
        matches!(
            (self, other),
            (Choice::Rock, Choice::Scissors)
                | (Choice::Scissors, Choice::Paper)
                | (Choice::Paper, Choice::Rock)
        )
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Choice::Rock => "rock",
            Choice::Paper => "paper",
            Choice::Scissors => "scissors",
        };
        f.write_str(name)
    }
}

/// Per-slot running tally. Counters only ever grow, and only as a side
/// effect of a fully resolved round.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
}

impl Score {
    /// Total resolved rounds this tally has seen.
    pub fn total(&self) -> u32 {
        self.wins + self.losses + self.draws
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_wire_form_is_a_number() {
        let json = serde_json::to_string(&PlayerSlot::One).unwrap();
        assert_eq!(json, "1");
        let json = serde_json::to_string(&PlayerSlot::Two).unwrap();
        assert_eq!(json, "2");
    }

    #[test]
    fn slot_parses_from_number_and_string() {
        let slot: PlayerSlot = serde_json::from_str("2").unwrap();
        assert_eq!(slot, PlayerSlot::Two);
        let slot: PlayerSlot = serde_json::from_str("\"1\"").unwrap();
        assert_eq!(slot, PlayerSlot::One);
    }

    #[test]
    fn slot_rejects_out_of_range() {
        assert!(serde_json::from_str::<PlayerSlot>("0").is_err());
        assert!(serde_json::from_str::<PlayerSlot>("3").is_err());
        assert!(serde_json::from_str::<PlayerSlot>("\"x\"").is_err());
    }

    #[test]
    fn slot_map_keys_roundtrip_as_strings() {
        use std::collections::BTreeMap;

        let mut scores = BTreeMap::new();
        scores.insert(PlayerSlot::One, Score::default());
        scores.insert(
            PlayerSlot::Two,
            Score {
                wins: 3,
                losses: 1,
                draws: 0,
            },
        );
        let json = serde_json::to_string(&scores).unwrap();
        assert!(json.contains("\"1\""), "map keys should be strings: {json}");
        assert!(json.contains("\"2\""), "map keys should be strings: {json}");

        let back: BTreeMap<PlayerSlot, Score> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, scores);
    }

    #[test]
    fn slot_other_flips() {
        assert_eq!(PlayerSlot::One.other(), PlayerSlot::Two);
        assert_eq!(PlayerSlot::Two.other(), PlayerSlot::One);
    }

    #[test]
    fn choice_wire_form_is_lowercase() {
        assert_eq!(serde_json::to_string(&Choice::Rock).unwrap(), "\"rock\"");
        let choice: Choice = serde_json::from_str("\"scissors\"").unwrap();
        assert_eq!(choice, Choice::Scissors);
    }

    #[test]
    fn choice_rejects_unknown_string() {
        assert!(serde_json::from_str::<Choice>("\"lizard\"").is_err());
        assert!(serde_json::from_str::<Choice>("\"Rock\"").is_err());
    }

    #[test]
    fn dominance_cycle() {
        assert!(Choice::Rock.beats(Choice::Scissors));
        assert!(Choice::Scissors.beats(Choice::Paper));
        assert!(Choice::Paper.beats(Choice::Rock));
        for choice in Choice::ALL {
            assert!(!choice.beats(choice));
        }
    }
}
