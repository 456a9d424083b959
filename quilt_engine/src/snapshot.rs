//! Game context snapshot -- the host's view of the current game state.
//!
//! The host pushes a new [`GameSnapshot`] whenever the context changes (day start,
//! location change, language change). Built-in tokens read their values from it.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Number of days in every in-game month.
pub const DAYS_PER_MONTH: u8 = 28;

/// Error returned when a calendar/context name can't be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{value}' is not a valid {kind}")]
pub struct ParseNameError {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! named_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal, [$($variant:ident => $text:literal),+ $(,)?]) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ::serde::Serialize, ::serde::Deserialize)]
        $(#[$meta])*
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::snapshot::ParseNameError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(trimmed))
                    .ok_or_else(|| $crate::snapshot::ParseNameError {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }
    };
}
pub(crate) use named_enum;

named_enum!(
    /// The four seasons, in calendar order.
    Season, "season", [Spring => "Spring", Summer => "Summer", Fall => "Fall", Winter => "Winter"]
);

named_enum!(
    /// Days of the week; day 1 of every month is a Monday.
    DayOfWeek, "day of week", [
        Monday => "Monday",
        Tuesday => "Tuesday",
        Wednesday => "Wednesday",
        Thursday => "Thursday",
        Friday => "Friday",
        Saturday => "Saturday",
        Sunday => "Sunday",
    ]
);

named_enum!(
    Weather, "weather", [Sun => "Sun", Rain => "Rain", Snow => "Snow", Storm => "Storm", Wind => "Wind"]
);

named_enum!(
    /// Game display languages, by language code.
    #[serde(rename_all = "lowercase")]
    Language, "language", [
        De => "de", En => "en", Es => "es", Fr => "fr", Hu => "hu", It => "it",
        Ja => "ja", Ko => "ko", Pt => "pt", Ru => "ru", Tr => "tr", Zh => "zh",
    ]
);

impl DayOfWeek {
    /// The weekday a day of the month falls on.
    ///
    /// Returns `None` for days outside `1..=DAYS_PER_MONTH`.
    pub fn for_day(day: u8) -> Option<DayOfWeek> {
        (1..=DAYS_PER_MONTH)
            .contains(&day)
            .then(|| DayOfWeek::ALL[usize::from((day - 1) % 7)])
    }

    /// Every day of the month falling on this weekday (always four days).
    pub fn days(self) -> [u8; 4] {
        let first = match self {
            DayOfWeek::Monday => 1,
            DayOfWeek::Tuesday => 2,
            DayOfWeek::Wednesday => 3,
            DayOfWeek::Thursday => 4,
            DayOfWeek::Friday => 5,
            DayOfWeek::Saturday => 6,
            DayOfWeek::Sunday => 7,
        };
        [first, first + 7, first + 14, first + 21]
    }
}

/// Snapshot of the game context consumed by the built-in tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct GameSnapshot {
    /// False before a save is loaded; save-dependent tokens are not ready until then.
    pub world_ready: bool,
    pub day: u8,
    pub season: Season,
    pub year: u32,
    pub weather: Weather,
    pub language: Language,
    pub day_event: Option<String>,
    pub spouse: Option<String>,
    pub flags: BTreeSet<String>,
    pub seen_events: BTreeSet<String>,
    pub installed_mods: BTreeSet<String>,
    /// NPC name to friendship hearts.
    pub hearts: BTreeMap<String, u32>,
    /// NPC name to relationship status.
    pub relationships: BTreeMap<String, String>,
}

impl Default for GameSnapshot {
    fn default() -> Self {
        Self {
            world_ready: true,
            day: 1,
            season: Season::Spring,
            year: 1,
            weather: Weather::Sun,
            language: Language::En,
            day_event: None,
            spouse: None,
            flags: BTreeSet::new(),
            seen_events: BTreeSet::new(),
            installed_mods: BTreeSet::new(),
            hearts: BTreeMap::new(),
            relationships: BTreeMap::new(),
        }
    }
}

impl GameSnapshot {
    /// A snapshot taken before any save is loaded.
    pub fn title_screen() -> Self {
        Self {
            world_ready: false,
            ..Self::default()
        }
    }

    pub fn day_of_week(&self) -> Option<DayOfWeek> {
        DayOfWeek::for_day(self.day)
    }
}
