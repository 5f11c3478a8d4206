use crate::{
    domain::record::{CanonicalRecord, RawRecord},
    normalize::{
        categorize::{DanceabilityLabel, EnergyLabel, ExplicitLabel, FlagValue, PopularityTier},
        duration::{parse_minutes, parse_number},
        resolver::{resolve, resolve_or},
    },
};

/// Column names seen for each logical field, highest priority first.
pub mod candidates {
    pub const TRACK_NAME: &[&str] = &["song", "track_name", "name"];
    pub const ARTISTS: &[&str] = &["Artist(s)", "artists", "artist_name", "artist"];
    pub const ALBUM: &[&str] = &["Album", "album", "album_name"];
    pub const GENRE: &[&str] = &["Genre", "genre", "track_genre"];
    pub const DURATION: &[&str] = &["Length", "duration", "duration_ms"];
    pub const POPULARITY: &[&str] = &["Popularity", "popularity"];
    pub const DANCEABILITY: &[&str] = &["Danceability", "danceability"];
    pub const ENERGY: &[&str] = &["Energy", "energy"];
    pub const EXPLICIT: &[&str] = &["Explicit", "explicit"];
}

use candidates::*;

/// Maps one input row onto the canonical schema.
///
/// Never fails: every missing or malformed value has a fallback, so any row,
/// including an empty one, yields a complete record.
pub fn normalize_row(raw: &RawRecord) -> CanonicalRecord {
    let text = |names: &[&str]| resolve_or(raw, names, "").trim().to_string();
    let number = |names: &[&str]| resolve(raw, names).and_then(parse_number);

    let popularity = number(POPULARITY);
    let danceability = number(DANCEABILITY);
    let energy = number(ENERGY);

    CanonicalRecord {
        track_name: text(TRACK_NAME),
        artists: text(ARTISTS),
        album: text(ALBUM),
        genre: text(GENRE).to_lowercase(),
        duration_minutes: parse_minutes(resolve(raw, DURATION)),
        popularity,
        popularity_tier: PopularityTier::from_popularity(popularity),
        danceability,
        danceability_label: DanceabilityLabel::from_danceability(danceability),
        energy,
        energy_label: EnergyLabel::from_energy(energy),
        explicit_label: ExplicitLabel::from_flag(resolve(raw, EXPLICIT).map(FlagValue::from)),
    }
}
