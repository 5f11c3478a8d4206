use rusqlite::Connection;

pub mod tables {
    pub const TRACKS: &str = "tracks";
    pub const LOADS: &str = "loads";

    pub const ALL_TABLES: &[&str] = &[TRACKS, LOADS];
}

pub mod columns {
    pub const TRACK_NAME: &str = "track_name";
    pub const ARTISTS: &str = "artists";
    pub const ALBUM_NAME: &str = "album_name";
    pub const TRACK_GENRE: &str = "track_genre";
    pub const DURATION_MINUTES: &str = "duration_minutes";
    pub const POPULARITY: &str = "popularity";
    pub const POPULARITY_TIER: &str = "popularity_tier";
    pub const DANCEABILITY: &str = "danceability";
    pub const DANCEABILITY_LABEL: &str = "danceability_label";
    pub const ENERGY: &str = "energy";
    pub const ENERGY_LABEL: &str = "energy_label";
    pub const EXPLICIT_LABEL: &str = "explicit_label";

    pub const BUCKET: &str = "bucket";
    pub const OBJECT_KEY: &str = "object_key";
    pub const ROWS: &str = "rows";
    pub const LOADED_AT: &str = "loaded_at";
}

pub use columns::*;
pub use tables::*;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tracks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    track_name TEXT NOT NULL,
    artists TEXT NOT NULL,
    album_name TEXT,
    track_genre TEXT,
    duration_minutes REAL,
    popularity REAL,
    popularity_tier TEXT,
    danceability REAL,
    danceability_label TEXT,
    energy REAL,
    energy_label TEXT,
    explicit_label TEXT
);

CREATE TABLE IF NOT EXISTS loads (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    bucket TEXT NOT NULL,
    object_key TEXT NOT NULL,
    rows INTEGER NOT NULL,
    loaded_at INTEGER NOT NULL
);
"#;

pub fn init(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA)
}
