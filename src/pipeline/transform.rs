use std::io::{Read, Write};

use serde::Serialize;

use crate::{
    config::{StorageConfig, TransformConfig},
    domain::record::{CANONICAL_FIELDS, RawRecord},
    normalize::normalize_row,
    pipeline::request::ObjectEvent,
    storage::{error::StorageError, objects::ObjectStore},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformReport {
    pub status: &'static str,
    pub input_bucket: String,
    pub input_key: String,
    pub output_bucket: String,
    pub output_key: String,
    pub rows: usize,
}

/// Normalizes every row of a csv stream into a canonical csv stream.
///
/// The canonical header is always written, even for an input without rows.
/// Returns the number of rows written.
pub fn transform_stream<R: Read, W: Write>(
    input: R,
    output: W,
    progress_every: usize,
) -> Result<usize, StorageError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(input);
    let headers = reader.headers()?.clone();

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(output);
    writer.write_record(CANONICAL_FIELDS)?;

    let mut rows = 0;
    let mut record = csv::StringRecord::new();
    while reader.read_record(&mut record)? {
        let raw = RawRecord::from_csv(&headers, &record);
        writer.serialize(normalize_row(&raw))?;
        rows += 1;

        if progress_every > 0 && rows % progress_every == 0 {
            log::info!("Transformed {rows} rows...");
        }
    }

    writer.flush()?;
    Ok(rows)
}

/// `exports/tracks.csv` becomes `exports/tracks_transformed.csv`.
///
/// Every `.csv` in the key is rewritten, so `a.csv.gz` becomes
/// `a_transformed.csv.gz`. A key without `.csv` gets the suffix appended.
pub fn transformed_key(key: &str) -> String {
    if key.contains(".csv") {
        key.replace(".csv", "_transformed.csv")
    } else {
        format!("{key}_transformed.csv")
    }
}

/// Fetches a raw export, normalizes it through a local scratch file, and uploads the result.
pub fn run_transform(
    store: &ObjectStore,
    storage: &StorageConfig,
    config: &TransformConfig,
    event: ObjectEvent,
) -> Result<TransformReport, StorageError> {
    let input = event.resolve(storage.raw_bucket())?;
    let output_bucket = storage
        .transformed_bucket()
        .unwrap_or(&input.bucket)
        .to_string();
    let output_key = transformed_key(&input.key);

    log::info!("Reading raw export from {}/{}", input.bucket, input.key);
    let source = store.open(&input.bucket, &input.key)?;

    // removed on drop, whichever way this returns
    let mut scratch = tempfile::Builder::new()
        .prefix("trackflow-")
        .suffix("_transformed.csv")
        .tempfile()?;
    log::debug!("Writing transformed rows to {}", scratch.path().to_string_lossy());

    let rows = transform_stream(source, scratch.as_file_mut(), config.progress_every)?;
    store.put_file(&output_bucket, &output_key, scratch.path())?;

    log::info!("Transformed {rows} rows into {output_bucket}/{output_key}");
    Ok(TransformReport {
        status: "ok",
        input_bucket: input.bucket,
        input_key: input.key,
        output_bucket,
        output_key,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn transform_str(input: &str) -> anyhow::Result<(usize, String)> {
        let mut out = Vec::new();
        let rows = transform_stream(input.as_bytes(), &mut out, 0)?;
        Ok((rows, String::from_utf8(out)?))
    }

    #[test]
    fn test_stream_writes_canonical_rows() -> anyhow::Result<()> {
        let input = "\
song,Artist(s),Length,Popularity,Danceability,Energy,Explicit,Genre
 Hello ,Adele,4:55,72,48,43,no,Soul
Bad Guy,Billie Eilish,3:14,39.5,70,42.5,yes,POP
";

        let (rows, text) = transform_str(input)?;
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(rows, 2);
        assert_eq!(lines[0], CANONICAL_FIELDS.join(","));
        assert!(lines[1].starts_with("Hello,Adele,,soul,"));
        assert!(lines[1].ends_with(",72.0,High,48.0,Low,43.0,Medium,Clean"));
        assert!(lines[2].ends_with(",39.5,Low,70.0,Danceable,42.5,Medium,Explicit"));

        Ok(())
    }

    #[test]
    fn test_stream_short_and_garbage_rows() -> anyhow::Result<()> {
        let input = "\
track_name,artists,duration_ms,popularity
Only Name
x,y,abcd,n/a
";

        let (rows, text) = transform_str(input)?;
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(rows, 2);
        assert_eq!(lines[1], "Only Name,,,,,,Unknown,,Unknown,,Unknown,Clean");
        assert_eq!(lines[2], "x,y,,,,,Unknown,,Unknown,,Unknown,Clean");

        Ok(())
    }

    #[test]
    fn test_stream_empty_input_writes_header() -> anyhow::Result<()> {
        let (rows, text) = transform_str("")?;

        assert_eq!(rows, 0);
        assert_eq!(text.trim_end(), CANONICAL_FIELDS.join(","));

        Ok(())
    }

    #[test]
    fn test_stream_tolerates_bom() -> anyhow::Result<()> {
        let (_, text) = transform_str("\u{feff}song,artist\nIntro,The xx\n")?;

        assert!(text.lines().nth(1).unwrap().starts_with("Intro,The xx,"));

        Ok(())
    }

    #[test]
    fn test_transformed_key() {
        assert_eq!(transformed_key("tracks.csv"), "tracks_transformed.csv");
        assert_eq!(
            transformed_key("exports/2024/tracks.csv"),
            "exports/2024/tracks_transformed.csv"
        );
        assert_eq!(transformed_key("dump"), "dump_transformed.csv");
        assert_eq!(transformed_key("a.csv.gz"), "a_transformed.csv.gz");
    }

    #[test]
    fn test_run_transform_uploads_result() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let store = ObjectStore::new(dir.path());
        store.put("raw", "in/tracks.csv", b"name,genre\nSong, Rock \n")?;

        let storage = StorageConfig {
            root: dir.path().to_path_buf(),
            raw_bucket: Some("raw".into()),
            transformed_bucket: Some("canonical".into()),
        };
        let report = run_transform(
            &store,
            &storage,
            &TransformConfig::default(),
            ObjectEvent::for_key(None, "in/tracks.csv"),
        )?;

        assert_eq!(report.rows, 1);
        assert_eq!(report.output_bucket, "canonical");
        assert_eq!(report.output_key, "in/tracks_transformed.csv");

        let out = String::from_utf8(store.get("canonical", "in/tracks_transformed.csv")?)?;
        assert!(out.lines().nth(1).unwrap().starts_with("Song,,,rock,"));

        Ok(())
    }

    fn export_with(prefix: &str, rows: usize) -> String {
        let mut csv = String::from("song,Artist(s)\n");
        for i in 0..rows {
            csv.push_str(&format!("{prefix}{i},{prefix}\n"));
        }
        csv
    }

    #[test]
    fn test_concurrent_transforms_with_same_basename() -> anyhow::Result<()> {
        const ROWS: usize = 20_000;
        let dir = tempdir()?;
        let store = ObjectStore::new(dir.path());
        store.put("raw", "x/tracks.csv", export_with("x", ROWS).as_bytes())?;
        store.put("raw", "y/tracks.csv", export_with("y", ROWS).as_bytes())?;

        let storage = StorageConfig {
            root: dir.path().to_path_buf(),
            raw_bucket: Some("raw".into()),
            transformed_bucket: Some("canonical".into()),
        };
        let config = TransformConfig::default();

        for _ in 0..5 {
            let (x, y) = std::thread::scope(|s| {
                let run = |key: &'static str| {
                    let (store, storage, config) = (&store, &storage, &config);
                    s.spawn(move || {
                        run_transform(store, storage, config, ObjectEvent::for_key(None, key))
                    })
                };
                let x = run("x/tracks.csv");
                let y = run("y/tracks.csv");
                (x.join(), y.join())
            });
            assert_eq!(x.map_err(|_| anyhow::anyhow!("x panicked"))??.rows, ROWS);
            assert_eq!(y.map_err(|_| anyhow::anyhow!("y panicked"))??.rows, ROWS);

            for side in ["x", "y"] {
                let out = String::from_utf8(
                    store.get("canonical", &format!("{side}/tracks_transformed.csv"))?,
                )?;
                let rows: Vec<_> = out.lines().skip(1).collect();
                assert_eq!(rows.len(), ROWS);
                assert!(rows.iter().all(|row| row.starts_with(side)), "{side}");
            }
        }

        Ok(())
    }

    #[test]
    fn test_run_transform_missing_object() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let store = ObjectStore::new(dir.path());
        let storage = StorageConfig {
            root: dir.path().to_path_buf(),
            raw_bucket: Some("raw".into()),
            transformed_bucket: None,
        };

        let err = run_transform(
            &store,
            &storage,
            &TransformConfig::default(),
            ObjectEvent::for_key(None, "missing.csv"),
        )
        .unwrap_err();

        assert!(matches!(err, StorageError::ObjectNotFound { .. }));
        Ok(())
    }
}
