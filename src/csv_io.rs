use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::normalize::{fields, DurationBucket, NormalizedRecord, RatingBucket, RawRecord};

/// Column order of the scrape output.
pub const RAW_COLUMNS: [&str; 8] = [
    fields::RANK,
    fields::TITLE,
    fields::YEAR,
    fields::RUNTIME,
    fields::RATING,
    fields::VOTES,
    fields::VOTES_NUMERIC,
    fields::URL,
];

const BOM: char = '\u{feff}';

pub fn read_raw(path: &Path) -> Result<Vec<RawRecord>> {
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    read_raw_from(file).with_context(|| format!("Failed to read CSV {:?}", path))
}

/// Header row names the fields; empty cells are left out of the record.
pub fn read_raw_from<R: Read>(rdr: R) -> Result<Vec<RawRecord>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(rdr);
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches(BOM).trim().to_string())
        .collect();

    let mut out = Vec::new();
    for row in reader.records() {
        let row = row?;
        let rec = RawRecord::from_pairs(
            headers
                .iter()
                .zip(row.iter())
                .filter(|(_, v)| !v.trim().is_empty())
                .map(|(k, v)| (k.as_str(), v)),
        );
        if !rec.is_empty() {
            out.push(rec);
        }
    }
    Ok(out)
}

pub fn write_raw(path: &Path, records: &[RawRecord]) -> Result<usize> {
    let file = create(path)?;
    write_raw_to(file, records).with_context(|| format!("Failed to write {:?}", path))
}

pub fn write_raw_to<W: Write>(w: W, records: &[RawRecord]) -> Result<usize> {
    let mut writer = csv::Writer::from_writer(w);
    writer.write_record(RAW_COLUMNS)?;
    for r in records {
        writer.write_record(RAW_COLUMNS.iter().map(|c| r.get(c).unwrap_or("")))?;
    }
    writer.flush()?;
    Ok(records.len())
}

#[derive(Serialize)]
struct NormalizedRow<'a> {
    #[serde(rename = "Rank")]
    rank: Option<u32>,
    #[serde(rename = "Title")]
    title: &'a str,
    #[serde(rename = "Year")]
    year: Option<i32>,
    #[serde(rename = "Duration_Hours")]
    duration_hours: Option<f64>,
    #[serde(rename = "IMDb Rating")]
    rating: Option<f64>,
    #[serde(rename = "Votes_Numeric")]
    votes: Option<u64>,
    #[serde(rename = "URL")]
    url: Option<&'a str>,
    #[serde(rename = "Genres")]
    genres: String,
    #[serde(rename = "Primary_Genre")]
    primary_genre: &'a str,
    #[serde(rename = "Duration_Category")]
    duration_category: DurationBucket,
    #[serde(rename = "Rating_Category")]
    rating_category: RatingBucket,
}

impl<'a> From<&'a NormalizedRecord> for NormalizedRow<'a> {
    fn from(r: &'a NormalizedRecord) -> Self {
        NormalizedRow {
            rank: r.rank,
            title: &r.title,
            year: r.year,
            duration_hours: r.duration_hours,
            rating: r.rating,
            votes: r.votes,
            url: r.url.as_deref(),
            genres: r.genres_joined(),
            primary_genre: r.primary_genre,
            duration_category: r.duration_bucket,
            rating_category: r.rating_bucket,
        }
    }
}

pub fn write_normalized(path: &Path, records: &[NormalizedRecord]) -> Result<usize> {
    let file = create(path)?;
    write_normalized_to(file, records).with_context(|| format!("Failed to write {:?}", path))
}

pub fn write_normalized_to<W: Write>(w: W, records: &[NormalizedRecord]) -> Result<usize> {
    let mut writer = csv::Writer::from_writer(w);
    for r in records {
        writer.serialize(NormalizedRow::from(r))?;
    }
    writer.flush()?;
    Ok(records.len())
}

fn create(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {:?}", parent))?;
    }
    File::create(path).with_context(|| format!("Failed to create {:?}", path))
}
