//! Month grouping
//!
//! Buckets photos by the (year, month) of their effective timestamp,
//! newest month first and newest photo first within a month.

use chrono::{DateTime, Datelike, Month, Utc};
use std::collections::BTreeMap;

use crate::data::{Identified, LocalPhoto, PhotoGroup, PhotoRecord, ServerPhoto};

/// Group photos by capture month using the current time as fallback
pub fn group_photos_by_month(photos: &[PhotoRecord]) -> Vec<PhotoGroup> {
    group_photos_by_month_at(photos, Utc::now())
}

/// Group photos by capture month
///
/// Local photos lacking both creation and modification time are
/// placed at `now`. Photos whose timestamp cannot be resolved (an
/// unparseable server date, an out-of-range millis value) are logged
/// and left out.
pub fn group_photos_by_month_at(photos: &[PhotoRecord], now: DateTime<Utc>) -> Vec<PhotoGroup> {
    let mut dated: Vec<(DateTime<Utc>, &PhotoRecord)> = photos
        .iter()
        .filter_map(|photo| match photo.effective_timestamp(now) {
            Some(ts) => Some((ts, photo)),
            None => {
                tracing::warn!(photo_id = %photo.id(), "Invalid date for photo, skipping");
                None
            }
        })
        .collect();

    // stable: equal timestamps keep input order
    dated.sort_by(|a, b| b.0.cmp(&a.0));

    let mut buckets: BTreeMap<(i32, u32), Vec<PhotoRecord>> = BTreeMap::new();
    for (ts, photo) in dated {
        buckets
            .entry((ts.year(), ts.month0()))
            .or_default()
            .push(photo.clone());
    }

    buckets
        .into_iter()
        .rev()
        .map(|((year, month_index), photos)| PhotoGroup {
            month: month_name(month_index),
            year,
            month_index,
            photos,
        })
        .collect()
}

/// Merge both photo sources into one list of records
pub fn merge_sources(local: &[LocalPhoto], server: &[ServerPhoto]) -> Vec<PhotoRecord> {
    local
        .iter()
        .cloned()
        .map(PhotoRecord::Local)
        .chain(server.iter().cloned().map(PhotoRecord::Server))
        .collect()
}

fn month_name(month_index: u32) -> String {
    Month::try_from(month_index as u8 + 1)
        .map(|month| month.name().to_string())
        .unwrap_or_default()
}
