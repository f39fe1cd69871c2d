//! Reverse index from content id to the dates it was studied on.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use st_core::{ContentId, VideoIndexEntry};

use crate::{KvStore, StoreError, get_json, set_json};

/// Storage key of the whole index.
pub const VIDEO_INDEX_KEY: &str = "index_videos";

pub type VideoIndexMap = BTreeMap<ContentId, VideoIndexEntry>;

/// Typed view over [`VIDEO_INDEX_KEY`].
#[derive(Debug, Clone, Copy)]
pub struct VideoIndex<'a, K> {
    kv: &'a K,
}

impl<'a, K: KvStore> VideoIndex<'a, K> {
    pub const fn new(kv: &'a K) -> Self {
        Self { kv }
    }

    /// The whole index, with legacy entries upgraded.
    pub fn all(&self) -> Result<VideoIndexMap, StoreError> {
        let stored: BTreeMap<String, VideoIndexEntry> =
            get_json(self.kv, VIDEO_INDEX_KEY)?.unwrap_or_default();
        Ok(stored
            .into_iter()
            .filter_map(|(id, entry)| match ContentId::new(id.as_str()) {
                Ok(id) => Some((id, entry)),
                Err(err) => {
                    tracing::warn!(key = %id, error = %err, "dropping index entry with invalid content id");
                    None
                }
            })
            .collect())
    }

    pub fn get_entry(&self, id: &ContentId) -> Result<Option<VideoIndexEntry>, StoreError> {
        Ok(self.all()?.remove(id))
    }

    /// Dates `id` was studied on, ascending and without duplicates.
    pub fn get_video_dates(&self, id: &ContentId) -> Result<Vec<NaiveDate>, StoreError> {
        Ok(self
            .get_entry(id)?
            .map(|entry| entry.dates.into_iter().collect())
            .unwrap_or_default())
    }

    /// Records that `id` was studied on `date`.
    pub fn update_video_index(
        &self,
        id: &ContentId,
        date: NaiveDate,
        title: Option<&str>,
    ) -> Result<(), StoreError> {
        self.update_many(date, [(id, title)])
    }

    /// Records several videos studied on `date` in one write.
    ///
    /// Adding a date twice is a no-op. A cached title is kept once set and is
    /// never replaced by a blank one.
    pub fn update_many<'v>(
        &self,
        date: NaiveDate,
        videos: impl IntoIterator<Item = (&'v ContentId, Option<&'v str>)>,
    ) -> Result<(), StoreError> {
        let mut index = self.all()?;
        let mut touched = 0usize;
        for (id, title) in videos {
            let entry = index.entry(id.clone()).or_default();
            entry.dates.insert(date);
            if entry.title.trim().is_empty() {
                if let Some(title) = title.map(str::trim).filter(|t| !t.is_empty()) {
                    entry.title = title.to_string();
                }
            }
            touched += 1;
        }
        if touched == 0 {
            return Ok(());
        }
        set_json(self.kv, VIDEO_INDEX_KEY, &index)?;
        tracing::debug!(%date, videos = touched, "updated video index");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryKv;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn id(s: &str) -> ContentId {
        ContentId::new(s).unwrap()
    }

    #[test]
    fn dates_are_deduplicated_and_sorted() {
        let kv = MemoryKv::default();
        let index = VideoIndex::new(&kv);
        let bv = id("BV1xx411c7mD");
        for d in [5, 2, 5, 9, 2] {
            index.update_video_index(&bv, date(d), None).unwrap();
        }
        assert_eq!(
            index.get_video_dates(&bv).unwrap(),
            vec![date(2), date(5), date(9)]
        );
        assert!(index.get_video_dates(&id("unknown")).unwrap().is_empty());
    }

    #[test]
    fn title_is_first_seen_and_never_blanked() {
        let kv = MemoryKv::default();
        let index = VideoIndex::new(&kv);
        let bv = id("BV1");
        index.update_video_index(&bv, date(1), Some("  ")).unwrap();
        index.update_video_index(&bv, date(1), Some("Thermodynamics")).unwrap();
        index.update_video_index(&bv, date(2), Some("")).unwrap();
        index.update_video_index(&bv, date(3), Some("Renamed")).unwrap();
        assert_eq!(index.get_entry(&bv).unwrap().unwrap().title, "Thermodynamics");
    }

    #[test]
    fn legacy_shape_is_read_and_rewritten() {
        let kv = MemoryKv::default();
        kv.set(
            VIDEO_INDEX_KEY,
            r#"{"BV1":["2025-01-03","2025-01-01","2025-01-03"],"BV2":{"title":"Optics","dates":["2025-01-02"]}}"#,
        )
        .unwrap();
        let index = VideoIndex::new(&kv);
        assert_eq!(
            index.get_video_dates(&id("BV1")).unwrap(),
            vec![date(1), date(3)]
        );

        index.update_video_index(&id("BV2"), date(4), None).unwrap();
        let raw = kv.get(VIDEO_INDEX_KEY).unwrap().unwrap();
        insta::assert_snapshot!(raw, @r#"{"BV1":{"title":"","dates":["2025-01-01","2025-01-03"]},"BV2":{"title":"Optics","dates":["2025-01-02","2025-01-04"]}}"#);
    }

    #[test]
    fn entries_with_blank_ids_are_skipped() {
        let kv = MemoryKv::default();
        kv.set(
            VIDEO_INDEX_KEY,
            r#"{"  ":["2025-01-01"],"BV1":{"title":"Optics","dates":["2025-01-02"]}}"#,
        )
        .unwrap();
        let all = VideoIndex::new(&kv).all().unwrap();
        assert_eq!(all.keys().collect::<Vec<_>>(), vec![&id("BV1")]);
    }

    #[test]
    fn empty_update_writes_nothing() {
        let kv = MemoryKv::default();
        let none: [(&ContentId, Option<&str>); 0] = [];
        VideoIndex::new(&kv).update_many(date(1), none).unwrap();
        assert!(kv.is_empty());
    }
}
