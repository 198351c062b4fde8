//! Shared helpers for cache integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use oxicache::DiskLruCache;

/// App version used by every integration test.
pub const APP_VERSION: u32 = 100;

/// Values per entry used by every integration test.
pub const VALUE_COUNT: usize = 2;

/// Open a two-value cache in `dir` with the given byte budget.
pub fn open_cache(dir: &Path, max_size: u64) -> DiskLruCache {
    DiskLruCache::open(dir, APP_VERSION, VALUE_COUNT, max_size).unwrap()
}

/// Commit `values` under `key` in one edit.
pub fn set_values(cache: &DiskLruCache, key: &str, values: &[&str]) {
    let mut editor = cache.edit(key).unwrap().unwrap();
    for (index, value) in values.iter().enumerate() {
        editor.set(index, value).unwrap();
    }
    editor.commit().unwrap();
}

/// Read all values for `key`, or `None` if the key is absent.
pub fn read_values(cache: &DiskLruCache, key: &str) -> Option<Vec<String>> {
    let snapshot = cache.get(key).unwrap()?;
    let values = (0..VALUE_COUNT)
        .map(|index| snapshot.string(index).unwrap())
        .collect();
    Some(values)
}

/// All journal lines, header included.
pub fn journal_lines(dir: &Path) -> Vec<String> {
    fs::read_to_string(dir.join("journal"))
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Journal operation lines, with the five header lines stripped.
pub fn journal_body(dir: &Path) -> Vec<String> {
    journal_lines(dir).split_off(5)
}

/// Poll `condition` for up to two seconds, for background-task effects.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
    condition()
}
