//! Output file naming.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Pick an unused output path `chart_<conversation>_<millis>.png` in `dir`.
///
/// If a file with that name already exists the millisecond stamp is bumped
/// until a free name is found, so an earlier chart is never overwritten.
pub fn chart_output_path(dir: &Path, conversation_id: Uuid, now: DateTime<Utc>) -> PathBuf {
    let mut stamp = now.timestamp_millis();
    loop {
        let candidate = dir.join(format!("chart_{}_{}.png", conversation_id, stamp));
        if !candidate.exists() {
            return candidate;
        }
        stamp += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_output_path_format() {
        let dir = tempfile::tempdir().unwrap();
        let id = Uuid::new_v4();
        let now = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();

        let path = chart_output_path(dir.path(), id, now);
        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            format!("chart_{}_1700000000123.png", id)
        );
        assert_eq!(path.parent().unwrap(), dir.path());
    }

    #[test]
    fn test_output_path_never_reuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let id = Uuid::new_v4();
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();

        let first = chart_output_path(dir.path(), id, now);
        std::fs::write(&first, b"png").unwrap();
        let second = chart_output_path(dir.path(), id, now);
        std::fs::write(&second, b"png").unwrap();
        let third = chart_output_path(dir.path(), id, now);

        assert_ne!(first, second);
        assert_ne!(second, third);
        assert!(third.to_string_lossy().ends_with("_1700000000002.png"));
    }
}
