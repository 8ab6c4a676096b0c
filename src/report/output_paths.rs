use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// `<base>/<YYYY>/<MM>/<DD>/<run-id>` so repeated runs never overwrite
/// each other.
pub fn run_directory(base: &Path, now: DateTime<Utc>) -> PathBuf {
    let date = now.format("%Y/%m/%d").to_string();
    base.join(date).join(Uuid::new_v4().to_string())
}

pub fn section_file(dir: &Path, slug: &str) -> PathBuf {
    dir.join(format!("{}.csv", slug))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_run_directory_layout() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        let dir = run_directory(Path::new("reports"), now);
        assert!(dir.starts_with("reports/2024/03/09"));
        assert_ne!(dir, run_directory(Path::new("reports"), now));
    }
}
