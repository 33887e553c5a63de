use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::Config;
use crate::error::Result;
use crate::walk::{self, ExcludeMatcher};

/// Sum the sizes of everything a backup would archive: regular files in
/// the include roots that pass the exclude matcher. Pre-compression bytes,
/// purely local, walked concurrently per root.
pub fn run(config: &Config) -> Result<u64> {
    let matcher = ExcludeMatcher::new(&config.exclude_patterns)?;
    let total = AtomicU64::new(0);

    std::thread::scope(|s| {
        for root in &config.include_dirs {
            let total = &total;
            let matcher = &matcher;
            s.spawn(move || {
                walk::walk_root(root, matcher, &mut |entry| {
                    total.fetch_add(entry.size, Ordering::Relaxed);
                    true
                });
            });
        }
    });

    Ok(total.load(Ordering::Relaxed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sums_across_roots_with_exclusions() {
        let tmp = tempfile::tempdir().unwrap();
        let d1 = tmp.path().join("d1");
        let d2 = tmp.path().join("d2");
        std::fs::create_dir_all(&d1).unwrap();
        std::fs::create_dir_all(&d2).unwrap();
        std::fs::write(d1.join("kept.txt"), vec![1u8; 100]).unwrap();
        std::fs::write(d1.join("skipped.log"), vec![1u8; 4000]).unwrap();
        std::fs::write(d2.join("also.txt"), vec![1u8; 23]).unwrap();

        let config = Config {
            include_dirs: vec![
                d1.to_string_lossy().to_string(),
                d2.to_string_lossy().to_string(),
            ],
            exclude_patterns: vec!["*.log".into()],
            ..Config::default()
        };

        assert_eq!(run(&config).unwrap(), 123);
    }

    #[test]
    fn empty_config_sums_to_zero() {
        assert_eq!(run(&Config::default()).unwrap(), 0);
    }
}
