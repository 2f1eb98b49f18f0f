use rand::Rng;
use storm_tape_client_instrumented::prelude::StagedFile;
use uuid::Uuid;

/// How file paths are made up for stage and archive info requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PathStyle {
    /// `/tape/dir{NNN}/file{NNN}` with each `NNN` picked between `001` and `100`. Paths repeat
    /// across requests, like a real catalogue with a fixed set of files.
    #[default]
    Indexed,
    /// `/tmp/testfile-{uuid}.txt`, unique for every file.
    Uuid,
}

impl PathStyle {
    fn path<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        match self {
            PathStyle::Indexed => format!(
                "/tape/dir{:03}/file{:03}",
                rng.gen_range(1..=100),
                rng.gen_range(1..=100)
            ),
            PathStyle::Uuid => format!("/tmp/testfile-{}.txt", Uuid::new_v4()),
        }
    }
}

/// Make up `count` file paths in the given style.
pub fn synthesize_paths(style: PathStyle, count: usize) -> Vec<StagedFile> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| StagedFile::new(style.path(&mut rng)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(part: &str, prefix: &str) -> u32 {
        let digits = part.strip_prefix(prefix).unwrap();
        assert_eq!(3, digits.len(), "{part} is not zero padded to three digits");
        digits.parse().unwrap()
    }

    #[test]
    fn indexed_paths_are_well_formed() {
        for count in [0, 1, 10, 200] {
            let files = synthesize_paths(PathStyle::Indexed, count);
            assert_eq!(count, files.len());

            for file in files {
                let parts: Vec<&str> = file.path.split('/').collect();
                assert_eq!(vec!["", "tape"], parts[..2]);
                assert_eq!(4, parts.len());
                assert!((1..=100).contains(&index(parts[2], "dir")));
                assert!((1..=100).contains(&index(parts[3], "file")));
            }
        }
    }

    #[test]
    fn uuid_paths_are_unique() {
        let files = synthesize_paths(PathStyle::Uuid, 20);
        assert_eq!(20, files.len());

        let mut paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        for path in &paths {
            let uuid = path
                .strip_prefix("/tmp/testfile-")
                .and_then(|p| p.strip_suffix(".txt"))
                .unwrap();
            assert!(Uuid::parse_str(uuid).is_ok());
        }
        paths.sort();
        paths.dedup();
        assert_eq!(20, paths.len());
    }
}
