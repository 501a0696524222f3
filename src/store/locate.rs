use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// A `#<id>_<suffix>` experiment folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberedFolder {
    pub id: u64,
    pub suffix: String,
    pub path: PathBuf,
}

/// Split `#<id>_<suffix>` into its parts. The suffix must be non-empty.
pub fn parse_folder_name(name: &str) -> Option<(u64, &str)> {
    let (id, suffix) = name.strip_prefix('#')?.split_once('_')?;
    if suffix.is_empty() || id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((id.parse().ok()?, suffix))
}

fn directories(root: &Path) -> impl Iterator<Item = walkdir::DirEntry> {
    WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_dir())
}

/// Find the folder named `#<number>_<something>` anywhere below `root`.
///
/// `#7_` followed by at least one character matches 7; `#70_x` and a bare
/// `#7_` do not. The walk is depth-first with siblings in file-name order,
/// and the first hit wins.
pub fn find_numbered_folder(root: &Path, number: u64) -> Option<PathBuf> {
    let prefix = format!("#{number}_");
    let found = directories(root)
        .find(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(&prefix) && name.len() > prefix.len())
        })
        .map(|entry| entry.into_path());
    match &found {
        Some(path) => log::debug!("experiment #{number} found at {}", path.display()),
        None => log::debug!("no folder for experiment #{number} under {}", root.display()),
    }
    found
}

/// Every numbered folder below `root`, sorted by id then path.
pub fn numbered_folders(root: &Path) -> Vec<NumberedFolder> {
    let mut folders: Vec<NumberedFolder> = directories(root)
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?;
            let (id, suffix) = parse_folder_name(name)?;
            Some(NumberedFolder {
                id,
                suffix: suffix.to_string(),
                path: entry.path().to_path_buf(),
            })
        })
        .collect();
    folders.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.path.cmp(&b.path)));
    folders
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn tree(dirs: &[&str]) -> TempDir {
        let tmp = TempDir::new().unwrap();
        for d in dirs {
            fs::create_dir_all(tmp.path().join(d)).unwrap();
        }
        tmp
    }

    #[test]
    fn prefix_does_not_match_longer_numbers() {
        let tmp = tree(&["2024-05-01/#70_bar", "2024-05-02/#7_foo"]);
        let found = find_numbered_folder(tmp.path(), 7).unwrap();
        assert_eq!(found, tmp.path().join("2024-05-02/#7_foo"));

        let found = find_numbered_folder(tmp.path(), 70).unwrap();
        assert!(found.ends_with("#70_bar"));
    }

    #[test]
    fn bare_prefix_and_files_do_not_match() {
        let tmp = tree(&["#3_"]);
        fs::write(tmp.path().join("#3_file"), "").unwrap();
        assert_eq!(find_numbered_folder(tmp.path(), 3), None);
    }

    #[test]
    fn missing_root_finds_nothing() {
        assert_eq!(find_numbered_folder(Path::new("/nonexistent/storage"), 1), None);
    }

    #[test]
    fn first_match_in_name_order_wins() {
        let tmp = tree(&["b/#5_second", "a/#5_first"]);
        let found = find_numbered_folder(tmp.path(), 5).unwrap();
        assert!(found.ends_with("a/#5_first"));
    }

    #[test]
    fn lists_numbered_folders_by_id() {
        let tmp = tree(&["day1/#12_t1", "day1/#3_rabi", "day2/#100_ramsey", "day2/#x_bad", "#_none"]);
        let ids: Vec<(u64, String)> = numbered_folders(tmp.path())
            .into_iter()
            .map(|f| (f.id, f.suffix))
            .collect();
        assert_eq!(
            ids,
            vec![(3, "rabi".into()), (12, "t1".into()), (100, "ramsey".into())]
        );
    }

    #[test]
    fn parses_folder_names() {
        assert_eq!(parse_folder_name("#42_resonator_spec"), Some((42, "resonator_spec")));
        assert_eq!(parse_folder_name("#42_"), None);
        assert_eq!(parse_folder_name("42_x"), None);
        assert_eq!(parse_folder_name("#4a_x"), None);
    }
}
