use std::path::Path;

pub fn get_filenames_in_folder(path: &Path) -> Vec<String> {
    let mut files = std::fs::read_dir(path)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect::<Vec<_>>();

    files.sort();
    files
}

/// Lines of a newline separated file, sorted, blank lines removed.
pub fn get_sorted_lines(path: &Path) -> Vec<String> {
    let mut lines = std::fs::read_to_string(path)
        .expect("read file")
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();

    lines.sort();
    lines
}
