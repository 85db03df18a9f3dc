//! Company name input.

use std::fs;
use std::io;
use std::path::Path;

/// Names from the command line followed by names from `file`, if given.
///
/// File lines are trimmed; blank lines and lines starting with `#` are
/// skipped. Duplicates are kept so that every requested name gets a row.
pub(crate) fn collect_names(args: &[String], file: Option<&Path>) -> io::Result<Vec<String>> {
    let mut names: Vec<String> = args
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();
    if let Some(path) = file {
        names.extend(parse_names(&fs::read_to_string(path)?));
    }
    Ok(names)
}

fn parse_names(content: &str) -> impl Iterator<Item = String> + '_ {
    content
        .lines()
        .map(|line| line.trim().trim_start_matches('\u{feff}'))
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;

    #[rstest]
    #[case("トヨタ自動車\nSony Group\n", &["トヨタ自動車", "Sony Group"])]
    #[case("# header\n\n  Acme Data  \n#Beta\n", &["Acme Data"])]
    #[case("\u{feff}Acme Data\r\nAcme Data\r\n", &["Acme Data", "Acme Data"])]
    #[case("", &[])]
    fn test_parse_names(#[case] content: &str, #[case] expected: &[&str]) {
        let names: Vec<String> = parse_names(content).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_collect_names_appends_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# companies").unwrap();
        writeln!(file, "ソニーグループ").unwrap();

        let args = vec!["Acme Data".to_string(), "  ".to_string()];
        let names = collect_names(&args, Some(file.path())).unwrap();
        assert_eq!(names, ["Acme Data", "ソニーグループ"]);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("names.txt");
        assert!(collect_names(&[], Some(missing.as_path())).is_err());
    }
}
