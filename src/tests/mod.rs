pub(crate) mod builder;
mod instrument_tests;
mod roundtrip_tests;

#[cfg(test)]
mod tests {
    use crate::find_class_files;
    use std::fs;

    #[test]
    fn class_files_are_found_recursively() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("com/example/ui")).unwrap();
        fs::write(dir.path().join("com/example/Game.class"), b"").unwrap();
        fs::write(dir.path().join("com/example/ui/Menu.class"), b"").unwrap();
        fs::write(dir.path().join("com/example/readme.txt"), b"").unwrap();

        let found = find_class_files(dir.path()).unwrap();
        let names: Vec<_> = found.iter().map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf()).collect();
        assert_eq!(names.len(), 2);
        assert!(names.iter().any(|p| p.ends_with("ui/Menu.class")));
        assert!(names.iter().all(|p| p.extension().unwrap() == "class"));
    }

    #[test]
    fn missing_directory_is_an_error() {
        assert!(find_class_files(std::path::Path::new("/nonexistent/classes")).is_err());
    }
}
