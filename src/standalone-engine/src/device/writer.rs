// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Serialize;

use crate::build_err;
use crate::common::Result;

/// EmitReport lists which files an emission touched, relative to the
/// project directory.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EmitReport {
    pub written: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
}

fn io_error(path: &Path, err: io::Error) -> Result<()> {
    build_err!(Io, format!("{}: {}", path.display(), err))
}

/// CppWriter writes files below a project directory, leaving files whose
/// contents are already up to date untouched so that `make` doesn't
/// rebuild them.
pub struct CppWriter {
    project_dir: PathBuf,
    pub source_files: Vec<String>,
    pub header_files: Vec<String>,
    report: EmitReport,
}

impl CppWriter {
    pub fn new(project_dir: &Path) -> Self {
        CppWriter {
            project_dir: project_dir.to_owned(),
            source_files: vec![],
            header_files: vec![],
            report: EmitReport::default(),
        }
    }

    pub fn ensure_dir(&self, dir: &str) -> Result<()> {
        let path = self.project_dir.join(dir);
        if let Err(err) = fs::create_dir_all(&path) {
            return io_error(&path, err);
        }
        Ok(())
    }

    /// write stores a C++ file and records it for the makefile.
    pub fn write(&mut self, filename: &str, contents: &str) -> Result<()> {
        if filename.ends_with(".cpp") {
            self.source_files.push(filename.to_owned());
        } else if filename.ends_with(".h") {
            self.header_files.push(filename.to_owned());
        }
        self.write_bytes(filename, contents.as_bytes())
    }

    /// write_bytes stores any file, source or data, if its contents
    /// changed.
    pub fn write_bytes(&mut self, filename: &str, contents: &[u8]) -> Result<()> {
        let relative = PathBuf::from(filename);
        let path = self.project_dir.join(&relative);

        if let Ok(existing) = fs::read(&path) {
            if existing == contents {
                debug!("unchanged {}", relative.display());
                self.report.unchanged.push(relative);
                return Ok(());
            }
        }

        if let Some(parent) = path.parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                return io_error(parent, err);
            }
        }
        if let Err(err) = fs::write(&path, contents) {
            return io_error(&path, err);
        }
        debug!("wrote {}", relative.display());
        self.report.written.push(relative);
        Ok(())
    }

    pub fn into_report(self) -> EmitReport {
        self.report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unchanged_files_are_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();

        let mut writer = CppWriter::new(dir.path());
        writer.write("main.cpp", "int main() {}\n").unwrap();
        writer.write("code_objects/a.h", "void _run_a();\n").unwrap();
        writer.write_bytes("static_arrays/x", &[1, 2, 3]).unwrap();
        assert_eq!(vec!["main.cpp"], writer.source_files);
        assert_eq!(vec!["code_objects/a.h"], writer.header_files);
        let report = writer.into_report();
        assert_eq!(3, report.written.len());
        assert!(report.unchanged.is_empty());

        let mut writer = CppWriter::new(dir.path());
        writer.write("main.cpp", "int main() {}\n").unwrap();
        writer.write("code_objects/a.h", "void _run_a(); // changed\n").unwrap();
        writer.write_bytes("static_arrays/x", &[1, 2, 3]).unwrap();
        let report = writer.into_report();
        assert_eq!(vec![PathBuf::from("code_objects/a.h")], report.written);
        assert_eq!(
            vec![PathBuf::from("main.cpp"), PathBuf::from("static_arrays/x")],
            report.unchanged
        );
        assert_eq!(
            "void _run_a(); // changed\n",
            fs::read_to_string(dir.path().join("code_objects/a.h")).unwrap()
        );
    }
}
