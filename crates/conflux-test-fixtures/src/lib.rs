//! Test fixtures for conflux loader testing
//!
//! Source trees are written to a temporary directory laid out the way the
//! filesystem build context expects: `<root>/<import path>/*.cfx`, with
//! symbol data at `<root>/<import path>.cfxsym`.

use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

/// Prepared source trees
pub enum FixtureType {
    /// `main`: a single file with no imports
    MainOnly,
    /// `lib` importing `lib/sub`
    LibAndSub,
    /// `a` and `b` importing each other
    ImportCycle,
    /// `fmt` with an in-package test file and an external `fmt_test` file
    WithTests,
    /// `app` importing `text/strs`, available only as symbol data that
    /// mentions `text/runes`
    SymbolDeps,
    /// `app` importing `bad`, which has a type error
    TypeError,
}

/// Temporary source tree, removed on drop
pub struct TestFixtures {
    temp_dir: tempfile::TempDir,
}

impl Default for TestFixtures {
    fn default() -> Self {
        Self::new()
    }
}

impl TestFixtures {
    pub fn new() -> Self {
        Self {
            temp_dir: tempfile::tempdir().unwrap(),
        }
    }

    /// A tree holding one of the prepared layouts
    pub fn with(fixture_type: FixtureType) -> Self {
        let fixtures = Self::new();
        fixtures.setup(fixture_type);
        fixtures
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write a file relative to the root, creating directories as needed
    pub fn write_file(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
        path
    }

    /// Write the files of the package at `import_path`
    pub fn write_package(&self, import_path: &str, files: &[(&str, &str)]) -> &Self {
        for (name, src) in files {
            self.write_file(&format!("{}/{}", import_path, name), src);
        }
        self
    }

    /// Write symbol data for `import_path`
    pub fn write_symbols(&self, import_path: &str, data: serde_json::Value) -> PathBuf {
        let contents = serde_json::to_string_pretty(&data).unwrap();
        self.write_file(&format!("{}.cfxsym", import_path), &contents)
    }

    pub fn setup(&self, fixture_type: FixtureType) -> PathBuf {
        match fixture_type {
            FixtureType::MainOnly => self.setup_main_only(),
            FixtureType::LibAndSub => self.setup_lib_and_sub(),
            FixtureType::ImportCycle => self.setup_import_cycle(),
            FixtureType::WithTests => self.setup_with_tests(),
            FixtureType::SymbolDeps => self.setup_symbol_deps(),
            FixtureType::TypeError => self.setup_type_error(),
        }
        self.root().to_path_buf()
    }

    fn setup_main_only(&self) {
        self.write_package(
            "main",
            &[(
                "main.cfx",
                r#"package main

const Greeting = "hello"

func Main() {
    var n = len(Greeting)
}

func len(s string) int {
    return 5
}
"#,
            )],
        );
    }

    fn setup_lib_and_sub(&self) {
        self.write_package(
            "lib",
            &[(
                "lib.cfx",
                r#"package lib

import "lib/sub"

const Answer = sub.Base + 2

func Double(v int) int {
    return sub.Twice(v)
}
"#,
            )],
        );
        self.write_package(
            "lib/sub",
            &[(
                "sub.cfx",
                r#"package sub

const Base = 40

func Twice(v int) int {
    return v * 2
}
"#,
            )],
        );
    }

    fn setup_import_cycle(&self) {
        self.write_package(
            "a",
            &[("a.cfx", "package a\n\nimport \"b\"\n\nconst A = b.B + 1\n")],
        );
        self.write_package(
            "b",
            &[("b.cfx", "package b\n\nimport \"a\"\n\nconst B = 1\n\nvar x = a.A\n")],
        );
    }

    fn setup_with_tests(&self) {
        self.write_package(
            "fmt",
            &[
                (
                    "print.cfx",
                    r#"package fmt

func Sprint(s string) string {
    return prefix + s
}
"#,
                ),
                ("prefix.cfx", "package fmt\n\nconst prefix = \"> \"\n"),
                (
                    "print_test.cfx",
                    r#"package fmt

func TestPrefix() bool {
    return prefix == "> "
}
"#,
                ),
                (
                    "example_test.cfx",
                    r#"package fmt_test

import "fmt"

func ExampleSprint() string {
    return fmt.Sprint("x")
}
"#,
                ),
            ],
        );
    }

    fn setup_symbol_deps(&self) {
        self.write_package(
            "app",
            &[(
                "app.cfx",
                r#"package app

import "text/strs"

func Greet(name string) string {
    return strs.Join("hello", name)
}
"#,
            )],
        );
        self.write_symbols(
            "text/strs",
            json!({
                "path": "text/strs",
                "name": "strs",
                "objects": [
                    { "name": "Sep", "kind": "const", "type": "string", "value": ", " },
                    {
                        "name": "Join",
                        "kind": "func",
                        "type": { "func": { "params": ["string", "string"], "result": "string" } }
                    }
                ],
                "imports": [ { "path": "text/runes", "name": "runes" } ]
            }),
        );
    }

    fn setup_type_error(&self) {
        self.write_package(
            "app",
            &[(
                "app.cfx",
                "package app\n\nimport \"bad\"\n\nconst Value = bad.Value\n",
            )],
        );
        self.write_package(
            "bad",
            &[("bad.cfx", "package bad\n\nconst Value = 1 + \"one\"\n")],
        );
    }
}
