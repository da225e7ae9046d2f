//! Builders for specs and zip archives

#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tether_core::types::PackageSpec;
use zip::write::SimpleFileOptions;

/// Registry package with the conventional `<slug>/<slug>.php` entry point
pub fn registry_spec(slug: &str) -> PackageSpec {
    PackageSpec::registry(slug, display_name(slug), entry_for(slug))
}

/// Local-archive package resolved from the archive directory
pub fn local_spec(slug: &str) -> PackageSpec {
    PackageSpec::local(slug, display_name(slug), entry_for(slug), None)
}

pub fn entry_for(slug: &str) -> String {
    format!("{}/{}.php", slug, slug)
}

fn display_name(slug: &str) -> String {
    tether_core::utils::ucfirst(&slug.replace('-', " "))
}

/// Entry-point source with a package header
pub fn package_header(name: &str, version: &str) -> String {
    format!(
        "<?php\n/**\n * Plugin Name: {}\n * Version: {}\n * Description: Test package\n */\n",
        name, version
    )
}

/// Builds zip archives on disk
#[derive(Default)]
pub struct ZipFixture {
    files: Vec<(String, Vec<u8>)>,
    deflate: bool,
}

impl ZipFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// An archive holding one package under `dir`
    pub fn package(dir: &str, file: &str, version: &str) -> Self {
        let stem = file.trim_end_matches(".php");
        Self::new()
            .file(
                &format!("{}/{}", dir, file),
                package_header(stem, version).as_bytes(),
            )
            .file(&format!("{}/readme.txt", dir), b"=== Test package ===\n")
    }

    pub fn file(mut self, name: &str, contents: &[u8]) -> Self {
        self.files.push((name.to_string(), contents.to_vec()));
        self
    }

    pub fn deflated(mut self) -> Self {
        self.deflate = true;
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let method = if self.deflate {
            zip::CompressionMethod::Deflated
        } else {
            zip::CompressionMethod::Stored
        };
        let options = SimpleFileOptions::default().compression_method(method);

        let mut buf = std::io::Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            for (name, contents) in &self.files {
                writer.start_file(name.as_str(), options).unwrap();
                writer.write_all(contents).unwrap();
            }
            writer.finish().unwrap();
        }
        buf.into_inner()
    }

    pub fn write_to(&self, path: &Path) -> PathBuf {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, self.to_bytes()).unwrap();
        path.to_path_buf()
    }
}
