use ariadne::{Cache, Source};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::{fs, io};

/// Keeps source files in memory for
/// the parser and for diagnostics.
/// File data is leaked, so the cache
/// lives as long as the compiler does.
#[derive(Debug, Default, Clone)]
pub struct FileCache {
    sources: Arc<Mutex<HashMap<PathBuf, &'static Source<&'static str>>>>,
}

impl FileCache {
    /// Gets the text of the specified file,
    /// reading it from disk on first use.
    pub fn get(&self, file: &Path) -> io::Result<&'static str> {
        Ok(self.get_source(file)?.text())
    }

    /// Registers text that doesn't live on
    /// disk under the given path, replacing
    /// anything cached there before.
    pub fn insert(&self, file: &Path, text: String) -> &'static str {
        let source = Self::leak(text);
        self.sources.lock().insert(file.to_path_buf(), source);

        source.text()
    }

    /// Gets the ariadne source for the specified
    /// file, reading it from disk on first use.
    pub fn get_source(&self, file: &Path) -> io::Result<&'static Source<&'static str>> {
        let mut sources = self.sources.lock();

        if let Some(source) = sources.get(file) {
            return Ok(*source);
        }

        let source = Self::leak(fs::read_to_string(file)?);
        sources.insert(file.to_path_buf(), source);

        Ok(source)
    }

    fn leak(text: String) -> &'static Source<&'static str> {
        let data: &'static str = text.leak();

        Box::leak(Box::new(Source::from(data)))
    }
}

impl Cache<Path> for FileCache {
    type Storage = &'static str;

    fn fetch(&mut self, path: &Path) -> Result<&Source<&'static str>, impl Debug> {
        self.get_source(path)
    }

    fn display<'a>(&self, path: &'a Path) -> Option<impl Display + 'a> {
        Some(Box::new(path.display()))
    }
}
