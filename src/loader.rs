//! Resolution of partial and layout names to file paths.

use std::fmt;

use crate::error::{Error, RenderErrorKind};
use crate::fs::FileSystem;
use crate::options::Options;

/// Which set of roots a lookup searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupType {
    Root,
    Partials,
    Layouts,
}

impl fmt::Display for LookupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Root => "root",
            Self::Partials => "partials",
            Self::Layouts => "layouts",
        })
    }
}

pub struct Loader<'a> {
    fs: &'a dyn FileSystem,
    options: &'a Options,
}

impl<'a> Loader<'a> {
    #[must_use]
    pub fn new(fs: &'a dyn FileSystem, options: &'a Options) -> Self {
        Self { fs, options }
    }

    #[must_use]
    pub fn roots(&self, lookup: LookupType) -> &'a [String] {
        match lookup {
            LookupType::Root => &self.options.root,
            LookupType::Partials => self.options.partial_roots(),
            LookupType::Layouts => self.options.layout_roots(),
        }
    }

    /// Whether `file` is resolved against the including file.
    #[must_use]
    pub fn is_relative(&self, file: &str) -> bool {
        self.options.relative_reference && (file.starts_with("./") || file.starts_with("../"))
    }

    /// Ordered search list for `file`.
    ///
    /// A relative name is first resolved against the directory of
    /// `current`, and kept only if it falls inside one of the roots.
    /// Then every root is tried in order, restricted to its own
    /// subtree when `enforceRoot` is set.
    #[must_use]
    pub fn candidates(&self, file: &str, lookup: LookupType, current: Option<&str>) -> Vec<String> {
        let roots = self.roots(lookup);
        let extname = &self.options.extname;
        let mut out = Vec::with_capacity(roots.len() + 1);

        if let Some(current) = current.filter(|_| self.is_relative(file)) {
            let referenced = self.fs.resolve(&self.fs.dirname(current), file, extname);
            if roots.iter().any(|root| self.fs.contains(root, &referenced)) {
                out.push(referenced);
            }
        }
        for root in roots {
            let referenced = self.fs.resolve(root, file, extname);
            if !self.options.enforce_root || self.fs.contains(root, &referenced) {
                out.push(referenced);
            }
        }
        out
    }

    /// First existing candidate, checked with the sync or async
    /// existence test to match the driver.
    pub async fn lookup(
        &self,
        file: &str,
        lookup: LookupType,
        current: Option<&str>,
        sync: bool,
    ) -> Result<String, Error> {
        for candidate in self.candidates(file, lookup, current) {
            let exists = if sync {
                self.fs.exists_sync(&candidate)
            } else {
                self.fs.exists(&candidate).await
            };
            tracing::trace!(%candidate, exists, "partial candidate");
            if exists {
                return Ok(candidate);
            }
        }
        Err(RenderErrorKind::PartialNotFound {
            name: file.to_string(),
            roots: self.roots(lookup).to_vec(),
        }
        .into())
    }

    pub async fn read(&self, path: &str, sync: bool) -> Result<String, Error> {
        let text = if sync {
            self.fs.read_file_sync(path)
        } else {
            self.fs.read_file(path).await
        };
        text.map_err(|e| Error::Io {
            path: path.to_string(),
            message: e.to_string(),
        })
    }
}
