//! Locating the files that make up one shapefile dataset.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use shpload_core::SourceError;
use shpload_fs::{file_is_file, first_with_extension, path_is_dir, sibling_with_extension};

/// Paths of the component files of one shapefile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapefileComponents {
    /// Geometry file.
    pub shp: Utf8PathBuf,
    /// Attribute table.
    pub dbf: Utf8PathBuf,
    /// Coordinate system description, if present.
    pub prj: Option<Utf8PathBuf>,
    /// Encoding hint, if present.
    pub cpg: Option<Utf8PathBuf>,
}

fn io_error(path: &Utf8Path, source: io::Error) -> SourceError {
    SourceError::Io {
        path: path.as_std_path().to_path_buf(),
        source,
    }
}

fn missing(component: &'static str, path: &Utf8Path) -> SourceError {
    SourceError::MissingComponent {
        component,
        path: path.as_std_path().to_path_buf(),
    }
}

fn sibling(shp: &Utf8Path, extension: &str) -> Result<Option<Utf8PathBuf>, SourceError> {
    sibling_with_extension(shp, extension).map_err(|source| io_error(shp, source))
}

impl ShapefileComponents {
    /// Resolve the component set for `path`.
    ///
    /// `path` may name the `.shp` file, any sibling sharing its stem, or a
    /// directory; for a directory the first `.shp` by file name is used.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::MissingComponent`] when the `.shp` or `.dbf`
    /// file cannot be found and [`SourceError::Io`] when probing fails.
    pub fn resolve(path: &Utf8Path) -> Result<Self, SourceError> {
        let shp = if path_is_dir(path) {
            first_with_extension(path, "shp")
                .map_err(|source| io_error(path, source))?
                .ok_or_else(|| missing("shp", path))?
        } else if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("shp"))
            && file_is_file(path).map_err(|source| io_error(path, source))?
        {
            path.to_path_buf()
        } else {
            sibling(path, "shp")?.ok_or_else(|| missing("shp", path))?
        };

        let dbf = sibling(&shp, "dbf")?.ok_or_else(|| missing("dbf", &shp))?;
        let prj = sibling(&shp, "prj")?;
        let cpg = sibling(&shp, "cpg")?;
        debug!("resolved shapefile {shp} (dbf: {dbf}, prj: {prj:?}, cpg: {cpg:?})");
        Ok(Self { shp, dbf, prj, cpg })
    }
}
