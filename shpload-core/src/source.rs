//! Feature source abstraction used by the loader and the merge pipeline.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::encoding::EncodingError;
use crate::feature::SourceFeature;
use crate::field::FieldDefinition;
use crate::schema::SchemaError;

/// Errors raised while opening or reading a feature source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Reading a component file failed.
    #[error("failed to read {path}")]
    Io {
        /// File being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// A required component file is missing.
    #[error("missing {component} component for {path}")]
    MissingComponent {
        /// Component extension, e.g. `dbf`.
        component: &'static str,
        /// Path the component was expected next to.
        path: PathBuf,
    },
    /// A component file is structurally invalid.
    #[error("malformed {path}: {message}")]
    Malformed {
        /// File being parsed.
        path: PathBuf,
        /// Description of the defect.
        message: String,
    },
    /// The declared attribute encoding is unusable.
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    /// A field declaration is invalid.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Stream of features read from a source.
pub type FeatureStream<'a> = Box<dyn Iterator<Item = Result<SourceFeature, SourceError>> + 'a>;

/// A readable feature dataset with an attribute header.
pub trait FeatureSource {
    /// Attribute fields in declaration order.
    fn fields(&self) -> &[FieldDefinition];

    /// Name under which the source exposes its geometry attribute.
    fn geometry_field(&self) -> &str {
        "the_geom"
    }

    /// Coordinate system description (ESRI WKT for shapefiles), if any.
    fn crs_description(&self) -> Option<&str>;

    /// Encoding declared by a sidecar hint, if any.
    fn encoding_hint(&self) -> Option<&str>;

    /// Stream features in source order. Text attributes are decoded with
    /// the hint encoding when one exists and byte-preserving otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the stream cannot be opened.
    fn features(&mut self) -> Result<FeatureStream<'_>, SourceError>;

    /// Release file handles. Called on every exit path by the loader; must
    /// be safe to call more than once.
    fn dispose(&mut self) {}
}

impl<T: FeatureSource + ?Sized> FeatureSource for &mut T {
    fn fields(&self) -> &[FieldDefinition] {
        (**self).fields()
    }

    fn geometry_field(&self) -> &str {
        (**self).geometry_field()
    }

    fn crs_description(&self) -> Option<&str> {
        (**self).crs_description()
    }

    fn encoding_hint(&self) -> Option<&str> {
        (**self).encoding_hint()
    }

    fn features(&mut self) -> Result<FeatureStream<'_>, SourceError> {
        (**self).features()
    }

    fn dispose(&mut self) {
        (**self).dispose();
    }
}
