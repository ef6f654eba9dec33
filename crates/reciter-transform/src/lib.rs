//! ReCiter ETL transform - nested feature records to flat warehouse rows
//!
//! [`normalize`] decodes raw source items (set descriptors, envelope
//! variants, legacy field names) into [`FeatureGraph`]s; [`transform`]
//! flattens those into one [`RowSet`] per warehouse table; [`identity`]
//! does the same for the identity directory.

pub mod identity;
pub mod model;
pub mod normalize;
pub mod rowset;
pub mod scalar;
pub mod table;
pub mod transform;

pub use identity::{DEFAULT_PREFERRED_DOMAINS, IdentityRows, IdentityTransformer};
pub use model::{ArticleFeature, FeatureGraph};
pub use normalize::{NormalizeStats, Normalizer, rewrite_sets};
pub use rowset::{RowSet, TransformError};
pub use scalar::{Scalar, sanitize};
pub use table::{ALL, CATALOG, PERSON_MASTER_COLUMNS, Table};
pub use transform::{FEATURE_TABLES, TransformStats, Transformer};
