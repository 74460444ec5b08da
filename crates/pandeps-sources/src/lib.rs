pub mod backpan;
pub mod cpan;
pub mod download;
pub mod index;
pub mod meta;
pub mod metacpan;
pub mod smartpan;
pub mod source;

pub use source::{Source, SourceKind, SourceSet};
