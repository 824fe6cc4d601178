//! Query construction: the boolean mini-language compiler, per-slot field
//! assembly, and the sentence-level multi-word query builder.

pub mod assembler;
pub mod builder;
pub mod parser;

pub use assembler::FieldQueryAssembler;
pub use builder::{SearchParams, SearchRequest, SentenceQueryBuilder, SortOrder};
pub use parser::{CompiledQuery, QueryCompiler};
