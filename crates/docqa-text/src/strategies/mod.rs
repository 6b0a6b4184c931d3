mod recursive;
mod semantic;
mod sliding_window;
mod structural;

pub(crate) use recursive::RecursiveChunker;
pub(crate) use semantic::SemanticChunker;
pub(crate) use sliding_window::SlidingWindowChunker;
pub(crate) use structural::StructuralChunker;
