pub mod rollup_writer;

pub use rollup_writer::RollupWriter;
