pub mod cli;
pub mod cohort;
pub mod compare;
pub mod ctx;
pub mod input;
pub mod io;
pub mod math;
pub mod pipeline;
pub mod schema;
pub mod taxonomy;
