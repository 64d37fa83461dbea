pub mod generate_bed;
pub mod merge_mnvs;

pub use generate_bed::generate_bed;
pub use merge_mnvs::merge_mnvs;
