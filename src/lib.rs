pub mod cli;
pub mod commands;
pub mod error;

pub mod core {
    pub mod adjacency;
    pub mod header;
    pub mod linkage_map;
    pub mod mnv_merger;
    pub mod variant;
}

pub mod io {
    pub mod bed_reader;
    pub mod linkage_reader;
    pub mod readers;
    pub mod vcf_reader;
    pub mod vcf_writer;
}

pub mod utils {
    pub mod util;
    pub mod util_intern;
}

pub mod constants;

pub use constants::*;
