pub mod classification;
pub mod completion;
pub mod constants;
pub mod extension;
pub mod grouping;
pub mod normalizer;
pub mod pve_model;
pub mod rating;
pub mod structures;
