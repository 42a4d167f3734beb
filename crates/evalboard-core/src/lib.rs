pub mod config;
pub mod errors;
pub mod model;

pub mod extract;
pub mod identity;
pub mod merge;
pub mod scan;

pub mod join;
pub mod normalize;
pub mod reshape;

pub mod pipeline;
pub mod report;
