pub mod caption;
pub mod category;
pub mod duplicate;
pub mod hash;
pub mod listing;
pub mod metadata;
pub mod pipeline;
pub mod resolution;
pub mod scanner;
