pub mod config;
pub mod crawler;
pub mod entities;
pub mod extractor;
pub mod fetcher;
pub mod frontier;
pub mod normalize;
pub mod pagination;
pub mod sink;
pub mod validation;
