pub(crate) mod basket;
pub(crate) mod chain;
pub mod feed;
pub mod storage;
