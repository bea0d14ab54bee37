pub mod catalog;
pub mod history;
pub mod product_store;

pub use product_store::ProductStore;
