pub mod preloader_api;
pub mod simple;
