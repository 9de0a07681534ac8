pub mod cloud;
pub mod collection;
pub mod error;
pub mod index;
pub mod output;
pub mod result;
pub mod scenario;
pub mod settings;
pub mod visibility;
pub mod volume;
