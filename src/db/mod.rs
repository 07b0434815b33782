pub mod filter;
pub use filter::Filter;

mod store;
mod memory;
mod pg_client;
mod postgres;
pub use self::{
  store::*,
  memory::*,
  pg_client::*,
  postgres::*,
};

mod article;
mod comment;
mod category;
pub use self::{
  article::*,
  comment::*,
  category::*,
};

mod service;
pub use service::*;
