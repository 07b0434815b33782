pub mod article;
pub mod comment;
pub use self::{
  article::*,
  comment::*,
};
