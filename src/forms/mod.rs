pub mod article;
pub use self::article::*;
