mod traits;
mod whoop;

#[cfg(test)]
pub(crate) mod mock;

pub use traits::{OAuthProvider, TokenSet};
pub use whoop::WhoopProvider;
