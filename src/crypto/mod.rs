pub mod state;

pub use state::StateSigner;
