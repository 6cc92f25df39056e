//! chainmirror-midnight: block source backed by the Midnight indexer GraphQL API.
//!
//! ```rust,no_run
//! use chainmirror_core::BlockSource;
//! use chainmirror_midnight::MidnightClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = MidnightClient::default_for(chainmirror_midnight::DEFAULT_ENDPOINT)?;
//! let tip = client.fetch_tip().await?;
//! println!("tip is {} ({})", tip.height, tip.hash);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod queries;

pub use client::{ClientConfig, MidnightClient, DEFAULT_ENDPOINT};
