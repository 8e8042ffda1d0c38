//! Deadline Client - request engine for the Deadline render-farm REST API
//!
//! This crate issues GET and POST requests against a Deadline web service
//! over plain HTTP or mutually authenticated TLS, assembles the response
//! body and settles each request with decoded JSON or an error.
//!
//! ```no_run
//! use deadline_client::{ConnectionConfig, DeadlineClient};
//!
//! let config = ConnectionConfig::builder()
//!     .host("renderqueue")
//!     .port(8081)
//!     .build()?;
//! let client = DeadlineClient::new(config)?;
//! let jobs = client.get("/api/jobs", None).wait()?;
//! println!("{jobs}");
//! # Ok::<(), deadline_client::Error>(())
//! ```

pub mod assembler;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod transport;

pub use assembler::{Outcome, ResponseAssembler};
pub use client::{DeadlineClient, RequestOptions, ResponseFuture};
pub use config::{ClientSettings, ConnectionConfig, TlsMaterial, TransportKind};
pub use error::{Error, Result};
pub use transport::Transport;
