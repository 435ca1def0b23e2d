pub mod db;
pub mod index;
pub mod memory;
pub mod models;
pub mod pg;
pub mod pgvector;
pub mod qdrant;
pub mod repository;
pub mod schema;

mod error;

pub use error::Error;
pub use index::{IndexHit, IndexQuery, IndexRecord, VectorIndex};
pub use repository::Repository;

use std::{future::Future, pin::Pin};

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
