//! A client-side implementation of the CQL native binary protocol: frame
//! codec, typed value codec, session handshake and prepared statements, with
//! no external driver underneath.

pub mod cql;
pub mod error;
mod serde;
pub mod session;
mod transport;

pub use cql::codec::Frame;
pub use cql::result::{ColumnSpec, QueryResult, Row};
pub use cql::statement::{Batch, BatchKind, BoundValues, PreparedStatement};
pub use cql::types::{ColumnType, Value};
pub use cql::opcode::Opcode;
pub use cql::Consistency;
pub use error::{CqlError, Result, ServerErrorKind};
pub use session::{Config, Session};
