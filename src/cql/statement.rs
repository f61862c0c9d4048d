use crate::cql::result::ColumnSpec;
use crate::cql::types::{pack_value_with_length, Value};
use crate::error::{CqlError, Result};
use crate::serde::writer::put_long_string;
use base64::Engine;
use bytes::{BufMut, Bytes, BytesMut};
use indexmap::IndexMap;

/// Values bound to a statement's declared columns, keyed by column name.
pub type BoundValues = IndexMap<String, Value>;

/// A server-compiled statement: the opaque id the server issued plus the
/// declared parameter columns, in positional order. Immutable once returned
/// from `prepare`; the id is sent back verbatim on every EXECUTE.
#[derive(Debug, Clone)]
pub struct PreparedStatement {
    id: Bytes,
    pub columns: Vec<ColumnSpec>,
}

impl PreparedStatement {
    pub(crate) fn new(id: Bytes, columns: Vec<ColumnSpec>) -> PreparedStatement {
        PreparedStatement { id, columns }
    }

    pub fn id(&self) -> &[u8] {
        &self.id
    }

    /// External textual form of the opaque id.
    pub fn id_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.id)
    }
}

/// Encodes `<n><n × [bytes] value>` in the statement's declared column
/// order. A declared column with no supplied value is a caller error, never
/// an implicit null.
pub(crate) fn encode_bound_values(
    dst: &mut BytesMut,
    stmt: &PreparedStatement,
    values: &BoundValues,
) -> Result<()> {
    dst.put_u16(stmt.columns.len() as u16);
    for column in &stmt.columns {
        let value = values.get(&column.name).ok_or_else(|| {
            CqlError::Usage(format!("no value bound for column {:?}", column.name))
        })?;
        pack_value_with_length(dst, value, &column.ty)?;
    }
    Ok(())
}

pub(crate) const BATCH_LOGGED: u8 = 0x00;
pub(crate) const BATCH_UNLOGGED: u8 = 0x01;
pub(crate) const BATCH_COUNTER: u8 = 0x02;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    Logged,
    Unlogged,
    Counter,
}

impl BatchKind {
    fn to_wire(self) -> u8 {
        match self {
            BatchKind::Logged => BATCH_LOGGED,
            BatchKind::Unlogged => BATCH_UNLOGGED,
            BatchKind::Counter => BATCH_COUNTER,
        }
    }
}

const SIMPLE_ENTRY: u8 = 0;
const PREPARED_ENTRY: u8 = 1;

/// Accumulates simple and prepared statements into one BATCH body. Entries
/// are serialized as they are added; `get_data` does not clear the
/// accumulator, call `reset` to start a new batch.
#[derive(Debug, Clone)]
pub struct Batch {
    kind: BatchKind,
    count: u16,
    data: BytesMut,
}

impl Batch {
    pub fn new(kind: BatchKind) -> Batch {
        Batch {
            kind,
            count: 0,
            data: BytesMut::new(),
        }
    }

    pub fn reset(&mut self) {
        self.count = 0;
        self.data.clear();
    }

    pub fn len(&self) -> u16 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Appends an inline CQL statement: `<kind=0><long string query>`.
    pub fn add_simple(&mut self, cql: &str) {
        self.data.put_u8(SIMPLE_ENTRY);
        put_long_string!(self.data, cql);
        self.count += 1;
    }

    /// Appends a prepared statement with its bound values:
    /// `<kind=1><short bytes id><n><n × [bytes] value>`.
    pub fn add_prepared(&mut self, stmt: &PreparedStatement, values: &BoundValues) -> Result<()> {
        let mut entry = BytesMut::new();
        entry.put_u8(PREPARED_ENTRY);
        entry.put_u16(stmt.id.len() as u16);
        entry.extend_from_slice(&stmt.id);
        encode_bound_values(&mut entry, stmt, values)?;

        self.data.extend_from_slice(&entry);
        self.count += 1;
        Ok(())
    }

    /// Assembles `<batch kind><entry count><entries>` for the BATCH frame.
    pub fn get_data(&self) -> Bytes {
        let mut body = BytesMut::with_capacity(3 + self.data.len());
        body.put_u8(self.kind.to_wire());
        body.put_u16(self.count);
        body.extend_from_slice(&self.data);
        body.freeze()
    }
}
