use crate::cql::statement::PreparedStatement;
use crate::cql::types::{unpack_value, ColumnType, Value};
use crate::error::{CqlError, Result};
use crate::serde::reader::{bytes, int, short, short_bytes, string};
use bytes::{Buf, Bytes};
use indexmap::IndexMap;

pub(crate) const RESULT_KIND_VOID: i32 = 0x0001;
pub(crate) const RESULT_KIND_ROWS: i32 = 0x0002;
pub(crate) const RESULT_KIND_SET_KEYSPACE: i32 = 0x0003;
pub(crate) const RESULT_KIND_PREPARED: i32 = 0x0004;
pub(crate) const RESULT_KIND_SCHEMA_CHANGE: i32 = 0x0005;

const GLOBAL_TABLES_SPEC: i32 = 0x0001;

/// One decoded row: column name to value, in the server's declared order.
pub type Row = IndexMap<String, Value>;

/// The decoded body of a RESULT frame.
#[derive(Debug, Clone)]
pub enum QueryResult {
    Void,
    Rows(Vec<Row>),
    SetKeyspace(String),
    Prepared(PreparedStatement),
    SchemaChange {
        change: String,
        target: String,
        options: String,
    },
}

/// A single column in rows/prepared metadata. Ordering is significant: it is
/// the positional order of row values and of bound parameters.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub keyspace: String,
    pub table: String,
    pub name: String,
    pub ty: ColumnType,
}

pub(crate) fn parse_result(body: Bytes, raw_blobs: bool) -> Result<QueryResult> {
    let mut src = body;
    let kind = int!(src);

    match kind {
        RESULT_KIND_VOID => Ok(QueryResult::Void),
        RESULT_KIND_ROWS => parse_rows(&mut src, raw_blobs),
        RESULT_KIND_SET_KEYSPACE => Ok(QueryResult::SetKeyspace(string!(src))),
        RESULT_KIND_PREPARED => {
            // <short bytes id><metadata>; the trailing result metadata is
            // not needed to execute and is left unread.
            let id = short_bytes!(src);
            let columns = parse_metadata(&mut src, true)?;
            Ok(QueryResult::Prepared(PreparedStatement::new(id, columns)))
        }
        RESULT_KIND_SCHEMA_CHANGE => {
            let change = string!(src);
            let target = string!(src);
            let options = string!(src);
            Ok(QueryResult::SchemaChange {
                change,
                target,
                options,
            })
        }
        other => Err(CqlError::Protocol(format!("unknown result kind {other}"))),
    }
}

/// Parses rows/prepared metadata: flags, column count, the pk-index block
/// (prepared only, skipped) and the per-column specs.
fn parse_metadata(src: &mut Bytes, read_pk: bool) -> Result<Vec<ColumnSpec>> {
    let flags = int!(src);
    let columns_count = int!(src);

    if read_pk {
        let pk_count = int!(src);
        for _ in 0..pk_count {
            let _ = short!(src);
        }
    }

    let global_spec = flags & GLOBAL_TABLES_SPEC != 0;
    let (mut keyspace, mut table) = (String::new(), String::new());
    if global_spec {
        keyspace = string!(src);
        table = string!(src);
    }

    let mut columns = Vec::with_capacity(columns_count.max(0) as usize);
    for _ in 0..columns_count {
        if !global_spec {
            keyspace = string!(src);
            table = string!(src);
        }

        let name = string!(src);
        let ty = ColumnType::parse(src)?;

        columns.push(ColumnSpec {
            keyspace: keyspace.clone(),
            table: table.clone(),
            name,
            ty,
        });
    }

    Ok(columns)
}

fn parse_rows(src: &mut Bytes, raw_blobs: bool) -> Result<QueryResult> {
    let columns = parse_metadata(src, false)?;
    let rows_count = int!(src);

    let mut rows = Vec::with_capacity(rows_count.max(0) as usize);
    for _ in 0..rows_count {
        let mut row = Row::with_capacity(columns.len());
        for column in &columns {
            let content = bytes!(src);
            let value = unpack_value(content, &column.ty, raw_blobs)?;
            row.insert(column.name.clone(), value);
        }
        rows.push(row);
    }

    Ok(QueryResult::Rows(rows))
}
