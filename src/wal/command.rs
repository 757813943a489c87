//! WAL commands
//!
//! A closed set of command variants. Each is encoded as a one-byte tag
//! followed by its fields in declaration order. Replay dispatches on this
//! enum with an exhaustive match.

use std::fmt;

use serde::Serialize;

use super::codec::{wal_record, DecodeError, Decoder, Encoder, WalCodec};

/// Opaque column payload carried by an append command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnChunk(pub Vec<u8>);

impl WalCodec for ColumnChunk {
    fn encoded_size(&self) -> usize {
        4 + self.0.len()
    }
    fn encode(&self, enc: &mut Encoder<'_>) {
        enc.put_bytes(&self.0);
    }
    fn decode(dec: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        dec.get_bytes().map(ColumnChunk)
    }
    fn min_encoded_size() -> usize {
        4
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDef {
    pub column_id: u64,
    pub name: String,
    pub data_type: String,
}
wal_record!(ColumnDef { column_id, name, data_type });

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableDef {
    pub table_name: String,
    pub comment: String,
    pub columns: Vec<ColumnDef>,
}
wal_record!(TableDef { table_name, comment, columns });

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexDef {
    pub index_name: String,
    pub comment: String,
    pub index_type: String,
    pub column_names: Vec<String>,
}
wal_record!(IndexDef { index_name, comment, index_type, column_names });

/// Location of a physical object inside the persistence layer
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ObjectAddr {
    pub obj_key: String,
    pub part_offset: u64,
    pub part_size: u64,
}
wal_record!(ObjectAddr { obj_key, part_offset, part_size });

/// Outline (variable-length) buffer state of one column in a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalColumnInfo {
    pub outline_buffer_count: u32,
    pub last_chunk_offset: u64,
}
wal_record!(WalColumnInfo { outline_buffer_count, last_chunk_offset });

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalBlockInfo {
    pub block_id: u16,
    pub row_count: u16,
    pub row_capacity: u16,
    pub columns: Vec<WalColumnInfo>,
    pub addrs: Vec<ObjectAddr>,
}
wal_record!(WalBlockInfo { block_id, row_count, row_capacity, columns, addrs });

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalSegmentInfo {
    pub segment_id: u32,
    pub column_count: u64,
    pub row_count: u64,
    pub actual_row_count: u64,
    pub row_capacity: u64,
    pub blocks: Vec<WalBlockInfo>,
}
wal_record!(WalSegmentInfo {
    segment_id,
    column_count,
    row_count,
    actual_row_count,
    row_capacity,
    blocks,
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RowId {
    pub segment_id: u32,
    pub segment_offset: u32,
}
wal_record!(RowId { segment_id, segment_offset });

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalChunkIndexInfo {
    pub chunk_id: u32,
    pub base_name: String,
    pub base_row_id: RowId,
    pub row_count: u32,
    pub addrs: Vec<ObjectAddr>,
}
wal_record!(WalChunkIndexInfo { chunk_id, base_name, base_row_id, row_count, addrs });

/// Rows appended by one command, stored column-major
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowBatch {
    pub row_count: u32,
    pub columns: Vec<ColumnChunk>,
}
wal_record!(RowBatch { row_count, columns });

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptimizeParam {
    pub name: String,
    pub value: String,
}
wal_record!(OptimizeParam { name, value });

/// Wire tag of each command variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandType {
    CreateDatabase,
    DropDatabase,
    CreateTable,
    DropTable,
    CreateIndex,
    DropIndex,
    Import,
    Append,
    Delete,
    Compact,
    Optimize,
    DumpIndex,
    RenameTable,
    AddColumns,
    DropColumns,
    Checkpoint,
    AlterInfo,
}

impl CommandType {
    pub fn tag(&self) -> u8 {
        match self {
            CommandType::CreateDatabase => 1,
            CommandType::DropDatabase => 2,
            CommandType::CreateTable => 3,
            CommandType::DropTable => 4,
            CommandType::CreateIndex => 5,
            CommandType::DropIndex => 6,
            CommandType::Import => 7,
            CommandType::Append => 8,
            CommandType::Delete => 9,
            CommandType::Compact => 10,
            CommandType::Optimize => 11,
            CommandType::DumpIndex => 12,
            CommandType::RenameTable => 13,
            CommandType::AddColumns => 14,
            CommandType::DropColumns => 15,
            CommandType::Checkpoint => 16,
            CommandType::AlterInfo => 17,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        let ty = match tag {
            1 => CommandType::CreateDatabase,
            2 => CommandType::DropDatabase,
            3 => CommandType::CreateTable,
            4 => CommandType::DropTable,
            5 => CommandType::CreateIndex,
            6 => CommandType::DropIndex,
            7 => CommandType::Import,
            8 => CommandType::Append,
            9 => CommandType::Delete,
            10 => CommandType::Compact,
            11 => CommandType::Optimize,
            12 => CommandType::DumpIndex,
            13 => CommandType::RenameTable,
            14 => CommandType::AddColumns,
            15 => CommandType::DropColumns,
            16 => CommandType::Checkpoint,
            17 => CommandType::AlterInfo,
            _ => return None,
        };
        Some(ty)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandType::CreateDatabase => "CREATE_DATABASE",
            CommandType::DropDatabase => "DROP_DATABASE",
            CommandType::CreateTable => "CREATE_TABLE",
            CommandType::DropTable => "DROP_TABLE",
            CommandType::CreateIndex => "CREATE_INDEX",
            CommandType::DropIndex => "DROP_INDEX",
            CommandType::Import => "IMPORT",
            CommandType::Append => "APPEND",
            CommandType::Delete => "DELETE",
            CommandType::Compact => "COMPACT",
            CommandType::Optimize => "OPTIMIZE",
            CommandType::DumpIndex => "DUMP_INDEX",
            CommandType::RenameTable => "RENAME_TABLE",
            CommandType::AddColumns => "ADD_COLUMNS",
            CommandType::DropColumns => "DROP_COLUMNS",
            CommandType::Checkpoint => "CHECKPOINT",
            CommandType::AlterInfo => "ALTER_INFO",
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logical change recorded in a log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    CreateDatabase {
        db_name: String,
        db_dir_tail: String,
        comment: String,
    },
    DropDatabase {
        db_name: String,
    },
    CreateTable {
        db_name: String,
        table_def: TableDef,
    },
    DropTable {
        db_name: String,
        table_name: String,
    },
    CreateIndex {
        db_name: String,
        table_name: String,
        index_def: IndexDef,
    },
    DropIndex {
        db_name: String,
        table_name: String,
        index_name: String,
    },
    Import {
        db_name: String,
        table_name: String,
        segment_info: WalSegmentInfo,
    },
    Append {
        db_name: String,
        table_name: String,
        rows: RowBatch,
    },
    Delete {
        db_name: String,
        table_name: String,
        row_ids: Vec<RowId>,
    },
    Compact {
        db_name: String,
        table_name: String,
        new_segments: Vec<WalSegmentInfo>,
        deprecated_segment_ids: Vec<u32>,
    },
    Optimize {
        db_name: String,
        table_name: String,
        index_name: String,
        params: Vec<OptimizeParam>,
    },
    DumpIndex {
        db_name: String,
        table_name: String,
        index_name: String,
        segment_id: u32,
        chunks: Vec<WalChunkIndexInfo>,
        deprecate_chunk_ids: Vec<u32>,
    },
    RenameTable {
        db_name: String,
        table_name: String,
        new_table_name: String,
    },
    AddColumns {
        db_name: String,
        table_name: String,
        columns: Vec<ColumnDef>,
    },
    DropColumns {
        db_name: String,
        table_name: String,
        column_names: Vec<String>,
    },
    /// All effects with `commit_ts <= max_commit_ts` are reflected in
    /// materialized catalog state under `catalog_path`.
    Checkpoint {
        max_commit_ts: u64,
        catalog_path: String,
    },
    AlterInfo {
        db_name: String,
        table_name: String,
        info: String,
    },
}

impl Command {
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::CreateDatabase { .. } => CommandType::CreateDatabase,
            Command::DropDatabase { .. } => CommandType::DropDatabase,
            Command::CreateTable { .. } => CommandType::CreateTable,
            Command::DropTable { .. } => CommandType::DropTable,
            Command::CreateIndex { .. } => CommandType::CreateIndex,
            Command::DropIndex { .. } => CommandType::DropIndex,
            Command::Import { .. } => CommandType::Import,
            Command::Append { .. } => CommandType::Append,
            Command::Delete { .. } => CommandType::Delete,
            Command::Compact { .. } => CommandType::Compact,
            Command::Optimize { .. } => CommandType::Optimize,
            Command::DumpIndex { .. } => CommandType::DumpIndex,
            Command::RenameTable { .. } => CommandType::RenameTable,
            Command::AddColumns { .. } => CommandType::AddColumns,
            Command::DropColumns { .. } => CommandType::DropColumns,
            Command::Checkpoint { .. } => CommandType::Checkpoint,
            Command::AlterInfo { .. } => CommandType::AlterInfo,
        }
    }

    /// `max_commit_ts` of a checkpoint command
    pub fn checkpoint_ts(&self) -> Option<u64> {
        match self {
            Command::Checkpoint { max_commit_ts, .. } => Some(*max_commit_ts),
            _ => None,
        }
    }

    fn body_size(&self) -> usize {
        match self {
            Command::CreateDatabase {
                db_name,
                db_dir_tail,
                comment,
            } => db_name.encoded_size() + db_dir_tail.encoded_size() + comment.encoded_size(),
            Command::DropDatabase { db_name } => db_name.encoded_size(),
            Command::CreateTable { db_name, table_def } => {
                db_name.encoded_size() + table_def.encoded_size()
            }
            Command::DropTable {
                db_name,
                table_name,
            } => db_name.encoded_size() + table_name.encoded_size(),
            Command::CreateIndex {
                db_name,
                table_name,
                index_def,
            } => db_name.encoded_size() + table_name.encoded_size() + index_def.encoded_size(),
            Command::DropIndex {
                db_name,
                table_name,
                index_name,
            } => db_name.encoded_size() + table_name.encoded_size() + index_name.encoded_size(),
            Command::Import {
                db_name,
                table_name,
                segment_info,
            } => db_name.encoded_size() + table_name.encoded_size() + segment_info.encoded_size(),
            Command::Append {
                db_name,
                table_name,
                rows,
            } => db_name.encoded_size() + table_name.encoded_size() + rows.encoded_size(),
            Command::Delete {
                db_name,
                table_name,
                row_ids,
            } => db_name.encoded_size() + table_name.encoded_size() + row_ids.encoded_size(),
            Command::Compact {
                db_name,
                table_name,
                new_segments,
                deprecated_segment_ids,
            } => {
                db_name.encoded_size()
                    + table_name.encoded_size()
                    + new_segments.encoded_size()
                    + deprecated_segment_ids.encoded_size()
            }
            Command::Optimize {
                db_name,
                table_name,
                index_name,
                params,
            } => {
                db_name.encoded_size()
                    + table_name.encoded_size()
                    + index_name.encoded_size()
                    + params.encoded_size()
            }
            Command::DumpIndex {
                db_name,
                table_name,
                index_name,
                segment_id,
                chunks,
                deprecate_chunk_ids,
            } => {
                db_name.encoded_size()
                    + table_name.encoded_size()
                    + index_name.encoded_size()
                    + segment_id.encoded_size()
                    + chunks.encoded_size()
                    + deprecate_chunk_ids.encoded_size()
            }
            Command::RenameTable {
                db_name,
                table_name,
                new_table_name,
            } => {
                db_name.encoded_size() + table_name.encoded_size() + new_table_name.encoded_size()
            }
            Command::AddColumns {
                db_name,
                table_name,
                columns,
            } => db_name.encoded_size() + table_name.encoded_size() + columns.encoded_size(),
            Command::DropColumns {
                db_name,
                table_name,
                column_names,
            } => db_name.encoded_size() + table_name.encoded_size() + column_names.encoded_size(),
            Command::Checkpoint {
                max_commit_ts,
                catalog_path,
            } => max_commit_ts.encoded_size() + catalog_path.encoded_size(),
            Command::AlterInfo {
                db_name,
                table_name,
                info,
            } => db_name.encoded_size() + table_name.encoded_size() + info.encoded_size(),
        }
    }

    fn encode_body(&self, enc: &mut Encoder<'_>) {
        match self {
            Command::CreateDatabase {
                db_name,
                db_dir_tail,
                comment,
            } => {
                db_name.encode(enc);
                db_dir_tail.encode(enc);
                comment.encode(enc);
            }
            Command::DropDatabase { db_name } => db_name.encode(enc),
            Command::CreateTable { db_name, table_def } => {
                db_name.encode(enc);
                table_def.encode(enc);
            }
            Command::DropTable {
                db_name,
                table_name,
            } => {
                db_name.encode(enc);
                table_name.encode(enc);
            }
            Command::CreateIndex {
                db_name,
                table_name,
                index_def,
            } => {
                db_name.encode(enc);
                table_name.encode(enc);
                index_def.encode(enc);
            }
            Command::DropIndex {
                db_name,
                table_name,
                index_name,
            } => {
                db_name.encode(enc);
                table_name.encode(enc);
                index_name.encode(enc);
            }
            Command::Import {
                db_name,
                table_name,
                segment_info,
            } => {
                db_name.encode(enc);
                table_name.encode(enc);
                segment_info.encode(enc);
            }
            Command::Append {
                db_name,
                table_name,
                rows,
            } => {
                db_name.encode(enc);
                table_name.encode(enc);
                rows.encode(enc);
            }
            Command::Delete {
                db_name,
                table_name,
                row_ids,
            } => {
                db_name.encode(enc);
                table_name.encode(enc);
                row_ids.encode(enc);
            }
            Command::Compact {
                db_name,
                table_name,
                new_segments,
                deprecated_segment_ids,
            } => {
                db_name.encode(enc);
                table_name.encode(enc);
                new_segments.encode(enc);
                deprecated_segment_ids.encode(enc);
            }
            Command::Optimize {
                db_name,
                table_name,
                index_name,
                params,
            } => {
                db_name.encode(enc);
                table_name.encode(enc);
                index_name.encode(enc);
                params.encode(enc);
            }
            Command::DumpIndex {
                db_name,
                table_name,
                index_name,
                segment_id,
                chunks,
                deprecate_chunk_ids,
            } => {
                db_name.encode(enc);
                table_name.encode(enc);
                index_name.encode(enc);
                segment_id.encode(enc);
                chunks.encode(enc);
                deprecate_chunk_ids.encode(enc);
            }
            Command::RenameTable {
                db_name,
                table_name,
                new_table_name,
            } => {
                db_name.encode(enc);
                table_name.encode(enc);
                new_table_name.encode(enc);
            }
            Command::AddColumns {
                db_name,
                table_name,
                columns,
            } => {
                db_name.encode(enc);
                table_name.encode(enc);
                columns.encode(enc);
            }
            Command::DropColumns {
                db_name,
                table_name,
                column_names,
            } => {
                db_name.encode(enc);
                table_name.encode(enc);
                column_names.encode(enc);
            }
            Command::Checkpoint {
                max_commit_ts,
                catalog_path,
            } => {
                max_commit_ts.encode(enc);
                catalog_path.encode(enc);
            }
            Command::AlterInfo {
                db_name,
                table_name,
                info,
            } => {
                db_name.encode(enc);
                table_name.encode(enc);
                info.encode(enc);
            }
        }
    }

    fn decode_body(ty: CommandType, dec: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        let cmd = match ty {
            CommandType::CreateDatabase => Command::CreateDatabase {
                db_name: String::decode(dec)?,
                db_dir_tail: String::decode(dec)?,
                comment: String::decode(dec)?,
            },
            CommandType::DropDatabase => Command::DropDatabase {
                db_name: String::decode(dec)?,
            },
            CommandType::CreateTable => Command::CreateTable {
                db_name: String::decode(dec)?,
                table_def: TableDef::decode(dec)?,
            },
            CommandType::DropTable => Command::DropTable {
                db_name: String::decode(dec)?,
                table_name: String::decode(dec)?,
            },
            CommandType::CreateIndex => Command::CreateIndex {
                db_name: String::decode(dec)?,
                table_name: String::decode(dec)?,
                index_def: IndexDef::decode(dec)?,
            },
            CommandType::DropIndex => Command::DropIndex {
                db_name: String::decode(dec)?,
                table_name: String::decode(dec)?,
                index_name: String::decode(dec)?,
            },
            CommandType::Import => Command::Import {
                db_name: String::decode(dec)?,
                table_name: String::decode(dec)?,
                segment_info: WalSegmentInfo::decode(dec)?,
            },
            CommandType::Append => Command::Append {
                db_name: String::decode(dec)?,
                table_name: String::decode(dec)?,
                rows: RowBatch::decode(dec)?,
            },
            CommandType::Delete => Command::Delete {
                db_name: String::decode(dec)?,
                table_name: String::decode(dec)?,
                row_ids: Vec::decode(dec)?,
            },
            CommandType::Compact => Command::Compact {
                db_name: String::decode(dec)?,
                table_name: String::decode(dec)?,
                new_segments: Vec::decode(dec)?,
                deprecated_segment_ids: Vec::decode(dec)?,
            },
            CommandType::Optimize => Command::Optimize {
                db_name: String::decode(dec)?,
                table_name: String::decode(dec)?,
                index_name: String::decode(dec)?,
                params: Vec::decode(dec)?,
            },
            CommandType::DumpIndex => Command::DumpIndex {
                db_name: String::decode(dec)?,
                table_name: String::decode(dec)?,
                index_name: String::decode(dec)?,
                segment_id: u32::decode(dec)?,
                chunks: Vec::decode(dec)?,
                deprecate_chunk_ids: Vec::decode(dec)?,
            },
            CommandType::RenameTable => Command::RenameTable {
                db_name: String::decode(dec)?,
                table_name: String::decode(dec)?,
                new_table_name: String::decode(dec)?,
            },
            CommandType::AddColumns => Command::AddColumns {
                db_name: String::decode(dec)?,
                table_name: String::decode(dec)?,
                columns: Vec::decode(dec)?,
            },
            CommandType::DropColumns => Command::DropColumns {
                db_name: String::decode(dec)?,
                table_name: String::decode(dec)?,
                column_names: Vec::decode(dec)?,
            },
            CommandType::Checkpoint => Command::Checkpoint {
                max_commit_ts: u64::decode(dec)?,
                catalog_path: String::decode(dec)?,
            },
            CommandType::AlterInfo => Command::AlterInfo {
                db_name: String::decode(dec)?,
                table_name: String::decode(dec)?,
                info: String::decode(dec)?,
            },
        };
        Ok(cmd)
    }
}

impl WalCodec for Command {
    fn encoded_size(&self) -> usize {
        1 + self.body_size()
    }

    fn encode(&self, enc: &mut Encoder<'_>) {
        enc.put_u8(self.command_type().tag());
        self.encode_body(enc);
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, DecodeError> {
        let tag = dec.get_u8()?;
        let ty = CommandType::from_tag(tag)
            .ok_or_else(|| DecodeError::malformed(format!("unknown command tag {}", tag)))?;
        Command::decode_body(ty, dec)
    }

    fn min_encoded_size() -> usize {
        // tag plus at least one length prefix
        5
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::CreateDatabase { db_name, .. } | Command::DropDatabase { db_name } => {
                write!(f, "{} {}", self.command_type(), db_name)
            }
            Command::CreateTable { db_name, table_def } => {
                write!(f, "{} {}.{}", self.command_type(), db_name, table_def.table_name)
            }
            Command::CreateIndex {
                db_name,
                table_name,
                index_def,
            } => write!(
                f,
                "{} {}.{}.{}",
                self.command_type(),
                db_name,
                table_name,
                index_def.index_name
            ),
            Command::DropIndex {
                db_name,
                table_name,
                index_name,
            }
            | Command::Optimize {
                db_name,
                table_name,
                index_name,
                ..
            }
            | Command::DumpIndex {
                db_name,
                table_name,
                index_name,
                ..
            } => write!(
                f,
                "{} {}.{}.{}",
                self.command_type(),
                db_name,
                table_name,
                index_name
            ),
            Command::DropTable {
                db_name,
                table_name,
            }
            | Command::Import {
                db_name,
                table_name,
                ..
            }
            | Command::Append {
                db_name,
                table_name,
                ..
            }
            | Command::Delete {
                db_name,
                table_name,
                ..
            }
            | Command::Compact {
                db_name,
                table_name,
                ..
            }
            | Command::RenameTable {
                db_name,
                table_name,
                ..
            }
            | Command::AddColumns {
                db_name,
                table_name,
                ..
            }
            | Command::DropColumns {
                db_name,
                table_name,
                ..
            }
            | Command::AlterInfo {
                db_name,
                table_name,
                ..
            } => write!(f, "{} {}.{}", self.command_type(), db_name, table_name),
            Command::Checkpoint {
                max_commit_ts,
                catalog_path,
            } => write!(
                f,
                "{} max_commit_ts={} path={}",
                self.command_type(),
                max_commit_ts,
                catalog_path
            ),
        }
    }
}
