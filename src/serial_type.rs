//! Serial Types are how SQLite stores values in storage.
use byteorder::BigEndian;
use byteorder::ReadBytesExt;
use std::io::Read;

use crate::sql_value::SqlValue;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Pager: Error accessing database file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unable to convert type {from} to {to}.")]
    Type { from: &'static str, to: &'static str },
    #[error("Unimplemented type.")]
    Unimplemented,
    #[error("Invalid serial type code.")]
    InvalidSerialTypeCode,
    #[error("Byte were not a valid string valid encoding.")]
    InvalidStringEncoding(#[from] std::string::FromUtf8Error),
    #[error("Null found where non-null value required.")]
    Null,
    #[error("Code which was thought unreachable was reached.")]
    Unreachable,
}

/// Maps a serial type code to the number of bytes its value occupies in the
/// record body. The single source of truth for this; nothing else in the
/// crate keeps its own copy of this table.
pub fn byte_len(serial_type: i64) -> Result<usize, Error> {
    match serial_type {
        0 => Ok(0),
        1 => Ok(1),
        2 => Ok(2),
        3 => Ok(3),
        4 => Ok(4),
        5 => Ok(6),
        6 | 7 => Ok(8),
        8 | 9 => Ok(0),
        10 | 11 => Err(Error::InvalidSerialTypeCode),
        x if x >= 12 => Ok((x as usize - 12 - (x % 2) as usize) / 2),
        _ => Err(Error::InvalidSerialTypeCode),
    }
}

/// Renders a decoded value as a string for `.tables`/schema-column purposes,
/// where the caller already knows it wants text (or text-like display) and
/// would rather not thread a `Result` through every call site.
pub fn value_to_string(serial_type: &i64, data: &[u8]) -> String {
    match to_sql_value(serial_type, data) {
        Ok(v) => format!("{}", v),
        Err(_) => String::new(),
    }
}

/// Reads a value as an i64, following the same text-falls-back-to-int rule
/// the record decoder uses elsewhere: a value stored as text digits is
/// parsed as an integer rather than treated as a type error.
pub fn value_to_i64(serial_type: &i64, data: &[u8]) -> Result<i64, Error> {
    match to_sql_value(serial_type, data)? {
        SqlValue::Int(i) => Ok(i),
        SqlValue::Text(s) => s.parse::<i64>().map_err(|_| Error::Type {
            from: "TEXT",
            to: "INT",
        }),
        _ => Err(Error::Type {
            from: "TEXT",
            to: "INT",
        }),
    }
}

/// Convert a serial type number to a string describing the type suitable for debug printing.
///
/// # Arguments
///
/// * `serial_type` - A SQLite serial type code.
///
/// These are not SQL type, but informal names for debugging.
///
/// # Panics
///
/// Does not panic
#[cfg(debug)]
pub fn typecode_to_string(serial_type: i64) -> &'static str {
    match serial_type {
        // From: https://www.sqlite.org/fileformat.html#record_format
        // Serial Type	Content Size	Meaning
        // 0	0	Value is a NULL.s
        0 => "st:null",
        // 1	1	Value is an 8-bit twos-complement integer.
        1 => "st:int1B",
        // 2	2	Value is a big-endian 16-bit twos-complement integer.
        2 => "st:int2B",
        // 3	3	Value is a big-endian 24-bit twos-complement integer.
        3 => "st:int3B",
        // 4	4	Value is a big-endian 32-bit twos-complement integer.
        4 => "st:int4B",
        // 5	6	Value is a big-endian 48-bit twos-complement integer.
        5 => "st:int6B",
        // 6	8	Value is a big-endian 64-bit twos-complement integer.
        6 => "st:int8B",
        // 7	8	Value is a big-endian IEEE 754-2008 64-bit floating point number.
        7 => "st:float8B",
        // 8	0	Value is the integer 0. (Only available for schema format 4 and higher.)
        8 => "st:zero",
        // 9	0	Value is the integer 1. (Only available for schema format 4 and higher.)
        9 => "st:one",
        // 10,11	variable	Reserved for internal use. These serial type codes will never appear in a well-formed database file, but they might be used in transient and temporary database files that SQLite sometimes generates for its own use. The meanings of these codes can shift from one release of SQLite to the next.
        10 => "st:internal_10",
        11 => "st:internal_11",
        // N≥12 and even	(N-12)/2	Value is a BLOB that is (N-12)/2 bytes in length.
        // N≥13 and odd	(N-13)/2	Value is a string in the text encoding and (N-13)/2 bytes in length. The nul terminator is not stored.
        x @ 12.. => {
            if x % 2 == 0 {
                "st:blob"
            } else {
                "st:text"
            }
        }
        i64::MIN..=-1 => "st:error_negative",
    }
}


/// Deserialize bytes in "SQLIte serial type" format into one of a few native types (`SqlValue`).
/// 
/// Returns an Error if there is a problem reading from the data.
///
///  # Arguments
/// * `serial_type` - A SQLite serial type code applying to `data`
/// * `data` - A slice of bytes.
///
/// The possible types produced are:
/// - SqlValue::Null
/// - SqlValue::Int
/// - SqlValue::Real
/// - SqlValue::Text
/// - SqlValue::Blob.
/// 
/// These types are correspond to what SQLite calls "Storage Classes" [https://www.sqlite.org/datatype3.html#storage_classes_and_datatypes]
///
/// This function is unaware of what the "schema type" is of the row which the stored value represents.
/// Thus, it may be necessary later to convert SqlValue::Int(0) to SqlValue::Bool(true) or SqlValue::Real(0.0), etc.
///
/// SQLites rules for when to convert from a Storage class (serial type) to the type affinity of the column are complex, and not
/// covered here.
///
/// # Panics
///
/// Does not panic.
pub fn to_sql_value(
    serial_type: &i64,
    data: &[u8],
) -> Result<SqlValue, Error> {
    use SqlValue::*;

    let mut c = std::io::Cursor::new(data);
    match serial_type {
        // Tabular comments have the following columns, and are take from SQLite docs:
        // Serial Type	Content Size	Meaning
        // 0	        0	            Value is a NULL.
        0 => Ok(Null()), // Nulls are always Null, regardless of what the desired type is.  All types have to handle the possibility of Null.
        // 1	        1	            Value is an 8-bit twos-complement integer.
        // 2	        2	            Value is a big-endian 16-bit twos-complement integer.
        // 3	        3	        Value is a big-endian 24-bit twos-complement integer.
        // 4	        4	        Value is a big-endian 32-bit twos-complement integer.
        // 5	        6	        Value is a big-endian 48-bit twos-complement integer.
        // 6	        8	        Value is a big-endian 64-bit twos-complement integer.
        x @ 1..=6 => {
            match x {
                1 => Ok(Int(c.read_i8().map_err(Error::Io)? as i64)),
                2 => Ok(Int(c.read_i16::<BigEndian>().map_err(Error::Io)? as i64)),
                3 => {
                    let mut bytes = [0_u8; 4];
                    c.read_exact(&mut bytes[1..]).map_err(Error::Io)?;
                    bytes[0] = match (bytes[1] & 0b1000_0000) > 0 {
                        false => 0,
                        true => 0xff,
                    };
                    Ok(Int(i32::from_be_bytes(bytes) as i64))
                }
                4 => Ok(Int(c.read_i32::<BigEndian>().map_err(Error::Io)? as i64)),
                5 => Err(Error::Unimplemented),
                6 => Ok(Int(c.read_i64::<BigEndian>().map_err(Error::Io)?)),
                _ => Err(Error::Unreachable),
            }
        }
        // 7	        8	        Value is a big-endian IEEE 754-2008 64-bit floating point number.
        7 => Ok(Real(c.read_f64::<BigEndian>().map_err(Error::Io)?)),
        // 8	        0	        Value is the integer 0. (Only available for schema format 4 and higher.)
        8 => Ok(Int(0_i64)),
        // 9	        0	        Value is the integer 1. (Only available for schema format 4 and higher.)
        9 => Ok(Int(1_i64)),
        // 10,11	variable	Reserved for internal use. These serial type codes will never appear in a well-formed database file...
        10 | 11 => Err(Error::InvalidSerialTypeCode),
        // N≥12 & even	(N-12)/2	Value is a BLOB that is (N-12)/2 bytes in length.
        // N≥13 & odd	(N-13)/2	Value is a string in the text encoding and (N-13)/2 bytes in length. The nul terminator is not stored.
        x @ 12.. => {
            match (*x % 2) == 0 {
                true /* even */=>  {
                    let mut buf = vec![0_u8; (*x as usize - 12) / 2];
                    c.read_exact(&mut buf[..]).map_err(Error::Io)?;
                    Ok(Blob(buf.clone()))
                }
                false /* odd */ => {
                    let mut buf = vec![0_u8; (*x as usize - 13) / 2];
                    c.read_exact(&mut buf[..]).map_err(Error::Io)?;
                    let s = String::from_utf8(buf).map_err(Error::InvalidStringEncoding)?;
                    Ok(Text(s))
                }
            }
        }
        i64::MIN..=-1 => Err(Error::InvalidSerialTypeCode),
    }
}

