//! # RESP2 Encoding and Parsing
//!
//! Encode commands and parse replies for the subset of RESP2 this client
//! needs (`INCRBY`, `GET`): simple strings, errors, integers, and bulk
//! strings. Arrays are parsed for completeness but unused on this path.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::{ClientError, ClientResult};

/// RESP response value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// `+OK` / `+PONG` style responses.
    Simple(Vec<u8>),
    /// `-ERR ...` responses.
    Error(Vec<u8>),
    /// `:123` responses.
    Integer(i64),
    /// `$...` bulk strings, with `None` for the null bulk string.
    Bulk(Option<Vec<u8>>),
    /// `*...` arrays (unused by this client, parsed for completeness).
    Array(Vec<RespValue>),
}

/// Encodes a RESP2 array command into the provided buffer.
pub fn encode_command(args: &[&[u8]], out: &mut Vec<u8>) {
    out.push(b'*');
    push_usize(out, args.len());
    out.extend_from_slice(b"\r\n");
    for arg in args {
        out.push(b'$');
        push_usize(out, arg.len());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(arg);
        out.extend_from_slice(b"\r\n");
    }
}

/// Reads one RESP value from an async buffered reader.
pub async fn read_response<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    line_buf: &mut Vec<u8>,
) -> ClientResult<RespValue> {
    read_line(reader, line_buf).await?;
    if line_buf.is_empty() {
        return Err(ClientError::Protocol);
    }

    match line_buf[0] {
        b'+' => Ok(RespValue::Simple(line_buf[1..].to_vec())),
        b'-' => Ok(RespValue::Error(line_buf[1..].to_vec())),
        b':' => Ok(RespValue::Integer(parse_i64(&line_buf[1..])?)),
        b'$' => {
            let len = parse_i64(&line_buf[1..])?;
            parse_bulk_len(reader, len, line_buf).await
        }
        b'*' => {
            let len = parse_i64(&line_buf[1..])?;
            // Box the recursive async call to keep the future size bounded.
            Box::pin(parse_array_len(reader, len, line_buf)).await
        }
        _ => Err(ClientError::Protocol),
    }
}

async fn parse_bulk_len<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    len: i64,
    line_buf: &mut Vec<u8>,
) -> ClientResult<RespValue> {
    if len < 0 {
        return Ok(RespValue::Bulk(None));
    }
    let len = len as usize;
    let mut data = vec![0u8; len];
    reader.read_exact(&mut data).await?;

    let mut crlf = [0u8; 2];
    reader.read_exact(&mut crlf).await?;
    if crlf != [b'\r', b'\n'] {
        return Err(ClientError::Protocol);
    }

    line_buf.clear();
    Ok(RespValue::Bulk(Some(data)))
}

async fn parse_array_len<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    len: i64,
    line_buf: &mut Vec<u8>,
) -> ClientResult<RespValue> {
    if len <= 0 {
        return Ok(RespValue::Array(Vec::new()));
    }

    let mut items = Vec::with_capacity(len as usize);
    for _ in 0..len {
        items.push(Box::pin(read_response(reader, line_buf)).await?);
    }
    Ok(RespValue::Array(items))
}

async fn read_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
) -> ClientResult<()> {
    buf.clear();
    let bytes = reader.read_until(b'\n', buf).await?;
    if bytes == 0 {
        return Err(ClientError::Protocol);
    }
    if buf.len() < 2 || buf[buf.len() - 2] != b'\r' {
        return Err(ClientError::Protocol);
    }
    buf.truncate(buf.len() - 2);
    Ok(())
}

fn parse_i64(data: &[u8]) -> ClientResult<i64> {
    if data.is_empty() {
        return Err(ClientError::Protocol);
    }
    let mut negative = false;
    let mut idx = 0;
    if data[0] == b'-' {
        negative = true;
        idx = 1;
    }

    let mut value: i64 = 0;
    while idx < data.len() {
        let b = data[idx];
        if !b.is_ascii_digit() {
            return Err(ClientError::Protocol);
        }
        value = value.saturating_mul(10).saturating_add((b - b'0') as i64);
        idx += 1;
    }

    Ok(if negative { -value } else { value })
}

fn push_usize(out: &mut Vec<u8>, mut value: usize) {
    let mut buf = [0u8; 20];
    let mut len = 0;
    if value == 0 {
        buf[0] = b'0';
        len = 1;
    } else {
        while value > 0 {
            buf[len] = b'0' + (value % 10) as u8;
            value /= 10;
            len += 1;
        }
    }
    for idx in (0..len).rev() {
        out.push(buf[idx]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn encodes_command() {
        let mut buf = Vec::new();
        encode_command(&[b"INCRBY", b"p1", b"3"], &mut buf);
        assert_eq!(&buf, b"*3\r\n$6\r\nINCRBY\r\n$2\r\np1\r\n$1\r\n3\r\n");
    }

    #[tokio::test]
    async fn parses_integer() {
        let mut reader = Cursor::new(b":42\r\n".to_vec());
        let mut line = Vec::new();
        let resp = read_response(&mut reader, &mut line).await.unwrap();
        assert_eq!(resp, RespValue::Integer(42));
    }

    #[tokio::test]
    async fn parses_bulk_string() {
        let mut reader = Cursor::new(b"$5\r\nhello\r\n".to_vec());
        let mut line = Vec::new();
        let resp = read_response(&mut reader, &mut line).await.unwrap();
        assert_eq!(resp, RespValue::Bulk(Some(b"hello".to_vec())));
    }

    #[tokio::test]
    async fn parses_null_bulk_string() {
        let mut reader = Cursor::new(b"$-1\r\n".to_vec());
        let mut line = Vec::new();
        let resp = read_response(&mut reader, &mut line).await.unwrap();
        assert_eq!(resp, RespValue::Bulk(None));
    }

    #[tokio::test]
    async fn parses_error() {
        let mut reader = Cursor::new(b"-ERR bad\r\n".to_vec());
        let mut line = Vec::new();
        let resp = read_response(&mut reader, &mut line).await.unwrap();
        assert_eq!(resp, RespValue::Error(b"ERR bad".to_vec()));
    }
}
