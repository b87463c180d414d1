use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

/// Upper bound on a single frame body; anything larger is a protocol error,
/// not a buffer to allocate.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

// -----------------------------------------------------------------------------
// ----- FrameError ------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame of {0} bytes exceeds the {MAX_FRAME_LEN} byte limit")]
    TooLarge(usize),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// -----------------------------------------------------------------------------
// ----- Read / write ----------------------------------------------------------

/// Reads one `u32`-length-prefixed frame. `Ok(None)` is a clean EOF at a
/// frame boundary; EOF mid-frame is an error.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Bytes>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];

    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge(len));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;

    Ok(Some(Bytes::from(body)))
}

pub async fn write_frame<W>(writer: &mut W, body: &[u8]) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    if body.len() > MAX_FRAME_LEN {
        return Err(FrameError::TooLarge(body.len()));
    }

    let mut buf = BytesMut::with_capacity(4 + body.len());
    buf.put_u32(body.len() as u32);
    buf.extend_from_slice(body);

    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn roundtrip_two_frames() {
        let mut wire = Vec::new();
        write_frame(&mut wire, b"hello").await.unwrap();
        write_frame(&mut wire, b"").await.unwrap();

        let mut reader = std::io::Cursor::new(wire);
        assert_eq!(
            read_frame(&mut reader).await.unwrap().unwrap().as_ref(),
            b"hello"
        );
        assert_eq!(read_frame(&mut reader).await.unwrap().unwrap().len(), 0);
        assert!(read_frame(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn truncated_frame_is_an_error() {
        let mut wire = Vec::new();
        write_frame(&mut wire, b"hello").await.unwrap();
        wire.truncate(wire.len() - 2);

        let mut reader = std::io::Cursor::new(wire);
        assert!(read_frame(&mut reader).await.is_err());
    }

    #[tokio::test]
    async fn oversized_length_is_rejected_without_allocating() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&(u32::MAX).to_be_bytes());

        let mut reader = std::io::Cursor::new(wire);
        assert!(matches!(
            read_frame(&mut reader).await,
            Err(FrameError::TooLarge(_))
        ));
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
