use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Frames larger than this are rejected before allocation; well above
/// anything this protocol legitimately sends.
const MAX_FRAME_BYTES: u32 = 16 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame of {0} bytes exceeds the {MAX_FRAME_BYTES} byte limit")]
    FrameTooLarge(u32),
    #[error("failed to decode json frame: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Writes one length-prefixed JSON frame: a 4-byte big-endian length
/// header followed by the serialised payload. Plain TCP bytes, no
/// protobuf toolchain required.
pub async fn write_frame<W, T>(writer: &mut W, value: &T) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = serde_json::to_vec(value)?;
    let len = u32::try_from(payload.len()).map_err(|_| CodecError::FrameTooLarge(u32::MAX))?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one length-prefixed JSON frame written by [`write_frame`].
pub async fn read_frame<R, T>(reader: &mut R) -> Result<T, CodecError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_BYTES {
        return Err(CodecError::FrameTooLarge(len));
    }
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    Ok(serde_json::from_slice(&payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{PlayerInfoRequest, Request};
    use crate::VectorClock;

    #[tokio::test]
    async fn round_trips_a_request_envelope() {
        let (mut client, mut server) = tokio::io::duplex(4096);

        let mut clock = VectorClock::new();
        clock.increment("player-1");
        let request = Request::QueuePlayer(PlayerInfoRequest {
            player_id: "player-1".into(),
            game_mode: "1v1".into(),
            clock,
        });

        write_frame(&mut client, &request).await.unwrap();
        let decoded: Request = read_frame(&mut server).await.unwrap();

        match decoded {
            Request::QueuePlayer(req) => {
                assert_eq!(req.player_id, "player-1");
                assert_eq!(req.game_mode, "1v1");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected_before_allocation() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        client
            .write_all(&(MAX_FRAME_BYTES + 1).to_be_bytes())
            .await
            .unwrap();
        let result: Result<Request, CodecError> = read_frame(&mut server).await;
        assert!(matches!(result, Err(CodecError::FrameTooLarge(_))));
    }
}
