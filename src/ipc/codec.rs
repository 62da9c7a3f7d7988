// Copyright 2026 BadCompany
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Newline framing for the Telos Core socket.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use super::protocol::{CoreCommand, CoreResponse};
use super::ChannelError;
use crate::engine_core::constants::limits;

/// Encodes `CoreCommand`s and decodes `CoreResponse`s, one JSON object per
/// line.
#[derive(Debug, Clone)]
pub struct CoreCodec {
    max_frame_bytes: usize,
    // Bytes already scanned for a newline in the pending frame.
    scanned: usize,
}

impl CoreCodec {
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_frame(limits::MAX_CORE_FRAME_BYTES)
    }

    #[must_use]
    pub fn with_max_frame(max_frame_bytes: usize) -> Self {
        Self {
            max_frame_bytes,
            scanned: 0,
        }
    }
}

impl Default for CoreCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for CoreCodec {
    type Item = CoreResponse;
    type Error = ChannelError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<CoreResponse>, ChannelError> {
        let newline = src[self.scanned..].iter().position(|b| *b == b'\n');

        let Some(offset) = newline else {
            if src.len() > self.max_frame_bytes {
                return Err(ChannelError::Malformed(format!(
                    "frame exceeds {} bytes without newline",
                    self.max_frame_bytes
                )));
            }
            self.scanned = src.len();
            return Ok(None);
        };

        let end = self.scanned + offset;
        self.scanned = 0;
        let frame = src.split_to(end + 1);
        if end > self.max_frame_bytes {
            return Err(ChannelError::Malformed(format!(
                "frame of {} bytes exceeds {} byte limit",
                end, self.max_frame_bytes
            )));
        }

        let mut line = &frame[..end];
        if line.last() == Some(&b'\r') {
            line = &line[..line.len() - 1];
        }
        trace!(bytes = line.len(), "Decoded core frame");

        serde_json::from_slice(line)
            .map(Some)
            .map_err(|e| ChannelError::Malformed(e.to_string()))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<CoreResponse>, ChannelError> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => {
                // Partial line at end of stream is never parsed.
                src.clear();
                self.scanned = 0;
                Err(ChannelError::Closed)
            }
        }
    }
}

impl<'a> Encoder<&'a CoreCommand> for CoreCodec {
    type Error = ChannelError;

    fn encode(&mut self, item: &'a CoreCommand, dst: &mut BytesMut) -> Result<(), ChannelError> {
        let json = serde_json::to_vec(item).map_err(|e| ChannelError::Malformed(e.to_string()))?;
        dst.reserve(json.len() + 1);
        dst.put_slice(&json);
        dst.put_u8(b'\n');
        Ok(())
    }
}
