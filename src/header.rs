//! Parsed object headers, reduced to the message the read engine consumes:
//! the filter pipeline message (type 0x000B). All other header messages are
//! carried opaquely.

use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};
use bytes::Bytes;
use thiserror::Error;

use crate::filter::FilterDescriptor;

/// Header message type of the filter pipeline message.
pub const FILTER_PIPELINE_MESSAGE_TYPE: u16 = 0x000B;

#[derive(Debug, Clone)]
pub enum Message {
    FilterPipeline(FilterPipelineMessage),
    /// Any message the read engine does not interpret.
    Opaque { type_id: u16, body: Bytes },
}

/// The typed messages of one object header.
#[derive(Debug, Clone, Default)]
pub struct ObjectHeader {
    messages: Vec<Message>,
}

impl ObjectHeader {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn has_filter_pipeline(&self) -> bool {
        self.filter_pipeline().is_some()
    }

    pub fn filter_pipeline(&self) -> Option<&FilterPipelineMessage> {
        self.messages.iter().find_map(|m| match m {
            Message::FilterPipeline(fp) => Some(fp),
            Message::Opaque { .. } => None,
        })
    }
}

#[derive(Error, Debug)]
pub enum MessageParseError {
    #[error("message body truncated")]
    Truncated(#[from] std::io::Error),
    #[error("unsupported filter pipeline message version {0}")]
    UnsupportedVersion(u8),
}

/// Filter pipeline message body: the ordered filter descriptions applied to
/// every chunk of the dataset, in write order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterPipelineMessage {
    filters: Vec<FilterDescriptor>,
}

impl FilterPipelineMessage {
    pub fn new(filters: Vec<FilterDescriptor>) -> Self {
        Self { filters }
    }

    pub fn filters(&self) -> &[FilterDescriptor] {
        &self.filters
    }

    /// Parse a message body, version 1 or 2.
    ///
    /// Version 1 pads filter names to eight-byte multiples and inserts a pad
    /// word after an odd number of client data values; version 2 drops both,
    /// and omits the name length for built-in filters (id < 256).
    pub fn parse(body: &[u8]) -> Result<Self, MessageParseError> {
        let mut r = Cursor::new(body);
        let version = r.read_u8()?;
        let nfilters = r.read_u8()?;
        match version {
            1 => {
                // two reserved fields
                r.read_u16::<LittleEndian>()?;
                r.read_u32::<LittleEndian>()?;
            }
            2 => {}
            v => return Err(MessageParseError::UnsupportedVersion(v)),
        }

        let mut filters = Vec::with_capacity(nfilters as usize);
        for _ in 0..nfilters {
            let id = r.read_u16::<LittleEndian>()?;
            let name_len = if version == 1 || id >= 256 {
                r.read_u16::<LittleEndian>()? as usize
            } else {
                0
            };
            let flags = r.read_u16::<LittleEndian>()?;
            let ncdata = r.read_u16::<LittleEndian>()? as usize;

            let padded_len = if version == 1 {
                // stored length is already padded in well-formed files
                (name_len + 7) / 8 * 8
            } else {
                name_len
            };
            let mut name_buf = vec![0; padded_len];
            r.read_exact(&mut name_buf)?;
            let nul = name_buf.iter().position(|b| *b == 0).unwrap_or(name_buf.len());
            let name = String::from_utf8_lossy(&name_buf[..nul]).into_owned();

            let mut client_data = Vec::with_capacity(ncdata);
            for _ in 0..ncdata {
                client_data.push(r.read_u32::<LittleEndian>()?);
            }
            if version == 1 && ncdata % 2 == 1 {
                r.read_u32::<LittleEndian>()?;
            }

            filters.push(FilterDescriptor::new(id, name, flags, client_data));
        }

        Ok(Self::new(filters))
    }
}
