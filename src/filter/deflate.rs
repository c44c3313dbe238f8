use std::io::Read;

use flate2::read::ZlibDecoder;

use super::{Filter, FilterDecodeError};

/// Deflate (filter id 1): chunk bytes are a raw zlib stream.
pub struct DeflateFilter;

impl Filter for DeflateFilter {
    fn id(&self) -> u16 {
        1
    }

    fn name(&self) -> &'static str {
        "deflate"
    }

    fn decode(&self, encoded: &[u8], _client_data: &[u32]) -> Result<Vec<u8>, FilterDecodeError> {
        let mut decoder = ZlibDecoder::new(encoded);
        let mut out = Vec::default();
        decoder
            .read_to_end(&mut out)
            .map_err(|source| FilterDecodeError::Filter {
                filter: "deflate",
                source,
            })?;
        Ok(out)
    }
}
