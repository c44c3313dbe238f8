use std::io;

use super::{Filter, FilterDecodeError};

/// Shuffle (filter id 2): on write, the i-th bytes of every element are
/// grouped together; decoding interleaves them back. Client data holds the
/// element size in bytes.
pub struct ShuffleFilter;

impl Filter for ShuffleFilter {
    fn id(&self) -> u16 {
        2
    }

    fn name(&self) -> &'static str {
        "shuffle"
    }

    fn decode(&self, encoded: &[u8], client_data: &[u32]) -> Result<Vec<u8>, FilterDecodeError> {
        let size = *client_data.first().unwrap_or(&1) as usize;
        if size <= 1 {
            return Ok(encoded.to_vec());
        }
        if encoded.len() % size != 0 {
            return Err(FilterDecodeError::Filter {
                filter: "shuffle",
                source: io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("{} bytes not divisible by element size {}", encoded.len(), size),
                ),
            });
        }

        let count = encoded.len() / size;
        let mut out = vec![0; encoded.len()];
        for byte in 0..size {
            let lane = &encoded[byte * count..(byte + 1) * count];
            for (elem, v) in lane.iter().enumerate() {
                out[elem * size + byte] = *v;
            }
        }
        Ok(out)
    }
}
