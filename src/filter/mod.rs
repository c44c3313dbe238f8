//! Filter pipelines: the ordered byte transforms applied to chunk storage.
//!
//! Writers apply filters first-to-last, so the read direction runs the chain
//! in reverse. A pipeline is built once per dataset from its pipeline message
//! and is immutable afterwards, safe to share between decoding threads.

use std::{collections::HashMap, sync::Arc};

use log::warn;
use thiserror::Error;

use crate::header::FilterPipelineMessage;

#[cfg(feature = "deflate")]
pub mod deflate;
pub mod shuffle;

/// Bit in the filter flags marking the filter as optional.
const FLAG_OPTIONAL: u16 = 0x0001;

/// One filter entry of a pipeline message: identifier, display name, flags
/// and client data, exactly as stored in the object header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterDescriptor {
    pub id: u16,
    pub name: String,
    pub flags: u16,
    pub client_data: Vec<u32>,
}

impl FilterDescriptor {
    pub fn new(id: u16, name: impl Into<String>, flags: u16, client_data: Vec<u32>) -> Self {
        Self {
            id,
            name: name.into(),
            flags,
            client_data,
        }
    }

    /// Optional filters may be skipped when no implementation is registered.
    pub fn is_optional(&self) -> bool {
        self.flags & FLAG_OPTIONAL != 0
    }
}

/// A reversible byte transform, decode direction only.
///
/// Implementations must be stateless or internally synchronized: one instance
/// decodes chunks from many threads at once.
pub trait Filter: Send + Sync {
    fn id(&self) -> u16;

    fn name(&self) -> &'static str;

    fn decode(&self, encoded: &[u8], client_data: &[u32]) -> Result<Vec<u8>, FilterDecodeError>;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterInitError {
    #[error("no implementation registered for required filter {id} ({name:?})")]
    Unsupported { id: u16, name: String },
}

#[derive(Error, Debug)]
pub enum FilterDecodeError {
    #[error("filter `{filter}` could not decode chunk")]
    Filter {
        filter: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("chunk decoded to {actual} bytes, expected {expected}")]
    UnexpectedSize { actual: usize, expected: usize },
}

struct Stage {
    filter: Arc<dyn Filter>,
    descriptor: FilterDescriptor,
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("filter", &self.filter.name())
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

/// An immutable decode chain. The empty chain is the identity.
#[derive(Debug)]
pub struct FilterPipeline {
    stages: Vec<Stage>,
}

impl FilterPipeline {
    /// The identity pipeline for unfiltered datasets.
    pub fn none() -> Self {
        Self { stages: Vec::new() }
    }

    pub fn is_identity(&self) -> bool {
        self.stages.is_empty()
    }

    /// Descriptors in pipeline (write) order.
    pub fn descriptors(&self) -> impl Iterator<Item = &FilterDescriptor> {
        self.stages.iter().map(|s| &s.descriptor)
    }

    /// Undo the pipeline: apply each filter's decode in reverse write order.
    pub fn decode(&self, encoded: &[u8]) -> Result<Vec<u8>, FilterDecodeError> {
        let mut it = self.stages.iter().rev();

        let mut out = match it.next() {
            Some(s) => s.filter.decode(encoded, &s.descriptor.client_data)?,
            None => return Ok(encoded.to_vec()),
        };

        for s in it {
            out = s.filter.decode(&out, &s.descriptor.client_data)?;
        }

        Ok(out)
    }
}

/// Registry of filter implementations, keyed by filter identifier.
///
/// The default registry knows the ubiquitous pair: deflate (when the feature
/// is enabled) and shuffle. Additional filters can be registered before
/// constructing readers.
pub struct FilterRegistry {
    filters: HashMap<u16, Arc<dyn Filter>>,
}

impl Default for FilterRegistry {
    fn default() -> Self {
        let mut reg = Self {
            filters: HashMap::new(),
        };
        #[cfg(feature = "deflate")]
        reg.register(Arc::new(deflate::DeflateFilter));
        reg.register(Arc::new(shuffle::ShuffleFilter));
        reg
    }
}

impl FilterRegistry {
    /// Registry with no filters at all; only unfiltered datasets decode.
    pub fn empty() -> Self {
        Self {
            filters: HashMap::new(),
        }
    }

    /// Replaces any existing filter with the same id.
    pub fn register(&mut self, filter: Arc<dyn Filter>) {
        self.filters.insert(filter.id(), filter);
    }

    /// Resolve a pipeline message against the registered implementations.
    ///
    /// Unknown optional filters are dropped from the chain; unknown required
    /// filters fail construction.
    pub fn pipeline_for(
        &self,
        message: &FilterPipelineMessage,
    ) -> Result<FilterPipeline, FilterInitError> {
        let mut stages = Vec::with_capacity(message.filters().len());
        for desc in message.filters() {
            match self.filters.get(&desc.id) {
                Some(filter) => stages.push(Stage {
                    filter: filter.clone(),
                    descriptor: desc.clone(),
                }),
                None if desc.is_optional() => {
                    warn!(
                        "skipping optional filter {} ({:?}): no implementation registered",
                        desc.id, desc.name
                    );
                }
                None => {
                    return Err(FilterInitError::Unsupported {
                        id: desc.id,
                        name: desc.name.clone(),
                    })
                }
            }
        }
        Ok(FilterPipeline { stages })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AddOne;

    impl Filter for AddOne {
        fn id(&self) -> u16 {
            900
        }

        fn name(&self) -> &'static str {
            "addone"
        }

        fn decode(&self, encoded: &[u8], _cd: &[u32]) -> Result<Vec<u8>, FilterDecodeError> {
            Ok(encoded.iter().map(|b| b.wrapping_add(1)).collect())
        }
    }

    struct Double;

    impl Filter for Double {
        fn id(&self) -> u16 {
            901
        }

        fn name(&self) -> &'static str {
            "double"
        }

        fn decode(&self, encoded: &[u8], _cd: &[u32]) -> Result<Vec<u8>, FilterDecodeError> {
            Ok(encoded.iter().flat_map(|b| [*b, *b]).collect())
        }
    }

    fn message(descs: Vec<FilterDescriptor>) -> FilterPipelineMessage {
        FilterPipelineMessage::new(descs)
    }

    #[test]
    fn identity_pipeline_copies_input() {
        let p = FilterPipeline::none();
        assert!(p.is_identity());
        assert_eq!(p.decode(&[1, 2, 3]).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn decode_applies_filters_in_reverse_order() {
        let mut reg = FilterRegistry::empty();
        reg.register(Arc::new(AddOne));
        reg.register(Arc::new(Double));

        // write order: addone then double; decode must double first, then add
        let msg = message(vec![
            FilterDescriptor::new(900, "addone", 0, vec![]),
            FilterDescriptor::new(901, "double", 0, vec![]),
        ]);
        let p = reg.pipeline_for(&msg).unwrap();
        assert_eq!(p.decode(&[5]).unwrap(), vec![6, 6]);
    }

    #[test]
    fn unknown_required_filter_fails() {
        let reg = FilterRegistry::empty();
        let msg = message(vec![FilterDescriptor::new(777, "mystery", 0, vec![])]);
        let err = reg.pipeline_for(&msg).unwrap_err();
        assert_eq!(
            err,
            FilterInitError::Unsupported {
                id: 777,
                name: "mystery".to_string()
            }
        );
    }

    #[test]
    fn unknown_optional_filter_is_skipped() {
        let mut reg = FilterRegistry::empty();
        reg.register(Arc::new(AddOne));
        let msg = message(vec![
            FilterDescriptor::new(777, "mystery", 1, vec![]),
            FilterDescriptor::new(900, "addone", 0, vec![]),
        ]);
        let p = reg.pipeline_for(&msg).unwrap();
        assert_eq!(p.descriptors().count(), 1);
        assert_eq!(p.decode(&[1]).unwrap(), vec![2]);
    }
}
