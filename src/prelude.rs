pub use crate::dataset::{ChunkedDataset, DatasetLayout, ReadError};
pub use crate::datatype::{DataType, TypeClass};
pub use crate::filter::{Filter, FilterDescriptor, FilterPipeline, FilterRegistry};
pub use crate::header::{FilterPipelineMessage, Message, ObjectHeader};
pub use crate::index::{Chunk, ChunkIndex, MapIndex, SingleChunkIndex};
pub use crate::storage::{BackingStorage, FileBacking, SliceBacking};
pub use crate::{CoordVec, GridCoord, Ndim};

pub use smallvec;
