#![forbid(unsafe_code)]
//! Core of a rich-text editing model: a tree of elements and text, invertible operations
//! that mutate it, an operational transformation engine that reconciles concurrent edits,
//! and change lists for whatever renders the document.
//! The crate does no I/O so it can be embedded in WASM or any other host.

pub mod attributes;
pub mod batch;
pub mod config;
pub mod dev_utils;
pub mod differ;
pub mod document;
pub mod error;
pub mod history;
pub mod ids;
pub mod json;
pub mod markers;
pub mod node;
pub mod ops;
pub mod position;
pub mod range;
pub mod transform;
pub mod tree;
pub mod writer;

pub use attributes::{attrs, AttributeValue, Attributes};
pub use batch::{Batch, BatchType};
pub use config::{DocumentConfig, DEFAULT_HISTORY_LIMIT, DEFAULT_OPERATION_LOG_LIMIT};
pub use differ::{Change, Diff, MarkerChange};
pub use document::{AppliedChange, Committed, Document};
pub use error::{Error, Result};
pub use ids::{LiveRangeId, NodeIndex, ReplicaId, RootName, SubscriptionId, Version};
pub use json::{DocumentSnapshot, RootSnapshot};
pub use markers::{Marker, MarkerCollection};
pub use node::{Element, Node, Text};
pub use ops::{Operation, OperationKind, OperationMetadata, OperationType};
pub use position::{Position, Stickiness};
pub use range::Range;
pub use transform::{transform, transform_sets, TransformContext};
pub use writer::{Parent, Target, Writer};
